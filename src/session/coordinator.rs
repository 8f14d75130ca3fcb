//! Single-flight refresh state machine with a FIFO waiter queue.
//!
//! The coordinator is either idle or refreshing. The first authentication failure seen
//! while idle makes its caller the cycle leader; every later failure joins the queue
//! until the leader settles the cycle. All state transitions happen inside one
//! synchronous critical section, so two callers can never both become leader.
//!
//! Waiters keep their own request. Settling a cycle hands each of them a [`Release`]
//! carrying the access token to replay with and a turn chained to the waiter queued
//! before it, so replays go out in arrival order even though each caller drives its own.

// crates.io
use tokio::sync::oneshot;
// self
use crate::{_prelude::*, auth::TokenSecret, error::RefreshError};

pub(crate) type Outcome = oneshot::Receiver<Result<Release>>;

type Responder = oneshot::Sender<Result<Release>>;

/// Permission to replay once the previous waiter has finished.
#[derive(Debug)]
pub(crate) struct Release {
	pub(crate) access_token: TokenSecret,
	turn: Option<oneshot::Receiver<()>>,
	next: oneshot::Sender<()>,
}
impl Release {
	/// Waits until every waiter queued earlier has replayed or gone away.
	pub(crate) async fn wait_turn(&mut self) {
		if let Some(turn) = self.turn.take() {
			// A dropped predecessor also passes the turn on.
			let _ = turn.await;
		}
	}

	/// Lets the next waiter replay.
	pub(crate) fn pass_turn(self) {
		let _ = self.next.send(());
	}
}

/// Result of offering a failed request to the coordinator.
#[derive(Debug)]
pub(crate) enum Admission {
	/// The caller drives the refresh exchange and is also the first waiter.
	Leader { cycle: RefreshCycle, outcome: Outcome },
	/// A cycle is already in flight; the caller was queued behind it.
	Queued { outcome: Outcome },
	/// Credentials changed after the request was sent; replay with the current pair.
	Stale,
}

#[derive(Debug, Default)]
struct Inner {
	queue: Option<VecDeque<Responder>>,
	generation: u64,
}

#[derive(Debug, Default)]
pub(crate) struct RefreshCoordinator(Mutex<Inner>);
impl RefreshCoordinator {
	/// Credential generation; bumped whenever a pair is installed or torn down.
	pub(crate) fn generation(&self) -> u64 {
		self.0.lock().generation
	}

	pub(crate) fn advance(&self) {
		self.0.lock().generation += 1;
	}

	pub(crate) fn queued(&self) -> usize {
		self.0.lock().queue.as_ref().map_or(0, VecDeque::len)
	}

	pub(crate) fn is_refreshing(&self) -> bool {
		self.0.lock().queue.is_some()
	}

	/// Offers a caller whose credential (from generation `sent_with`) was rejected.
	pub(crate) fn admit(self: &Arc<Self>, sent_with: u64) -> Admission {
		let mut inner = self.0.lock();

		if let Some(queue) = inner.queue.as_mut() {
			let (responder, outcome) = oneshot::channel();

			queue.push_back(responder);

			return Admission::Queued { outcome };
		}
		if sent_with != inner.generation {
			return Admission::Stale;
		}

		let (responder, outcome) = oneshot::channel();

		inner.queue = Some(VecDeque::from([responder]));

		let cycle =
			RefreshCycle { coordinator: self.clone(), started_with: inner.generation, settled: false };

		Admission::Leader { cycle, outcome }
	}

	fn drain(&self, advance: bool) -> VecDeque<Responder> {
		let mut inner = self.0.lock();

		if advance {
			inner.generation += 1;
		}

		inner.queue.take().unwrap_or_default()
	}
}

/// Leader-held handle for one refresh cycle.
///
/// Dropping the handle without settling rejects every waiter with
/// [`RefreshError::Abandoned`] and returns the coordinator to idle.
#[derive(Debug)]
pub(crate) struct RefreshCycle {
	coordinator: Arc<RefreshCoordinator>,
	started_with: u64,
	settled: bool,
}
impl RefreshCycle {
	/// Returns `true` when a login or teardown has replaced the pair since the cycle began.
	pub(crate) fn is_superseded(&self) -> bool {
		self.coordinator.generation() != self.started_with
	}

	/// Ends the cycle, releasing every waiter in enqueue order with `access_token`.
	pub(crate) fn succeed(mut self, access_token: TokenSecret) {
		self.settled = true;

		let mut turn = None;

		for responder in self.coordinator.drain(true) {
			let (next, following) = oneshot::channel();
			let release = Release { access_token: access_token.clone(), turn: turn.take(), next };

			// A waiter whose caller is gone drops its release, which passes the turn on.
			let _ = responder.send(Ok(release));

			turn = Some(following);
		}
	}

	/// Ends the cycle with a terminal failure, rejecting every waiter in enqueue order.
	pub(crate) fn fail(mut self, error: RefreshError) {
		self.settled = true;

		reject_all(self.coordinator.drain(false), &error);
	}
}
impl Drop for RefreshCycle {
	fn drop(&mut self) {
		if !self.settled {
			reject_all(self.coordinator.drain(false), &RefreshError::Abandoned);
		}
	}
}

fn reject_all(queue: VecDeque<Responder>, error: &RefreshError) {
	for responder in queue {
		let _ = responder.send(Err(Error::SessionExpired(error.clone())));
	}
}
