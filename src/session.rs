//! Authenticated request pipeline built around a single [`Session`] handle.
//!
//! The session owns the transport, the credential store, the backend descriptor, the
//! response strategy, and the refresh coordinator, so individual stages (decoration,
//! refresh, replay, teardown) share one explicit piece of state instead of module-level
//! globals. Presentation code subscribes to [`SessionStatus`] updates to decide when to
//! send the user back to the login entry point.

mod call;
mod login;
pub mod refresh;

mod coordinator;

pub use refresh::*;

// crates.io
use tokio::sync::watch;
// self
use crate::{
	_prelude::*,
	auth::CredentialPair,
	descriptor::SessionDescriptor,
	http::ApiTransport,
	obs::{self, Stage, StageOutcome, StageSpan},
	store::{CredentialStore, StoreError},
	strategy::{DefaultSessionStrategy, SessionStrategy},
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestTransport;
use coordinator::RefreshCoordinator;

#[cfg(feature = "reqwest")]
/// Session specialized for the crate's default reqwest transport.
pub type ReqwestSession = Session<ReqwestTransport>;

/// Why a session left the authenticated state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignOutReason {
	/// The caller asked to log out.
	Logout,
	/// The refresh credential was rejected or unusable.
	Expired,
}

/// Authentication state published to the presentation layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum SessionStatus {
	/// No credentials have been seen yet.
	Anonymous,
	/// A credential pair is stored.
	Authenticated,
	/// Credentials were torn down; only a fresh login leads back to `Authenticated`.
	SignedOut {
		/// Why the session ended.
		reason: SignOutReason,
	},
}
impl SessionStatus {
	/// Returns `true` when the presentation layer should route to the login entry point.
	pub fn requires_login(&self) -> bool {
		matches!(self, Self::SignedOut { .. })
	}
}

/// Authenticated request pipeline against a single backend.
pub struct Session<T>
where
	T: ?Sized + ApiTransport,
{
	/// HTTP transport used for every outbound request.
	pub transport: Arc<T>,
	/// Credential store holding the access/refresh pair.
	pub store: Arc<dyn CredentialStore>,
	/// Backend descriptor (base URL, endpoints, timeouts).
	pub descriptor: SessionDescriptor,
	/// Strategy classifying responses and refresh replies.
	pub strategy: Arc<dyn SessionStrategy>,
	/// Shared counters for refresh cycle outcomes.
	pub refresh_metrics: Arc<RefreshMetrics>,
	coordinator: Arc<RefreshCoordinator>,
	// Serializes every write to the pair (login, refresh install, teardown).
	credential_writes: Arc<AsyncMutex<()>>,
	status: Arc<watch::Sender<SessionStatus>>,
}
impl<T> Session<T>
where
	T: ?Sized + ApiTransport,
{
	/// Creates a session that reuses the caller-provided transport.
	pub fn with_transport(
		store: Arc<dyn CredentialStore>,
		descriptor: SessionDescriptor,
		transport: impl Into<Arc<T>>,
	) -> Self {
		let (status, _) = watch::channel(SessionStatus::Anonymous);

		Self {
			transport: transport.into(),
			store,
			descriptor,
			strategy: Arc::new(DefaultSessionStrategy),
			refresh_metrics: Default::default(),
			coordinator: Default::default(),
			credential_writes: Default::default(),
			status: Arc::new(status),
		}
	}

	/// Replaces the response strategy.
	pub fn with_strategy(mut self, strategy: Arc<dyn SessionStrategy>) -> Self {
		self.strategy = strategy;

		self
	}

	/// Subscribes to session status changes.
	pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
		self.status.subscribe()
	}

	/// Returns the most recently published status.
	pub fn status(&self) -> SessionStatus {
		*self.status.borrow()
	}

	/// Returns the stored credential pair, if any.
	pub async fn credentials(&self) -> Result<Option<CredentialPair>> {
		Ok(self.store.get().await?)
	}

	/// Returns `true` when a credential pair is stored.
	pub async fn is_authenticated(&self) -> Result<bool> {
		Ok(self.credentials().await?.is_some())
	}

	/// Number of requests currently queued behind an in-flight refresh cycle.
	pub fn pending_replays(&self) -> usize {
		self.coordinator.queued()
	}

	/// Re-reads the store after start-up and publishes `Authenticated` when a pair survived.
	pub async fn restore(&self) -> Result<SessionStatus> {
		let _writing = self.credential_writes.lock().await;

		if self.store.get().await?.is_some() {
			self.coordinator.advance();
			self.publish(SessionStatus::Authenticated);
		}

		Ok(self.status())
	}

	/// Clears the stored pair and signals the presentation layer.
	pub(crate) async fn teardown(&self, reason: SignOutReason) -> Result<()> {
		let _writing = self.credential_writes.lock().await;

		Ok(self.sign_out(reason).await?)
	}

	/// Teardown body; callers must hold `credential_writes`.
	///
	/// The status is published even when the store fails to clear, so callers are routed
	/// to the login entry point either way. The store error is still returned.
	async fn sign_out(&self, reason: SignOutReason) -> Result<(), StoreError> {
		const STAGE: Stage = Stage::Teardown;

		let span = StageSpan::new(STAGE, "sign_out");

		obs::record_stage_outcome(STAGE, StageOutcome::Attempt);

		let result = span
			.instrument(async {
				let cleared = self.store.clear().await;

				self.coordinator.advance();
				self.publish(SessionStatus::SignedOut { reason });

				cleared
			})
			.await;

		if let Err(e) = &result {
			span.note(&format!("credential store kept the pair after sign-out: {e}"));
		}

		obs::record_stage_outcome(STAGE, StageOutcome::of(&result));

		result
	}

	fn publish(&self, status: SessionStatus) {
		self.status.send_replace(status);
	}
}
#[cfg(feature = "reqwest")]
impl Session<ReqwestTransport> {
	/// Creates a new session backed by its own reqwest transport.
	pub fn new(store: Arc<dyn CredentialStore>, descriptor: SessionDescriptor) -> Self {
		Self::with_transport(store, descriptor, ReqwestTransport::default())
	}
}
impl<T> Clone for Session<T>
where
	T: ?Sized + ApiTransport,
{
	fn clone(&self) -> Self {
		Self {
			transport: self.transport.clone(),
			store: self.store.clone(),
			descriptor: self.descriptor.clone(),
			strategy: self.strategy.clone(),
			refresh_metrics: self.refresh_metrics.clone(),
			coordinator: self.coordinator.clone(),
			credential_writes: self.credential_writes.clone(),
			status: self.status.clone(),
		}
	}
}
impl<T> Debug for Session<T>
where
	T: ?Sized + ApiTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Session")
			.field("descriptor", &self.descriptor)
			.field("status", &self.status())
			.field("refreshing", &self.coordinator.is_refreshing())
			.field("pending_replays", &self.pending_replays())
			.finish()
	}
}
