// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for refresh cycles and the replays they release.
#[derive(Debug, Default)]
pub struct RefreshMetrics {
	exchanges: AtomicU64,
	installed: AtomicU64,
	torn_down: AtomicU64,
	replays: AtomicU64,
	stale_replays: AtomicU64,
}
impl RefreshMetrics {
	/// Refresh exchanges issued against the backend (one per cycle).
	pub fn attempts(&self) -> u64 {
		self.exchanges.load(Ordering::Relaxed)
	}

	/// Cycles that installed a new access token.
	pub fn successes(&self) -> u64 {
		self.installed.load(Ordering::Relaxed)
	}

	/// Cycles that ended in teardown.
	pub fn failures(&self) -> u64 {
		self.torn_down.load(Ordering::Relaxed)
	}

	/// Requests replayed after a successful cycle.
	pub fn replays(&self) -> u64 {
		self.replays.load(Ordering::Relaxed)
	}

	/// Requests replayed without a cycle because the pair had already been rotated.
	pub fn stale_replays(&self) -> u64 {
		self.stale_replays.load(Ordering::Relaxed)
	}

	/// Point-in-time copy of every counter.
	pub fn snapshot(&self) -> RefreshMetricsSnapshot {
		RefreshMetricsSnapshot {
			attempts: self.attempts(),
			successes: self.successes(),
			failures: self.failures(),
			replays: self.replays(),
			stale_replays: self.stale_replays(),
		}
	}

	pub(crate) fn record_attempt(&self) {
		self.exchanges.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_success(&self) {
		self.installed.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_failure(&self) {
		self.torn_down.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_replay(&self) {
		self.replays.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_stale_replay(&self) {
		self.stale_replays.fetch_add(1, Ordering::Relaxed);
	}
}

/// Plain copy of [`RefreshMetrics`] counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RefreshMetricsSnapshot {
	/// See [`RefreshMetrics::attempts`].
	pub attempts: u64,
	/// See [`RefreshMetrics::successes`].
	pub successes: u64,
	/// See [`RefreshMetrics::failures`].
	pub failures: u64,
	/// See [`RefreshMetrics::replays`].
	pub replays: u64,
	/// See [`RefreshMetrics::stale_replays`].
	pub stale_replays: u64,
}
