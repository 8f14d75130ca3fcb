//! Refresh cycle driver.
//!
//! The leader of a cycle performs exactly one exchange against the refresh endpoint,
//! presenting the stored refresh token as its credential. Installing the outcome is
//! serialized with login and teardown: if either replaced the pair while the exchange
//! was in flight, the grant is discarded and waiters are released with whatever pair is
//! current (or rejected when there is none). Otherwise a rotated pair is stored before
//! any waiter is released, and a failure tears the session down before every waiter is
//! rejected with the same [`RefreshError`].

mod metrics;

pub use metrics::*;

// self
use crate::{
	_prelude::*,
	auth::CredentialPair,
	error::RefreshError,
	http::{ApiTransport, RequestSpec},
	obs::{self, Stage, StageOutcome, StageSpan},
	session::{Session, SessionStatus, SignOutReason, coordinator::RefreshCycle},
	store::StoreError,
};

impl<T> Session<T>
where
	T: ?Sized + ApiTransport,
{
	/// Drives a refresh cycle to completion and settles its waiters.
	pub(crate) async fn lead_refresh(&self, cycle: RefreshCycle) {
		const STAGE: Stage = Stage::Refresh;

		let span = StageSpan::new(STAGE, "lead_refresh");

		obs::record_stage_outcome(STAGE, StageOutcome::Attempt);

		let exchanged = span.instrument(self.exchange_refresh()).await;
		let _writing = self.credential_writes.lock().await;

		if cycle.is_superseded() {
			span.note("credentials changed during the refresh; discarding its outcome");
			obs::record_stage_outcome(STAGE, StageOutcome::Failure);

			match self.store.get().await {
				Ok(Some(current)) => cycle.succeed(current.access_token),
				Ok(None) => cycle.fail(RefreshError::Superseded),
				Err(e) => cycle.fail(storage_failure(e)),
			}

			return;
		}

		let installed = match exchanged {
			Ok(rotated) =>
				self.store.set(rotated.clone()).await.map(|()| rotated).map_err(storage_failure),
			Err(e) => Err(e),
		};

		obs::record_stage_outcome(STAGE, StageOutcome::of(&installed));

		match installed {
			Ok(rotated) => {
				self.refresh_metrics.record_success();
				self.publish(SessionStatus::Authenticated);
				span.note("refresh installed a new access token; releasing queued requests");
				cycle.succeed(rotated.access_token);
			},
			Err(error) => {
				self.refresh_metrics.record_failure();
				span.note("refresh failed; tearing the session down");

				let error = match self.sign_out(SignOutReason::Expired).await {
					Ok(()) => error,
					Err(e) => storage_failure(e),
				};

				cycle.fail(error);
			},
		}
	}

	/// Performs the refresh exchange and returns the rotated pair without storing it.
	async fn exchange_refresh(&self) -> Result<CredentialPair, RefreshError> {
		let pair = self
			.store
			.get()
			.await
			.map_err(storage_failure)?
			.filter(|pair| !pair.refresh_token.is_blank())
			.ok_or(RefreshError::MissingRefreshToken)?;
		let request = self
			.decorate(
				&RequestSpec::post(self.descriptor.refresh_path.as_str()),
				Some(&pair.refresh_token),
			)
			.map_err(|e| RefreshError::Transport { message: e.to_string() })?;

		self.refresh_metrics.record_attempt();

		let response = match tokio::time::timeout(
			self.descriptor.refresh_timeout_std(),
			self.transport.send(request),
		)
		.await
		{
			Ok(Ok(response)) => response,
			Ok(Err(e)) => return Err(RefreshError::Transport { message: e.to_string() }),
			Err(_) => return Err(RefreshError::TimedOut { after: self.descriptor.refresh_timeout }),
		};
		let grant = self.strategy.interpret_refresh(&response)?;

		Ok(pair.rotate(grant.access_token, grant.refresh_token))
	}
}

fn storage_failure(e: StoreError) -> RefreshError {
	RefreshError::Storage { message: e.to_string() }
}
