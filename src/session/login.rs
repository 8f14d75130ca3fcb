//! Session entry and exit: exchanging user credentials for a token pair, and logging out.

// self
use crate::{
	_prelude::*,
	auth::LoginResponse,
	http::{ApiTransport, RequestSpec},
	obs::{self, Stage, StageOutcome, StageSpan},
	session::{Session, SessionStatus, SignOutReason},
};

impl<T> Session<T>
where
	T: ?Sized + ApiTransport,
{
	/// Posts `credentials` to the login endpoint and stores the returned pair.
	///
	/// The login request is sent without an `Authorization` header and is never routed
	/// through the refresh path; a rejection surfaces as [`Error::LoginRejected`].
	pub async fn login<B>(&self, credentials: &B) -> Result<LoginResponse>
	where
		B: ?Sized + Serialize,
	{
		const STAGE: Stage = Stage::Login;

		let span = StageSpan::new(STAGE, "login");

		obs::record_stage_outcome(STAGE, StageOutcome::Attempt);

		let result = span
			.instrument(async {
				let request =
					RequestSpec::post(self.descriptor.login_path.as_str()).with_json(credentials)?;
				let outgoing = self.decorate(&request, None)?;
				let response = self.transport.send(outgoing).await?;

				if !response.is_success() {
					return Err(Error::LoginRejected {
						status: response.status,
						message: response.body_preview(),
					});
				}

				let login = response.json::<LoginResponse>()?;
				let _writing = self.credential_writes.lock().await;

				self.store.set(login.credentials()).await?;
				self.coordinator.advance();
				self.publish(SessionStatus::Authenticated);

				Ok(login)
			})
			.await;

		obs::record_stage_outcome(STAGE, StageOutcome::of(&result));

		result
	}

	/// Clears the stored pair and publishes [`SessionStatus::SignedOut`].
	///
	/// Requests already in flight keep their outcome; the next request goes out without
	/// credentials.
	pub async fn logout(&self) -> Result<()> {
		self.teardown(SignOutReason::Logout).await
	}
}
