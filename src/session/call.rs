//! Caller-facing request entry point: credential decoration, authentication-failure
//! detection, and transparent replay.

// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	http::{AUTHORIZATION, ApiResponse, ApiTransport, OutgoingRequest, RequestSpec},
	obs::{self, Stage, StageOutcome, StageSpan},
	session::{
		Session,
		coordinator::{Admission, Outcome},
	},
	strategy::ResponseClass,
};

impl<T> Session<T>
where
	T: ?Sized + ApiTransport,
{
	/// Sends `request` with the stored access token attached.
	///
	/// An authentication failure is recovered transparently: the session refreshes the
	/// credential once (sharing a single exchange with any other request that fails at the
	/// same time) and replays the request with the new access token. Every other status is
	/// returned unchanged. A request that is rejected again after its replay fails with
	/// [`Error::Unauthorized`]; a failed refresh fails with [`Error::SessionExpired`] after
	/// the credentials have been cleared.
	///
	/// Targets outside the base URL's origin never receive the credential, and their
	/// responses are returned as they are.
	pub async fn call(&self, request: RequestSpec) -> Result<ApiResponse> {
		const STAGE: Stage = Stage::Call;

		let span = StageSpan::new(STAGE, "call");

		obs::record_stage_outcome(STAGE, StageOutcome::Attempt);

		let result = span.instrument(self.call_once(request)).await;

		obs::record_stage_outcome(STAGE, StageOutcome::of(&result));

		result
	}

	async fn call_once(&self, request: RequestSpec) -> Result<ApiResponse> {
		// Read the generation before the token so a concurrent rotation is never missed.
		let generation = self.coordinator.generation();
		let credentials = self.store.get().await?;
		let first_party = self.descriptor.is_first_party(&self.descriptor.resolve(&request.target)?);
		let response =
			self.dispatch(&request, credentials.as_ref().map(|pair| &pair.access_token)).await?;

		if !first_party || self.strategy.classify_response(&response) != ResponseClass::AuthFailure
		{
			return Ok(response);
		}
		if request.is_retried() {
			return Err(Error::Unauthorized { status: response.status });
		}

		match self.coordinator.admit(generation) {
			Admission::Leader { cycle, outcome } => {
				self.lead_refresh(cycle).await;

				self.replay_when_released(request, outcome).await
			},
			Admission::Queued { outcome } => self.replay_when_released(request, outcome).await,
			Admission::Stale => self.replay_with_current(request, response.status).await,
		}
	}

	/// Waits for the cycle to settle, then replays in queue order.
	///
	/// The replay runs in this caller's own future, so cancelling any other caller
	/// (including the cycle leader) cannot drop it.
	async fn replay_when_released(
		&self,
		request: RequestSpec,
		outcome: Outcome,
	) -> Result<ApiResponse> {
		let mut release = outcome.await.unwrap_or(Err(Error::ReplayAbandoned))?;

		release.wait_turn().await;

		let result = self.replay(request, &release.access_token).await;

		release.pass_turn();

		result
	}

	/// Reissues `request` once with `access_token`, marking it as already retried.
	pub(crate) async fn replay(
		&self,
		mut request: RequestSpec,
		access_token: &TokenSecret,
	) -> Result<ApiResponse> {
		const STAGE: Stage = Stage::Replay;

		let span = StageSpan::new(STAGE, "replay");

		obs::record_stage_outcome(STAGE, StageOutcome::Attempt);
		request.mark_retried();
		self.refresh_metrics.record_replay();

		let result = span
			.instrument(async {
				let response = self.dispatch(&request, Some(access_token)).await?;

				if self.strategy.classify_response(&response) == ResponseClass::AuthFailure {
					return Err(Error::Unauthorized { status: response.status });
				}

				Ok(response)
			})
			.await;

		obs::record_stage_outcome(STAGE, StageOutcome::of(&result));

		result
	}

	async fn replay_with_current(&self, request: RequestSpec, status: u16) -> Result<ApiResponse> {
		match self.store.get().await? {
			Some(pair) => {
				self.refresh_metrics.record_stale_replay();

				self.replay(request, &pair.access_token).await
			},
			None => Err(Error::Unauthorized { status }),
		}
	}

	async fn dispatch(
		&self,
		request: &RequestSpec,
		credential: Option<&TokenSecret>,
	) -> Result<ApiResponse> {
		let outgoing = self.decorate(request, credential)?;

		Ok(self.transport.send(outgoing).await?)
	}

	/// Resolves the target and attaches `credential` as the `Authorization` header.
	///
	/// Without a credential, or for a target on another origin, the request goes out
	/// unauthenticated; this step never fails for lack of a token.
	pub(crate) fn decorate(
		&self,
		request: &RequestSpec,
		credential: Option<&TokenSecret>,
	) -> Result<OutgoingRequest> {
		let url = self.descriptor.resolve(&request.target)?;
		let mut headers = request.headers.clone();

		match credential.filter(|_| self.descriptor.is_first_party(&url)) {
			Some(token) => {
				headers.insert(AUTHORIZATION.into(), token.authorization(&self.descriptor.auth_scheme));
			},
			None => {
				headers.remove(AUTHORIZATION);
			},
		}

		Ok(OutgoingRequest {
			method: request.method,
			url,
			headers,
			body: request.body.clone(),
			timeout: request.timeout.and_then(|timeout| std::time::Duration::try_from(timeout).ok()),
		})
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{
		auth::CredentialPair, descriptor::SessionDescriptor, http::TransportFuture, store::MemoryStore,
	};

	struct NeverTransport;
	impl ApiTransport for NeverTransport {
		fn send(&self, _request: OutgoingRequest) -> TransportFuture<'_> {
			Box::pin(async { Ok(ApiResponse::new(204, "")) })
		}
	}

	fn session() -> Session<NeverTransport> {
		let descriptor = SessionDescriptor::builder(
			Url::parse("https://api.example.com/v2").expect("Fixture URL should parse."),
		)
		.auth_scheme("Token")
		.build()
		.expect("Fixture descriptor should build.");

		Session::with_transport(
			Arc::new(MemoryStore::with_credentials(CredentialPair::new("A1", "R1"))),
			descriptor,
			NeverTransport,
		)
	}

	#[test]
	fn decorate_attaches_scheme_and_resolves_target() {
		let session = session();
		let token = TokenSecret::new("A1");
		let outgoing = session
			.decorate(&RequestSpec::get("/profiles/7").with_header("X-Trace", "t1"), Some(&token))
			.expect("Decoration should succeed.");

		assert_eq!(outgoing.url.as_str(), "https://api.example.com/v2/profiles/7");
		assert_eq!(outgoing.header("authorization"), Some("Token A1"));
		assert_eq!(outgoing.header("x-trace"), Some("t1"));
	}

	#[test]
	fn decorate_without_token_strips_caller_authorization() {
		let session = session();
		let outgoing = session
			.decorate(&RequestSpec::get("blog/posts").with_header("Authorization", "Bearer forged"), None)
			.expect("Unauthenticated decoration should succeed.");

		assert_eq!(outgoing.header("authorization"), None);
		assert_eq!(outgoing.url.as_str(), "https://api.example.com/v2/blog/posts");
	}

	#[test]
	fn decorate_keeps_the_token_away_from_other_origins() {
		let session = session();
		let token = TokenSecret::new("A1");

		for target in [
			"http://evil.example.com/x",
			"https://evil.example.com/x",
			"http://api.example.com/v2/x",
		] {
			let outgoing = session
				.decorate(&RequestSpec::get(target), Some(&token))
				.expect("Foreign targets should still resolve.");

			assert_eq!(outgoing.header("authorization"), None, "{target} must not see the token");
		}
	}
}
