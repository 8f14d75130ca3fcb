#![cfg(all(feature = "reqwest", feature = "test"))]

// std
use std::time::Duration as StdDuration;
// crates.io
use httpmock::prelude::*;
// self
use session_relay::{
	_preludet::*,
	auth::CredentialPair,
	error::RefreshError,
	http::RequestSpec,
	session::{SessionStatus, SignOutReason},
	store::{CredentialStore, MemoryStore},
};

fn build_session(server: &MockServer) -> (ReqwestTestSession, Arc<MemoryStore>) {
	build_reqwest_test_session(test_descriptor(&server.base_url()))
}

async fn seed(store: &MemoryStore, access: &str, refresh: &str) {
	store
		.set(CredentialPair::new(access, refresh))
		.await
		.expect("Seeding the memory store should succeed.");
}

#[tokio::test]
async fn login_then_call_uses_the_minted_access_token() {
	let server = MockServer::start_async().await;
	let login = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/auth/login")
				.header("content-type", "application/json")
				.json_body(serde_json::json!({ "email": "kim@example.com", "password": "hunter2" }));
			then.status(200).header("content-type", "application/json").body(
				r#"{"accessToken":"A1","refreshToken":"R1","user":{"id":7}}"#,
			);
		})
		.await;
	let profile = server
		.mock_async(|when, then| {
			when.method(GET).path("/profile").header("authorization", "Bearer A1");
			then.status(200).header("content-type", "application/json").body(r#"{"id":7}"#);
		})
		.await;
	let (session, store) = build_session(&server);

	session
		.login(&serde_json::json!({ "email": "kim@example.com", "password": "hunter2" }))
		.await
		.expect("Login should succeed against the mock backend.");

	assert_eq!(store.snapshot(), Some(CredentialPair::new("A1", "R1")));

	let response = session.call(RequestSpec::get("profile")).await.expect("Call should succeed.");

	login.assert_async().await;
	profile.assert_async().await;

	assert_eq!(response.status, 200);
	assert_eq!(response.json::<serde_json::Value>().expect("Body should be JSON.")["id"], 7);
}

#[tokio::test]
async fn login_rejection_is_reported_without_touching_the_store() {
	let server = MockServer::start_async().await;
	let login = server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/login");
			then.status(401).body(r#"{"message":"bad password"}"#);
		})
		.await;
	let (session, store) = build_session(&server);
	let err = session
		.login(&serde_json::json!({ "email": "kim@example.com", "password": "nope" }))
		.await
		.expect_err("Rejected login must surface.");

	login.assert_async().await;

	match err {
		Error::LoginRejected { status, message } => {
			assert_eq!(status, 401);
			assert!(message.contains("bad password"));
		},
		other => panic!("Unexpected error: {other:?}."),
	}

	assert_eq!(store.snapshot(), None);
	assert_eq!(session.status(), SessionStatus::Anonymous);
}

#[tokio::test]
async fn expired_token_is_refreshed_with_the_refresh_credential() {
	let server = MockServer::start_async().await;
	let expired = server
		.mock_async(|when, then| {
			when.method(GET).path("/feed").header("authorization", "Bearer A1");
			then.status(401).body(r#"{"message":"jwt expired"}"#);
		})
		.await;
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/refresh").header("authorization", "Bearer R1");
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"status":"success","accessToken":"A2"}"#);
		})
		.await;
	let replayed = server
		.mock_async(|when, then| {
			when.method(GET).path("/feed").header("authorization", "Bearer A2");
			then.status(200).body("[]");
		})
		.await;
	let (session, store) = build_session(&server);

	seed(&store, "A1", "R1").await;

	let response = session.call(RequestSpec::get("/feed")).await.expect("Replay should succeed.");

	expired.assert_calls_async(1).await;
	refresh.assert_calls_async(1).await;
	replayed.assert_calls_async(1).await;

	assert_eq!(response.text(), "[]");
	assert_eq!(store.snapshot(), Some(CredentialPair::new("A2", "R1")));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_failures_trigger_one_refresh() {
	let server = MockServer::start_async().await;
	let expired = server
		.mock_async(|when, then| {
			when.method(GET).path("/items").header("authorization", "Bearer A1");
			then.status(401);
		})
		.await;
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/refresh").header("authorization", "Bearer R1");
			then.status(200)
				.delay(StdDuration::from_millis(300))
				.header("content-type", "application/json")
				.body(r#"{"status":"success","accessToken":"A2","refreshToken":"R2"}"#);
		})
		.await;
	let replayed = server
		.mock_async(|when, then| {
			when.method(GET).path("/items").header("authorization", "Bearer A2");
			then.status(200).body("ok");
		})
		.await;
	let (session, store) = build_session(&server);

	seed(&store, "A1", "R1").await;

	let (first, second, third) = tokio::join!(
		session.call(RequestSpec::get("/items").with_header("x-request-id", "1")),
		session.call(RequestSpec::get("/items").with_header("x-request-id", "2")),
		session.call(RequestSpec::get("/items").with_header("x-request-id", "3")),
	);

	for result in [first, second, third] {
		assert_eq!(result.expect("Every call should recover.").status, 200);
	}

	expired.assert_calls_async(3).await;
	refresh.assert_calls_async(1).await;
	replayed.assert_calls_async(3).await;

	assert_eq!(session.refresh_metrics.attempts(), 1);
	assert_eq!(store.snapshot(), Some(CredentialPair::new("A2", "R2")));
}

#[tokio::test]
async fn revoked_refresh_token_signs_the_session_out() {
	let server = MockServer::start_async().await;
	let expired = server
		.mock_async(|when, then| {
			when.method(GET).path("/feed");
			then.status(401);
		})
		.await;
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/refresh");
			then.status(401).body(r#"{"status":"error","message":"refresh token revoked"}"#);
		})
		.await;
	let (session, store) = build_session(&server);
	let mut status = session.subscribe();

	seed(&store, "A1", "R1").await;

	let err = session.call(RequestSpec::get("/feed")).await.expect_err("Refresh must fail.");

	expired.assert_calls_async(1).await;
	refresh.assert_calls_async(1).await;

	assert!(matches!(err, Error::SessionExpired(RefreshError::Rejected { status: Some(401), .. })));
	assert_eq!(store.snapshot(), None);

	status.changed().await.expect("Status channel should stay open.");

	assert_eq!(*status.borrow(), SessionStatus::SignedOut { reason: SignOutReason::Expired });
}

#[tokio::test]
async fn server_errors_are_returned_unchanged() {
	let server = MockServer::start_async().await;
	let broken = server
		.mock_async(|when, then| {
			when.method(POST).path("/orders").header("authorization", "Bearer A1");
			then.status(503).header("retry-after", "30").body("maintenance");
		})
		.await;
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/refresh");
			then.status(200).body(r#"{"status":"success","accessToken":"A2"}"#);
		})
		.await;
	let (session, store) = build_session(&server);

	seed(&store, "A1", "R1").await;

	let response = session
		.call(
			RequestSpec::post("/orders")
				.with_json(&serde_json::json!({ "sku": "X-1" }))
				.expect("Order body should serialize."),
		)
		.await
		.expect("A 503 is returned to the caller, not raised.");

	broken.assert_calls_async(1).await;
	refresh.assert_calls_async(0).await;

	assert_eq!(response.status, 503);
	assert_eq!(response.header("Retry-After"), Some("30"));
	assert_eq!(response.text(), "maintenance");
	assert_eq!(store.snapshot(), Some(CredentialPair::new("A1", "R1")));
}
