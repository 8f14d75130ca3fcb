//! Authenticated request pipeline for bearer-token backends: credential decoration,
//! single-flight token refresh with ordered replay, and session teardown behind one handle.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod descriptor;
pub mod error;
pub mod http;
pub mod obs;
pub mod session;
pub mod store;
pub mod strategy;
#[cfg(all(any(test, feature = "test"), feature = "reqwest"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		descriptor::SessionDescriptor,
		http::ReqwestTransport,
		session::Session,
		store::{CredentialStore, MemoryStore},
	};

	/// Session type alias used by reqwest-backed integration tests.
	pub type ReqwestTestSession = Session<ReqwestTransport>;

	/// Builds a reqwest transport that accepts the self-signed certificates produced by
	/// `httpmock` during tests.
	pub fn test_reqwest_transport() -> ReqwestTransport {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		ReqwestTransport::with_client(client)
	}

	/// Builds a descriptor pointing at a mock server base URL with default endpoints.
	pub fn test_descriptor(base_url: &str) -> SessionDescriptor {
		let base_url = Url::parse(base_url).expect("Mock server base URL should parse.");

		SessionDescriptor::builder(base_url).build().expect("Test descriptor should build.")
	}

	/// Constructs a [`Session`] backed by an in-memory store and the reqwest transport used
	/// across integration tests.
	pub fn build_reqwest_test_session(
		descriptor: SessionDescriptor,
	) -> (ReqwestTestSession, Arc<MemoryStore>) {
		let store_backend = Arc::new(MemoryStore::default());
		let store: Arc<dyn CredentialStore> = store_backend.clone();
		let session = Session::with_transport(store, descriptor, test_reqwest_transport());

		(session, store_backend)
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, VecDeque},
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use tokio::sync::watch;
pub use url;
#[cfg(all(test, feature = "reqwest"))] use {color_eyre as _, httpmock as _};
