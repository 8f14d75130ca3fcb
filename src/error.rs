//! Pipeline-level error types shared across the session, transports, and stores.

// self
use crate::_prelude::*;

/// Pipeline-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical pipeline error exposed by public APIs.
///
/// Non-authentication HTTP statuses are not errors: they come back to the caller as an
/// [`ApiResponse`](crate::http::ApiResponse) unchanged.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Response body could not be decoded.
	#[error(transparent)]
	Response(#[from] ResponseError),

	/// A replayed request was rejected again; retry depth is bounded to one.
	#[error("Request was rejected as unauthorized after a credential replay (status {status}).")]
	Unauthorized {
		/// HTTP status of the second rejection.
		status: u16,
	},
	/// The refresh exchange failed; credentials were cleared and a fresh login is required.
	#[error("Session expired: {0}")]
	SessionExpired(#[from] RefreshError),
	/// Login endpoint rejected the supplied credentials.
	#[error("Login was rejected with status {status}: {message}.")]
	LoginRejected {
		/// HTTP status returned by the login endpoint.
		status: u16,
		/// Body preview returned alongside the rejection.
		message: String,
	},
	/// A queued request lost its refresh cycle before the cycle settled.
	#[error("Queued request was dropped before its refresh cycle settled.")]
	ReplayAbandoned,
}
impl Error {
	/// Returns `true` for failures that can only be cleared by a fresh login.
	pub fn requires_login(&self) -> bool {
		matches!(self, Self::SessionExpired(_))
	}
}
impl From<crate::descriptor::DescriptorError> for Error {
	fn from(e: crate::descriptor::DescriptorError) -> Self {
		Self::Config(e.into())
	}
}

/// Configuration and validation failures raised by the pipeline.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Request target cannot be resolved against the base URL.
	#[error("Request target `{target}` is not a valid URL.")]
	InvalidTarget {
		/// Target supplied by the caller.
		target: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Session descriptor failed validation.
	#[error(transparent)]
	Descriptor(#[from] crate::descriptor::DescriptorError),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the backend.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the backend.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}

/// Failures decoding or encoding request and response bodies.
#[derive(Debug, ThisError)]
pub enum ResponseError {
	/// Backend responded with JSON that does not match the expected shape.
	#[error("Backend returned malformed JSON (status {status}).")]
	Parse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status code of the response.
		status: u16,
	},
	/// Request body could not be serialized.
	#[error("Request body could not be serialized.")]
	Serialize(#[source] serde_json::Error),
}

/// Terminal refresh failures.
///
/// Cloneable so every request queued behind one refresh cycle receives its own copy.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum RefreshError {
	/// No refresh credential is stored.
	#[error("No refresh token is available.")]
	MissingRefreshToken,
	/// Refresh endpoint rejected the exchange.
	#[error("Refresh endpoint rejected the exchange: {message}.")]
	Rejected {
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Backend- or pipeline-supplied reason string.
		message: String,
	},
	/// Refresh exchange exceeded the configured timeout.
	#[error("Refresh exchange timed out after {after}.")]
	TimedOut {
		/// Timeout that elapsed.
		after: Duration,
	},
	/// Refresh exchange failed at the transport layer.
	#[error("Refresh exchange failed in transport: {message}.")]
	Transport {
		/// Rendered transport failure.
		message: String,
	},
	/// A login or logout replaced the pair while the exchange was in flight.
	#[error("Credentials changed while the refresh was in flight.")]
	Superseded,
	/// Credential store failed while reading or writing the pair.
	#[error("Credential store failed during refresh: {message}.")]
	Storage {
		/// Rendered store failure.
		message: String,
	},
	/// The task driving the refresh cycle was dropped before it settled.
	#[error("Refresh cycle was abandoned before it settled.")]
	Abandoned,
}
