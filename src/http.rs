//! Transport primitives for the authenticated request pipeline.
//!
//! Callers describe requests with [`RequestSpec`]; the session decorates them into an
//! [`OutgoingRequest`] (absolute URL plus `Authorization` header) and hands that to an
//! [`ApiTransport`]. Responses come back as [`ApiResponse`] regardless of status so the
//! session can classify authentication failures and pass every other status through.

// crates.io
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	error::{ResponseError, TransportError},
};

/// Boxed future returned by [`ApiTransport::send`].
pub type TransportFuture<'a> =
	Pin<Box<dyn Future<Output = Result<ApiResponse, TransportError>> + 'a + Send>>;

/// Header carrying the access (or refresh) credential.
pub const AUTHORIZATION: &str = "authorization";
/// Header announcing the body media type.
pub const CONTENT_TYPE: &str = "content-type";

/// Abstraction over HTTP clients able to execute decorated requests.
///
/// The trait is the session's only dependency on an HTTP stack. Implementations must
/// return every completed exchange as an [`ApiResponse`], including 4xx/5xx statuses;
/// only failures that never produced a status (DNS, TCP, TLS, timeouts) become a
/// [`TransportError`].
pub trait ApiTransport
where
	Self: 'static + Send + Sync,
{
	/// Executes the request and collects the full response.
	fn send(&self, request: OutgoingRequest) -> TransportFuture<'_>;
}

/// HTTP methods the pipeline issues.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
	/// `GET`
	Get,
	/// `POST`
	Post,
	/// `PUT`
	Put,
	/// `PATCH`
	Patch,
	/// `DELETE`
	Delete,
}
impl Method {
	/// Returns the canonical method token.
	pub const fn as_str(self) -> &'static str {
		match self {
			Method::Get => "GET",
			Method::Post => "POST",
			Method::Put => "PUT",
			Method::Patch => "PATCH",
			Method::Delete => "DELETE",
		}
	}
}
impl Display for Method {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Caller-facing description of a backend request.
///
/// `target` is either a path relative to the session's base URL or an absolute URL.
/// Header names are stored lowercase.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestSpec {
	/// HTTP method.
	pub method: Method,
	/// Relative path or absolute URL.
	pub target: String,
	/// Extra headers; `authorization` is always overwritten by the session.
	pub headers: BTreeMap<String, String>,
	/// Raw body bytes.
	pub body: Option<Vec<u8>>,
	/// Optional per-request timeout applied by the transport.
	pub timeout: Option<Duration>,
	retried: bool,
}
impl RequestSpec {
	/// Creates a request for the provided method and target.
	pub fn new(method: Method, target: impl Into<String>) -> Self {
		Self {
			method,
			target: target.into(),
			headers: BTreeMap::new(),
			body: None,
			timeout: None,
			retried: false,
		}
	}

	/// Shorthand for a `GET` request.
	pub fn get(target: impl Into<String>) -> Self {
		Self::new(Method::Get, target)
	}

	/// Shorthand for a `POST` request.
	pub fn post(target: impl Into<String>) -> Self {
		Self::new(Method::Post, target)
	}

	/// Shorthand for a `PUT` request.
	pub fn put(target: impl Into<String>) -> Self {
		Self::new(Method::Put, target)
	}

	/// Shorthand for a `PATCH` request.
	pub fn patch(target: impl Into<String>) -> Self {
		Self::new(Method::Patch, target)
	}

	/// Shorthand for a `DELETE` request.
	pub fn delete(target: impl Into<String>) -> Self {
		Self::new(Method::Delete, target)
	}

	/// Adds or replaces a header.
	pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
		self.headers.insert(name.as_ref().to_ascii_lowercase(), value.into());

		self
	}

	/// Serializes `body` as JSON and sets the matching content type.
	pub fn with_json<B>(mut self, body: &B) -> Result<Self>
	where
		B: ?Sized + Serialize,
	{
		let bytes = serde_json::to_vec(body).map_err(ResponseError::Serialize)?;

		self.body = Some(bytes);

		Ok(self.with_header(CONTENT_TYPE, "application/json"))
	}

	/// Sets a raw body.
	pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
		self.body = Some(body.into());

		self
	}

	/// Bounds the request with a transport-level timeout.
	pub fn with_timeout(mut self, timeout: Duration) -> Self {
		self.timeout = Some(timeout);

		self
	}

	/// Returns `true` once the session has replayed this request with a new credential.
	pub fn is_retried(&self) -> bool {
		self.retried
	}

	pub(crate) fn mark_retried(&mut self) {
		self.retried = true;
	}
}

/// Fully resolved request handed to an [`ApiTransport`].
#[derive(Clone, PartialEq, Eq)]
pub struct OutgoingRequest {
	/// HTTP method.
	pub method: Method,
	/// Absolute URL.
	pub url: Url,
	/// Final header set (lowercase names), including `authorization` when a credential exists.
	pub headers: BTreeMap<String, String>,
	/// Raw body bytes.
	pub body: Option<Vec<u8>>,
	/// Transport-level timeout.
	pub timeout: Option<std::time::Duration>,
}
impl OutgoingRequest {
	/// Returns a header value by (case-insensitive) name.
	pub fn header(&self, name: &str) -> Option<&str> {
		self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
	}
}
impl Debug for OutgoingRequest {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let headers = self
			.headers
			.iter()
			.map(|(name, value)| {
				(name.as_str(), if name == AUTHORIZATION { "<redacted>" } else { value.as_str() })
			})
			.collect::<Vec<_>>();

		f.debug_struct("OutgoingRequest")
			.field("method", &self.method)
			.field("url", &self.url.as_str())
			.field("headers", &headers)
			.field("body_len", &self.body.as_ref().map(Vec::len))
			.field("timeout", &self.timeout)
			.finish()
	}
}

/// Completed backend response.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ApiResponse {
	/// HTTP status code.
	pub status: u16,
	/// Response headers (lowercase names; repeated headers joined with `, `).
	pub headers: BTreeMap<String, String>,
	/// Raw body bytes.
	pub body: Vec<u8>,
}
impl ApiResponse {
	const BODY_PREVIEW_LIMIT: usize = 256;

	/// Creates a response with the provided status and body.
	pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
		Self { status, headers: BTreeMap::new(), body: body.into() }
	}

	/// Adds or replaces a header.
	pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
		self.headers.insert(name.as_ref().to_ascii_lowercase(), value.into());

		self
	}

	/// Returns `true` for 2xx statuses.
	pub fn is_success(&self) -> bool {
		(200..300).contains(&self.status)
	}

	/// Returns a header value by (case-insensitive) name.
	pub fn header(&self, name: &str) -> Option<&str> {
		self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
	}

	/// Decodes the body as JSON, reporting the failing path on mismatch.
	pub fn json<T>(&self) -> Result<T>
	where
		T: DeserializeOwned,
	{
		let mut de = serde_json::Deserializer::from_slice(&self.body);

		serde_path_to_error::deserialize(&mut de)
			.map_err(|source| ResponseError::Parse { source, status: self.status }.into())
	}

	/// Returns the body as lossy UTF-8 text.
	pub fn text(&self) -> String {
		String::from_utf8_lossy(&self.body).into_owned()
	}

	/// Returns a truncated body preview suitable for error messages.
	pub fn body_preview(&self) -> String {
		let text = self.text();

		if text.chars().count() <= Self::BODY_PREVIEW_LIMIT {
			return text;
		}

		let mut buf = text.chars().take(Self::BODY_PREVIEW_LIMIT).collect::<String>();

		buf.push('…');

		buf
	}
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
#[cfg(feature = "reqwest")]
#[derive(Clone, Default)]
pub struct ReqwestTransport(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}

	async fn execute(
		client: ReqwestClient,
		request: OutgoingRequest,
	) -> Result<ApiResponse, TransportError> {
		let method = match request.method {
			Method::Get => reqwest::Method::GET,
			Method::Post => reqwest::Method::POST,
			Method::Put => reqwest::Method::PUT,
			Method::Patch => reqwest::Method::PATCH,
			Method::Delete => reqwest::Method::DELETE,
		};
		let mut builder = client.request(method, request.url);

		for (name, value) in &request.headers {
			builder = builder.header(name.as_str(), value.as_str());
		}
		if let Some(body) = request.body {
			builder = builder.body(body);
		}
		if let Some(timeout) = request.timeout {
			builder = builder.timeout(timeout);
		}

		let response = builder.send().await?;
		let status = response.status().as_u16();
		let mut headers = BTreeMap::<String, String>::new();

		for (name, value) in response.headers() {
			let Ok(value) = value.to_str() else { continue };

			headers
				.entry(name.as_str().to_owned())
				.and_modify(|existing| {
					existing.push_str(", ");
					existing.push_str(value);
				})
				.or_insert_with(|| value.to_owned());
		}

		let body = response.bytes().await?.to_vec();

		Ok(ApiResponse { status, headers, body })
	}
}
#[cfg(feature = "reqwest")]
impl ApiTransport for ReqwestTransport {
	fn send(&self, request: OutgoingRequest) -> TransportFuture<'_> {
		let client = self.0.clone();

		Box::pin(Self::execute(client, request))
	}
}
