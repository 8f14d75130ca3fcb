//! Backend endpoint descriptor consumed by [`Session`](crate::session::Session).
//!
//! The descriptor pins the base URL, the login and refresh paths, the authorization
//! scheme, and the refresh timeout. It is validated once at build time so the request
//! pipeline never has to re-check its configuration on the hot path.

// std
use std::net::IpAddr;
// crates.io
use url::Host;
// self
use crate::{_prelude::*, error::ConfigError};

/// Errors raised while constructing or validating descriptors.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum DescriptorError {
	/// Base URL must use HTTPS unless it points at a loopback host.
	#[error("The base URL must use HTTPS: {url}.")]
	InsecureBaseUrl {
		/// URL that failed validation.
		url: String,
	},
	/// Base URL cannot carry relative paths (e.g. `mailto:` or `data:` URLs).
	#[error("The base URL cannot be used as a base: {url}.")]
	CannotBeABase {
		/// URL that failed validation.
		url: String,
	},
	/// Endpoint paths are resolved against the base URL and must stay relative.
	#[error("The {endpoint} path must be relative to the base URL: {path}.")]
	AbsolutePath {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Offending path.
		path: String,
	},
	/// Authorization scheme must be a single printable token.
	#[error("Authorization scheme `{scheme}` is not a valid header token.")]
	InvalidAuthScheme {
		/// Offending scheme.
		scheme: String,
	},
	/// Refresh timeout must be strictly positive.
	#[error("The refresh timeout must be positive.")]
	NonPositiveRefreshTimeout,
}

/// Immutable backend descriptor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescriptor {
	/// Base URL every relative request target resolves against (always ends with `/`).
	pub base_url: Url,
	/// Path of the login endpoint.
	pub login_path: String,
	/// Path of the refresh endpoint.
	pub refresh_path: String,
	/// Scheme used in `Authorization` headers.
	pub auth_scheme: String,
	/// Upper bound on a single refresh exchange.
	pub refresh_timeout: Duration,
}
impl SessionDescriptor {
	/// Default login path.
	pub const DEFAULT_LOGIN_PATH: &'static str = "auth/login";
	/// Default refresh path.
	pub const DEFAULT_REFRESH_PATH: &'static str = "auth/refresh";
	/// Default authorization scheme.
	pub const DEFAULT_AUTH_SCHEME: &'static str = "Bearer";
	/// Default refresh timeout.
	pub const DEFAULT_REFRESH_TIMEOUT: Duration = Duration::seconds(30);

	/// Creates a new builder for the provided base URL.
	pub fn builder(base_url: Url) -> SessionDescriptorBuilder {
		SessionDescriptorBuilder::new(base_url)
	}

	/// Resolves a request target: absolute URLs pass through, anything else joins the base URL.
	pub fn resolve(&self, target: &str) -> Result<Url, ConfigError> {
		let map_err = |source| ConfigError::InvalidTarget { target: target.to_owned(), source };

		match Url::parse(target) {
			Ok(url) => Ok(url),
			Err(url::ParseError::RelativeUrlWithoutBase) =>
				self.base_url.join(target.trim_start_matches('/')).map_err(map_err),
			Err(e) => Err(map_err(e)),
		}
	}

	/// Absolute URL of the login endpoint.
	pub fn login_url(&self) -> Result<Url, ConfigError> {
		self.resolve(&self.login_path)
	}

	/// Absolute URL of the refresh endpoint.
	pub fn refresh_url(&self) -> Result<Url, ConfigError> {
		self.resolve(&self.refresh_path)
	}

	/// Returns `true` when `url` shares the base URL's origin and may carry the credential.
	pub fn is_first_party(&self, url: &Url) -> bool {
		url.origin() == self.base_url.origin()
	}

	pub(crate) fn refresh_timeout_std(&self) -> std::time::Duration {
		std::time::Duration::try_from(self.refresh_timeout).unwrap_or_default()
	}

	fn validate(&self) -> Result<(), DescriptorError> {
		validate_base_url(&self.base_url)?;
		validate_path("login", &self.login_path)?;
		validate_path("refresh", &self.refresh_path)?;
		validate_auth_scheme(&self.auth_scheme)?;

		if !self.refresh_timeout.is_positive() {
			return Err(DescriptorError::NonPositiveRefreshTimeout);
		}

		Ok(())
	}
}

/// Builder for [`SessionDescriptor`] values.
#[derive(Debug)]
pub struct SessionDescriptorBuilder {
	/// Base URL for every relative request target.
	pub base_url: Url,
	/// Optional login path override.
	pub login_path: Option<String>,
	/// Optional refresh path override.
	pub refresh_path: Option<String>,
	/// Optional authorization scheme override.
	pub auth_scheme: Option<String>,
	/// Optional refresh timeout override.
	pub refresh_timeout: Option<Duration>,
}
impl SessionDescriptorBuilder {
	/// Creates a new builder seeded with the provided base URL.
	pub fn new(base_url: Url) -> Self {
		Self {
			base_url,
			login_path: None,
			refresh_path: None,
			auth_scheme: None,
			refresh_timeout: None,
		}
	}

	/// Overrides the login path.
	pub fn login_path(mut self, path: impl Into<String>) -> Self {
		self.login_path = Some(path.into());

		self
	}

	/// Overrides the refresh path.
	pub fn refresh_path(mut self, path: impl Into<String>) -> Self {
		self.refresh_path = Some(path.into());

		self
	}

	/// Overrides the `Authorization` scheme (defaults to `Bearer`).
	pub fn auth_scheme(mut self, scheme: impl Into<String>) -> Self {
		self.auth_scheme = Some(scheme.into());

		self
	}

	/// Overrides the refresh timeout (defaults to 30 seconds).
	pub fn refresh_timeout(mut self, timeout: Duration) -> Self {
		self.refresh_timeout = Some(timeout);

		self
	}

	/// Consumes the builder and validates the resulting descriptor.
	pub fn build(self) -> Result<SessionDescriptor, DescriptorError> {
		let mut base_url = self.base_url;

		if !base_url.path().ends_with('/') {
			let path = format!("{}/", base_url.path());

			base_url.set_path(&path);
		}

		let descriptor = SessionDescriptor {
			base_url,
			login_path: self
				.login_path
				.unwrap_or_else(|| SessionDescriptor::DEFAULT_LOGIN_PATH.into()),
			refresh_path: self
				.refresh_path
				.unwrap_or_else(|| SessionDescriptor::DEFAULT_REFRESH_PATH.into()),
			auth_scheme: self
				.auth_scheme
				.unwrap_or_else(|| SessionDescriptor::DEFAULT_AUTH_SCHEME.into()),
			refresh_timeout: self
				.refresh_timeout
				.unwrap_or(SessionDescriptor::DEFAULT_REFRESH_TIMEOUT),
		};

		descriptor.validate()?;

		Ok(descriptor)
	}
}

fn validate_base_url(url: &Url) -> Result<(), DescriptorError> {
	if url.cannot_be_a_base() {
		return Err(DescriptorError::CannotBeABase { url: url.to_string() });
	}
	if url.scheme() == "https" || (url.scheme() == "http" && is_loopback(url)) {
		Ok(())
	} else {
		Err(DescriptorError::InsecureBaseUrl { url: url.to_string() })
	}
}

fn is_loopback(url: &Url) -> bool {
	match url.host() {
		Some(Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
		Some(Host::Ipv4(ip)) => IpAddr::V4(ip).is_loopback(),
		Some(Host::Ipv6(ip)) => IpAddr::V6(ip).is_loopback(),
		None => false,
	}
}

fn validate_path(endpoint: &'static str, path: &str) -> Result<(), DescriptorError> {
	if Url::parse(path).is_ok() || path.starts_with("//") {
		Err(DescriptorError::AbsolutePath { endpoint, path: path.to_owned() })
	} else {
		Ok(())
	}
}

fn validate_auth_scheme(scheme: &str) -> Result<(), DescriptorError> {
	if scheme.is_empty() || !scheme.chars().all(|c| c.is_ascii_graphic()) {
		Err(DescriptorError::InvalidAuthScheme { scheme: scheme.to_owned() })
	} else {
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn url(value: &str) -> Url {
		Url::parse(value).expect("Failed to parse descriptor fixture URL.")
	}

	#[test]
	fn builder_applies_defaults_and_normalizes_base() {
		let descriptor = SessionDescriptor::builder(url("https://api.example.com/v1"))
			.build()
			.expect("Descriptor with defaults should build.");

		assert_eq!(descriptor.base_url.as_str(), "https://api.example.com/v1/");
		assert_eq!(descriptor.auth_scheme, "Bearer");
		assert_eq!(descriptor.refresh_timeout, Duration::seconds(30));
		assert_eq!(
			descriptor.refresh_url().expect("Refresh URL should resolve.").as_str(),
			"https://api.example.com/v1/auth/refresh",
		);
		assert_eq!(
			descriptor.resolve("/users/me").expect("Relative target should resolve.").as_str(),
			"https://api.example.com/v1/users/me",
		);
		assert_eq!(
			descriptor
				.resolve("https://cdn.example.com/a.png")
				.expect("Absolute target should pass through.")
				.as_str(),
			"https://cdn.example.com/a.png",
		);
	}

	#[test]
	fn only_the_base_origin_is_first_party() {
		let descriptor = SessionDescriptor::builder(url("https://api.example.com/v1"))
			.build()
			.expect("Descriptor should build.");

		assert!(descriptor.is_first_party(&url("https://api.example.com/other/path")));
		assert!(!descriptor.is_first_party(&url("http://api.example.com/v1/users")));
		assert!(!descriptor.is_first_party(&url("https://api.example.com:8443/v1/users")));
		assert!(!descriptor.is_first_party(&url("https://evil.example.com/v1/users")));
	}

	#[test]
	fn insecure_base_url_is_rejected_unless_loopback() {
		let err = SessionDescriptor::builder(url("http://api.example.com"))
			.build()
			.expect_err("Plain HTTP must be rejected for remote hosts.");

		assert!(matches!(err, DescriptorError::InsecureBaseUrl { .. }));

		SessionDescriptor::builder(url("http://127.0.0.1:8080/api"))
			.build()
			.expect("Plain HTTP should be accepted for IPv4 loopback.");
		SessionDescriptor::builder(url("http://localhost:3000"))
			.build()
			.expect("Plain HTTP should be accepted for localhost.");
	}

	#[test]
	fn invalid_paths_schemes_and_timeouts_are_rejected() {
		let base = url("https://api.example.com");
		let err = SessionDescriptor::builder(base.clone())
			.refresh_path("https://evil.example.com/refresh")
			.build()
			.expect_err("Absolute refresh paths must be rejected.");

		assert!(matches!(err, DescriptorError::AbsolutePath { endpoint: "refresh", .. }));

		let err = SessionDescriptor::builder(base.clone())
			.auth_scheme("Bear er")
			.build()
			.expect_err("Schemes containing whitespace must be rejected.");

		assert!(matches!(err, DescriptorError::InvalidAuthScheme { .. }));

		let err = SessionDescriptor::builder(base)
			.refresh_timeout(Duration::ZERO)
			.build()
			.expect_err("Zero refresh timeout must be rejected.");

		assert_eq!(err, DescriptorError::NonPositiveRefreshTimeout);
	}
}
