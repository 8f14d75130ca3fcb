//! Credential pair and the backend payloads that mint it.

// self
use crate::{_prelude::*, auth::secret::TokenSecret};

/// Access/refresh credential pair owned by a [`CredentialStore`](crate::store::CredentialStore).
///
/// The pair is always written and cleared as a unit; a stored pair never carries
/// only one of its halves.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPair {
	/// Short-lived credential attached to every protected request.
	pub access_token: TokenSecret,
	/// Longer-lived credential used solely to mint new access tokens.
	pub refresh_token: TokenSecret,
}
impl CredentialPair {
	/// Creates a pair from raw token strings.
	pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
		Self {
			access_token: TokenSecret::new(access_token),
			refresh_token: TokenSecret::new(refresh_token),
		}
	}

	/// Returns a new pair carrying `access_token`, keeping the current refresh token unless the
	/// backend rotated it.
	pub fn rotate(&self, access_token: TokenSecret, refresh_token: Option<TokenSecret>) -> Self {
		Self {
			access_token,
			refresh_token: refresh_token.unwrap_or_else(|| self.refresh_token.clone()),
		}
	}
}
impl Debug for CredentialPair {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CredentialPair")
			.field("access_token", &"<redacted>")
			.field("refresh_token", &"<redacted>")
			.finish()
	}
}

/// Successful login payload returned by the backend.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
	/// Freshly minted access token.
	pub access_token: TokenSecret,
	/// Freshly minted refresh token.
	pub refresh_token: TokenSecret,
	/// Profile payload handed through to the presentation layer untouched.
	#[serde(default)]
	pub user: serde_json::Value,
}
impl LoginResponse {
	/// Extracts the credential pair to persist.
	pub fn credentials(&self) -> CredentialPair {
		CredentialPair {
			access_token: self.access_token.clone(),
			refresh_token: self.refresh_token.clone(),
		}
	}
}

/// Body returned by the refresh endpoint.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
	/// Backend status marker; `"success"` signals a usable access token.
	pub status: String,
	/// Replacement access token.
	#[serde(default)]
	pub access_token: Option<TokenSecret>,
	/// Rotated refresh token, when the backend issues one.
	#[serde(default)]
	pub refresh_token: Option<TokenSecret>,
}
impl RefreshResponse {
	/// Status value the backend uses for a successful exchange.
	pub const SUCCESS: &'static str = "success";

	/// Returns `true` when the backend reported a successful exchange.
	pub fn is_success(&self) -> bool {
		self.status.eq_ignore_ascii_case(Self::SUCCESS)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn rotate_keeps_refresh_token_unless_replaced() {
		let pair = CredentialPair::new("A1", "R1");
		let kept = pair.rotate(TokenSecret::new("A2"), None);

		assert_eq!(kept.access_token.expose(), "A2");
		assert_eq!(kept.refresh_token.expose(), "R1");

		let rotated = pair.rotate(TokenSecret::new("A3"), Some(TokenSecret::new("R2")));

		assert_eq!(rotated.access_token.expose(), "A3");
		assert_eq!(rotated.refresh_token.expose(), "R2");
	}

	#[test]
	fn credential_pair_debug_redacts_both_halves() {
		let rendered = format!("{:?}", CredentialPair::new("A1", "R1"));

		assert!(!rendered.contains("A1"));
		assert!(!rendered.contains("R1"));
	}

	#[test]
	fn login_response_reads_camel_case_payload() {
		let payload = r#"{"accessToken":"A1","refreshToken":"R1","user":{"id":7}}"#;
		let login: LoginResponse =
			serde_json::from_str(payload).expect("Login payload should deserialize.");
		let pair = login.credentials();

		assert_eq!(pair.access_token.expose(), "A1");
		assert_eq!(pair.refresh_token.expose(), "R1");
		assert_eq!(login.user["id"], 7);
	}

	#[test]
	fn refresh_response_status_check_is_case_insensitive() {
		let payload = r#"{"status":"SUCCESS","accessToken":"A2"}"#;
		let refresh: RefreshResponse =
			serde_json::from_str(payload).expect("Refresh payload should deserialize.");

		assert!(refresh.is_success());
		assert!(refresh.refresh_token.is_none());

		let failed: RefreshResponse = serde_json::from_str(r#"{"status":"fail"}"#)
			.expect("Failure payload should deserialize.");

		assert!(!failed.is_success());
		assert!(failed.access_token.is_none());
	}
}
