//! Session strategy hooks that classify backend responses.
//!
//! Implementations decide which responses count as authentication failures (the only
//! trigger for a refresh cycle) and how the refresh endpoint's reply is interpreted,
//! without tying the session to any particular HTTP client.

// self
use crate::{
	_prelude::*,
	auth::{RefreshResponse, TokenSecret},
	error::RefreshError,
	http::ApiResponse,
};

/// Strategy hook that lets backends customize failure detection.
///
/// Implementors are required to be `Send + Sync`. Override only what you need:
/// `interpret_refresh` defaults to the `{ status, accessToken }` contract.
pub trait SessionStrategy: Send + Sync {
	/// Classifies a completed response.
	fn classify_response(&self, response: &ApiResponse) -> ResponseClass;

	/// Extracts the replacement credential from a refresh endpoint reply.
	fn interpret_refresh(&self, response: &ApiResponse) -> Result<RefreshGrant, RefreshError> {
		interpret_refresh_response(response)
	}
}

/// Canonical response categories used by strategies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResponseClass {
	/// 2xx response.
	Success,
	/// Access credential missing, expired, or invalid.
	AuthFailure,
	/// Any other failure (validation, server error); passed through untouched.
	Other,
}

/// Credential material produced by a successful refresh exchange.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RefreshGrant {
	/// Replacement access token.
	pub access_token: TokenSecret,
	/// Rotated refresh token, if the backend issued one.
	pub refresh_token: Option<TokenSecret>,
}

/// Default strategy: HTTP 401 is the only authentication failure.
#[derive(Debug, Default)]
pub struct DefaultSessionStrategy;
impl Display for DefaultSessionStrategy {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("default-session-strategy")
	}
}
impl SessionStrategy for DefaultSessionStrategy {
	fn classify_response(&self, response: &ApiResponse) -> ResponseClass {
		match response.status {
			401 => ResponseClass::AuthFailure,
			_ if response.is_success() => ResponseClass::Success,
			_ => ResponseClass::Other,
		}
	}
}

/// Interprets a refresh reply following the `{ "status": "success", "accessToken": .. }`
/// contract.
pub fn interpret_refresh_response(response: &ApiResponse) -> Result<RefreshGrant, RefreshError> {
	if !response.is_success() {
		return Err(RefreshError::Rejected {
			status: Some(response.status),
			message: response.body_preview(),
		});
	}

	let body = response.json::<RefreshResponse>().map_err(|e| RefreshError::Rejected {
		status: Some(response.status),
		message: e.to_string(),
	})?;

	if !body.is_success() {
		return Err(RefreshError::Rejected {
			status: Some(response.status),
			message: format!("refresh status `{}`", body.status),
		});
	}

	let access_token = body.access_token.filter(|token| !token.is_blank()).ok_or_else(|| {
		RefreshError::Rejected {
			status: Some(response.status),
			message: "refresh response is missing accessToken".into(),
		}
	})?;

	Ok(RefreshGrant {
		access_token,
		refresh_token: body.refresh_token.filter(|token| !token.is_blank()),
	})
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn default_strategy_only_flags_401() {
		let strategy = DefaultSessionStrategy;

		assert_eq!(
			strategy.classify_response(&ApiResponse::new(401, "")),
			ResponseClass::AuthFailure
		);
		assert_eq!(strategy.classify_response(&ApiResponse::new(204, "")), ResponseClass::Success);
		assert_eq!(strategy.classify_response(&ApiResponse::new(403, "")), ResponseClass::Other);
		assert_eq!(strategy.classify_response(&ApiResponse::new(500, "")), ResponseClass::Other);
	}

	#[test]
	fn refresh_reply_requires_success_status_and_token() {
		let grant = interpret_refresh_response(&ApiResponse::new(
			200,
			r#"{"status":"success","accessToken":"A2"}"#,
		))
		.expect("Successful refresh reply should yield a grant.");

		assert_eq!(grant.access_token.expose(), "A2");
		assert!(grant.refresh_token.is_none());

		let err = interpret_refresh_response(&ApiResponse::new(200, r#"{"status":"fail"}"#))
			.expect_err("Non-success status marker must be rejected.");

		assert!(matches!(err, RefreshError::Rejected { status: Some(200), .. }));

		let err = interpret_refresh_response(&ApiResponse::new(
			200,
			r#"{"status":"success","accessToken":""}"#,
		))
		.expect_err("Blank access token must be rejected.");

		assert!(matches!(err, RefreshError::Rejected { .. }));
	}

	#[test]
	fn refresh_reply_http_failure_carries_status() {
		let err = interpret_refresh_response(&ApiResponse::new(403, "refresh token expired"))
			.expect_err("HTTP failure must be rejected.");

		assert_eq!(
			err,
			RefreshError::Rejected { status: Some(403), message: "refresh token expired".into() }
		);
	}

	#[test]
	fn custom_strategy_can_widen_auth_failures() {
		struct SessionTimeoutIsAuth;
		impl SessionStrategy for SessionTimeoutIsAuth {
			fn classify_response(&self, response: &ApiResponse) -> ResponseClass {
				match response.status {
					401 | 419 => ResponseClass::AuthFailure,
					_ => DefaultSessionStrategy.classify_response(response),
				}
			}
		}

		let strategy = SessionTimeoutIsAuth;

		assert_eq!(
			strategy.classify_response(&ApiResponse::new(419, "")),
			ResponseClass::AuthFailure
		);
		assert!(
			strategy
				.interpret_refresh(&ApiResponse::new(
					200,
					r#"{"status":"success","accessToken":"A9","refreshToken":"R9"}"#,
				))
				.expect("Default refresh interpretation should apply.")
				.refresh_token
				.is_some()
		);
	}
}
