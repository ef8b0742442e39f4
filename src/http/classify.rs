//! Token-endpoint error classification.
//!
//! Prioritizes the structured OAuth fields (`error`, `error_description`), then falls back to
//! body text hints, and finally the HTTP status code.

// self
use crate::{_prelude::*, error::TransientError, http::HttpResponse};

const BODY_PREVIEW_LIMIT: usize = 256;

/// Canonical token-endpoint error categories.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenErrorKind {
	/// Provider rejected the grant.
	InvalidGrant,
	/// Client authentication failed.
	InvalidClient,
	/// Requested scopes exceed what the client may obtain.
	InsufficientScope,
	/// Failure is temporary and should be retried.
	Transient,
}

#[derive(Debug, Default, Deserialize)]
struct OAuthErrorBody {
	error: Option<String>,
	error_description: Option<String>,
}

/// Maps a non-2xx token-endpoint response into [`Error`].
pub fn classify_token_error(response: &HttpResponse) -> Error {
	let body = serde_json::from_slice::<OAuthErrorBody>(&response.body).unwrap_or_default();
	let preview = truncate_preview(response.text());
	let kind = classify_oauth_error(body.error.as_deref(), body.error_description.as_deref())
		.or_else(|| classify_body(Some(&preview)))
		.unwrap_or_else(|| classify_status(Some(response.status)));
	let reason = body
		.error_description
		.or(body.error)
		.filter(|reason| !reason.is_empty())
		.unwrap_or_else(|| format!("HTTP {}", response.status));

	match kind {
		TokenErrorKind::InvalidGrant => Error::InvalidGrant { reason },
		TokenErrorKind::InvalidClient => Error::InvalidClient { reason },
		TokenErrorKind::InsufficientScope => Error::InsufficientScope { reason },
		TokenErrorKind::Transient => TransientError::UnexpectedResponse {
			message: reason,
			status: Some(response.status),
			retry_after: response.retry_after,
		}
		.into(),
	}
}

fn truncate_preview(body: String) -> String {
	if body.chars().count() <= BODY_PREVIEW_LIMIT {
		return body;
	}

	let mut buf = body.chars().take(BODY_PREVIEW_LIMIT).collect::<String>();

	buf.push('…');

	buf
}

fn classify_oauth_error(
	oauth_error: Option<&str>,
	error_description: Option<&str>,
) -> Option<TokenErrorKind> {
	oauth_error
		.and_then(match_exact_value)
		.or_else(|| error_description.and_then(match_exact_value))
		.or_else(|| classify_body(error_description))
}

fn match_exact_value(value: &str) -> Option<TokenErrorKind> {
	if value.eq_ignore_ascii_case("invalid_grant") || value.eq_ignore_ascii_case("access_denied") {
		Some(TokenErrorKind::InvalidGrant)
	} else if value.eq_ignore_ascii_case("invalid_client")
		|| value.eq_ignore_ascii_case("unauthorized_client")
	{
		Some(TokenErrorKind::InvalidClient)
	} else if value.eq_ignore_ascii_case("invalid_scope")
		|| value.eq_ignore_ascii_case("insufficient_scope")
	{
		Some(TokenErrorKind::InsufficientScope)
	} else if value.eq_ignore_ascii_case("temporarily_unavailable")
		|| value.eq_ignore_ascii_case("server_error")
	{
		Some(TokenErrorKind::Transient)
	} else {
		None
	}
}

fn classify_body(body: Option<&str>) -> Option<TokenErrorKind> {
	let lowered = body?.to_ascii_lowercase();

	match lowered.as_str() {
		text if text.contains("invalid_grant") => Some(TokenErrorKind::InvalidGrant),
		text if text.contains("invalid_client") => Some(TokenErrorKind::InvalidClient),
		text if text.contains("insufficient_scope") || text.contains("invalid_scope") =>
			Some(TokenErrorKind::InsufficientScope),
		text if text.contains("temporarily_unavailable") || text.contains("retry") =>
			Some(TokenErrorKind::Transient),
		_ => None,
	}
}

fn classify_status(status: Option<u16>) -> TokenErrorKind {
	match status {
		Some(400 | 404 | 410) => TokenErrorKind::InvalidGrant,
		Some(401) => TokenErrorKind::InvalidClient,
		Some(403) => TokenErrorKind::InsufficientScope,
		_ => TokenErrorKind::Transient,
	}
}
