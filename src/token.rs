//! Signed bearer tokens (compact JWS) and their claims.
//!
//! Parsing only decodes the header and claims; nothing here checks a signature. Use
//! [`Issuer::check`](crate::issuer::Issuer::check) for that.

pub mod secret;

pub use secret::*;

// crates.io
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use serde_json::Value;
// self
use crate::{_prelude::*, error::VerifyError};

/// Decoded JOSE header.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct TokenHeader {
	/// Declared signing algorithm.
	pub alg: String,
	/// Key id selecting the verification key.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub kid: Option<String>,
	/// Media type, usually `JWT`.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub typ: Option<String>,
}

/// `aud` claim, which may be a single string or an array.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Audience {
	/// Single audience.
	One(String),
	/// Several audiences.
	Many(Vec<String>),
}
impl Audience {
	/// Returns `true` when `audience` is listed.
	pub fn contains(&self, audience: &str) -> bool {
		match self {
			Audience::One(one) => one == audience,
			Audience::Many(many) => many.iter().any(|candidate| candidate == audience),
		}
	}
}

/// Claims carried by an access token.
///
/// Time claims are kept as raw JSON so that an unparseable value can be told apart from an
/// absent one; use the accessor methods to read them as instants.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct TokenClaims {
	/// Issuer.
	#[serde(default)]
	pub iss: Option<String>,
	/// Subject.
	#[serde(default)]
	pub sub: Option<String>,
	/// Audience.
	#[serde(default)]
	pub aud: Option<Audience>,
	/// Expiry as a NumericDate.
	#[serde(default)]
	pub exp: Option<Value>,
	/// Issued-at as a NumericDate.
	#[serde(default)]
	pub iat: Option<Value>,
	/// Not-before as a NumericDate.
	#[serde(default)]
	pub nbf: Option<Value>,
	/// Authorized party; the client the token was issued to.
	#[serde(default)]
	pub azp: Option<String>,
	/// Token type, `Bearer` for access tokens.
	#[serde(default)]
	pub typ: Option<String>,
	/// Space-delimited granted scopes.
	#[serde(default)]
	pub scope: Option<String>,
	/// Flat role list, when the provider emits one.
	#[serde(default)]
	pub roles: Option<Vec<String>>,
	/// Group memberships.
	#[serde(default)]
	pub groups: Option<Vec<String>>,
	/// UMA authorization (RPT permissions).
	#[serde(default)]
	pub authorization: Option<Value>,
	/// Every other claim.
	#[serde(flatten)]
	pub extra: BTreeMap<String, Value>,
}
impl TokenClaims {
	/// Parsed `exp`, or `None` when absent or unparseable.
	pub fn expires_at(&self) -> Option<OffsetDateTime> {
		numeric_date(self.exp.as_ref())
	}

	/// Parsed `iat`, or `None` when absent or unparseable.
	pub fn issued_at(&self) -> Option<OffsetDateTime> {
		numeric_date(self.iat.as_ref())
	}

	/// Parsed `nbf`, or `None` when absent or unparseable.
	pub fn not_before(&self) -> Option<OffsetDateTime> {
		numeric_date(self.nbf.as_ref())
	}

	/// Granted scopes split on whitespace.
	pub fn scopes(&self) -> Vec<&str> {
		self.scope.as_deref().map(|scope| scope.split_whitespace().collect()).unwrap_or_default()
	}

	/// Roles from the flat `roles` claim, falling back to `realm_access.roles`.
	pub fn roles(&self) -> Vec<&str> {
		if let Some(roles) = &self.roles {
			return roles.iter().map(String::as_str).collect();
		}

		self.extra
			.get("realm_access")
			.and_then(|access| access.get("roles"))
			.and_then(Value::as_array)
			.map(|roles| roles.iter().filter_map(Value::as_str).collect())
			.unwrap_or_default()
	}

	/// Returns `true` when the claim named `name` is present.
	pub fn has_claim(&self, name: &str) -> bool {
		match name {
			"iss" => self.iss.is_some(),
			"sub" => self.sub.is_some(),
			"aud" => self.aud.is_some(),
			"exp" => self.exp.is_some(),
			"iat" => self.iat.is_some(),
			"nbf" => self.nbf.is_some(),
			"azp" => self.azp.is_some(),
			"typ" => self.typ.is_some(),
			"scope" => self.scope.is_some(),
			"roles" => self.roles.is_some(),
			"groups" => self.groups.is_some(),
			"authorization" => self.authorization.is_some(),
			other => self.extra.contains_key(other),
		}
	}
}

/// Compact JWS access token with decoded header and claims.
#[derive(Clone, Debug)]
pub struct SignedToken {
	raw: TokenSecret,
	header: TokenHeader,
	claims: TokenClaims,
}
impl SignedToken {
	/// Decodes a compact JWS without verifying its signature.
	pub fn parse(raw: impl Into<String>) -> Result<Self, VerifyError> {
		let raw = raw.into();
		let mut segments = raw.split('.');
		let (Some(header), Some(claims), Some(_signature), None) =
			(segments.next(), segments.next(), segments.next(), segments.next())
		else {
			return Err(VerifyError::Malformed { reason: "expected three dot-separated segments".into() });
		};
		let header = decode_segment::<TokenHeader>(header, "header")?;
		let claims = decode_segment::<TokenClaims>(claims, "claims")?;

		Ok(Self { raw: TokenSecret::new(raw), header, claims })
	}

	/// Compact serialization. Callers must avoid logging it.
	pub fn raw(&self) -> &str {
		self.raw.expose()
	}

	/// Decoded header.
	pub fn header(&self) -> &TokenHeader {
		&self.header
	}

	/// Decoded claims.
	pub fn claims(&self) -> &TokenClaims {
		&self.claims
	}

	/// Authorization id `<scheme>://<azp>@<issuer host>`.
	///
	/// The scheme is `uma2` when `uma_aware` is set and the token carries an `authorization`
	/// claim, otherwise `oidc`. Returns `None` when `azp` or a parseable issuer is missing.
	pub fn authorization_id(&self, uma_aware: bool) -> Option<String> {
		let azp = self.claims.azp.as_deref()?;
		let issuer = Url::parse(self.claims.iss.as_deref()?).ok()?;
		let host = issuer.host_str()?;
		let scheme = if uma_aware && self.claims.authorization.is_some() { "uma2" } else { "oidc" };

		Some(format!("{scheme}://{azp}@{host}"))
	}
}

fn decode_segment<T>(segment: &str, part: &str) -> Result<T, VerifyError>
where
	T: serde::de::DeserializeOwned,
{
	let bytes = URL_SAFE_NO_PAD
		.decode(segment.trim_end_matches('='))
		.map_err(|e| VerifyError::Malformed { reason: format!("{part} is not base64url: {e}") })?;

	serde_json::from_slice(&bytes)
		.map_err(|e| VerifyError::Malformed { reason: format!("{part} is not valid JSON: {e}") })
}

fn numeric_date(value: Option<&Value>) -> Option<OffsetDateTime> {
	let seconds = match value? {
		Value::Number(number) => number.as_i64().or_else(|| number.as_f64().map(|f| f as i64))?,
		_ => return None,
	};

	OffsetDateTime::from_unix_timestamp(seconds).ok()
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn encode(value: serde_json::Value) -> String {
		URL_SAFE_NO_PAD.encode(value.to_string())
	}

	fn token(claims: serde_json::Value) -> String {
		format!(
			"{}.{}.c2ln",
			encode(serde_json::json!({ "alg": "HS256", "kid": "k1", "typ": "JWT" })),
			encode(claims)
		)
	}

	#[test]
	fn parse_decodes_header_and_claims() {
		let token = SignedToken::parse(token(serde_json::json!({
			"iss": "https://idp.example.com/realms/demo",
			"azp": "clientA",
			"exp": 1_700_000_000,
			"iat": 1_699_999_000.5,
			"scope": "openid roles",
			"realm_access": { "roles": ["admin", "user"] },
		})))
		.expect("Well-formed token should parse.");

		assert_eq!(token.header().kid.as_deref(), Some("k1"));
		assert_eq!(token.claims().scopes(), ["openid", "roles"]);
		assert_eq!(token.claims().roles(), ["admin", "user"]);
		assert_eq!(
			token.claims().expires_at().map(OffsetDateTime::unix_timestamp),
			Some(1_700_000_000)
		);
		assert_eq!(
			token.claims().issued_at().map(OffsetDateTime::unix_timestamp),
			Some(1_699_999_000)
		);
		assert!(token.claims().has_claim("realm_access"));
		assert!(!token.claims().has_claim("nbf"));
	}

	#[test]
	fn unparseable_expiry_reads_as_absent() {
		let token = SignedToken::parse(token(serde_json::json!({ "exp": "tomorrow" })))
			.expect("Token with a string expiry should still parse.");

		assert!(token.claims().has_claim("exp"));
		assert!(token.claims().expires_at().is_none());
	}

	#[test]
	fn malformed_tokens_are_rejected() {
		for raw in ["", "a.b", "a.b.c.d", "!!!.e30.c2ln"] {
			assert!(
				matches!(SignedToken::parse(raw), Err(VerifyError::Malformed { .. })),
				"Token {raw:?} should be rejected."
			);
		}
	}

	#[test]
	fn authorization_id_prefers_uma_for_rpts() {
		let plain = SignedToken::parse(token(serde_json::json!({
			"iss": "https://idp.example.com/realms/demo",
			"azp": "svc",
		})))
		.expect("Token should parse.");
		let rpt = SignedToken::parse(token(serde_json::json!({
			"iss": "https://idp.example.com/realms/demo",
			"azp": "svc",
			"authorization": { "permissions": [] },
		})))
		.expect("Token should parse.");

		assert_eq!(plain.authorization_id(true).as_deref(), Some("oidc://svc@idp.example.com"));
		assert_eq!(rpt.authorization_id(true).as_deref(), Some("uma2://svc@idp.example.com"));
		assert_eq!(rpt.authorization_id(false).as_deref(), Some("oidc://svc@idp.example.com"));
	}

	#[test]
	fn debug_redacts_raw_token() {
		let raw = token(serde_json::json!({ "sub": "someone" }));
		let token = SignedToken::parse(raw.clone()).expect("Token should parse.");

		assert!(!format!("{token:?}").contains(&raw));
	}
}
