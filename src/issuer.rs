//! Issuer metadata, endpoint resolution, and issuer/claims verification.
//!
//! Endpoints resolve with a fixed precedence: an explicitly configured endpoint wins over the
//! UMA2 discovery document, which wins over the OIDC discovery document. Discovery never
//! fails configuration by itself; a failed fetch is logged, recorded, and leaves the
//! endpoint unresolved for [`validate_config`](crate::client::validate_config) to report.

pub mod discovery;

pub use discovery::*;

// self
use crate::{
	_prelude::*,
	error::VerifyError,
	http::{HttpTransport, SharedTransport},
	jwks::SignatureVerifier,
	memo::PressureRegistry,
	token::{SignedToken, TokenClaims},
};

/// Tolerance applied to `exp` and `nbf` when checking claims.
pub const CLOCK_SKEW: Duration = Duration::seconds(60);

/// Issuer endpoints; any of them may be unresolved.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Endpoints {
	/// Token endpoint.
	pub token: Option<Url>,
	/// RFC 7662 introspection endpoint.
	pub introspection: Option<Url>,
	/// OIDC userinfo endpoint.
	pub userinfo: Option<Url>,
	/// JWKS endpoint.
	pub jwks: Option<Url>,
}
impl Endpoints {
	/// Fills every unresolved endpoint from `fallback`.
	pub fn or(self, fallback: Endpoints) -> Self {
		Self {
			token: self.token.or(fallback.token),
			introspection: self.introspection.or(fallback.introspection),
			userinfo: self.userinfo.or(fallback.userinfo),
			jwks: self.jwks.or(fallback.jwks),
		}
	}
}

/// Issuer identity plus the sources its endpoints are resolved from.
#[derive(Clone, Debug, Default)]
pub struct IssuerMetadata {
	issuer: String,
	overrides: Endpoints,
	uma2: Option<DiscoveryDocument>,
	oidc: Option<DiscoveryDocument>,
	failures: Vec<DiscoveryFailure>,
}
impl IssuerMetadata {
	/// Creates metadata for `issuer` with nothing resolved.
	pub fn new(issuer: impl Into<String>) -> Self {
		Self { issuer: issuer.into(), ..Default::default() }
	}

	/// Sets explicitly configured endpoints.
	pub fn with_overrides(mut self, overrides: Endpoints) -> Self {
		self.overrides = overrides;

		self
	}

	/// Issuer identifier compared verbatim against `iss` claims.
	pub fn issuer(&self) -> &str {
		&self.issuer
	}

	/// Host of the issuer URL.
	pub fn host(&self) -> Option<String> {
		Url::parse(&self.issuer).ok()?.host_str().map(str::to_owned)
	}

	/// Resolved endpoints: override, then UMA2 document, then OIDC document.
	pub fn endpoints(&self) -> Endpoints {
		let discovered = |document: &Option<DiscoveryDocument>| {
			document.as_ref().map(DiscoveryDocument::endpoints).unwrap_or_default()
		};

		self.overrides.clone().or(discovered(&self.uma2)).or(discovered(&self.oidc))
	}

	/// Fetched OIDC discovery document.
	pub fn oidc_document(&self) -> Option<&DiscoveryDocument> {
		self.oidc.as_ref()
	}

	/// Fetched UMA2 discovery document.
	pub fn uma2_document(&self) -> Option<&DiscoveryDocument> {
		self.uma2.as_ref()
	}

	/// Discovery failures recorded so far.
	pub fn failures(&self) -> &[DiscoveryFailure] {
		&self.failures
	}

	/// Fetches the OIDC document from `location`, or from the well-known path when `None`.
	///
	/// Returns `false` and records the cause when the fetch fails.
	pub async fn auto_configure_oidc(
		&mut self,
		transport: &dyn HttpTransport,
		location: Option<&Url>,
	) -> bool {
		self.auto_configure(transport, DiscoveryKind::Oidc, location).await
	}

	/// UMA2 counterpart of [`auto_configure_oidc`](Self::auto_configure_oidc).
	pub async fn auto_configure_uma2(
		&mut self,
		transport: &dyn HttpTransport,
		location: Option<&Url>,
	) -> bool {
		self.auto_configure(transport, DiscoveryKind::Uma2, location).await
	}

	async fn auto_configure(
		&mut self,
		transport: &dyn HttpTransport,
		kind: DiscoveryKind,
		location: Option<&Url>,
	) -> bool {
		let location = match location {
			Some(location) => location.clone(),
			None => match well_known_url(&self.issuer, kind) {
				Ok(location) => location,
				Err(e) => {
					self.record_failure(kind, None, &e);

					return false;
				},
			},
		};

		match discovery::fetch(transport, &location, kind, &self.issuer).await {
			Ok(document) => {
				tracing::debug!(%kind, %location, "Discovery document loaded.");

				match kind {
					DiscoveryKind::Oidc => self.oidc = Some(document),
					DiscoveryKind::Uma2 => self.uma2 = Some(document),
				}

				true
			},
			Err(e) => {
				self.record_failure(kind, Some(location), &e);

				false
			},
		}
	}

	fn record_failure(&mut self, kind: DiscoveryKind, location: Option<Url>, error: &Error) {
		tracing::warn!(
			%kind,
			location = location.as_ref().map(Url::as_str),
			error = %error,
			"Discovery failed; endpoints stay unresolved."
		);

		self.failures.push(DiscoveryFailure { kind, location, reason: error.to_string() });
	}
}

/// Issuer checks backed by the issuer's signature keys.
#[derive(Debug)]
pub struct Issuer {
	metadata: IssuerMetadata,
	signatures: Option<SignatureVerifier>,
}
impl Issuer {
	/// Creates the verifier; signature checks need a resolved JWKS endpoint.
	pub fn new(metadata: IssuerMetadata, transport: SharedTransport) -> Self {
		let signatures =
			metadata.endpoints().jwks.map(|jwks| SignatureVerifier::new(transport, jwks));

		Self { metadata, signatures }
	}

	/// Issuer metadata.
	pub fn metadata(&self) -> &IssuerMetadata {
		&self.metadata
	}

	/// Signature verifier, when a JWKS endpoint is resolved.
	pub fn signatures(&self) -> Option<&SignatureVerifier> {
		self.signatures.as_ref()
	}

	/// Registers the key set cache with `registry`.
	pub fn register(&self, registry: &PressureRegistry) {
		if let Some(signatures) = &self.signatures {
			signatures.register(registry);
		}
	}

	/// Checks issuer equality, that `iat` is not in the future, and the signature.
	pub async fn check(&self, token: &SignedToken) -> Result<(), VerifyError> {
		let claims = token.claims();

		if claims.iss.as_deref() != Some(self.metadata.issuer()) {
			return Err(VerifyError::IssuerMismatch {
				expected: self.metadata.issuer().into(),
				actual: claims.iss.clone().unwrap_or_else(|| "<none>".into()),
			});
		}

		match claims.issued_at() {
			Some(issued_at) if issued_at <= OffsetDateTime::now_utc() => (),
			_ => return Err(VerifyError::IssuedAt),
		}

		let signatures = self.signatures.as_ref().ok_or_else(|| VerifyError::KeySetUnavailable {
			reason: "no JWKS endpoint is resolved".into(),
		})?;

		signatures.check(token).await
	}

	/// Boolean form of [`check`](Self::check); never fails.
	pub async fn verify_issuer(&self, token: &SignedToken) -> bool {
		match self.check(token).await {
			Ok(()) => true,
			Err(e) => {
				tracing::debug!(error = %e, "Token rejected by issuer checks.");

				false
			},
		}
	}

	/// Forgets the cached key set.
	pub fn clear(&self) {
		if let Some(signatures) = &self.signatures {
			signatures.clear();
		}
	}
}

/// Standard claims check for inbound access tokens.
///
/// Requires `typ` to be `Bearer` and every claim in `required` to be present; `exp` and `nbf`
/// are enforced with [`CLOCK_SKEW`] when present, and an unreadable value rejects the token.
pub fn check_claims(
	claims: &TokenClaims,
	required: &[String],
	now: OffsetDateTime,
) -> Result<(), VerifyError> {
	match claims.typ.as_deref() {
		Some(typ) if typ.eq_ignore_ascii_case("Bearer") => (),
		other => {
			return Err(VerifyError::TokenType { actual: other.unwrap_or("<none>").into() });
		},
	}

	if let Some(missing) = required.iter().find(|claim| !claims.has_claim(claim)) {
		return Err(VerifyError::MissingClaim { claim: missing.clone() });
	}
	if claims.exp.is_some() {
		match claims.expires_at() {
			Some(expires_at) if now < expires_at + CLOCK_SKEW => (),
			_ => return Err(VerifyError::Expired),
		}
	}
	if claims.nbf.is_some() {
		match claims.not_before() {
			Some(not_before) if not_before - CLOCK_SKEW <= now => (),
			_ => return Err(VerifyError::NotYetValid),
		}
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	// crates.io
	use serde_json::json;
	// self
	use super::*;
	use crate::testing::{self, StubTransport};

	const IDP: &str = "https://idp.example.com";
	const JWKS: &str = "https://idp.example.com/certs";

	fn issuer() -> Issuer {
		let transport = Arc::new(StubTransport::default().route(JWKS, 200, testing::key_set()));
		let metadata = IssuerMetadata::new(IDP).with_overrides(Endpoints {
			jwks: Some(Url::parse(JWKS).expect("Static URL should parse.")),
			..Default::default()
		});

		Issuer::new(metadata, transport)
	}

	fn token(iss: &str, iat_offset: i64) -> SignedToken {
		SignedToken::parse(testing::mint(json!({
			"iss": iss,
			"iat": testing::now() + iat_offset,
			"exp": testing::now() + 300,
			"typ": "Bearer",
		})))
		.expect("Minted token should parse.")
	}

	#[tokio::test]
	async fn verify_issuer_checks_issuer_and_issued_at() {
		let issuer = issuer();

		assert!(issuer.verify_issuer(&token(IDP, -10)).await);
		assert!(!issuer.verify_issuer(&token("https://evil.example.com", -10)).await);
		assert!(!issuer.verify_issuer(&token(IDP, 10)).await);
	}

	#[tokio::test]
	async fn verification_is_repeatable() {
		let issuer = issuer();
		let token = token(IDP, -10);

		for _ in 0..3 {
			assert!(issuer.verify_issuer(&token).await);
		}
	}

	#[tokio::test]
	async fn missing_issued_at_fails_closed() {
		let issuer = issuer();
		let token = SignedToken::parse(testing::mint(json!({ "iss": IDP })))
			.expect("Minted token should parse.");

		assert!(matches!(issuer.check(&token).await, Err(VerifyError::IssuedAt)));
	}

	#[tokio::test]
	async fn unresolved_key_set_fails_closed() {
		let issuer = Issuer::new(IssuerMetadata::new(IDP), Arc::new(StubTransport::default()));

		assert!(matches!(
			issuer.check(&token(IDP, -10)).await,
			Err(VerifyError::KeySetUnavailable { .. })
		));
	}

	#[tokio::test]
	async fn endpoints_follow_precedence() {
		let transport = StubTransport::default()
			.route(
				"https://idp.example.com/.well-known/openid-configuration",
				200,
				json!({
					"issuer": IDP,
					"token_endpoint": "https://idp.example.com/oidc/token",
					"userinfo_endpoint": "https://idp.example.com/oidc/userinfo",
					"jwks_uri": "https://idp.example.com/oidc/certs",
				}),
			)
			.route(
				"https://idp.example.com/.well-known/uma2-configuration",
				200,
				json!({
					"issuer": IDP,
					"token_endpoint": "https://idp.example.com/uma/token",
					"introspection_endpoint": "https://idp.example.com/uma/introspect",
				}),
			);
		let mut metadata = IssuerMetadata::new(IDP).with_overrides(Endpoints {
			introspection: Some(Url::parse("https://override.example.com/introspect").expect(
				"Static URL should parse.",
			)),
			..Default::default()
		});

		assert!(metadata.auto_configure_oidc(&transport, None).await);
		assert!(metadata.auto_configure_uma2(&transport, None).await);

		let endpoints = metadata.endpoints();
		let url = |endpoint: Option<Url>| endpoint.map(String::from);

		assert_eq!(url(endpoints.token).as_deref(), Some("https://idp.example.com/uma/token"));
		assert_eq!(
			url(endpoints.introspection).as_deref(),
			Some("https://override.example.com/introspect")
		);
		assert_eq!(
			url(endpoints.userinfo).as_deref(),
			Some("https://idp.example.com/oidc/userinfo")
		);
		assert_eq!(url(endpoints.jwks).as_deref(), Some("https://idp.example.com/oidc/certs"));
	}

	#[tokio::test]
	async fn discovery_failures_are_recorded_not_raised() {
		let transport = StubTransport::default().route(
			"https://idp.example.com/.well-known/openid-configuration",
			200,
			json!({ "issuer": "https://other.example.com" }),
		);
		let mut metadata = IssuerMetadata::new(IDP);

		assert!(!metadata.auto_configure_oidc(&transport, None).await);
		assert!(!metadata.auto_configure_uma2(&transport, None).await);
		assert_eq!(metadata.failures().len(), 2);
		assert_eq!(metadata.endpoints(), Endpoints::default());
	}

	#[test]
	fn claims_check_enforces_type_presence_and_lifetime() {
		let now = OffsetDateTime::now_utc();
		let claims = |value| serde_json::from_value::<TokenClaims>(value).expect("Claims should decode.");
		let required = vec!["exp".to_owned()];
		let ts = now.unix_timestamp();

		assert!(check_claims(&claims(json!({ "typ": "Bearer", "exp": ts + 10 })), &required, now).is_ok());
		// Within the skew margin.
		assert!(check_claims(&claims(json!({ "typ": "Bearer", "exp": ts - 30 })), &required, now).is_ok());
		assert!(matches!(
			check_claims(&claims(json!({ "typ": "Bearer", "exp": ts - 120 })), &required, now),
			Err(VerifyError::Expired)
		));
		assert!(matches!(
			check_claims(&claims(json!({ "typ": "Bearer", "exp": "soon" })), &required, now),
			Err(VerifyError::Expired)
		));
		assert!(matches!(
			check_claims(&claims(json!({ "typ": "ID", "exp": ts + 10 })), &required, now),
			Err(VerifyError::TokenType { .. })
		));
		assert!(matches!(
			check_claims(&claims(json!({ "typ": "Bearer" })), &required, now),
			Err(VerifyError::MissingClaim { .. })
		));
		assert!(matches!(
			check_claims(
				&claims(json!({ "typ": "Bearer", "exp": ts + 600, "nbf": ts + 300 })),
				&required,
				now
			),
			Err(VerifyError::NotYetValid)
		));
	}
}
