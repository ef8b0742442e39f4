//! Client configuration and its validation.

// self
use crate::{
	_prelude::*,
	client::uri::{IdentityScheme, IdentityUri},
	error::ConfigError,
	issuer::{Discovery, Endpoints, IssuerMetadata},
	token::TokenSecret,
};

/// Grant used for the client's own tokens unless configured otherwise.
pub const DEFAULT_GRANT_TYPE: &str = "client_credentials";

/// How inbound tokens are verified.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationMode {
	/// Issuer, signature, and claims are checked locally.
	#[default]
	Local,
	/// Local checks plus an RFC 7662 introspection call requiring `active: true`.
	Introspection,
}

/// Client options as supplied by the application.
///
/// Field names double as option names in configuration errors. The convenience `identity`
/// URI seeds client id, secret, grant type, scope, and issuer; every explicitly set field
/// overrides the value it seeded, and leftover URI query parameters become additional token
/// request parameters.
#[derive(Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientOptions {
	/// `oidc://` or `uma2://` identity URI.
	pub identity: Option<String>,
	/// Issuer identifier.
	pub issuer: Option<String>,
	/// Client id.
	pub client_id: Option<String>,
	/// Client secret.
	pub client_secret: Option<String>,
	/// Grant used for the client's own token.
	pub grant_type: Option<String>,
	/// Scope requested for the client's own token.
	pub scope: Option<String>,
	/// UMA capability; defaults to `true` for `uma2://` identities.
	pub uma: Option<bool>,
	/// OIDC discovery switch; enabled by default.
	pub oidc_discovery: Option<Discovery>,
	/// UMA2 discovery switch; enabled by default for UMA-capable clients.
	pub uma2_discovery: Option<Discovery>,
	/// Explicit token endpoint.
	pub token_endpoint: Option<Url>,
	/// Explicit introspection endpoint.
	pub introspection_endpoint: Option<Url>,
	/// Explicit userinfo endpoint.
	pub userinfo_endpoint: Option<Url>,
	/// Explicit JWKS endpoint.
	pub jwks_endpoint: Option<Url>,
	/// Inbound token verification mode.
	pub verification: VerificationMode,
	/// Claims inbound tokens must carry; defaults to `["exp"]`.
	pub required_claims: Option<Vec<String>>,
	/// Additional token request parameters.
	pub auth_params: Vec<(String, String)>,
}
impl ClientOptions {
	/// Options seeded from an identity URI.
	pub fn from_identity(identity: impl Into<String>) -> Self {
		Self { identity: Some(identity.into()), ..Default::default() }
	}

	/// Applies precedence rules and parses the identity URI.
	pub fn resolve(&self) -> Result<ResolvedConfig, ConfigError> {
		let uri = self.identity.as_deref().map(IdentityUri::parse).transpose()?;
		let scheme = uri.as_ref().map(|uri| uri.scheme).unwrap_or_default();
		let seeded = |name: &str| uri.as_ref().and_then(|uri| uri.param(name)).map(str::to_owned);
		let uma = self.uma.unwrap_or(scheme == IdentityScheme::Uma2);
		let mut auth_params = uri
			.as_ref()
			.map(|uri| {
				uri.params
					.iter()
					.filter(|(key, _)| key != "scope" && key != "grant_type")
					.cloned()
					.collect::<Vec<_>>()
			})
			.unwrap_or_default();

		for (key, value) in &self.auth_params {
			auth_params.retain(|(existing, _)| existing != key);
			auth_params.push((key.clone(), value.clone()));
		}

		Ok(ResolvedConfig {
			scheme,
			issuer: self.issuer.clone().or_else(|| uri.as_ref().and_then(IdentityUri::issuer)),
			client_id: self
				.client_id
				.clone()
				.or_else(|| uri.as_ref().and_then(|uri| uri.client_id.clone()))
				.unwrap_or_default(),
			client_secret: TokenSecret::new(
				self.client_secret
					.clone()
					.or_else(|| uri.as_ref().and_then(|uri| uri.client_secret.clone()))
					.unwrap_or_default(),
			),
			grant_type: self
				.grant_type
				.clone()
				.or_else(|| seeded("grant_type"))
				.unwrap_or_else(|| DEFAULT_GRANT_TYPE.into()),
			scope: self.scope.clone().or_else(|| seeded("scope")),
			uma,
			oidc_discovery: self.oidc_discovery.clone().unwrap_or_default(),
			uma2_discovery: self.uma2_discovery.clone().unwrap_or(Discovery::Enabled(uma)),
			endpoints: Endpoints {
				token: self.token_endpoint.clone(),
				introspection: self.introspection_endpoint.clone(),
				userinfo: self.userinfo_endpoint.clone(),
				jwks: self.jwks_endpoint.clone(),
			},
			verification: self.verification,
			required_claims: self.required_claims.clone().unwrap_or_else(|| vec!["exp".into()]),
			auth_params,
		})
	}
}
impl Debug for ClientOptions {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ClientOptions")
			.field("identity", &self.identity.as_ref().map(|_| "<redacted>"))
			.field("issuer", &self.issuer)
			.field("client_id", &self.client_id)
			.field("client_secret", &self.client_secret.as_ref().map(|_| "<redacted>"))
			.field("grant_type", &self.grant_type)
			.field("scope", &self.scope)
			.field("uma", &self.uma)
			.field("oidc_discovery", &self.oidc_discovery)
			.field("uma2_discovery", &self.uma2_discovery)
			.field("token_endpoint", &self.token_endpoint)
			.field("introspection_endpoint", &self.introspection_endpoint)
			.field("userinfo_endpoint", &self.userinfo_endpoint)
			.field("jwks_endpoint", &self.jwks_endpoint)
			.field("verification", &self.verification)
			.field("required_claims", &self.required_claims)
			.field("auth_params", &self.auth_params)
			.finish()
	}
}

/// Options after precedence has been applied.
#[derive(Clone, Debug)]
pub struct ResolvedConfig {
	/// Scheme of the identity this client presents.
	pub scheme: IdentityScheme,
	/// Issuer identifier.
	pub issuer: Option<String>,
	/// Client id; empty when unset.
	pub client_id: String,
	/// Client secret; empty when unset.
	pub client_secret: TokenSecret,
	/// Grant used for the client's own token.
	pub grant_type: String,
	/// Scope for the client's own token.
	pub scope: Option<String>,
	/// UMA capability.
	pub uma: bool,
	/// OIDC discovery switch.
	pub oidc_discovery: Discovery,
	/// UMA2 discovery switch.
	pub uma2_discovery: Discovery,
	/// Explicit endpoint overrides.
	pub endpoints: Endpoints,
	/// Inbound token verification mode.
	pub verification: VerificationMode,
	/// Claims inbound tokens must carry.
	pub required_claims: Vec<String>,
	/// Additional token request parameters.
	pub auth_params: Vec<(String, String)>,
}

/// Checks that `config` plus the resolved `metadata` can support a login.
///
/// Checks run in a fixed order and the first failure names the missing option together
/// with the discovery option that could have supplied it.
pub fn validate_config(config: &ResolvedConfig, metadata: &IssuerMetadata) -> Result<()> {
	let missing = |option: &'static str, remedy: &'static str| -> Result<()> {
		Err(ConfigError::MissingOption { option, remedy }.into())
	};

	if config.issuer.as_deref().is_none_or(str::is_empty) {
		return missing("issuer", "set it directly or through an `identity` URI");
	}
	if config.client_id.is_empty() {
		return missing("client_id", "set it directly or as the user of an `identity` URI");
	}
	if config.client_secret.expose().is_empty() {
		return missing(
			"client_secret",
			"set it directly or as the password of an `identity` URI",
		);
	}

	let endpoints = metadata.endpoints();

	if endpoints.token.is_none() {
		return missing(
			"token_endpoint",
			"set it directly or enable `oidc_discovery` or `uma2_discovery`",
		);
	}
	if endpoints.jwks.is_none() {
		return missing("jwks_endpoint", "set it directly or enable `oidc_discovery`");
	}
	if config.verification == VerificationMode::Introspection && endpoints.introspection.is_none()
	{
		return missing(
			"introspection_endpoint",
			"set it directly or enable `uma2_discovery` or `oidc_discovery`",
		);
	}

	Ok(())
}
