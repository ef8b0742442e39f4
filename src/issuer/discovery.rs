//! OIDC and UMA2 discovery documents.

// self
use crate::{
	_prelude::*,
	error::{ConfigError, VerifyError},
	http::{self, HttpTransport},
	issuer::Endpoints,
	obs::{self, FlowKind},
};

/// Discovery document flavors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DiscoveryKind {
	/// `/.well-known/openid-configuration`
	Oidc,
	/// `/.well-known/uma2-configuration`
	Uma2,
}
impl DiscoveryKind {
	/// Well-known path suffix appended to the issuer.
	pub const fn well_known(self) -> &'static str {
		match self {
			DiscoveryKind::Oidc => ".well-known/openid-configuration",
			DiscoveryKind::Uma2 => ".well-known/uma2-configuration",
		}
	}

	/// Stable label for logs and spans.
	pub const fn as_str(self) -> &'static str {
		match self {
			DiscoveryKind::Oidc => "oidc",
			DiscoveryKind::Uma2 => "uma2",
		}
	}
}
impl Display for DiscoveryKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Discovery switch: enabled at the issuer's well-known location, disabled, or pinned to a URL.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Discovery {
	/// `true` fetches the document below the issuer; `false` skips discovery.
	Enabled(bool),
	/// Fetches the document from an explicit location.
	At(Url),
}
impl Discovery {
	/// Returns `true` unless discovery is switched off.
	pub fn is_enabled(&self) -> bool {
		!matches!(self, Discovery::Enabled(false))
	}

	/// Explicit document location, if one was configured.
	pub fn location(&self) -> Option<&Url> {
		match self {
			Discovery::At(url) => Some(url),
			Discovery::Enabled(_) => None,
		}
	}
}
impl Default for Discovery {
	fn default() -> Self {
		Discovery::Enabled(true)
	}
}

/// Subset of a discovery document used for endpoint resolution.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct DiscoveryDocument {
	/// Issuer identifier; must equal the configured issuer.
	pub issuer: String,
	/// Token endpoint.
	#[serde(default)]
	pub token_endpoint: Option<Url>,
	/// RFC 7662 introspection endpoint.
	#[serde(default)]
	pub introspection_endpoint: Option<Url>,
	/// OIDC userinfo endpoint.
	#[serde(default)]
	pub userinfo_endpoint: Option<Url>,
	/// JWKS endpoint.
	#[serde(default)]
	pub jwks_uri: Option<Url>,
	/// Advertised grant types.
	#[serde(default)]
	pub grant_types_supported: Vec<String>,
}
impl DiscoveryDocument {
	/// Endpoints published by the document.
	pub fn endpoints(&self) -> Endpoints {
		Endpoints {
			token: self.token_endpoint.clone(),
			introspection: self.introspection_endpoint.clone(),
			userinfo: self.userinfo_endpoint.clone(),
			jwks: self.jwks_uri.clone(),
		}
	}
}

/// Non-fatal discovery failure kept for diagnostics.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiscoveryFailure {
	/// Document flavor.
	pub kind: DiscoveryKind,
	/// Location that was tried, when one could be derived.
	pub location: Option<Url>,
	/// Rendered failure.
	pub reason: String,
}

/// Builds `<issuer>/<well-known suffix>`.
pub fn well_known_url(issuer: &str, kind: DiscoveryKind) -> Result<Url> {
	let value = format!("{}/{}", issuer.trim_end_matches('/'), kind.well_known());

	Url::parse(&value)
		.map_err(|source| ConfigError::InvalidUrl { option: "issuer", value, source }.into())
}

/// Fetches a discovery document and checks that it describes `expected_issuer`.
pub async fn fetch(
	transport: &dyn HttpTransport,
	location: &Url,
	kind: DiscoveryKind,
	expected_issuer: &str,
) -> Result<DiscoveryDocument> {
	obs::observe(FlowKind::Discovery, kind.as_str(), async {
		let document = http::get_json::<DiscoveryDocument>(transport, location).await?;

		if document.issuer != expected_issuer {
			return Err(VerifyError::IssuerMismatch {
				expected: expected_issuer.into(),
				actual: document.issuer,
			}
			.into());
		}

		Ok(document)
	})
	.await
}
