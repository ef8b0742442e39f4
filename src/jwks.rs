//! JWKS cache and per-algorithm signature verification.
//!
//! The key set is fetched through a reclaimable [`Renewer`] and filtered to signature keys.
//! It is refreshed when it holds no currently valid key or when its maximum age elapses, so
//! providers that rotate keys without publishing an expiry are still picked up.
//! Verification fails closed: a missing key id, an unknown key, an algorithm the key cannot
//! serve, or an unsupported algorithm all reject the token.

// crates.io
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, errors::ErrorKind};
use serde_json::Value;
// self
use crate::{
	_prelude::*,
	error::VerifyError,
	http::{self, SharedTransport},
	memo::{PressureRegistry, RefreshFuture},
	obs::FlowKind,
	renew::{Renewable, Renewer},
	token::SignedToken,
};

/// Default maximum age of a cached key set.
pub const KEY_SET_MAX_AGE: Duration = Duration::minutes(5);
/// Minimum age of the cached set before an unknown key id triggers a re-fetch.
pub const UNKNOWN_KEY_COOLDOWN: Duration = Duration::seconds(30);

/// JSON Web Key, limited to the members needed for signature verification.
#[derive(Clone, Deserialize, Serialize)]
pub struct Jwk {
	/// Key type (`oct`, `RSA`, `EC`, `OKP`).
	pub kty: String,
	/// Key id.
	#[serde(default)]
	pub kid: Option<String>,
	/// Algorithm the key is restricted to.
	#[serde(default)]
	pub alg: Option<String>,
	/// Intended use (`sig` or `enc`).
	#[serde(default, rename = "use")]
	pub key_use: Option<String>,
	/// RSA modulus.
	#[serde(default)]
	pub n: Option<String>,
	/// RSA exponent.
	#[serde(default)]
	pub e: Option<String>,
	/// Curve name for `EC` and `OKP` keys.
	#[serde(default)]
	pub crv: Option<String>,
	/// Curve x coordinate or Ed25519 public key.
	#[serde(default)]
	pub x: Option<String>,
	/// Curve y coordinate.
	#[serde(default)]
	pub y: Option<String>,
	/// Symmetric key material.
	#[serde(default)]
	pub k: Option<String>,
	/// Expiry as a NumericDate, when the provider publishes one.
	#[serde(default)]
	pub exp: Option<i64>,
}
impl Jwk {
	/// Returns `true` when the key carries no expiry or expires after `now`.
	pub fn is_valid_at(&self, now: OffsetDateTime) -> bool {
		self.exp.is_none_or(|exp| exp > now.unix_timestamp())
	}

	fn is_signature_key(&self) -> bool {
		self.key_use.as_deref().is_none_or(|key_use| key_use == "sig")
	}
}
impl Debug for Jwk {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Jwk")
			.field("kty", &self.kty)
			.field("kid", &self.kid)
			.field("alg", &self.alg)
			.field("use", &self.key_use)
			.field("crv", &self.crv)
			.field("exp", &self.exp)
			.finish_non_exhaustive()
	}
}

/// Signature keys published by an issuer.
#[derive(Clone, Debug)]
pub struct KeySet {
	keys: Vec<Jwk>,
}
impl KeySet {
	/// Parses a JWKS document, keeping signature keys and skipping entries that do not decode.
	///
	/// A document without any signature key is rejected so that it is never cached.
	pub fn from_json(document: &Value) -> Result<Self, VerifyError> {
		let entries = document.get("keys").and_then(Value::as_array).ok_or_else(|| {
			VerifyError::KeySetUnavailable { reason: "document has no `keys` array".into() }
		})?;
		let keys = entries
			.iter()
			.filter_map(|entry| match serde_json::from_value::<Jwk>(entry.clone()) {
				Ok(jwk) => Some(jwk),
				Err(e) => {
					tracing::warn!(error = %e, "Skipping undecodable JSON web key.");

					None
				},
			})
			.filter(Jwk::is_signature_key)
			.collect::<Vec<_>>();

		if keys.is_empty() {
			return Err(VerifyError::KeySetUnavailable { reason: "no signature keys".into() });
		}

		Ok(Self { keys })
	}

	/// All retained keys.
	pub fn keys(&self) -> &[Jwk] {
		&self.keys
	}

	/// Returns the key named `kid` if it is still valid at `now`.
	pub fn find(&self, kid: &str, now: OffsetDateTime) -> Option<&Jwk> {
		self.keys.iter().find(|jwk| jwk.kid.as_deref() == Some(kid) && jwk.is_valid_at(now))
	}

	/// Returns `true` when at least one key is valid at `now`.
	pub fn has_valid_key(&self, now: OffsetDateTime) -> bool {
		self.keys.iter().any(|jwk| jwk.is_valid_at(now))
	}
}

/// Fetches an issuer's key set.
pub struct KeySetResource {
	transport: SharedTransport,
	endpoint: Url,
}
impl KeySetResource {
	/// Creates a fetcher for `endpoint`.
	pub fn new(transport: SharedTransport, endpoint: Url) -> Self {
		Self { transport, endpoint }
	}

	/// JWKS endpoint.
	pub fn endpoint(&self) -> &Url {
		&self.endpoint
	}
}
impl Debug for KeySetResource {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("KeySetResource").field("endpoint", &self.endpoint.as_str()).finish()
	}
}
impl Renewable for KeySetResource {
	type Resource = KeySet;

	const KIND: FlowKind = FlowKind::KeySetRefresh;

	fn needs_refresh(&self, resource: &KeySet) -> bool {
		!resource.has_valid_key(OffsetDateTime::now_utc())
	}

	fn request_new(&self) -> RefreshFuture<'_, KeySet> {
		Box::pin(async move {
			let document = http::get_json::<Value>(self.transport.as_ref(), &self.endpoint).await?;
			let keys = KeySet::from_json(&document)?;

			tracing::debug!(endpoint = %self.endpoint, keys = keys.keys.len(), "Fetched key set.");

			Ok(keys)
		})
	}
}

/// Verifies token signatures against a cached issuer key set.
#[derive(Debug)]
pub struct SignatureVerifier {
	keys: Renewer<KeySetResource>,
}
impl SignatureVerifier {
	/// Creates a verifier whose key set expires after [`KEY_SET_MAX_AGE`].
	pub fn new(transport: SharedTransport, endpoint: Url) -> Self {
		Self::with_max_age(transport, endpoint, KEY_SET_MAX_AGE)
	}

	/// Creates a verifier with a custom key set maximum age.
	pub fn with_max_age(transport: SharedTransport, endpoint: Url, max_age: Duration) -> Self {
		Self { keys: Renewer::reclaimable(KeySetResource::new(transport, endpoint), max_age) }
	}

	/// JWKS endpoint.
	pub fn endpoint(&self) -> &Url {
		self.keys.resource().endpoint()
	}

	/// Lets `registry` drop the cached key set under memory pressure.
	pub fn register(&self, registry: &PressureRegistry) {
		registry.register(self.keys.cache());
	}

	/// Forgets the cached key set.
	pub fn clear(&self) {
		self.keys.clear();
	}

	/// Verifies the signature of `token`.
	pub async fn check(&self, token: &SignedToken) -> Result<(), VerifyError> {
		let header = token.header();
		let kid = header.kid.as_deref().ok_or(VerifyError::MissingKeyId)?;
		let alg = header
			.alg
			.parse::<Algorithm>()
			.map_err(|_| VerifyError::UnsupportedAlgorithm { alg: header.alg.clone() })?;
		let keys = self.key_set().await?;
		let now = OffsetDateTime::now_utc();
		let jwk = match keys.find(kid, now) {
			Some(jwk) => jwk.clone(),
			None if now - self.keys.cache().updated_at() >= UNKNOWN_KEY_COOLDOWN => {
				tracing::debug!(kid, "Unknown key id; re-fetching the key set.");

				let keys = self
					.keys
					.renew()
					.await
					.map_err(|e| VerifyError::KeySetUnavailable { reason: e.to_string() })?;

				keys.find(kid, now)
					.cloned()
					.ok_or_else(|| VerifyError::UnknownKey { kid: kid.into() })?
			},
			None => return Err(VerifyError::UnknownKey { kid: kid.into() }),
		};
		let key = decoding_key(&jwk, kid, alg)?;
		let mut validation = Validation::new(alg);

		// Claims are checked by the issuer with the crate's own skew rules.
		validation.validate_exp = false;
		validation.validate_nbf = false;
		validation.validate_aud = false;
		validation.required_spec_claims.clear();

		jsonwebtoken::decode::<Value>(token.raw(), &key, &validation)
			.map_err(VerifyError::Signature)?;

		Ok(())
	}

	/// Boolean form of [`check`](Self::check); failures are logged at debug level.
	pub async fn verify(&self, token: &SignedToken) -> bool {
		match self.check(token).await {
			Ok(()) => true,
			Err(e) => {
				tracing::debug!(error = %e, "Token signature rejected.");

				false
			},
		}
	}

	async fn key_set(&self) -> Result<Arc<KeySet>, VerifyError> {
		self.keys.get().await.map_err(|e| VerifyError::KeySetUnavailable { reason: e.to_string() })
	}
}

/// Builds the decoding key for `alg` from `jwk`, rejecting keys of another algorithm family.
pub fn decoding_key(jwk: &Jwk, kid: &str, alg: Algorithm) -> Result<DecodingKey, VerifyError> {
	let mismatch = || VerifyError::AlgorithmMismatch { kid: kid.into(), alg: format!("{alg:?}") };

	if jwk.alg.as_deref().is_some_and(|declared| declared.parse::<Algorithm>().ok() != Some(alg)) {
		return Err(mismatch());
	}

	match (alg, jwk.kty.as_str()) {
		(Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512, "oct") => {
			let secret = jwk.k.as_deref().ok_or_else(|| missing_material(kid))?;
			let secret = URL_SAFE_NO_PAD
				.decode(secret.trim_end_matches('='))
				.map_err(|_| missing_material(kid))?;

			Ok(DecodingKey::from_secret(&secret))
		},
		(
			Algorithm::RS256
			| Algorithm::RS384
			| Algorithm::RS512
			| Algorithm::PS256
			| Algorithm::PS384
			| Algorithm::PS512,
			"RSA",
		) => {
			let (Some(n), Some(e)) = (jwk.n.as_deref(), jwk.e.as_deref()) else {
				return Err(missing_material(kid));
			};

			DecodingKey::from_rsa_components(n, e).map_err(|e| key_material(kid, e))
		},
		(Algorithm::ES256, "EC") if jwk.crv.as_deref() == Some("P-256") => ec_key(jwk, kid),
		(Algorithm::ES384, "EC") if jwk.crv.as_deref() == Some("P-384") => ec_key(jwk, kid),
		(Algorithm::EdDSA, "OKP") if jwk.crv.as_deref() == Some("Ed25519") => {
			let x = jwk.x.as_deref().ok_or_else(|| missing_material(kid))?;

			DecodingKey::from_ed_components(x).map_err(|e| key_material(kid, e))
		},
		_ => Err(mismatch()),
	}
}

fn ec_key(jwk: &Jwk, kid: &str) -> Result<DecodingKey, VerifyError> {
	let (Some(x), Some(y)) = (jwk.x.as_deref(), jwk.y.as_deref()) else {
		return Err(missing_material(kid));
	};

	DecodingKey::from_ec_components(x, y).map_err(|e| key_material(kid, e))
}

fn key_material(kid: &str, source: jsonwebtoken::errors::Error) -> VerifyError {
	VerifyError::KeyMaterial { kid: kid.into(), source }
}

fn missing_material(kid: &str) -> VerifyError {
	key_material(kid, ErrorKind::InvalidKeyFormat.into())
}
