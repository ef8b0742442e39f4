//! Crate-level error types shared by discovery, token renewal, verification, and SASL.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Temporary upstream failure; retry with backoff.
	#[error(transparent)]
	Transient(#[from] TransientError),
	/// Transport failure (DNS, TCP, TLS, timeouts).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Token verification failed where a verified token is required.
	#[error(transparent)]
	Verification(#[from] VerifyError),
	/// SASL exchange failure.
	#[error(transparent)]
	Sasl(#[from] SaslError),

	/// Requested scopes exceed what was granted.
	#[error("Token lacks the required scopes: {reason}.")]
	InsufficientScope {
		/// Provider-supplied reason string.
		reason: String,
	},
	/// Provider rejected the grant.
	#[error("Provider rejected the grant: {reason}.")]
	InvalidGrant {
		/// Provider-supplied reason string.
		reason: String,
	},
	/// Client authentication failed or credentials are malformed.
	#[error("Client authentication failed: {reason}.")]
	InvalidClient {
		/// Provider-supplied reason string.
		reason: String,
	},
	/// The configured credentials could not be used to authenticate.
	#[error("Authentication failed: {reason}.")]
	Authentication {
		/// Short description of the failing step.
		reason: String,
		/// Underlying failure, when one exists.
		#[source]
		source: Option<Box<Error>>,
	},
	/// Access target names neither a client id nor an `audience` parameter.
	#[error("Access target `{target}` is missing an audience.")]
	MissingAudience {
		/// Target URI as supplied by the caller.
		target: String,
	},
	/// Token endpoint answered successfully but the payload is unusable.
	#[error("Token endpoint response is malformed: {reason}.")]
	MalformedResponse {
		/// What was missing or wrong.
		reason: String,
	},
	/// Combination that is deliberately not implemented; fails closed.
	#[error("Unsupported: {what}.")]
	Unsupported {
		/// Description of the rejected combination.
		what: String,
	},
	/// Refresh failure shared by every caller waiting on the same refresh.
	#[error("Cached resource refresh failed: {0}")]
	Refresh(#[source] Arc<Error>),
}
impl Error {
	/// Wraps `source` as an [`Error::Authentication`] failure.
	pub fn authentication(reason: impl Into<String>, source: impl Into<Option<Error>>) -> Self {
		Self::Authentication { reason: reason.into(), source: source.into().map(Box::new) }
	}

	/// Builds an [`Error::Unsupported`] value.
	pub fn unsupported(what: impl Into<String>) -> Self {
		Self::Unsupported { what: what.into() }
	}
}

/// Configuration and validation failures detected before any network use.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// A required option is absent or empty.
	#[error("Option `{option}` is required; {remedy}.")]
	MissingOption {
		/// Option name as accepted by [`ClientOptions`](crate::client::ClientOptions).
		option: &'static str,
		/// Which option (usually a discovery switch) could supply it instead.
		remedy: &'static str,
	},
	/// An option holding a URL cannot be parsed.
	#[error("Option `{option}` is not a valid URL: {value}.")]
	InvalidUrl {
		/// Option name.
		option: &'static str,
		/// Rejected value.
		value: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// The convenience identity URI is unusable.
	#[error("Identity URI `{value}` is invalid: {reason}.")]
	InvalidIdentity {
		/// Rejected URI with credentials removed.
		value: String,
		/// Why the URI was rejected.
		reason: &'static str,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Temporary failure variants (safe to retry).
#[derive(Debug, ThisError)]
pub enum TransientError {
	/// Upstream returned an unexpected but non-fatal response.
	#[error("Endpoint returned an unexpected response: {message}.")]
	UnexpectedResponse {
		/// Summary of the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},
	/// Upstream responded with JSON that could not be parsed.
	#[error("Endpoint returned malformed JSON.")]
	ResponseParse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::error::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling {url}.")]
	Network {
		/// Endpoint being called.
		url: String,
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred during transport.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(url: &Url, src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { url: url.to_string(), source: Box::new(src) }
	}
}

/// Reasons a token fails verification.
#[derive(Debug, ThisError)]
pub enum VerifyError {
	/// Token is not a well-formed compact JWS.
	#[error("Token is malformed: {reason}.")]
	Malformed {
		/// What could not be parsed.
		reason: String,
	},
	/// Token issuer differs from the configured issuer.
	#[error("Token issuer `{actual}` does not match `{expected}`.")]
	IssuerMismatch {
		/// Configured issuer.
		expected: String,
		/// Issuer claimed by the token, or `<none>`.
		actual: String,
	},
	/// `iat` is missing, unreadable, or in the future.
	#[error("Token issued-at instant is missing or in the future.")]
	IssuedAt,
	/// `exp` has passed.
	#[error("Token has expired.")]
	Expired,
	/// `nbf` has not been reached yet.
	#[error("Token is not valid yet.")]
	NotYetValid,
	/// A configured required claim is absent.
	#[error("Token is missing the required claim `{claim}`.")]
	MissingClaim {
		/// Claim name.
		claim: String,
	},
	/// Token type claim is not `Bearer`.
	#[error("Token type `{actual}` is not Bearer.")]
	TokenType {
		/// Type found in the token, or `<none>`.
		actual: String,
	},
	/// Header declares no key id.
	#[error("Token header carries no key id.")]
	MissingKeyId,
	/// No signature key with the token's key id.
	#[error("No signature key matches key id `{kid}`.")]
	UnknownKey {
		/// Requested key id.
		kid: String,
	},
	/// Header algorithm is unknown or not accepted.
	#[error("Signing algorithm `{alg}` is not supported.")]
	UnsupportedAlgorithm {
		/// Declared algorithm.
		alg: String,
	},
	/// Key material does not belong to the token's algorithm family.
	#[error("Key `{kid}` cannot verify `{alg}` signatures.")]
	AlgorithmMismatch {
		/// Key id.
		kid: String,
		/// Declared algorithm.
		alg: String,
	},
	/// Key material could not be loaded.
	#[error("Key `{kid}` is unusable.")]
	KeyMaterial {
		/// Key id.
		kid: String,
		/// Loader failure.
		#[source]
		source: jsonwebtoken::errors::Error,
	},
	/// Signature does not validate.
	#[error("Token signature is invalid.")]
	Signature(#[source] jsonwebtoken::errors::Error),
	/// Key set could not be obtained.
	#[error("Signature keys are unavailable: {reason}.")]
	KeySetUnavailable {
		/// Rendered refresh failure.
		reason: String,
	},
	/// Introspection reported an inactive token.
	#[error("Token is not active according to the introspection endpoint.")]
	Inactive,
}

/// SASL state-machine and framing failures.
#[derive(Debug, PartialEq, Eq, ThisError)]
pub enum SaslError {
	/// The exchange already completed.
	#[error("SASL exchange is already complete.")]
	AlreadyComplete,
	/// The exchange has not completed yet.
	#[error("SASL exchange is not complete.")]
	NotComplete,
	/// A previous step failed; the session cannot continue.
	#[error("SASL exchange previously failed.")]
	Failed,
	/// The peer aborted the exchange.
	#[error("SASL exchange aborted by the client.")]
	Aborted,
	/// A challenge arrived that the current state cannot accept.
	#[error("Unexpected SASL challenge: {reason}.")]
	UnexpectedChallenge {
		/// Why the challenge was rejected.
		reason: &'static str,
	},
	/// Message bytes do not follow the OAUTHBEARER layout.
	#[error("Malformed OAUTHBEARER message: {reason}.")]
	Malformed {
		/// Which part is malformed.
		reason: &'static str,
	},
	/// Operation is not offered by this mechanism.
	#[error("SASL operation `{operation}` is not supported; only the `auth` QOP is offered.")]
	Unsupported {
		/// Operation name.
		operation: &'static str,
	},
	/// Mechanism name is not registered.
	#[error("Unknown SASL mechanism `{name}`.")]
	UnknownMechanism {
		/// Requested name.
		name: String,
	},
	/// DH mechanism with a key size other than 4096 bits.
	#[error("Diffie-Hellman key size {bits} is not supported.")]
	UnsupportedKeySize {
		/// Requested modulus size.
		bits: u32,
	},
	/// Peer public key is outside the valid range.
	#[error("Peer Diffie-Hellman public key is invalid.")]
	InvalidPublicKey,
	/// DH frame failed validation before decryption.
	#[error("Encrypted frame rejected: {reason}.")]
	Frame {
		/// Which length check failed.
		reason: &'static str,
	},
	/// AES-GCM sealing or opening failed.
	#[error("Encrypted frame could not be processed.")]
	Cipher,
}
