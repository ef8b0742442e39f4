//! In-crate fixtures shared by unit tests.

// std
use std::sync::atomic::{AtomicUsize, Ordering};
// crates.io
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::{EncodingKey, Header};
use serde_json::{Value, json};
// self
use crate::{
	_prelude::*,
	client::AccessTicket,
	http::{HttpFuture, HttpRequest, HttpResponse, HttpTransport},
	issuer::{self, Endpoints, Issuer, IssuerMetadata},
	sasl::{TicketFuture, TicketSource, TokenVerifier, VerifyFuture},
	token::SignedToken,
};

pub const ISSUER: &str = "https://idp.example.com/realms/demo";
pub const KID: &str = "k1";
pub const SECRET: &[u8] = b"0123456789abcdef0123456789abcdef";
pub const JWKS_URL: &str = "https://idp.example.com/realms/demo/certs";

/// Transport answering from a fixed URL table and recording every request.
#[derive(Default)]
pub struct StubTransport {
	routes: Mutex<HashMap<String, HttpResponse>>,
	requests: Mutex<Vec<HttpRequest>>,
	calls: AtomicUsize,
}
impl StubTransport {
	pub fn route(self, url: &str, status: u16, body: Value) -> Self {
		self.routes.lock().insert(url.into(), HttpResponse::new(status, body.to_string()));

		self
	}

	pub fn replace(&self, url: &str, status: u16, body: Value) {
		self.routes.lock().insert(url.into(), HttpResponse::new(status, body.to_string()));
	}

	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}

	pub fn requests(&self) -> Vec<HttpRequest> {
		self.requests.lock().clone()
	}
}
impl HttpTransport for StubTransport {
	fn execute(&self, request: HttpRequest) -> HttpFuture<'_> {
		Box::pin(async move {
			self.calls.fetch_add(1, Ordering::SeqCst);

			let mut key = request.url.clone();

			key.set_query(None);

			let response = self
				.routes
				.lock()
				.get(key.as_str())
				.cloned()
				.unwrap_or_else(|| HttpResponse::new(404, "not found"));

			self.requests.lock().push(request);

			Ok(response)
		})
	}
}

pub fn oct_jwk(kid: &str, secret: &[u8]) -> Value {
	json!({ "kty": "oct", "kid": kid, "alg": "HS256", "use": "sig", "k": URL_SAFE_NO_PAD.encode(secret) })
}

pub fn key_set() -> Value {
	json!({ "keys": [oct_jwk(KID, SECRET)] })
}

pub fn now() -> i64 {
	OffsetDateTime::now_utc().unix_timestamp()
}

pub fn mint_with(kid: &str, secret: &[u8], claims: Value) -> String {
	let mut header = Header::new(jsonwebtoken::Algorithm::HS256);

	header.kid = Some(kid.into());

	jsonwebtoken::encode(&header, &claims, &EncodingKey::from_secret(secret))
		.expect("Test token should encode.")
}

pub fn mint(claims: Value) -> String {
	mint_with(KID, SECRET, claims)
}

/// Claims of a healthy access token issued to `azp`.
pub fn access_claims(azp: &str) -> Value {
	json!({
		"iss": ISSUER,
		"sub": "service-account",
		"azp": azp,
		"typ": "Bearer",
		"iat": now() - 10,
		"exp": now() + 300,
	})
}

/// Ticket source handing out a fixed token, or failing every request.
pub struct FixedTickets {
	pub token: String,
	pub fail: bool,
}
impl TicketSource for FixedTickets {
	fn name(&self) -> String {
		"oidc://svc@idp.example.com".into()
	}

	fn request_ticket<'a>(&'a self, target: &'a str) -> TicketFuture<'a> {
		Box::pin(async move {
			if self.fail {
				return Err(Error::MissingAudience { target: target.into() });
			}

			Ok(AccessTicket {
				from: self.name(),
				to: target.into(),
				grant_type: "client_credentials".into(),
				token: SignedToken::parse(self.token.clone())?,
			})
		})
	}
}

/// Verifier backed by a real [`Issuer`] over the stub key set.
pub struct IssuerVerifier {
	pub issuer: Issuer,
	pub uma: bool,
}
impl IssuerVerifier {
	pub fn new(uma: bool) -> Self {
		let transport = Arc::new(StubTransport::default().route(JWKS_URL, 200, key_set()));
		let metadata = IssuerMetadata::new(ISSUER).with_overrides(Endpoints {
			jwks: Some(Url::parse(JWKS_URL).expect("Static URL should parse.")),
			..Default::default()
		});

		Self { issuer: Issuer::new(metadata, transport), uma }
	}
}
impl TokenVerifier for IssuerVerifier {
	fn verify_token<'a>(&'a self, raw: &'a str) -> VerifyFuture<'a> {
		Box::pin(async move {
			let token = SignedToken::parse(raw)?;

			self.issuer.check(&token).await?;
			issuer::check_claims(token.claims(), &["exp".into()], OffsetDateTime::now_utc())?;

			Ok(token)
		})
	}

	fn is_uma_aware(&self) -> bool {
		self.uma
	}
}
