//! Identity provider mock shared by the integration tests.

#![allow(dead_code)]

// std
use std::sync::Arc;
// crates.io
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use httpmock::prelude::*;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde_json::{Value, json};
use time::OffsetDateTime;
// self
use oidc_sasl::{
	client::{ClientIdentity, ClientOptions},
	http::{ReqwestTransport, SharedTransport, TransportConfig},
};

pub const KID: &str = "it-key";
pub const SECRET: &[u8] = b"integration-secret-integration-0";
pub const REALM: &str = "/realms/demo";
pub const CLIENT_BASIC: &str = "Basic c3ZjOnNlY3JldA==";

/// Mock identity provider serving discovery, keys, and tokens for the client `svc`.
pub struct Idp {
	pub server: MockServer,
}
impl Idp {
	pub async fn start() -> Self {
		Self { server: MockServer::start_async().await }
	}

	pub fn issuer(&self) -> String {
		self.server.url(REALM)
	}

	pub fn identity(&self) -> String {
		format!("oidc://svc:secret@{}:{}{REALM}", self.server.host(), self.server.port())
	}

	pub fn options(&self) -> ClientOptions {
		ClientOptions {
			issuer: Some(self.issuer()),
			..ClientOptions::from_identity(self.identity())
		}
	}

	pub fn claims(&self, azp: &str) -> Value {
		let now = OffsetDateTime::now_utc().unix_timestamp();

		json!({
			"iss": self.issuer(),
			"sub": format!("service-account-{azp}"),
			"azp": azp,
			"typ": "Bearer",
			"iat": now - 10,
			"exp": now + 300,
		})
	}

	pub fn mint(&self, claims: &Value) -> String {
		let mut header = Header::new(Algorithm::HS256);

		header.kid = Some(KID.into());

		jsonwebtoken::encode(&header, claims, &EncodingKey::from_secret(SECRET))
			.expect("Integration token should encode.")
	}

	pub async fn mount_discovery(&self) {
		let document = json!({
			"issuer": self.issuer(),
			"token_endpoint": self.server.url(format!("{REALM}/protocol/openid-connect/token")),
			"jwks_uri": self.server.url(format!("{REALM}/protocol/openid-connect/certs")),
			"introspection_endpoint":
				self.server.url(format!("{REALM}/protocol/openid-connect/token/introspect")),
		});

		self.server
			.mock_async(|when, then| {
				when.method(GET).path(format!("{REALM}/.well-known/openid-configuration"));
				then.status(200).json_body(document);
			})
			.await;
	}

	pub async fn mount_keys(&self) {
		let keys = json!({
			"keys": [{
				"kty": "oct",
				"kid": KID,
				"alg": "HS256",
				"use": "sig",
				"k": URL_SAFE_NO_PAD.encode(SECRET),
			}],
		});

		self.server
			.mock_async(|when, then| {
				when.method(GET).path(format!("{REALM}/protocol/openid-connect/certs"));
				then.status(200).json_body(keys);
			})
			.await;
	}

	/// Serves the client's own token to Basic-authenticated requests and returns it.
	pub async fn mount_client_token(&self) -> String {
		let token = self.mint(&self.claims("svc"));
		let body = json!({ "access_token": token, "token_type": "Bearer", "expires_in": 300 });

		self.server
			.mock_async(|when, then| {
				when.method(POST)
					.path(format!("{REALM}/protocol/openid-connect/token"))
					.header("authorization", CLIENT_BASIC);
				then.status(200).json_body(body);
			})
			.await;

		token
	}

	/// Discovery, keys, and the client token in one call.
	pub async fn mount_all(&self) -> String {
		self.mount_discovery().await;
		self.mount_keys().await;

		self.mount_client_token().await
	}
}

pub fn transport() -> SharedTransport {
	Arc::new(
		ReqwestTransport::new(TransportConfig::default())
			.expect("Reqwest transport should build with default timeouts."),
	)
}

pub async fn identity(idp: &Idp) -> Arc<ClientIdentity> {
	Arc::new(
		ClientIdentity::configure(&idp.options(), transport())
			.await
			.expect("Identity should configure against the mock provider."),
	)
}
