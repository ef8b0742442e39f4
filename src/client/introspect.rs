//! RFC 7662 token introspection.

// self
use crate::{
	_prelude::*,
	http::{self, HttpRequest, HttpTransport},
	token::TokenSecret,
};

/// Introspection response; only `active` is interpreted.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Introspection {
	/// Whether the token is currently active.
	#[serde(default)]
	pub active: bool,
	/// Granted scope.
	#[serde(default)]
	pub scope: Option<String>,
	/// Client the token was issued to.
	#[serde(default)]
	pub client_id: Option<String>,
	/// Subject.
	#[serde(default)]
	pub sub: Option<String>,
	/// Expiry as a NumericDate.
	#[serde(default)]
	pub exp: Option<i64>,
}

/// Asks `endpoint` about `token`, authenticating as the client.
pub async fn introspect(
	transport: &dyn HttpTransport,
	endpoint: &Url,
	client_id: &str,
	client_secret: &TokenSecret,
	token: &str,
) -> Result<Introspection> {
	let request = HttpRequest::post_form(
		endpoint.clone(),
		vec![
			("token".into(), token.into()),
			("token_type_hint".into(), "access_token".into()),
		],
	)
	.basic_auth(client_id, client_secret.expose());

	http::post_form(transport, request).await
}

#[cfg(test)]
mod tests {
	// crates.io
	use serde_json::json;
	// self
	use super::*;
	use crate::testing::StubTransport;

	const ENDPOINT: &str = "https://idp.example.com/introspect";

	#[tokio::test]
	async fn inactive_is_the_default() {
		let transport = StubTransport::default().route(ENDPOINT, 200, json!({}));
		let result = introspect(
			&transport,
			&Url::parse(ENDPOINT).expect("Static URL should parse."),
			"svc",
			&TokenSecret::new("secret"),
			"opaque",
		)
		.await
		.expect("Introspection should succeed.");

		assert!(!result.active);

		let sent = transport.requests().pop().expect("Introspection should be sent.");

		assert_eq!(sent.form_value("token"), Some("opaque"));
		assert_eq!(sent.form_value("token_type_hint"), Some("access_token"));
		assert!(sent.header("Authorization").is_some_and(|value| value.starts_with("Basic ")));
	}
}
