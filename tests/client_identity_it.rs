mod common;

// crates.io
use httpmock::prelude::*;
use serde_json::json;
// self
use common::Idp;
use oidc_sasl::{
	client::{AccessTicket, ClientIdentity, ClientOptions, UMA_TICKET_GRANT},
	error::{ConfigError, Error},
	login::{IdentityLogin, Subject},
};

#[tokio::test]
async fn configure_discovers_and_confirms_credentials() {
	let idp = Idp::start().await;
	let own = idp.mount_all().await;
	let identity = common::identity(&idp).await;
	let endpoints = identity.issuer().metadata().endpoints();

	assert_eq!(
		endpoints.token.as_ref().map(|url| url.path()),
		Some("/realms/demo/protocol/openid-connect/token")
	);
	assert!(endpoints.jwks.is_some());
	assert_eq!(identity.name(), "oidc://svc@127.0.0.1");

	let token = identity.login_self().await.expect("Configured credentials should log in.");

	assert_eq!(token.raw(), own);
}

#[tokio::test]
async fn configure_names_the_missing_endpoint_when_discovery_fails() {
	let idp = Idp::start().await;
	let err = ClientIdentity::configure(&idp.options(), common::transport())
		.await
		.expect_err("Configuration without endpoints must fail.");

	assert!(matches!(
		err,
		Error::Config(ConfigError::MissingOption { option: "token_endpoint", .. })
	));
	assert!(err.to_string().contains("oidc_discovery"));
}

#[tokio::test]
async fn jwks_endpoint_is_mandatory() {
	let idp = Idp::start().await;
	let token_endpoint = idp.server.url("/realms/demo/protocol/openid-connect/token");
	let options = ClientOptions {
		oidc_discovery: Some(oidc_sasl::issuer::Discovery::Enabled(false)),
		token_endpoint: Some(token_endpoint.parse().expect("Mock URL should parse.")),
		..idp.options()
	};
	let err = ClientIdentity::configure(&options, common::transport())
		.await
		.expect_err("Configuration without a key set must fail.");

	assert!(matches!(
		err,
		Error::Config(ConfigError::MissingOption { option: "jwks_endpoint", .. })
	));
}

#[tokio::test]
async fn inbound_tokens_are_verified_against_the_key_set() {
	let idp = Idp::start().await;

	idp.mount_all().await;

	let identity = common::identity(&idp).await;
	let peer = idp.mint(&idp.claims("peer"));
	let mut foreign = idp.claims("peer");

	foreign["iss"] = json!("http://rogue.example.com/realms/demo");

	assert!(identity.verify(&peer).await);
	assert!(!identity.verify(&idp.mint(&foreign)).await);
	assert!(!identity.verify("a.b.c").await);
}

#[tokio::test]
async fn request_access_presents_the_client_token() {
	let idp = Idp::start().await;
	let own = idp.mount_all().await;
	let issued = idp.mint(&idp.claims("svc"));
	let body = json!({ "access_token": issued, "token_type": "Bearer" });
	let access_mock = idp
		.server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/realms/demo/protocol/openid-connect/token")
				.header("authorization", format!("Bearer {own}"));
			then.status(200).json_body(body);
		})
		.await;
	let identity = common::identity(&idp).await;
	let AccessTicket { grant_type, token, to, .. } = identity
		.request_access(&identity.name(), "oidc://kafka@127.0.0.1?scope=produce")
		.await
		.expect("Access ticket should be issued.");

	assert_eq!(grant_type, "client_credentials");
	assert_ne!(grant_type, UMA_TICKET_GRANT);
	assert_eq!(token.raw(), issued);
	assert_eq!(to, "oidc://kafka@127.0.0.1?scope=produce");

	access_mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn missing_audience_sends_nothing() {
	let idp = Idp::start().await;

	idp.mount_discovery().await;

	let catch_all = idp
		.server
		.mock_async(|when, then| {
			when.method(POST);
			then.status(500);
		})
		.await;
	let identity = common::identity(&idp).await;
	let err = identity
		.request_access(&identity.name(), "oidc://127.0.0.1?scope=produce")
		.await
		.expect_err("Targets without an audience must be rejected.");

	assert!(matches!(err, Error::MissingAudience { .. }));

	catch_all.assert_calls_async(0).await;
}

#[tokio::test]
async fn identity_login_attaches_the_client_principal() {
	let idp = Idp::start().await;

	idp.mount_all().await;

	let login = IdentityLogin::new(common::identity(&idp).await);
	let subject = Subject::new();
	let principal = login.login(&subject).await.expect("Login should succeed.");

	assert_eq!(principal.name, "oidc://svc@127.0.0.1");
	assert_eq!(subject.principals().len(), 1);

	login.logout(&subject);

	assert!(subject.is_empty());
}
