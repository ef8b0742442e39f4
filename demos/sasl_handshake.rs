//! Runs an `OAUTHBEARER-DH4096` exchange in-process with an application-supplied ticket source
//! and a shared-secret verifier plugged into the default mechanism registry.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde_json::{Value, json};
use time::OffsetDateTime;
// self
use oidc_sasl::{
	client::AccessTicket,
	error::VerifyError,
	issuer,
	sasl::{
		ClientContext, MechanismRegistry, OAUTHBEARER_DH4096, TicketFuture, TicketSource,
		TokenVerifier, VerifyFuture,
	},
	token::SignedToken,
};

const SECRET: &[u8] = b"demo-signing-secret-demo-signing";
const ISSUER: &str = "https://idp.example.com/realms/demo";

struct StaticTickets;
impl TicketSource for StaticTickets {
	fn name(&self) -> String {
		"oidc://orders@idp.example.com".into()
	}

	fn request_ticket<'a>(&'a self, target: &'a str) -> TicketFuture<'a> {
		Box::pin(async move {
			let now = OffsetDateTime::now_utc().unix_timestamp();
			let claims = json!({
				"iss": ISSUER,
				"azp": "orders",
				"typ": "Bearer",
				"iat": now,
				"exp": now + 300,
			});
			let raw = jsonwebtoken::encode(
				&Header::new(Algorithm::HS256),
				&claims,
				&EncodingKey::from_secret(SECRET),
			)
			.map_err(VerifyError::Signature)?;

			Ok(AccessTicket {
				from: self.name(),
				to: target.into(),
				grant_type: "client_credentials".into(),
				token: SignedToken::parse(raw)?,
			})
		})
	}
}

struct SharedSecretVerifier;
impl TokenVerifier for SharedSecretVerifier {
	fn verify_token<'a>(&'a self, raw: &'a str) -> VerifyFuture<'a> {
		Box::pin(async move {
			let mut validation = Validation::new(Algorithm::HS256);

			validation.validate_aud = false;
			validation.set_issuer(&[ISSUER]);
			jsonwebtoken::decode::<Value>(raw, &DecodingKey::from_secret(SECRET), &validation)
				.map_err(VerifyError::Signature)?;

			let token = SignedToken::parse(raw)?;

			issuer::check_claims(token.claims(), &["exp".into()], OffsetDateTime::now_utc())?;

			Ok(token)
		})
	}

	fn is_uma_aware(&self) -> bool {
		false
	}
}

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let registry = MechanismRegistry::default();
	let context = ClientContext {
		source: Arc::new(StaticTickets),
		target: "oidc://payments@idp.example.com".into(),
		host: "payments.example.com".into(),
		authzid: None,
	};
	let mut client = registry.client(OAUTHBEARER_DH4096, &context)?;
	let mut server = registry.server(OAUTHBEARER_DH4096, Arc::new(SharedSecretVerifier))?;
	let mut challenge = Vec::new();

	println!("Mechanisms offered: {:?}.", registry.server_mechanisms());

	while !client.is_complete() {
		let response = client.evaluate_challenge(&challenge).await?;

		println!("Client sent {} bytes.", response.len());

		challenge = server.evaluate_response(&response).await?;

		println!("Server answered with {} bytes.", challenge.len());
	}

	println!(
		"Authenticated `{}` with quality of protection `{}`.",
		server.authorization_id()?,
		server.negotiated_qop()
	);

	Ok(())
}
