//! Application-owned registry of SASL mechanism factories.

// self
use crate::{
	_prelude::*,
	error::SaslError,
	sasl::{
		DhClient, DhServer, OAUTHBEARER, OAUTHBEARER_DH_PREFIX, OAUTHBEARER_DH4096,
		OAuthBearerClient, OAuthBearerServer, SaslClient, SaslServer, TicketSource, TokenVerifier,
		dh::KEY_BITS,
	},
};

/// Builds a client for one exchange.
pub type ClientFactory = Arc<dyn Fn(&ClientContext) -> Box<dyn SaslClient> + Send + Sync>;
/// Builds a server for one exchange.
pub type ServerFactory =
	Arc<dyn Fn(Arc<dyn TokenVerifier>) -> Box<dyn SaslServer> + Send + Sync>;

/// Inputs shared by client factories.
#[derive(Clone)]
pub struct ClientContext {
	/// Ticket source, usually a client identity.
	pub source: Arc<dyn TicketSource>,
	/// Identity URI of the server being contacted.
	pub target: String,
	/// Host announced in the `host` attribute.
	pub host: String,
	/// Authorization identity for the GS2 header.
	pub authzid: Option<String>,
}
impl ClientContext {
	fn plain_client(&self) -> OAuthBearerClient {
		let client = OAuthBearerClient::new(self.source.clone(), &self.target, &self.host);

		match &self.authzid {
			Some(authzid) => client.with_authorization_id(authzid),
			None => client,
		}
	}
}
impl Debug for ClientContext {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ClientContext")
			.field("source", &self.source.name())
			.field("target", &self.target)
			.field("host", &self.host)
			.field("authzid", &self.authzid)
			.finish()
	}
}

/// Mechanism named by a SASL mechanism string.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mechanism {
	/// `OAUTHBEARER`.
	OAuthBearer,
	/// `OAUTHBEARER-DH<bits>` with a supported modulus size.
	OAuthBearerDh {
		/// Modulus size in bits.
		bits: u32,
	},
}
impl Mechanism {
	/// Canonical mechanism name.
	pub fn name(self) -> &'static str {
		match self {
			Mechanism::OAuthBearer => OAUTHBEARER,
			Mechanism::OAuthBearerDh { .. } => OAUTHBEARER_DH4096,
		}
	}
}
impl FromStr for Mechanism {
	type Err = SaslError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		if s == OAUTHBEARER {
			return Ok(Mechanism::OAuthBearer);
		}

		let bits = s
			.strip_prefix(OAUTHBEARER_DH_PREFIX)
			.and_then(|bits| bits.parse::<u32>().ok())
			.ok_or_else(|| SaslError::UnknownMechanism { name: s.into() })?;

		if bits != KEY_BITS {
			return Err(SaslError::UnsupportedKeySize { bits });
		}

		Ok(Mechanism::OAuthBearerDh { bits })
	}
}

/// Mechanism name to factory map.
#[derive(Clone)]
pub struct MechanismRegistry {
	clients: BTreeMap<String, ClientFactory>,
	servers: BTreeMap<String, ServerFactory>,
}
impl MechanismRegistry {
	/// Creates an empty registry.
	pub fn empty() -> Self {
		Self { clients: BTreeMap::new(), servers: BTreeMap::new() }
	}

	/// Registers a client factory under `name`, replacing any previous one.
	pub fn register_client(&mut self, name: impl Into<String>, factory: ClientFactory) {
		self.clients.insert(name.into(), factory);
	}

	/// Registers a server factory under `name`, replacing any previous one.
	pub fn register_server(&mut self, name: impl Into<String>, factory: ServerFactory) {
		self.servers.insert(name.into(), factory);
	}

	/// Names with a client factory, sorted.
	pub fn client_mechanisms(&self) -> Vec<&str> {
		self.clients.keys().map(String::as_str).collect()
	}

	/// Names with a server factory, sorted.
	pub fn server_mechanisms(&self) -> Vec<&str> {
		self.servers.keys().map(String::as_str).collect()
	}

	/// Builds a client for `name`.
	pub fn client(&self, name: &str, context: &ClientContext) -> Result<Box<dyn SaslClient>> {
		match self.clients.get(name) {
			Some(factory) => Ok(factory(context)),
			None => Err(unavailable(name).into()),
		}
	}

	/// Builds a server for `name`.
	pub fn server(
		&self,
		name: &str,
		verifier: Arc<dyn TokenVerifier>,
	) -> Result<Box<dyn SaslServer>> {
		match self.servers.get(name) {
			Some(factory) => Ok(factory(verifier)),
			None => Err(unavailable(name).into()),
		}
	}
}
impl Default for MechanismRegistry {
	fn default() -> Self {
		let mut registry = Self::empty();

		registry.register_client(
			OAUTHBEARER,
			Arc::new(|context: &ClientContext| {
				Box::new(context.plain_client()) as Box<dyn SaslClient>
			}),
		);
		registry.register_client(
			OAUTHBEARER_DH4096,
			Arc::new(|context: &ClientContext| {
				Box::new(DhClient::new(context.plain_client())) as Box<dyn SaslClient>
			}),
		);
		registry.register_server(
			OAUTHBEARER,
			Arc::new(|verifier: Arc<dyn TokenVerifier>| {
				Box::new(OAuthBearerServer::new(verifier)) as Box<dyn SaslServer>
			}),
		);
		registry.register_server(
			OAUTHBEARER_DH4096,
			Arc::new(|verifier: Arc<dyn TokenVerifier>| {
				Box::new(DhServer::new(OAuthBearerServer::new(verifier))) as Box<dyn SaslServer>
			}),
		);

		registry
	}
}
impl Debug for MechanismRegistry {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("MechanismRegistry")
			.field("clients", &self.client_mechanisms())
			.field("servers", &self.server_mechanisms())
			.finish()
	}
}

fn unavailable(name: &str) -> SaslError {
	match name.parse::<Mechanism>() {
		Err(e) => e,
		Ok(_) => SaslError::UnknownMechanism { name: name.into() },
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::testing::{self, FixedTickets, IssuerVerifier};

	fn context() -> ClientContext {
		ClientContext {
			source: Arc::new(FixedTickets {
				token: testing::mint(testing::access_claims("svc")),
				fail: false,
			}),
			target: "oidc://api@idp.example.com".into(),
			host: "api.example.com".into(),
			authzid: Some("oidc://svc@idp.example.com".into()),
		}
	}

	#[test]
	fn mechanism_names_parse_strictly() {
		assert_eq!("OAUTHBEARER".parse::<Mechanism>(), Ok(Mechanism::OAuthBearer));
		assert_eq!(
			"OAUTHBEARER-DH4096".parse::<Mechanism>(),
			Ok(Mechanism::OAuthBearerDh { bits: 4096 })
		);
		assert_eq!(
			"OAUTHBEARER-DH2048".parse::<Mechanism>(),
			Err(SaslError::UnsupportedKeySize { bits: 2048 })
		);
		assert!(matches!(
			"OAUTHBEARER-DHX".parse::<Mechanism>(),
			Err(SaslError::UnknownMechanism { .. })
		));
		assert!(matches!("PLAIN".parse::<Mechanism>(), Err(SaslError::UnknownMechanism { .. })));
	}

	#[test]
	fn defaults_register_both_mechanisms() {
		let registry = MechanismRegistry::default();

		assert_eq!(registry.client_mechanisms(), ["OAUTHBEARER", "OAUTHBEARER-DH4096"]);
		assert_eq!(registry.server_mechanisms(), ["OAUTHBEARER", "OAUTHBEARER-DH4096"]);

		let verifier = Arc::new(IssuerVerifier::new(false));

		for name in [OAUTHBEARER, OAUTHBEARER_DH4096] {
			let client = registry.client(name, &context()).expect("Client should be built.");
			let server = registry.server(name, verifier.clone()).expect("Server should be built.");

			assert_eq!(client.mechanism(), name);
			assert_eq!(server.mechanism(), name);
		}
	}

	#[test]
	fn unregistered_names_fail_closed() {
		let registry = MechanismRegistry::default();
		let verifier: Arc<dyn TokenVerifier> = Arc::new(IssuerVerifier::new(false));

		assert!(matches!(
			registry.client("OAUTHBEARER-DH8192", &context()),
			Err(Error::Sasl(SaslError::UnsupportedKeySize { bits: 8192 }))
		));
		assert!(matches!(
			registry.server("SCRAM-SHA-256", verifier.clone()),
			Err(Error::Sasl(SaslError::UnknownMechanism { .. }))
		));
		assert!(matches!(
			MechanismRegistry::empty().server(OAUTHBEARER, verifier),
			Err(Error::Sasl(SaslError::UnknownMechanism { .. }))
		));
	}

	#[tokio::test]
	async fn registered_plain_pair_authenticates() {
		let registry = MechanismRegistry::default();
		let mut client = registry.client(OAUTHBEARER, &context()).expect("Client should be built.");
		let mut server = registry
			.server(OAUTHBEARER, Arc::new(IssuerVerifier::new(false)))
			.expect("Server should be built.");
		let response = client.evaluate_challenge(&[]).await.expect("Response should be produced.");

		assert!(response.starts_with(b"n,a=oidc://svc@idp.example.com,\x01"));
		assert!(
			server.evaluate_response(&response).await.expect("Response should verify.").is_empty()
		);
		assert!(server.is_complete());
	}
}
