//! Plain `OAUTHBEARER` server.
//!
//! Identity comes only from the verified token; the `host` attribute and the GS2 authzid
//! are never trusted. Any rejection answers [`INVALID_TOKEN`] and leaves the exchange
//! incomplete, after which only the client's abort marker is expected.

// self
use crate::{
	_prelude::*,
	error::{SaslError, VerifyError},
	obs::{self, FlowKind},
	sasl::{
		ABORT, BearerMessage, INVALID_TOKEN, OAUTHBEARER, SaslFuture, SaslServer, TokenVerifier,
	},
	token::SignedToken,
};

/// Progress of a server exchange.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ServerState {
	/// Waiting for the client response.
	AwaitResponse,
	/// Token verified.
	Complete,
	/// Token rejected or exchange aborted.
	Failed,
}

/// Server that accepts a client response carrying a verifiable bearer token.
pub struct OAuthBearerServer {
	verifier: Arc<dyn TokenVerifier>,
	state: ServerState,
	token: Option<SignedToken>,
}
impl OAuthBearerServer {
	/// Creates a server verifying tokens through `verifier`.
	pub fn new(verifier: Arc<dyn TokenVerifier>) -> Self {
		Self { verifier, state: ServerState::AwaitResponse, token: None }
	}

	/// Current state.
	pub fn state(&self) -> ServerState {
		self.state
	}

	async fn accept(&mut self, response: &[u8]) -> Result<Vec<u8>> {
		if response == ABORT {
			self.state = ServerState::Failed;

			return Err(SaslError::Aborted.into());
		}

		match self.state {
			ServerState::AwaitResponse => (),
			ServerState::Complete => return Err(SaslError::AlreadyComplete.into()),
			ServerState::Failed => return Err(SaslError::Failed.into()),
		}

		let verified = match BearerMessage::parse(response) {
			Ok(message) => self.verifier.verify_token(&message.token).await,
			Err(e) => Err(e.into()),
		};

		match verified {
			Ok(token) => {
				self.token = Some(token);
				self.state = ServerState::Complete;

				Ok(Vec::new())
			},
			Err(e) => {
				tracing::debug!(error = %e, "OAUTHBEARER response rejected.");

				self.state = ServerState::Failed;

				Ok(INVALID_TOKEN.to_vec())
			},
		}
	}
}
impl Debug for OAuthBearerServer {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("OAuthBearerServer")
			.field("state", &self.state)
			.field("uma_aware", &self.verifier.is_uma_aware())
			.finish_non_exhaustive()
	}
}
impl SaslServer for OAuthBearerServer {
	fn mechanism(&self) -> &'static str {
		OAUTHBEARER
	}

	fn evaluate_response<'a>(&'a mut self, response: &'a [u8]) -> SaslFuture<'a, Vec<u8>> {
		Box::pin(obs::observe(FlowKind::Sasl, "evaluate_response", self.accept(response)))
	}

	fn is_complete(&self) -> bool {
		self.state == ServerState::Complete
	}

	fn authorization_id(&self) -> Result<String> {
		let token = self.token.as_ref().ok_or(SaslError::NotComplete)?;

		token
			.authorization_id(self.verifier.is_uma_aware())
			.ok_or_else(|| VerifyError::MissingClaim { claim: "azp".into() }.into())
	}

	fn verified_token(&self) -> Option<&SignedToken> {
		self.token.as_ref()
	}
}
