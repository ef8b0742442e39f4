//! Plain `OAUTHBEARER` client.

// self
use crate::{
	_prelude::*,
	error::SaslError,
	obs::{self, FlowKind},
	sasl::{BearerMessage, OAUTHBEARER, SaslClient, SaslFuture, TicketSource},
};

/// Progress of a plain client exchange.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClientState {
	/// Waiting for the initial empty challenge.
	Init,
	/// Ticket requested; a failed request leaves the client here.
	SentInitial,
	/// Initial response produced.
	Complete,
}

/// Client that answers the initial challenge with an access ticket for the target.
pub struct OAuthBearerClient {
	source: Arc<dyn TicketSource>,
	target: String,
	host: String,
	authzid: Option<String>,
	state: ClientState,
}
impl OAuthBearerClient {
	/// Creates a client requesting tickets for `target` and announcing `host`.
	pub fn new(
		source: Arc<dyn TicketSource>,
		target: impl Into<String>,
		host: impl Into<String>,
	) -> Self {
		Self {
			source,
			target: target.into(),
			host: host.into(),
			authzid: None,
			state: ClientState::Init,
		}
	}

	/// Sends `authzid` in the GS2 header.
	pub fn with_authorization_id(mut self, authzid: impl Into<String>) -> Self {
		self.authzid = Some(authzid.into());

		self
	}

	/// Current state.
	pub fn state(&self) -> ClientState {
		self.state
	}

	async fn initial_response(&mut self) -> Result<Vec<u8>> {
		self.state = ClientState::SentInitial;

		let ticket = self.source.request_ticket(&self.target).await?;
		let mut message = BearerMessage::new(ticket.token.raw()).with_host(self.host.clone());

		if let Some(authzid) = &self.authzid {
			message = message.with_authzid(authzid.clone());
		}

		self.state = ClientState::Complete;

		Ok(message.encode())
	}
}
impl Debug for OAuthBearerClient {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("OAuthBearerClient")
			.field("source", &self.source.name())
			.field("target", &self.target)
			.field("host", &self.host)
			.field("authzid", &self.authzid)
			.field("state", &self.state)
			.finish()
	}
}
impl SaslClient for OAuthBearerClient {
	fn mechanism(&self) -> &'static str {
		OAUTHBEARER
	}

	fn evaluate_challenge<'a>(&'a mut self, challenge: &'a [u8]) -> SaslFuture<'a, Vec<u8>> {
		Box::pin(obs::observe(FlowKind::Sasl, "evaluate_challenge", async move {
			match self.state {
				ClientState::Init if challenge.is_empty() => self.initial_response().await,
				ClientState::Init => Err(SaslError::UnexpectedChallenge {
					reason: "initial challenge must be empty",
				}
				.into()),
				ClientState::SentInitial => Err(SaslError::Failed.into()),
				ClientState::Complete => Err(SaslError::AlreadyComplete.into()),
			}
		}))
	}

	fn is_complete(&self) -> bool {
		self.state == ClientState::Complete
	}
}
