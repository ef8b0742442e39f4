//! `OAUTHBEARER-DH4096`: the plain exchange carried inside AES-GCM frames.
//!
//! The client opens with its public value; the server answers with its own. Both sides take
//! the first 16 bytes of the padded shared secret as the AES-128 key, and every later message
//! travels as an encrypted frame. An empty server challenge stays empty on the wire.

pub mod exchange;
pub mod frame;

pub use exchange::{DhKeyPair, DhSession, KEY_BITS};

// self
use crate::{
	_prelude::*,
	error::SaslError,
	obs::{self, FlowKind},
	sasl::{
		OAUTHBEARER_DH4096, OAuthBearerClient, OAuthBearerServer, SaslClient, SaslFuture,
		SaslServer,
	},
	token::SignedToken,
};

/// Progress of a DH client exchange.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DhClientState {
	/// Waiting for the initial empty challenge.
	Init,
	/// Own public value sent.
	AwaitServerKey,
	/// Session key agreed; frames are exchanged.
	KeyExchanged,
	/// Wrapped client finished.
	Complete,
}

/// Client wrapping [`OAuthBearerClient`] in the DH confidentiality layer.
#[derive(Debug)]
pub struct DhClient {
	inner: OAuthBearerClient,
	keys: Option<DhKeyPair>,
	session: Option<DhSession>,
	state: DhClientState,
}
impl DhClient {
	/// Wraps `inner`.
	pub fn new(inner: OAuthBearerClient) -> Self {
		Self { inner, keys: None, session: None, state: DhClientState::Init }
	}

	/// Current state.
	pub fn state(&self) -> DhClientState {
		self.state
	}

	async fn step(&mut self, challenge: &[u8]) -> Result<Vec<u8>> {
		match self.state {
			DhClientState::Init => {
				if !challenge.is_empty() {
					return Err(SaslError::UnexpectedChallenge {
						reason: "initial challenge must be empty",
					}
					.into());
				}

				let keys = DhKeyPair::generate();
				let public = keys.public_key().to_vec();

				self.keys = Some(keys);
				self.state = DhClientState::AwaitServerKey;

				Ok(public)
			},
			DhClientState::AwaitServerKey => {
				let keys = self.keys.take().ok_or(SaslError::Failed)?;

				self.session = Some(keys.agree(challenge)?);
				self.state = DhClientState::KeyExchanged;

				self.relay(&[]).await
			},
			DhClientState::KeyExchanged => {
				let session = self.session.as_ref().ok_or(SaslError::Failed)?;
				let challenge = session.open(challenge)?;

				self.relay(&challenge).await
			},
			DhClientState::Complete => Err(SaslError::AlreadyComplete.into()),
		}
	}

	async fn relay(&mut self, challenge: &[u8]) -> Result<Vec<u8>> {
		let response = self.inner.evaluate_challenge(challenge).await?;
		let session = self.session.as_ref().ok_or(SaslError::Failed)?;
		let sealed = session.seal(&response)?;

		if self.inner.is_complete() {
			self.state = DhClientState::Complete;
		}

		Ok(sealed)
	}
}
impl SaslClient for DhClient {
	fn mechanism(&self) -> &'static str {
		OAUTHBEARER_DH4096
	}

	fn evaluate_challenge<'a>(&'a mut self, challenge: &'a [u8]) -> SaslFuture<'a, Vec<u8>> {
		Box::pin(obs::observe(FlowKind::Sasl, "dh_evaluate_challenge", self.step(challenge)))
	}

	fn is_complete(&self) -> bool {
		self.state == DhClientState::Complete
	}
}

/// Progress of a DH server exchange.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DhServerState {
	/// Waiting for the client's public value.
	AwaitClientKey,
	/// Session key agreed; frames are exchanged.
	KeyExchanged,
	/// Wrapped server accepted the token.
	Complete,
	/// Key agreement, framing, or verification failed.
	Failed,
}

/// Server wrapping [`OAuthBearerServer`] in the DH confidentiality layer.
#[derive(Debug)]
pub struct DhServer {
	inner: OAuthBearerServer,
	session: Option<DhSession>,
	state: DhServerState,
}
impl DhServer {
	/// Wraps `inner`.
	pub fn new(inner: OAuthBearerServer) -> Self {
		Self { inner, session: None, state: DhServerState::AwaitClientKey }
	}

	/// Current state.
	pub fn state(&self) -> DhServerState {
		self.state
	}

	async fn step(&mut self, response: &[u8]) -> Result<Vec<u8>> {
		match self.state {
			DhServerState::AwaitClientKey => {
				let keys = DhKeyPair::generate();
				let session = keys.agree(response).inspect_err(|_| {
					self.state = DhServerState::Failed;
				})?;

				self.session = Some(session);
				self.state = DhServerState::KeyExchanged;

				Ok(keys.public_key().to_vec())
			},
			DhServerState::KeyExchanged => {
				let result = self.relay(response).await;

				self.state = match &result {
					Ok(_) if self.inner.is_complete() => DhServerState::Complete,
					Ok(challenge) if challenge.is_empty() => DhServerState::KeyExchanged,
					_ => DhServerState::Failed,
				};

				result
			},
			DhServerState::Complete => Err(SaslError::AlreadyComplete.into()),
			DhServerState::Failed => Err(SaslError::Failed.into()),
		}
	}

	async fn relay(&mut self, response: &[u8]) -> Result<Vec<u8>> {
		let session = self.session.as_ref().ok_or(SaslError::Failed)?;
		let response = session.open(response)?;
		let challenge = self.inner.evaluate_response(&response).await?;

		if challenge.is_empty() {
			return Ok(challenge);
		}

		let session = self.session.as_ref().ok_or(SaslError::Failed)?;

		Ok(session.seal(&challenge)?)
	}
}
impl SaslServer for DhServer {
	fn mechanism(&self) -> &'static str {
		OAUTHBEARER_DH4096
	}

	fn evaluate_response<'a>(&'a mut self, response: &'a [u8]) -> SaslFuture<'a, Vec<u8>> {
		Box::pin(obs::observe(FlowKind::Sasl, "dh_evaluate_response", self.step(response)))
	}

	fn is_complete(&self) -> bool {
		self.state == DhServerState::Complete
	}

	fn authorization_id(&self) -> Result<String> {
		if !self.is_complete() {
			return Err(SaslError::NotComplete.into());
		}

		self.inner.authorization_id()
	}

	fn verified_token(&self) -> Option<&SignedToken> {
		self.inner.verified_token()
	}
}
