//! Authenticators and the subject store they populate.
//!
//! [`IdentityLogin`] confirms the configured client credentials and attaches the client's own
//! principal to a [`Subject`]; [`BearerAuthenticator`] turns a presented bearer token into a
//! principal without touching any subject.

// self
use crate::{
	_prelude::*,
	client::{ClientIdentity, validate_config},
	error::VerifyError,
	obs::{self, FlowKind},
	sasl::TokenVerifier,
	token::SignedToken,
};

/// Future returned by [`Authenticator::authenticate`].
pub type LoginFuture<'a> = Pin<Box<dyn Future<Output = Result<Principal>> + 'a + Send>>;

/// Credentials offered to an [`Authenticator`].
#[derive(Clone)]
pub enum Credentials {
	/// Compact bearer token presented by a peer.
	Bearer(String),
	/// The client credentials the authenticator was configured with.
	Configured,
}
impl Debug for Credentials {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			Credentials::Bearer(_) => f.write_str("Bearer(<redacted>)"),
			Credentials::Configured => f.write_str("Configured"),
		}
	}
}

/// Authenticated identity backed by a token.
#[derive(Clone, Debug)]
pub struct Principal {
	/// `<scheme>://<client id or azp>@<issuer host>`.
	pub name: String,
	/// Token that established the identity.
	pub token: Arc<SignedToken>,
}

/// Turns credentials into a principal.
pub trait Authenticator
where
	Self: Send + Sync,
{
	/// Authenticates `credentials`.
	fn authenticate<'a>(&'a self, credentials: &'a Credentials) -> LoginFuture<'a>;
}

/// Principals attached to one authenticated party.
#[derive(Debug, Default)]
pub struct Subject {
	principals: RwLock<Vec<Principal>>,
}
impl Subject {
	/// Creates an empty subject.
	pub fn new() -> Self {
		Self::default()
	}

	/// Attaches `principal`, replacing one with the same name.
	pub fn attach(&self, principal: Principal) {
		let mut principals = self.principals.write();

		principals.retain(|existing| existing.name != principal.name);
		principals.push(principal);
	}

	/// Detaches the principal called `name`.
	pub fn detach(&self, name: &str) -> Option<Principal> {
		let mut principals = self.principals.write();
		let position = principals.iter().position(|principal| principal.name == name)?;

		Some(principals.remove(position))
	}

	/// Returns the principal called `name`.
	pub fn principal(&self, name: &str) -> Option<Principal> {
		self.principals.read().iter().find(|principal| principal.name == name).cloned()
	}

	/// Snapshot of every attached principal.
	pub fn principals(&self) -> Vec<Principal> {
		self.principals.read().clone()
	}

	/// Returns `true` when nothing is attached.
	pub fn is_empty(&self) -> bool {
		self.principals.read().is_empty()
	}
}

/// Verifies bearer tokens into principals.
pub struct BearerAuthenticator {
	verifier: Arc<dyn TokenVerifier>,
}
impl BearerAuthenticator {
	/// Creates an authenticator backed by `verifier`.
	pub fn new(verifier: Arc<dyn TokenVerifier>) -> Self {
		Self { verifier }
	}
}
impl Debug for BearerAuthenticator {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("BearerAuthenticator")
			.field("uma_aware", &self.verifier.is_uma_aware())
			.finish()
	}
}
impl Authenticator for BearerAuthenticator {
	fn authenticate<'a>(&'a self, credentials: &'a Credentials) -> LoginFuture<'a> {
		Box::pin(async move {
			let Credentials::Bearer(raw) = credentials else {
				return Err(Error::unsupported("non-bearer credentials for a bearer authenticator"));
			};

			bearer_principal(self.verifier.as_ref(), raw).await
		})
	}
}

/// Login lifecycle of a [`ClientIdentity`].
#[derive(Debug)]
pub struct IdentityLogin {
	identity: Arc<ClientIdentity>,
}
impl IdentityLogin {
	/// Wraps `identity`.
	pub fn new(identity: Arc<ClientIdentity>) -> Self {
		Self { identity }
	}

	/// Wrapped identity.
	pub fn identity(&self) -> &Arc<ClientIdentity> {
		&self.identity
	}

	/// Validates the configuration, confirms the credentials, and attaches the client's
	/// principal to `subject`.
	pub async fn login(&self, subject: &Subject) -> Result<Principal> {
		let principal = self.authenticate(&Credentials::Configured).await?;

		subject.attach(principal.clone());
		tracing::debug!(principal = %principal.name, "Client principal attached.");

		Ok(principal)
	}

	/// Detaches the client's principal and drops the identity's cached token and keys.
	pub fn logout(&self, subject: &Subject) -> Option<Principal> {
		let principal = subject.detach(&self.identity.name());

		self.identity.logout();

		principal
	}

	async fn login_self(&self) -> Result<Principal> {
		validate_config(self.identity.config(), self.identity.issuer().metadata())?;

		let token = self.identity.login_self().await?;

		Ok(Principal { name: self.identity.name(), token })
	}
}
impl Authenticator for IdentityLogin {
	fn authenticate<'a>(&'a self, credentials: &'a Credentials) -> LoginFuture<'a> {
		Box::pin(obs::observe(FlowKind::Login, "authenticate", async move {
			match credentials {
				Credentials::Configured => self.login_self().await,
				Credentials::Bearer(raw) => bearer_principal(self.identity.as_ref(), raw).await,
			}
		}))
	}
}

async fn bearer_principal(verifier: &dyn TokenVerifier, raw: &str) -> Result<Principal> {
	let token = verifier
		.verify_token(raw)
		.await
		.map_err(|e| Error::authentication("bearer token rejected", e))?;
	let name = token
		.authorization_id(verifier.is_uma_aware())
		.ok_or_else(|| VerifyError::MissingClaim { claim: "azp".into() })?;

	Ok(Principal { name, token: Arc::new(token) })
}
