//! SASL `OAUTHBEARER` mechanisms.
//!
//! The plain mechanism binds an access ticket to a single client response. The
//! `OAUTHBEARER-DH4096` variant first agrees on an AES-128 key through a Diffie-Hellman
//! exchange and then carries the plain exchange inside AES-GCM frames.
//!
//! Only the `auth` quality of protection is negotiated; `wrap` and `unwrap` always fail.

pub mod client;
pub mod dh;
pub mod message;
pub mod registry;
pub mod server;

pub use client::*;
pub use dh::{DhClient, DhServer};
pub use message::*;
pub use registry::*;
pub use server::*;

// self
use crate::{_prelude::*, client::AccessTicket, error::SaslError, token::SignedToken};

/// Plain mechanism name.
pub const OAUTHBEARER: &str = "OAUTHBEARER";
/// Diffie-Hellman mechanism name; 4096 bits is the only supported modulus size.
pub const OAUTHBEARER_DH4096: &str = "OAUTHBEARER-DH4096";
/// Name prefix shared by every Diffie-Hellman variant.
pub const OAUTHBEARER_DH_PREFIX: &str = "OAUTHBEARER-DH";
/// Quality of protection negotiated by every mechanism.
pub const QOP_AUTH: &str = "auth";

/// Boxed future returned by SASL steps.
pub type SaslFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;
/// Future yielding an access ticket.
pub type TicketFuture<'a> = SaslFuture<'a, AccessTicket>;
/// Future yielding a verified token.
pub type VerifyFuture<'a> = SaslFuture<'a, SignedToken>;

/// Supplies access tickets to SASL clients.
pub trait TicketSource
where
	Self: Send + Sync,
{
	/// Identity the tickets are requested for.
	fn name(&self) -> String;

	/// Requests a ticket for `target`.
	fn request_ticket<'a>(&'a self, target: &'a str) -> TicketFuture<'a>;
}

/// Verifies bearer tokens presented to SASL servers.
pub trait TokenVerifier
where
	Self: Send + Sync,
{
	/// Returns the verified token or the reason it was rejected.
	fn verify_token<'a>(&'a self, raw: &'a str) -> VerifyFuture<'a>;

	/// Whether `uma2` authorization ids may be reported.
	fn is_uma_aware(&self) -> bool;
}

/// Client side of a SASL mechanism.
pub trait SaslClient
where
	Self: Send,
{
	/// Mechanism name.
	fn mechanism(&self) -> &'static str;

	/// Produces the response to `challenge`.
	fn evaluate_challenge<'a>(&'a mut self, challenge: &'a [u8]) -> SaslFuture<'a, Vec<u8>>;

	/// Whether the client side has finished.
	fn is_complete(&self) -> bool;

	/// Negotiated quality of protection.
	fn negotiated_qop(&self) -> &'static str {
		QOP_AUTH
	}

	/// Integrity and privacy are not offered.
	fn wrap(&mut self, _: &[u8]) -> Result<Vec<u8>> {
		Err(SaslError::Unsupported { operation: "wrap" }.into())
	}

	/// Integrity and privacy are not offered.
	fn unwrap(&mut self, _: &[u8]) -> Result<Vec<u8>> {
		Err(SaslError::Unsupported { operation: "unwrap" }.into())
	}
}

/// Server side of a SASL mechanism.
pub trait SaslServer
where
	Self: Send,
{
	/// Mechanism name.
	fn mechanism(&self) -> &'static str;

	/// Processes `response` and returns the next challenge, empty when none follows.
	fn evaluate_response<'a>(&'a mut self, response: &'a [u8]) -> SaslFuture<'a, Vec<u8>>;

	/// Whether the exchange completed successfully.
	fn is_complete(&self) -> bool;

	/// Identity derived from the verified token.
	fn authorization_id(&self) -> Result<String>;

	/// Token accepted by the exchange.
	fn verified_token(&self) -> Option<&SignedToken>;

	/// Negotiated quality of protection.
	fn negotiated_qop(&self) -> &'static str {
		QOP_AUTH
	}

	/// Integrity and privacy are not offered.
	fn wrap(&mut self, _: &[u8]) -> Result<Vec<u8>> {
		Err(SaslError::Unsupported { operation: "wrap" }.into())
	}

	/// Integrity and privacy are not offered.
	fn unwrap(&mut self, _: &[u8]) -> Result<Vec<u8>> {
		Err(SaslError::Unsupported { operation: "unwrap" }.into())
	}
}
