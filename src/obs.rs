//! Observability helpers for discovery, renewal, and access flows.
//!
//! # Feature Flags
//!
//! - Spans named `oidc_sasl.flow` carry the `flow` and `stage` fields and are always emitted
//!   through `tracing`.
//! - Enable `metrics` to increment the `oidc_sasl_flow_total` counter for every
//!   attempt/success/failure, labeled by `flow` + `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Flow kinds observed by the crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// OIDC or UMA2 discovery document fetch.
	Discovery,
	/// JWKS refresh.
	KeySetRefresh,
	/// Client-credentials token renewal.
	TokenRefresh,
	/// Delegated access ticket request.
	RequestAccess,
	/// Self-login and subject attachment.
	Login,
	/// SASL handshake step.
	Sasl,
}
impl FlowKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowKind::Discovery => "discovery",
			FlowKind::KeySetRefresh => "key_set_refresh",
			FlowKind::TokenRefresh => "token_refresh",
			FlowKind::RequestAccess => "request_access",
			FlowKind::Login => "login",
			FlowKind::Sasl => "sasl",
		}
	}
}
impl Display for FlowKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// Entry to a flow.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl FlowOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowOutcome::Attempt => "attempt",
			FlowOutcome::Success => "success",
			FlowOutcome::Failure => "failure",
		}
	}
}
impl Display for FlowOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Runs `fut` inside a flow span and records attempt plus success/failure outcomes.
pub async fn observe<T, Fut>(kind: FlowKind, stage: &'static str, fut: Fut) -> Result<T>
where
	Fut: Future<Output = Result<T>>,
{
	let span = FlowSpan::new(kind, stage);

	record_flow_outcome(kind, FlowOutcome::Attempt);

	let result = span.instrument(fut).await;

	match &result {
		Ok(_) => record_flow_outcome(kind, FlowOutcome::Success),
		Err(_) => record_flow_outcome(kind, FlowOutcome::Failure),
	}

	result
}
