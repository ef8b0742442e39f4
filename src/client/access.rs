//! Delegated access tickets for a `(from, to)` resource pair.
//!
//! Only the client itself may appear as `from`; any other delegated identity is rejected
//! rather than ignored. The target URI supplies the audience (its client id, else its
//! `audience` parameter), the scope, and for UMA targets the `permission` parameters.

// self
use crate::{
	_prelude::*,
	bearer::TokenResponse,
	client::{ClientIdentity, DEFAULT_GRANT_TYPE, IdentityScheme, IdentityUri},
	http::{self, HttpRequest},
	obs::{self, FlowKind},
	token::SignedToken,
};

/// Grant type of UMA ticket requests.
pub const UMA_TICKET_GRANT: &str = "urn:ietf:params:oauth:grant-type:uma-ticket";
/// Scope requested when the target names none.
pub const DEFAULT_ACCESS_SCOPE: &str = "openid roles";

/// Token obtained for a specific `(from, to)` pair.
#[derive(Clone, Debug)]
pub struct AccessTicket {
	/// Identity the access is requested for.
	pub from: String,
	/// Target resource URI.
	pub to: String,
	/// Grant that produced the token.
	pub grant_type: String,
	/// Issued token.
	pub token: SignedToken,
}

impl ClientIdentity {
	/// Requests a token that lets `from` access `to`.
	pub async fn request_access(&self, from: &str, to: &str) -> Result<AccessTicket> {
		obs::observe(FlowKind::RequestAccess, "request_access", async {
			self.ensure_self(from)?;

			let target = IdentityUri::parse(to)?;
			let form = self.access_form(&target, to)?;
			let grant_type = form[0].1.clone();
			let endpoint = self.bearer().resource().endpoint().clone();
			let request = self.bearer().authenticate(HttpRequest::post_form(endpoint, form)).await?;
			let token =
				http::post_form::<TokenResponse>(self.transport(), request).await?.into_token()?;

			tracing::debug!(to, grant_type = %grant_type, "Issued access ticket.");

			Ok(AccessTicket { from: from.into(), to: to.into(), grant_type, token })
		})
		.await
	}

	/// Form parameters of the token request for `target`; `grant_type` comes first.
	pub fn access_form(&self, target: &IdentityUri, to: &str) -> Result<Vec<(String, String)>> {
		let uma_target = target.scheme == IdentityScheme::Uma2;
		let uma = uma_target && self.is_uma();

		if uma_target && !uma {
			tracing::warn!(
				to,
				"Target is a UMA resource but this client is not UMA-capable; requesting without permissions."
			);
		}

		let audience = target
			.client_id
			.clone()
			.or_else(|| target.param("audience").map(str::to_owned))
			.filter(|audience| !audience.is_empty())
			.ok_or_else(|| Error::MissingAudience { target: to.into() })?;
		let scope = target.param("scope").unwrap_or(DEFAULT_ACCESS_SCOPE);
		let grant_type = if uma { UMA_TICKET_GRANT } else { DEFAULT_GRANT_TYPE };
		let mut form = vec![
			("grant_type".to_owned(), grant_type.to_owned()),
			("audience".into(), audience),
			("scope".into(), scope.into()),
			("client_id".into(), self.config().client_id.clone()),
			("client_secret".into(), self.config().client_secret.expose().into()),
		];

		if uma {
			form.extend(
				target.params("permission").map(|permission| ("permission".into(), permission.into())),
			);
		}

		Ok(form)
	}

	fn ensure_self(&self, from: &str) -> Result<()> {
		let is_self = IdentityUri::parse(from).is_ok_and(|uri| {
			uri.client_id.as_deref() == Some(self.config().client_id.as_str())
				&& uri.host == self.issuer().metadata().host()
		});

		if is_self {
			Ok(())
		} else {
			Err(Error::unsupported("delegated access on behalf of another identity"))
		}
	}
}
