//! Bearer-token renewal and request decoration.
//!
//! [`BearerAuth`] keeps the client's own access token in a [`Renewer`] and attaches it to
//! outgoing requests. Tokens are renewed [`REFRESH_MARGIN`] before they expire, and a token
//! whose expiry cannot be read is always renewed.

// self
use crate::{
	_prelude::*,
	http::{self, HttpRequest, SharedTransport},
	issuer::Issuer,
	memo::RefreshFuture,
	obs::FlowKind,
	renew::{Renewable, Renewer},
	token::{SignedToken, TokenSecret},
};

/// Margin subtracted from a token's expiry to trigger proactive renewal.
pub const REFRESH_MARGIN: Duration = Duration::seconds(60);

/// Returns `true` when `token` expires within [`REFRESH_MARGIN`] of `now` or its expiry is
/// missing or unreadable.
pub fn needs_refresh(token: &SignedToken, now: OffsetDateTime) -> bool {
	token.claims().expires_at().is_none_or(|expires_at| now >= expires_at - REFRESH_MARGIN)
}

/// Successful token endpoint payload.
#[derive(Clone, Deserialize)]
pub struct TokenResponse {
	/// Issued access token.
	#[serde(default)]
	pub access_token: Option<String>,
	/// Token type, usually `Bearer`.
	#[serde(default)]
	pub token_type: Option<String>,
	/// Lifetime in seconds.
	#[serde(default)]
	pub expires_in: Option<i64>,
	/// Granted scope.
	#[serde(default)]
	pub scope: Option<String>,
}
impl TokenResponse {
	/// Parses `access_token`; its absence is a hard failure.
	pub fn into_token(self) -> Result<SignedToken> {
		let raw = self.access_token.filter(|raw| !raw.is_empty()).ok_or_else(|| {
			Error::MalformedResponse { reason: "missing `access_token`".into() }
		})?;

		Ok(SignedToken::parse(raw)?)
	}
}
impl Debug for TokenResponse {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenResponse")
			.field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
			.field("token_type", &self.token_type)
			.field("expires_in", &self.expires_in)
			.field("scope", &self.scope)
			.finish()
	}
}

/// Client credentials and grant used to obtain the client's own token.
#[derive(Clone, Debug)]
pub struct TokenGrant {
	/// Client id.
	pub client_id: String,
	/// Client secret.
	pub client_secret: TokenSecret,
	/// Grant type sent to the token endpoint.
	pub grant_type: String,
	/// Requested scope.
	pub scope: Option<String>,
	/// Additional form parameters.
	pub auth_params: Vec<(String, String)>,
}

/// Fetches the client's own token and insists it comes from the configured issuer.
pub struct TokenResource {
	transport: SharedTransport,
	issuer: Arc<Issuer>,
	endpoint: Url,
	grant: TokenGrant,
}
impl TokenResource {
	/// Creates a fetcher posting `grant` to `endpoint`.
	pub fn new(
		transport: SharedTransport,
		issuer: Arc<Issuer>,
		endpoint: Url,
		grant: TokenGrant,
	) -> Self {
		Self { transport, issuer, endpoint, grant }
	}

	/// Token endpoint.
	pub fn endpoint(&self) -> &Url {
		&self.endpoint
	}

	/// Grant parameters.
	pub fn grant(&self) -> &TokenGrant {
		&self.grant
	}

	fn request(&self) -> HttpRequest {
		let mut form = vec![("grant_type".to_owned(), self.grant.grant_type.clone())];

		if let Some(scope) = &self.grant.scope {
			form.push(("scope".into(), scope.clone()));
		}

		form.extend(self.grant.auth_params.iter().cloned());

		HttpRequest::post_form(self.endpoint.clone(), form)
			.basic_auth(&self.grant.client_id, self.grant.client_secret.expose())
	}
}
impl Debug for TokenResource {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenResource")
			.field("endpoint", &self.endpoint.as_str())
			.field("grant", &self.grant)
			.finish_non_exhaustive()
	}
}
impl Renewable for TokenResource {
	type Resource = SignedToken;

	const KIND: FlowKind = FlowKind::TokenRefresh;

	fn needs_refresh(&self, resource: &SignedToken) -> bool {
		needs_refresh(resource, OffsetDateTime::now_utc())
	}

	fn request_new(&self) -> RefreshFuture<'_, SignedToken> {
		Box::pin(async move {
			let response =
				http::post_form::<TokenResponse>(self.transport.as_ref(), self.request()).await?;
			let token = response.into_token()?;

			if let Err(e) = self.issuer.check(&token).await {
				tracing::warn!(
					endpoint = %self.endpoint,
					error = %e,
					"Token endpoint returned a token that fails issuer checks."
				);

				return Err(e.into());
			}

			tracing::debug!(
				expires_at = ?token.claims().expires_at(),
				"Renewed client access token."
			);

			Ok(token)
		})
	}
}

/// Requests that can carry an `Authorization: Bearer` header.
pub trait BearerRequest
where
	Self: Sized,
{
	/// Returns the request with `token` attached.
	fn attach_bearer(self, token: &SignedToken) -> Self;
}
impl BearerRequest for HttpRequest {
	fn attach_bearer(self, token: &SignedToken) -> Self {
		self.bearer(token.raw())
	}
}
#[cfg(feature = "reqwest")]
impl BearerRequest for reqwest::RequestBuilder {
	fn attach_bearer(self, token: &SignedToken) -> Self {
		self.bearer_auth(token.raw())
	}
}

/// Bearer-auth decorator over the client's token renewer.
#[derive(Debug)]
pub struct BearerAuth {
	tokens: Renewer<TokenResource>,
}
impl BearerAuth {
	/// Wraps `resource` in a renewer.
	pub fn new(resource: TokenResource) -> Self {
		Self { tokens: Renewer::new(resource) }
	}

	/// Current access token, renewed when stale.
	pub async fn token(&self) -> Result<Arc<SignedToken>> {
		self.tokens.get().await
	}

	/// Attaches the current access token to `request`.
	pub async fn authenticate<R>(&self, request: R) -> Result<R>
	where
		R: BearerRequest,
	{
		let token = self.token().await?;

		Ok(request.attach_bearer(&token))
	}

	/// Discards the cached token and requests a new one.
	pub async fn renew(&self) -> Result<Arc<SignedToken>> {
		self.tokens.renew().await
	}

	/// Forgets the cached token.
	pub fn clear(&self) {
		self.tokens.clear();
	}

	/// Token endpoint and grant configuration.
	pub fn resource(&self) -> &TokenResource {
		self.tokens.resource()
	}
}
