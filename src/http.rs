//! HTTP transport seam for discovery, key-set, token, and introspection calls.
//!
//! [`HttpTransport`] is the crate's only dependency on an HTTP stack. It works on crate-owned
//! [`HttpRequest`]/[`HttpResponse`] values so callers can plug in any client; the default
//! [`ReqwestTransport`] (feature `reqwest`) applies explicit connect and response timeouts and
//! never follows redirects, matching OAuth 2.0 guidance that token endpoints answer directly.

pub mod classify;

pub use classify::*;

// crates.io
use base64::{Engine, engine::general_purpose::STANDARD};
#[cfg(feature = "reqwest")] use reqwest::header::{ACCEPT, HeaderMap, RETRY_AFTER};
use serde::de::DeserializeOwned;
#[cfg(feature = "reqwest")] use time::format_description::well_known::Rfc2822;
// self
use crate::{_prelude::*, error::TransientError};
#[cfg(feature = "reqwest")] use crate::error::{ConfigError, TransportError};

/// Boxed future returned by [`HttpTransport::execute`].
pub type HttpFuture<'a> = Pin<Box<dyn Future<Output = Result<HttpResponse>> + 'a + Send>>;

/// Abstraction over HTTP clients able to run the crate's GET and form POST calls.
///
/// Implementations must be `Send + Sync + 'static` so one transport can be shared (usually
/// as `Arc<dyn HttpTransport>`) by every cache of a client identity. Non-2xx responses are
/// returned as values; only failures to obtain a response at all become errors.
pub trait HttpTransport
where
	Self: 'static + Send + Sync,
{
	/// Executes `request` and buffers the full response body.
	fn execute(&self, request: HttpRequest) -> HttpFuture<'_>;
}

/// Shared transport handle.
pub type SharedTransport = Arc<dyn HttpTransport>;

/// HTTP methods used by the crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Method {
	/// `GET`
	Get,
	/// `POST` with a form-encoded body.
	Post,
}

/// Transport-neutral HTTP request.
#[derive(Clone)]
pub struct HttpRequest {
	/// Request method.
	pub method: Method,
	/// Absolute target URL.
	pub url: Url,
	/// Extra headers in insertion order.
	pub headers: Vec<(String, String)>,
	/// Form parameters sent as `application/x-www-form-urlencoded`.
	pub form: Option<Vec<(String, String)>>,
}
impl HttpRequest {
	/// Creates a `GET` request.
	pub fn get(url: Url) -> Self {
		Self { method: Method::Get, url, headers: Vec::new(), form: None }
	}

	/// Creates a form `POST` request.
	pub fn post_form(url: Url, form: Vec<(String, String)>) -> Self {
		Self { method: Method::Post, url, headers: Vec::new(), form: Some(form) }
	}

	/// Appends a header, replacing an existing one with the same (case-insensitive) name.
	pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		let name = name.into();

		self.headers.retain(|(existing, _)| !existing.eq_ignore_ascii_case(&name));
		self.headers.push((name, value.into()));

		self
	}

	/// Sets HTTP Basic client authentication.
	pub fn basic_auth(self, username: &str, password: &str) -> Self {
		let encoded = STANDARD.encode(format!("{username}:{password}"));

		self.with_header("Authorization", format!("Basic {encoded}"))
	}

	/// Sets an `Authorization: Bearer` header.
	pub fn bearer(self, token: &str) -> Self {
		self.with_header("Authorization", format!("Bearer {token}"))
	}

	/// Returns the value of the header named `name`.
	pub fn header(&self, name: &str) -> Option<&str> {
		self.headers
			.iter()
			.find(|(existing, _)| existing.eq_ignore_ascii_case(name))
			.map(|(_, value)| value.as_str())
	}

	/// Returns the first form value named `name`.
	pub fn form_value(&self, name: &str) -> Option<&str> {
		self.form.as_ref()?.iter().find(|(key, _)| key == name).map(|(_, value)| value.as_str())
	}
}
impl Debug for HttpRequest {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let headers = self
			.headers
			.iter()
			.map(|(name, value)| {
				let value = if name.eq_ignore_ascii_case("authorization") {
					"<redacted>"
				} else {
					value.as_str()
				};

				(name.as_str(), value)
			})
			.collect::<Vec<_>>();
		let form = self.form.as_ref().map(|form| {
			form.iter()
				.map(|(key, value)| {
					let value = if key == "client_secret" { "<redacted>" } else { value.as_str() };

					(key.as_str(), value)
				})
				.collect::<Vec<_>>()
		});

		f.debug_struct("HttpRequest")
			.field("method", &self.method)
			.field("url", &self.url.as_str())
			.field("headers", &headers)
			.field("form", &form)
			.finish()
	}
}

/// Buffered HTTP response.
#[derive(Clone, Debug)]
pub struct HttpResponse {
	/// Status code.
	pub status: u16,
	/// `Retry-After` hint expressed as a relative duration.
	pub retry_after: Option<Duration>,
	/// Raw body bytes.
	pub body: Vec<u8>,
}
impl HttpResponse {
	/// Creates a response without a retry hint.
	pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
		Self { status, retry_after: None, body: body.into() }
	}

	/// Returns `true` for 2xx statuses.
	pub fn is_success(&self) -> bool {
		(200..300).contains(&self.status)
	}

	/// Decodes the body as JSON, reporting the failing path on error.
	pub fn json<T>(&self) -> Result<T>
	where
		T: DeserializeOwned,
	{
		let mut de = serde_json::Deserializer::from_slice(&self.body);

		serde_path_to_error::deserialize(&mut de).map_err(|source| {
			TransientError::ResponseParse { source, status: Some(self.status) }.into()
		})
	}

	/// Lossy UTF-8 view of the body.
	pub fn text(&self) -> String {
		String::from_utf8_lossy(&self.body).into_owned()
	}

	pub(crate) fn unexpected(&self, url: &Url) -> TransientError {
		TransientError::UnexpectedResponse {
			message: format!("{url} answered HTTP {}", self.status),
			status: Some(self.status),
			retry_after: self.retry_after,
		}
	}
}

/// GETs `url` and decodes a JSON body; non-2xx statuses are transient failures.
pub async fn get_json<T>(transport: &dyn HttpTransport, url: &Url) -> Result<T>
where
	T: DeserializeOwned,
{
	let response = transport.execute(HttpRequest::get(url.clone())).await?;

	if !response.is_success() {
		return Err(response.unexpected(url).into());
	}

	response.json()
}

/// Sends a token-endpoint style form POST; non-2xx responses are classified into the error
/// taxonomy with [`classify_token_error`].
pub async fn post_form<T>(transport: &dyn HttpTransport, request: HttpRequest) -> Result<T>
where
	T: DeserializeOwned,
{
	let response = transport.execute(request).await?;

	if !response.is_success() {
		return Err(classify_token_error(&response));
	}

	response.json()
}

/// Connection and response deadlines applied by [`ReqwestTransport::new`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransportConfig {
	/// TCP/TLS connect deadline.
	pub connect_timeout: Duration,
	/// Whole-request deadline, including reading the body.
	pub response_timeout: Duration,
}
impl Default for TransportConfig {
	fn default() -> Self {
		Self { connect_timeout: Duration::seconds(2), response_timeout: Duration::seconds(2) }
	}
}

/// [`HttpTransport`] backed by [`ReqwestClient`].
///
/// Configure any custom client passed to [`with_client`](Self::with_client) to disable
/// redirect following and to carry explicit timeouts; a hung identity provider otherwise
/// hangs every caller waiting on the same refresh.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug)]
pub struct ReqwestTransport(ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Builds a client with `config` timeouts and redirects disabled.
	pub fn new(config: TransportConfig) -> Result<Self> {
		let client = ReqwestClient::builder()
			.connect_timeout(config.connect_timeout.unsigned_abs())
			.timeout(config.response_timeout.unsigned_abs())
			.redirect(reqwest::redirect::Policy::none())
			.build()
			.map_err(ConfigError::from)?;

		Ok(Self(client))
	}

	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestTransport {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl HttpTransport for ReqwestTransport {
	fn execute(&self, request: HttpRequest) -> HttpFuture<'_> {
		Box::pin(async move {
			let HttpRequest { method, url, headers, form } = request;
			let mut builder = match method {
				Method::Get => self.0.get(url.clone()),
				Method::Post => self.0.post(url.clone()),
			}
			.header(ACCEPT, "application/json");

			for (name, value) in &headers {
				builder = builder.header(name.as_str(), value.as_str());
			}
			if let Some(form) = &form {
				builder = builder.form(form);
			}

			let response =
				builder.send().await.map_err(|e| TransportError::network(&url, e))?;
			let status = response.status().as_u16();
			let retry_after = parse_retry_after(response.headers());
			let body = response.bytes().await.map_err(|e| TransportError::network(&url, e))?;

			Ok(HttpResponse { status, retry_after, body: body.to_vec() })
		})
	}
}

#[cfg(feature = "reqwest")]
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
	let value = headers.get(RETRY_AFTER)?;
	let raw = value.to_str().ok()?.trim();

	if let Ok(secs) = raw.parse::<u64>() {
		return Some(Duration::seconds(secs as i64));
	}
	if let Ok(moment) = OffsetDateTime::parse(raw, &Rfc2822) {
		let delta = moment - OffsetDateTime::now_utc();

		if delta.is_positive() {
			return Some(delta);
		}
	}

	None
}
