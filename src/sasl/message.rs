//! `OAUTHBEARER` client response codec.
//!
//! Layout: `gs2-header 0x01 *(key=value 0x01) 0x01`, where the GS2 header is `n,,` or
//! `n,a=<authzid>,` and the bearer token travels in `auth=Bearer <token>`.

// self
use crate::{_prelude::*, error::SaslError};

/// Attribute delimiter.
pub const DELIMITER: u8 = 0x01;
/// Client abort marker sent after a failed exchange.
pub const ABORT: &[u8] = &[DELIMITER];
/// Server reply to a rejected token.
pub const INVALID_TOKEN: &[u8] = br#"{"status":"invalid_token"}"#;

/// Decoded client response.
#[derive(Clone, PartialEq, Eq)]
pub struct BearerMessage {
	/// Authorization identity from the GS2 header.
	pub authzid: Option<String>,
	/// `host` attribute; informational only.
	pub host: Option<String>,
	/// Bearer token from the `auth` attribute.
	pub token: String,
	/// Remaining attributes in order.
	pub extensions: Vec<(String, String)>,
}
impl BearerMessage {
	/// Creates a message carrying `token`.
	pub fn new(token: impl Into<String>) -> Self {
		Self { authzid: None, host: None, token: token.into(), extensions: Vec::new() }
	}

	/// Sets the `host` attribute.
	pub fn with_host(mut self, host: impl Into<String>) -> Self {
		self.host = Some(host.into());

		self
	}

	/// Sets the GS2 authorization identity.
	pub fn with_authzid(mut self, authzid: impl Into<String>) -> Self {
		self.authzid = Some(authzid.into());

		self
	}

	/// Serializes the message.
	pub fn encode(&self) -> Vec<u8> {
		let mut out = b"n,".to_vec();

		if let Some(authzid) = &self.authzid {
			out.extend_from_slice(b"a=");
			out.extend_from_slice(escape_authzid(authzid).as_bytes());
		}

		out.push(b',');
		out.push(DELIMITER);

		if let Some(host) = &self.host {
			push_attribute(&mut out, "host", host);
		}
		for (key, value) in &self.extensions {
			push_attribute(&mut out, key, value);
		}

		push_attribute(&mut out, "auth", &format!("Bearer {}", self.token));
		out.push(DELIMITER);

		out
	}

	/// Parses a client response; a missing or blank bearer token is malformed.
	pub fn parse(bytes: &[u8]) -> Result<Self, SaslError> {
		let text = std::str::from_utf8(bytes)
			.map_err(|_| SaslError::Malformed { reason: "message is not UTF-8" })?;
		let (authzid, rest) = parse_gs2_header(text)?;
		let body = rest
			.strip_prefix(DELIMITER as char)
			.and_then(|rest| rest.strip_suffix("\u{1}\u{1}"))
			.ok_or(SaslError::Malformed { reason: "attributes are not delimited" })?;
		let mut host = None;
		let mut token = None;
		let mut extensions = Vec::new();

		for attribute in body.split(DELIMITER as char) {
			let (key, value) = attribute
				.split_once('=')
				.filter(|(key, _)| !key.is_empty() && key.bytes().all(|b| b.is_ascii_alphabetic()))
				.ok_or(SaslError::Malformed { reason: "attribute is not a key=value pair" })?;

			match key {
				"auth" => token = Some(parse_bearer(value)?),
				"host" => host = Some(value.to_owned()),
				_ => extensions.push((key.to_owned(), value.to_owned())),
			}
		}

		let token = token.ok_or(SaslError::Malformed { reason: "`auth` attribute is missing" })?;

		Ok(Self { authzid, host, token, extensions })
	}
}
impl Debug for BearerMessage {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("BearerMessage")
			.field("authzid", &self.authzid)
			.field("host", &self.host)
			.field("token", &"<redacted>")
			.field("extensions", &self.extensions)
			.finish()
	}
}

fn push_attribute(out: &mut Vec<u8>, key: &str, value: &str) {
	out.extend_from_slice(key.as_bytes());
	out.push(b'=');
	out.extend_from_slice(value.as_bytes());
	out.push(DELIMITER);
}

fn parse_gs2_header(text: &str) -> Result<(Option<String>, &str), SaslError> {
	let (flag, rest) = text
		.split_once(',')
		.ok_or(SaslError::Malformed { reason: "GS2 header is missing" })?;

	match flag {
		"n" | "y" => {},
		_ if flag.starts_with("p=") =>
			return Err(SaslError::Malformed { reason: "channel binding is not supported" }),
		_ => return Err(SaslError::Malformed { reason: "GS2 header flag is invalid" }),
	}

	let (authzid, rest) = rest
		.split_once(',')
		.ok_or(SaslError::Malformed { reason: "GS2 header is not terminated" })?;
	let authzid = match authzid {
		"" => None,
		_ => Some(unescape_authzid(
			authzid
				.strip_prefix("a=")
				.ok_or(SaslError::Malformed { reason: "GS2 authzid is invalid" })?,
		)?),
	};

	Ok((authzid, rest))
}

fn parse_bearer(value: &str) -> Result<String, SaslError> {
	let (scheme, token) = value
		.split_once(' ')
		.ok_or(SaslError::Malformed { reason: "`auth` attribute has no scheme" })?;
	let token = token.trim();

	if !scheme.eq_ignore_ascii_case("bearer") {
		return Err(SaslError::Malformed { reason: "`auth` scheme is not Bearer" });
	}
	if token.is_empty() {
		return Err(SaslError::Malformed { reason: "bearer token is blank" });
	}

	Ok(token.to_owned())
}

fn escape_authzid(value: &str) -> String {
	value.replace('=', "=3D").replace(',', "=2C")
}

fn unescape_authzid(value: &str) -> Result<String, SaslError> {
	let mut out = String::with_capacity(value.len());
	let mut rest = value;

	while let Some(at) = rest.find('=') {
		out.push_str(&rest[..at]);

		match rest.get(at..at + 3) {
			Some("=2C") => out.push(','),
			Some("=3D") => out.push('='),
			_ => return Err(SaslError::Malformed { reason: "GS2 authzid escape is invalid" }),
		}

		rest = &rest[at + 3..];
	}

	out.push_str(rest);

	Ok(out)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn encode_matches_wire_layout() {
		let plain = BearerMessage::new("t0k").with_host("kafka.example.com").encode();

		assert_eq!(plain, b"n,,\x01host=kafka.example.com\x01auth=Bearer t0k\x01\x01");

		let delegated = BearerMessage::new("t0k").with_authzid("oidc://a,b=c@idp").encode();

		assert!(delegated.starts_with(b"n,a=oidc://a=2Cb=3Dc@idp,\x01"));
		assert!(delegated.ends_with(b"auth=Bearer t0k\x01\x01"));
	}

	#[test]
	fn parse_reads_attributes_and_authzid() {
		let message = BearerMessage::parse(
			b"n,a=oidc://a=2Cb@idp,\x01host=h\x01port=9092\x01auth=bearer  abc \x01\x01",
		)
		.expect("Well-formed message should parse.");

		assert_eq!(message.authzid.as_deref(), Some("oidc://a,b@idp"));
		assert_eq!(message.host.as_deref(), Some("h"));
		assert_eq!(message.token, "abc");
		assert_eq!(message.extensions, [("port".to_owned(), "9092".to_owned())]);
	}

	#[test]
	fn parse_rejects_broken_messages() {
		let cases: [&[u8]; 8] = [
			b"",
			b"\x01",
			b"x,,\x01auth=Bearer t\x01\x01",
			b"p=tls-unique,,\x01auth=Bearer t\x01\x01",
			b"n,,\x01auth=Bearer t\x01",
			b"n,,\x01host=h\x01\x01",
			b"n,,\x01auth=Bearer   \x01\x01",
			b"n,,\x01auth=Basic dXNlcg==\x01\x01",
		];

		for case in cases {
			assert!(BearerMessage::parse(case).is_err(), "{case:?} should be rejected.");
		}
	}

	#[test]
	fn debug_hides_the_token() {
		let rendered = format!("{:?}", BearerMessage::new("super-secret"));

		assert!(!rendered.contains("super-secret"));
	}
}
