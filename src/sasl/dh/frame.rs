//! Encrypted frame layout: `[u32 BE IV length][IV][ciphertext || tag]`.
//!
//! Length fields are checked before any slice is taken.

// self
use crate::error::SaslError;

/// IV length written by this crate and required on input.
pub const IV_LEN: usize = 16;
/// AES-GCM tag length.
pub const TAG_LEN: usize = 16;
/// Upper bound for the declared IV length and for the ciphertext after it.
pub const MAX_FIELD_LEN: usize = 16 * 1024;
/// Largest plaintext whose frame passes [`decode`].
pub const MAX_PAYLOAD_LEN: usize = MAX_FIELD_LEN - TAG_LEN;

const LENGTH_PREFIX: usize = 4;

/// Frames `iv` and `sealed`.
pub fn encode(iv: &[u8], sealed: &[u8]) -> Vec<u8> {
	let mut out = Vec::with_capacity(LENGTH_PREFIX + iv.len() + sealed.len());

	out.extend_from_slice(&(iv.len() as u32).to_be_bytes());
	out.extend_from_slice(iv);
	out.extend_from_slice(sealed);

	out
}

/// Splits a frame into its IV and sealed payload.
pub fn decode(frame: &[u8]) -> Result<(&[u8], &[u8]), SaslError> {
	let (prefix, rest) = frame
		.split_first_chunk::<LENGTH_PREFIX>()
		.ok_or(SaslError::Frame { reason: "frame is shorter than its length prefix" })?;
	let iv_len = u32::from_be_bytes(*prefix) as usize;

	if iv_len > MAX_FIELD_LEN {
		return Err(SaslError::Frame { reason: "declared IV length exceeds 16 KiB" });
	}
	if rest.len() <= iv_len {
		return Err(SaslError::Frame { reason: "frame carries no ciphertext" });
	}
	if rest.len() - iv_len > MAX_FIELD_LEN {
		return Err(SaslError::Frame { reason: "ciphertext exceeds 16 KiB" });
	}
	if iv_len != IV_LEN {
		return Err(SaslError::Frame { reason: "IV must be 16 bytes" });
	}

	Ok(rest.split_at(iv_len))
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn frame(iv_len: u32, tail: usize) -> Vec<u8> {
		let mut out = iv_len.to_be_bytes().to_vec();

		out.resize(LENGTH_PREFIX + tail, 0xAB);

		out
	}

	#[test]
	fn decode_splits_iv_and_payload() {
		let encoded = encode(&[1; IV_LEN], b"sealed");
		let (iv, sealed) = decode(&encoded).expect("Well-formed frame should decode.");

		assert_eq!(iv, [1_u8; IV_LEN]);
		assert_eq!(sealed, b"sealed");
	}

	#[test]
	fn length_fields_are_validated_before_slicing() {
		let cases = [
			(vec![0, 0, 0], "frame is shorter than its length prefix"),
			(frame(u32::MAX, 32), "declared IV length exceeds 16 KiB"),
			(frame(MAX_FIELD_LEN as u32 + 1, 32), "declared IV length exceeds 16 KiB"),
			(frame(16, 16), "frame carries no ciphertext"),
			(frame(16, 8), "frame carries no ciphertext"),
			(frame(16, 16 + MAX_FIELD_LEN + 1), "ciphertext exceeds 16 KiB"),
			(frame(12, 40), "IV must be 16 bytes"),
			(frame(0, 40), "IV must be 16 bytes"),
		];

		for (bytes, expected) in cases {
			match decode(&bytes) {
				Err(SaslError::Frame { reason }) => assert_eq!(reason, expected),
				other => panic!("Frame should be rejected with `{expected}`, got {other:?}."),
			}
		}
	}

	#[test]
	fn largest_ciphertext_is_accepted() {
		assert!(decode(&frame(16, 16 + MAX_FIELD_LEN)).is_ok());
	}
}
