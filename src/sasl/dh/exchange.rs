//! Diffie-Hellman agreement over the RFC 3526 4096-bit MODP group and the AES-GCM session
//! keyed from it.

// crates.io
use aes_gcm::{
	AesGcm, Nonce,
	aead::{Aead, KeyInit, consts::U16},
	aes::Aes128,
};
use num_bigint::BigUint;
use rand::RngCore;
use zeroize::Zeroizing;
// self
use crate::{
	_prelude::*,
	error::SaslError,
	sasl::dh::frame::{self, IV_LEN, MAX_PAYLOAD_LEN},
};

/// Modulus size in bits.
pub const KEY_BITS: u32 = 4096;
/// Encoded public key length.
pub const KEY_BYTES: usize = KEY_BITS as usize / 8;
/// AES-128 key length taken from the shared secret.
pub const AES_KEY_LEN: usize = 16;

const GENERATOR: u32 = 2;
const PRIVATE_BYTES: usize = 64;
const MODULUS: [u8; KEY_BYTES] = decode_hex(concat!(
	"FFFFFFFFFFFFFFFFC90FDAA22168C234C4C6628B80DC1CD129024E088A67CC74",
	"020BBEA63B139B22514A08798E3404DDEF9519B3CD3A431B302B0A6DF25F1437",
	"4FE1356D6D51C245E485B576625E7EC6F44C42E9A637ED6B0BFF5CB6F406B7ED",
	"EE386BFB5A899FA5AE9F24117C4B1FE649286651ECE45B3DC2007CB8A163BF05",
	"98DA48361C55D39A69163FA8FD24CF5F83655D23DCA3AD961C62F356208552BB",
	"9ED529077096966D670C354E4ABC9804F1746C08CA18217C32905E462E36CE3B",
	"E39E772C180E86039B2783A2EC07A28FB5C55DF06F4C52C9DE2BCBF695581718",
	"3995497CEA956AE515D2261898FA051015728E5A8AAAC42DAD33170D04507A33",
	"A85521ABDF1CBA64ECFB850458DBEF0A8AEA71575D060C7DB3970F85A6E1E4C7",
	"ABF5AE8CDB0933D71E8C94E04A25619DCEE3D2261AD2EE6BF12FFA06D98A0864",
	"D87602733EC86A64521F2B18177B200CBBE117577A615D6C770988C0BAD946E2",
	"08E24FA074E5AB3143DB5BFCE0FD108E4B82D120A92108011A723C12A787E6D7",
	"88719A10BDBA5B2699C327186AF4E23C1A946834B6150BDA2583E9CA2AD44CE8",
	"DBBBC2DB04DE8EF92E8EFC141FBECAA6287C59474E6BC05D99B2964FA090C3A2",
	"233BA186515BE7ED1F612970CEE2D7AFB81BDD762170481CD0069127D5B05AA9",
	"93B4EA988D8FDDC186FFB7DC90A6C08F4DF435C934063199FFFFFFFFFFFFFFFF",
));

type Cipher = AesGcm<Aes128, U16>;

/// Ephemeral key pair owned by one SASL session.
pub struct DhKeyPair {
	private: Zeroizing<Vec<u8>>,
	public: Vec<u8>,
}
impl DhKeyPair {
	/// Draws a fresh private exponent and computes the public value.
	pub fn generate() -> Self {
		let mut private = Zeroizing::new(vec![0; PRIVATE_BYTES]);

		rand::rng().fill_bytes(&mut private);
		// Keep the exponent at full width.
		private[0] |= 0x80;

		let exponent = BigUint::from_bytes_be(&private);
		let public = pad(&BigUint::from(GENERATOR).modpow(&exponent, &modulus()));

		Self { private, public: public.to_vec() }
	}

	/// Public value as a fixed-width big-endian integer.
	pub fn public_key(&self) -> &[u8] {
		&self.public
	}

	/// Derives the session from the peer's public value.
	pub fn agree(&self, peer: &[u8]) -> Result<DhSession, SaslError> {
		let modulus = modulus();

		if peer.is_empty() || peer.len() > KEY_BYTES {
			return Err(SaslError::InvalidPublicKey);
		}

		let peer = BigUint::from_bytes_be(peer);
		let one = BigUint::from(1_u32);

		if peer <= one || peer >= &modulus - &one {
			return Err(SaslError::InvalidPublicKey);
		}

		let shared = pad(&peer.modpow(&BigUint::from_bytes_be(&self.private), &modulus));

		DhSession::new(&shared[..AES_KEY_LEN])
	}
}
impl Debug for DhKeyPair {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("DhKeyPair").field("bits", &KEY_BITS).finish_non_exhaustive()
	}
}

/// AES-GCM state keyed from an agreed secret.
pub struct DhSession {
	cipher: Cipher,
}
impl DhSession {
	fn new(key: &[u8]) -> Result<Self, SaslError> {
		Ok(Self { cipher: Cipher::new_from_slice(key).map_err(|_| SaslError::Cipher)? })
	}

	/// Encrypts `plaintext` under a fresh IV and frames the result.
	pub fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>, SaslError> {
		if plaintext.len() > MAX_PAYLOAD_LEN {
			return Err(SaslError::Frame { reason: "payload exceeds 16 KiB" });
		}

		let mut iv = [0; IV_LEN];

		rand::rng().fill_bytes(&mut iv);

		let sealed = self
			.cipher
			.encrypt(Nonce::<U16>::from_slice(&iv), plaintext)
			.map_err(|_| SaslError::Cipher)?;

		Ok(frame::encode(&iv, &sealed))
	}

	/// Validates and decrypts a frame.
	pub fn open(&self, bytes: &[u8]) -> Result<Vec<u8>, SaslError> {
		let (iv, sealed) = frame::decode(bytes)?;

		self.cipher.decrypt(Nonce::<U16>::from_slice(iv), sealed).map_err(|_| SaslError::Cipher)
	}
}
impl Debug for DhSession {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("DhSession").finish_non_exhaustive()
	}
}

fn modulus() -> BigUint {
	BigUint::from_bytes_be(&MODULUS)
}

fn pad(value: &BigUint) -> Zeroizing<[u8; KEY_BYTES]> {
	let bytes = Zeroizing::new(value.to_bytes_be());
	let mut out = Zeroizing::new([0; KEY_BYTES]);

	out[KEY_BYTES - bytes.len()..].copy_from_slice(&bytes);

	out
}

const fn decode_hex(hex: &str) -> [u8; KEY_BYTES] {
	const fn nibble(c: u8) -> u8 {
		match c {
			b'0'..=b'9' => c - b'0',
			b'A'..=b'F' => c - b'A' + 10,
			_ => panic!("modulus must be uppercase hex"),
		}
	}

	let hex = hex.as_bytes();
	let mut out = [0; KEY_BYTES];
	let mut i = 0;

	assert!(hex.len() == KEY_BYTES * 2, "modulus must be 4096 bits");

	while i < KEY_BYTES {
		out[i] = (nibble(hex[2 * i]) << 4) | nibble(hex[2 * i + 1]);
		i += 1;
	}

	out
}
