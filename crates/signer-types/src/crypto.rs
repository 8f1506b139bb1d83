//! secp256k1 constants and public key helpers.
//!
//! Ethereum derives an account address from the last 20 bytes of the
//! keccak256 hash of the 64-byte uncompressed public key (the SEC1 encoding
//! without its `0x04` tag). Everything in this module is a pure function over
//! byte slices; nothing here talks to a key service.

use alloy_primitives::{hex, keccak256, Address, B256, U256};
use k256::ecdsa::{RecoveryId, Signature as EcdsaSignature, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::pkcs8::DecodePublicKey;
use k256::PublicKey;
use once_cell::sync::Lazy;
use thiserror::Error;

const SECP256K1_N_BYTES: [u8; 32] =
	hex!("fffffffffffffffffffffffffffffffebaaedce6af48a03bbfd25e8cd0364141");

/// Order of the secp256k1 group.
pub static SECP256K1_N: Lazy<U256> = Lazy::new(|| U256::from_be_bytes(SECP256K1_N_BYTES));

/// Half of the secp256k1 group order (rounded down), the upper bound for a
/// canonical `s` value under EIP-2.
pub static SECP256K1_HALF_N: Lazy<U256> = Lazy::new(|| *SECP256K1_N >> 1);

/// Errors that can occur while decoding keys and signatures.
#[derive(Debug, Error)]
pub enum CryptoError {
	/// The signature is not a valid ASN.1 DER `SEQUENCE { r, s }`.
	#[error("Invalid DER signature: {0}")]
	InvalidDer(String),
	/// The key material does not decode to a secp256k1 point.
	#[error("Invalid public key: {0}")]
	InvalidPublicKey(String),
	/// The signature bytes are malformed or not canonical.
	#[error("Invalid signature: {0}")]
	InvalidSignature(String),
	/// Recovery ids are restricted to 0 and 1.
	#[error("Invalid recovery id: {0}")]
	InvalidRecoveryId(u8),
	/// Public key recovery failed for the given digest and signature.
	#[error("Public key recovery failed: {0}")]
	Recovery(String),
}

/// Decodes remote key material into a 65-byte uncompressed SEC1 point.
///
/// Accepts a PEM encoded SubjectPublicKeyInfo (what Cloud KMS returns) or raw
/// SEC1 bytes in compressed or uncompressed form.
pub fn decode_public_key(material: &[u8]) -> Result<Vec<u8>, CryptoError> {
	let public_key = match std::str::from_utf8(material) {
		Ok(text) if text.trim_start().starts_with("-----BEGIN") => {
			PublicKey::from_public_key_pem(text.trim())
				.map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))?
		},
		_ => PublicKey::from_sec1_bytes(material)
			.map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))?,
	};

	Ok(public_key.to_encoded_point(false).as_bytes().to_vec())
}

/// Derives the Ethereum address of a SEC1 encoded public key.
pub fn public_key_to_address(public_key: &[u8]) -> Result<Address, CryptoError> {
	let point = PublicKey::from_sec1_bytes(public_key)
		.map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))?
		.to_encoded_point(false);

	// Skip the 0x04 uncompressed tag
	let hash = keccak256(&point.as_bytes()[1..]);
	Ok(Address::from_slice(&hash[12..]))
}

/// Recovers the signer address from a digest, a 64-byte `r || s` signature and
/// a recovery id.
pub fn recover_address(
	digest: &B256,
	signature: &[u8; 64],
	recovery_id: u8,
) -> Result<Address, CryptoError> {
	let signature = EcdsaSignature::from_slice(signature)
		.map_err(|e| CryptoError::InvalidSignature(e.to_string()))?;
	let recovery_id =
		RecoveryId::from_byte(recovery_id).ok_or(CryptoError::InvalidRecoveryId(recovery_id))?;

	let key = VerifyingKey::recover_from_prehash(digest.as_slice(), &signature, recovery_id)
		.map_err(|e| CryptoError::Recovery(e.to_string()))?;

	public_key_to_address(key.to_encoded_point(false).as_bytes())
}
