//! Raw and canonical secp256k1 signature types.
//!
//! Remote key services return a plain ECDSA `(r, s)` pair encoded as ASN.1
//! DER. Ethereum needs the 65-byte recoverable form `r || s || v` with `s` in
//! the lower half of the curve order (EIP-2). [`RawSignature`] covers the
//! first form, [`CanonicalSignature`] the second.

use crate::crypto::{recover_address, CryptoError, SECP256K1_HALF_N, SECP256K1_N};
use alloy_primitives::{hex, Address, Signature, B256, U256};
use std::fmt;

/// An `(r, s)` pair as returned by a non-recoverable ECDSA signer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawSignature {
	pub r: U256,
	pub s: U256,
}

impl RawSignature {
	/// Builds a signature from its scalars.
	pub fn new(r: U256, s: U256) -> Self {
		Self { r, s }
	}

	/// Decodes an ASN.1 DER `SEQUENCE { INTEGER r, INTEGER s }`.
	pub fn from_der(der: &[u8]) -> Result<Self, CryptoError> {
		let signature = k256::ecdsa::Signature::from_der(der)
			.map_err(|e| CryptoError::InvalidDer(e.to_string()))?;
		let (r, s) = signature.split_bytes();

		Ok(Self {
			r: U256::from_be_slice(&r),
			s: U256::from_be_slice(&s),
		})
	}

	/// Returns true if `s` is at most half the curve order.
	pub fn is_low_s(&self) -> bool {
		self.s <= *SECP256K1_HALF_N
	}

	/// Returns the signature with `s` replaced by `n - s` when `s > n/2`.
	///
	/// Both values verify under secp256k1; Ethereum only accepts the lower one.
	pub fn normalize_s(self) -> Self {
		if self.is_low_s() {
			self
		} else {
			Self {
				r: self.r,
				s: *SECP256K1_N - self.s,
			}
		}
	}

	/// Encodes `r || s`, each as 32 big-endian bytes left-padded with zeros.
	pub fn to_bytes(&self) -> [u8; 64] {
		let mut out = [0u8; 64];
		out[..32].copy_from_slice(&self.r.to_be_bytes::<32>());
		out[32..].copy_from_slice(&self.s.to_be_bytes::<32>());
		out
	}
}

/// A 65-byte recoverable signature `r || s || v` with `v` in {0, 1}.
///
/// Construction enforces the low-S form, so any value of this type is
/// accepted by Ethereum consensus rules.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct CanonicalSignature([u8; 65]);

impl CanonicalSignature {
	pub const LEN: usize = 65;

	/// Builds a signature from a 64-byte `r || s` and a recovery id.
	pub fn from_parts(rs: [u8; 64], recovery_id: u8) -> Result<Self, CryptoError> {
		if recovery_id > 1 {
			return Err(CryptoError::InvalidRecoveryId(recovery_id));
		}
		let s = U256::from_be_slice(&rs[32..]);
		if s > *SECP256K1_HALF_N {
			return Err(CryptoError::InvalidSignature(
				"s is not in the lower half of the curve order".into(),
			));
		}

		let mut bytes = [0u8; 65];
		bytes[..64].copy_from_slice(&rs);
		bytes[64] = recovery_id;
		Ok(Self(bytes))
	}

	/// Parses a 65-byte signature, applying the same checks as [`Self::from_parts`].
	pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
		if bytes.len() != Self::LEN {
			return Err(CryptoError::InvalidSignature(format!(
				"expected {} bytes, got {}",
				Self::LEN,
				bytes.len()
			)));
		}
		let mut rs = [0u8; 64];
		rs.copy_from_slice(&bytes[..64]);
		Self::from_parts(rs, bytes[64])
	}

	/// Returns the `r` scalar.
	pub fn r(&self) -> U256 {
		U256::from_be_slice(&self.0[..32])
	}

	/// Returns the low-S `s` scalar.
	pub fn s(&self) -> U256 {
		U256::from_be_slice(&self.0[32..64])
	}

	/// Returns the recovery id, 0 or 1.
	pub fn recovery_id(&self) -> u8 {
		self.0[64]
	}

	/// Returns the `r || s || v` bytes.
	pub fn as_bytes(&self) -> &[u8; 65] {
		&self.0
	}

	/// Recovers the address that produced this signature over `digest`.
	pub fn recover_address(&self, digest: &B256) -> Result<Address, CryptoError> {
		let mut rs = [0u8; 64];
		rs.copy_from_slice(&self.0[..64]);
		recover_address(digest, &rs, self.recovery_id())
	}
}

impl From<CanonicalSignature> for Signature {
	fn from(signature: CanonicalSignature) -> Self {
		Signature::new(signature.r(), signature.s(), signature.recovery_id() == 1)
	}
}

impl fmt::Debug for CanonicalSignature {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "CanonicalSignature({})", self)
	}
}

impl fmt::Display for CanonicalSignature {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "0x{}", hex::encode(self.0))
	}
}
