//! Key handle and key identity types.

use alloy_primitives::Address;
use std::fmt;

/// Opaque reference to a key held by a remote custody service.
///
/// For Cloud KMS this is the full resource name of a crypto key version, e.g.
/// `projects/p/locations/global/keyRings/r/cryptoKeys/k/cryptoKeyVersions/1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyHandle(String);

impl KeyHandle {
	/// Wraps a key resource name.
	pub fn new(name: impl Into<String>) -> Self {
		Self(name.into())
	}

	/// Returns the key resource name.
	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for KeyHandle {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<&str> for KeyHandle {
	fn from(s: &str) -> Self {
		Self::new(s)
	}
}

/// Public key and the address derived from it.
///
/// `public_key` is the 65-byte SEC1 uncompressed point (`0x04 || X || Y`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyIdentity {
	pub public_key: Vec<u8>,
	pub address: Address,
}
