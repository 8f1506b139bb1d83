//! Common types module for the cloud signer system.
//!
//! This module defines the value types shared by the signing backends and the
//! transaction binder: key handles, raw and canonical secp256k1 signatures,
//! the curve constants, checksum helpers and configuration validation.

/// Key handle and key identity types.
pub mod account;
/// CRC32C checksums used to verify key material in transit.
pub mod checksum;
/// Curve constants and public key to address derivation.
pub mod crypto;
/// Registry trait for self-registering implementations.
pub mod registry;
/// Secure string type for access tokens and private keys.
pub mod secret_string;
/// Raw (DER) and canonical (65-byte recoverable) signature types.
pub mod signature;
/// Configuration validation types for ensuring type-safe configurations.
pub mod validation;

// Re-export all types for convenient access
pub use account::*;
pub use alloy_primitives::{Address, ChainId, B256, U256};
pub use checksum::crc32c;
pub use crypto::{
	decode_public_key, public_key_to_address, recover_address, CryptoError, SECP256K1_HALF_N,
	SECP256K1_N,
};
pub use registry::ImplementationRegistry;
pub use secret_string::SecretString;
pub use signature::{CanonicalSignature, RawSignature};
pub use validation::*;
