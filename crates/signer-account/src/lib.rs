//! Account module for the cloud signer system.
//!
//! This module defines the [`SigningCapability`] contract: sign a 32-byte
//! digest into a recoverable secp256k1 signature, report the signing address
//! and report the chain id. Backends live under [`implementations`]; the
//! transaction binder is written against the trait only.

use async_trait::async_trait;
use signer_types::{Address, CanonicalSignature, ChainId, ImplementationRegistry, B256};
use thiserror::Error;

/// Contract for the non-recoverable remote signing service.
pub mod remote;

/// Re-export implementations
pub mod implementations {
	pub mod gcp;
	pub mod local;
	pub mod memory;
	pub mod recoverable;
}

pub use remote::{PublicKeyResponse, RemoteError, RemoteSigner};
#[cfg(any(test, feature = "testing"))]
pub use remote::MockRemoteSigner;

/// Errors that can occur during account operations.
#[derive(Debug, Error)]
pub enum AccountError {
	/// The public key could not be fetched or decoded.
	#[error("Key retrieval failed: {0}")]
	KeyRetrieval(String),
	/// The checksum of the retrieved key material did not match.
	#[error("Key material corrupted in transit: expected crc32c {expected:#010x}, computed {actual:#010x}")]
	Integrity { expected: u32, actual: u32 },
	/// The remote sign call failed or returned undecodable output.
	#[error("Remote signing failed: {0}")]
	RemoteSigning(String),
	/// Neither recovery id reproduces the signer's address.
	#[error("Signature cannot be attributed to {address}: no recovery id matches")]
	RecoveryFailure { address: Address },
	/// Signing with a locally held key failed.
	#[error("Signing failed: {0}")]
	SigningFailed(String),
	/// A locally held key is invalid or malformed.
	#[error("Invalid key: {0}")]
	InvalidKey(String),
	/// The implementation configuration is invalid.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Trait defining the interface for signing backends.
///
/// Implementations must be safe to call concurrently: each call carries its
/// own digest and returns its own signature.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait SigningCapability: Send + Sync {
	/// Signs a 32-byte digest, returning `r || s || v` in low-S form.
	async fn sign_digest(&self, digest: &B256) -> Result<CanonicalSignature, AccountError>;

	/// Returns the address controlled by this capability.
	async fn address(&self) -> Result<Address, AccountError>;

	/// Returns the chain id this capability signs for.
	fn chain_id(&self) -> ChainId;
}

/// Type alias for account factory functions.
///
/// Factories receive the implementation's configuration table and the chain
/// id from the network section.
pub type AccountFactory =
	fn(&toml::Value, ChainId) -> Result<Box<dyn SigningCapability>, AccountError>;

/// Registry trait for account implementations.
pub trait AccountRegistry: ImplementationRegistry<Factory = AccountFactory> {}

/// Get all registered account implementations.
///
/// Returns a vector of (name, factory) tuples for all available account implementations.
pub fn get_all_implementations() -> Vec<(&'static str, AccountFactory)> {
	use implementations::{gcp, local, memory};

	vec![
		(gcp::Registry::NAME, gcp::Registry::factory()),
		(local::Registry::NAME, local::Registry::factory()),
		(memory::Registry::NAME, memory::Registry::factory()),
	]
}
