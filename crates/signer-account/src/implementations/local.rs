//! Software key backend.
//!
//! Holds a secp256k1 private key in process and signs directly with it. The
//! key never leaves the process, but neither does it enjoy the protection of
//! a custody service; intended for development networks and tests.

use crate::{AccountError, AccountFactory, AccountRegistry, SigningCapability};
use alloy_primitives::hex;
use async_trait::async_trait;
use k256::ecdsa::SigningKey;
use signer_types::{
	public_key_to_address, Address, CanonicalSignature, ChainId, ConfigSchema, Field, FieldType,
	ImplementationRegistry, Schema, SecretString, ValidationError, B256,
};
use zeroize::Zeroizing;

/// [`SigningCapability`] over an in-process private key.
pub struct LocalSigner {
	signing_key: SigningKey,
	address: Address,
	chain_id: ChainId,
}

impl LocalSigner {
	/// Derives the address of `signing_key` and binds it to `chain_id`.
	pub fn new(signing_key: SigningKey, chain_id: ChainId) -> Result<Self, AccountError> {
		let address = public_key_to_address(
			signing_key
				.verifying_key()
				.to_encoded_point(false)
				.as_bytes(),
		)
		.map_err(|e| AccountError::InvalidKey(e.to_string()))?;

		Ok(Self {
			signing_key,
			address,
			chain_id,
		})
	}
}

#[async_trait]
impl SigningCapability for LocalSigner {
	async fn sign_digest(&self, digest: &B256) -> Result<CanonicalSignature, AccountError> {
		// k256 always produces low-S signatures with a matching recovery id
		let (signature, recovery_id) = self
			.signing_key
			.sign_prehash_recoverable(digest.as_slice())
			.map_err(|e| AccountError::SigningFailed(e.to_string()))?;

		let mut rs = [0u8; 64];
		rs.copy_from_slice(&signature.to_bytes());
		CanonicalSignature::from_parts(rs, recovery_id.to_byte())
			.map_err(|e| AccountError::SigningFailed(e.to_string()))
	}

	async fn address(&self) -> Result<Address, AccountError> {
		Ok(self.address)
	}

	fn chain_id(&self) -> ChainId {
		self.chain_id
	}
}

/// Parses a hex encoded (optionally 0x prefixed) secp256k1 private key.
pub fn parse_signing_key(private_key: &SecretString) -> Result<SigningKey, AccountError> {
	private_key.with_exposed(|key| {
		let bytes = Zeroizing::new(
			hex::decode(key.trim())
				.map_err(|_| AccountError::InvalidKey("private key is not valid hex".into()))?,
		);
		SigningKey::from_slice(&bytes).map_err(|_| {
			AccountError::InvalidKey("private key is not a valid secp256k1 scalar".into())
		})
	})
}

/// Configuration schema for the local signer.
pub struct LocalSignerSchema;

impl ConfigSchema for LocalSignerSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![Field::new("private_key", FieldType::String)],
			vec![],
		);
		schema.validate(config)
	}
}

/// Factory function to create a local signer from configuration.
///
/// Configuration parameters:
/// - `private_key`: hex encoded secp256k1 private key
pub fn create_account(
	config: &toml::Value,
	chain_id: ChainId,
) -> Result<Box<dyn SigningCapability>, AccountError> {
	LocalSignerSchema
		.validate(config)
		.map_err(|e| AccountError::Configuration(format!("Invalid configuration: {}", e)))?;

	let private_key = config
		.get("private_key")
		.and_then(|v| v.as_str())
		.map(SecretString::from)
		.ok_or_else(|| AccountError::Configuration("private_key is required".into()))?;

	let signer = LocalSigner::new(parse_signing_key(&private_key)?, chain_id)?;
	tracing::info!(address = %signer.address, chain_id, "Loaded local signing key");
	Ok(Box::new(signer))
}

/// Registry for the local signer implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "local";
	type Factory = AccountFactory;

	fn factory() -> Self::Factory {
		create_account
	}
}

impl AccountRegistry for Registry {}
