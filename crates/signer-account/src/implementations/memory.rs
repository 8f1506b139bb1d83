//! In-process remote signer.
//!
//! Behaves like a cloud key service: it answers public key requests with a
//! PEM document and its CRC32C, and signs digests into DER `(r, s)` pairs
//! with no recovery id. Optionally returns the high-S twin of every
//! signature, as some services do. Useful for development setups and for
//! exercising [`RecoverableSigner`] without network access.

use super::local::parse_signing_key;
use super::recoverable::RecoverableSigner;
use crate::{
	AccountError, AccountFactory, AccountRegistry, PublicKeyResponse, RemoteError, RemoteSigner,
	SigningCapability,
};
use async_trait::async_trait;
use k256::ecdsa::signature::hazmat::PrehashSigner;
use k256::ecdsa::{Signature, SigningKey};
use k256::pkcs8::{EncodePublicKey, LineEnding};
use signer_types::{
	crc32c, ChainId, ConfigSchema, Field, FieldType, ImplementationRegistry, KeyHandle,
	RawSignature, Schema, SecretString, ValidationError, B256, SECP256K1_N, U256,
};
use std::sync::Arc;

const DEFAULT_KEY_NAME: &str = "memory/keyRings/default/cryptoKeys/default/cryptoKeyVersions/1";

/// Remote signer emulation over an in-memory key.
pub struct MemoryKms {
	signing_key: SigningKey,
	high_s: bool,
}

impl MemoryKms {
	/// Creates a service holding `signing_key`.
	pub fn new(signing_key: SigningKey) -> Self {
		Self {
			signing_key,
			high_s: false,
		}
	}

	/// Returns `n - s` instead of the canonical `s` from every sign call.
	pub fn with_high_s(mut self, high_s: bool) -> Self {
		self.high_s = high_s;
		self
	}
}

#[async_trait]
impl RemoteSigner for MemoryKms {
	async fn get_public_key(&self, _key: &KeyHandle) -> Result<PublicKeyResponse, RemoteError> {
		let pem = k256::PublicKey::from(self.signing_key.verifying_key())
			.to_public_key_pem(LineEnding::LF)
			.map_err(|e| RemoteError::Malformed(e.to_string()))?;
		let key_material = pem.into_bytes();

		Ok(PublicKeyResponse {
			crc32c: crc32c(&key_material),
			key_material,
		})
	}

	async fn sign(&self, _key: &KeyHandle, digest: &B256) -> Result<Vec<u8>, RemoteError> {
		let signature: Signature = self
			.signing_key
			.sign_prehash(digest.as_slice())
			.map_err(|e| RemoteError::Transport(e.to_string()))?;

		let signature = if self.high_s {
			let (r, s) = signature.split_bytes();
			let raw = RawSignature::new(
				U256::from_be_slice(&r),
				*SECP256K1_N - U256::from_be_slice(&s),
			);
			Signature::from_slice(&raw.to_bytes())
				.map_err(|e| RemoteError::Malformed(e.to_string()))?
		} else {
			signature
		};

		Ok(signature.to_der().as_bytes().to_vec())
	}
}

/// Configuration schema for the in-memory remote signer.
pub struct MemoryKmsSchema;

impl ConfigSchema for MemoryKmsSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![Field::new("private_key", FieldType::String)],
			vec![
				Field::new("key_name", FieldType::String),
				Field::new("high_s", FieldType::Boolean),
				Field::new("cache_public_key", FieldType::Boolean),
			],
		);
		schema.validate(config)
	}
}

/// Factory function to create a [`RecoverableSigner`] over a [`MemoryKms`].
///
/// Configuration parameters:
/// - `private_key`: hex encoded secp256k1 private key
/// - `key_name` (optional): key handle reported in logs
/// - `high_s` (optional): emit non-canonical signatures, defaults to false
/// - `cache_public_key` (optional): defaults to true
pub fn create_account(
	config: &toml::Value,
	chain_id: ChainId,
) -> Result<Box<dyn SigningCapability>, AccountError> {
	MemoryKmsSchema
		.validate(config)
		.map_err(|e| AccountError::Configuration(format!("Invalid configuration: {}", e)))?;

	let private_key = config
		.get("private_key")
		.and_then(|v| v.as_str())
		.map(SecretString::from)
		.ok_or_else(|| AccountError::Configuration("private_key is required".into()))?;
	let key_name = config
		.get("key_name")
		.and_then(|v| v.as_str())
		.unwrap_or(DEFAULT_KEY_NAME);
	let high_s = config
		.get("high_s")
		.and_then(|v| v.as_bool())
		.unwrap_or(false);
	let cache_public_key = config
		.get("cache_public_key")
		.and_then(|v| v.as_bool())
		.unwrap_or(true);

	let kms = MemoryKms::new(parse_signing_key(&private_key)?).with_high_s(high_s);
	let signer = RecoverableSigner::new(Arc::new(kms), KeyHandle::new(key_name), chain_id);
	let signer = if cache_public_key {
		signer
	} else {
		signer.without_key_cache()
	};

	Ok(Box::new(signer))
}

/// Registry for the in-memory remote signer implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "memory_kms";
	type Factory = AccountFactory;

	fn factory() -> Self::Factory {
		create_account
	}
}

impl AccountRegistry for Registry {}
