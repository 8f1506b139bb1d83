//! Google Cloud KMS remote signer.
//!
//! Talks to the Cloud KMS REST API (v1) for an asymmetric signing key of
//! algorithm `EC_SIGN_SECP256K1_SHA256`. Both calls carry CRC32C checksums:
//! the public key checksum is returned to the caller for verification, the
//! sign request sends a digest checksum and checks the one on the signature.

use super::recoverable::RecoverableSigner;
use crate::{
	AccountError, AccountFactory, AccountRegistry, PublicKeyResponse, RemoteError, RemoteSigner,
	SigningCapability,
};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use signer_types::{
	crc32c, ChainId, ConfigSchema, Field, FieldType, ImplementationRegistry, KeyHandle, Schema,
	SecretString, ValidationError, B256,
};
use std::sync::Arc;
use std::time::Duration;

/// Default Cloud KMS API endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://cloudkms.googleapis.com";
/// The only key algorithm that yields Ethereum compatible signatures.
pub const SECP256K1_ALGORITHM: &str = "EC_SIGN_SECP256K1_SHA256";

const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PublicKeyBody {
	pem: String,
	#[serde(default)]
	algorithm: Option<String>,
	/// int64 values are encoded as JSON strings
	#[serde(default)]
	pem_crc32c: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SignRequest {
	digest: DigestBody,
	digest_crc32c: String,
}

/// Cloud KMS names the field after the key's hash algorithm; for a
/// secp256k1 key it carries whatever 32-byte prehash the caller supplies.
#[derive(Debug, Serialize)]
struct DigestBody {
	sha256: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignBody {
	signature: String,
	#[serde(default)]
	signature_crc32c: Option<String>,
	#[serde(default)]
	verified_digest_crc32c: bool,
}

/// REST client for Cloud KMS asymmetric signing.
pub struct GcpKmsClient {
	http: reqwest::Client,
	endpoint: String,
	access_token: SecretString,
}

impl GcpKmsClient {
	/// Creates a client for `endpoint` authenticating with `access_token`.
	pub fn new(
		endpoint: impl Into<String>,
		access_token: SecretString,
		timeout: Duration,
	) -> Result<Self, RemoteError> {
		let http = reqwest::Client::builder()
			.timeout(timeout)
			.build()
			.map_err(|e| RemoteError::Transport(e.to_string()))?;

		Ok(Self {
			http,
			endpoint: endpoint.into().trim_end_matches('/').to_string(),
			access_token,
		})
	}

	async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, RemoteError> {
		let status = response.status();
		if !status.is_success() {
			let message = response.text().await.unwrap_or_default();
			return Err(RemoteError::Status {
				status: status.as_u16(),
				message,
			});
		}

		response
			.json::<T>()
			.await
			.map_err(|e| RemoteError::Malformed(e.to_string()))
	}
}

#[async_trait]
impl RemoteSigner for GcpKmsClient {
	async fn get_public_key(&self, key: &KeyHandle) -> Result<PublicKeyResponse, RemoteError> {
		let url = format!("{}/v1/{}/publicKey", self.endpoint, key);
		let request = self
			.access_token
			.with_exposed(|token| self.http.get(&url).bearer_auth(token));

		let response = request
			.send()
			.await
			.map_err(|e| RemoteError::Transport(e.to_string()))?;

		decode_public_key_body(Self::read_json(response).await?)
	}

	async fn sign(&self, key: &KeyHandle, digest: &B256) -> Result<Vec<u8>, RemoteError> {
		let url = format!("{}/v1/{}:asymmetricSign", self.endpoint, key);
		let body = SignRequest {
			digest: DigestBody {
				sha256: STANDARD.encode(digest),
			},
			digest_crc32c: crc32c(digest.as_slice()).to_string(),
		};
		let request = self
			.access_token
			.with_exposed(|token| self.http.post(&url).bearer_auth(token))
			.json(&body);

		let response = request
			.send()
			.await
			.map_err(|e| RemoteError::Transport(e.to_string()))?;

		decode_sign_body(Self::read_json(response).await?)
	}
}

fn parse_crc32c(value: Option<&str>, field: &str) -> Result<u32, RemoteError> {
	let value = value.ok_or_else(|| RemoteError::Malformed(format!("{} missing", field)))?;
	value
		.parse::<i64>()
		.ok()
		.and_then(|v| u32::try_from(v).ok())
		.ok_or_else(|| RemoteError::Malformed(format!("{} is not a crc32c: {}", field, value)))
}

fn decode_public_key_body(body: PublicKeyBody) -> Result<PublicKeyResponse, RemoteError> {
	if let Some(algorithm) = body.algorithm.as_deref() {
		if algorithm != SECP256K1_ALGORITHM {
			return Err(RemoteError::Malformed(format!(
				"unsupported key algorithm {}, expected {}",
				algorithm, SECP256K1_ALGORITHM
			)));
		}
	}

	Ok(PublicKeyResponse {
		crc32c: parse_crc32c(body.pem_crc32c.as_deref(), "pemCrc32c")?,
		key_material: body.pem.into_bytes(),
	})
}

fn decode_sign_body(body: SignBody) -> Result<Vec<u8>, RemoteError> {
	if !body.verified_digest_crc32c {
		return Err(RemoteError::Integrity(
			"digest checksum was not verified by the service".into(),
		));
	}

	let signature = STANDARD
		.decode(body.signature.as_bytes())
		.map_err(|e| RemoteError::Malformed(format!("signature is not base64: {}", e)))?;

	let expected = parse_crc32c(body.signature_crc32c.as_deref(), "signatureCrc32c")?;
	let actual = crc32c(&signature);
	if actual != expected {
		return Err(RemoteError::Integrity(format!(
			"signature crc32c mismatch: expected {:#010x}, computed {:#010x}",
			expected, actual
		)));
	}

	Ok(signature)
}

/// Configuration schema for the Cloud KMS signer.
pub struct GcpKmsSchema;

impl ConfigSchema for GcpKmsSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![
				Field::new("key_name", FieldType::String).with_validator(|value| {
					let name = value.as_str().unwrap_or_default();
					if name.starts_with("projects/") && name.contains("/cryptoKeyVersions/") {
						Ok(())
					} else {
						Err("key_name must be a full crypto key version resource name".into())
					}
				}),
				Field::new("access_token", FieldType::String).with_validator(|value| {
					match value.as_str() {
						Some(token) if !token.trim().is_empty() => Ok(()),
						_ => Err("access_token cannot be empty".into()),
					}
				}),
			],
			vec![
				Field::new("endpoint", FieldType::String),
				Field::new(
					"timeout_seconds",
					FieldType::Integer {
						min: Some(1),
						max: Some(600),
					},
				),
				Field::new("cache_public_key", FieldType::Boolean),
			],
		);
		schema.validate(config)
	}
}

/// Factory function to create a Cloud KMS backed signer from configuration.
///
/// Configuration parameters:
/// - `key_name`: crypto key version resource name
/// - `access_token`: OAuth2 bearer token for the KMS API
/// - `endpoint` (optional): defaults to [`DEFAULT_ENDPOINT`]
/// - `timeout_seconds` (optional): HTTP timeout, defaults to 30
/// - `cache_public_key` (optional): defaults to true
pub fn create_account(
	config: &toml::Value,
	chain_id: ChainId,
) -> Result<Box<dyn SigningCapability>, AccountError> {
	GcpKmsSchema
		.validate(config)
		.map_err(|e| AccountError::Configuration(format!("Invalid configuration: {}", e)))?;

	let key_name = config
		.get("key_name")
		.and_then(|v| v.as_str())
		.ok_or_else(|| AccountError::Configuration("key_name is required".into()))?;
	let access_token = config
		.get("access_token")
		.and_then(|v| v.as_str())
		.map(SecretString::from)
		.ok_or_else(|| AccountError::Configuration("access_token is required".into()))?;
	let endpoint = config
		.get("endpoint")
		.and_then(|v| v.as_str())
		.unwrap_or(DEFAULT_ENDPOINT);
	let timeout_seconds = config
		.get("timeout_seconds")
		.and_then(|v| v.as_integer())
		.map(|v| v as u64)
		.unwrap_or(DEFAULT_TIMEOUT_SECONDS);
	let cache_public_key = config
		.get("cache_public_key")
		.and_then(|v| v.as_bool())
		.unwrap_or(true);

	let client = GcpKmsClient::new(
		endpoint,
		access_token,
		Duration::from_secs(timeout_seconds),
	)
	.map_err(|e| AccountError::Configuration(e.to_string()))?;

	tracing::info!(key = %key_name, endpoint = %endpoint, chain_id, "Configured Cloud KMS signer");

	let signer = RecoverableSigner::new(Arc::new(client), KeyHandle::new(key_name), chain_id);
	let signer = if cache_public_key {
		signer
	} else {
		signer.without_key_cache()
	};

	Ok(Box::new(signer))
}

/// Registry for the Cloud KMS implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "gcp_kms";
	type Factory = AccountFactory;

	fn factory() -> Self::Factory {
		create_account
	}
}

impl AccountRegistry for Registry {}
