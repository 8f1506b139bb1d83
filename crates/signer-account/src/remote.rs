//! Remote signing service contract.
//!
//! A key custody service that can hand out a public key and sign digests
//! with the matching private key, without ever exposing it. The signature it
//! returns is a plain DER `(r, s)` pair; turning it into an Ethereum
//! signature is the job of
//! [`RecoverableSigner`](crate::implementations::recoverable::RecoverableSigner).

use async_trait::async_trait;
use signer_types::{KeyHandle, B256};
use thiserror::Error;

/// Errors reported by a remote signing service client.
#[derive(Debug, Error)]
pub enum RemoteError {
	/// The request never produced a response.
	#[error("Transport error: {0}")]
	Transport(String),
	/// The service answered with an error status.
	#[error("Service returned {status}: {message}")]
	Status { status: u16, message: String },
	/// The response could not be decoded.
	#[error("Malformed response: {0}")]
	Malformed(String),
	/// A checksum carried by the response did not match its payload.
	#[error("Integrity check failed: {0}")]
	Integrity(String),
}

/// Public key material as returned by the remote service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKeyResponse {
	/// Encoded key material (PEM SubjectPublicKeyInfo or SEC1 bytes).
	pub key_material: Vec<u8>,
	/// CRC32C of `key_material` as computed by the service.
	pub crc32c: u32,
}

/// Client for a remote, non-recoverable ECDSA signer.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait RemoteSigner: Send + Sync {
	/// Fetches the public key of `key`.
	async fn get_public_key(&self, key: &KeyHandle) -> Result<PublicKeyResponse, RemoteError>;

	/// Signs `digest` with `key`, returning an ASN.1 DER encoded `(r, s)`.
	async fn sign(&self, key: &KeyHandle, digest: &B256) -> Result<Vec<u8>, RemoteError>;
}
