//! Recoverable signatures on top of a non-recoverable remote signer.
//!
//! Cloud key services sign a digest and hand back a DER `(r, s)` pair with no
//! recovery id, while Ethereum transactions carry no public key and need `v`
//! so the sender can be recovered from the signature alone. This adapter
//! normalizes `s` into the lower half of the curve order, then tries both
//! recovery ids and keeps the one that recovers to the key's own address.

use crate::{AccountError, RemoteSigner, SigningCapability};
use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use signer_types::{
	crc32c, decode_public_key, public_key_to_address, recover_address, Address,
	CanonicalSignature, ChainId, KeyHandle, KeyIdentity, RawSignature, B256,
};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Cached key identity with a guard so concurrent misses fetch once.
#[derive(Default)]
struct KeyCache {
	identity: ArcSwapOption<KeyIdentity>,
	refresh: Mutex<()>,
}

/// [`SigningCapability`] backed by a remote, non-recoverable ECDSA signer.
pub struct RecoverableSigner {
	remote: Arc<dyn RemoteSigner>,
	key: KeyHandle,
	chain_id: ChainId,
	/// `None` when caching is disabled and every call refetches the key.
	cache: Option<KeyCache>,
}

impl RecoverableSigner {
	/// Creates a signer for `key` with public key caching enabled.
	pub fn new(remote: Arc<dyn RemoteSigner>, key: KeyHandle, chain_id: ChainId) -> Self {
		Self {
			remote,
			key,
			chain_id,
			cache: Some(KeyCache::default()),
		}
	}

	/// Disables the public key cache.
	pub fn without_key_cache(mut self) -> Self {
		self.cache = None;
		self
	}

	/// Returns the remote key this signer uses.
	pub fn key_handle(&self) -> &KeyHandle {
		&self.key
	}

	/// Drops the cached public key so the next call fetches it again.
	///
	/// Use after rotating the key version behind the handle.
	pub fn invalidate_key_cache(&self) {
		if let Some(cache) = &self.cache {
			cache.identity.store(None);
			tracing::debug!(key = %self.key, "Invalidated public key cache");
		}
	}

	/// Returns the public key and address, from the cache when possible.
	pub async fn key_identity(&self) -> Result<Arc<KeyIdentity>, AccountError> {
		let Some(cache) = &self.cache else {
			return self.fetch_key_identity().await.map(Arc::new);
		};

		if let Some(identity) = cache.identity.load_full() {
			return Ok(identity);
		}

		let _guard = cache.refresh.lock().await;
		// Another caller may have filled the cache while we waited
		if let Some(identity) = cache.identity.load_full() {
			return Ok(identity);
		}

		let identity = Arc::new(self.fetch_key_identity().await?);
		cache.identity.store(Some(identity.clone()));
		tracing::debug!(key = %self.key, address = %identity.address, "Cached public key");

		Ok(identity)
	}

	async fn fetch_key_identity(&self) -> Result<KeyIdentity, AccountError> {
		let response = self
			.remote
			.get_public_key(&self.key)
			.await
			.map_err(|e| AccountError::KeyRetrieval(e.to_string()))?;

		let actual = crc32c(&response.key_material);
		if actual != response.crc32c {
			tracing::warn!(
				key = %self.key,
				expected = response.crc32c,
				actual,
				"Public key response corrupted in transit"
			);
			return Err(AccountError::Integrity {
				expected: response.crc32c,
				actual,
			});
		}

		let public_key = decode_public_key(&response.key_material)
			.map_err(|e| AccountError::KeyRetrieval(e.to_string()))?;
		let address = public_key_to_address(&public_key)
			.map_err(|e| AccountError::KeyRetrieval(e.to_string()))?;

		Ok(KeyIdentity {
			public_key,
			address,
		})
	}
}

#[async_trait]
impl SigningCapability for RecoverableSigner {
	async fn sign_digest(&self, digest: &B256) -> Result<CanonicalSignature, AccountError> {
		let der = self
			.remote
			.sign(&self.key, digest)
			.await
			.map_err(|e| AccountError::RemoteSigning(e.to_string()))?;

		// EIP-2: only the lower s is valid on chain
		let rs = RawSignature::from_der(&der)
			.map_err(|e| AccountError::RemoteSigning(e.to_string()))?
			.normalize_s()
			.to_bytes();

		let address = self.address().await?;

		for recovery_id in [0u8, 1] {
			match recover_address(digest, &rs, recovery_id) {
				Ok(candidate) if candidate == address => {
					tracing::debug!(key = %self.key, %address, recovery_id, "Signed digest");
					return CanonicalSignature::from_parts(rs, recovery_id)
						.map_err(|e| AccountError::RemoteSigning(e.to_string()));
				},
				Ok(_) => {},
				Err(e) => {
					tracing::trace!(recovery_id, error = %e, "Recovery candidate rejected");
				},
			}
		}

		tracing::warn!(
			key = %self.key,
			%address,
			"Remote signature does not recover to the key address"
		);
		Err(AccountError::RecoveryFailure { address })
	}

	async fn address(&self) -> Result<Address, AccountError> {
		Ok(self.key_identity().await?.address)
	}

	fn chain_id(&self) -> ChainId {
		self.chain_id
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::implementations::memory::MemoryKms;
	use crate::{MockRemoteSigner, PublicKeyResponse, RemoteError};
	use alloy_primitives::{address, hex};
	use k256::ecdsa::signature::hazmat::PrehashSigner;
	use k256::ecdsa::{Signature, SigningKey};
	use k256::pkcs8::{EncodePublicKey, LineEnding};
	use signer_types::SECP256K1_HALF_N;

	const TEST_KEY: [u8; 32] =
		hex!("4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318");
	const TEST_ADDRESS: Address = address!("2c7536E3605D9C16a7a3D7b1898e529396a65c23");

	fn test_key() -> SigningKey {
		SigningKey::from_slice(&TEST_KEY).unwrap()
	}

	fn key_handle() -> KeyHandle {
		KeyHandle::new("projects/p/locations/global/keyRings/r/cryptoKeys/k/cryptoKeyVersions/1")
	}

	fn memory_signer(kms: MemoryKms) -> RecoverableSigner {
		RecoverableSigner::new(Arc::new(kms), key_handle(), 1)
	}

	fn pem_response(key: &SigningKey) -> PublicKeyResponse {
		let pem = k256::PublicKey::from(key.verifying_key())
			.to_public_key_pem(LineEnding::LF)
			.unwrap();
		let key_material = pem.into_bytes();
		PublicKeyResponse {
			crc32c: crc32c(&key_material),
			key_material,
		}
	}

	fn assert_canonical(signature: &CanonicalSignature, digest: &B256) {
		assert_eq!(signature.as_bytes().len(), 65);
		assert!(signature.s() <= *SECP256K1_HALF_N);
		assert!(signature.recovery_id() <= 1);
		assert_eq!(signature.recover_address(digest).unwrap(), TEST_ADDRESS);
	}

	#[tokio::test]
	async fn test_sign_fixed_digest() {
		let signer = memory_signer(MemoryKms::new(test_key()));
		let digest = B256::with_last_byte(1);

		assert_eq!(signer.address().await.unwrap(), TEST_ADDRESS);
		assert_eq!(signer.chain_id(), 1);

		let signature = signer.sign_digest(&digest).await.unwrap();
		assert_canonical(&signature, &digest);
	}

	#[tokio::test]
	async fn test_high_s_is_normalized() {
		let signer = memory_signer(MemoryKms::new(test_key()).with_high_s(true));

		for byte in 1..=8u8 {
			let digest = B256::repeat_byte(byte);
			let signature = signer.sign_digest(&digest).await.unwrap();
			assert_canonical(&signature, &digest);
		}
	}

	#[tokio::test]
	async fn test_short_r_and_s_are_left_padded() {
		let signer = memory_signer(MemoryKms::new(test_key()));
		let mut short_r = false;
		let mut short_s = false;

		for i in 0..20_000u64 {
			let digest = B256::left_padding_from(&i.to_be_bytes());
			let signature = signer.sign_digest(&digest).await.unwrap();
			let bytes = signature.as_bytes();

			if bytes[0] == 0 && !short_r {
				short_r = true;
				assert_canonical(&signature, &digest);
			}
			if bytes[32] == 0 && !short_s {
				short_s = true;
				assert_canonical(&signature, &digest);
			}
			if short_r && short_s {
				return;
			}
		}
		panic!("no signature with a leading zero byte found");
	}

	#[tokio::test]
	async fn test_recovery_failure_for_foreign_signature() {
		let mut remote = MockRemoteSigner::new();
		let response = pem_response(&test_key());
		remote
			.expect_get_public_key()
			.returning(move |_| Ok(response.clone()));
		remote.expect_sign().returning(|_, digest| {
			let other = SigningKey::from_slice(B256::with_last_byte(2).as_slice()).unwrap();
			let signature: Signature = other.sign_prehash(digest.as_slice()).unwrap();
			Ok(signature.to_der().as_bytes().to_vec())
		});

		let signer = RecoverableSigner::new(Arc::new(remote), key_handle(), 1);
		let result = signer.sign_digest(&B256::with_last_byte(1)).await;

		assert!(matches!(
			result,
			Err(AccountError::RecoveryFailure { address }) if address == TEST_ADDRESS
		));
	}

	#[tokio::test]
	async fn test_integrity_failure() {
		let mut remote = MockRemoteSigner::new();
		let mut response = pem_response(&test_key());
		response.crc32c = response.crc32c.wrapping_add(1);
		remote
			.expect_get_public_key()
			.returning(move |_| Ok(response.clone()));

		let signer = RecoverableSigner::new(Arc::new(remote), key_handle(), 1);
		assert!(matches!(
			signer.address().await,
			Err(AccountError::Integrity { .. })
		));
		assert!(matches!(
			signer.key_identity().await,
			Err(AccountError::Integrity { .. })
		));
	}

	#[tokio::test]
	async fn test_key_retrieval_errors() {
		let mut remote = MockRemoteSigner::new();
		remote
			.expect_get_public_key()
			.times(1)
			.returning(|_| Err(RemoteError::Transport("connection refused".into())));
		let signer = RecoverableSigner::new(Arc::new(remote), key_handle(), 1);
		assert!(matches!(
			signer.address().await,
			Err(AccountError::KeyRetrieval(_))
		));

		let mut remote = MockRemoteSigner::new();
		remote.expect_get_public_key().returning(|_| {
			let key_material = b"not a public key".to_vec();
			Ok(PublicKeyResponse {
				crc32c: crc32c(&key_material),
				key_material,
			})
		});
		let signer = RecoverableSigner::new(Arc::new(remote), key_handle(), 1);
		assert!(matches!(
			signer.address().await,
			Err(AccountError::KeyRetrieval(_))
		));
	}

	#[tokio::test]
	async fn test_remote_signing_errors() {
		let mut remote = MockRemoteSigner::new();
		remote.expect_get_public_key().never();
		remote.expect_sign().times(1).returning(|_, _| {
			Err(RemoteError::Status {
				status: 403,
				message: "permission denied".into(),
			})
		});
		let signer = RecoverableSigner::new(Arc::new(remote), key_handle(), 1);
		assert!(matches!(
			signer.sign_digest(&B256::with_last_byte(1)).await,
			Err(AccountError::RemoteSigning(_))
		));

		let mut remote = MockRemoteSigner::new();
		remote
			.expect_sign()
			.returning(|_, _| Ok(vec![0x30, 0x06, 0x02, 0x01]));
		let signer = RecoverableSigner::new(Arc::new(remote), key_handle(), 1);
		assert!(matches!(
			signer.sign_digest(&B256::with_last_byte(1)).await,
			Err(AccountError::RemoteSigning(_))
		));
	}

	#[tokio::test]
	async fn test_public_key_is_fetched_once() {
		let mut remote = MockRemoteSigner::new();
		let response = pem_response(&test_key());
		remote
			.expect_get_public_key()
			.times(1)
			.returning(move |_| Ok(response.clone()));

		let signer = RecoverableSigner::new(Arc::new(remote), key_handle(), 1);
		let calls = (0..8).map(|_| signer.address());
		for address in futures::future::join_all(calls).await {
			assert_eq!(address.unwrap(), TEST_ADDRESS);
		}
		assert_eq!(signer.address().await.unwrap(), TEST_ADDRESS);

		let identity = signer.key_identity().await.unwrap();
		assert_eq!(identity.public_key.len(), 65);
	}

	#[tokio::test]
	async fn test_public_key_refetched_without_cache() {
		let mut remote = MockRemoteSigner::new();
		let response = pem_response(&test_key());
		remote
			.expect_get_public_key()
			.times(3)
			.returning(move |_| Ok(response.clone()));

		let signer =
			RecoverableSigner::new(Arc::new(remote), key_handle(), 1).without_key_cache();
		for _ in 0..3 {
			assert_eq!(signer.address().await.unwrap(), TEST_ADDRESS);
		}
	}

	#[tokio::test]
	async fn test_invalidate_key_cache() {
		let mut remote = MockRemoteSigner::new();
		let response = pem_response(&test_key());
		remote
			.expect_get_public_key()
			.times(2)
			.returning(move |_| Ok(response.clone()));

		let signer = RecoverableSigner::new(Arc::new(remote), key_handle(), 1);
		signer.address().await.unwrap();
		signer.address().await.unwrap();
		signer.invalidate_key_cache();
		signer.address().await.unwrap();
	}
}
