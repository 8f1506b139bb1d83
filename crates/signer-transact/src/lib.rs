//! Transaction authorization module for the cloud signer system.
//!
//! Binds a [`SigningCapability`] to the transaction signing hook of the
//! client library: given a sender address and an unsigned transaction, check
//! that the sender is the bound key, hash the transaction under the chain's
//! signing rule, sign the hash through the capability and embed the result.

use alloy_consensus::{SignableTransaction, Signed, TxEnvelope, TypedTransaction};
use alloy_primitives::Signature;
use futures::future::BoxFuture;
use signer_account::{AccountError, SigningCapability};
use signer_types::{Address, CanonicalSignature, ChainId, B256};
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur while authorizing a transaction.
#[derive(Debug, Error)]
pub enum TransactError {
	/// Signing was requested for an address the capability does not control.
	#[error("Not authorized to sign for {requested}: bound to {bound}")]
	Unauthorized { requested: Address, bound: Address },
	/// The transaction targets a different chain than the bound signer.
	#[error("Chain mismatch: signer is bound to chain {expected}, transaction has {actual}")]
	ChainMismatch { expected: ChainId, actual: ChainId },
	/// The signing capability failed.
	#[error(transparent)]
	Account(#[from] AccountError),
}

/// Signing hook in the shape the client library expects.
pub type SignerFn = Arc<
	dyn Fn(Address, TypedTransaction) -> BoxFuture<'static, Result<TxEnvelope, TransactError>>
		+ Send
		+ Sync,
>;

/// Transaction hashing rule for one chain.
///
/// Every transaction signed under the rule is pinned to the rule's chain id,
/// which makes legacy transactions replay protected (EIP-155) and leaves the
/// typed transactions (EIP-2930, EIP-1559, EIP-4844, EIP-7702) as they are.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SigningRule {
	chain_id: ChainId,
}

impl SigningRule {
	/// Returns the rule accepting every transaction type known for `chain_id`.
	pub fn latest_for_chain_id(chain_id: ChainId) -> Self {
		Self { chain_id }
	}

	/// Returns the chain id transactions are pinned to.
	pub fn chain_id(&self) -> ChainId {
		self.chain_id
	}

	/// Computes the digest to sign for `tx`, setting its chain id first.
	pub fn signature_hash<T>(&self, tx: &mut T) -> Result<B256, TransactError>
	where
		T: SignableTransaction<Signature>,
	{
		if !tx.set_chain_id_checked(self.chain_id) {
			return Err(TransactError::ChainMismatch {
				expected: self.chain_id,
				actual: tx.chain_id().unwrap_or_default(),
			});
		}
		Ok(tx.signature_hash())
	}

	/// Embeds `signature` into `tx`.
	pub fn attach<T>(&self, tx: T, signature: CanonicalSignature) -> Signed<T>
	where
		T: SignableTransaction<Signature>,
	{
		tx.into_signed(signature.into())
	}
}

/// Transaction options bound to one signing capability.
///
/// Holds only the resolved sender address, the signing rule and the
/// capability, so it can be cloned and used from many tasks at once.
#[derive(Clone)]
pub struct TransactOpts {
	/// The address every transaction is signed for.
	pub from: Address,
	rule: SigningRule,
	capability: Arc<dyn SigningCapability>,
}

impl TransactOpts {
	/// Resolves the capability's address and chain id and binds to them.
	pub async fn new(capability: Arc<dyn SigningCapability>) -> Result<Self, TransactError> {
		let from = capability.address().await?;
		let rule = SigningRule::latest_for_chain_id(capability.chain_id());

		tracing::debug!(address = %from, chain_id = rule.chain_id(), "Bound transaction signer");

		Ok(Self {
			from,
			rule,
			capability,
		})
	}

	/// Returns the chain id of the bound signer.
	pub fn chain_id(&self) -> ChainId {
		self.rule.chain_id()
	}

	/// Returns the signing rule used for hashing.
	pub fn rule(&self) -> SigningRule {
		self.rule
	}

	/// Signs `tx` on behalf of `from`.
	///
	/// Fails without contacting the signer if `from` is not the bound address.
	pub async fn sign(
		&self,
		from: Address,
		mut tx: TypedTransaction,
	) -> Result<TxEnvelope, TransactError> {
		if from != self.from {
			return Err(TransactError::Unauthorized {
				requested: from,
				bound: self.from,
			});
		}

		let digest = self.rule.signature_hash(&mut tx)?;
		let signature = self.capability.sign_digest(&digest).await?;
		let envelope: TxEnvelope = self.rule.attach(tx, signature).into();

		tracing::info!(
			from = %from,
			chain_id = self.rule.chain_id(),
			tx_hash = %envelope.tx_hash(),
			"Signed transaction"
		);

		Ok(envelope)
	}

	/// Returns the signing hook as a boxed closure.
	pub fn signer_fn(&self) -> SignerFn {
		let opts = self.clone();
		Arc::new(move |from, tx| {
			let opts = opts.clone();
			Box::pin(async move { opts.sign(from, tx).await })
		})
	}
}
