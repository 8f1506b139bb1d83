//! Factory registry for signing backends.
//!
//! Maps the implementation names used in `[account.implementations]` to the
//! factory functions exported by `signer-account`.

use signer_account::{get_all_implementations, AccountFactory, SigningCapability};
use signer_config::Config;
use std::collections::HashMap;

/// Registry of account factories by configuration name.
pub struct FactoryRegistry {
	account: HashMap<String, AccountFactory>,
}

impl FactoryRegistry {
	/// Creates an empty registry.
	pub fn new() -> Self {
		Self {
			account: HashMap::new(),
		}
	}

	/// Registers `factory` under `name`, replacing any previous entry.
	pub fn register_account(&mut self, name: impl Into<String>, factory: AccountFactory) {
		self.account.insert(name.into(), factory);
	}

	/// Looks up the factory registered under `name`.
	pub fn account_factory(&self, name: &str) -> Option<AccountFactory> {
		self.account.get(name).copied()
	}
}

impl Default for FactoryRegistry {
	fn default() -> Self {
		let mut registry = Self::new();
		for (name, factory) in get_all_implementations() {
			registry.register_account(name, factory);
		}
		registry
	}
}

/// Builds the primary signing backend named in the configuration.
pub fn build_capability(
	config: &Config,
) -> Result<Box<dyn SigningCapability>, Box<dyn std::error::Error>> {
	let (name, implementation_config) = config
		.primary_account()
		.ok_or("primary account implementation is not configured")?;

	let factory = FactoryRegistry::default()
		.account_factory(name)
		.ok_or_else(|| format!("unknown account implementation '{}'", name))?;

	tracing::debug!(implementation = %name, "Building signing backend");
	Ok(factory(implementation_config, config.network.chain_id)?)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_default_registry() {
		let registry = FactoryRegistry::default();
		assert!(registry.account_factory("gcp_kms").is_some());
		assert!(registry.account_factory("local").is_some());
		assert!(registry.account_factory("memory_kms").is_some());
		assert!(registry.account_factory("aws_kms").is_none());
	}

	#[test]
	fn test_unknown_implementation() {
		let config: Config = r#"
[network]
chain_id = 1

[account]
primary = "vault"

[account.implementations.vault]
path = "secret/eth"
"#
		.parse()
		.unwrap();

		let result = build_capability(&config);
		assert!(result.is_err());
	}

	#[test]
	fn test_invalid_backend_config() {
		let config: Config = r#"
[network]
chain_id = 1

[account]
primary = "local"

[account.implementations.local]
private_key = "not hex"
"#
		.parse()
		.unwrap();

		assert!(build_capability(&config).is_err());
	}
}
