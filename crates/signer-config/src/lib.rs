//! Configuration module for the cloud signer.
//!
//! Loads the signer configuration from a TOML file. Values may reference
//! environment variables as `${VAR}` or `${VAR:-default}`, which keeps access
//! tokens and private keys out of the file itself.
//!
//! ```toml
//! [network]
//! chain_id = 11155111
//!
//! [account]
//! primary = "gcp_kms"
//!
//! [account.implementations.gcp_kms]
//! key_name = "projects/p/locations/global/keyRings/r/cryptoKeys/k/cryptoKeyVersions/1"
//! access_token = "${GCP_ACCESS_TOKEN}"
//! ```

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error that occurs during file I/O operations.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// Error that occurs when parsing TOML configuration.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// Error that occurs when configuration validation fails.
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// Keep the message, not the input dump
		ConfigError::Parse(err.message().to_string())
	}
}

/// Main configuration structure for the cloud signer.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Chain the signer produces transactions for.
	pub network: NetworkConfig,
	/// Signing backend selection and settings.
	pub account: AccountConfig,
}

/// Chain configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NetworkConfig {
	/// EIP-155 chain id.
	pub chain_id: u64,
}

/// Configuration for account management.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AccountConfig {
	/// Which implementation to use as primary.
	pub primary: String,
	/// Map of account implementation names to their configurations.
	/// Each implementation validates its own table.
	pub implementations: HashMap<String, toml::Value>,
}

/// Resolves environment variables in a string.
///
/// Replaces ${VAR_NAME} with the value of the environment variable VAR_NAME.
/// Supports default values with ${VAR_NAME:-default_value}.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	// Bound the input the regex runs over
	const MAX_INPUT_SIZE: usize = 1024 * 1024;
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut result = String::with_capacity(input.len());
	let mut last = 0;

	for cap in re.captures_iter(input) {
		let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
			continue;
		};

		let value = match std::env::var(var_name.as_str()) {
			Ok(v) => v,
			Err(_) => match cap.get(2) {
				Some(default) => default.as_str().to_string(),
				None => {
					return Err(ConfigError::Validation(format!(
						"Environment variable '{}' not found",
						var_name.as_str()
					)))
				},
			},
		};

		result.push_str(&input[last..full_match.start()]);
		result.push_str(&value);
		last = full_match.end();
	}
	result.push_str(&input[last..]);

	Ok(result)
}

impl Config {
	/// Loads configuration from a file, resolving environment variables.
	pub async fn from_file(path: &str) -> Result<Self, ConfigError> {
		let content = tokio::fs::read_to_string(path).await?;
		content.parse()
	}

	/// Returns the name and configuration table of the primary implementation.
	pub fn primary_account(&self) -> Option<(&str, &toml::Value)> {
		self.account
			.implementations
			.get(&self.account.primary)
			.map(|config| (self.account.primary.as_str(), config))
	}

	/// Validates the configuration.
	///
	/// - The chain id must be non-zero
	/// - At least one account implementation must be configured
	/// - The primary account implementation must be one of them
	fn validate(&self) -> Result<(), ConfigError> {
		if self.network.chain_id == 0 {
			return Err(ConfigError::Validation(
				"network.chain_id must be greater than 0".into(),
			));
		}

		if self.account.implementations.is_empty() {
			return Err(ConfigError::Validation(
				"At least one account implementation must be configured".into(),
			));
		}
		if self.account.primary.is_empty() {
			return Err(ConfigError::Validation(
				"Account primary implementation cannot be empty".into(),
			));
		}
		if !self
			.account
			.implementations
			.contains_key(&self.account.primary)
		{
			return Err(ConfigError::Validation(format!(
				"Primary account '{}' not found in implementations",
				self.account.primary
			)));
		}

		Ok(())
	}
}

impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::fs;
	use tempfile::TempDir;

	const KEY_NAME: &str =
		"projects/p/locations/global/keyRings/r/cryptoKeys/k/cryptoKeyVersions/1";

	#[test]
	fn test_env_var_resolution() {
		std::env::set_var("SIGNER_TEST_HOST", "localhost");
		std::env::set_var("SIGNER_TEST_PORT", "8080");

		let input = "endpoint = \"http://${SIGNER_TEST_HOST}:${SIGNER_TEST_PORT}\"";
		let result = resolve_env_vars(input).unwrap();
		assert_eq!(result, "endpoint = \"http://localhost:8080\"");

		std::env::remove_var("SIGNER_TEST_HOST");
		std::env::remove_var("SIGNER_TEST_PORT");
	}

	#[test]
	fn test_env_var_with_default() {
		let input = "value = \"${SIGNER_MISSING_VAR:-default_value}\"";
		let result = resolve_env_vars(input).unwrap();
		assert_eq!(result, "value = \"default_value\"");
	}

	#[test]
	fn test_missing_env_var_error() {
		let input = "value = \"${SIGNER_MISSING_VAR}\"";
		let result = resolve_env_vars(input);
		assert!(result.is_err());
		assert!(result.unwrap_err().to_string().contains("SIGNER_MISSING_VAR"));
	}

	#[test]
	fn test_parse_config_with_env_vars() {
		std::env::set_var("SIGNER_TEST_TOKEN", "ya29.token");

		let config_str = format!(
			r#"
[network]
chain_id = 11155111

[account]
primary = "gcp_kms"

[account.implementations.gcp_kms]
key_name = "{}"
access_token = "${{SIGNER_TEST_TOKEN}}"
"#,
			KEY_NAME
		);
		let config: Config = config_str.parse().unwrap();

		assert_eq!(config.network.chain_id, 11155111);
		let (name, table) = config.primary_account().unwrap();
		assert_eq!(name, "gcp_kms");
		assert_eq!(table["access_token"].as_str(), Some("ya29.token"));

		std::env::remove_var("SIGNER_TEST_TOKEN");
	}

	#[test]
	fn test_primary_must_be_configured() {
		let config_str = r#"
[network]
chain_id = 1

[account]
primary = "gcp_kms"

[account.implementations.local]
private_key = "0x01"
"#;
		let result: Result<Config, _> = config_str.parse();
		assert!(matches!(result, Err(ConfigError::Validation(msg)) if msg.contains("gcp_kms")));
	}

	#[test]
	fn test_invalid_chain_id() {
		let config_str = r#"
[network]
chain_id = 0

[account]
primary = "local"

[account.implementations.local]
private_key = "0x01"
"#;
		assert!(matches!(
			config_str.parse::<Config>(),
			Err(ConfigError::Validation(_))
		));

		let negative = config_str.replace("chain_id = 0", "chain_id = -1");
		assert!(matches!(
			negative.parse::<Config>(),
			Err(ConfigError::Parse(_))
		));
	}

	#[tokio::test]
	async fn test_from_file() {
		let temp_dir = TempDir::new().unwrap();
		let config_path = temp_dir.path().join("signer.toml");
		fs::write(
			&config_path,
			r#"
[network]
chain_id = 31337

[account]
primary = "memory_kms"

[account.implementations.memory_kms]
private_key = "0x0000000000000000000000000000000000000000000000000000000000000001"
high_s = true
"#,
		)
		.unwrap();

		let config = Config::from_file(config_path.to_str().unwrap())
			.await
			.unwrap();
		assert_eq!(config.network.chain_id, 31337);
		assert_eq!(config.account.primary, "memory_kms");

		let missing = Config::from_file(temp_dir.path().join("missing.toml").to_str().unwrap()).await;
		assert!(matches!(missing, Err(ConfigError::Io(_))));
	}
}
