//! Main entry point for the cloud signer.
//!
//! Loads the configuration, builds the primary signing backend and runs one
//! command against it: print the signer address, sign a raw digest, or sign
//! an EIP-1559 value transfer and print the encoded transaction.

use alloy_consensus::{TxEip1559, TypedTransaction};
use alloy_eips::eip2718::Encodable2718;
use alloy_primitives::{hex, Address, TxKind, B256, U256};
use clap::{Parser, Subcommand};
use signer_account::SigningCapability;
use signer_config::Config;
use signer_transact::TransactOpts;
use std::path::PathBuf;
use std::sync::Arc;

mod factory_registry;

/// Command-line arguments for the cloud signer.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config.toml")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Print the address of the configured key
	Address,
	/// Sign a 32-byte hex digest and print the 65-byte signature
	SignDigest {
		/// Digest to sign, 0x prefixed hex
		digest: B256,
	},
	/// Sign an EIP-1559 value transfer and print the raw transaction
	SignTransfer {
		/// Recipient address
		#[arg(long)]
		to: Address,
		/// Amount in wei
		#[arg(long)]
		value: U256,
		/// Sender nonce
		#[arg(long)]
		nonce: u64,
		#[arg(long, default_value_t = 21_000)]
		gas_limit: u64,
		/// Max fee per gas in wei
		#[arg(long, default_value_t = 30_000_000_000)]
		max_fee_per_gas: u128,
		/// Max priority fee per gas in wei
		#[arg(long, default_value_t = 1_000_000_000)]
		max_priority_fee_per_gas: u128,
	},
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	use tracing_subscriber::{fmt, EnvFilter};

	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

	// Logs go to stderr so command output stays pipeable
	fmt()
		.with_env_filter(env_filter)
		.with_writer(std::io::stderr)
		.with_target(true)
		.init();

	let config_path = args
		.config
		.to_str()
		.ok_or("configuration path is not valid UTF-8")?;
	let config = Config::from_file(config_path).await?;
	tracing::info!(
		chain_id = config.network.chain_id,
		account = %config.account.primary,
		"Loaded configuration"
	);

	let capability: Arc<dyn SigningCapability> =
		Arc::from(factory_registry::build_capability(&config)?);

	let output = run(args.command, capability).await?;
	println!("{}", output);
	Ok(())
}

/// Runs one command against the capability and returns what to print.
async fn run(
	command: Command,
	capability: Arc<dyn SigningCapability>,
) -> Result<String, Box<dyn std::error::Error>> {
	match command {
		Command::Address => Ok(capability.address().await?.to_checksum(None)),
		Command::SignDigest { digest } => {
			let signature = capability.sign_digest(&digest).await?;
			Ok(signature.to_string())
		},
		Command::SignTransfer {
			to,
			value,
			nonce,
			gas_limit,
			max_fee_per_gas,
			max_priority_fee_per_gas,
		} => {
			let opts = TransactOpts::new(capability).await?;
			let tx = TypedTransaction::Eip1559(TxEip1559 {
				chain_id: opts.chain_id(),
				nonce,
				gas_limit,
				max_fee_per_gas,
				max_priority_fee_per_gas,
				to: TxKind::Call(to),
				value,
				..Default::default()
			});

			let envelope = opts.sign(opts.from, tx).await?;
			Ok(hex::encode_prefixed(envelope.encoded_2718()))
		},
	}
}
