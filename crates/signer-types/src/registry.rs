//! Registry trait for self-registering implementations.
//!
//! Every signing backend module provides a `Registry` type implementing this
//! trait so the binary can resolve backends by their configuration name.

/// Base trait for implementation registries.
///
/// Each implementation module must provide a Registry struct that implements
/// this trait, declaring its configuration name and its factory function.
pub trait ImplementationRegistry {
	/// The name used in configuration files to reference this implementation.
	///
	/// This matches the key used in the TOML configuration, for example
	/// "gcp_kms" for `[account.implementations.gcp_kms]`.
	const NAME: &'static str;

	/// The factory function type this implementation provides.
	type Factory;

	/// Get the factory function for this implementation.
	fn factory() -> Self::Factory;
}
