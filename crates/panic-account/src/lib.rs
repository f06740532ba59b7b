//! Account management for off-chain relay authorizations.
//!
//! A user whose wallet holds no gas signs a `RelayPanic` authorization with
//! their key and hands it to a relayer. This crate provides the signing
//! abstraction and a local private-key implementation.

use alloy_primitives::{Address, Bytes, B256};
use async_trait::async_trait;
use panic_types::{ConfigSchema, ImplementationRegistry, RelayPanicRequest, SigningDomain};
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod local;
}

/// Errors that can occur during account operations.
#[derive(Debug, Error)]
pub enum AccountError {
	/// Error that occurs when signing operations fail.
	#[error("Signing failed: {0}")]
	SigningFailed(String),
	/// Error that occurs when a cryptographic key is invalid or malformed.
	#[error("Invalid key: {0}")]
	InvalidKey(String),
	/// Error that occurs when interacting with the account implementation.
	#[error("Implementation error: {0}")]
	Implementation(String),
}

/// Trait defining the interface for account implementations.
#[async_trait]
pub trait AccountInterface: Send + Sync {
	/// Returns the configuration schema for this account implementation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Retrieves the address associated with this account.
	async fn address(&self) -> Result<Address, AccountError>;

	/// Signs a 32-byte digest without any prefix.
	///
	/// Returns the 65-byte `r || s || v` signature with `v` in {27, 28}.
	async fn sign_hash(&self, digest: &B256) -> Result<Bytes, AccountError>;
}

/// Type alias for account factory functions.
pub type AccountFactory = fn(&toml::Value) -> Result<Box<dyn AccountInterface>, AccountError>;

/// Registry trait for account implementations.
pub trait AccountRegistry: ImplementationRegistry<Factory = AccountFactory> {}

/// Get all registered account implementations.
///
/// Returns a vector of (name, factory) tuples for all available account implementations.
pub fn get_all_implementations() -> Vec<(&'static str, AccountFactory)> {
	use implementations::local;

	vec![(local::Registry::NAME, local::Registry::factory())]
}

/// Service that manages account operations.
pub struct AccountService {
	/// The underlying account implementation.
	implementation: Box<dyn AccountInterface>,
}

impl AccountService {
	pub fn new(implementation: Box<dyn AccountInterface>) -> Self {
		Self { implementation }
	}

	pub async fn get_address(&self) -> Result<Address, AccountError> {
		self.implementation.address().await
	}

	/// Signs a relay authorization for the vault described by `domain`.
	///
	/// The digest is computed with the same function the vault uses to verify
	/// it, so a signature produced here always recovers to this account on
	/// that vault.
	pub async fn sign_relay_request(
		&self,
		request: &RelayPanicRequest,
		domain: &SigningDomain,
	) -> Result<Bytes, AccountError> {
		let address = self.get_address().await?;
		if address != request.user {
			return Err(AccountError::SigningFailed(format!(
				"Request is for {} but this account is {}",
				request.user, address
			)));
		}
		self.implementation
			.sign_hash(&request.signing_digest(domain))
			.await
	}
}
