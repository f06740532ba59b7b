//! Builder for constructing a panic engine from configuration.
//!
//! Deploys the fee token, vault, relay and any configured ERC-20 ledgers,
//! wires them together the way a deployment script would, and restores the
//! runtime state from storage when a previous run left one behind.

use crate::engine::clock::{Clock, SystemClock};
use crate::engine::event_bus::EventBus;
use crate::engine::state::DeploymentState;
use crate::engine::{PanicEngine, World};
use panic_account::{AccountError, AccountInterface, AccountService};
use panic_config::Config;
use panic_relay::PanicRelay;
use panic_storage::{StorageError, StorageInterface, StorageService};
use panic_token::{Erc20Ledger, FeeToken, TokenRegistry};
use panic_types::{CallContext, EventLog, StorageKey};
use panic_vault::PanicVault;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

const EVENT_BUS_CAPACITY: usize = 1000;

/// Errors that can occur during engine construction.
#[derive(Debug, Error)]
pub enum BuilderError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Deployment failed: {0}")]
	Deployment(String),
	#[error("Storage error: {0}")]
	Storage(#[from] StorageError),
}

/// Factory functions for the pluggable backends, keyed by implementation name.
pub struct PanicFactories<SF, AF> {
	pub storage_factories: HashMap<String, SF>,
	pub account_factories: HashMap<String, AF>,
}

/// Builder for a [`PanicEngine`].
pub struct PanicBuilder {
	config: Config,
	clock: Arc<dyn Clock>,
}

impl PanicBuilder {
	pub fn new(config: Config) -> Self {
		Self {
			config,
			clock: Arc::new(SystemClock),
		}
	}

	/// Replaces the wall clock, e.g. with a [`crate::ManualClock`] in tests.
	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;
		self
	}

	pub async fn build<SF, AF>(
		self,
		factories: PanicFactories<SF, AF>,
	) -> Result<PanicEngine, BuilderError>
	where
		SF: Fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>,
		AF: Fn(&toml::Value) -> Result<Box<dyn AccountInterface>, AccountError>,
	{
		let storage = Arc::new(StorageService::new(self.create_storage(&factories)?));
		let account = Arc::new(AccountService::new(self.create_account(&factories)?));
		let account_address = account.get_address().await.map_err(|e| {
			BuilderError::Config(format!("Failed to get account address: {}", e))
		})?;

		let mut world = self.deploy()?;

		let vault_id = world.vault.address().to_string();
		if let Some(state) = storage
			.retrieve_optional::<DeploymentState>(StorageKey::Deployment.as_str(), &vault_id)
			.await?
		{
			tracing::info!(
				users = state.vault.safe_addresses.len(),
				relayers = state.relay.relayers.len(),
				"Restored deployment state from storage"
			);
			for relayer in world.restore(state, &self.config.relay.relayers) {
				tracing::warn!(
					relayer = %relayer,
					"Configured relayer was revoked at runtime and stays revoked"
				);
			}
		}

		tracing::info!(
			node = %self.config.node.id,
			chain_id = self.config.node.chain_id,
			vault = %world.vault.address(),
			relay = %world.relay.address(),
			account = %account_address,
			"Engine ready"
		);

		Ok(PanicEngine::new(
			self.config,
			world,
			storage,
			account,
			account_address,
			self.clock,
			EventBus::new(EVENT_BUS_CAPACITY),
		))
	}

	fn create_storage<SF, AF>(
		&self,
		factories: &PanicFactories<SF, AF>,
	) -> Result<Box<dyn StorageInterface>, BuilderError>
	where
		SF: Fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>,
	{
		let primary = &self.config.storage.primary;
		let config = self.config.storage.implementations.get(primary).ok_or_else(|| {
			BuilderError::Config(format!("Primary storage '{}' is not configured", primary))
		})?;
		let factory = factories.storage_factories.get(primary).ok_or_else(|| {
			BuilderError::Config(format!("Unknown storage implementation '{}'", primary))
		})?;

		match factory(config) {
			Ok(implementation) => {
				tracing::info!(component = "storage", implementation = %primary, "Loaded");
				Ok(implementation)
			},
			Err(e) => {
				tracing::error!(
					component = "storage",
					implementation = %primary,
					error = %e,
					"Failed to create storage implementation"
				);
				Err(BuilderError::Config(format!(
					"Failed to create storage implementation '{}': {}",
					primary, e
				)))
			},
		}
	}

	fn create_account<SF, AF>(
		&self,
		factories: &PanicFactories<SF, AF>,
	) -> Result<Box<dyn AccountInterface>, BuilderError>
	where
		AF: Fn(&toml::Value) -> Result<Box<dyn AccountInterface>, AccountError>,
	{
		let primary = &self.config.account.primary;
		let config = self.config.account.implementations.get(primary).ok_or_else(|| {
			BuilderError::Config(format!("Primary account '{}' is not configured", primary))
		})?;
		let factory = factories.account_factories.get(primary).ok_or_else(|| {
			BuilderError::Config(format!("Unknown account implementation '{}'", primary))
		})?;

		match factory(config) {
			Ok(implementation) => {
				tracing::info!(component = "account", implementation = %primary, "Loaded");
				Ok(implementation)
			},
			Err(e) => {
				tracing::error!(
					component = "account",
					implementation = %primary,
					error = %e,
					"Failed to create account implementation"
				);
				Err(BuilderError::Config(format!(
					"Failed to create account implementation '{}': {}",
					primary, e
				)))
			},
		}
	}

	/// Deploys every contract as the configured owner.
	fn deploy(&self) -> Result<World, BuilderError> {
		let deployment = &self.config.deployment;
		let owner = CallContext::new(deployment.owner, self.clock.now());
		let mut log = EventLog::new();
		let mut tokens = TokenRegistry::new();

		let fee_token = FeeToken::new(
			deployment.fee_token,
			&self.config.fee_token.name,
			&self.config.fee_token.symbol,
			self.config.fee_token.initial_supply,
			deployment.owner,
			deployment.vault,
		)
		.map_err(|e| BuilderError::Deployment(format!("Fee token deployment failed: {}", e)))?;
		tokens.deploy_fee_token(fee_token);

		for token in &self.config.tokens {
			let mut ledger =
				Erc20Ledger::new(token.address, &token.name, &token.symbol, token.decimals);
			for balance in &token.balances {
				ledger
					.mint(balance.holder, balance.amount, &mut log)
					.map_err(|e| {
						BuilderError::Deployment(format!("Minting {} failed: {}", token.symbol, e))
					})?;
			}
			tokens.deploy(Box::new(ledger));
		}

		let mut vault = PanicVault::new(
			deployment.vault,
			self.config.node.chain_id,
			deployment.fee_token,
			self.config.vault.relay_cost,
			deployment.owner,
		);
		let mut relay = PanicRelay::new(deployment.relay, deployment.vault, deployment.owner);

		if self.config.vault.restrict_to_relay {
			vault
				.set_relay(&owner, Some(deployment.relay), &mut log)
				.map_err(|e| BuilderError::Deployment(e.to_string()))?;
		}
		for relayer in &self.config.relay.relayers {
			relay
				.set_relayer(&owner, *relayer, true, &mut log)
				.map_err(|e| BuilderError::Deployment(e.to_string()))?;
		}

		tracing::debug!(events = log.events().len(), "Deployment complete");
		Ok(World {
			tokens,
			vault,
			relay,
		})
	}
}
