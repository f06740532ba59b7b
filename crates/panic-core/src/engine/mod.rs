//! The engine: one world state, one invocation at a time.
//!
//! Every state-changing call locks the whole world, runs to completion and
//! either commits all of its effects or none of them. Invocations are
//! therefore totally ordered, matching block semantics.

pub mod clock;
pub mod event_bus;
pub(crate) mod state;

use crate::engine::clock::Clock;
use crate::engine::event_bus::EventBus;
use alloy_primitives::{Address, Bytes, B256, U256};
use panic_account::{AccountError, AccountService};
use panic_config::Config;
use panic_relay::{PanicRelay, RelayError};
use panic_storage::{StorageError, StorageService};
use panic_token::{TokenError, TokenRegistry};
use panic_types::{
	truncate_id, CallContext, EventLog, RelayPanicRequest, SigningDomain, StorageKey,
};
use panic_vault::{PanicVault, SweepReport, VaultError};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, Mutex};

/// Errors that can occur during engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
	#[error(transparent)]
	Token(#[from] TokenError),
	#[error(transparent)]
	Vault(#[from] VaultError),
	#[error(transparent)]
	Relay(#[from] RelayError),
	#[error("Storage error: {0}")]
	Storage(#[from] StorageError),
	#[error("Account error: {0}")]
	Account(#[from] AccountError),
	#[error("No token contract at {0}")]
	UnknownToken(Address),
	#[error("No ownable contract at {0}")]
	UnknownContract(Address),
}

/// Everything deployed on the simulated chain.
#[derive(Clone)]
pub(crate) struct World {
	pub(crate) tokens: TokenRegistry,
	pub(crate) vault: PanicVault,
	pub(crate) relay: PanicRelay,
}

/// What the vault sees for one of a user's tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPosition {
	pub token: Address,
	pub symbol: String,
	pub decimals: u8,
	pub balance: U256,
	/// Allowance granted to the vault.
	pub vault_allowance: U256,
	/// `min(balance, vault_allowance)`: what a sweep would move now.
	pub sweepable: U256,
}

/// A user's vault configuration and positions, as shown to a dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStatus {
	pub user: Address,
	pub safe_address: Option<Address>,
	pub nonce: U256,
	pub fee_balance: U256,
	pub relay_cost: U256,
	pub tokens: Vec<TokenPosition>,
}

/// Main engine holding the deployed contracts.
#[derive(Clone)]
pub struct PanicEngine {
	config: Config,
	world: Arc<Mutex<World>>,
	storage: Arc<StorageService>,
	account: Arc<AccountService>,
	account_address: Address,
	clock: Arc<dyn Clock>,
	event_bus: EventBus,
}

impl PanicEngine {
	pub(crate) fn new(
		config: Config,
		world: World,
		storage: Arc<StorageService>,
		account: Arc<AccountService>,
		account_address: Address,
		clock: Arc<dyn Clock>,
		event_bus: EventBus,
	) -> Self {
		Self {
			config,
			world: Arc::new(Mutex::new(world)),
			storage,
			account,
			account_address,
			clock,
			event_bus,
		}
	}

	pub fn config(&self) -> &Config {
		&self.config
	}

	pub fn event_bus(&self) -> &EventBus {
		&self.event_bus
	}

	pub fn subscribe(&self) -> broadcast::Receiver<panic_types::PanicEvent> {
		self.event_bus.subscribe()
	}

	pub fn account(&self) -> &Arc<AccountService> {
		&self.account
	}

	/// Address of the configured signing account.
	pub fn account_address(&self) -> Address {
		self.account_address
	}

	pub fn now(&self) -> u64 {
		self.clock.now()
	}

	pub fn vault_address(&self) -> Address {
		self.config.deployment.vault
	}

	pub fn relay_address(&self) -> Address {
		self.config.deployment.relay
	}

	pub fn fee_token_address(&self) -> Address {
		self.config.deployment.fee_token
	}

	/// Runs one invocation against the world.
	///
	/// `call` runs on a scratch copy of the world. When `persist` is set the
	/// copy's durable state is written to storage first, and a failed write
	/// discards the copy. Only a committed call swaps the copy in and
	/// publishes its events.
	async fn invoke<T, F>(&self, caller: Address, persist: bool, call: F) -> Result<T, EngineError>
	where
		F: FnOnce(&mut World, &CallContext, &mut EventLog) -> Result<T, EngineError>,
	{
		let mut world = self.world.lock().await;
		let ctx = CallContext::new(caller, self.clock.now());
		let mut log = EventLog::new();

		let mut scratch = world.clone();
		let result = call(&mut scratch, &ctx, &mut log)?;

		if persist {
			let state = scratch.durable_state();
			let id = scratch.vault.address().to_string();
			if let Err(e) = self
				.storage
				.store(StorageKey::Deployment.as_str(), &id, &state)
				.await
			{
				tracing::error!(
					vault = %truncate_id(&id),
					error = %e,
					"Failed to persist deployment state, call discarded"
				);
				return Err(e.into());
			}
		}

		*world = scratch;
		for event in log.into_events() {
			// No subscribers is not an error for the caller.
			let _ = self.event_bus.publish(event);
		}

		Ok(result)
	}

	/// Registers the caller's safe address.
	pub async fn set_safe_address(
		&self,
		caller: Address,
		safe_address: Address,
	) -> Result<(), EngineError> {
		self.invoke(caller, true, |world, ctx, log| {
			Ok(world.vault.set_safe_address(ctx, safe_address, log)?)
		})
		.await
	}

	/// Sweeps the caller's tokens to their safe address.
	pub async fn sweep_direct(
		&self,
		caller: Address,
		tokens: Vec<Address>,
		spenders: Vec<Address>,
	) -> Result<SweepReport, EngineError> {
		self.invoke(caller, false, |world, ctx, log| {
			Ok(world
				.vault
				.sweep_direct(ctx, &mut world.tokens, &tokens, &spenders, log)?)
		})
		.await
	}

	/// Calls the vault's signed path directly, bypassing the relay.
	///
	/// Refused with `UnauthorizedCaller` while the vault is bound to the relay.
	pub async fn sweep_relayed(
		&self,
		caller: Address,
		request: RelayPanicRequest,
		signature: Bytes,
	) -> Result<SweepReport, EngineError> {
		self.invoke(caller, true, |world, ctx, log| {
			Ok(world
				.vault
				.sweep_relayed(ctx, &mut world.tokens, &request, &signature, log)?)
		})
		.await
	}

	/// Submits a signed request through the relay.
	pub async fn execute_relay(
		&self,
		caller: Address,
		request: RelayPanicRequest,
		signature: Bytes,
	) -> Result<SweepReport, EngineError> {
		self.invoke(caller, true, |world, ctx, log| {
			let World {
				tokens,
				vault,
				relay,
			} = world;
			Ok(relay.execute_relay(ctx, vault, tokens, &request, &signature, log)?)
		})
		.await
	}

	pub async fn set_relayer(
		&self,
		caller: Address,
		relayer: Address,
		trusted: bool,
	) -> Result<(), EngineError> {
		self.invoke(caller, true, |world, ctx, log| {
			Ok(world.relay.set_relayer(ctx, relayer, trusted, log)?)
		})
		.await
	}

	/// Binds the vault's signed path to `relay`, or unbinds it with `None`.
	pub async fn set_vault_relay(
		&self,
		caller: Address,
		relay: Option<Address>,
	) -> Result<(), EngineError> {
		self.invoke(caller, true, |world, ctx, log| {
			Ok(world.vault.set_relay(ctx, relay, log)?)
		})
		.await
	}

	/// Repoints the fee token's burn controller.
	pub async fn set_fee_controller(
		&self,
		caller: Address,
		controller: Address,
	) -> Result<(), EngineError> {
		let fee_token = self.fee_token_address();
		self.invoke(caller, true, |world, ctx, log| {
			let fee = world
				.tokens
				.fee_token_mut(&fee_token)
				.ok_or(EngineError::UnknownToken(fee_token))?;
			Ok(fee.set_controller(ctx, controller, log)?)
		})
		.await
	}

	/// Hands the admin credential of the vault, relay or fee token to `new_owner`.
	pub async fn transfer_ownership(
		&self,
		caller: Address,
		contract: Address,
		new_owner: Address,
	) -> Result<(), EngineError> {
		self.invoke(caller, true, |world, ctx, log| {
			if contract == world.vault.address() {
				world.vault.transfer_ownership(ctx, new_owner, log)?;
			} else if contract == world.relay.address() {
				world.relay.transfer_ownership(ctx, new_owner, log)?;
			} else if let Some(fee) = world.tokens.fee_token_mut(&contract) {
				fee.transfer_ownership(ctx, new_owner, log)?;
			} else {
				return Err(EngineError::UnknownContract(contract));
			}
			Ok(())
		})
		.await
	}

	pub async fn approve(
		&self,
		caller: Address,
		token: Address,
		spender: Address,
		amount: U256,
	) -> Result<(), EngineError> {
		self.invoke(caller, false, |world, ctx, log| {
			let ledger = world
				.tokens
				.get_mut(&token)
				.ok_or(EngineError::UnknownToken(token))?;
			Ok(ledger.approve(ctx, spender, amount, log)?)
		})
		.await
	}

	pub async fn transfer(
		&self,
		caller: Address,
		token: Address,
		to: Address,
		amount: U256,
	) -> Result<(), EngineError> {
		self.invoke(caller, false, |world, ctx, log| {
			let ledger = world
				.tokens
				.get_mut(&token)
				.ok_or(EngineError::UnknownToken(token))?;
			Ok(ledger.transfer(ctx, to, amount, log)?)
		})
		.await
	}

	/// Signs `request` with the configured account for this engine's vault.
	pub async fn sign_relay_request(
		&self,
		request: &RelayPanicRequest,
	) -> Result<Bytes, EngineError> {
		Ok(self
			.account
			.sign_relay_request(request, &self.signing_domain())
			.await?)
	}

	pub async fn safe_address_of(&self, user: &Address) -> Option<Address> {
		self.world.lock().await.vault.safe_address_of(user)
	}

	pub async fn nonce_of(&self, user: &Address) -> U256 {
		self.world.lock().await.vault.nonce_of(user)
	}

	pub async fn balance_of(&self, token: &Address, owner: &Address) -> Result<U256, EngineError> {
		let world = self.world.lock().await;
		let ledger = world
			.tokens
			.get(token)
			.ok_or(EngineError::UnknownToken(*token))?;
		Ok(ledger.balance_of(owner))
	}

	pub async fn allowance(
		&self,
		token: &Address,
		owner: &Address,
		spender: &Address,
	) -> Result<U256, EngineError> {
		let world = self.world.lock().await;
		let ledger = world
			.tokens
			.get(token)
			.ok_or(EngineError::UnknownToken(*token))?;
		Ok(ledger.allowance(owner, spender))
	}

	pub async fn fee_balance(&self, holder: &Address) -> Result<U256, EngineError> {
		self.balance_of(&self.fee_token_address(), holder).await
	}

	pub async fn relay_cost(&self) -> U256 {
		self.world.lock().await.vault.relay_cost()
	}

	pub async fn is_relayer(&self, relayer: &Address) -> bool {
		self.world.lock().await.relay.is_relayer(relayer)
	}

	/// The relay the vault's signed path is bound to, if any.
	pub async fn vault_relay(&self) -> Option<Address> {
		self.world.lock().await.vault.relay()
	}

	pub async fn fee_controller(&self) -> Option<Address> {
		let fee_token = self.fee_token_address();
		let world = self.world.lock().await;
		world.tokens.fee_token(&fee_token).map(|fee| fee.controller())
	}

	pub fn signing_domain(&self) -> SigningDomain {
		SigningDomain::panic_vault(self.config.node.chain_id, self.vault_address())
	}

	pub fn domain_separator(&self) -> B256 {
		self.signing_domain().separator()
	}

	/// Digest the user must sign for `request`.
	pub fn relay_digest(&self, request: &RelayPanicRequest) -> B256 {
		request.signing_digest(&self.signing_domain())
	}

	/// Addresses of all deployed token ledgers, the fee token included.
	pub async fn token_addresses(&self) -> Vec<Address> {
		let world = self.world.lock().await;
		let mut addresses: Vec<Address> = world.tokens.addresses().copied().collect();
		addresses.sort();
		addresses
	}

	/// One consistent read of everything a dashboard shows for `user`.
	pub async fn user_status(&self, user: &Address) -> UserStatus {
		let world = self.world.lock().await;
		let vault = world.vault.address();
		let fee_token = world.vault.fee_token();

		let mut addresses: Vec<Address> = world.tokens.addresses().copied().collect();
		addresses.sort();
		let tokens = addresses
			.iter()
			.filter_map(|address| world.tokens.get(address))
			.map(|ledger| {
				let balance = ledger.balance_of(user);
				let vault_allowance = ledger.allowance(user, &vault);
				TokenPosition {
					token: ledger.address(),
					symbol: ledger.symbol().to_string(),
					decimals: ledger.decimals(),
					balance,
					vault_allowance,
					sweepable: balance.min(vault_allowance),
				}
			})
			.collect();

		UserStatus {
			user: *user,
			safe_address: world.vault.safe_address_of(user),
			nonce: world.vault.nonce_of(user),
			fee_balance: world
				.tokens
				.get(&fee_token)
				.map(|fee| fee.balance_of(user))
				.unwrap_or_default(),
			relay_cost: world.vault.relay_cost(),
			tokens,
		}
	}
}

#[cfg(test)]
mod scenarios;
