//! ERC-20 ledgers for the panic-vault system.
//!
//! The vault never owns balances. It reads balances and allowances and moves
//! funds through the narrow [`Erc20Interface`] capability that every ledger
//! provides. The fee token additionally exposes a controller-gated burn.

use alloy_primitives::{Address, U256};
use panic_types::{CallContext, EventLog, OwnershipError};
use std::collections::HashMap;
use thiserror::Error;

pub mod erc20;
pub mod fee;

pub use erc20::Erc20Ledger;
pub use fee::{FeeToken, FeeTokenSnapshot};

/// Errors that can occur during token operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
	#[error("Insufficient balance: {available} available, {required} required")]
	InsufficientBalance { available: U256, required: U256 },
	#[error("Insufficient allowance: {available} available, {required} required")]
	InsufficientAllowance { available: U256, required: U256 },
	#[error("Zero address not allowed")]
	ZeroAddress,
	#[error("Caller {caller} is not the controller")]
	NotController { caller: Address },
	#[error(transparent)]
	Ownership(#[from] OwnershipError),
	/// A ledger refused the call for its own reasons (paused, blacklisted, ...).
	#[error("Token reverted: {0}")]
	Reverted(String),
}

/// The ledger capability the vault relies on.
///
/// Implementations must leave their state untouched when they return an
/// error; the vault treats every failed call as if it never happened.
pub trait Erc20Interface: Send + Sync {
	/// Address of the token contract.
	fn address(&self) -> Address;

	fn symbol(&self) -> &str;

	fn decimals(&self) -> u8;

	fn total_supply(&self) -> U256;

	fn balance_of(&self, owner: &Address) -> U256;

	fn allowance(&self, owner: &Address, spender: &Address) -> U256;

	/// Moves `amount` from the caller to `to`.
	fn transfer(
		&mut self,
		ctx: &CallContext,
		to: Address,
		amount: U256,
		log: &mut EventLog,
	) -> Result<(), TokenError>;

	/// Sets the caller's allowance for `spender` to `amount`.
	fn approve(
		&mut self,
		ctx: &CallContext,
		spender: Address,
		amount: U256,
		log: &mut EventLog,
	) -> Result<(), TokenError>;

	/// Moves `amount` from `from` to `to`, spending the caller's allowance.
	fn transfer_from(
		&mut self,
		ctx: &CallContext,
		from: Address,
		to: Address,
		amount: U256,
		log: &mut EventLog,
	) -> Result<(), TokenError>;

	/// Copies the ledger so a call can run against a scratch world.
	fn clone_box(&self) -> Box<dyn Erc20Interface>;
}

impl Clone for Box<dyn Erc20Interface> {
	fn clone(&self) -> Self {
		self.clone_box()
	}
}

#[derive(Clone)]
enum Deployed {
	Fee(FeeToken),
	Erc20(Box<dyn Erc20Interface>),
}

/// Every token contract deployed on the chain, keyed by address.
///
/// The fee token is registered like any other ledger, so it can be swept and
/// queried through [`Erc20Interface`], and is additionally reachable through
/// [`TokenRegistry::fee_token_mut`] for the controller-only burn.
#[derive(Clone, Default)]
pub struct TokenRegistry {
	tokens: HashMap<Address, Deployed>,
}

impl TokenRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers the fee token. Replaces any ledger at the same address.
	pub fn deploy_fee_token(&mut self, token: FeeToken) {
		tracing::debug!(token = %token.address(), "Registered fee token");
		self.tokens.insert(token.address(), Deployed::Fee(token));
	}

	/// Registers an ERC-20 ledger. Replaces any ledger at the same address.
	pub fn deploy(&mut self, token: Box<dyn Erc20Interface>) {
		tracing::debug!(token = %token.address(), symbol = token.symbol(), "Registered token");
		self.tokens.insert(token.address(), Deployed::Erc20(token));
	}

	pub fn contains(&self, token: &Address) -> bool {
		self.tokens.contains_key(token)
	}

	pub fn get(&self, token: &Address) -> Option<&dyn Erc20Interface> {
		self.tokens.get(token).map(|deployed| match deployed {
			Deployed::Fee(fee) => fee as &dyn Erc20Interface,
			Deployed::Erc20(ledger) => ledger.as_ref(),
		})
	}

	pub fn get_mut(&mut self, token: &Address) -> Option<&mut dyn Erc20Interface> {
		match self.tokens.get_mut(token)? {
			Deployed::Fee(fee) => Some(fee as &mut dyn Erc20Interface),
			Deployed::Erc20(ledger) => Some(ledger.as_mut()),
		}
	}

	/// The fee token at `token`, if that address holds one.
	pub fn fee_token(&self, token: &Address) -> Option<&FeeToken> {
		match self.tokens.get(token)? {
			Deployed::Fee(fee) => Some(fee),
			Deployed::Erc20(_) => None,
		}
	}

	pub fn fee_token_mut(&mut self, token: &Address) -> Option<&mut FeeToken> {
		match self.tokens.get_mut(token)? {
			Deployed::Fee(fee) => Some(fee),
			Deployed::Erc20(_) => None,
		}
	}

	/// Addresses of every registered ledger.
	pub fn addresses(&self) -> impl Iterator<Item = &Address> {
		self.tokens.keys()
	}
}
