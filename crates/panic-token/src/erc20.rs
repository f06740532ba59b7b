//! Standard ERC-20 ledger.

use crate::{Erc20Interface, TokenError};
use alloy_primitives::{Address, U256};
use panic_types::{CallContext, EventLog, PanicEvent, TokenEvent};
use std::collections::HashMap;

/// Balance and allowance ledger with standard ERC-20 semantics.
///
/// An allowance of `U256::MAX` is treated as infinite and never decremented.
#[derive(Debug, Clone)]
pub struct Erc20Ledger {
	address: Address,
	name: String,
	symbol: String,
	decimals: u8,
	total_supply: U256,
	balances: HashMap<Address, U256>,
	allowances: HashMap<(Address, Address), U256>,
}

impl Erc20Ledger {
	pub fn new(address: Address, name: &str, symbol: &str, decimals: u8) -> Self {
		Self {
			address,
			name: name.to_string(),
			symbol: symbol.to_string(),
			decimals,
			total_supply: U256::ZERO,
			balances: HashMap::new(),
			allowances: HashMap::new(),
		}
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	/// Creates `amount` new units for `to`.
	pub fn mint(
		&mut self,
		to: Address,
		amount: U256,
		log: &mut EventLog,
	) -> Result<(), TokenError> {
		if to.is_zero() {
			return Err(TokenError::ZeroAddress);
		}
		let supply = self
			.total_supply
			.checked_add(amount)
			.ok_or_else(|| TokenError::Reverted("total supply overflow".to_string()))?;

		self.total_supply = supply;
		*self.balances.entry(to).or_default() += amount;
		log.emit(PanicEvent::Token(TokenEvent::Transfer {
			token: self.address,
			from: Address::ZERO,
			to,
			amount,
		}));
		Ok(())
	}

	/// Destroys `amount` units held by `holder`. Access control is the caller's job.
	pub(crate) fn burn(
		&mut self,
		holder: Address,
		amount: U256,
		log: &mut EventLog,
	) -> Result<(), TokenError> {
		let available = self.balance_of(&holder);
		if available < amount {
			return Err(TokenError::InsufficientBalance {
				available,
				required: amount,
			});
		}

		self.balances.insert(holder, available - amount);
		self.total_supply -= amount;
		log.emit(PanicEvent::Token(TokenEvent::Transfer {
			token: self.address,
			from: holder,
			to: Address::ZERO,
			amount,
		}));
		Ok(())
	}

	fn move_balance(
		&mut self,
		from: Address,
		to: Address,
		amount: U256,
		log: &mut EventLog,
	) -> Result<(), TokenError> {
		if from.is_zero() || to.is_zero() {
			return Err(TokenError::ZeroAddress);
		}
		let available = self.balance_of(&from);
		if available < amount {
			return Err(TokenError::InsufficientBalance {
				available,
				required: amount,
			});
		}

		self.balances.insert(from, available - amount);
		*self.balances.entry(to).or_default() += amount;
		log.emit(PanicEvent::Token(TokenEvent::Transfer {
			token: self.address,
			from,
			to,
			amount,
		}));
		Ok(())
	}
}

impl Erc20Interface for Erc20Ledger {
	fn address(&self) -> Address {
		self.address
	}

	fn symbol(&self) -> &str {
		&self.symbol
	}

	fn decimals(&self) -> u8 {
		self.decimals
	}

	fn total_supply(&self) -> U256 {
		self.total_supply
	}

	fn balance_of(&self, owner: &Address) -> U256 {
		self.balances.get(owner).copied().unwrap_or_default()
	}

	fn allowance(&self, owner: &Address, spender: &Address) -> U256 {
		self.allowances
			.get(&(*owner, *spender))
			.copied()
			.unwrap_or_default()
	}

	fn transfer(
		&mut self,
		ctx: &CallContext,
		to: Address,
		amount: U256,
		log: &mut EventLog,
	) -> Result<(), TokenError> {
		self.move_balance(ctx.caller, to, amount, log)
	}

	fn approve(
		&mut self,
		ctx: &CallContext,
		spender: Address,
		amount: U256,
		log: &mut EventLog,
	) -> Result<(), TokenError> {
		if spender.is_zero() {
			return Err(TokenError::ZeroAddress);
		}

		self.allowances.insert((ctx.caller, spender), amount);
		log.emit(PanicEvent::Token(TokenEvent::Approval {
			token: self.address,
			owner: ctx.caller,
			spender,
			amount,
		}));
		Ok(())
	}

	fn transfer_from(
		&mut self,
		ctx: &CallContext,
		from: Address,
		to: Address,
		amount: U256,
		log: &mut EventLog,
	) -> Result<(), TokenError> {
		let allowance = self.allowance(&from, &ctx.caller);
		if allowance < amount {
			return Err(TokenError::InsufficientAllowance {
				available: allowance,
				required: amount,
			});
		}

		self.move_balance(from, to, amount, log)?;
		if allowance != U256::MAX {
			self.allowances
				.insert((from, ctx.caller), allowance - amount);
		}
		Ok(())
	}

	fn clone_box(&self) -> Box<dyn Erc20Interface> {
		Box::new(self.clone())
	}
}
