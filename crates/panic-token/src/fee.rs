//! The fee token: an ERC-20 whose burn is reserved to one controller.
//!
//! The relayed sweep path charges its fee by burning the user's fee-token
//! balance. Only the registered controller (the vault) may burn. The owner
//! can repoint the controller; integrators must treat a compromised owner
//! key as able to burn any holder's balance through a new controller.

use crate::{Erc20Interface, Erc20Ledger, TokenError};
use alloy_primitives::{Address, U256};
use panic_types::{CallContext, EventLog, Ownable, PanicEvent, TokenEvent};
use serde::{Deserialize, Serialize};

const FEE_TOKEN_DECIMALS: u8 = 18;

/// Owner and controller of a fee token. Balances are not part of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeTokenSnapshot {
	pub owner: Address,
	pub controller: Address,
}

/// Restricted-burn ERC-20 used to prepay relayed sweeps.
#[derive(Debug, Clone)]
pub struct FeeToken {
	ledger: Erc20Ledger,
	ownable: Ownable,
	controller: Address,
}

impl FeeToken {
	/// Deploys the token, minting `initial_supply` to `owner`.
	///
	/// # Errors
	///
	/// Returns [`TokenError::ZeroAddress`] if `owner` or `controller` is the
	/// zero address.
	pub fn new(
		address: Address,
		name: &str,
		symbol: &str,
		initial_supply: U256,
		owner: Address,
		controller: Address,
	) -> Result<Self, TokenError> {
		if owner.is_zero() || controller.is_zero() {
			return Err(TokenError::ZeroAddress);
		}

		let mut ledger = Erc20Ledger::new(address, name, symbol, FEE_TOKEN_DECIMALS);
		if !initial_supply.is_zero() {
			ledger.mint(owner, initial_supply, &mut EventLog::new())?;
		}

		Ok(Self {
			ledger,
			ownable: Ownable::new(address, owner),
			controller,
		})
	}

	pub fn name(&self) -> &str {
		self.ledger.name()
	}

	pub fn owner(&self) -> Address {
		self.ownable.owner()
	}

	/// The single address allowed to call [`FeeToken::burn_from`].
	pub fn controller(&self) -> Address {
		self.controller
	}

	/// Burns `amount` from `holder`. Controller-only.
	pub fn burn_from(
		&mut self,
		ctx: &CallContext,
		holder: Address,
		amount: U256,
		log: &mut EventLog,
	) -> Result<(), TokenError> {
		if ctx.caller != self.controller {
			return Err(TokenError::NotController { caller: ctx.caller });
		}

		self.ledger.burn(holder, amount, log)?;
		log.emit(PanicEvent::Token(TokenEvent::Burn {
			token: self.ledger.address(),
			holder,
			amount,
		}));
		tracing::debug!(holder = %holder, amount = %amount, "Burned fee tokens");
		Ok(())
	}

	/// Replaces the controller. Owner-only.
	pub fn set_controller(
		&mut self,
		ctx: &CallContext,
		controller: Address,
		log: &mut EventLog,
	) -> Result<(), TokenError> {
		self.ownable.only_owner(&ctx.caller)?;
		if controller.is_zero() {
			return Err(TokenError::ZeroAddress);
		}

		let previous = std::mem::replace(&mut self.controller, controller);
		log.emit(PanicEvent::Token(TokenEvent::ControllerUpdated {
			token: self.ledger.address(),
			previous,
			current: controller,
		}));
		tracing::info!(previous = %previous, current = %controller, "Fee token controller updated");
		Ok(())
	}

	pub fn transfer_ownership(
		&mut self,
		ctx: &CallContext,
		new_owner: Address,
		log: &mut EventLog,
	) -> Result<(), TokenError> {
		Ok(self
			.ownable
			.transfer_ownership(&ctx.caller, new_owner, log)?)
	}

	pub fn snapshot(&self) -> FeeTokenSnapshot {
		FeeTokenSnapshot {
			owner: self.ownable.owner(),
			controller: self.controller,
		}
	}

	/// Reapplies owner and controller from a previously exported snapshot.
	pub fn restore(&mut self, snapshot: FeeTokenSnapshot) {
		self.ownable = Ownable::new(self.ledger.address(), snapshot.owner);
		self.controller = snapshot.controller;
	}
}

impl Erc20Interface for FeeToken {
	fn address(&self) -> Address {
		self.ledger.address()
	}

	fn symbol(&self) -> &str {
		self.ledger.symbol()
	}

	fn decimals(&self) -> u8 {
		self.ledger.decimals()
	}

	fn total_supply(&self) -> U256 {
		self.ledger.total_supply()
	}

	fn balance_of(&self, owner: &Address) -> U256 {
		self.ledger.balance_of(owner)
	}

	fn allowance(&self, owner: &Address, spender: &Address) -> U256 {
		self.ledger.allowance(owner, spender)
	}

	fn transfer(
		&mut self,
		ctx: &CallContext,
		to: Address,
		amount: U256,
		log: &mut EventLog,
	) -> Result<(), TokenError> {
		self.ledger.transfer(ctx, to, amount, log)
	}

	fn approve(
		&mut self,
		ctx: &CallContext,
		spender: Address,
		amount: U256,
		log: &mut EventLog,
	) -> Result<(), TokenError> {
		self.ledger.approve(ctx, spender, amount, log)
	}

	fn transfer_from(
		&mut self,
		ctx: &CallContext,
		from: Address,
		to: Address,
		amount: U256,
		log: &mut EventLog,
	) -> Result<(), TokenError> {
		self.ledger.transfer_from(ctx, from, to, amount, log)
	}

	fn clone_box(&self) -> Box<dyn Erc20Interface> {
		Box::new(self.clone())
	}
}
