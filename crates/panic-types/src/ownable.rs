//! Single-key admin credential.
//!
//! Controller rotation on the fee token, relay binding on the vault and
//! allow-list curation on the relay are all gated by one owner address per
//! contract. There is no role hierarchy.

use crate::events::{EventLog, PanicEvent};
use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by owner-gated operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OwnershipError {
	#[error("Caller {caller} is not the owner")]
	NotOwner { caller: Address },
	#[error("New owner cannot be the zero address")]
	ZeroAddress,
}

/// Owner of one contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ownable {
	contract: Address,
	owner: Address,
}

impl Ownable {
	pub fn new(contract: Address, owner: Address) -> Self {
		Self { contract, owner }
	}

	pub fn owner(&self) -> Address {
		self.owner
	}

	/// Fails `NotOwner` unless `caller` is the owner.
	pub fn only_owner(&self, caller: &Address) -> Result<(), OwnershipError> {
		if *caller != self.owner {
			return Err(OwnershipError::NotOwner { caller: *caller });
		}
		Ok(())
	}

	/// Hands the credential to `new_owner`. Owner-only.
	pub fn transfer_ownership(
		&mut self,
		caller: &Address,
		new_owner: Address,
		log: &mut EventLog,
	) -> Result<(), OwnershipError> {
		self.only_owner(caller)?;
		if new_owner.is_zero() {
			return Err(OwnershipError::ZeroAddress);
		}

		let previous = std::mem::replace(&mut self.owner, new_owner);
		log.emit(PanicEvent::OwnershipTransferred {
			contract: self.contract,
			previous,
			current: new_owner,
		});
		Ok(())
	}
}
