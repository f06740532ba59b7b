//! The relay: an allow-list gate in front of the vault's signed path.
//!
//! Trusted relayers pay gas for users whose wallets are compromised. The
//! relay only decides who may submit; every authorization check on the
//! request itself happens inside the vault.

use alloy_primitives::{Address, Bytes};
use panic_token::TokenRegistry;
use panic_types::{
	CallContext, EventLog, Ownable, OwnershipError, PanicEvent, RelayEvent, RelayPanicRequest,
};
use panic_vault::{PanicVault, SweepReport, VaultError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RelayError {
	#[error("Caller {caller} is not a trusted relayer")]
	NotRelayer { caller: Address },
	#[error("Zero address not allowed")]
	ZeroAddress,
	#[error("Relay forwards to {expected}, got vault {actual}")]
	VaultMismatch { expected: Address, actual: Address },
	#[error(transparent)]
	Vault(#[from] VaultError),
	#[error(transparent)]
	Ownership(#[from] OwnershipError),
}

/// Durable admin state of a relay.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelaySnapshot {
	pub owner: Address,
	/// Trusted relayers, sorted.
	pub relayers: Vec<Address>,
}

#[derive(Debug, Clone)]
pub struct PanicRelay {
	address: Address,
	vault: Address,
	ownable: Ownable,
	relayers: HashSet<Address>,
}

impl PanicRelay {
	pub fn new(address: Address, vault: Address, owner: Address) -> Self {
		Self {
			address,
			vault,
			ownable: Ownable::new(address, owner),
			relayers: HashSet::new(),
		}
	}

	pub fn address(&self) -> Address {
		self.address
	}

	/// The vault every call is forwarded to.
	pub fn vault(&self) -> Address {
		self.vault
	}

	pub fn owner(&self) -> Address {
		self.ownable.owner()
	}

	pub fn is_relayer(&self, relayer: &Address) -> bool {
		self.relayers.contains(relayer)
	}

	/// Current allow-list, unordered.
	pub fn relayers(&self) -> impl Iterator<Item = &Address> {
		self.relayers.iter()
	}

	/// Grants or revokes relayer trust. Owner-only, idempotent.
	pub fn set_relayer(
		&mut self,
		ctx: &CallContext,
		relayer: Address,
		trusted: bool,
		log: &mut EventLog,
	) -> Result<(), RelayError> {
		self.ownable.only_owner(&ctx.caller)?;
		if relayer.is_zero() {
			return Err(RelayError::ZeroAddress);
		}

		if trusted {
			self.relayers.insert(relayer);
		} else {
			self.relayers.remove(&relayer);
		}
		log.emit(PanicEvent::Relay(RelayEvent::RelayerUpdated { relayer, trusted }));
		tracing::info!(relayer = %relayer, trusted, "Relayer updated");
		Ok(())
	}

	pub fn transfer_ownership(
		&mut self,
		ctx: &CallContext,
		new_owner: Address,
		log: &mut EventLog,
	) -> Result<(), RelayError> {
		Ok(self
			.ownable
			.transfer_ownership(&ctx.caller, new_owner, log)?)
	}

	/// Forwards a signed request to the vault on behalf of a trusted relayer.
	pub fn execute_relay(
		&self,
		ctx: &CallContext,
		vault: &mut PanicVault,
		ledgers: &mut TokenRegistry,
		request: &RelayPanicRequest,
		signature: &Bytes,
		log: &mut EventLog,
	) -> Result<SweepReport, RelayError> {
		if !self.is_relayer(&ctx.caller) {
			return Err(RelayError::NotRelayer { caller: ctx.caller });
		}
		if vault.address() != self.vault {
			return Err(RelayError::VaultMismatch {
				expected: self.vault,
				actual: vault.address(),
			});
		}

		let report = vault.sweep_relayed(
			&ctx.forwarded_by(self.address),
			ledgers,
			request,
			signature,
			log,
		)?;
		log.emit(PanicEvent::Relay(RelayEvent::RelayExecuted {
			relayer: ctx.caller,
			user: request.user,
			nonce: request.nonce,
		}));
		tracing::debug!(relayer = %ctx.caller, user = %request.user, "Relay forwarded");
		Ok(report)
	}

	pub fn snapshot(&self) -> RelaySnapshot {
		let mut relayers: Vec<Address> = self.relayers.iter().copied().collect();
		relayers.sort();
		RelaySnapshot {
			owner: self.ownable.owner(),
			relayers,
		}
	}

	/// Replaces the owner and allow-list with a previously exported snapshot.
	pub fn restore(&mut self, snapshot: RelaySnapshot) {
		self.ownable = Ownable::new(self.address, snapshot.owner);
		self.relayers = snapshot.relayers.into_iter().collect();
	}
}
