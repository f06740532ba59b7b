//! Events emitted by the token, vault and relay contracts.
//!
//! Contracts append events to an [`EventLog`] while a call executes. The
//! engine publishes the log only if the whole call succeeded, so a refused
//! call is never observable through events.

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

/// Main event type encompassing all contract events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PanicEvent {
	/// Events from ERC-20 ledgers, the fee token included.
	Token(TokenEvent),
	/// Events from the vault.
	Vault(VaultEvent),
	/// Events from the relay.
	Relay(RelayEvent),
	/// Admin credential of a contract changed hands.
	OwnershipTransferred {
		contract: Address,
		previous: Address,
		current: Address,
	},
}

/// Events from ERC-20 ledgers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenEvent {
	Transfer {
		token: Address,
		from: Address,
		to: Address,
		amount: U256,
	},
	Approval {
		token: Address,
		owner: Address,
		spender: Address,
		amount: U256,
	},
	/// Fee-token supply destroyed by the controller.
	Burn {
		token: Address,
		holder: Address,
		amount: U256,
	},
	/// Fee-token controller pointer replaced by the owner.
	ControllerUpdated {
		token: Address,
		previous: Address,
		current: Address,
	},
}

/// Events from the vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VaultEvent {
	SafeAddressUpdated {
		user: Address,
		safe_address: Address,
	},
	TokenSwept {
		user: Address,
		token: Address,
		safe_address: Address,
		amount: U256,
	},
	/// A single token of a batch could not be moved; the batch continued.
	TokenSweepFailed {
		user: Address,
		token: Address,
		reason: String,
	},
	/// A sweep batch completed. `nonce` is the consumed nonce on the relay path.
	PanicExecuted {
		user: Address,
		safe_address: Address,
		relayed: bool,
		nonce: Option<U256>,
	},
	RelayBound {
		relay: Option<Address>,
	},
}

/// Events from the relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelayEvent {
	RelayerUpdated { relayer: Address, trusted: bool },
	RelayExecuted {
		relayer: Address,
		user: Address,
		nonce: U256,
	},
}

/// Ordered list of events produced by one invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventLog {
	events: Vec<PanicEvent>,
}

impl EventLog {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn emit(&mut self, event: PanicEvent) {
		self.events.push(event);
	}

	/// Appends every event of `other`, keeping their order.
	pub fn append(&mut self, other: EventLog) {
		self.events.extend(other.events);
	}

	pub fn events(&self) -> &[PanicEvent] {
		&self.events
	}

	pub fn is_empty(&self) -> bool {
		self.events.is_empty()
	}

	pub fn into_events(self) -> Vec<PanicEvent> {
		self.events
	}
}
