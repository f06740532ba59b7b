//! Durable state of a deployment.
//!
//! Token balances belong to the simulated ledgers and are re-minted from
//! configuration on every start. Everything users and the owner change at
//! runtime is captured here and written through after each committed call.

use crate::engine::World;
use alloy_primitives::Address;
use panic_relay::RelaySnapshot;
use panic_token::FeeTokenSnapshot;
use panic_vault::VaultSnapshot;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct DeploymentState {
	pub(crate) vault: VaultSnapshot,
	pub(crate) relay: RelaySnapshot,
	pub(crate) fee_token: Option<FeeTokenSnapshot>,
}

impl World {
	pub(crate) fn durable_state(&self) -> DeploymentState {
		let fee_token = self.vault.fee_token();
		DeploymentState {
			vault: self.vault.snapshot(),
			relay: self.relay.snapshot(),
			fee_token: self.tokens.fee_token(&fee_token).map(|fee| fee.snapshot()),
		}
	}

	/// Replaces everything the deployment script set up with stored state.
	///
	/// Returns the configured relayers the stored allow-list no longer trusts.
	pub(crate) fn restore(
		&mut self,
		state: DeploymentState,
		configured_relayers: &[Address],
	) -> Vec<Address> {
		let revoked = configured_relayers
			.iter()
			.filter(|relayer| !state.relay.relayers.contains(*relayer))
			.copied()
			.collect();

		let fee_token = self.vault.fee_token();
		if let (Some(snapshot), Some(fee)) =
			(state.fee_token, self.tokens.fee_token_mut(&fee_token))
		{
			fee.restore(snapshot);
		}
		self.vault.restore(state.vault);
		self.relay.restore(state.relay);
		revoked
	}
}
