//! The `RelayPanic` authorization message and its signing domain.
//!
//! A user signs a `RelayPanic` off-chain; a relayer submits it together with
//! the signature. The message itself is never stored, only its consumption
//! through the user's nonce.

use crate::utils::eip712::{
	compute_domain_hash, compute_final_digest, hash_address_array, Eip712AbiEncoder,
	RELAY_PANIC_TYPE, VAULT_DOMAIN_NAME, VAULT_DOMAIN_VERSION,
};
use alloy_primitives::{keccak256, Address, B256, U256};
use serde::{Deserialize, Serialize};

/// Unsigned intent to sweep `tokens` from `user` to `safe_address`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayPanicRequest {
	/// Address authorizing the sweep; must be the signer.
	pub user: Address,
	/// ERC-20 contracts to sweep, in order.
	pub tokens: Vec<Address>,
	/// Parallel list carried in the signed schema; reserved.
	pub spenders: Vec<Address>,
	/// Destination the signer expects to be configured at execution time.
	pub safe_address: Address,
	/// Unix timestamp after which the authorization is void.
	pub deadline: U256,
	/// Must equal the user's current nonce in the vault.
	pub nonce: U256,
}

impl RelayPanicRequest {
	/// EIP-712 `hashStruct` of the request.
	pub fn struct_hash(&self) -> B256 {
		let mut enc = Eip712AbiEncoder::new();
		enc.push_b256(&keccak256(RELAY_PANIC_TYPE.as_bytes()));
		enc.push_address(&self.user);
		enc.push_b256(&hash_address_array(&self.tokens));
		enc.push_b256(&hash_address_array(&self.spenders));
		enc.push_address(&self.safe_address);
		enc.push_u256(self.deadline);
		enc.push_u256(self.nonce);
		keccak256(enc.finish())
	}

	/// Digest the user signs under `domain`.
	pub fn signing_digest(&self, domain: &SigningDomain) -> B256 {
		compute_final_digest(&domain.separator(), &self.struct_hash())
	}
}

/// EIP-712 domain of a vault deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SigningDomain {
	pub name: String,
	pub version: String,
	pub chain_id: u64,
	pub verifying_contract: Address,
}

impl SigningDomain {
	/// The domain under which a vault at `vault` on `chain_id` verifies signatures.
	pub fn panic_vault(chain_id: u64, vault: Address) -> Self {
		Self {
			name: VAULT_DOMAIN_NAME.to_string(),
			version: VAULT_DOMAIN_VERSION.to_string(),
			chain_id,
			verifying_contract: vault,
		}
	}

	/// The domain separator hash.
	pub fn separator(&self) -> B256 {
		compute_domain_hash(
			&self.name,
			&self.version,
			self.chain_id,
			&self.verifying_contract,
		)
	}
}
