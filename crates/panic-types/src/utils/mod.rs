//! Utility functions for hashing and string formatting.

pub mod eip712;
pub mod formatting;

pub use eip712::{
	compute_domain_hash, compute_final_digest, hash_address_array, Eip712AbiEncoder, DOMAIN_TYPE,
	RELAY_PANIC_TYPE, VAULT_DOMAIN_NAME, VAULT_DOMAIN_VERSION,
};
pub use formatting::{format_token_amount, truncate_id, without_0x_prefix};
