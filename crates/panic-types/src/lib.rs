//! Common types for the panic-vault system.
//!
//! This crate defines the data types shared by the token, vault, relay and
//! engine crates: the relay authorization message, call context, events,
//! the single-owner admin credential and the EIP-712 hashing utilities.

/// Relay authorization message and its EIP-712 signing domain.
pub mod authorization;
/// Per-invocation caller and timestamp.
pub mod context;
/// Events emitted by the token, vault and relay contracts.
pub mod events;
/// Single-key owner credential shared by all contracts.
pub mod ownable;
/// Registry trait for self-registering implementations.
pub mod registry;
/// Secure string type for private keys.
pub mod secret_string;
/// Storage namespaces for durable state.
pub mod storage;
/// Utility functions for hashing and formatting.
pub mod utils;
/// Configuration validation types.
pub mod validation;

pub use alloy_primitives::{Address, Bytes, B256, U256};
pub use authorization::{RelayPanicRequest, SigningDomain};
pub use context::CallContext;
pub use events::{EventLog, PanicEvent, RelayEvent, TokenEvent, VaultEvent};
pub use ownable::{Ownable, OwnershipError};
pub use registry::ImplementationRegistry;
pub use secret_string::SecretString;
pub use storage::StorageKey;
pub use utils::{format_token_amount, truncate_id, without_0x_prefix};
pub use validation::*;
