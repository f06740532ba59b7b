//! Storage-related types for the durable deployment state.

/// Storage namespaces for different data collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
	/// Vault registry, nonce counters and admin settings of one deployment,
	/// keyed by vault address.
	Deployment,
}

impl StorageKey {
	/// Returns the string representation of the storage key.
	pub fn as_str(&self) -> &'static str {
		match self {
			StorageKey::Deployment => "deployment",
		}
	}
}
