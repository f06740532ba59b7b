//! Registry of the pluggable backend implementations.
//!
//! Every storage and account implementation a crate exports is registered
//! once, by name, so that configuration can select any of them.

use panic_account::{AccountError, AccountInterface};
use panic_config::Config;
use panic_core::{BuilderError, PanicBuilder, PanicEngine, PanicFactories};
use panic_storage::{StorageError, StorageInterface};
use std::collections::HashMap;
use std::sync::OnceLock;

pub type StorageFactory = fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>;
pub type AccountFactory = fn(&toml::Value) -> Result<Box<dyn AccountInterface>, AccountError>;

/// Global registry for all implementation factories
pub struct FactoryRegistry {
	pub storage: HashMap<String, StorageFactory>,
	pub account: HashMap<String, AccountFactory>,
}

impl FactoryRegistry {
	fn new() -> Self {
		let mut registry = Self {
			storage: HashMap::new(),
			account: HashMap::new(),
		};

		for (name, factory) in panic_storage::get_all_implementations() {
			tracing::debug!("Registering storage implementation: {}", name);
			registry.storage.insert(name.to_string(), factory);
		}
		for (name, factory) in panic_account::get_all_implementations() {
			tracing::debug!("Registering account implementation: {}", name);
			registry.account.insert(name.to_string(), factory);
		}

		registry
	}
}

static REGISTRY: OnceLock<FactoryRegistry> = OnceLock::new();

/// Returns the process-wide registry, populating it on first use.
pub fn get_registry() -> &'static FactoryRegistry {
	REGISTRY.get_or_init(FactoryRegistry::new)
}

/// Builds the engine with every registered implementation available.
pub async fn build_engine(config: Config) -> Result<PanicEngine, BuilderError> {
	let registry = get_registry();
	let factories = PanicFactories {
		storage_factories: registry.storage.clone(),
		account_factories: registry.account.clone(),
	};

	PanicBuilder::new(config).build(factories).await
}
