//! Configuration module for the panic-vault system.
//!
//! A node is described by one TOML file: which addresses the fee token,
//! vault and relay are deployed at, the relay fee, the initial relayer
//! allow-list, any extra ERC-20 ledgers to seed, and the storage, account
//! and API backends.
//!
//! ## Modular Configuration Support
//!
//! Configurations can be split into multiple files:
//! - Use `include = ["file1.toml", "file2.toml"]` to include other config files
//! - Each top-level section must be unique across all files (no duplicates allowed)

mod amount;
mod loader;

pub use amount::deserialize_u256;
pub use loader::ConfigLoader;

use alloy_primitives::{Address, U256};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error that occurs during file I/O operations.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// Error that occurs when parsing TOML configuration.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// Error that occurs when configuration validation fails.
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// Keep the message, drop the echoed input.
		ConfigError::Parse(err.message().to_string())
	}
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Identity of this node and the chain it simulates.
	pub node: NodeConfig,
	/// Contract addresses.
	pub deployment: DeploymentConfig,
	#[serde(default)]
	pub fee_token: FeeTokenConfig,
	#[serde(default)]
	pub vault: VaultConfig,
	#[serde(default)]
	pub relay: RelayConfig,
	/// Additional ERC-20 ledgers deployed at startup.
	#[serde(default)]
	pub tokens: Vec<TokenConfig>,
	/// Configuration for the storage backend.
	pub storage: StorageConfig,
	/// Configuration for account management.
	pub account: AccountConfig,
	/// Configuration for the HTTP API server.
	pub api: Option<ApiConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NodeConfig {
	/// Unique identifier for this node.
	pub id: String,
	/// Chain id bound into every relay authorization's signing domain.
	pub chain_id: u64,
}

/// Where each contract lives.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeploymentConfig {
	/// Deployer and initial owner of the fee token, vault and relay.
	pub owner: Address,
	pub vault: Address,
	pub relay: Address,
	pub fee_token: Address,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FeeTokenConfig {
	#[serde(default = "default_fee_token_name")]
	pub name: String,
	#[serde(default = "default_fee_token_symbol")]
	pub symbol: String,
	/// Minted to the deployment owner.
	#[serde(default, deserialize_with = "deserialize_u256")]
	pub initial_supply: U256,
}

impl Default for FeeTokenConfig {
	fn default() -> Self {
		Self {
			name: default_fee_token_name(),
			symbol: default_fee_token_symbol(),
			initial_supply: U256::ZERO,
		}
	}
}

fn default_fee_token_name() -> String {
	"Panic".to_string()
}

fn default_fee_token_symbol() -> String {
	"PANIC".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VaultConfig {
	/// Fee-token units burned per relayed sweep.
	#[serde(default, deserialize_with = "deserialize_u256")]
	pub relay_cost: U256,
	/// Bind the vault's signed path to the relay so it cannot be bypassed.
	#[serde(default = "default_restrict_to_relay")]
	pub restrict_to_relay: bool,
}

impl Default for VaultConfig {
	fn default() -> Self {
		Self {
			relay_cost: U256::ZERO,
			restrict_to_relay: default_restrict_to_relay(),
		}
	}
}

fn default_restrict_to_relay() -> bool {
	true
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RelayConfig {
	/// Relayers trusted at startup.
	#[serde(default)]
	pub relayers: Vec<Address>,
}

/// An ERC-20 ledger deployed at startup.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TokenConfig {
	pub address: Address,
	pub name: String,
	pub symbol: String,
	#[serde(default = "default_decimals")]
	pub decimals: u8,
	/// Balances minted at deployment.
	#[serde(default)]
	pub balances: Vec<BalanceConfig>,
}

fn default_decimals() -> u8 {
	18
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BalanceConfig {
	pub holder: Address,
	#[serde(deserialize_with = "deserialize_u256")]
	pub amount: U256,
}

/// Configuration for the storage backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
	/// Which implementation to use as primary.
	pub primary: String,
	/// Map of storage implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
}

/// Configuration for account management.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AccountConfig {
	/// Which implementation to use as primary.
	pub primary: String,
	/// Map of account implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
}

/// Configuration for the HTTP API server.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
	/// Whether the API server is enabled.
	#[serde(default)]
	pub enabled: bool,
	/// Host address to bind the server to.
	#[serde(default = "default_api_host")]
	pub host: String,
	/// Port to bind the server to.
	#[serde(default = "default_api_port")]
	pub port: u16,
}

fn default_api_host() -> String {
	"127.0.0.1".to_string()
}

fn default_api_port() -> u16 {
	3000
}

/// Resolves environment variables in a string.
///
/// Replaces ${VAR_NAME} with the value of the environment variable VAR_NAME.
/// Supports default values with ${VAR_NAME:-default_value}.
///
/// Input strings are limited to 1MB to prevent ReDoS attacks.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	const MAX_INPUT_SIZE: usize = 1024 * 1024;
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut result = String::with_capacity(input.len());
	let mut last_end = 0;

	for cap in re.captures_iter(input) {
		let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
			continue;
		};
		let value = match std::env::var(var_name.as_str()) {
			Ok(v) => v,
			Err(_) => match cap.get(2) {
				Some(default) => default.as_str().to_string(),
				None => {
					return Err(ConfigError::Validation(format!(
						"Environment variable '{}' not found",
						var_name.as_str()
					)))
				},
			},
		};

		result.push_str(&input[last_end..full_match.start()]);
		result.push_str(&value);
		last_end = full_match.end();
	}
	result.push_str(&input[last_end..]);

	Ok(result)
}

impl Config {
	/// Loads configuration from a file, resolving includes and environment variables.
	pub async fn from_file(path: &str) -> Result<Self, ConfigError> {
		let path_buf = Path::new(path);
		let base_dir = path_buf.parent().unwrap_or_else(|| Path::new("."));

		let mut loader = loader::ConfigLoader::new(base_dir);
		let file_name = path_buf
			.file_name()
			.ok_or_else(|| ConfigError::Validation(format!("Invalid path: {}", path)))?;
		loader.load_config(file_name).await
	}

	/// Validates cross-field rules that serde cannot express.
	fn validate(&self) -> Result<(), ConfigError> {
		if self.node.id.trim().is_empty() {
			return Err(ConfigError::Validation("Node ID cannot be empty".into()));
		}
		if self.node.chain_id == 0 {
			return Err(ConfigError::Validation(
				"Node chain_id must be greater than 0".into(),
			));
		}

		self.validate_deployment()?;

		for relayer in &self.relay.relayers {
			if relayer.is_zero() {
				return Err(ConfigError::Validation(
					"Relayer list cannot contain the zero address".into(),
				));
			}
		}

		if !self
			.storage
			.implementations
			.contains_key(&self.storage.primary)
		{
			return Err(ConfigError::Validation(format!(
				"Primary storage '{}' not found in implementations",
				self.storage.primary
			)));
		}
		if !self
			.account
			.implementations
			.contains_key(&self.account.primary)
		{
			return Err(ConfigError::Validation(format!(
				"Primary account '{}' not found in implementations",
				self.account.primary
			)));
		}

		if let Some(api) = &self.api {
			if api.enabled && api.port == 0 {
				return Err(ConfigError::Validation("API port cannot be 0".into()));
			}
		}

		Ok(())
	}

	/// Every contract and token must sit at its own non-zero address.
	fn validate_deployment(&self) -> Result<(), ConfigError> {
		let deployment = &self.deployment;
		let named = [
			("owner", deployment.owner),
			("vault", deployment.vault),
			("relay", deployment.relay),
			("fee_token", deployment.fee_token),
		];

		let mut seen: HashMap<Address, String> = HashMap::new();
		for (name, address) in named {
			if address.is_zero() {
				return Err(ConfigError::Validation(format!(
					"Deployment address '{}' cannot be zero",
					name
				)));
			}
			if let Some(existing) = seen.insert(address, name.to_string()) {
				return Err(ConfigError::Validation(format!(
					"Deployment addresses '{}' and '{}' collide at {}",
					existing, name, address
				)));
			}
		}

		for token in &self.tokens {
			if token.address.is_zero() {
				return Err(ConfigError::Validation(format!(
					"Token '{}' cannot be deployed at the zero address",
					token.symbol
				)));
			}
			if let Some(existing) = seen.insert(token.address, format!("token {}", token.symbol)) {
				return Err(ConfigError::Validation(format!(
					"Token '{}' collides with {} at {}",
					token.symbol, existing, token.address
				)));
			}
			for balance in &token.balances {
				if balance.holder.is_zero() {
					return Err(ConfigError::Validation(format!(
						"Token '{}' cannot mint to the zero address",
						token.symbol
					)));
				}
			}
		}

		Ok(())
	}
}

/// Implementation of FromStr trait for Config to enable parsing from string.
///
/// Environment variables are resolved and the configuration is validated
/// after parsing.
impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}
