//! End-to-end scenarios driving the engine built from configuration.

use super::*;
use crate::{ManualClock, PanicBuilder, PanicFactories};
use async_trait::async_trait;
use panic_storage::implementations::memory::MemoryStorage;
use panic_storage::StorageInterface;
use panic_types::{ConfigSchema, PanicEvent, VaultEvent};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

const NOW: u64 = 1_700_000_000;
const OWNER: &str = "0x1111111111111111111111111111111111111111";
const VAULT: &str = "0x2222222222222222222222222222222222222222";
const RELAY: &str = "0x3333333333333333333333333333333333333333";
const FEE: &str = "0x4444444444444444444444444444444444444444";
const TOKEN: &str = "0x5555555555555555555555555555555555555555";
const RELAYER: &str = "0x7777777777777777777777777777777777777777";
const SAFE: &str = "0x5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a";
// Address of the account key below.
const USER: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

fn addr(s: &str) -> Address {
	s.parse().unwrap()
}

fn config(storage: &str) -> Config {
	format!(
		r#"
[node]
id = "scenario"
chain_id = 31337

[deployment]
owner = "{OWNER}"
vault = "{VAULT}"
relay = "{RELAY}"
fee_token = "{FEE}"

[fee_token]
initial_supply = 1000000

[vault]
relay_cost = 300

[relay]
relayers = ["{RELAYER}"]

[[tokens]]
address = "{TOKEN}"
name = "Test Token"
symbol = "TT"
balances = [{{ holder = "{USER}", amount = 250 }}]

{storage}

[account]
primary = "local"
[account.implementations.local]
private_key = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80"
"#
	)
	.parse()
	.unwrap()
}

const MEMORY: &str = "[storage]\nprimary = \"memory\"\n[storage.implementations.memory]";

// Only `test_failed_write_discards_call` flips this.
static REFUSE_WRITES: AtomicBool = AtomicBool::new(false);

/// Memory storage whose writes fail while [`REFUSE_WRITES`] is set.
struct FlakyStorage {
	inner: MemoryStorage,
}

#[async_trait]
impl StorageInterface for FlakyStorage {
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
		self.inner.get_bytes(key).await
	}

	async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
		if REFUSE_WRITES.load(Ordering::SeqCst) {
			return Err(StorageError::Backend("disk full".to_string()));
		}
		self.inner.set_bytes(key, value).await
	}

	async fn delete(&self, key: &str) -> Result<(), StorageError> {
		self.inner.delete(key).await
	}

	async fn exists(&self, key: &str) -> Result<bool, StorageError> {
		self.inner.exists(key).await
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		self.inner.config_schema()
	}
}

fn create_flaky_storage(_config: &toml::Value) -> Result<Box<dyn StorageInterface>, StorageError> {
	Ok(Box::new(FlakyStorage {
		inner: MemoryStorage::new(),
	}))
}

const FLAKY: &str = "[storage]\nprimary = \"flaky\"\n[storage.implementations.flaky]";

async fn engine_with(config: Config, clock: Arc<ManualClock>) -> PanicEngine {
	let mut storage_factories: HashMap<String, panic_storage::StorageFactory> =
		panic_storage::get_all_implementations()
			.into_iter()
			.map(|(name, factory)| (name.to_string(), factory))
			.collect();
	storage_factories.insert("flaky".to_string(), create_flaky_storage);

	let factories = PanicFactories {
		storage_factories,
		account_factories: panic_account::get_all_implementations()
			.into_iter()
			.map(|(name, factory)| (name.to_string(), factory))
			.collect(),
	};
	PanicBuilder::new(config)
		.with_clock(clock)
		.build(factories)
		.await
		.unwrap()
}

async fn engine() -> (PanicEngine, Arc<ManualClock>) {
	let clock = Arc::new(ManualClock::new(NOW));
	(engine_with(config(MEMORY), clock.clone()).await, clock)
}

/// Approves the vault, registers the safe address and funds the fee balance.
async fn prepare_user(engine: &PanicEngine) {
	let user = addr(USER);
	engine
		.approve(user, addr(TOKEN), addr(VAULT), U256::from(250u64))
		.await
		.unwrap();
	engine.set_safe_address(user, addr(SAFE)).await.unwrap();
	engine
		.transfer(addr(OWNER), addr(FEE), user, U256::from(1_000u64))
		.await
		.unwrap();
}

async fn signed_request(engine: &PanicEngine, deadline: u64) -> (RelayPanicRequest, Bytes) {
	let user = addr(USER);
	let request = RelayPanicRequest {
		user,
		tokens: vec![addr(TOKEN)],
		spenders: vec![addr(VAULT)],
		safe_address: addr(SAFE),
		deadline: U256::from(deadline),
		nonce: engine.nonce_of(&user).await,
	};
	let signature = engine.sign_relay_request(&request).await.unwrap();
	(request, signature)
}

#[tokio::test]
async fn test_direct_sweep_of_approved_balance() {
	let (engine, _) = engine().await;
	prepare_user(&engine).await;
	let user = addr(USER);

	let report = engine
		.sweep_direct(user, vec![addr(TOKEN)], vec![addr("0x9999999999999999999999999999999999999999")])
		.await
		.unwrap();

	assert_eq!(report.fee_burned, U256::ZERO);
	assert_eq!(engine.balance_of(&addr(TOKEN), &user).await.unwrap(), U256::ZERO);
	assert_eq!(
		engine.balance_of(&addr(TOKEN), &addr(SAFE)).await.unwrap(),
		U256::from(250u64)
	);
	assert_eq!(engine.fee_balance(&user).await.unwrap(), U256::from(1_000u64));
}

#[tokio::test]
async fn test_relayed_sweep_and_replay() {
	let (engine, _) = engine().await;
	prepare_user(&engine).await;
	let user = addr(USER);

	let (request, signature) = signed_request(&engine, NOW + 600).await;
	let report = engine
		.execute_relay(addr(RELAYER), request.clone(), signature.clone())
		.await
		.unwrap();

	assert_eq!(report.nonce, Some(U256::ZERO));
	assert_eq!(engine.nonce_of(&user).await, U256::from(1u64));
	assert_eq!(engine.fee_balance(&user).await.unwrap(), U256::from(700u64));
	assert_eq!(
		engine.balance_of(&addr(TOKEN), &addr(SAFE)).await.unwrap(),
		U256::from(250u64)
	);

	let replay = engine
		.execute_relay(addr(RELAYER), request, signature)
		.await;
	assert!(matches!(
		replay,
		Err(EngineError::Relay(RelayError::Vault(VaultError::NonceMismatch { .. })))
	));
	assert_eq!(engine.fee_balance(&user).await.unwrap(), U256::from(700u64));
}

#[tokio::test]
async fn test_relayer_allow_list() {
	let (engine, _) = engine().await;
	prepare_user(&engine).await;
	let stranger = addr("0x8888888888888888888888888888888888888888");

	let (request, signature) = signed_request(&engine, NOW + 600).await;
	let refused = engine
		.execute_relay(stranger, request.clone(), signature.clone())
		.await;
	assert!(matches!(
		refused,
		Err(EngineError::Relay(RelayError::NotRelayer { .. }))
	));

	// Only the owner curates the list.
	assert!(engine.set_relayer(stranger, stranger, true).await.is_err());
	engine
		.set_relayer(addr(OWNER), stranger, true)
		.await
		.unwrap();
	assert!(engine.is_relayer(&stranger).await);
	assert!(engine
		.execute_relay(stranger, request, signature)
		.await
		.is_ok());
}

#[tokio::test]
async fn test_vault_bound_to_relay() {
	let (engine, _) = engine().await;
	prepare_user(&engine).await;

	let (request, signature) = signed_request(&engine, NOW + 600).await;
	let bypass = engine
		.sweep_relayed(addr(RELAYER), request.clone(), signature.clone())
		.await;
	assert!(matches!(
		bypass,
		Err(EngineError::Vault(VaultError::UnauthorizedCaller { .. }))
	));

	engine.set_vault_relay(addr(OWNER), None).await.unwrap();
	assert!(engine
		.sweep_relayed(addr(RELAYER), request, signature)
		.await
		.is_ok());
}

#[tokio::test]
async fn test_deadline_follows_clock() {
	let (engine, clock) = engine().await;
	prepare_user(&engine).await;

	let (request, signature) = signed_request(&engine, NOW + 600).await;
	clock.advance(601);
	let expired = engine
		.execute_relay(addr(RELAYER), request, signature)
		.await;
	assert!(matches!(
		expired,
		Err(EngineError::Relay(RelayError::Vault(VaultError::DeadlineExpired { .. })))
	));
	assert_eq!(engine.nonce_of(&addr(USER)).await, U256::ZERO);
}

#[tokio::test]
async fn test_only_committed_calls_publish_events() {
	let (engine, _) = engine().await;
	prepare_user(&engine).await;
	let mut events = engine.subscribe();

	let refused = engine
		.sweep_direct(addr(USER), vec![addr(TOKEN)], vec![])
		.await;
	assert!(refused.is_err());

	engine
		.sweep_direct(addr(USER), vec![addr(TOKEN)], vec![addr(VAULT)])
		.await
		.unwrap();

	let mut received = Vec::new();
	while let Ok(event) = events.try_recv() {
		received.push(event);
	}
	assert!(matches!(
		received.last(),
		Some(PanicEvent::Vault(VaultEvent::PanicExecuted { relayed: false, .. }))
	));
	assert!(received.iter().any(|e| matches!(
		e,
		PanicEvent::Vault(VaultEvent::TokenSwept { amount, .. }) if *amount == U256::from(250u64)
	)));
}

#[tokio::test]
async fn test_concurrent_submissions_consume_nonce_once() {
	let (engine, _) = engine().await;
	prepare_user(&engine).await;
	let (request, signature) = signed_request(&engine, NOW + 600).await;

	let first = tokio::spawn({
		let engine = engine.clone();
		let (request, signature) = (request.clone(), signature.clone());
		async move { engine.execute_relay(addr(RELAYER), request, signature).await }
	});
	let second = tokio::spawn({
		let engine = engine.clone();
		async move { engine.execute_relay(addr(RELAYER), request, signature).await }
	});

	let results = [first.await.unwrap(), second.await.unwrap()];
	assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
	assert_eq!(engine.fee_balance(&addr(USER)).await.unwrap(), U256::from(700u64));
}

#[tokio::test]
async fn test_vault_state_survives_restart() {
	let dir = tempfile::TempDir::new().unwrap();
	let storage = format!(
		"[storage]\nprimary = \"file\"\n[storage.implementations.file]\nstorage_path = \"{}\"",
		dir.path().display()
	);
	let clock = Arc::new(ManualClock::new(NOW));

	let engine = engine_with(config(&storage), clock.clone()).await;
	prepare_user(&engine).await;
	let (request, signature) = signed_request(&engine, NOW + 600).await;
	engine
		.execute_relay(addr(RELAYER), request.clone(), signature.clone())
		.await
		.unwrap();
	drop(engine);

	let restarted = engine_with(config(&storage), clock).await;
	let user = addr(USER);
	assert_eq!(restarted.safe_address_of(&user).await, Some(addr(SAFE)));
	assert_eq!(restarted.nonce_of(&user).await, U256::from(1u64));

	// Ledgers are redeployed, but the consumed nonce still blocks the replay.
	let replay = restarted.execute_relay(addr(RELAYER), request, signature).await;
	assert!(matches!(
		replay,
		Err(EngineError::Relay(RelayError::Vault(VaultError::NonceMismatch { .. })))
	));
}

#[tokio::test]
async fn test_user_status() {
	let (engine, _) = engine().await;
	prepare_user(&engine).await;

	let status = engine.user_status(&addr(USER)).await;
	assert_eq!(status.safe_address, Some(addr(SAFE)));
	assert_eq!(status.relay_cost, U256::from(300u64));
	assert_eq!(status.fee_balance, U256::from(1_000u64));

	let token = status
		.tokens
		.iter()
		.find(|t| t.token == addr(TOKEN))
		.unwrap();
	assert_eq!(token.sweepable, U256::from(250u64));
	assert_eq!(token.symbol, "TT");
}

#[tokio::test]
async fn test_ownership_transfer_dispatch() {
	let (engine, _) = engine().await;
	let new_owner = addr("0x8888888888888888888888888888888888888888");

	engine
		.transfer_ownership(addr(OWNER), addr(RELAY), new_owner)
		.await
		.unwrap();
	assert!(engine.set_relayer(addr(OWNER), new_owner, true).await.is_err());
	engine.set_relayer(new_owner, new_owner, true).await.unwrap();

	assert!(matches!(
		engine
			.transfer_ownership(addr(OWNER), addr(TOKEN), new_owner)
			.await,
		Err(EngineError::UnknownContract(_))
	));
}

#[tokio::test]
async fn test_failed_write_discards_call() {
	let clock = Arc::new(ManualClock::new(NOW));
	let engine = engine_with(config(FLAKY), clock).await;
	let user = addr(USER);
	let mut events = engine.subscribe();

	REFUSE_WRITES.store(true, Ordering::SeqCst);
	let refused = engine.set_safe_address(user, addr(SAFE)).await;
	REFUSE_WRITES.store(false, Ordering::SeqCst);
	assert!(matches!(refused, Err(EngineError::Storage(_))));
	assert_eq!(engine.safe_address_of(&user).await, None);
	assert!(events.try_recv().is_err());

	prepare_user(&engine).await;
	while events.try_recv().is_ok() {}
	let (request, signature) = signed_request(&engine, NOW + 600).await;

	REFUSE_WRITES.store(true, Ordering::SeqCst);
	let relayed = engine
		.execute_relay(addr(RELAYER), request.clone(), signature.clone())
		.await;
	let revoked = engine.set_relayer(addr(OWNER), addr(RELAYER), false).await;
	REFUSE_WRITES.store(false, Ordering::SeqCst);

	assert!(matches!(relayed, Err(EngineError::Storage(_))));
	assert!(matches!(revoked, Err(EngineError::Storage(_))));
	assert!(events.try_recv().is_err());
	assert_eq!(engine.nonce_of(&user).await, U256::ZERO);
	assert_eq!(engine.fee_balance(&user).await.unwrap(), U256::from(1_000u64));
	assert_eq!(
		engine.balance_of(&addr(TOKEN), &user).await.unwrap(),
		U256::from(250u64)
	);
	assert_eq!(
		engine.balance_of(&addr(TOKEN), &addr(SAFE)).await.unwrap(),
		U256::ZERO
	);
	assert!(engine.is_relayer(&addr(RELAYER)).await);

	// Once storage recovers the same pair goes through exactly once.
	let report = engine
		.execute_relay(addr(RELAYER), request, signature)
		.await
		.unwrap();
	assert_eq!(report.nonce, Some(U256::ZERO));
	assert_eq!(engine.nonce_of(&user).await, U256::from(1u64));
}

#[tokio::test]
async fn test_admin_changes_survive_restart() {
	let dir = tempfile::TempDir::new().unwrap();
	let storage = format!(
		"[storage]\nprimary = \"file\"\n[storage.implementations.file]\nstorage_path = \"{}\"",
		dir.path().display()
	);
	let clock = Arc::new(ManualClock::new(NOW));
	let backup = addr("0x8888888888888888888888888888888888888888");
	let controller = addr("0x9999999999999999999999999999999999999999");

	let engine = engine_with(config(&storage), clock.clone()).await;
	engine
		.set_relayer(addr(OWNER), addr(RELAYER), false)
		.await
		.unwrap();
	engine.set_relayer(addr(OWNER), backup, true).await.unwrap();
	engine.set_vault_relay(addr(OWNER), None).await.unwrap();
	engine
		.set_fee_controller(addr(OWNER), controller)
		.await
		.unwrap();
	engine
		.transfer_ownership(addr(OWNER), addr(RELAY), backup)
		.await
		.unwrap();
	drop(engine);

	// The config still lists the revoked relayer; the stored allow-list wins.
	let restarted = engine_with(config(&storage), clock).await;
	assert!(!restarted.is_relayer(&addr(RELAYER)).await);
	assert!(restarted.is_relayer(&backup).await);
	assert_eq!(restarted.vault_relay().await, None);
	assert_eq!(restarted.fee_controller().await, Some(controller));
	assert!(matches!(
		restarted.set_relayer(addr(OWNER), addr(RELAYER), true).await,
		Err(EngineError::Relay(RelayError::Ownership(_)))
	));
}
