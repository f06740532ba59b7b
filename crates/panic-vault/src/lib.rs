//! The panic vault: safe-address registry, replay nonces and the sweep.
//!
//! A user pre-approves the vault on each ERC-20 they want rescued and
//! registers a safe address. A sweep moves `min(balance, allowance)` of every
//! listed token from the user to that safe address, either on a direct call
//! by the user or on a relayed call carrying the user's EIP-712 signature.
//! The relayed path consumes the user's nonce and burns `relay_cost` fee
//! tokens.
//!
//! Every refused call leaves the vault and all ledgers untouched. The only
//! partial outcome is inside the token loop: a token that cannot be moved is
//! recorded as failed and the loop carries on with the next one.

use alloy_primitives::{Address, Bytes, B256, U256};
use panic_token::{Erc20Interface, TokenError, TokenRegistry};
use panic_types::{
	CallContext, EventLog, Ownable, OwnershipError, PanicEvent, RelayPanicRequest,
	SigningDomain, VaultEvent,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

pub mod signature;

pub use signature::{recover_signer, SignatureError};

/// Errors that refuse a vault call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VaultError {
	#[error("Zero address not allowed")]
	ZeroAddress,
	#[error("Tokens and spenders must have the same length ({tokens} != {spenders})")]
	InvalidInput { tokens: usize, spenders: usize },
	#[error("No safe address configured for {user}")]
	SafeAddressRequired { user: Address },
	#[error("Request safe address {requested} does not match configured {configured}")]
	SafeAddressMismatch {
		requested: Address,
		configured: Address,
	},
	#[error("Authorization expired at {deadline} (now {now})")]
	DeadlineExpired { deadline: U256, now: u64 },
	#[error("Nonce mismatch: expected {expected}, got {provided}")]
	NonceMismatch { expected: U256, provided: U256 },
	#[error("Invalid signature: {0}")]
	InvalidSignature(String),
	#[error("Caller {caller} is not the bound relay")]
	UnauthorizedCaller { caller: Address },
	#[error("Fee token {0} is not deployed")]
	FeeTokenMissing(Address),
	#[error("Relay fee could not be charged: {0}")]
	FeeBurn(#[from] TokenError),
	#[error(transparent)]
	Ownership(#[from] OwnershipError),
}

/// What happened to one token of a sweep batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TokenSweepStatus {
	Swept { amount: U256 },
	/// Nothing movable: zero balance or zero allowance.
	Skipped,
	Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSweep {
	pub token: Address,
	#[serde(flatten)]
	pub status: TokenSweepStatus,
}

/// Outcome of a successful sweep call.
///
/// A successful call may still contain failed tokens; callers must inspect
/// the per-token outcomes to learn which balances actually moved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
	pub user: Address,
	pub safe_address: Address,
	pub tokens: Vec<TokenSweep>,
	pub fee_burned: U256,
	/// Nonce consumed by a relayed sweep.
	pub nonce: Option<U256>,
}

impl SweepReport {
	/// Tokens whose balance moved, with the amount.
	pub fn swept(&self) -> impl Iterator<Item = (&Address, &U256)> {
		self.tokens.iter().filter_map(|t| match &t.status {
			TokenSweepStatus::Swept { amount } => Some((&t.token, amount)),
			_ => None,
		})
	}

	/// Tokens that could not be moved, with the reason.
	pub fn failed(&self) -> impl Iterator<Item = (&Address, &str)> {
		self.tokens.iter().filter_map(|t| match &t.status {
			TokenSweepStatus::Failed { reason } => Some((&t.token, reason.as_str())),
			_ => None,
		})
	}
}

/// Durable state of a vault: the per-user registry plus its admin settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultSnapshot {
	pub owner: Address,
	pub relay: Option<Address>,
	pub safe_addresses: HashMap<Address, Address>,
	pub nonces: HashMap<Address, U256>,
}

/// The vault contract.
#[derive(Debug, Clone)]
pub struct PanicVault {
	address: Address,
	chain_id: u64,
	fee_token: Address,
	relay_cost: U256,
	ownable: Ownable,
	relay: Option<Address>,
	safe_addresses: HashMap<Address, Address>,
	nonces: HashMap<Address, U256>,
}

impl PanicVault {
	pub fn new(
		address: Address,
		chain_id: u64,
		fee_token: Address,
		relay_cost: U256,
		owner: Address,
	) -> Self {
		Self {
			address,
			chain_id,
			fee_token,
			relay_cost,
			ownable: Ownable::new(address, owner),
			relay: None,
			safe_addresses: HashMap::new(),
			nonces: HashMap::new(),
		}
	}

	pub fn address(&self) -> Address {
		self.address
	}

	pub fn chain_id(&self) -> u64 {
		self.chain_id
	}

	pub fn fee_token(&self) -> Address {
		self.fee_token
	}

	pub fn relay_cost(&self) -> U256 {
		self.relay_cost
	}

	pub fn owner(&self) -> Address {
		self.ownable.owner()
	}

	/// The relay bound to the signed path, if any.
	pub fn relay(&self) -> Option<Address> {
		self.relay
	}

	/// Configured safe address of `user`; `None` while unconfigured.
	pub fn safe_address_of(&self, user: &Address) -> Option<Address> {
		self.safe_addresses.get(user).copied()
	}

	/// Current nonce of `user`, starting at zero.
	pub fn nonce_of(&self, user: &Address) -> U256 {
		self.nonces.get(user).copied().unwrap_or_default()
	}

	pub fn signing_domain(&self) -> SigningDomain {
		SigningDomain::panic_vault(self.chain_id, self.address)
	}

	pub fn domain_separator(&self) -> B256 {
		self.signing_domain().separator()
	}

	/// Digest a user must sign to authorize `request` on this vault.
	pub fn relay_digest(&self, request: &RelayPanicRequest) -> B256 {
		request.signing_digest(&self.signing_domain())
	}

	/// Registers the caller's safe address, overwriting any previous one.
	pub fn set_safe_address(
		&mut self,
		ctx: &CallContext,
		safe_address: Address,
		log: &mut EventLog,
	) -> Result<(), VaultError> {
		if safe_address.is_zero() {
			return Err(VaultError::ZeroAddress);
		}

		self.safe_addresses.insert(ctx.caller, safe_address);
		log.emit(PanicEvent::Vault(VaultEvent::SafeAddressUpdated {
			user: ctx.caller,
			safe_address,
		}));
		tracing::info!(user = %ctx.caller, safe = %safe_address, "Safe address updated");
		Ok(())
	}

	/// Binds the signed path to `relay`, or opens it again with `None`. Owner-only.
	pub fn set_relay(
		&mut self,
		ctx: &CallContext,
		relay: Option<Address>,
		log: &mut EventLog,
	) -> Result<(), VaultError> {
		self.ownable.only_owner(&ctx.caller)?;
		if relay.is_some_and(|r| r.is_zero()) {
			return Err(VaultError::ZeroAddress);
		}

		self.relay = relay;
		log.emit(PanicEvent::Vault(VaultEvent::RelayBound { relay }));
		Ok(())
	}

	pub fn transfer_ownership(
		&mut self,
		ctx: &CallContext,
		new_owner: Address,
		log: &mut EventLog,
	) -> Result<(), VaultError> {
		Ok(self
			.ownable
			.transfer_ownership(&ctx.caller, new_owner, log)?)
	}

	/// Sweeps the caller's own tokens to their safe address. No fee.
	pub fn sweep_direct(
		&self,
		ctx: &CallContext,
		ledgers: &mut TokenRegistry,
		tokens: &[Address],
		spenders: &[Address],
		log: &mut EventLog,
	) -> Result<SweepReport, VaultError> {
		if tokens.len() != spenders.len() {
			return Err(VaultError::InvalidInput {
				tokens: tokens.len(),
				spenders: spenders.len(),
			});
		}
		let user = ctx.caller;
		let safe_address = self
			.safe_address_of(&user)
			.ok_or(VaultError::SafeAddressRequired { user })?;

		let outcomes = self.sweep_tokens(ctx, ledgers, user, safe_address, tokens, log);
		log.emit(PanicEvent::Vault(VaultEvent::PanicExecuted {
			user,
			safe_address,
			relayed: false,
			nonce: None,
		}));
		tracing::info!(user = %user, tokens = tokens.len(), "Direct sweep executed");

		Ok(SweepReport {
			user,
			safe_address,
			tokens: outcomes,
			fee_burned: U256::ZERO,
			nonce: None,
		})
	}

	/// Sweeps `request.user`'s tokens on the strength of their signature.
	///
	/// Checks, in order: bound relay, deadline, configured safe address,
	/// safe-address match, nonce, signer. Then consumes the nonce, burns the
	/// relay fee and sweeps.
	pub fn sweep_relayed(
		&mut self,
		ctx: &CallContext,
		ledgers: &mut TokenRegistry,
		request: &RelayPanicRequest,
		signature: &Bytes,
		log: &mut EventLog,
	) -> Result<SweepReport, VaultError> {
		if let Some(relay) = self.relay {
			if ctx.caller != relay {
				return Err(VaultError::UnauthorizedCaller { caller: ctx.caller });
			}
		}
		if request.deadline < U256::from(ctx.timestamp) {
			return Err(VaultError::DeadlineExpired {
				deadline: request.deadline,
				now: ctx.timestamp,
			});
		}

		let user = request.user;
		let configured = self
			.safe_address_of(&user)
			.ok_or(VaultError::SafeAddressRequired { user })?;
		if request.safe_address != configured {
			return Err(VaultError::SafeAddressMismatch {
				requested: request.safe_address,
				configured,
			});
		}

		let nonce = self.nonce_of(&user);
		if request.nonce != nonce {
			return Err(VaultError::NonceMismatch {
				expected: nonce,
				provided: request.nonce,
			});
		}

		let signer = recover_signer(&self.relay_digest(request), signature)
			.map_err(|e| VaultError::InvalidSignature(e.to_string()))?;
		if signer != user {
			return Err(VaultError::InvalidSignature(format!(
				"recovered {} instead of {}",
				signer, user
			)));
		}

		// Consume the nonce before any token is touched.
		self.nonces.insert(user, nonce + U256::from(1u64));

		let mut fee_log = EventLog::new();
		if let Err(e) = self.charge_fee(ctx, ledgers, user, &mut fee_log) {
			self.nonces.insert(user, nonce);
			return Err(e);
		}
		log.append(fee_log);

		let outcomes = self.sweep_tokens(ctx, ledgers, user, configured, &request.tokens, log);
		log.emit(PanicEvent::Vault(VaultEvent::PanicExecuted {
			user,
			safe_address: configured,
			relayed: true,
			nonce: Some(nonce),
		}));
		tracing::info!(
			user = %user,
			nonce = %nonce,
			relayer = %ctx.caller,
			tokens = request.tokens.len(),
			"Relayed sweep executed"
		);

		Ok(SweepReport {
			user,
			safe_address: configured,
			tokens: outcomes,
			fee_burned: self.relay_cost,
			nonce: Some(nonce),
		})
	}

	fn charge_fee(
		&self,
		ctx: &CallContext,
		ledgers: &mut TokenRegistry,
		user: Address,
		log: &mut EventLog,
	) -> Result<(), VaultError> {
		if self.relay_cost.is_zero() {
			return Ok(());
		}
		let fee_token = ledgers
			.fee_token_mut(&self.fee_token)
			.ok_or(VaultError::FeeTokenMissing(self.fee_token))?;

		fee_token.burn_from(
			&ctx.forwarded_by(self.address),
			user,
			self.relay_cost,
			log,
		)?;
		Ok(())
	}

	/// Moves `min(balance, allowance)` of each token. One token failing never
	/// stops the others.
	fn sweep_tokens(
		&self,
		ctx: &CallContext,
		ledgers: &mut TokenRegistry,
		user: Address,
		safe_address: Address,
		tokens: &[Address],
		log: &mut EventLog,
	) -> Vec<TokenSweep> {
		let vault_ctx = ctx.forwarded_by(self.address);

		tokens
			.iter()
			.map(|token| {
				let status = match ledgers.get_mut(token) {
					Some(ledger) => {
						self.sweep_one(&vault_ctx, ledger, user, safe_address, log)
					},
					None => TokenSweepStatus::Failed {
						reason: "no token contract at address".to_string(),
					},
				};

				if let TokenSweepStatus::Failed { reason } = &status {
					tracing::warn!(user = %user, token = %token, %reason, "Token sweep failed");
					log.emit(PanicEvent::Vault(VaultEvent::TokenSweepFailed {
						user,
						token: *token,
						reason: reason.clone(),
					}));
				}
				TokenSweep {
					token: *token,
					status,
				}
			})
			.collect()
	}

	fn sweep_one(
		&self,
		vault_ctx: &CallContext,
		ledger: &mut dyn Erc20Interface,
		user: Address,
		safe_address: Address,
		log: &mut EventLog,
	) -> TokenSweepStatus {
		let balance = ledger.balance_of(&user);
		let allowance = ledger.allowance(&user, &self.address);
		let amount = balance.min(allowance);
		if amount.is_zero() {
			return TokenSweepStatus::Skipped;
		}

		let mut token_log = EventLog::new();
		match ledger.transfer_from(vault_ctx, user, safe_address, amount, &mut token_log) {
			Ok(()) => {
				log.append(token_log);
				log.emit(PanicEvent::Vault(VaultEvent::TokenSwept {
					user,
					token: ledger.address(),
					safe_address,
					amount,
				}));
				TokenSweepStatus::Swept { amount }
			},
			Err(e) => TokenSweepStatus::Failed {
				reason: e.to_string(),
			},
		}
	}

	/// Exports the durable state.
	pub fn snapshot(&self) -> VaultSnapshot {
		VaultSnapshot {
			owner: self.ownable.owner(),
			relay: self.relay,
			safe_addresses: self.safe_addresses.clone(),
			nonces: self.nonces.clone(),
		}
	}

	/// Replaces the durable state with a previously exported snapshot.
	pub fn restore(&mut self, snapshot: VaultSnapshot) {
		self.ownable = Ownable::new(self.address, snapshot.owner);
		self.relay = snapshot.relay;
		self.safe_addresses = snapshot.safe_addresses;
		self.nonces = snapshot.nonces;
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_signer::SignerSync;
	use alloy_signer_local::PrivateKeySigner;
	use panic_token::{Erc20Ledger, FeeToken};
	use panic_types::TokenEvent;

	const NOW: u64 = 1_700_000_000;
	const CHAIN_ID: u64 = 31337;

	fn vault_address() -> Address {
		Address::repeat_byte(0xfa)
	}

	fn fee_address() -> Address {
		Address::repeat_byte(0xfe)
	}

	fn token_address() -> Address {
		Address::repeat_byte(0xaa)
	}

	fn admin() -> Address {
		Address::repeat_byte(0x01)
	}

	fn safe() -> Address {
		Address::repeat_byte(0x5a)
	}

	fn relayer() -> Address {
		Address::repeat_byte(0x77)
	}

	/// A ledger that refuses every transfer, like a paused token.
	struct PausedToken {
		inner: Erc20Ledger,
	}

	impl Erc20Interface for PausedToken {
		fn address(&self) -> Address {
			self.inner.address()
		}
		fn symbol(&self) -> &str {
			self.inner.symbol()
		}
		fn decimals(&self) -> u8 {
			self.inner.decimals()
		}
		fn total_supply(&self) -> U256 {
			self.inner.total_supply()
		}
		fn balance_of(&self, owner: &Address) -> U256 {
			self.inner.balance_of(owner)
		}
		fn allowance(&self, owner: &Address, spender: &Address) -> U256 {
			self.inner.allowance(owner, spender)
		}
		fn transfer(
			&mut self,
			_ctx: &CallContext,
			_to: Address,
			_amount: U256,
			_log: &mut EventLog,
		) -> Result<(), TokenError> {
			Err(TokenError::Reverted("paused".to_string()))
		}
		fn approve(
			&mut self,
			ctx: &CallContext,
			spender: Address,
			amount: U256,
			log: &mut EventLog,
		) -> Result<(), TokenError> {
			self.inner.approve(ctx, spender, amount, log)
		}
		fn transfer_from(
			&mut self,
			_ctx: &CallContext,
			_from: Address,
			_to: Address,
			_amount: U256,
			_log: &mut EventLog,
		) -> Result<(), TokenError> {
			Err(TokenError::Reverted("paused".to_string()))
		}
		fn clone_box(&self) -> Box<dyn Erc20Interface> {
			Box::new(PausedToken {
				inner: self.inner.clone(),
			})
		}
	}

	struct Fixture {
		vault: PanicVault,
		ledgers: TokenRegistry,
		user: PrivateKeySigner,
	}

	impl Fixture {
		fn new(relay_cost: u64) -> Self {
			let user = PrivateKeySigner::random();
			let mut ledgers = TokenRegistry::new();
			let mut fee = FeeToken::new(
				fee_address(),
				"Panic",
				"PANIC",
				U256::from(10_000u64),
				admin(),
				vault_address(),
			)
			.unwrap();
			fee.transfer(
				&CallContext::new(admin(), NOW),
				user.address(),
				U256::from(1_000u64),
				&mut EventLog::new(),
			)
			.unwrap();
			ledgers.deploy_fee_token(fee);

			let vault = PanicVault::new(
				vault_address(),
				CHAIN_ID,
				fee_address(),
				U256::from(relay_cost),
				admin(),
			);
			Self {
				vault,
				ledgers,
				user,
			}
		}

		fn user_ctx(&self) -> CallContext {
			CallContext::new(self.user.address(), NOW)
		}

		/// Deploys a plain ledger where the user holds `balance` and has
		/// approved the vault for `allowance`.
		fn deploy_token(&mut self, token: Address, balance: u64, allowance: u64) {
			let user = self.user.address();
			let mut ledger = Erc20Ledger::new(token, "Test Token", "TT", 18);
			let mut log = EventLog::new();
			ledger.mint(user, U256::from(balance), &mut log).unwrap();
			ledger
				.approve(
					&CallContext::new(user, NOW),
					vault_address(),
					U256::from(allowance),
					&mut log,
				)
				.unwrap();
			self.ledgers.deploy(Box::new(ledger));
		}

		fn set_safe(&mut self, safe_address: Address) {
			let ctx = self.user_ctx();
			self.vault
				.set_safe_address(&ctx, safe_address, &mut EventLog::new())
				.unwrap();
		}

		fn request(&self, deadline: u64) -> RelayPanicRequest {
			RelayPanicRequest {
				user: self.user.address(),
				tokens: vec![token_address()],
				spenders: vec![vault_address()],
				safe_address: safe(),
				deadline: U256::from(deadline),
				nonce: self.vault.nonce_of(&self.user.address()),
			}
		}

		fn sign(&self, signer: &PrivateKeySigner, request: &RelayPanicRequest) -> Bytes {
			let digest = self.vault.relay_digest(request);
			Bytes::from(signer.sign_hash_sync(&digest).unwrap().as_bytes().to_vec())
		}

		fn relay(
			&mut self,
			request: &RelayPanicRequest,
			signature: &Bytes,
		) -> Result<SweepReport, VaultError> {
			let ctx = CallContext::new(relayer(), NOW);
			self.vault.sweep_relayed(
				&ctx,
				&mut self.ledgers,
				request,
				signature,
				&mut EventLog::new(),
			)
		}

		fn balance(&self, token: Address, owner: Address) -> U256 {
			self.ledgers.get(&token).unwrap().balance_of(&owner)
		}
	}

	#[test]
	fn test_set_safe_address_rejects_zero_and_overwrites() {
		let mut f = Fixture::new(0);
		let ctx = f.user_ctx();
		let mut log = EventLog::new();

		assert_eq!(
			f.vault.set_safe_address(&ctx, Address::ZERO, &mut log),
			Err(VaultError::ZeroAddress)
		);
		assert!(log.is_empty());
		assert_eq!(f.vault.safe_address_of(&ctx.caller), None);

		f.vault.set_safe_address(&ctx, safe(), &mut log).unwrap();
		f.vault
			.set_safe_address(&ctx, Address::repeat_byte(0x5b), &mut log)
			.unwrap();
		assert_eq!(
			f.vault.safe_address_of(&ctx.caller),
			Some(Address::repeat_byte(0x5b))
		);
		assert_eq!(log.events().len(), 2);
	}

	#[test]
	fn test_direct_sweep_requires_safe_address() {
		let mut f = Fixture::new(0);
		f.deploy_token(token_address(), 250, 250);
		let ctx = f.user_ctx();

		let result = f.vault.sweep_direct(
			&ctx,
			&mut f.ledgers,
			&[token_address()],
			&[vault_address()],
			&mut EventLog::new(),
		);
		assert_eq!(
			result,
			Err(VaultError::SafeAddressRequired { user: ctx.caller })
		);
		assert_eq!(f.balance(token_address(), ctx.caller), U256::from(250u64));
	}

	#[test]
	fn test_direct_sweep_rejects_length_mismatch() {
		let mut f = Fixture::new(0);
		f.deploy_token(token_address(), 250, 250);
		f.set_safe(safe());
		let ctx = f.user_ctx();

		let result = f.vault.sweep_direct(
			&ctx,
			&mut f.ledgers,
			&[token_address()],
			&[],
			&mut EventLog::new(),
		);
		assert_eq!(
			result,
			Err(VaultError::InvalidInput {
				tokens: 1,
				spenders: 0
			})
		);
	}

	#[test]
	fn test_direct_sweep_moves_approved_balance() {
		let mut f = Fixture::new(300);
		f.deploy_token(token_address(), 250, 250);
		f.set_safe(safe());
		let ctx = f.user_ctx();
		let mut log = EventLog::new();

		let report = f
			.vault
			.sweep_direct(
				&ctx,
				&mut f.ledgers,
				&[token_address()],
				&[Address::repeat_byte(0x33)],
				&mut log,
			)
			.unwrap();

		assert_eq!(f.balance(token_address(), ctx.caller), U256::ZERO);
		assert_eq!(f.balance(token_address(), safe()), U256::from(250u64));
		// No fee on the direct path.
		assert_eq!(f.balance(fee_address(), ctx.caller), U256::from(1_000u64));
		assert_eq!(report.fee_burned, U256::ZERO);
		assert_eq!(
			report.swept().collect::<Vec<_>>(),
			vec![(&token_address(), &U256::from(250u64))]
		);
		assert!(matches!(
			log.events().last(),
			Some(PanicEvent::Vault(VaultEvent::PanicExecuted { relayed: false, .. }))
		));
	}

	#[test]
	fn test_sweep_moves_min_of_balance_and_allowance() {
		let mut f = Fixture::new(0);
		f.deploy_token(token_address(), 500, 120);
		f.set_safe(safe());
		let ctx = f.user_ctx();

		f.vault
			.sweep_direct(
				&ctx,
				&mut f.ledgers,
				&[token_address()],
				&[vault_address()],
				&mut EventLog::new(),
			)
			.unwrap();

		assert_eq!(f.balance(token_address(), ctx.caller), U256::from(380u64));
		assert_eq!(f.balance(token_address(), safe()), U256::from(120u64));
	}

	#[test]
	fn test_failing_token_does_not_abort_batch() {
		let mut f = Fixture::new(0);
		let unapproved = Address::repeat_byte(0xab);
		let paused = Address::repeat_byte(0xac);
		let missing = Address::repeat_byte(0xad);
		let healthy = token_address();

		f.deploy_token(unapproved, 100, 0);
		f.deploy_token(healthy, 75, 75);
		let user = f.user.address();
		let mut paused_ledger = Erc20Ledger::new(paused, "Paused", "PSD", 18);
		paused_ledger
			.mint(user, U256::from(40u64), &mut EventLog::new())
			.unwrap();
		paused_ledger
			.approve(
				&CallContext::new(user, NOW),
				vault_address(),
				U256::MAX,
				&mut EventLog::new(),
			)
			.unwrap();
		f.ledgers.deploy(Box::new(PausedToken {
			inner: paused_ledger,
		}));
		f.set_safe(safe());

		let ctx = f.user_ctx();
		let tokens = [unapproved, paused, missing, healthy];
		let mut log = EventLog::new();
		let report = f
			.vault
			.sweep_direct(&ctx, &mut f.ledgers, &tokens, &tokens, &mut log)
			.unwrap();

		let statuses: Vec<_> = report.tokens.iter().map(|t| &t.status).collect();
		assert_eq!(statuses[0], &TokenSweepStatus::Skipped);
		assert!(matches!(statuses[1], TokenSweepStatus::Failed { reason } if reason.contains("paused")));
		assert!(matches!(statuses[2], TokenSweepStatus::Failed { .. }));
		assert_eq!(
			statuses[3],
			&TokenSweepStatus::Swept {
				amount: U256::from(75u64)
			}
		);
		assert_eq!(report.failed().count(), 2);

		assert_eq!(f.balance(healthy, safe()), U256::from(75u64));
		assert_eq!(f.balance(paused, user), U256::from(40u64));
		assert_eq!(f.balance(unapproved, user), U256::from(100u64));

		let failures = log
			.events()
			.iter()
			.filter(|e| matches!(e, PanicEvent::Vault(VaultEvent::TokenSweepFailed { .. })))
			.count();
		assert_eq!(failures, 2);
	}

	#[test]
	fn test_relayed_sweep_consumes_nonce_and_burns_fee() {
		let mut f = Fixture::new(300);
		f.deploy_token(token_address(), 250, 250);
		f.set_safe(safe());
		let user = f.user.address();

		let request = f.request(NOW + 600);
		let signature = f.sign(&f.user, &request);
		let mut log = EventLog::new();
		let report = f
			.vault
			.sweep_relayed(
				&CallContext::new(relayer(), NOW),
				&mut f.ledgers,
				&request,
				&signature,
				&mut log,
			)
			.unwrap();

		assert_eq!(report.nonce, Some(U256::ZERO));
		assert_eq!(report.fee_burned, U256::from(300u64));
		assert_eq!(f.vault.nonce_of(&user), U256::from(1u64));
		assert_eq!(f.balance(fee_address(), user), U256::from(700u64));
		assert_eq!(f.balance(token_address(), safe()), U256::from(250u64));
		assert!(log.events().iter().any(|e| matches!(
			e,
			PanicEvent::Token(TokenEvent::Burn { amount, .. }) if *amount == U256::from(300u64)
		)));

		// The same pair can never be replayed.
		assert_eq!(
			f.relay(&request, &signature),
			Err(VaultError::NonceMismatch {
				expected: U256::from(1u64),
				provided: U256::ZERO
			})
		);
		assert_eq!(f.balance(fee_address(), user), U256::from(700u64));
	}

	#[test]
	fn test_relayed_sweep_deadline() {
		let mut f = Fixture::new(0);
		f.deploy_token(token_address(), 250, 250);
		f.set_safe(safe());

		let expired = f.request(NOW - 1);
		let signature = f.sign(&f.user, &expired);
		assert!(matches!(
			f.relay(&expired, &signature),
			Err(VaultError::DeadlineExpired { .. })
		));
		assert_eq!(f.vault.nonce_of(&f.user.address()), U256::ZERO);

		// A deadline equal to the block timestamp is still valid.
		let boundary = f.request(NOW);
		let signature = f.sign(&f.user, &boundary);
		assert!(f.relay(&boundary, &signature).is_ok());
	}

	#[test]
	fn test_relayed_sweep_safe_address_checks() {
		let mut f = Fixture::new(0);
		f.deploy_token(token_address(), 250, 250);

		let request = f.request(NOW + 600);
		let signature = f.sign(&f.user, &request);
		assert_eq!(
			f.relay(&request, &signature),
			Err(VaultError::SafeAddressRequired {
				user: f.user.address()
			})
		);

		// Signed against S, but the registry now says S'.
		f.set_safe(Address::repeat_byte(0x5b));
		assert!(matches!(
			f.relay(&request, &signature),
			Err(VaultError::SafeAddressMismatch { .. })
		));

		f.set_safe(safe());
		assert!(f.relay(&request, &signature).is_ok());
	}

	#[test]
	fn test_relayed_sweep_rejects_foreign_signer() {
		let mut f = Fixture::new(300);
		f.deploy_token(token_address(), 250, 250);
		f.set_safe(safe());

		let request = f.request(NOW + 600);
		let signature = f.sign(&PrivateKeySigner::random(), &request);
		assert!(matches!(
			f.relay(&request, &signature),
			Err(VaultError::InvalidSignature(_))
		));

		let truncated = Bytes::from(vec![0u8; 64]);
		assert!(matches!(
			f.relay(&request, &truncated),
			Err(VaultError::InvalidSignature(_))
		));
		assert_eq!(f.vault.nonce_of(&f.user.address()), U256::ZERO);
		assert_eq!(f.balance(token_address(), safe()), U256::ZERO);
	}

	#[test]
	fn test_relayed_sweep_rejects_altered_request() {
		let mut f = Fixture::new(0);
		f.deploy_token(token_address(), 250, 250);
		f.deploy_token(Address::repeat_byte(0xab), 10, 10);
		f.set_safe(safe());

		let request = f.request(NOW + 600);
		let signature = f.sign(&f.user, &request);

		let mut altered = request.clone();
		altered.tokens.push(Address::repeat_byte(0xab));
		assert!(matches!(
			f.relay(&altered, &signature),
			Err(VaultError::InvalidSignature(_))
		));

		let mut altered = request.clone();
		altered.deadline = U256::from(NOW + 601);
		assert!(matches!(
			f.relay(&altered, &signature),
			Err(VaultError::InvalidSignature(_))
		));
	}

	#[test]
	fn test_relayed_sweep_rejects_request_rewritten_to_pass_state_checks() {
		let mut f = Fixture::new(0);
		f.deploy_token(token_address(), 250, 250);
		f.set_safe(safe());
		let user = f.user.address();

		// Signed for another safe address, then rewritten to the registered one.
		let mut signed = f.request(NOW + 600);
		signed.safe_address = Address::repeat_byte(0x5b);
		let signature = f.sign(&f.user, &signed);
		let mut rewritten = signed.clone();
		rewritten.safe_address = safe();
		assert!(matches!(
			f.relay(&rewritten, &signature),
			Err(VaultError::InvalidSignature(_))
		));

		// Signed for a future nonce, then rewritten to the current counter.
		let mut signed = f.request(NOW + 600);
		signed.nonce = U256::from(1u64);
		let signature = f.sign(&f.user, &signed);
		let mut rewritten = signed.clone();
		rewritten.nonce = f.vault.nonce_of(&user);
		assert!(matches!(
			f.relay(&rewritten, &signature),
			Err(VaultError::InvalidSignature(_))
		));

		assert_eq!(f.vault.nonce_of(&user), U256::ZERO);
		assert_eq!(f.balance(token_address(), safe()), U256::ZERO);

		// After one honest sweep the stale nonce-0 signature still fails once
		// its nonce is bumped to match the counter.
		let honest = f.request(NOW + 600);
		let honest_signature = f.sign(&f.user, &honest);
		f.relay(&honest, &honest_signature).unwrap();
		let mut bumped = honest.clone();
		bumped.nonce = f.vault.nonce_of(&user);
		assert!(matches!(
			f.relay(&bumped, &honest_signature),
			Err(VaultError::InvalidSignature(_))
		));
		assert_eq!(f.vault.nonce_of(&user), U256::from(1u64));
	}

	#[test]
	fn test_fee_shortfall_rolls_back_nonce() {
		let mut f = Fixture::new(5_000);
		f.deploy_token(token_address(), 250, 250);
		f.set_safe(safe());
		let user = f.user.address();

		let request = f.request(NOW + 600);
		let signature = f.sign(&f.user, &request);
		let mut log = EventLog::new();
		let result = f.vault.sweep_relayed(
			&CallContext::new(relayer(), NOW),
			&mut f.ledgers,
			&request,
			&signature,
			&mut log,
		);

		assert!(matches!(
			result,
			Err(VaultError::FeeBurn(TokenError::InsufficientBalance { .. }))
		));
		assert!(log.is_empty());
		assert_eq!(f.vault.nonce_of(&user), U256::ZERO);
		assert_eq!(f.balance(fee_address(), user), U256::from(1_000u64));
		assert_eq!(f.balance(token_address(), user), U256::from(250u64));
	}

	#[test]
	fn test_bound_relay_restricts_caller() {
		let mut f = Fixture::new(0);
		f.deploy_token(token_address(), 250, 250);
		f.set_safe(safe());
		let relay = Address::repeat_byte(0x7e);

		let user_ctx = f.user_ctx();
		assert!(matches!(
			f.vault
				.set_relay(&user_ctx, Some(relay), &mut EventLog::new()),
			Err(VaultError::Ownership(OwnershipError::NotOwner { .. }))
		));
		f.vault
			.set_relay(
				&CallContext::new(admin(), NOW),
				Some(relay),
				&mut EventLog::new(),
			)
			.unwrap();

		let request = f.request(NOW + 600);
		let signature = f.sign(&f.user, &request);
		assert_eq!(
			f.relay(&request, &signature),
			Err(VaultError::UnauthorizedCaller { caller: relayer() })
		);

		let ctx = CallContext::new(relay, NOW);
		assert!(f
			.vault
			.sweep_relayed(
				&ctx,
				&mut f.ledgers,
				&request,
				&signature,
				&mut EventLog::new()
			)
			.is_ok());
	}

	#[test]
	fn test_snapshot_round_trip() {
		let mut f = Fixture::new(0);
		f.deploy_token(token_address(), 250, 250);
		f.set_safe(safe());
		let request = f.request(NOW + 600);
		let signature = f.sign(&f.user, &request);
		f.relay(&request, &signature).unwrap();

		let snapshot = f.vault.snapshot();
		let json = serde_json::to_string(&snapshot).unwrap();
		let restored: VaultSnapshot = serde_json::from_str(&json).unwrap();

		let mut fresh = PanicVault::new(
			vault_address(),
			CHAIN_ID,
			fee_address(),
			U256::ZERO,
			admin(),
		);
		fresh.restore(restored);
		assert_eq!(fresh.safe_address_of(&f.user.address()), Some(safe()));
		assert_eq!(fresh.nonce_of(&f.user.address()), U256::from(1u64));
		assert_eq!(fresh.owner(), admin());
		assert_eq!(fresh.relay(), None);

		// Admin settings travel with the registry.
		let next_owner = Address::repeat_byte(0x0d);
		let mut log = EventLog::new();
		f.vault
			.set_relay(&CallContext::new(admin(), NOW), Some(relayer()), &mut log)
			.unwrap();
		f.vault
			.transfer_ownership(&CallContext::new(admin(), NOW), next_owner, &mut log)
			.unwrap();
		fresh.restore(f.vault.snapshot());
		assert_eq!(fresh.relay(), Some(relayer()));
		assert_eq!(fresh.owner(), next_owner);
	}
}
