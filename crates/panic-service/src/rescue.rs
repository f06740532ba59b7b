//! Local end-to-end gasless rescue.
//!
//! Drives the whole flow against the engine as a user's wallet and a relayer
//! would: approvals, safe address registration, an off-chain signature and a
//! relayed sweep paid in the fee token.

use alloy_primitives::{Address, U256};
use panic_core::{EngineError, PanicEngine};
use panic_types::{format_token_amount, RelayPanicRequest};
use panic_vault::{SweepReport, TokenSweepStatus};
use thiserror::Error;

/// Validity window of the signed authorization.
const DEADLINE_WINDOW_SECS: u64 = 600;

#[derive(Debug, Error)]
pub enum RescueError {
	#[error(transparent)]
	Engine(#[from] EngineError),
	#[error("No relayer configured; pass --relayer or add one under [relay]")]
	NoRelayer,
	#[error("No tokens configured to rescue")]
	NoTokens,
}

/// Who does what during a rescue.
#[derive(Debug, Clone)]
pub struct RescuePlan {
	pub safe_address: Address,
	pub relayer: Option<Address>,
	/// Top up the user's fee balance from the deployment owner when short.
	pub fund_fee: bool,
}

/// Runs the rescue for the engine's configured account.
pub async fn run(engine: &PanicEngine, plan: RescuePlan) -> Result<SweepReport, RescueError> {
	let config = engine.config();
	let user = engine.account_address();
	let vault = engine.vault_address();

	let relayer = plan
		.relayer
		.or_else(|| config.relay.relayers.first().copied())
		.ok_or(RescueError::NoRelayer)?;
	let tokens: Vec<Address> = config.tokens.iter().map(|t| t.address).collect();
	if tokens.is_empty() {
		return Err(RescueError::NoTokens);
	}

	tracing::info!(user = %user, safe = %plan.safe_address, relayer = %relayer, "Starting rescue");

	for token in &tokens {
		engine.approve(user, *token, vault, U256::MAX).await?;
	}
	engine.set_safe_address(user, plan.safe_address).await?;

	let relay_cost = engine.relay_cost().await;
	let fee_balance = engine.fee_balance(&user).await?;
	if plan.fund_fee && fee_balance < relay_cost {
		let owner = config.deployment.owner;
		tracing::info!(owner = %owner, amount = %(relay_cost - fee_balance), "Funding relay fee");
		engine
			.transfer(owner, engine.fee_token_address(), user, relay_cost - fee_balance)
			.await?;
	}

	let request = RelayPanicRequest {
		user,
		spenders: vec![vault; tokens.len()],
		tokens,
		safe_address: plan.safe_address,
		deadline: U256::from(engine.now() + DEADLINE_WINDOW_SECS),
		nonce: engine.nonce_of(&user).await,
	};
	let signature = engine.sign_relay_request(&request).await?;
	tracing::debug!(digest = %engine.relay_digest(&request), "Signed rescue request");

	Ok(engine.execute_relay(relayer, request, signature).await?)
}

/// Prints the outcome and the safe address balances.
pub async fn print_summary(engine: &PanicEngine, report: &SweepReport) -> Result<(), EngineError> {
	println!("Rescued {} -> {}", report.user, report.safe_address);
	if let Some(nonce) = report.nonce {
		println!("  nonce consumed: {}", nonce);
	}
	println!(
		"  fee burned:     {}",
		format_token_amount(&report.fee_burned.to_string(), 18)
	);

	let status = engine.user_status(&report.safe_address).await;
	for sweep in &report.tokens {
		let position = status.tokens.iter().find(|p| p.token == sweep.token);
		let symbol = position.map_or("?", |p| p.symbol.as_str());
		match &sweep.status {
			TokenSweepStatus::Swept { amount } => {
				let decimals = position.map_or(18, |p| p.decimals);
				println!(
					"  {:<8} swept {} (safe balance {})",
					symbol,
					format_token_amount(&amount.to_string(), decimals),
					format_token_amount(
						&position.map(|p| p.balance).unwrap_or_default().to_string(),
						decimals
					)
				);
			},
			TokenSweepStatus::Skipped => println!("  {:<8} nothing to sweep", symbol),
			TokenSweepStatus::Failed { reason } => println!("  {:<8} failed: {}", symbol, reason),
		}
	}
	Ok(())
}
