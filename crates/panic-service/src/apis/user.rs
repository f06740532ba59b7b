//! Read endpoints backing the dashboard.

use super::{parse_address, APIError};
use alloy_primitives::{Address, B256, U256};
use axum::{
	extract::{Path, State},
	Json,
};
use panic_core::{EngineError, PanicEngine, TokenPosition, UserStatus};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
	pub status: &'static str,
	pub node: String,
	/// Current block timestamp as seen by the engine.
	pub timestamp: u64,
}

/// Everything a wallet needs to build and sign a `RelayPanic` request.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainResponse {
	pub name: String,
	pub version: String,
	pub chain_id: u64,
	pub verifying_contract: Address,
	pub domain_separator: B256,
	pub relay: Address,
	pub fee_token: Address,
	pub relay_cost: U256,
}

#[derive(Debug, Serialize)]
pub struct RelayerResponse {
	pub address: Address,
	pub trusted: bool,
}

/// Handles GET /api/health requests.
pub async fn health(State(engine): State<Arc<PanicEngine>>) -> Json<HealthResponse> {
	Json(HealthResponse {
		status: "ok",
		node: engine.config().node.id.clone(),
		timestamp: engine.now(),
	})
}

/// Handles GET /api/domain requests.
pub async fn domain(State(engine): State<Arc<PanicEngine>>) -> Json<DomainResponse> {
	let domain = engine.signing_domain();
	Json(DomainResponse {
		domain_separator: domain.separator(),
		name: domain.name,
		version: domain.version,
		chain_id: domain.chain_id,
		verifying_contract: domain.verifying_contract,
		relay: engine.relay_address(),
		fee_token: engine.fee_token_address(),
		relay_cost: engine.relay_cost().await,
	})
}

/// Handles GET /api/users/{user} requests.
pub async fn user_status(
	Path(user): Path<String>,
	State(engine): State<Arc<PanicEngine>>,
) -> Result<Json<UserStatus>, APIError> {
	let user = parse_address(&user)?;
	Ok(Json(engine.user_status(&user).await))
}

/// Handles GET /api/users/{user}/tokens/{token} requests.
pub async fn token_position(
	Path((user, token)): Path<(String, String)>,
	State(engine): State<Arc<PanicEngine>>,
) -> Result<Json<TokenPosition>, APIError> {
	let user = parse_address(&user)?;
	let token = parse_address(&token)?;

	engine
		.user_status(&user)
		.await
		.tokens
		.into_iter()
		.find(|position| position.token == token)
		.map(Json)
		.ok_or_else(|| EngineError::UnknownToken(token).into())
}

/// Handles GET /api/relayers/{address} requests.
pub async fn relayer(
	Path(address): Path<String>,
	State(engine): State<Arc<PanicEngine>>,
) -> Result<Json<RelayerResponse>, APIError> {
	let address = parse_address(&address)?;
	Ok(Json(RelayerResponse {
		address,
		trusted: engine.is_relayer(&address).await,
	}))
}
