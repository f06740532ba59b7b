//! Relay submission endpoints.
//!
//! The node submits signed requests through the relay using its configured
//! account as the relayer, so that account must be on the allow-list.

use super::APIError;
use alloy_primitives::{Bytes, B256};
use axum::{extract::State, Json};
use panic_core::PanicEngine;
use panic_types::RelayPanicRequest;
use panic_vault::SweepReport;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelaySubmission {
	pub request: RelayPanicRequest,
	/// 65-byte `r || s || v` signature over the request digest.
	pub signature: Bytes,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DigestResponse {
	pub digest: B256,
	pub domain_separator: B256,
	pub struct_hash: B256,
}

/// Handles POST /api/relay requests.
pub async fn submit(
	State(engine): State<Arc<PanicEngine>>,
	Json(submission): Json<RelaySubmission>,
) -> Result<Json<SweepReport>, APIError> {
	let user = submission.request.user;
	let relayer = engine.account_address();

	match engine
		.execute_relay(relayer, submission.request, submission.signature)
		.await
	{
		Ok(report) => Ok(Json(report)),
		Err(e) => {
			tracing::warn!(user = %user, "Relay submission refused: {}", e);
			Err(APIError::from(e))
		},
	}
}

/// Handles POST /api/relay/digest requests.
pub async fn digest(
	State(engine): State<Arc<PanicEngine>>,
	Json(request): Json<RelayPanicRequest>,
) -> Json<DigestResponse> {
	Json(DigestResponse {
		digest: engine.relay_digest(&request),
		domain_separator: engine.domain_separator(),
		struct_hash: request.struct_hash(),
	})
}
