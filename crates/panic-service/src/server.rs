//! HTTP server for the panic-vault API.

use crate::apis;
use axum::{
	routing::{get, post},
	Router,
};
use panic_config::ApiConfig;
use panic_core::PanicEngine;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Builds the router with every endpoint nested under `/api`.
pub fn router(engine: Arc<PanicEngine>) -> Router {
	Router::new()
		.nest(
			"/api",
			Router::new()
				.route("/health", get(apis::user::health))
				.route("/domain", get(apis::user::domain))
				.route("/users/{user}", get(apis::user::user_status))
				.route("/users/{user}/tokens/{token}", get(apis::user::token_position))
				.route("/relayers/{address}", get(apis::user::relayer))
				.route("/relay", post(apis::relay::submit))
				.route("/relay/digest", post(apis::relay::digest)),
		)
		.layer(
			ServiceBuilder::new()
				.layer(TraceLayer::new_for_http())
				.layer(CorsLayer::permissive()),
		)
		.with_state(engine)
}

/// Starts the HTTP server and serves until the process is interrupted.
pub async fn start_server(
	api_config: ApiConfig,
	engine: Arc<PanicEngine>,
) -> Result<(), Box<dyn std::error::Error>> {
	if !engine.is_relayer(&engine.account_address()).await {
		tracing::warn!(
			account = %engine.account_address(),
			"Configured account is not a trusted relayer; /api/relay submissions will be refused"
		);
	}

	let app = router(engine);

	let bind_address = format!("{}:{}", api_config.host, api_config.port);
	let listener = TcpListener::bind(&bind_address).await?;

	tracing::info!("Panic API server starting on {}", bind_address);

	axum::serve(listener, app)
		.with_graceful_shutdown(async {
			let _ = tokio::signal::ctrl_c().await;
		})
		.await?;

	Ok(())
}
