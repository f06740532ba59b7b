//! Main entry point for the panic-vault node.
//!
//! Deploys the fee token, vault and relay from configuration and either
//! serves the HTTP API or runs a local gasless rescue for the configured
//! account.

use alloy_primitives::Address;
use clap::{Parser, Subcommand};
use panic_config::Config;
use panic_core::PanicEngine;
use panic_types::PanicEvent;
use std::path::PathBuf;
use std::sync::Arc;

mod apis;
mod factory_registry;
mod rescue;
mod server;

/// Command-line arguments for the panic node.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config.toml")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,

	#[command(subcommand)]
	command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Serve the HTTP API (the default)
	Serve,
	/// Sweep the configured account's tokens to a safe address through the relay
	Rescue {
		/// Destination for the rescued funds
		#[arg(long)]
		safe: Address,
		/// Relayer submitting the request; defaults to the first configured one
		#[arg(long)]
		relayer: Option<Address>,
		/// Do not top up the fee balance from the deployment owner
		#[arg(long)]
		no_fund: bool,
	},
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	use tracing_subscriber::{fmt, EnvFilter};

	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

	fmt()
		.with_env_filter(env_filter)
		.with_thread_ids(true)
		.with_target(true)
		.init();

	let config_path = args
		.config
		.to_str()
		.ok_or("Configuration path is not valid UTF-8")?;
	let config = Config::from_file(config_path).await?;
	tracing::info!("Loaded configuration [{}]", config.node.id);

	let engine = Arc::new(factory_registry::build_engine(config).await?);

	match args.command.unwrap_or(Command::Serve) {
		Command::Serve => serve(engine).await?,
		Command::Rescue {
			safe,
			relayer,
			no_fund,
		} => {
			let plan = rescue::RescuePlan {
				safe_address: safe,
				relayer,
				fund_fee: !no_fund,
			};
			let report = rescue::run(&engine, plan).await?;
			rescue::print_summary(&engine, &report).await?;
		},
	}

	tracing::info!("Stopped panic node");
	Ok(())
}

/// Logs every published event until the process is interrupted, serving the
/// API alongside when it is enabled.
async fn serve(engine: Arc<PanicEngine>) -> Result<(), Box<dyn std::error::Error>> {
	let events = tokio::spawn(log_events(engine.subscribe()));

	let api_config = engine.config().api.clone().filter(|api| api.enabled);
	match api_config {
		Some(api_config) => server::start_server(api_config, Arc::clone(&engine)).await?,
		None => {
			tracing::info!("API disabled; waiting for interrupt");
			tokio::signal::ctrl_c().await?;
		},
	}

	events.abort();
	Ok(())
}

async fn log_events(mut events: tokio::sync::broadcast::Receiver<PanicEvent>) {
	use tokio::sync::broadcast::error::RecvError;

	loop {
		match events.recv().await {
			Ok(event) => tracing::debug!(?event, "Event"),
			Err(RecvError::Lagged(skipped)) => {
				tracing::warn!(skipped, "Event logger lagged behind");
			},
			Err(RecvError::Closed) => break,
		}
	}
}
