//! Main entry point for the gift order service.
//!
//! This binary wires the storage backend, the fulfillment client, and
//! the order lifecycle engine together, then serves the HTTP API until
//! interrupted.

use clap::Parser;
use gift_config::Config;
use gift_core::{LiveUpdateBroadcaster, OrderEngine};
use gift_fulfillment::FulfillmentClient;
use gift_storage::implementations::{file::FileOrderStore, memory::MemoryOrderStore};
use gift_storage::{OrderStore, OrderStoreBackend};
use std::path::PathBuf;
use std::sync::Arc;

mod server;

/// Buffered events per watched order before slow subscribers lag.
const BROADCAST_CAPACITY: usize = 64;

/// Command-line arguments for the gift order service.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config.toml")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	// Initialize tracing with env filter
	use tracing_subscriber::{fmt, EnvFilter};

	let default_directive = args.log_level.to_string();
	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

	fmt()
		.with_env_filter(env_filter)
		.with_thread_ids(true)
		.with_target(true)
		.init();

	tracing::info!("Started gift order service");

	let config = Config::from_file(&args.config)?;
	tracing::info!(
		backend = %config.storage.backend,
		"Loaded configuration"
	);

	let backend: Box<dyn OrderStoreBackend> = match config.storage.backend.as_str() {
		"file" => Box::new(FileOrderStore::new(&config.storage.path)?),
		_ => Box::new(MemoryOrderStore::new()),
	};
	let store = Arc::new(OrderStore::new(backend));

	let fulfillment = Arc::new(FulfillmentClient::new(&config.fulfillment)?);
	let broadcaster = LiveUpdateBroadcaster::new(BROADCAST_CAPACITY);
	let engine = Arc::new(OrderEngine::new(
		store,
		fulfillment,
		broadcaster,
		&config.live,
	));

	server::start_server(&config.api, engine).await?;

	tracing::info!("Stopped gift order service");
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn args_default_values() {
		let args = Args {
			config: PathBuf::from("config.toml"),
			log_level: "info".to_string(),
		};

		assert_eq!(args.config, PathBuf::from("config.toml"));
		assert_eq!(args.log_level, "info");
	}
}
