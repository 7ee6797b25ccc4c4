// =====================================================================================
// RWA Tokenization Platform - Oracle Node
//
// Author: arkSong (arksong2018@gmail.com)
// =====================================================================================

use std::sync::Arc;

use oracle_node_engine::chain::NullChainContext;
use oracle_node_engine::config::OracleConfig;
use oracle_node_engine::error::OracleResult;
use oracle_node_engine::store::{InMemoryRateStore, PostgresRateStore, RateStore};
use oracle_node_engine::validators::run_startup_checks;
use oracle_node_engine::NodeHandle;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> std::io::Result<()> {
    init_tracing();

    info!("starting oracle node v{}", env!("CARGO_PKG_VERSION"));

    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            error!("failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };
    info!("configuration loaded");

    if let Err(e) = run_startup_checks(&config).await {
        error!("startup validation failed: {}", e);
        std::process::exit(1);
    }
    info!("startup validation passed");

    let store = match init_store(&config).await {
        Ok(store) => store,
        Err(e) => {
            error!("failed to initialize persistence: {}", e);
            std::process::exit(1);
        }
    };

    // The chain backend (Ogmios+Kupo or Blockfrost) is supplied by a
    // deployment-specific `ChainContext` implementation; this binary wires
    // the no-op fallback so the node composition is runnable end-to-end in
    // environments without a live Cardano backend configured.
    let chain = Arc::new(NullChainContext);

    let node = match NodeHandle::build(&config, chain, store) {
        Ok(node) => Arc::new(node),
        Err(e) => {
            error!("failed to build node: {}", e);
            std::process::exit(1);
        }
    };

    info!("node composed, entering scheduler loop");
    node.run().await;

    info!("shutdown complete");
    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "oracle_node_engine=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn load_config() -> OracleResult<OracleConfig> {
    let config_path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
    info!(path = %config_path, "loading configuration from file");
    OracleConfig::from_file(&config_path)
}

async fn init_store(config: &OracleConfig) -> OracleResult<Arc<dyn RateStore>> {
    match &config.database {
        Some(db) => {
            let store = PostgresRateStore::connect(&db.url, db.max_connections).await?;
            info!("persistence backed by postgres");
            Ok(Arc::new(store))
        }
        None => {
            info!("no database configured, persisting in-memory only");
            Ok(Arc::new(InMemoryRateStore::new()))
        }
    }
}
