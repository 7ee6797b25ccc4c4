//! Startup and operational validators (§4.I), grounded on
//! `original_source/backend/validators/{config_validator,health_validator,
//! node_operation_validator}.py`. Two phases: everything here runs before
//! the scheduler's first tick — `run_config_validation` purely inspects
//! `OracleConfig` (already covered by `OracleConfig::validate`), while
//! `run_health_checks` and `run_operation_checks` need a live network/chain
//! context and so run after the engine's capabilities are constructed.

use std::time::Duration;

use tracing::{error, info};

use crate::chain::oracle_state::find_node_by_operator;
use crate::config::OracleConfig;
use crate::error::{OracleError, OracleResult};
use crate::models::NodeDatum;

const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(10);

/// Probes the configured chain-context backend's health endpoint(s),
/// grounded on `HealthCheckValidator`. Only the backend actually configured
/// is probed — ogmios+kupo, or blockfrost.
pub struct HealthCheckValidator {
    client: reqwest::Client,
}

impl Default for HealthCheckValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthCheckValidator {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(HEALTH_CHECK_TIMEOUT)
                .build()
                .unwrap_or_default(),
        }
    }

    async fn probe(&self, base_url: &str) -> bool {
        let url = format!("{}/health", base_url.trim_end_matches('/'));
        match self.client.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(err) => {
                error!(url, error = %err, "health probe failed");
                false
            }
        }
    }

    /// Runs the network-appropriate health checks: mainnet accepts an
    /// internal ogmios+kupo pair or a configured blockfrost endpoint;
    /// testnet requires the `external` chain-query section to be populated,
    /// per `check_ogmios_or_blockfrost_health`.
    pub async fn run_health_checks(&self, config: &OracleConfig) -> bool {
        let is_testnet = config.chain_query.network.eq_ignore_ascii_case("testnet");

        let (ogmios, blockfrost) = if is_testnet {
            match &config.chain_query.external {
                Some(external) => (external.ogmios.as_ref(), external.blockfrost.as_ref()),
                None => {
                    error!("testnet chain query requires an `external` section");
                    return false;
                }
            }
        } else {
            (
                config.chain_query.ogmios.as_ref(),
                config.chain_query.blockfrost.as_ref(),
            )
        };

        if let Some(ogmios) = ogmios {
            if !self.probe(&ogmios.kupo_url).await {
                return false;
            }
        }
        if let Some(blockfrost) = blockfrost {
            if !self.probe(&blockfrost.base_url).await {
                return false;
            }
        }

        ogmios.is_some() || blockfrost.is_some()
    }
}

/// Post-chain-context-live check: confirms this node's public-key-hash is
/// actually listed in the oracle's authorized node set, per
/// `NodeOperationValidator::check_node_listing`.
pub fn check_node_listing(nodes: &[NodeDatum], own_pkh: &str) -> OracleResult<()> {
    match find_node_by_operator(nodes, own_pkh) {
        Some(_) => {
            info!(pkh = own_pkh, "node operator is listed with the oracle");
            Ok(())
        }
        None => {
            error!(
                pkh = own_pkh,
                "node operator is not listed with the oracle; register this pub_key_hash before running"
            );
            Err(OracleError::Configuration {
                message: format!("node pub_key_hash {own_pkh} is not an authorized oracle operator"),
            })
        }
    }
}

/// Orchestrates both phases, mirroring `NodeChecker.run_initial_checks` /
/// `run_node_operation_checks`: configuration validation (already enforced
/// by `OracleConfig::from_file`), then a live health probe.
pub async fn run_startup_checks(config: &OracleConfig) -> OracleResult<()> {
    config.validate()?;

    let health_validator = HealthCheckValidator::new();
    if !health_validator.run_health_checks(config).await {
        return Err(OracleError::Configuration {
            message: "chain query backend failed its health check".into(),
        });
    }

    info!("initial validations passed");
    Ok(())
}
