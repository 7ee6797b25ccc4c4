//! Decentralized Cardano oracle node-operator engine.
//!
//! A running node is the composition of: source adapters (`providers`) feeding
//! a `RateAggregator`, an Oracle State Reader (`chain::oracle_state`) reading
//! on-chain state through a `ChainContext`, the `decision` state machine, a
//! `TransactionOrchestrator` that submits and confirms the resulting
//! transactions, an `AlertSupervisor` watching thresholds, and a `RateStore`
//! persisting everything — all driven once per interval by `Scheduler`.

pub mod aggregator;
pub mod alerts;
pub mod chain;
pub mod config;
pub mod consensus;
pub mod datums;
pub mod decision;
pub mod error;
pub mod health;
pub mod metrics;
pub mod models;
pub mod orchestrator;
pub mod providers;
pub mod scheduler;
pub mod store;
pub mod validators;

pub use error::{OracleError, OracleResult};

use std::sync::Arc;
use std::time::Duration;

use crate::aggregator::RateAggregator;
use crate::alerts::{AlertSupervisor, BotTokenNotifier, Notifier, Thresholds, WebhookNotifier};
use crate::chain::oracle_state::OracleTags;
use crate::chain::ChainContext;
use crate::config::OracleConfig;
use crate::health::HealthTracker;
use crate::metrics::NodeMetrics;
use crate::models::{FeedId, PairType};
use crate::orchestrator::PollCadence;
use crate::providers;
use crate::scheduler::Scheduler;
use crate::store::RateStore;

/// Everything a running node needs, wired up from `OracleConfig` plus the
/// capabilities the caller constructs for the concrete backend (a live
/// `ChainContext`, a `RateStore`). Mirrors the teacher's `AppState`
/// composition, scoped to a headless writer node instead of an HTTP server.
pub struct NodeHandle {
    pub scheduler: Arc<Scheduler>,
    pub health: Arc<HealthTracker>,
    pub metrics: Arc<NodeMetrics>,
}

impl NodeHandle {
    /// Builds the node's capability graph from configuration. `chain` and
    /// `store` are supplied by the caller since they depend on a concrete
    /// backend (Ogmios+Kupo vs. Blockfrost, Postgres vs. in-memory) that this
    /// crate does not choose on its own.
    pub fn build(
        config: &OracleConfig,
        chain: Arc<dyn ChainContext>,
        store: Arc<dyn RateStore>,
    ) -> OracleResult<Self> {
        let health = HealthTracker::new();
        let metrics = Arc::new(NodeMetrics::new().map_err(|e| OracleError::Internal(e.to_string()))?);

        let thresholds = config
            .alerts
            .as_ref()
            .map(|a| Thresholds {
                c3_token_balance: *a.thresholds.get("c3_token_balance").unwrap_or(&50.0),
                ada_balance: *a.thresholds.get("ada_balance").unwrap_or(&50.0),
                minimum_data_sources: 3,
                timeout_variance: 105.0,
            })
            .unwrap_or_default();
        let cooldown_secs = config.alerts.as_ref().map(|a| a.cooldown).unwrap_or(1800);
        let notifiers = build_notifiers(config);
        let alert_supervisor = Arc::new(AlertSupervisor::new(thresholds, cooldown_secs, notifiers));

        let own_pkh = config
            .node
            .verification_key
            .clone()
            .unwrap_or_else(|| config.node.oracle_address.clone());

        let poll_cadence = if config.chain_query.use_slot_time {
            PollCadence::Local
        } else {
            PollCadence::Remote
        };

        let quote_sources = config
            .rate
            .quote_currency
            .as_ref()
            .map(|quote| providers::build_sources(quote, PairType::Quote))
            .unwrap_or_default();
        let base_sources = providers::build_sources(&config.rate.base_currency, PairType::Base);

        let scheduler = Arc::new(Scheduler {
            chain,
            store,
            alerts: alert_supervisor,
            health: health.clone(),
            metrics: metrics.clone(),
            aggregator: RateAggregator::new(FeedId::for_address(&config.node.oracle_address)),
            quote_sources,
            base_sources,
            precision_multiplier: config.updater.precision_multiplier,
            oracle_address: config.node.oracle_address.clone(),
            oracle_tags: OracleTags {
                policy_id: config.node.oracle_curr.clone(),
                ..Default::default()
            },
            own_pkh,
            feed_id: FeedId::for_address(&config.node.oracle_address),
            poll_cadence,
            update_interval: Duration::from_secs(config.updater.update_inter),
            reward_destination_address: config
                .reward_collection
                .as_ref()
                .map(|r| r.destination_address.clone()),
            reward_trigger_amount_lovelace: config
                .reward_collection
                .as_ref()
                .map(|r| (r.trigger_amount * 1_000_000.0) as i64),
        });

        Ok(Self {
            scheduler,
            health,
            metrics,
        })
    }

    /// Runs the node's scheduler loop until a shutdown signal arrives.
    pub async fn run(self: Arc<Self>) {
        self.scheduler.clone().run().await;
    }
}

fn build_notifiers(config: &OracleConfig) -> Vec<Box<dyn Notifier>> {
    let mut notifiers: Vec<Box<dyn Notifier>> = Vec::new();
    let Some(alerts) = &config.alerts else {
        return notifiers;
    };
    for entry in &alerts.notifications {
        match entry.kind.as_str() {
            "webhook" => {
                if let Some(url) = entry.config.get("url") {
                    notifiers.push(Box::new(WebhookNotifier::new(url.clone())));
                }
            }
            "bot_token" => {
                if let (Some(token), Some(chat_id)) =
                    (entry.config.get("bot_token"), entry.config.get("chat_id"))
                {
                    notifiers.push(Box::new(BotTokenNotifier::new(token.clone(), chat_id.clone())));
                }
            }
            other => {
                tracing::warn!(kind = other, "unknown notification transport, skipping");
            }
        }
    }
    notifiers
}
