//! Scheduler / Runner (§4.G): `forever { tick(); sleep(interval); }`, with a
//! cancellable sleep so shutdown is immediate rather than waiting out the
//! current interval. Grounded on the teacher's `main.rs` `shutdown_signal`
//! helper, here actually wired up since the Scheduler itself is the
//! top-level run loop — there is no HTTP server standing in front of it.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};

use crate::aggregator::RateAggregator;
use crate::alerts::{Alert, AlertKind, AlertSupervisor};
use crate::chain::oracle_state::{read_oracle_state, OracleTags};
use crate::chain::ChainContext;
use crate::decision::{decide, DecisionInputs};
use crate::error::OracleError;
use crate::health::HealthTracker;
use crate::metrics::NodeMetrics;
use crate::models::{Decision, FeedId};
use crate::orchestrator::{PollCadence, TransactionOrchestrator};
use crate::providers::RateSource;
use crate::store::{OperationalErrorRecord, RateStore};

/// Everything the scheduler needs to run a single node's tick loop.
pub struct Scheduler {
    pub chain: Arc<dyn ChainContext>,
    pub store: Arc<dyn RateStore>,
    pub alerts: Arc<AlertSupervisor>,
    pub health: Arc<HealthTracker>,
    pub metrics: Arc<NodeMetrics>,
    pub aggregator: RateAggregator,
    pub quote_sources: Vec<Arc<dyn RateSource>>,
    pub base_sources: Vec<Arc<dyn RateSource>>,
    /// Scales the aggregator's `Decimal` rate into the decision engine's
    /// scaled `i64`, matching `UpdaterConfig::precision_multiplier`.
    pub precision_multiplier: i64,
    pub oracle_address: String,
    pub oracle_tags: OracleTags,
    pub own_pkh: String,
    pub feed_id: FeedId,
    pub poll_cadence: PollCadence,
    pub update_interval: Duration,
    pub reward_destination_address: Option<String>,
    pub reward_trigger_amount_lovelace: Option<i64>,
}

fn decision_label(decision: &Decision) -> &'static str {
    match decision {
        Decision::Idle => "idle",
        Decision::UpdateOnly { .. } => "update_only",
        Decision::Aggregate { .. } => "aggregate",
        Decision::UpdateAndAggregate { .. } => "update_and_aggregate",
        Decision::CollectRewards => "collect_rewards",
    }
}

impl Scheduler {
    /// Runs until `shutdown()` resolves. Ticks are strictly serial: the next
    /// tick never starts before the previous one (including its
    /// confirmation wait) has finished.
    pub async fn run(self: Arc<Self>) {
        info!("scheduler starting");
        loop {
            tokio::select! {
                _ = self.tick() => {}
                _ = shutdown_signal() => {
                    info!("shutdown signal received, exiting after current tick");
                    break;
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.update_interval) => {}
                _ = shutdown_signal() => {
                    info!("shutdown signal received during sleep, exiting");
                    break;
                }
            }
        }
        info!("scheduler stopped");
    }

    /// One full cycle: read oracle state (§4.C), decide (§4.E), act (§4.F).
    /// Any error is logged and recorded, never propagated — the scheduler
    /// itself is infallible, per the error-handling design.
    async fn tick(&self) {
        self.metrics.ticks_total.inc();
        let timer = self.metrics.tick_duration.start_timer();

        match self.tick_inner().await {
            Ok(now_ms) => {
                self.health.record_success(now_ms);
            }
            Err(err) => {
                self.health.record_failure();
                error!(error = %err, category = err.category(), "tick failed");
                let _ = self
                    .store
                    .record_operational_error(OperationalErrorRecord {
                        feed_id: self.feed_id,
                        category: err.category().to_string(),
                        message: err.to_string(),
                        occurred_at: chrono::Utc::now(),
                    })
                    .await;
            }
        }

        timer.observe_duration();
    }

    /// Fires an alert and records it in metrics, so every fire path (not
    /// just `check_timeouts`) is accounted for.
    async fn fire_alert(&self, alert: Alert, now_secs: i64) {
        self.metrics.record_alert_fired(alert.kind.label());
        self.alerts.fire(alert, now_secs).await;
    }

    /// Converts the aggregator's `Decimal` rate into the decision engine's
    /// scaled `i64`, per `UpdaterConfig::precision_multiplier`.
    fn scale_rate(&self, value: Decimal) -> Result<i64, OracleError> {
        let scaled = (value * Decimal::from(self.precision_multiplier)).round();
        i64::try_from(scaled).map_err(|_| OracleError::Aggregation {
            reason: format!("aggregated rate {scaled} does not fit in a scaled i64"),
        })
    }

    async fn tick_inner(&self) -> Result<i64, OracleError> {
        let now_ms = self.chain.current_posix_chain_time_ms().await?;

        let state = read_oracle_state(self.chain.as_ref(), &self.oracle_address, &self.oracle_tags).await?;

        let settings = match state.settings {
            Some(settings) => settings,
            None => {
                self.fire_alert(
                    Alert {
                        kind: AlertKind::AggregationBlocked,
                        message: "AggState datum unavailable, tick blocked".into(),
                    },
                    now_ms / 1000,
                )
                .await;
                return Err(OracleError::ChainRead {
                    reason: "AggState datum unavailable".into(),
                });
            }
        };
        let feed = match state.feed {
            Some(feed) => feed,
            None => {
                self.fire_alert(
                    Alert {
                        kind: AlertKind::AggregationBlocked,
                        message: "OracleFeed datum unavailable, tick blocked".into(),
                    },
                    now_ms / 1000,
                )
                .await;
                return Err(OracleError::ChainRead {
                    reason: "OracleFeed datum unavailable".into(),
                });
            }
        };

        let own_node = crate::chain::oracle_state::find_node_by_operator(&state.nodes, &self.own_pkh)
            .cloned()
            .unwrap_or(crate::models::NodeDatum {
                operator_pkh: self.own_pkh.clone(),
                feed: None,
            });

        let peer_nodes: Vec<_> = state
            .nodes
            .iter()
            .filter(|n| n.operator_pkh != self.own_pkh)
            .cloned()
            .collect();

        let aggregated = self
            .aggregator
            .get_aggregated_rate(&self.quote_sources, &self.base_sources)
            .await?;
        for quote in &aggregated.contributing_quotes {
            self.metrics.record_adapter_result(&quote.source_name, None);
        }
        for (source, err) in &aggregated.failures {
            self.metrics
                .record_adapter_result(source, Some(&err.to_string()));
        }
        let new_rate_scaled = self.scale_rate(aggregated.value)?;

        let reward_unclaimed = state
            .reward_state
            .as_ref()
            .map(|reward_state| reward_state.unclaimed_for(&self.own_pkh));

        let decisions = decide(&DecisionInputs {
            settings: &settings,
            feed: &feed,
            peer_nodes: &peer_nodes,
            own_node: &own_node,
            new_rate_scaled,
            now_ms,
            own_pkh: &self.own_pkh,
            reward_unclaimed,
            reward_trigger_amount: self.reward_trigger_amount_lovelace,
        });

        let orchestrator = TransactionOrchestrator::new(
            self.chain.as_ref(),
            self.poll_cadence,
            self.own_pkh.clone(),
            self.oracle_address.clone(),
        );

        for decision in &decisions {
            if decision.is_idle() {
                continue;
            }
            self.metrics.record_decision(decision_label(decision));

            let participating_peers = match decision {
                crate::models::Decision::Aggregate { participating_peers }
                | crate::models::Decision::UpdateAndAggregate { participating_peers, .. } => {
                    participating_peers.clone()
                }
                _ => Vec::new(),
            };

            match decision {
                crate::models::Decision::CollectRewards => {
                    if let Some(destination) = &self.reward_destination_address {
                        if let Some(amount) = self.reward_trigger_amount_lovelace {
                            let tx_hash = orchestrator.collect_rewards(destination, amount).await?;
                            self.store
                                .record_reward_distribution(self.feed_id, &self.own_pkh, amount)
                                .await?;
                            self.metrics.record_transaction_submitted("reward_collection");
                            self.fire_alert(
                                self.alerts.notify_reward_collection(&self.own_pkh, amount),
                                now_ms / 1000,
                            )
                            .await;
                            self.store.record_transaction(self.feed_id, &tx_hash, "reward_collection").await?;
                        }
                    }
                }
                _ => {
                    let tx_hashes = orchestrator.execute(decision, &participating_peers).await?;
                    for tx_hash in tx_hashes {
                        self.metrics.record_transaction_submitted(decision_label(decision));
                        self.store.record_transaction(self.feed_id, &tx_hash, "node_operation").await?;
                    }
                }
            }
        }

        self.check_timeouts(&settings, &feed, &own_node, now_ms).await;

        Ok(now_ms)
    }

    async fn check_timeouts(
        &self,
        settings: &crate::models::OracleSettings,
        feed: &crate::models::OracleFeed,
        own_node: &crate::models::NodeDatum,
        now_ms: i64,
    ) {
        if let Some(alert) =
            self.alerts
                .check_aggregation_timeout(feed.timestamp_ms, settings.aggregate_time_ms, now_ms)
        {
            self.fire_alert(alert, now_ms / 1000).await;
        }

        if let Some(feed) = own_node.feed {
            if let Some(alert) = self.alerts.check_node_update_timeout(
                feed.timestamp_ms,
                settings.updated_node_time_ms,
                now_ms,
            ) {
                self.fire_alert(alert, now_ms / 1000).await;
            }
        } else {
            self.fire_alert(
                Alert {
                    kind: AlertKind::NodeUpdateTimeout,
                    message: "own node has never posted a feed".into(),
                },
                now_ms / 1000,
            )
            .await;
        }
    }
}

/// Resolves when either Ctrl-C or SIGTERM is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl-C handler");
    };

    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
