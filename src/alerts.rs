//! Alert Supervisor (§4.H): threshold checks with a per-category cooldown,
//! dispatched over a pluggable `Notifier` capability, grounded on
//! `original_source/backend/utils/alerts.py::AlertManager`. The original's
//! multi-transport fan-out via `apprise` has no equivalent crate in the
//! pack; `Notifier` generalises it into webhook and bot-token/chat-id
//! `reqwest`-based implementations, per the design note in §6.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::error::OracleResult;

/// Threshold knobs, with the original's numeric defaults.
#[derive(Debug, Clone, Copy)]
pub struct Thresholds {
    pub c3_token_balance: f64,
    pub ada_balance: f64,
    pub minimum_data_sources: u32,
    /// Percentage of the base aggregation interval tolerated before a
    /// timeout alert fires, e.g. `105.0` = 5% grace period.
    pub timeout_variance: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            c3_token_balance: 50.0,
            ada_balance: 50.0,
            minimum_data_sources: 3,
            timeout_variance: 105.0,
        }
    }
}

/// Which situation triggered the alert — doubles as the cooldown map key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AlertKind {
    C3TokenBalance,
    AdaBalance,
    AggregationTimeout,
    NodeUpdateTimeout,
    MinimumDataSources { pair_type: String },
    RewardCollection,
    AuthorizationLost,
    AggregationBlocked,
}

#[derive(Debug, Clone)]
pub struct Alert {
    pub kind: AlertKind,
    pub message: String,
}

/// Dispatch capability for one notification transport. A single failing
/// transport never blocks the others — see `AlertSupervisor::fire`.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, alert: &Alert) -> OracleResult<()>;
}

/// Webhook-style transport (Slack/Discord incoming webhooks).
pub struct WebhookNotifier {
    pub webhook_url: String,
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(webhook_url: String) -> Self {
        Self {
            webhook_url,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, alert: &Alert) -> OracleResult<()> {
        self.client
            .post(&self.webhook_url)
            .json(&serde_json::json!({ "text": format_alert_message(alert) }))
            .send()
            .await?;
        Ok(())
    }
}

/// Bot-token transport (Telegram-style: `bot_token` + `chat_id`).
pub struct BotTokenNotifier {
    pub bot_token: String,
    pub chat_id: String,
    client: reqwest::Client,
}

impl BotTokenNotifier {
    pub fn new(bot_token: String, chat_id: String) -> Self {
        Self {
            bot_token,
            chat_id,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Notifier for BotTokenNotifier {
    async fn notify(&self, alert: &Alert) -> OracleResult<()> {
        let url = format!("https://api.telegram.org/bot{}/sendMessage", self.bot_token);
        self.client
            .post(&url)
            .json(&serde_json::json!({
                "chat_id": self.chat_id,
                "text": format_alert_message(alert),
            }))
            .send()
            .await?;
        Ok(())
    }
}

impl AlertKind {
    /// Stable label for metrics, independent of `MinimumDataSources`'s
    /// per-pair-type payload.
    pub fn label(&self) -> &'static str {
        match self {
            AlertKind::C3TokenBalance => "c3_token_balance",
            AlertKind::AdaBalance => "ada_balance",
            AlertKind::AggregationTimeout => "aggregation_timeout",
            AlertKind::NodeUpdateTimeout => "node_update_timeout",
            AlertKind::MinimumDataSources { .. } => "minimum_data_sources",
            AlertKind::RewardCollection => "reward_collection",
            AlertKind::AuthorizationLost => "authorization_lost",
            AlertKind::AggregationBlocked => "aggregation_blocked",
        }
    }
}

fn alert_emoji(kind: &AlertKind) -> &'static str {
    match kind {
        AlertKind::C3TokenBalance | AlertKind::AdaBalance => "\u{1F4B0}",
        AlertKind::AggregationTimeout | AlertKind::NodeUpdateTimeout => "\u{23F0}",
        AlertKind::MinimumDataSources { .. } => "\u{26A0}\u{FE0F}",
        AlertKind::RewardCollection => "\u{1F381}",
        AlertKind::AuthorizationLost => "\u{1F6AB}",
        AlertKind::AggregationBlocked => "\u{1F6D1}",
    }
}

fn format_alert_message(alert: &Alert) -> String {
    format!("{} {}", alert_emoji(&alert.kind), alert.message)
}

/// Cooldown-gated fan-out across every configured `Notifier`. Per
/// `send_alert`: a category within `cooldown` seconds of its last fire is
/// suppressed entirely, never partially dispatched.
pub struct AlertSupervisor {
    thresholds: Thresholds,
    cooldown_secs: i64,
    notifiers: Vec<Box<dyn Notifier>>,
    last_fire_times: Mutex<HashMap<AlertKind, i64>>,
}

impl AlertSupervisor {
    pub fn new(thresholds: Thresholds, cooldown_secs: i64, notifiers: Vec<Box<dyn Notifier>>) -> Self {
        Self {
            thresholds,
            cooldown_secs,
            notifiers,
            last_fire_times: Mutex::new(HashMap::new()),
        }
    }

    pub fn thresholds(&self) -> Thresholds {
        self.thresholds
    }

    /// Fires `alert` unless its kind is still within cooldown, per-transport
    /// failure isolated so one broken webhook never suppresses the others.
    pub async fn fire(&self, alert: Alert, now_secs: i64) {
        {
            let mut last_fire_times = self.last_fire_times.lock().unwrap();
            if let Some(&last) = last_fire_times.get(&alert.kind) {
                if now_secs - last < self.cooldown_secs {
                    return;
                }
            }
            last_fire_times.insert(alert.kind.clone(), now_secs);
        }

        info!(message = %alert.message, "alert fired");
        for notifier in &self.notifiers {
            if let Err(err) = notifier.notify(&alert).await {
                warn!(error = %err, "notifier transport failed, continuing with the others");
            }
        }
    }

    pub fn check_minimum_data_sources(&self, source_count: u32, pair_type: &str) -> Option<Alert> {
        if source_count < self.thresholds.minimum_data_sources {
            Some(Alert {
                kind: AlertKind::MinimumDataSources {
                    pair_type: pair_type.to_string(),
                },
                message: format!(
                    "only {source_count} data sources available for {pair_type}, below minimum {}",
                    self.thresholds.minimum_data_sources
                ),
            })
        } else {
            None
        }
    }

    pub fn check_c3_token_balance(&self, balance: f64) -> Option<Alert> {
        if balance < self.thresholds.c3_token_balance {
            Some(Alert {
                kind: AlertKind::C3TokenBalance,
                message: format!(
                    "C3 token balance {balance} below threshold {}",
                    self.thresholds.c3_token_balance
                ),
            })
        } else {
            None
        }
    }

    pub fn check_ada_balance(&self, balance_ada: f64) -> Option<Alert> {
        if balance_ada < self.thresholds.ada_balance {
            Some(Alert {
                kind: AlertKind::AdaBalance,
                message: format!(
                    "ADA balance {balance_ada} below threshold {}",
                    self.thresholds.ada_balance
                ),
            })
        } else {
            None
        }
    }

    /// Extended-timeout check for aggregation: the allowed window is
    /// `aggregation_interval_ms * timeout_variance / 100`, matching
    /// `_calculate_timeout`.
    pub fn check_aggregation_timeout(
        &self,
        feed_timestamp_ms: i64,
        aggregation_interval_ms: i64,
        now_ms: i64,
    ) -> Option<Alert> {
        let allowed = (aggregation_interval_ms as f64 * self.thresholds.timeout_variance / 100.0) as i64;
        let next_agg_time_ms = feed_timestamp_ms + aggregation_interval_ms;
        if now_ms - next_agg_time_ms > allowed {
            Some(Alert {
                kind: AlertKind::AggregationTimeout,
                message: format!(
                    "aggregation overdue by {}ms beyond the allowed {}ms window",
                    now_ms - next_agg_time_ms,
                    allowed
                ),
            })
        } else {
            None
        }
    }

    pub fn check_node_update_timeout(
        &self,
        own_feed_timestamp_ms: i64,
        updated_node_time_ms: i64,
        now_ms: i64,
    ) -> Option<Alert> {
        let allowed = (updated_node_time_ms as f64 * self.thresholds.timeout_variance / 100.0) as i64;
        if now_ms - own_feed_timestamp_ms > allowed {
            Some(Alert {
                kind: AlertKind::NodeUpdateTimeout,
                message: format!(
                    "own node feed stale by {}ms beyond the allowed {}ms window",
                    now_ms - own_feed_timestamp_ms,
                    allowed
                ),
            })
        } else {
            None
        }
    }

    pub fn notify_reward_collection(&self, operator_pkh: &str, amount: i64) -> Alert {
        Alert {
            kind: AlertKind::RewardCollection,
            message: format!("collected {amount} reward for {operator_pkh}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingNotifier {
        count: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Notifier for CountingNotifier {
        async fn notify(&self, _alert: &Alert) -> OracleResult<()> {
            self.count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn cooldown_suppresses_repeated_fires() {
        let count = Arc::new(AtomicUsize::new(0));
        let supervisor = AlertSupervisor::new(
            Thresholds::default(),
            1800,
            vec![Box::new(CountingNotifier { count: count.clone() })],
        );

        let alert = Alert {
            kind: AlertKind::AdaBalance,
            message: "low balance".into(),
        };
        supervisor.fire(alert.clone(), 1_000).await;
        supervisor.fire(alert.clone(), 1_500).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        supervisor.fire(alert, 1_000 + 1800).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn minimum_data_sources_check_fires_below_threshold() {
        let supervisor = AlertSupervisor::new(Thresholds::default(), 1800, vec![]);
        assert!(supervisor.check_minimum_data_sources(2, "base").is_some());
        assert!(supervisor.check_minimum_data_sources(3, "base").is_none());
    }

    #[test]
    fn aggregation_timeout_respects_variance_grace_period() {
        let supervisor = AlertSupervisor::new(Thresholds::default(), 1800, vec![]);
        // interval 300_000ms, variance 105% => allowed = 315_000ms
        assert!(supervisor
            .check_aggregation_timeout(0, 300_000, 300_000 + 310_000)
            .is_none());
        assert!(supervisor
            .check_aggregation_timeout(0, 300_000, 300_000 + 320_000)
            .is_some());
    }
}
