//! Metrics for the node-operation engine, grounded on the teacher's
//! `prometheus`-backed `OracleMetrics` (same registry/namespace/export
//! pattern), pared down from the teacher's request/cache/business groups to
//! the tick/adapter/chain/alert surface this engine actually has.

use prometheus::{Histogram, HistogramVec, IntCounter, IntCounterVec, Registry, TextEncoder};

/// Node-engine metrics collector.
pub struct NodeMetrics {
    registry: Registry,

    pub ticks_total: IntCounter,
    pub tick_duration: Histogram,

    pub adapter_requests_total: IntCounterVec,
    pub adapter_failures_total: IntCounterVec,

    pub chain_rpc_duration: HistogramVec,
    pub chain_rpc_errors_total: IntCounterVec,

    pub decisions_total: IntCounterVec,
    pub transactions_submitted_total: IntCounterVec,
    pub transaction_confirmation_duration: Histogram,

    pub alerts_fired_total: IntCounterVec,
    pub outliers_rejected_total: IntCounter,
}

impl NodeMetrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let ticks_total = IntCounter::new("oracle_node_ticks_total", "Total scheduler ticks run")?;

        let tick_duration = Histogram::with_opts(
            prometheus::HistogramOpts::new("oracle_node_tick_duration_seconds", "Tick duration")
                .namespace("rwa")
                .subsystem("oracle_node")
                .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        )?;

        let adapter_requests_total = IntCounterVec::new(
            prometheus::Opts::new("oracle_node_adapter_requests_total", "Total source-adapter requests")
                .namespace("rwa")
                .subsystem("oracle_node"),
            &["source"],
        )?;

        let adapter_failures_total = IntCounterVec::new(
            prometheus::Opts::new("oracle_node_adapter_failures_total", "Total source-adapter failures")
                .namespace("rwa")
                .subsystem("oracle_node"),
            &["source", "reason"],
        )?;

        let chain_rpc_duration = HistogramVec::new(
            prometheus::HistogramOpts::new("oracle_node_chain_rpc_duration_seconds", "Chain RPC latency")
                .namespace("rwa")
                .subsystem("oracle_node")
                .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.0, 5.0]),
            &["operation"],
        )?;

        let chain_rpc_errors_total = IntCounterVec::new(
            prometheus::Opts::new("oracle_node_chain_rpc_errors_total", "Total chain RPC errors")
                .namespace("rwa")
                .subsystem("oracle_node"),
            &["operation"],
        )?;

        let decisions_total = IntCounterVec::new(
            prometheus::Opts::new("oracle_node_decisions_total", "Decisions taken, by kind")
                .namespace("rwa")
                .subsystem("oracle_node"),
            &["decision"],
        )?;

        let transactions_submitted_total = IntCounterVec::new(
            prometheus::Opts::new("oracle_node_transactions_submitted_total", "Transactions submitted, by redeemer")
                .namespace("rwa")
                .subsystem("oracle_node"),
            &["redeemer"],
        )?;

        let transaction_confirmation_duration = Histogram::with_opts(
            prometheus::HistogramOpts::new(
                "oracle_node_transaction_confirmation_duration_seconds",
                "Time from submission to confirmation",
            )
            .namespace("rwa")
            .subsystem("oracle_node")
            .buckets(vec![1.0, 5.0, 10.0, 20.0, 40.0, 60.0, 120.0, 200.0]),
        )?;

        let alerts_fired_total = IntCounterVec::new(
            prometheus::Opts::new("oracle_node_alerts_fired_total", "Alerts fired, by kind")
                .namespace("rwa")
                .subsystem("oracle_node"),
            &["kind"],
        )?;

        let outliers_rejected_total = IntCounter::new(
            "oracle_node_outliers_rejected_total",
            "Total peer feeds rejected as outliers by the consensus engine",
        )?;

        registry.register(Box::new(ticks_total.clone()))?;
        registry.register(Box::new(tick_duration.clone()))?;
        registry.register(Box::new(adapter_requests_total.clone()))?;
        registry.register(Box::new(adapter_failures_total.clone()))?;
        registry.register(Box::new(chain_rpc_duration.clone()))?;
        registry.register(Box::new(chain_rpc_errors_total.clone()))?;
        registry.register(Box::new(decisions_total.clone()))?;
        registry.register(Box::new(transactions_submitted_total.clone()))?;
        registry.register(Box::new(transaction_confirmation_duration.clone()))?;
        registry.register(Box::new(alerts_fired_total.clone()))?;
        registry.register(Box::new(outliers_rejected_total.clone()))?;

        Ok(Self {
            registry,
            ticks_total,
            tick_duration,
            adapter_requests_total,
            adapter_failures_total,
            chain_rpc_duration,
            chain_rpc_errors_total,
            decisions_total,
            transactions_submitted_total,
            transaction_confirmation_duration,
            alerts_fired_total,
            outliers_rejected_total,
        })
    }

    pub fn record_adapter_result(&self, source: &str, failure_reason: Option<&str>) {
        self.adapter_requests_total.with_label_values(&[source]).inc();
        if let Some(reason) = failure_reason {
            self.adapter_failures_total.with_label_values(&[source, reason]).inc();
        }
    }

    pub fn record_decision(&self, decision_kind: &str) {
        self.decisions_total.with_label_values(&[decision_kind]).inc();
    }

    pub fn record_transaction_submitted(&self, redeemer: &str) {
        self.transactions_submitted_total.with_label_values(&[redeemer]).inc();
    }

    pub fn record_alert_fired(&self, kind: &str) {
        self.alerts_fired_total.with_label_values(&[kind]).inc();
    }

    pub fn export(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        encoder.encode_to_string(&metric_families)
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_metrics_start_at_zero() {
        let metrics = NodeMetrics::new().unwrap();
        assert_eq!(metrics.ticks_total.get(), 0);
        assert_eq!(metrics.outliers_rejected_total.get(), 0);
    }

    #[test]
    fn adapter_result_increments_requests_and_optionally_failures() {
        let metrics = NodeMetrics::new().unwrap();
        metrics.record_adapter_result("binance", None);
        metrics.record_adapter_result("kraken", Some("timeout"));

        let families = metrics.registry.gather();
        let requests = families
            .iter()
            .find(|f| f.get_name() == "rwa_oracle_node_adapter_requests_total")
            .expect("requests metric present");
        assert_eq!(requests.get_metric().len(), 2);

        let failures = families
            .iter()
            .find(|f| f.get_name() == "rwa_oracle_node_adapter_failures_total")
            .expect("failures metric present");
        assert_eq!(failures.get_metric().len(), 1);
    }

    #[test]
    fn export_contains_registered_metric_names() {
        let metrics = NodeMetrics::new().unwrap();
        metrics.record_decision("idle");
        let exported = metrics.export().unwrap();
        assert!(exported.contains("rwa_oracle_node_decisions_total"));
    }
}
