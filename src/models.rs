//! Core domain types shared across the engine.
//!
//! These mirror the data model in the specification: a `PriceQuote` is one
//! reading from one source, an `AdapterResponse` is the outcome of one
//! adapter invocation, an `AggregatedRate` is the reduced reference price for
//! a tick, and `Decision` is the tagged outcome of the update/aggregate state
//! machine.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Which side of a cross-rate composition a quote belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PairType {
    Base,
    Quote,
}

impl std::fmt::Display for PairType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PairType::Base => write!(f, "base"),
            PairType::Quote => write!(f, "quote"),
        }
    }
}

/// One reading from one upstream source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceQuote {
    pub source_name: String,
    /// Stable identifier into persistence, assigned by the `RateStore` the
    /// first time a source is seen.
    pub source_id: Option<Uuid>,
    pub price: Decimal,
    pub timestamp_ms: i64,
    pub bid: Option<Decimal>,
    pub ask: Option<Decimal>,
    pub volume: Option<Decimal>,
    pub pair_type: PairType,
    /// Raw payload kept for audit/persistence, never interpreted downstream.
    pub raw: Option<Value>,
}

impl PriceQuote {
    pub fn is_valid(&self) -> bool {
        self.price.is_sign_positive() && !self.price.is_zero()
    }
}

/// Why an adapter produced no quote for a given source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AdapterError {
    Network(String),
    Decode(String),
    EmptyPool,
    UnsupportedPair,
}

impl std::fmt::Display for AdapterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AdapterError::Network(msg) => write!(f, "network error: {msg}"),
            AdapterError::Decode(msg) => write!(f, "decode error: {msg}"),
            AdapterError::EmptyPool => write!(f, "empty pool"),
            AdapterError::UnsupportedPair => write!(f, "unsupported pair"),
        }
    }
}

/// Result of one adapter invocation: a non-empty list of quotes, or the
/// reason every source in that adapter failed. An adapter with at least one
/// successful source never returns the error variant — see `RateSource`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterResponse {
    pub quotes: Vec<PriceQuote>,
    /// Per-source failures, kept for provenance even though the adapter as a
    /// whole "succeeded" by returning the union of working sources.
    pub failures: Vec<(String, AdapterError)>,
}

impl AdapterResponse {
    pub fn empty() -> Self {
        Self {
            quotes: Vec::new(),
            failures: Vec::new(),
        }
    }
}

/// The reduced reference price for one pair-type in one tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatedRate {
    pub value: Decimal,
    pub method: String,
    pub requested_at: DateTime<Utc>,
    pub computed_at: DateTime<Utc>,
    pub contributing_quotes: Vec<PriceQuote>,
    /// Per-source failures across both the quote and base fetch phases,
    /// kept so callers (e.g. the scheduler's metrics) can account for every
    /// configured source, not only the ones that contributed.
    pub failures: Vec<(String, AdapterError)>,
    pub feed_id: FeedId,
}

impl AggregatedRate {
    /// `value > 0` and `value` is the median of positive contributing quote
    /// prices — enforced by the aggregator, asserted here for callers that
    /// construct one directly in tests.
    pub fn is_well_formed(&self) -> bool {
        self.value.is_sign_positive()
            && !self.value.is_zero()
            && self
                .contributing_quotes
                .iter()
                .all(|q| q.price.is_sign_positive())
    }
}

/// Decoded `AggState` on-chain settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleSettings {
    pub node_pkhs: Vec<String>,
    /// Scaled by `percent_resolution = 10000`.
    pub updated_nodes_threshold_bps: u32,
    pub updated_node_time_ms: i64,
    pub aggregate_time_ms: i64,
    pub aggregate_change_bps: u32,
    pub node_fee_price: i64,
    /// IQR multiplier knob, `k ∈ [0, 4]`; `k = 0` encodes the conventional 1.5x.
    pub iqr_multiplier: u8,
    pub divergence_bps: u32,
}

pub const PERCENT_RESOLUTION: u64 = 10_000;

impl OracleSettings {
    /// `q = ceil(threshold_bps * N / 10000)`.
    pub fn required_quorum(&self) -> usize {
        let n = self.node_pkhs.len() as u64;
        let numerator = self.updated_nodes_threshold_bps as u64 * n;
        numerator.div_ceil(PERCENT_RESOLUTION) as usize
    }
}

/// Decoded `OracleFeed` datum: the last posted consensus value.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OracleFeed {
    pub value: i64,
    pub timestamp_ms: i64,
    pub expiry_ms: i64,
}

/// Decoded per-node `NodeDatum`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeDatum {
    pub operator_pkh: String,
    pub feed: Option<NodeFeed>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct NodeFeed {
    pub value: i64,
    pub timestamp_ms: i64,
}

/// Decoded `Reward` datum.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewardState {
    pub entries: Vec<RewardEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewardEntry {
    pub operator_pkh: String,
    pub reward_amount: i64,
}

impl RewardState {
    pub fn unclaimed_for(&self, operator_pkh: &str) -> i64 {
        self.entries
            .iter()
            .find(|e| e.operator_pkh == operator_pkh)
            .map(|e| e.reward_amount)
            .unwrap_or(0)
    }
}

/// Stable identifier of the oracle address this node serves. Derived as a
/// UUID (v5, namespace = `FeedId::NAMESPACE`) from the oracle address the
/// first time the engine sees it; persisted and reused thereafter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FeedId(pub Uuid);

impl FeedId {
    pub const NAMESPACE: Uuid = Uuid::from_bytes([
        0xc3, 0x0a, 0xc1, 0xe0, 0xfe, 0xed, 0x41, 0x11, 0x91, 0x0d, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00,
    ]);

    pub fn for_address(address: &str) -> Self {
        FeedId(Uuid::new_v5(&Self::NAMESPACE, address.as_bytes()))
    }
}

/// Tagged outcome of the update/aggregate decision procedure (§4.E). Each
/// variant carries the evidence needed by the transaction orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Decision {
    Idle,
    UpdateOnly { new_rate_scaled: i64 },
    Aggregate { participating_peers: Vec<NodeDatum> },
    UpdateAndAggregate {
        new_rate_scaled: i64,
        participating_peers: Vec<NodeDatum>,
    },
    CollectRewards,
}

impl Decision {
    pub fn is_idle(&self) -> bool {
        matches!(self, Decision::Idle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quorum_rounds_up() {
        let settings = OracleSettings {
            node_pkhs: vec!["a".into(), "b".into(), "c".into(), "d".into(), "e".into()],
            updated_nodes_threshold_bps: 6000,
            updated_node_time_ms: 0,
            aggregate_time_ms: 0,
            aggregate_change_bps: 0,
            node_fee_price: 0,
            iqr_multiplier: 0,
            divergence_bps: 0,
        };
        // ceil(6000 * 5 / 10000) = ceil(3.0) = 3
        assert_eq!(settings.required_quorum(), 3);
    }

    #[test]
    fn feed_id_is_stable_for_same_address() {
        let a = FeedId::for_address("addr1");
        let b = FeedId::for_address("addr1");
        let c = FeedId::for_address("addr2");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn reward_state_defaults_to_zero_for_unknown_operator() {
        let state = RewardState { entries: vec![] };
        assert_eq!(state.unclaimed_for("nobody"), 0);
    }

    #[test]
    fn price_quote_rejects_nonpositive_price() {
        let mut quote = PriceQuote {
            source_name: "x".into(),
            source_id: None,
            price: Decimal::ZERO,
            timestamp_ms: 0,
            bid: None,
            ask: None,
            volume: None,
            pair_type: PairType::Base,
            raw: None,
        };
        assert!(!quote.is_valid());
        quote.price = Decimal::new(1, 0);
        assert!(quote.is_valid());
    }
}
