// =====================================================================================
// Oracle Node Engine - Unit Test Fixtures
//
// Author: arkSong (arksong2018@gmail.com)
// =====================================================================================

pub mod test_config;
pub mod test_error;

use oracle_node_engine::chain::oracle_state::OracleTags;
use oracle_node_engine::models::{NodeDatum, NodeFeed, OracleFeed, OracleSettings};

/// Builds an `OracleSettings` with reasonable defaults for the given
/// authorized node set, overridable by callers that need a specific knob.
pub fn test_settings(node_pkhs: Vec<&str>) -> OracleSettings {
    OracleSettings {
        node_pkhs: node_pkhs.into_iter().map(String::from).collect(),
        updated_nodes_threshold_bps: 6000,
        updated_node_time_ms: 60_000,
        aggregate_time_ms: 300_000,
        aggregate_change_bps: 500,
        node_fee_price: 0,
        iqr_multiplier: 0,
        divergence_bps: 500,
    }
}

pub fn test_feed(value: i64, timestamp_ms: i64, expiry_ms: i64) -> OracleFeed {
    OracleFeed {
        value,
        timestamp_ms,
        expiry_ms,
    }
}

pub fn test_node(pkh: &str, value: i64, timestamp_ms: i64) -> NodeDatum {
    NodeDatum {
        operator_pkh: pkh.into(),
        feed: Some(NodeFeed { value, timestamp_ms }),
    }
}

pub fn test_oracle_tags(policy_id: &str) -> OracleTags {
    OracleTags {
        policy_id: policy_id.into(),
        ..Default::default()
    }
}

/// Test utilities for async operations.
pub mod async_utils {
    use std::time::Duration;
    use tokio::time::timeout;

    /// Runs an async test with a hard timeout, surfacing a plain error
    /// rather than hanging the test runner.
    pub async fn with_timeout<F, T>(duration: Duration, future: F) -> Result<T, &'static str>
    where
        F: std::future::Future<Output = T>,
    {
        timeout(duration, future).await.map_err(|_| "test timed out")
    }
}
