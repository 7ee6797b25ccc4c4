//! Explicit datum records decoded from on-chain PlutusData.
//!
//! Byte-level CBOR/PlutusData decoding is out of scope (owned by the
//! `ChainContext` implementor); this module only models the already-decoded
//! shapes and the pure accessor logic on top of them, per the design note in
//! the specification: "define explicit datum records with named fields and a
//! single conversion layer; tests can construct datum records directly
//! without synthesising binary blobs." Field names follow
//! `original_source/backend/core/datums.py` with Rust naming conventions.

use crate::models::{
    NodeDatum as DecodedNodeDatum, NodeFeed, OracleFeed, OracleSettings, RewardEntry, RewardState,
};
use serde::{Deserialize, Serialize};

/// `NodeInfo` — identifies the operator that owns a per-node UTxO.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeInfo {
    pub node_operator: String,
}

/// `DataFeed` — a value/timestamp pair as stored on-chain.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DataFeed {
    pub df_value: i64,
    pub df_last_update: i64,
}

/// `PriceFeed` wraps a `DataFeed`; `Nothing` marks a node that has never
/// posted. Mirrors the `Union[PriceFeed, Nothing]` in the original.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum NodeFeedDatum {
    PriceFeed(DataFeed),
    Nothing,
}

/// `NodeState` — operator identity plus its feed slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeState {
    pub node_operator: NodeInfo,
    pub node_feed: NodeFeedDatum,
}

/// Raw `NodeDatum` as decoded from a per-node UTxO.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawNodeDatum {
    pub node_state: NodeState,
}

impl From<RawNodeDatum> for DecodedNodeDatum {
    fn from(raw: RawNodeDatum) -> Self {
        let feed = match raw.node_state.node_feed {
            NodeFeedDatum::PriceFeed(df) => Some(NodeFeed {
                value: df.df_value,
                timestamp_ms: df.df_last_update,
            }),
            NodeFeedDatum::Nothing => None,
        };
        DecodedNodeDatum {
            operator_pkh: raw.node_state.node_operator.node_operator,
            feed,
        }
    }
}

/// CIP-oracle `PriceData` datum: `price_map = {0: price, 1: timestamp, 2: expiry}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceData {
    pub price: i64,
    pub timestamp: i64,
    pub expiry: i64,
}

impl PriceData {
    pub fn get_price(&self) -> i64 {
        self.price
    }

    pub fn get_timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn get_expiry(&self) -> i64 {
        self.expiry
    }
}

impl From<PriceData> for OracleFeed {
    fn from(pd: PriceData) -> Self {
        OracleFeed {
            value: pd.price,
            timestamp_ms: pd.timestamp,
            expiry_ms: pd.expiry,
        }
    }
}

/// `NodeFee` — flat per-update fee the oracle charges, in the fee-token's
/// smallest unit.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct NodeFee {
    pub get_node_fee: i64,
}

/// Raw `OracleSettings` datum, as decoded from the `AggState` UTxO.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawOracleSettings {
    pub os_node_list: Vec<String>,
    pub os_updated_nodes: u32,
    pub os_updated_node_time: i64,
    pub os_aggregate_time: i64,
    pub os_aggregate_change: u32,
    pub os_node_fee_price: NodeFee,
    pub os_mad_multiplier: u8,
    pub os_divergence: u32,
}

impl From<RawOracleSettings> for OracleSettings {
    fn from(raw: RawOracleSettings) -> Self {
        OracleSettings {
            node_pkhs: raw.os_node_list,
            updated_nodes_threshold_bps: raw.os_updated_nodes,
            updated_node_time_ms: raw.os_updated_node_time,
            aggregate_time_ms: raw.os_aggregate_time,
            aggregate_change_bps: raw.os_aggregate_change,
            node_fee_price: raw.os_node_fee_price.get_node_fee,
            iqr_multiplier: raw.os_mad_multiplier,
            divergence_bps: raw.os_divergence,
        }
    }
}

/// One entry of `RewardDatum`'s `reward_state.node_reward_list`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawRewardEntry {
    pub reward_address: String,
    pub reward_amount: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawRewardState {
    pub node_reward_list: Vec<RawRewardEntry>,
}

/// Raw `RewardDatum`, as decoded from the `Reward` UTxO.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawRewardDatum {
    pub reward_state: RawRewardState,
}

impl From<RawRewardDatum> for RewardState {
    fn from(raw: RawRewardDatum) -> Self {
        RewardState {
            entries: raw
                .reward_state
                .node_reward_list
                .into_iter()
                .map(|e| RewardEntry {
                    operator_pkh: e.reward_address,
                    reward_amount: e.reward_amount,
                })
                .collect(),
        }
    }
}
