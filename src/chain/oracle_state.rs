//! Oracle State Reader (§4.C): finds the four NFT-tagged oracle UTxOs at the
//! oracle address and decodes their datums, grounded on
//! `original_source/backend/api/oraclechecks.py::get_oracle_utxos_with_datums`.
//!
//! `AggState`, `OracleFeed`, and `Reward` are unique singletons; `NodeFeed`
//! is a multi-instance tag, one per authorized operator. A missing or
//! undecodable singleton is a soft failure (§7): the read returns `None` for
//! that slot rather than aborting the whole read.

use tracing::error;

use crate::chain::{ChainContext, Utxo};
use crate::datums::{PriceData, RawNodeDatum, RawOracleSettings, RawRewardDatum};
use crate::models::{NodeDatum, OracleFeed, OracleSettings, RewardState};

/// The four NFT asset names tagging oracle UTxOs, fixed per the original's
/// `setup_node_and_chain_query` (`NodeFeed`, `OracleFeed`, `AggState`,
/// `Reward`), all minted under the oracle's `oracle_curr` policy.
#[derive(Debug, Clone)]
pub struct OracleTags {
    pub policy_id: String,
    pub node_feed_asset: String,
    pub oracle_feed_asset: String,
    pub agg_state_asset: String,
    pub reward_asset: String,
}

impl Default for OracleTags {
    fn default() -> Self {
        Self {
            policy_id: String::new(),
            node_feed_asset: "NodeFeed".into(),
            oracle_feed_asset: "OracleFeed".into(),
            agg_state_asset: "AggState".into(),
            reward_asset: "Reward".into(),
        }
    }
}

/// Decoded snapshot of the oracle's on-chain state for one tick.
#[derive(Debug, Clone, Default)]
pub struct OracleState {
    pub settings: Option<OracleSettings>,
    pub feed: Option<OracleFeed>,
    pub nodes: Vec<NodeDatum>,
    pub reward_utxo: Option<Utxo>,
    pub reward_state: Option<RewardState>,
}

/// Reads and decodes the oracle's UTxO set at `oracle_address`.
pub async fn read_oracle_state(
    chain: &dyn ChainContext,
    oracle_address: &str,
    tags: &OracleTags,
) -> crate::error::OracleResult<OracleState> {
    let utxos = chain.get_utxos(oracle_address).await?;

    let agg_state_utxo = utxos
        .iter()
        .find(|u| u.has_asset(&tags.policy_id, &tags.agg_state_asset, 1));
    let oracle_feed_utxo = utxos
        .iter()
        .find(|u| u.has_asset(&tags.policy_id, &tags.oracle_feed_asset, 1));
    let reward_utxo = utxos
        .iter()
        .find(|u| u.has_asset(&tags.policy_id, &tags.reward_asset, 1))
        .cloned();
    let node_utxos: Vec<&Utxo> = utxos
        .iter()
        .filter(|u| u.has_asset(&tags.policy_id, &tags.node_feed_asset, 1))
        .collect();

    let settings = match agg_state_utxo {
        Some(utxo) => decode_settings(utxo),
        None => {
            error!("AggState UTxO not found at oracle address");
            None
        }
    };

    let feed = match oracle_feed_utxo {
        Some(utxo) => decode_feed(utxo),
        None => {
            error!("OracleFeed UTxO not found at oracle address");
            None
        }
    };

    let nodes = node_utxos
        .into_iter()
        .filter_map(decode_node)
        .collect();

    let reward_state = reward_utxo.as_ref().and_then(decode_reward);

    Ok(OracleState {
        settings,
        feed,
        nodes,
        reward_utxo,
        reward_state,
    })
}

fn decode_settings(utxo: &Utxo) -> Option<OracleSettings> {
    let datum = utxo.datum.as_ref()?;
    match serde_json::from_value::<RawOracleSettings>(datum.clone()) {
        Ok(raw) => Some(raw.into()),
        Err(err) => {
            error!(error = %err, "invalid CBOR/datum data for AggState");
            None
        }
    }
}

fn decode_feed(utxo: &Utxo) -> Option<OracleFeed> {
    let datum = utxo.datum.as_ref()?;
    match serde_json::from_value::<PriceData>(datum.clone()) {
        Ok(price_data) => Some(price_data.into()),
        Err(err) => {
            error!(error = %err, "invalid CBOR/datum data for OracleFeed");
            None
        }
    }
}

fn decode_node(utxo: &Utxo) -> Option<NodeDatum> {
    let datum = utxo.datum.as_ref()?;
    match serde_json::from_value::<RawNodeDatum>(datum.clone()) {
        Ok(raw) => Some(raw.into()),
        Err(err) => {
            error!(error = %err, "invalid CBOR/datum data for NodeDatum, skipping");
            None
        }
    }
}

fn decode_reward(utxo: &Utxo) -> Option<RewardState> {
    let datum = utxo.datum.as_ref()?;
    match serde_json::from_value::<RawRewardDatum>(datum.clone()) {
        Ok(raw) => Some(raw.into()),
        Err(err) => {
            error!(error = %err, "invalid CBOR/datum data for Reward");
            None
        }
    }
}

/// Finds a node datum by operator public-key-hash, per
/// `filter_node_datums_by_node_operator`.
pub fn find_node_by_operator<'a>(
    nodes: &'a [NodeDatum],
    operator_pkh: &str,
) -> Option<&'a NodeDatum> {
    nodes.iter().find(|n| n.operator_pkh == operator_pkh)
}
