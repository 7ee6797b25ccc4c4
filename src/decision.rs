//! Update / Aggregate Decision (§4.E): the state machine that decides, once
//! per tick, whether this node should post its own feed, aggregate peer
//! feeds into the canonical value, both, or do nothing — grounded on the
//! two-phase validation shape of `original_source/backend/node_checker.py`
//! and the decision table in the specification. Pure function: no I/O, so it
//! is exhaustively testable without a chain context.

use tracing::warn;

use crate::consensus;
use crate::models::{Decision, NodeDatum, OracleFeed, OracleSettings, PERCENT_RESOLUTION};

/// Everything the decision procedure needs for one tick, gathered by the
/// scheduler from the Oracle State Reader (§4.C) and the Rate Aggregator
/// (§4.B).
pub struct DecisionInputs<'a> {
    pub settings: &'a OracleSettings,
    pub feed: &'a OracleFeed,
    pub peer_nodes: &'a [NodeDatum],
    pub own_node: &'a NodeDatum,
    pub new_rate_scaled: i64,
    pub now_ms: i64,
    pub own_pkh: &'a str,
    pub reward_unclaimed: Option<i64>,
    pub reward_trigger_amount: Option<i64>,
}

fn is_fresh(feed_timestamp_ms: i64, updated_node_time_ms: i64, now_ms: i64) -> bool {
    feed_timestamp_ms + updated_node_time_ms >= now_ms
}

/// Peers considered with an up-to-date feed: outlier rejection (§4.D) only
/// ever narrows this set further, it never widens it.
fn fresh_peers<'a>(inputs: &DecisionInputs<'a>) -> Vec<&'a NodeDatum> {
    inputs
        .peer_nodes
        .iter()
        .filter(|n| {
            n.feed
                .is_some_and(|f| is_fresh(f.timestamp_ms, inputs.settings.updated_node_time_ms, inputs.now_ms))
        })
        .collect()
}

/// Runs outlier rejection over the fresh peer set and returns only the peers
/// whose feed value survived, per "only peers whose observations survive
/// outlier rejection are referenced" (§4.E).
fn select_participating_peers(fresh: &[&NodeDatum], settings: &OracleSettings) -> Vec<NodeDatum> {
    let feed_values: Vec<i64> = fresh.iter().filter_map(|n| n.feed.map(|f| f.value)).collect();
    if feed_values.is_empty() {
        return Vec::new();
    }
    let result = consensus::aggregate(settings.iqr_multiplier, settings.divergence_bps, &feed_values);
    fresh
        .iter()
        .filter(|n| n.feed.is_some_and(|f| result.retained.contains(&f.value)))
        .map(|&n| n.clone())
        .collect()
}

fn aggregation_needed(settings: &OracleSettings, feed: &OracleFeed, new_rate_scaled: i64, now_ms: i64) -> bool {
    let periodic = now_ms - feed.timestamp_ms >= settings.aggregate_time_ms;
    let change_triggered = feed.value != 0
        && (new_rate_scaled - feed.value).abs() * PERCENT_RESOLUTION as i64 / feed.value
            >= settings.aggregate_change_bps as i64;
    periodic || change_triggered
}

fn own_feed_stale(own_node: &NodeDatum, settings: &OracleSettings, now_ms: i64) -> bool {
    match own_node.feed {
        None => true,
        Some(f) => now_ms - f.timestamp_ms >= settings.updated_node_time_ms,
    }
}

/// Runs the full decision procedure for one tick. Returns the primary
/// decision followed by `CollectRewards` if the reward side-channel fires
/// (§4.E step 6) — never more than two elements.
pub fn decide(inputs: &DecisionInputs<'_>) -> Vec<Decision> {
    if !inputs.settings.node_pkhs.iter().any(|p| p == inputs.own_pkh) {
        warn!(pkh = %inputs.own_pkh, "node not found in oracle's authorized node list, idling");
        return vec![Decision::Idle];
    }

    let fresh = fresh_peers(inputs);
    let quorum = inputs.settings.required_quorum();
    let needs_aggregation = aggregation_needed(
        inputs.settings,
        inputs.feed,
        inputs.new_rate_scaled,
        inputs.now_ms,
    );
    let stale = own_feed_stale(inputs.own_node, inputs.settings, inputs.now_ms);

    let primary = if !needs_aggregation {
        if stale {
            Decision::UpdateOnly {
                new_rate_scaled: inputs.new_rate_scaled,
            }
        } else {
            Decision::Idle
        }
    } else if !stale {
        if fresh.len() >= quorum {
            Decision::Aggregate {
                participating_peers: select_participating_peers(&fresh, inputs.settings),
            }
        } else {
            warn!("aggregation needed but quorum not reached, idling");
            Decision::Idle
        }
    } else if fresh.len() + 1 >= quorum {
        Decision::UpdateAndAggregate {
            new_rate_scaled: inputs.new_rate_scaled,
            participating_peers: select_participating_peers(&fresh, inputs.settings),
        }
    } else {
        Decision::UpdateOnly {
            new_rate_scaled: inputs.new_rate_scaled,
        }
    };

    let mut decisions = vec![primary];
    if let (Some(unclaimed), Some(trigger)) = (inputs.reward_unclaimed, inputs.reward_trigger_amount) {
        if unclaimed >= trigger {
            decisions.push(Decision::CollectRewards);
        }
    }
    decisions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NodeFeed;

    fn settings(node_pkhs: Vec<&str>) -> OracleSettings {
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

    fn fresh_node(pkh: &str, value: i64, timestamp_ms: i64) -> NodeDatum {
        NodeDatum {
            operator_pkh: pkh.into(),
            feed: Some(NodeFeed { value, timestamp_ms }),
        }
    }

    #[test]
    fn unauthorized_node_always_idles() {
        let settings = settings(vec!["other"]);
        let feed = OracleFeed {
            value: 100,
            timestamp_ms: 0,
            expiry_ms: 1_000_000,
        };
        let own = fresh_node("me", 100, 0);
        let inputs = DecisionInputs {
            settings: &settings,
            feed: &feed,
            peer_nodes: &[],
            own_node: &own,
            new_rate_scaled: 100,
            now_ms: 1_000_000,
            own_pkh: "me",
            reward_unclaimed: None,
            reward_trigger_amount: None,
        };
        let decisions = decide(&inputs);
        assert_eq!(decisions.len(), 1);
        assert!(decisions[0].is_idle());
    }

    #[test]
    fn fresh_own_feed_and_no_aggregation_need_idles() {
        let settings = settings(vec!["me"]);
        let feed = OracleFeed {
            value: 100,
            timestamp_ms: 1_000_000,
            expiry_ms: 2_000_000,
        };
        let own = fresh_node("me", 100, 1_000_000);
        let inputs = DecisionInputs {
            settings: &settings,
            feed: &feed,
            peer_nodes: &[],
            own_node: &own,
            new_rate_scaled: 100,
            now_ms: 1_000_000,
            own_pkh: "me",
            reward_unclaimed: None,
            reward_trigger_amount: None,
        };
        assert!(decide(&inputs)[0].is_idle());
    }

    #[test]
    fn stale_own_feed_without_aggregation_need_updates_only() {
        let settings = settings(vec!["me"]);
        let feed = OracleFeed {
            value: 100,
            timestamp_ms: 1_000_000,
            expiry_ms: 2_000_000,
        };
        let own = NodeDatum {
            operator_pkh: "me".into(),
            feed: None,
        };
        let inputs = DecisionInputs {
            settings: &settings,
            feed: &feed,
            peer_nodes: &[],
            own_node: &own,
            new_rate_scaled: 101,
            now_ms: 1_000_000,
            own_pkh: "me",
            reward_unclaimed: None,
            reward_trigger_amount: None,
        };
        match &decide(&inputs)[0] {
            Decision::UpdateOnly { new_rate_scaled } => assert_eq!(*new_rate_scaled, 101),
            other => panic!("expected UpdateOnly, got {other:?}"),
        }
    }

    #[test]
    fn aggregation_with_quorum_and_fresh_own_feed_aggregates() {
        let settings = settings(vec!["me", "p1", "p2", "p3"]);
        let feed = OracleFeed {
            value: 100,
            timestamp_ms: 0,
            expiry_ms: 10_000_000,
        };
        let own = fresh_node("me", 100, 950_000);
        let peers = vec![
            fresh_node("p1", 101, 950_000),
            fresh_node("p2", 99, 950_000),
            fresh_node("p3", 102, 950_000),
        ];
        let inputs = DecisionInputs {
            settings: &settings,
            feed: &feed,
            peer_nodes: &peers,
            own_node: &own,
            new_rate_scaled: 100,
            now_ms: 1_000_000, // >= aggregate_time_ms since feed.timestamp_ms=0
            own_pkh: "me",
            reward_unclaimed: None,
            reward_trigger_amount: None,
        };
        match &decide(&inputs)[0] {
            Decision::Aggregate { participating_peers } => {
                assert_eq!(participating_peers.len(), 3);
            }
            other => panic!("expected Aggregate, got {other:?}"),
        }
    }

    #[test]
    fn reward_collection_is_appended_when_trigger_met() {
        let settings = settings(vec!["me"]);
        let feed = OracleFeed {
            value: 100,
            timestamp_ms: 1_000_000,
            expiry_ms: 2_000_000,
        };
        let own = fresh_node("me", 100, 1_000_000);
        let inputs = DecisionInputs {
            settings: &settings,
            feed: &feed,
            peer_nodes: &[],
            own_node: &own,
            new_rate_scaled: 100,
            now_ms: 1_000_000,
            own_pkh: "me",
            reward_unclaimed: Some(10),
            reward_trigger_amount: Some(5),
        };
        let decisions = decide(&inputs);
        assert_eq!(decisions.len(), 2);
        assert!(matches!(decisions[1], Decision::CollectRewards));
    }

    #[test]
    fn decision_is_deterministic_for_identical_inputs() {
        let settings = settings(vec!["me", "p1"]);
        let feed = OracleFeed {
            value: 100,
            timestamp_ms: 1_000_000,
            expiry_ms: 2_000_000,
        };
        let own = fresh_node("me", 100, 1_000_000);
        let peers = vec![fresh_node("p1", 101, 1_000_000)];
        let make_inputs = || DecisionInputs {
            settings: &settings,
            feed: &feed,
            peer_nodes: &peers,
            own_node: &own,
            new_rate_scaled: 100,
            now_ms: 1_000_000,
            own_pkh: "me",
            reward_unclaimed: None,
            reward_trigger_amount: None,
        };
        let a = decide(&make_inputs());
        let b = decide(&make_inputs());
        assert_eq!(a.len(), b.len());
        assert_eq!(a[0].is_idle(), b[0].is_idle());
    }
}
