//! On-chain DEX-pool adapter (§4.A). Finds the liquidity-pool UTxO for a
//! named DEX holding both configured assets and derives a single mid-price
//! per pool. Pools that hold more than the two expected assets (besides ADA
//! and the pool's own LP token) or that are otherwise malformed are dropped
//! silently, matching the original's per-pool `try/except` isolation in
//! `original_source/backend/api/aggregated_coin_rate.py`.
//!
//! Byte-level UTxO/datum decoding belongs to the `ChainContext` implementor;
//! this adapter only consumes already-decoded pool reserves.

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::models::{AdapterError, AdapterResponse, PriceQuote};
use crate::providers::{AdapterMeta, RateSource};

/// Decoded reserves for one DEX pool, as surfaced by whatever on-chain
/// indexer backs this adapter.
#[derive(Debug, Clone, Copy)]
pub struct PoolReserves {
    pub reserve_a: Decimal,
    pub reserve_b: Decimal,
}

#[async_trait]
pub trait PoolLookup: Send + Sync {
    /// Returns `None` if the pool cannot be found or does not hold exactly
    /// the two expected assets.
    async fn find_pool(&self, dex_name: &str) -> Option<PoolReserves>;
}

/// Stand-in `PoolLookup` for deployments that have not wired a concrete
/// on-chain DEX indexer yet: every lookup reports no pool found, isolated as
/// `AdapterError::EmptyPool` the same as a real indexer finding nothing.
/// Mirrors `chain::NullChainContext`.
pub struct NullPoolLookup;

#[async_trait]
impl PoolLookup for NullPoolLookup {
    async fn find_pool(&self, _dex_name: &str) -> Option<PoolReserves> {
        None
    }
}

pub struct DexPoolAdapter {
    meta: AdapterMeta,
    dex_names: Vec<String>,
    lookup: std::sync::Arc<dyn PoolLookup>,
}

impl DexPoolAdapter {
    pub fn new(
        meta: AdapterMeta,
        dex_names: Vec<String>,
        lookup: std::sync::Arc<dyn PoolLookup>,
    ) -> Self {
        Self {
            meta,
            dex_names,
            lookup,
        }
    }

    async fn fetch_one(&self, dex_name: &str) -> Result<PriceQuote, AdapterError> {
        let reserves = self
            .lookup
            .find_pool(dex_name)
            .await
            .ok_or(AdapterError::EmptyPool)?;

        if reserves.reserve_a.is_zero() || reserves.reserve_b.is_zero() {
            return Err(AdapterError::EmptyPool);
        }

        // Mid-price = reserve_b / reserve_a, i.e. units of asset_b per
        // asset_a, matching the spec's §4.A wording for the DEX-pool family.
        let price = reserves.reserve_b / reserves.reserve_a;

        Ok(PriceQuote {
            source_name: dex_name.to_string(),
            source_id: None,
            price,
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
            bid: None,
            ask: None,
            volume: None,
            pair_type: self.meta.pair_type,
            raw: None,
        })
    }
}

#[async_trait]
impl RateSource for DexPoolAdapter {
    fn name(&self) -> &str {
        "dex_pool"
    }

    fn meta(&self) -> &AdapterMeta {
        &self.meta
    }

    async fn get_rates(&self) -> AdapterResponse {
        let futures = self
            .dex_names
            .iter()
            .map(|dex_name| async move { (dex_name.clone(), self.fetch_one(dex_name).await) });
        let results = futures::future::join_all(futures).await;

        let mut response = AdapterResponse::empty();
        for (name, result) in results {
            match result {
                Ok(quote) => response.quotes.push(quote),
                Err(err) => response.failures.push((name, err)),
            }
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PairType;
    use crate::providers::QuoteCalcMethod;

    struct FakeLookup {
        reserves: Option<PoolReserves>,
    }

    #[async_trait]
    impl PoolLookup for FakeLookup {
        async fn find_pool(&self, _dex_name: &str) -> Option<PoolReserves> {
            self.reserves
        }
    }

    fn meta() -> AdapterMeta {
        AdapterMeta {
            asset_a: "ADA".into(),
            asset_b: "C3".into(),
            pair_type: PairType::Base,
            quote_required: false,
            quote_calc_method: QuoteCalcMethod::Multiply,
        }
    }

    #[tokio::test]
    async fn mid_price_is_reserve_b_over_reserve_a() {
        let lookup = std::sync::Arc::new(FakeLookup {
            reserves: Some(PoolReserves {
                reserve_a: Decimal::new(1000, 0),
                reserve_b: Decimal::new(500, 0),
            }),
        });
        let adapter = DexPoolAdapter::new(meta(), vec!["minswap".into()], lookup);
        let response = adapter.get_rates().await;
        assert_eq!(response.quotes.len(), 1);
        assert_eq!(response.quotes[0].price, Decimal::new(5, 1));
    }

    #[tokio::test]
    async fn missing_pool_is_isolated_as_a_failure() {
        let lookup = std::sync::Arc::new(FakeLookup { reserves: None });
        let adapter = DexPoolAdapter::new(meta(), vec!["minswap".into()], lookup);
        let response = adapter.get_rates().await;
        assert!(response.quotes.is_empty());
        assert_eq!(response.failures.len(), 1);
    }

    #[tokio::test]
    async fn zero_reserve_pool_is_isolated_as_a_failure() {
        let lookup = std::sync::Arc::new(FakeLookup {
            reserves: Some(PoolReserves {
                reserve_a: Decimal::ZERO,
                reserve_b: Decimal::new(500, 0),
            }),
        });
        let adapter = DexPoolAdapter::new(meta(), vec!["minswap".into()], lookup);
        let response = adapter.get_rates().await;
        assert!(response.quotes.is_empty());
        assert_eq!(response.failures.len(), 1);
    }
}
