//! LP-token NAV adapter, grounded on
//! `original_source/backend/api/providers/lp_token_adapter.py::LPTokenAdapter`.
//!
//! `price_ada = (ada_reserve_lovelace * 2) / lp_supply / 1_000_000`. Only
//! ADA-paired pools are supported; a non-ADA-paired pool or a non-positive
//! reserve/supply fails this source.

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::models::{AdapterError, AdapterResponse, PriceQuote};
use crate::providers::{AdapterMeta, RateSource};

const LOVELACE_PER_ADA: i64 = 1_000_000;

/// Decoded LP-pool state, as surfaced by whatever on-chain indexer backs
/// this adapter.
#[derive(Debug, Clone, Copy)]
pub struct LpPoolState {
    pub ada_reserve_lovelace: i64,
    pub lp_token_supply: Decimal,
    pub is_ada_paired: bool,
}

#[async_trait]
pub trait LpPoolLookup: Send + Sync {
    async fn find_pool(&self, dex_name: &str) -> Option<LpPoolState>;
}

/// Stand-in `LpPoolLookup` for deployments that have not wired a concrete
/// on-chain DEX indexer yet, mirroring `dex_pool::NullPoolLookup`.
pub struct NullLpPoolLookup;

#[async_trait]
impl LpPoolLookup for NullLpPoolLookup {
    async fn find_pool(&self, _dex_name: &str) -> Option<LpPoolState> {
        None
    }
}

pub struct LpNavAdapter {
    meta: AdapterMeta,
    dex_name: String,
    lookup: std::sync::Arc<dyn LpPoolLookup>,
}

impl LpNavAdapter {
    pub fn new(meta: AdapterMeta, dex_name: String, lookup: std::sync::Arc<dyn LpPoolLookup>) -> Self {
        Self {
            meta,
            dex_name,
            lookup,
        }
    }

    async fn fetch(&self) -> Result<PriceQuote, AdapterError> {
        let pool = self
            .lookup
            .find_pool(&self.dex_name)
            .await
            .ok_or(AdapterError::EmptyPool)?;

        if !pool.is_ada_paired {
            return Err(AdapterError::UnsupportedPair);
        }
        if pool.ada_reserve_lovelace <= 0 || pool.lp_token_supply.is_sign_negative() || pool.lp_token_supply.is_zero() {
            return Err(AdapterError::EmptyPool);
        }

        let ada_reserve = Decimal::from(pool.ada_reserve_lovelace) * Decimal::from(2);
        let price_lovelace = ada_reserve / pool.lp_token_supply;
        let price_ada = price_lovelace / Decimal::from(LOVELACE_PER_ADA);

        Ok(PriceQuote {
            source_name: self.dex_name.clone(),
            source_id: None,
            price: price_ada,
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
impl RateSource for LpNavAdapter {
    fn name(&self) -> &str {
        "lp_nav"
    }

    fn meta(&self) -> &AdapterMeta {
        &self.meta
    }

    async fn get_rates(&self) -> AdapterResponse {
        let mut response = AdapterResponse::empty();
        match self.fetch().await {
            Ok(quote) => response.quotes.push(quote),
            Err(err) => response.failures.push((self.dex_name.clone(), err)),
        }
        response
    }
}
