//! Source adapters (§4.A): a uniform `RateSource` capability implemented by
//! tagged variants for each upstream family, following the design note
//! "dynamic dispatch over adapters → a single capability implemented by
//! tagged variants; the aggregator is generic over this capability."

pub mod cex;
pub mod dex_pool;
pub mod generic_http;
pub mod lp_nav;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::CurrencyConfig;
use crate::models::{AdapterResponse, PairType};
use cex::{CexAdapter, CexSource};
use dex_pool::{DexPoolAdapter, NullPoolLookup};
use generic_http::GenericHttpAdapter;
use lp_nav::{LpNavAdapter, NullLpPoolLookup};

/// Common adapter metadata, factored out of the four families following
/// `original_source/backend/api/providers/base_adapter.py::BaseAdapter`.
#[derive(Debug, Clone)]
pub struct AdapterMeta {
    pub asset_a: String,
    pub asset_b: String,
    pub pair_type: PairType,
    pub quote_required: bool,
    pub quote_calc_method: QuoteCalcMethod,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteCalcMethod {
    Multiply,
    Divide,
}

impl QuoteCalcMethod {
    pub fn from_str_or_default(s: Option<&str>) -> Self {
        match s {
            Some("divide") => QuoteCalcMethod::Divide,
            _ => QuoteCalcMethod::Multiply,
        }
    }
}

/// One family of upstream sources for one asset pair. Any single-source
/// failure is isolated inside `get_rates`; the adapter returns the union of
/// successful quotes and never fails the tick by itself.
#[async_trait]
pub trait RateSource: Send + Sync {
    fn name(&self) -> &str;
    fn meta(&self) -> &AdapterMeta;

    async fn get_rates(&self) -> AdapterResponse;

    fn pair_type(&self) -> PairType {
        self.meta().pair_type
    }

    fn quote_required(&self) -> bool {
        self.meta().quote_required
    }

    fn quote_calc_method(&self) -> QuoteCalcMethod {
        self.meta().quote_calc_method
    }
}

/// Builds every configured adapter for one side (base or quote) of a
/// currency pair, grounded on `app_setup.py::setup_provider_adapters`'s
/// per-family construction loop.
///
/// DEX-pool and LP-token adapters are wired with `NullPoolLookup`/
/// `NullLpPoolLookup` until a concrete on-chain indexer capability is
/// supplied — see DESIGN.md. They are still constructed and exercised every
/// tick, so a real `PoolLookup`/`LpPoolLookup` implementation becomes live
/// without any further wiring changes.
pub fn build_sources(currency: &CurrencyConfig, pair_type: PairType) -> Vec<Arc<dyn RateSource>> {
    let mut sources: Vec<Arc<dyn RateSource>> = Vec::new();

    for dex in &currency.dexes {
        let meta = AdapterMeta {
            asset_a: dex.name.clone(),
            asset_b: String::new(),
            pair_type,
            quote_required: dex.quote_required,
            quote_calc_method: QuoteCalcMethod::from_str_or_default(dex.quote_calc_method.as_deref()),
        };
        sources.push(Arc::new(DexPoolAdapter::new(
            meta,
            dex.sources.clone(),
            Arc::new(NullPoolLookup),
        )));
    }

    for api in &currency.api_sources {
        let meta = AdapterMeta {
            asset_a: String::new(),
            asset_b: String::new(),
            pair_type,
            quote_required: api.quote_required,
            quote_calc_method: QuoteCalcMethod::from_str_or_default(api.quote_calc_method.as_deref()),
        };
        sources.push(Arc::new(GenericHttpAdapter::new(meta, api.sources.clone())));
    }

    for cex in &currency.cexes {
        let meta = AdapterMeta {
            asset_a: String::new(),
            asset_b: String::new(),
            pair_type,
            quote_required: cex.quote_required,
            quote_calc_method: QuoteCalcMethod::from_str_or_default(cex.quote_calc_method.as_deref()),
        };
        // Config carries only an endpoint per source, not a separate
        // exchange label/symbol pair; the endpoint string doubles as both.
        let cex_sources = cex
            .sources
            .iter()
            .map(|entry| CexSource {
                exchange: entry.clone(),
                symbol: String::new(),
                ticker_url: entry.clone(),
            })
            .collect();
        sources.push(Arc::new(CexAdapter::new(meta, cex_sources, cex.concurrent_requests)));
    }

    for lp in &currency.lp_token {
        let meta = AdapterMeta {
            asset_a: lp.pool_dex.clone(),
            asset_b: String::new(),
            pair_type,
            quote_required: lp.quote_required,
            quote_calc_method: QuoteCalcMethod::from_str_or_default(lp.quote_calc_method.as_deref()),
        };
        sources.push(Arc::new(LpNavAdapter::new(
            meta,
            lp.pool_dex.clone(),
            Arc::new(NullLpPoolLookup),
        )));
    }

    sources
}
