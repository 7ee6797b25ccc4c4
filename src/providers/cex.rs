//! Centralized-exchange adapter, grounded on
//! `original_source/backend/api/providers/ccxt_adapter.py::CCXTAdapter`.
//!
//! Concurrency across named exchanges is bounded by a semaphore
//! (`concurrent_requests`, default 20) rather than unbounded fan-out, since a
//! single exchange connector is relatively expensive to stand up per call.
//! Unsupported exchanges or symbols are dropped silently, matching the
//! original's per-exchange `try/except` isolation.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::Semaphore;

use crate::models::{AdapterError, AdapterResponse, PriceQuote};
use crate::providers::{AdapterMeta, RateSource};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// One named exchange ticker endpoint. In production this would be backed by
/// an exchange-connector crate; here it is expressed as a plain REST ticker
/// call, since the pack carries no CCXT-equivalent Rust crate.
#[derive(Debug, Clone)]
pub struct CexSource {
    pub exchange: String,
    pub symbol: String,
    pub ticker_url: String,
}

pub struct CexAdapter {
    meta: AdapterMeta,
    sources: Vec<CexSource>,
    semaphore: Arc<Semaphore>,
    client: reqwest::Client,
}

impl CexAdapter {
    pub fn new(meta: AdapterMeta, sources: Vec<CexSource>, concurrent_requests: usize) -> Self {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            meta,
            sources,
            semaphore: Arc::new(Semaphore::new(concurrent_requests.max(1))),
            client,
        }
    }

    async fn fetch_one(&self, source: &CexSource) -> Result<PriceQuote, AdapterError> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|e| AdapterError::Network(e.to_string()))?;

        let response = self
            .client
            .get(&source.ticker_url)
            .send()
            .await
            .map_err(|e| AdapterError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AdapterError::Network(format!(
                "{}: HTTP {}",
                source.exchange,
                response.status()
            )));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AdapterError::Decode(e.to_string()))?;

        let last = body
            .get("last")
            .or_else(|| body.get("price"))
            .and_then(|v| v.as_f64())
            .ok_or_else(|| AdapterError::Decode("no last price in ticker".into()))?;

        let price =
            Decimal::try_from(last).map_err(|e| AdapterError::Decode(e.to_string()))?;

        let bid = body.get("bid").and_then(|v| v.as_f64()).and_then(|v| Decimal::try_from(v).ok());
        let ask = body.get("ask").and_then(|v| v.as_f64()).and_then(|v| Decimal::try_from(v).ok());
        let volume = body
            .get("baseVolume")
            .and_then(|v| v.as_f64())
            .and_then(|v| Decimal::try_from(v).ok());

        Ok(PriceQuote {
            source_name: source.exchange.clone(),
            source_id: None,
            price,
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
            bid,
            ask,
            volume,
            pair_type: self.meta.pair_type,
            raw: Some(body),
        })
    }
}

#[async_trait]
impl RateSource for CexAdapter {
    fn name(&self) -> &str {
        "cex"
    }

    fn meta(&self) -> &AdapterMeta {
        &self.meta
    }

    async fn get_rates(&self) -> AdapterResponse {
        let futures = self
            .sources
            .iter()
            .map(|source| async move { (source.exchange.clone(), self.fetch_one(source).await) });
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

    #[test]
    fn semaphore_floor_is_one() {
        let meta = AdapterMeta {
            asset_a: "ADA".into(),
            asset_b: "USD".into(),
            pair_type: crate::models::PairType::Base,
            quote_required: false,
            quote_calc_method: crate::providers::QuoteCalcMethod::Multiply,
        };
        let adapter = CexAdapter::new(meta, vec![], 0);
        assert_eq!(adapter.semaphore.available_permits(), 1);
    }
}
