//! Generic HTTP adapter: arbitrary REST price endpoints, grounded on
//! `original_source/backend/api/providers/generic_api_adapter.py`.
//!
//! Each source is a `{url, json_path, headers, inverse}` spec. A source fans
//! out concurrently; a single source's HTTP or decode failure is isolated and
//! recorded in `AdapterResponse::failures` without failing the others.

use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::Value;

use crate::config::SourceSpec;
use crate::models::{AdapterError, AdapterResponse, PriceQuote};
use crate::providers::{AdapterMeta, RateSource};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

pub struct GenericHttpAdapter {
    meta: AdapterMeta,
    sources: Vec<SourceSpec>,
    client: reqwest::Client,
}

impl GenericHttpAdapter {
    pub fn new(meta: AdapterMeta, sources: Vec<SourceSpec>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            meta,
            sources,
            client,
        }
    }

    async fn fetch_one(&self, source: &SourceSpec) -> Result<PriceQuote, AdapterError> {
        let url = source
            .api_url
            .as_deref()
            .ok_or_else(|| AdapterError::Decode("missing api_url".into()))?;
        let mut request = self.client.get(url);
        if let Some(token) = &source.bearer_token {
            request = request.bearer_auth(token);
        }
        for (key, value) in &source.headers {
            request = request.header(key, value);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AdapterError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AdapterError::Network(format!(
                "HTTP {}",
                response.status()
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| AdapterError::Decode(e.to_string()))?;

        let path = source.json_path.as_deref().unwrap_or(&[]);
        let raw_value = walk_json_path(&body, path)
            .ok_or_else(|| AdapterError::Decode(format!("path {path:?} not found")))?;

        let mut price = coerce_to_decimal(raw_value)
            .ok_or_else(|| AdapterError::Decode("value not numeric".into()))?;

        if source.inverse {
            if price.is_zero() {
                return Err(AdapterError::Decode("cannot invert zero price".into()));
            }
            price = Decimal::ONE / price;
        }

        Ok(PriceQuote {
            source_name: source.name.clone(),
            source_id: None,
            price,
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
            bid: None,
            ask: None,
            volume: None,
            pair_type: self.meta.pair_type,
            raw: Some(body),
        })
    }
}

/// Walks a JSON path made of string keys and array indices, following the
/// mixed string/int path convention from `generic_api_adapter.py::_get_json_value`.
fn walk_json_path<'a>(root: &'a Value, path: &[String]) -> Option<&'a Value> {
    let mut current = root;
    for segment in path {
        current = if let Ok(index) = segment.parse::<usize>() {
            current.get(index)?
        } else {
            current.get(segment)?
        };
    }
    Some(current)
}

fn coerce_to_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => n
            .as_f64()
            .and_then(|f| Decimal::try_from(f).ok())
            .or_else(|| n.to_string().parse().ok()),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

#[async_trait]
impl RateSource for GenericHttpAdapter {
    fn name(&self) -> &str {
        "generic_http"
    }

    fn meta(&self) -> &AdapterMeta {
        &self.meta
    }

    async fn get_rates(&self) -> AdapterResponse {
        let futures = self.sources.iter().map(|source| async move {
            (source.name.clone(), self.fetch_one(source).await)
        });
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
