//! Persistence capability (§6, §7). The engine never talks to a database
//! directly — everything is written through `RateStore`, following the
//! teacher's `sqlx`-backed `OracleService` pattern in spirit, generalised to
//! a trait so tests can swap in an in-memory double. A real Postgres-backed
//! implementation is provided for production composition; the query-serving
//! CRUD surface the teacher built around it (REST handlers, subscriptions)
//! is out of scope per the specification's Non-goals.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{OracleError, OracleResult};
use crate::models::{AggregatedRate, FeedId, PriceQuote};

/// One row of the operational-error log every failure that reaches the
/// scheduler's catch-all is recorded to (§7).
#[derive(Debug, Clone)]
pub struct OperationalErrorRecord {
    pub feed_id: FeedId,
    pub category: String,
    pub message: String,
    pub occurred_at: DateTime<Utc>,
}

/// Idempotent write surface for everything the engine persists across a
/// tick: the resolved source catalogue, individual provider responses, the
/// aggregated rate, node/aggregation/update events, submitted transactions,
/// operational errors, and reward distributions.
#[async_trait]
pub trait RateStore: Send + Sync {
    async fn ensure_provider(&self, feed_id: FeedId, name: &str, adapter_type: &str) -> OracleResult<Uuid>;

    async fn record_quote(&self, feed_id: FeedId, quote: &PriceQuote) -> OracleResult<()>;

    async fn record_aggregated_rate(&self, rate: &AggregatedRate) -> OracleResult<()>;

    async fn record_node_update(&self, feed_id: FeedId, tx_hash: &str, new_rate_scaled: i64) -> OracleResult<()>;

    async fn record_aggregation(&self, feed_id: FeedId, tx_hash: &str, participating_peers: usize) -> OracleResult<()>;

    async fn record_transaction(&self, feed_id: FeedId, tx_hash: &str, kind: &str) -> OracleResult<()>;

    async fn record_operational_error(&self, record: OperationalErrorRecord) -> OracleResult<()>;

    async fn record_reward_distribution(&self, feed_id: FeedId, operator_pkh: &str, amount: i64) -> OracleResult<()>;

    /// Deletes rows older than 24h from the high-volume tables (quotes,
    /// transient provider responses), per the ambient retention policy.
    async fn cleanup_stale_rows(&self) -> OracleResult<u64>;
}

/// Postgres-backed implementation, following the teacher's `sqlx::PgPool`
/// composition pattern in `service.rs`.
pub struct PostgresRateStore {
    pool: PgPool,
}

impl PostgresRateStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> OracleResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| OracleError::Store(e.to_string()))?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl RateStore for PostgresRateStore {
    async fn ensure_provider(&self, feed_id: FeedId, name: &str, adapter_type: &str) -> OracleResult<Uuid> {
        let row: (Uuid,) = sqlx::query_as(
            "INSERT INTO providers (feed_id, name, adapter_type) VALUES ($1, $2, $3)
             ON CONFLICT (feed_id, name, adapter_type) DO UPDATE SET name = EXCLUDED.name
             RETURNING id",
        )
        .bind(feed_id.0)
        .bind(name)
        .bind(adapter_type)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| OracleError::Store(e.to_string()))?;
        Ok(row.0)
    }

    async fn record_quote(&self, feed_id: FeedId, quote: &PriceQuote) -> OracleResult<()> {
        sqlx::query(
            "INSERT INTO rate_data_flow (feed_id, source_name, price, timestamp_ms, pair_type)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(feed_id.0)
        .bind(&quote.source_name)
        .bind(quote.price)
        .bind(quote.timestamp_ms)
        .bind(quote.pair_type.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| OracleError::Store(e.to_string()))?;
        Ok(())
    }

    async fn record_aggregated_rate(&self, rate: &AggregatedRate) -> OracleResult<()> {
        sqlx::query(
            "INSERT INTO node_aggregation (feed_id, value, method, computed_at, contributing_count)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(rate.feed_id.0)
        .bind(rate.value)
        .bind(&rate.method)
        .bind(rate.computed_at)
        .bind(rate.contributing_quotes.len() as i64)
        .execute(&self.pool)
        .await
        .map_err(|e| OracleError::Store(e.to_string()))?;
        Ok(())
    }

    async fn record_node_update(&self, feed_id: FeedId, tx_hash: &str, new_rate_scaled: i64) -> OracleResult<()> {
        sqlx::query(
            "INSERT INTO node_update (feed_id, tx_hash, new_rate_scaled) VALUES ($1, $2, $3)",
        )
        .bind(feed_id.0)
        .bind(tx_hash)
        .bind(new_rate_scaled)
        .execute(&self.pool)
        .await
        .map_err(|e| OracleError::Store(e.to_string()))?;
        Ok(())
    }

    async fn record_aggregation(&self, feed_id: FeedId, tx_hash: &str, participating_peers: usize) -> OracleResult<()> {
        sqlx::query(
            "INSERT INTO node_aggregation_tx (feed_id, tx_hash, participating_peers) VALUES ($1, $2, $3)",
        )
        .bind(feed_id.0)
        .bind(tx_hash)
        .bind(participating_peers as i64)
        .execute(&self.pool)
        .await
        .map_err(|e| OracleError::Store(e.to_string()))?;
        Ok(())
    }

    async fn record_transaction(&self, feed_id: FeedId, tx_hash: &str, kind: &str) -> OracleResult<()> {
        sqlx::query("INSERT INTO transactions (feed_id, tx_hash, kind) VALUES ($1, $2, $3)")
            .bind(feed_id.0)
            .bind(tx_hash)
            .bind(kind)
            .execute(&self.pool)
            .await
            .map_err(|e| OracleError::Store(e.to_string()))?;
        Ok(())
    }

    async fn record_operational_error(&self, record: OperationalErrorRecord) -> OracleResult<()> {
        sqlx::query(
            "INSERT INTO operational_errors (feed_id, category, message, occurred_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(record.feed_id.0)
        .bind(&record.category)
        .bind(&record.message)
        .bind(record.occurred_at)
        .execute(&self.pool)
        .await
        .map_err(|e| OracleError::Store(e.to_string()))?;
        Ok(())
    }

    async fn record_reward_distribution(&self, feed_id: FeedId, operator_pkh: &str, amount: i64) -> OracleResult<()> {
        sqlx::query(
            "INSERT INTO reward_distribution (feed_id, operator_pkh, amount) VALUES ($1, $2, $3)",
        )
        .bind(feed_id.0)
        .bind(operator_pkh)
        .bind(amount)
        .execute(&self.pool)
        .await
        .map_err(|e| OracleError::Store(e.to_string()))?;
        Ok(())
    }

    async fn cleanup_stale_rows(&self) -> OracleResult<u64> {
        let result = sqlx::query(
            "DELETE FROM rate_data_flow WHERE timestamp_ms < (extract(epoch from now()) * 1000 - 86400000)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| OracleError::Store(e.to_string()))?;
        Ok(result.rows_affected())
    }
}

/// In-memory double for tests and for composition before a database is
/// wired up.
#[derive(Default)]
pub struct InMemoryRateStore {
    providers: Mutex<HashMap<(FeedId, String, String), Uuid>>,
    quotes: Mutex<Vec<(FeedId, PriceQuote)>>,
    aggregated_rates: Mutex<Vec<AggregatedRate>>,
    operational_errors: Mutex<Vec<OperationalErrorRecord>>,
}

impl InMemoryRateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn quote_count(&self) -> usize {
        self.quotes.lock().unwrap().len()
    }

    pub fn aggregated_rate_count(&self) -> usize {
        self.aggregated_rates.lock().unwrap().len()
    }
}

#[async_trait]
impl RateStore for InMemoryRateStore {
    async fn ensure_provider(&self, feed_id: FeedId, name: &str, adapter_type: &str) -> OracleResult<Uuid> {
        let key = (feed_id, name.to_string(), adapter_type.to_string());
        let mut providers = self.providers.lock().unwrap();
        Ok(*providers.entry(key).or_insert_with(Uuid::new_v4))
    }

    async fn record_quote(&self, feed_id: FeedId, quote: &PriceQuote) -> OracleResult<()> {
        self.quotes.lock().unwrap().push((feed_id, quote.clone()));
        Ok(())
    }

    async fn record_aggregated_rate(&self, rate: &AggregatedRate) -> OracleResult<()> {
        self.aggregated_rates.lock().unwrap().push(rate.clone());
        Ok(())
    }

    async fn record_node_update(&self, _feed_id: FeedId, _tx_hash: &str, _new_rate_scaled: i64) -> OracleResult<()> {
        Ok(())
    }

    async fn record_aggregation(&self, _feed_id: FeedId, _tx_hash: &str, _participating_peers: usize) -> OracleResult<()> {
        Ok(())
    }

    async fn record_transaction(&self, _feed_id: FeedId, _tx_hash: &str, _kind: &str) -> OracleResult<()> {
        Ok(())
    }

    async fn record_operational_error(&self, record: OperationalErrorRecord) -> OracleResult<()> {
        self.operational_errors.lock().unwrap().push(record);
        Ok(())
    }

    async fn record_reward_distribution(&self, _feed_id: FeedId, _operator_pkh: &str, _amount: i64) -> OracleResult<()> {
        Ok(())
    }

    async fn cleanup_stale_rows(&self) -> OracleResult<u64> {
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PairType;
    use rust_decimal::Decimal;

    fn sample_quote() -> PriceQuote {
        PriceQuote {
            source_name: "binance".into(),
            source_id: None,
            price: Decimal::new(100, 0),
            timestamp_ms: 0,
            bid: None,
            ask: None,
            volume: None,
            pair_type: PairType::Base,
            raw: None,
        }
    }

    #[tokio::test]
    async fn ensure_provider_is_idempotent_for_the_same_key() {
        let store = InMemoryRateStore::new();
        let feed_id = FeedId::for_address("addr1");
        let first = store.ensure_provider(feed_id, "binance", "ccxt").await.unwrap();
        let second = store.ensure_provider(feed_id, "binance", "ccxt").await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn record_quote_accumulates() {
        let store = InMemoryRateStore::new();
        let feed_id = FeedId::for_address("addr1");
        store.record_quote(feed_id, &sample_quote()).await.unwrap();
        store.record_quote(feed_id, &sample_quote()).await.unwrap();
        assert_eq!(store.quote_count(), 2);
    }
}
