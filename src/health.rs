//! Liveness/readiness surface for the node-operation engine. Unlike the
//! teacher's query-serving `HealthService`, there is no HTTP listener to
//! probe from the outside; this tracks the scheduler's own tick health so an
//! operator (or the Alert Supervisor) can ask "is this node actually
//! ticking" without parsing logs.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ServiceStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: ServiceStatus,
    pub last_successful_tick: Option<DateTime<Utc>>,
    pub consecutive_failures: u64,
    pub total_ticks: u64,
}

/// Tick-health tracker, updated by the scheduler after every tick and read
/// by an operator-facing status command or the Alert Supervisor.
#[derive(Default)]
pub struct HealthTracker {
    last_success_epoch_ms: AtomicI64,
    consecutive_failures: AtomicU64,
    total_ticks: AtomicU64,
}

/// Beyond this many consecutive failed ticks the node is considered
/// unhealthy rather than merely degraded.
const UNHEALTHY_FAILURE_THRESHOLD: u64 = 5;

impl HealthTracker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            last_success_epoch_ms: AtomicI64::new(0),
            consecutive_failures: AtomicU64::new(0),
            total_ticks: AtomicU64::new(0),
        })
    }

    pub fn record_success(&self, now_ms: i64) {
        self.last_success_epoch_ms.store(now_ms, Ordering::SeqCst);
        self.consecutive_failures.store(0, Ordering::SeqCst);
        self.total_ticks.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_failure(&self) {
        self.consecutive_failures.fetch_add(1, Ordering::SeqCst);
        self.total_ticks.fetch_add(1, Ordering::SeqCst);
    }

    pub fn status(&self) -> HealthStatus {
        let last_success_ms = self.last_success_epoch_ms.load(Ordering::SeqCst);
        let consecutive_failures = self.consecutive_failures.load(Ordering::SeqCst);
        let total_ticks = self.total_ticks.load(Ordering::SeqCst);

        let status = if consecutive_failures >= UNHEALTHY_FAILURE_THRESHOLD {
            ServiceStatus::Unhealthy
        } else if consecutive_failures > 0 {
            ServiceStatus::Degraded
        } else {
            ServiceStatus::Healthy
        };

        HealthStatus {
            status,
            last_successful_tick: if last_success_ms > 0 {
                DateTime::from_timestamp_millis(last_success_ms)
            } else {
                None
            },
            consecutive_failures,
            total_ticks,
        }
    }
}
