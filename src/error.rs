//! Error taxonomy for the node-operation engine.
//!
//! Every failure the engine can produce is caught at the tick boundary by the
//! scheduler (`scheduler.rs`) so the run loop itself is infallible. Variants
//! map onto the six categories from the error-handling design: transient
//! source errors, no-data, chain-read, chain-submit, configuration, and
//! internal/fatal.

use thiserror::Error;

/// Engine-wide error type.
#[derive(Error, Debug)]
pub enum OracleError {
    /// One adapter/source failed (HTTP error, timeout, decode failure).
    /// Recovered locally by the adapter: the quote is dropped, the tick
    /// continues.
    #[error("transient source error from {source}: {reason}")]
    TransientSource { source: String, reason: String },

    /// All sources in a pair-type (base or quote) yielded zero valid quotes.
    #[error("no valid data for {pair_type} pair")]
    NoData { pair_type: String },

    /// A UTxO fetch failed or a required datum was missing/undecodable.
    #[error("chain read error: {reason}")]
    ChainRead { reason: String },

    /// A transaction was rejected or lost in flight.
    #[error("chain submit error: {reason}")]
    ChainSubmit { reason: String },

    /// Caught at startup by the validators; always fatal.
    #[error("configuration error: {message}")]
    Configuration { message: String },

    #[error("aggregation failed: {reason}")]
    Aggregation { reason: String },

    #[error("persistence error: {0}")]
    Store(String),

    #[error("http client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("timeout waiting for {operation}")]
    Timeout { operation: String },

    /// Unexpected failure with no dedicated category. Logged with full
    /// context to the operational-error store; the tick aborts but the
    /// scheduler keeps running.
    #[error("internal error: {0}")]
    Internal(String),
}

impl OracleError {
    /// Category prefix used in log lines, per the propagation policy in the
    /// error-handling design (every failure is logged with a category
    /// prefix).
    pub fn category(&self) -> &'static str {
        match self {
            OracleError::TransientSource { .. } => "transient-source",
            OracleError::NoData { .. } => "no-data",
            OracleError::ChainRead { .. } => "chain-read",
            OracleError::ChainSubmit { .. } => "chain-submit",
            OracleError::Configuration { .. } => "configuration",
            OracleError::Aggregation { .. } => "aggregation",
            OracleError::Store(_) => "store",
            OracleError::HttpClient(_) => "transient-source",
            OracleError::Serialization(_) => "internal",
            OracleError::Timeout { .. } => "chain-submit",
            OracleError::Internal(_) => "internal",
        }
    }

    /// Whether the startup validators should treat this as fatal.
    pub fn is_fatal(&self) -> bool {
        matches!(self, OracleError::Configuration { .. })
    }
}

pub type OracleResult<T> = Result<T, OracleError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_prefixes_match_taxonomy() {
        assert_eq!(
            OracleError::NoData {
                pair_type: "base".into()
            }
            .category(),
            "no-data"
        );
        assert_eq!(
            OracleError::Configuration {
                message: "x".into()
            }
            .category(),
            "configuration"
        );
    }

    #[test]
    fn only_configuration_errors_are_fatal() {
        assert!(
            OracleError::Configuration {
                message: "bad".into()
            }
            .is_fatal()
        );
        assert!(!OracleError::ChainRead { reason: "x".into() }.is_fatal());
        assert!(!OracleError::Internal("x".into()).is_fatal());
    }

    #[test]
    fn display_includes_context() {
        let err = OracleError::TransientSource {
            source: "binance".into(),
            reason: "HTTP 503".into(),
        };
        assert!(err.to_string().contains("binance"));
        assert!(err.to_string().contains("503"));
    }
}
