//! Rate Aggregator (§4.B): reduces a quote-then-base pair of adapter fan-outs
//! into a single `AggregatedRate`, grounded step-for-step on
//! `original_source/backend/api/aggregated_coin_rate.py::AggregatedCoinRate`.
//!
//! Quote conversion runs first (if configured), its result is threaded into
//! the base fetch for any base source with `quote_required = true`, and the
//! reduction itself is the statistical median with ties broken to the lower
//! element — distinct from the Consensus Engine's on-chain median convention
//! in `consensus.rs`, which this module does not share logic with.

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{error, info, warn};

use crate::error::{OracleError, OracleResult};
use crate::models::{AdapterError, AggregatedRate, FeedId, PairType, PriceQuote};
use crate::providers::{QuoteCalcMethod, RateSource};

/// One adapter's resolved contribution after quote conversion, kept for
/// provenance regardless of whether the quote fed into the final median.
#[derive(Debug, Clone)]
pub struct ResolvedQuote {
    pub quote: PriceQuote,
    pub converted_price: Decimal,
}

pub struct RateAggregator {
    feed_id: FeedId,
}

impl RateAggregator {
    pub fn new(feed_id: FeedId) -> Self {
        Self { feed_id }
    }

    /// Fan out across `sources`, apply quote conversion where required, and
    /// reduce to a single aggregated rate. Mirrors
    /// `get_rate_from_providers`: an adapter that requires conversion but has
    /// no `quote_rate` available contributes nothing; a `quote_rate` present
    /// but unused by a given source is simply ignored.
    pub async fn get_rate_from_providers(
        &self,
        sources: &[std::sync::Arc<dyn RateSource>],
        quote_rate: Option<Decimal>,
    ) -> OracleResult<(Decimal, Vec<ResolvedQuote>, Vec<(String, AdapterError)>)> {
        let mut resolved = Vec::new();
        let mut failures = Vec::new();

        for source in sources {
            let response = source.get_rates().await;
            for quote in response.quotes {
                if !quote.is_valid() {
                    continue;
                }

                let converted_price = if source.quote_required() {
                    match quote_rate {
                        Some(rate) => match source.quote_calc_method() {
                            QuoteCalcMethod::Multiply => quote.price * rate,
                            QuoteCalcMethod::Divide => {
                                if rate.is_zero() {
                                    warn!(
                                        source = %quote.source_name,
                                        "quote rate is zero, skipping conversion"
                                    );
                                    failures.push((
                                        quote.source_name.clone(),
                                        AdapterError::Decode("quote rate is zero".into()),
                                    ));
                                    continue;
                                }
                                quote.price / rate
                            }
                        },
                        None => {
                            warn!(
                                source = %quote.source_name,
                                "adapter requires quote conversion but no quote rate was resolved"
                            );
                            failures.push((quote.source_name.clone(), AdapterError::UnsupportedPair));
                            continue;
                        }
                    }
                } else {
                    quote.price
                };

                if converted_price.is_sign_positive() && !converted_price.is_zero() {
                    resolved.push(ResolvedQuote {
                        quote,
                        converted_price,
                    });
                }
            }
            for (name, err) in response.failures {
                warn!(source = %name, error = %err, "source failed, isolated from the tick");
                failures.push((name, err));
            }
        }

        if resolved.is_empty() {
            return Err(OracleError::NoData {
                pair_type: "unknown".into(),
            });
        }

        let mut prices: Vec<Decimal> = resolved.iter().map(|r| r.converted_price).collect();
        let median = median_lower_tiebreak(&mut prices);

        Ok((median, resolved, failures))
    }

    /// Fetches the quote rate first (if any quote sources are configured),
    /// then the base rate with the quote rate threaded through, following
    /// `get_aggregated_rate`'s two-phase ordering. If quote fetching yields
    /// no valid rate and any base source requires one for conversion, the
    /// whole tick fails rather than silently falling back to the
    /// non-quote-required sources alone.
    pub async fn get_aggregated_rate(
        &self,
        quote_sources: &[std::sync::Arc<dyn RateSource>],
        base_sources: &[std::sync::Arc<dyn RateSource>],
    ) -> OracleResult<AggregatedRate> {
        let requested_at = Utc::now();

        let (quote_rate, mut failures) = if !quote_sources.is_empty() {
            match self.get_rate_from_providers(quote_sources, None).await {
                Ok((rate, _, quote_failures)) => (Some(rate), quote_failures),
                Err(err) => {
                    error!(error = %err, "no valid quote rates available");
                    (None, Vec::new())
                }
            }
        } else {
            (None, Vec::new())
        };

        if quote_rate.is_none() && base_sources.iter().any(|s| s.quote_required()) {
            return Err(OracleError::NoData {
                pair_type: PairType::Quote.to_string(),
            });
        }

        let (base_rate, contributing, base_failures) = self
            .get_rate_from_providers(base_sources, quote_rate)
            .await
            .map_err(|_| OracleError::NoData {
                pair_type: PairType::Base.to_string(),
            })?;
        failures.extend(base_failures);

        info!(rate = %base_rate, sources = contributing.len(), "aggregated rate calculated");

        Ok(AggregatedRate {
            value: base_rate,
            method: "median".into(),
            requested_at,
            computed_at: Utc::now(),
            contributing_quotes: contributing.into_iter().map(|r| r.quote).collect(),
            failures,
            feed_id: self.feed_id,
        })
    }
}

/// Statistical median; for an even-length list the lower of the two central
/// elements is returned (Open Question #1, decided in DESIGN.md: this
/// per-cycle local aggregation is intentionally distinct from the Consensus
/// Engine's on-chain median convention).
pub fn median_lower_tiebreak(values: &mut [Decimal]) -> Decimal {
    values.sort();
    let len = values.len();
    if len % 2 == 1 {
        values[len / 2]
    } else {
        values[len / 2 - 1]
    }
}
