//! Price source trait and structured error types.
//!
//! The PriceSource trait abstracts over where price history comes from
//! (Yahoo Finance, synthetic data, test fixtures) so the screening pipeline
//! never depends on a particular provider.

use crate::domain::{Interval, Period, PriceSeries, SeriesError};
use thiserror::Error;

/// Why price or universe data could not be obtained.
///
/// The screening pipeline treats every variant the same way (skip the symbol
/// and record a diagnostic); the variants exist so the message says why.
#[derive(Debug, Clone, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("authentication required: {0}")]
    AuthenticationRequired(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("no data for '{symbol}' over {period} at {interval}")]
    NoData {
        symbol: String,
        period: Period,
        interval: Interval,
    },

    #[error("hard stop: data provider has blocked requests (circuit breaker tripped)")]
    CircuitBreakerTripped,

    #[error("invalid series: {0}")]
    InvalidSeries(#[from] SeriesError),

    #[error("data error: {0}")]
    Other(String),
}

/// Trait for price sources.
///
/// Implementations return a validated `PriceSeries` (strictly increasing
/// timestamps) or a `DataError`. Retry policy, if any, belongs here and not
/// in the pipeline. The cache sits above this trait; sources don't know about it.
pub trait PriceSource: Send + Sync {
    /// Human-readable name of this source.
    fn name(&self) -> &str;

    /// Fetch bars for `symbol` covering `period` at `interval`.
    fn fetch(
        &self,
        symbol: &str,
        period: Period,
        interval: Interval,
    ) -> Result<PriceSeries, DataError>;

    /// Check if the source is currently available (not rate-limited, not blocked).
    fn is_available(&self) -> bool {
        true
    }
}
