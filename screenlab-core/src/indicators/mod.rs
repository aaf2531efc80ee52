//! Indicator computation.
//!
//! Indicators are pure functions from a series to a numeric column of the
//! same length. The first `lookback` values of a column are `f64::NAN`
//! (warm-up), and NaN in the input propagates to every output it touches.

pub mod ema;
pub mod engine;
pub mod macd;
pub mod params;
pub mod sma;

pub use engine::{
    apply, compute, macd_line, moving_average, moving_average_of_column, IndicatorError,
};
pub use params::IndicatorParams;

/// Create a synthetic indicator series from close prices for testing.
///
/// Generates plausible OHLV: open = prev_close (or close for first bar),
/// high = max(open,close) + 1.0, low = min(open,close) - 1.0, volume = 1000.
#[cfg(test)]
pub fn make_series(closes: &[f64]) -> crate::domain::IndicatorSeries {
    use crate::domain::{IndicatorSeries, PriceBar, PriceSeries};
    use chrono::TimeZone;
    let base = chrono::Utc.with_ymd_and_hms(2024, 1, 2, 21, 0, 0).unwrap();
    let bars = closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            PriceBar {
                timestamp: base + chrono::Duration::days(i as i64),
                open,
                high: open.max(close) + 1.0,
                low: open.min(close) - 1.0,
                close,
                volume: 1000,
            }
        })
        .collect();
    IndicatorSeries::new(std::sync::Arc::new(PriceSeries::new("TEST", bars).unwrap()))
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
