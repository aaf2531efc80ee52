//! MACD line.
//!
//! MACD[t] = EMA_fast(close)[t] - EMA_slow(close)[t]
//! Lookback: slow - 1. Only the line is produced here; a signal-style
//! reference is obtained by smoothing the line with an SMA.

use super::ema::ema_of_series;

/// Column name for a MACD configuration, e.g. `macd_12_26_9`.
pub fn macd_column_name(fast: usize, slow: usize, signal: usize) -> String {
    format!("macd_{fast}_{slow}_{signal}")
}

/// Fast EMA minus slow EMA of `values`.
pub fn macd_line_of_series(values: &[f64], fast: usize, slow: usize) -> Vec<f64> {
    let fast_ema = ema_of_series(values, fast);
    let slow_ema = ema_of_series(values, slow);
    fast_ema
        .iter()
        .zip(&slow_ema)
        .map(|(f, s)| f - s)
        .collect()
}
