//! Indicator engine: apply indicator parameters to a series.
//!
//! Every operation takes a series by reference and returns a new series with
//! one more column. The input is never modified, so a series handed out by
//! the cache can be extended by any number of callers independently.

use super::macd::macd_line_of_series;
use super::params::IndicatorParams;
use super::sma::sma_of_series;
use crate::domain::{IndicatorSeries, SeriesError};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum IndicatorError {
    #[error("column '{column}' not found")]
    ColumnNotFound { column: String },

    #[error("invalid indicator parameter: {0}")]
    InvalidParameter(String),

    #[error(transparent)]
    Series(#[from] SeriesError),
}

/// Compute the raw values for `params` against `series`.
///
/// The result has one value per row of `series`. A series shorter than the
/// indicator's window yields an all-NaN column rather than an error.
pub fn compute(
    series: &IndicatorSeries,
    params: &IndicatorParams,
) -> Result<Vec<f64>, IndicatorError> {
    params.validate()?;
    let values = match params {
        IndicatorParams::MovingAverage { window } => {
            sma_of_series(&series.prices().closes(), *window)
        }
        IndicatorParams::MacdLine { fast, slow, .. } => {
            macd_line_of_series(&series.prices().closes(), *fast, *slow)
        }
        IndicatorParams::MovingAverageOf { source, window } => {
            let input = series
                .column(source)
                .ok_or_else(|| IndicatorError::ColumnNotFound {
                    column: source.clone(),
                })?;
            sma_of_series(input, *window)
        }
    };
    Ok(values)
}

/// Return a new series with the column described by `params` appended.
pub fn apply(
    series: &IndicatorSeries,
    params: &IndicatorParams,
) -> Result<IndicatorSeries, IndicatorError> {
    let values = compute(series, params)?;
    if series.len() <= params.lookback() {
        tracing::debug!(
            symbol = series.symbol(),
            column = %params,
            rows = series.len(),
            "series shorter than indicator window; column is undefined"
        );
    }
    Ok(series.with_column(params.column_name(), Arc::from(values))?)
}

/// Append `sma_{window}`: simple moving average of close.
pub fn moving_average(
    series: &IndicatorSeries,
    window: usize,
) -> Result<IndicatorSeries, IndicatorError> {
    apply(series, &IndicatorParams::MovingAverage { window })
}

/// Append `macd_{fast}_{slow}_{signal}`: fast EMA minus slow EMA of close.
pub fn macd_line(
    series: &IndicatorSeries,
    fast: usize,
    slow: usize,
    signal: usize,
) -> Result<IndicatorSeries, IndicatorError> {
    apply(series, &IndicatorParams::MacdLine { fast, slow, signal })
}

/// Append `{source}_sma_{window}`: simple moving average of an existing column.
pub fn moving_average_of_column(
    series: &IndicatorSeries,
    source: &str,
    window: usize,
) -> Result<IndicatorSeries, IndicatorError> {
    apply(
        series,
        &IndicatorParams::MovingAverageOf {
            source: source.to_string(),
            window,
        },
    )
}
