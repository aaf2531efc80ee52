//! Indicator parameters.
//!
//! `IndicatorParams` is the hashable description of one indicator column. It
//! names the column deterministically, so distinct configurations never
//! collide on the same series, and it doubles as part of the cache key.

use super::engine::IndicatorError;
use super::macd::macd_column_name;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IndicatorParams {
    /// SMA of close over `window` bars.
    MovingAverage { window: usize },

    /// EMA(fast) - EMA(slow) of close. `signal` is carried for naming only.
    MacdLine {
        fast: usize,
        slow: usize,
        signal: usize,
    },

    /// SMA of an existing column over `window` rows.
    MovingAverageOf { source: String, window: usize },
}

impl IndicatorParams {
    /// Name of the column this indicator produces.
    pub fn column_name(&self) -> String {
        match self {
            IndicatorParams::MovingAverage { window } => format!("sma_{window}"),
            IndicatorParams::MacdLine { fast, slow, signal } => {
                macd_column_name(*fast, *slow, *signal)
            }
            IndicatorParams::MovingAverageOf { source, window } => {
                format!("{source}_sma_{window}")
            }
        }
    }

    /// Leading rows this indicator leaves undefined on top of its input.
    ///
    /// For `MovingAverageOf` the source column's own warm-up comes on top.
    pub fn lookback(&self) -> usize {
        match self {
            IndicatorParams::MovingAverage { window } => window.saturating_sub(1),
            IndicatorParams::MacdLine { slow, .. } => slow.saturating_sub(1),
            IndicatorParams::MovingAverageOf { window, .. } => window.saturating_sub(1),
        }
    }

    /// Rows of input needed before the first defined value.
    pub fn required_bars(&self) -> usize {
        self.lookback() + 1
    }

    /// Column this indicator reads, if it is not computed from close.
    pub fn source(&self) -> Option<&str> {
        match self {
            IndicatorParams::MovingAverageOf { source, .. } => Some(source.as_str()),
            _ => None,
        }
    }

    /// Reject parameter combinations that cannot produce a meaningful column.
    pub fn validate(&self) -> Result<(), IndicatorError> {
        match self {
            IndicatorParams::MovingAverage { window }
            | IndicatorParams::MovingAverageOf { window, .. }
                if *window == 0 =>
            {
                Err(IndicatorError::InvalidParameter(format!(
                    "{}: window must be >= 1",
                    self.column_name()
                )))
            }
            IndicatorParams::MacdLine { fast, slow, signal } => {
                if *fast == 0 || *slow == 0 || *signal == 0 {
                    return Err(IndicatorError::InvalidParameter(format!(
                        "{}: MACD windows must be >= 1",
                        self.column_name()
                    )));
                }
                if fast >= slow {
                    return Err(IndicatorError::InvalidParameter(format!(
                        "{}: fast window ({fast}) must be shorter than slow window ({slow})",
                        self.column_name()
                    )));
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

impl fmt::Display for IndicatorParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.column_name())
    }
}
