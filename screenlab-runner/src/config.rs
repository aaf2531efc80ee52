//! Serializable screening configuration.

use screenlab_core::condition::{Comparison, Condition};
use screenlab_core::domain::{Interval, Period};
use screenlab_core::indicators::{IndicatorError, IndicatorParams};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("serialize config: {0}")]
    Serialize(String),

    #[error("invalid config: {0}")]
    Invalid(#[from] IndicatorError),
}

/// One MACD line, optionally followed by a moving average of that line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacdSpec {
    pub fast: usize,
    pub slow: usize,
    pub signal: usize,
    /// Window of the SMA applied to the MACD line (`macd_{f}_{s}_{sig}_sma_{smooth}`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub smooth: Option<usize>,
}

/// Moving average of an already-declared column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmoothingSpec {
    pub source: String,
    pub window: usize,
}

/// Which history to fetch and which columns to derive from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndicatorSpec {
    #[serde(default = "default_period")]
    pub period: Period,
    #[serde(default = "default_interval")]
    pub interval: Interval,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub moving_averages: Vec<usize>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub macd: Vec<MacdSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub smoothing: Vec<SmoothingSpec>,
}

fn default_period() -> Period {
    Period::Months(6)
}

fn default_interval() -> Interval {
    Interval::OneDay
}

/// A column the pipeline will compute, in dependency order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedColumn {
    pub params: IndicatorParams,
    pub name: String,
    /// Bars of history needed before the column has a defined value.
    pub required_bars: usize,
}

impl IndicatorSpec {
    /// Empty spec: no derived columns.
    pub fn new(period: Period, interval: Interval) -> Self {
        Self {
            period,
            interval,
            moving_averages: Vec::new(),
            macd: Vec::new(),
            smoothing: Vec::new(),
        }
    }

    pub fn with_moving_average(mut self, window: usize) -> Self {
        self.moving_averages.push(window);
        self
    }

    pub fn with_macd(mut self, fast: usize, slow: usize, signal: usize) -> Self {
        self.macd.push(MacdSpec {
            fast,
            slow,
            signal,
            smooth: None,
        });
        self
    }

    pub fn with_smoothed_macd(
        mut self,
        fast: usize,
        slow: usize,
        signal: usize,
        smooth: usize,
    ) -> Self {
        self.macd.push(MacdSpec {
            fast,
            slow,
            signal,
            smooth: Some(smooth),
        });
        self
    }

    pub fn with_smoothing(mut self, source: impl Into<String>, window: usize) -> Self {
        self.smoothing.push(SmoothingSpec {
            source: source.into(),
            window,
        });
        self
    }

    /// Resolve the declared indicators into an ordered, de-duplicated column list.
    ///
    /// Every parameter set is validated, and every smoothing source must be a
    /// column declared earlier in the spec. Declaring the same column twice is
    /// not an error; it is computed once.
    pub fn plan(&self) -> Result<Vec<PlannedColumn>, IndicatorError> {
        let mut params = Vec::new();
        params.extend(
            self.moving_averages
                .iter()
                .map(|&window| IndicatorParams::MovingAverage { window }),
        );
        for m in &self.macd {
            let line = IndicatorParams::MacdLine {
                fast: m.fast,
                slow: m.slow,
                signal: m.signal,
            };
            if let Some(window) = m.smooth {
                let source = line.column_name();
                params.push(line);
                params.push(IndicatorParams::MovingAverageOf { source, window });
            } else {
                params.push(line);
            }
        }
        params.extend(self.smoothing.iter().map(|s| IndicatorParams::MovingAverageOf {
            source: s.source.clone(),
            window: s.window,
        }));

        let mut required: HashMap<String, usize> = HashMap::new();
        let mut plan = Vec::with_capacity(params.len());
        for p in params {
            p.validate()?;
            let name = p.column_name();
            if required.contains_key(&name) {
                continue;
            }
            let required_bars = match p.source() {
                Some(source) => {
                    let base = required.get(source).copied().ok_or_else(|| {
                        IndicatorError::ColumnNotFound {
                            column: source.to_string(),
                        }
                    })?;
                    base + p.lookback()
                }
                None => p.required_bars(),
            };
            required.insert(name.clone(), required_bars);
            plan.push(PlannedColumn {
                params: p,
                name,
                required_bars,
            });
        }
        Ok(plan)
    }

    /// Plan the columns and check that `condition` only references them.
    pub fn plan_for(&self, condition: &Condition) -> Result<Vec<PlannedColumn>, IndicatorError> {
        let plan = self.plan()?;
        for column in condition.columns() {
            if !plan.iter().any(|c| c.name == column) {
                return Err(IndicatorError::ColumnNotFound {
                    column: column.to_string(),
                });
            }
        }
        Ok(plan)
    }
}

impl Default for IndicatorSpec {
    /// Six months of daily bars with the classic 12/26/9 MACD line.
    fn default() -> Self {
        Self::new(default_period(), default_interval()).with_macd(12, 26, 9)
    }
}

/// Complete configuration of a screening run.
///
/// Missing keys take their values from `ScreenConfig::default()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenConfig {
    /// Worker threads; 1 screens sequentially.
    pub threads: usize,

    pub condition: Condition,

    pub indicators: IndicatorSpec,
}

impl Default for ScreenConfig {
    fn default() -> Self {
        Self {
            threads: 1,
            condition: Condition::default().and(Comparison::close_above("macd_12_26_9")),
            indicators: IndicatorSpec::default(),
        }
    }
}

impl ScreenConfig {
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        Self::from_toml(&std::fs::read_to_string(path)?)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))
    }

    /// Check indicator parameters and that the condition only uses declared columns.
    pub fn validate(&self) -> Result<Vec<PlannedColumn>, ConfigError> {
        Ok(self.indicators.plan_for(&self.condition)?)
    }

    /// Deterministic BLAKE3 hash of this configuration.
    ///
    /// Two configs with the same content hash equal regardless of how their
    /// TOML was laid out.
    pub fn config_hash(&self) -> Result<String, ConfigError> {
        let json =
            serde_json::to_string(self).map_err(|e| ConfigError::Serialize(e.to_string()))?;
        Ok(blake3::hash(json.as_bytes()).to_hex().to_string())
    }
}
