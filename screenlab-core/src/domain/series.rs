//! Price and indicator series.
//!
//! `PriceSeries` is an immutable, strictly time-ordered run of bars for one
//! symbol. `IndicatorSeries` layers named numeric columns on top of a shared
//! `PriceSeries`. Adding a column returns a new value; bars and existing
//! columns are shared through `Arc`, never copied or mutated.

use super::bar::PriceBar;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum SeriesError {
    #[error("timestamps for '{symbol}' are not strictly increasing at row {row}")]
    NotIncreasing { symbol: String, row: usize },

    #[error("column '{name}' has {actual} values but the series has {expected} rows")]
    LengthMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },
}

/// Ordered bars for one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    symbol: String,
    bars: Vec<PriceBar>,
}

impl PriceSeries {
    /// Build a series, rejecting duplicate or out-of-order timestamps.
    pub fn new(symbol: impl Into<String>, bars: Vec<PriceBar>) -> Result<Self, SeriesError> {
        let symbol = symbol.into();
        if let Some(row) = bars
            .windows(2)
            .position(|w| w[1].timestamp <= w[0].timestamp)
        {
            return Err(SeriesError::NotIncreasing {
                symbol,
                row: row + 1,
            });
        }
        Ok(Self { symbol, bars })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn last(&self) -> Option<&PriceBar> {
        self.bars.last()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }
}

/// A price series plus named indicator columns aligned row-for-row.
///
/// Undefined values (warm-up, missing data) are `f64::NAN` in the raw column
/// and `None` through [`IndicatorSeries::value`].
#[derive(Debug, Clone)]
pub struct IndicatorSeries {
    prices: Arc<PriceSeries>,
    columns: BTreeMap<String, Arc<[f64]>>,
}

impl IndicatorSeries {
    pub fn new(prices: Arc<PriceSeries>) -> Self {
        Self {
            prices,
            columns: BTreeMap::new(),
        }
    }

    pub fn prices(&self) -> &PriceSeries {
        &self.prices
    }

    pub fn shared_prices(&self) -> Arc<PriceSeries> {
        Arc::clone(&self.prices)
    }

    pub fn symbol(&self) -> &str {
        self.prices.symbol()
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    /// Index of the most recent row.
    pub fn last_row(&self) -> Option<usize> {
        self.len().checked_sub(1)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    /// Raw column values, NaN included.
    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns.get(name).map(|v| v.as_ref())
    }

    /// Shared handle to a column, for caching.
    pub fn shared_column(&self, name: &str) -> Option<Arc<[f64]>> {
        self.columns.get(name).cloned()
    }

    /// Column names in sorted order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(|k| k.as_str())
    }

    /// Defined value of a column at a row; `None` if the column is missing,
    /// the row is out of range, or the value is undefined.
    pub fn value(&self, name: &str, row: usize) -> Option<f64> {
        self.columns
            .get(name)
            .and_then(|v| v.get(row).copied())
            .filter(|v| !v.is_nan())
    }

    /// Number of leading undefined rows in a column.
    pub fn warmup(&self, name: &str) -> Option<usize> {
        self.columns
            .get(name)
            .map(|v| v.iter().take_while(|x| x.is_nan()).count())
    }

    /// Return a new series with `name` set to `values`.
    ///
    /// An existing column of the same name is replaced in the returned value
    /// only; `self` is untouched.
    pub fn with_column(
        &self,
        name: impl Into<String>,
        values: Arc<[f64]>,
    ) -> Result<Self, SeriesError> {
        let name = name.into();
        if values.len() != self.len() {
            return Err(SeriesError::LengthMismatch {
                name,
                expected: self.len(),
                actual: values.len(),
            });
        }
        let mut columns = self.columns.clone();
        columns.insert(name, values);
        Ok(Self {
            prices: Arc::clone(&self.prices),
            columns,
        })
    }
}
