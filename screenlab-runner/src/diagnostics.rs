//! Per-symbol diagnostics collected during a screening run.

use screenlab_core::data::{DataError, UniverseEntry};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// The price source could not deliver a series.
    DataUnavailable,
    /// The source delivered bars that violate series invariants.
    InvalidSeries,
    /// Too little history for a declared column; the symbol was still evaluated.
    InsufficientData,
    /// The series had no rows, so no condition could be evaluated.
    EmptySeries,
}

impl DiagnosticKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticKind::DataUnavailable => "data_unavailable",
            DiagnosticKind::InvalidSeries => "invalid_series",
            DiagnosticKind::InsufficientData => "insufficient_data",
            DiagnosticKind::EmptySeries => "empty_series",
        }
    }

    /// Whether this kind kept the symbol from being evaluated.
    pub fn is_skip(&self) -> bool {
        !matches!(self, DiagnosticKind::InsufficientData)
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub symbol: String,
    pub sector: String,
    pub kind: DiagnosticKind,
    pub message: String,
}

impl Diagnostic {
    pub fn new(entry: &UniverseEntry, kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            symbol: entry.symbol.clone(),
            sector: entry.sector_label().to_string(),
            kind,
            message: message.into(),
        }
    }

    pub fn from_data_error(entry: &UniverseEntry, err: &DataError) -> Self {
        let kind = match err {
            DataError::InvalidSeries(_) => DiagnosticKind::InvalidSeries,
            _ => DiagnosticKind::DataUnavailable,
        };
        Self::new(entry, kind, err.to_string())
    }

    pub fn insufficient(entry: &UniverseEntry, column: &str, have: usize, need: usize) -> Self {
        Self::new(
            entry,
            DiagnosticKind::InsufficientData,
            format!("{column} needs {need} bars, series has {have}"),
        )
    }

    pub fn empty(entry: &UniverseEntry) -> Self {
        Self::new(entry, DiagnosticKind::EmptySeries, "price series has no rows")
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}] {}: {}", self.symbol, self.sector, self.kind, self.message)
    }
}
