//! Screenlab Runner: screening pipeline, configuration, diagnostics, export.
//!
//! This crate builds on `screenlab-core` to provide:
//! - `ScreenConfig` / `IndicatorSpec` loaded from TOML
//! - The screening pipeline with per-symbol fault isolation and caching
//! - Sector-grouped results with deterministic fingerprints
//! - JSON and CSV export of reports and indicator series

pub mod config;
pub mod diagnostics;
pub mod export;
pub mod pipeline;
pub mod result;

pub use config::{ConfigError, IndicatorSpec, MacdSpec, PlannedColumn, ScreenConfig, SmoothingSpec};
pub use diagnostics::{Diagnostic, DiagnosticKind};
pub use pipeline::{ScreenError, ScreenReport, Screener, SymbolOutcome};
pub use result::ScreeningResult;
