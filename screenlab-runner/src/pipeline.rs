//! Screening pipeline: fetch → indicators → condition → sector grouping.
//!
//! Each symbol is processed independently. A symbol whose data cannot be
//! obtained is skipped with a diagnostic and never aborts the run; only
//! configuration errors (unknown columns, invalid parameters) fail `screen`.
//! Fetches and indicator columns go through a shared `ScreeningCache`, so a
//! second run over the same universe does no recomputation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use screenlab_core::cache::{FetchKey, Fetched, ScreeningCache};
use screenlab_core::condition::{evaluate, Condition, ConditionError};
use screenlab_core::data::{DataError, PriceSource, UniverseEntry, UniverseSource};
use screenlab_core::domain::IndicatorSeries;
use screenlab_core::indicators::{compute, IndicatorError};

use crate::config::{IndicatorSpec, PlannedColumn};
use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::result::ScreeningResult;

#[derive(Debug, Error)]
pub enum ScreenError {
    #[error(transparent)]
    Indicator(#[from] IndicatorError),

    #[error("list universe: {0}")]
    Universe(DataError),

    #[error("{symbol}: {source}")]
    Data { symbol: String, source: DataError },

    #[error("thread pool: {0}")]
    ThreadPool(String),
}

/// What happened to one symbol.
#[derive(Debug, Clone, PartialEq)]
pub enum SymbolOutcome {
    /// The condition was evaluated. `notes` holds non-fatal diagnostics.
    Evaluated { passed: bool, notes: Vec<Diagnostic> },
    /// The symbol could not be evaluated.
    Skipped(Diagnostic),
}

/// Everything a screening run produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenReport {
    pub result: ScreeningResult,
    /// Per-symbol diagnostics in universe order.
    pub diagnostics: Vec<Diagnostic>,
    pub evaluated: usize,
    pub passed: usize,
    pub skipped: usize,
    /// True when the run stopped early on request.
    #[serde(default)]
    pub cancelled: bool,
    /// BLAKE3 digest of `result`.
    pub fingerprint: String,
}

impl ScreenReport {
    fn from_outcomes(outcomes: Vec<(UniverseEntry, SymbolOutcome)>, cancelled: bool) -> Self {
        let mut result = ScreeningResult::new();
        let mut diagnostics = Vec::new();
        let (mut evaluated, mut passed, mut skipped) = (0, 0, 0);

        for (entry, outcome) in outcomes {
            match outcome {
                SymbolOutcome::Evaluated { passed: ok, notes } => {
                    evaluated += 1;
                    if ok {
                        passed += 1;
                        let sector = entry.sector_label().to_string();
                        result.insert(sector, entry.symbol);
                    }
                    diagnostics.extend(notes);
                }
                SymbolOutcome::Skipped(diagnostic) => {
                    skipped += 1;
                    diagnostics.push(diagnostic);
                }
            }
        }

        let fingerprint = result.fingerprint();
        Self {
            result,
            diagnostics,
            evaluated,
            passed,
            skipped,
            cancelled,
            fingerprint,
        }
    }

    /// Diagnostics of a given kind.
    pub fn diagnostics_of(&self, kind: DiagnosticKind) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(move |d| d.kind == kind)
    }
}

/// Runs screens against a price source through a shared cache.
pub struct Screener {
    source: Arc<dyn PriceSource>,
    cache: Arc<ScreeningCache>,
    pool: Option<rayon::ThreadPool>,
}

impl Screener {
    /// Sequential screener with a fresh cache.
    pub fn new(source: Arc<dyn PriceSource>) -> Self {
        Self::with_cache(source, Arc::new(ScreeningCache::new()))
    }

    /// Sequential screener sharing an existing cache.
    pub fn with_cache(source: Arc<dyn PriceSource>, cache: Arc<ScreeningCache>) -> Self {
        Self {
            source,
            cache,
            pool: None,
        }
    }

    /// Process symbols on a dedicated pool of `threads` workers.
    ///
    /// `threads <= 1` keeps the screener sequential.
    pub fn with_threads(mut self, threads: usize) -> Result<Self, ScreenError> {
        self.pool = if threads > 1 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .thread_name(|i| format!("screen-{i}"))
                .build()
                .map_err(|e| ScreenError::ThreadPool(e.to_string()))?;
            Some(pool)
        } else {
            None
        };
        Ok(self)
    }

    pub fn cache(&self) -> &Arc<ScreeningCache> {
        &self.cache
    }

    pub fn source(&self) -> &dyn PriceSource {
        self.source.as_ref()
    }

    /// Screen every symbol of `universe` and group the passing ones by sector.
    pub fn screen(
        &self,
        universe: &dyn UniverseSource,
        spec: &IndicatorSpec,
        condition: &Condition,
    ) -> Result<ScreenReport, ScreenError> {
        self.screen_with_cancel(universe, spec, condition, &AtomicBool::new(false))
    }

    /// Like `screen`, but checks `cancel` before each symbol.
    ///
    /// A cancelled run returns the symbols finished so far with
    /// `cancelled = true`; symbols never started get no diagnostic.
    pub fn screen_with_cancel(
        &self,
        universe: &dyn UniverseSource,
        spec: &IndicatorSpec,
        condition: &Condition,
        cancel: &AtomicBool,
    ) -> Result<ScreenReport, ScreenError> {
        let plan = spec.plan_for(condition)?;
        let entries = universe.list().map_err(ScreenError::Universe)?;
        let started = Instant::now();
        tracing::info!(
            symbols = entries.len(),
            columns = plan.len(),
            condition = %condition,
            source = self.source.name(),
            "screening started"
        );

        let run = |entry: &UniverseEntry| -> Option<SymbolOutcome> {
            if cancel.load(Ordering::Relaxed) {
                return None;
            }
            Some(self.screen_symbol(entry, spec, &plan, condition))
        };

        // Outcomes stay in universe order in both modes
        let outcomes: Vec<Option<SymbolOutcome>> = match &self.pool {
            Some(pool) => pool.install(|| entries.par_iter().map(run).collect()),
            None => {
                let mut outcomes = Vec::with_capacity(entries.len());
                for entry in &entries {
                    match run(entry) {
                        Some(outcome) => outcomes.push(Some(outcome)),
                        None => break,
                    }
                }
                outcomes
            }
        };

        let cancelled = cancel.load(Ordering::Relaxed) || outcomes.len() < entries.len();
        let finished: Vec<(UniverseEntry, SymbolOutcome)> = entries
            .into_iter()
            .zip(outcomes)
            .filter_map(|(entry, outcome)| outcome.map(|o| (entry, o)))
            .collect();

        let report = ScreenReport::from_outcomes(finished, cancelled);
        tracing::info!(
            evaluated = report.evaluated,
            passed = report.passed,
            skipped = report.skipped,
            cancelled = report.cancelled,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "screening finished"
        );
        Ok(report)
    }

    /// Full indicator series of one symbol, for charting.
    ///
    /// Uses the same cache as `screen`, so charting a symbol that was just
    /// screened does not refetch or recompute anything.
    pub fn series_for(
        &self,
        symbol: &str,
        spec: &IndicatorSpec,
    ) -> Result<IndicatorSeries, ScreenError> {
        let plan = spec.plan()?;
        let fetched = self.fetch(symbol, spec).map_err(|source| ScreenError::Data {
            symbol: symbol.to_string(),
            source,
        })?;
        Ok(self.build_series(&fetched, &plan)?)
    }

    fn fetch(&self, symbol: &str, spec: &IndicatorSpec) -> Result<Fetched, DataError> {
        let key = FetchKey::new(symbol, spec.period, spec.interval);
        self.cache.fetch_or_compute(key, || {
            tracing::debug!(symbol, period = %spec.period, interval = %spec.interval, "fetching");
            self.source.fetch(symbol, spec.period, spec.interval)
        })
    }

    fn build_series(
        &self,
        fetched: &Fetched,
        plan: &[PlannedColumn],
    ) -> Result<IndicatorSeries, IndicatorError> {
        let mut series = IndicatorSeries::new(Arc::clone(&fetched.series));
        for column in plan {
            let values = self
                .cache
                .column_or_compute(fetched, &column.params, || compute(&series, &column.params))?;
            series = series.with_column(column.name.clone(), values)?;
        }
        Ok(series)
    }

    fn screen_symbol(
        &self,
        entry: &UniverseEntry,
        spec: &IndicatorSpec,
        plan: &[PlannedColumn],
        condition: &Condition,
    ) -> SymbolOutcome {
        let symbol = entry.symbol.as_str();

        let fetched = match self.fetch(symbol, spec) {
            Ok(fetched) => fetched,
            Err(e) => {
                let diagnostic = Diagnostic::from_data_error(entry, &e);
                tracing::warn!(symbol, error = %e, "skipping symbol");
                return SymbolOutcome::Skipped(diagnostic);
            }
        };

        let bars = fetched.series.len();
        let series = match self.build_series(&fetched, plan) {
            Ok(series) => series,
            Err(e) => {
                tracing::warn!(symbol, error = %e, "skipping symbol");
                return SymbolOutcome::Skipped(Diagnostic::new(
                    entry,
                    DiagnosticKind::InvalidSeries,
                    e.to_string(),
                ));
            }
        };

        match evaluate(&series, condition) {
            Ok(passed) => {
                let notes: Vec<Diagnostic> = if bars == 0 {
                    Vec::new()
                } else {
                    plan.iter()
                        .filter(|c| bars < c.required_bars)
                        .map(|c| Diagnostic::insufficient(entry, &c.name, bars, c.required_bars))
                        .collect()
                };
                tracing::debug!(symbol, bars, passed, "evaluated");
                SymbolOutcome::Evaluated { passed, notes }
            }
            Err(ConditionError::EmptySeries { .. }) => {
                tracing::warn!(symbol, "skipping symbol with empty series");
                SymbolOutcome::Skipped(Diagnostic::empty(entry))
            }
            Err(e) => SymbolOutcome::Skipped(Diagnostic::new(
                entry,
                DiagnosticKind::InvalidSeries,
                e.to_string(),
            )),
        }
    }
}
