//! Integration tests for the screening pipeline.
//!
//! Uses the deterministic synthetic source, with fixed close series where a
//! scenario needs an exact outcome. Tests: sector grouping, fault isolation,
//! idempotency, cache reuse, thread-count parity, configuration errors,
//! cancellation, and charting series.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use screenlab_core::condition::Condition;
use screenlab_core::data::{DataError, SyntheticSource, Universe, UniverseEntry, UniverseSource};
use screenlab_core::domain::{Interval, Period};
use screenlab_core::indicators::IndicatorError;
use screenlab_runner::export::{export_csv, series_csv};
use screenlab_runner::{DiagnosticKind, IndicatorSpec, ScreenConfig, ScreenError, Screener};

// ── Helpers ──────────────────────────────────────────────────────────

fn ramp(n: usize, start: f64, step: f64) -> Vec<f64> {
    (0..n).map(|i| start + i as f64 * step).collect()
}

fn daily_spec() -> IndicatorSpec {
    IndicatorSpec::new(Period::Months(6), Interval::OneDay).with_moving_average(20)
}

fn close_above_sma_20() -> Condition {
    "close > sma_20".parse().unwrap()
}

fn tech(symbols: &[&str]) -> Universe {
    Universe::new(
        symbols
            .iter()
            .map(|s| UniverseEntry::new(*s, Some("Tech")))
            .collect(),
    )
}

struct BrokenUniverse;

impl UniverseSource for BrokenUniverse {
    fn list(&self) -> Result<Vec<UniverseEntry>, DataError> {
        Err(DataError::NetworkUnreachable("constituents page".into()))
    }
}

// ── Sector grouping ──────────────────────────────────────────────────

#[test]
fn uptrend_passes_and_flat_fails() {
    let source = SyntheticSource::new()
        .with_closes("AAA", ramp(30, 100.0, 1.0))
        .with_closes("BBB", vec![50.0; 30]);
    let universe = Universe::new(vec![
        UniverseEntry::new("AAA", Some("Tech")),
        UniverseEntry::new("BBB", Some("Energy")),
    ]);
    let screener = Screener::new(Arc::new(source));

    let report = screener
        .screen(&universe, &daily_spec(), &close_above_sma_20())
        .unwrap();

    let rows: Vec<(&str, &str)> = report.result.rows().collect();
    assert_eq!(rows, vec![("Tech", "AAA")]);
    assert!(!report.result.contains("BBB"));
    assert!(report.result.symbols("Energy").is_none());
    assert_eq!((report.evaluated, report.passed, report.skipped), (2, 1, 0));
    assert!(report.diagnostics.is_empty());
    assert_eq!(export_csv(&report.result).unwrap(), "sector,symbol\nTech,AAA\n");
}

#[test]
fn symbols_are_grouped_under_their_sectors() {
    let source = SyntheticSource::new()
        .with_closes("AAA", ramp(60, 100.0, 1.0))
        .with_closes("CCC", ramp(60, 20.0, 0.5))
        .with_closes("ZZZ", ramp(60, 5.0, 0.1));
    let universe = Universe::new(vec![
        UniverseEntry::new("AAA", Some("Tech")),
        UniverseEntry::new("CCC", Some("Energy")),
        UniverseEntry::new("ZZZ", None),
    ]);

    let report = Screener::new(Arc::new(source))
        .screen(&universe, &daily_spec(), &close_above_sma_20())
        .unwrap();

    let rows: Vec<(&str, &str)> = report.result.rows().collect();
    assert_eq!(
        rows,
        vec![("Energy", "CCC"), ("Tech", "AAA"), ("Unknown", "ZZZ")]
    );
}

// ── Fault isolation ──────────────────────────────────────────────────

#[test]
fn single_failing_symbol_gives_empty_result_and_one_diagnostic() {
    let source = SyntheticSource::new().with_failure("BAD");
    let report = Screener::new(Arc::new(source))
        .screen(&tech(&["BAD"]), &daily_spec(), &close_above_sma_20())
        .unwrap();

    assert!(report.result.is_empty());
    assert_eq!(report.diagnostics.len(), 1);
    assert_eq!(report.diagnostics[0].symbol, "BAD");
    assert_eq!(report.diagnostics[0].kind, DiagnosticKind::DataUnavailable);
    assert_eq!(report.skipped, 1);
}

#[test]
fn one_failure_among_many_does_not_stop_the_run() {
    let symbols = ["S0", "S1", "S2", "S3", "S4", "S5", "S6", "S7"];
    let source = SyntheticSource::new().with_failure("S3");
    let report = Screener::new(Arc::new(source))
        .screen(&tech(&symbols), &daily_spec(), &close_above_sma_20())
        .unwrap();

    assert_eq!(report.evaluated, symbols.len() - 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.diagnostics.len(), 1);
    assert_eq!(report.diagnostics[0].symbol, "S3");
    assert!(!report.result.contains("S3"));
}

#[test]
fn diagnostics_follow_universe_order() {
    let source = SyntheticSource::new()
        .with_failure("ZZ")
        .with_failure("AA")
        .with_failure("MM");
    let report = Screener::new(Arc::new(source))
        .with_threads(3)
        .unwrap()
        .screen(&tech(&["ZZ", "AA", "OK", "MM"]), &daily_spec(), &close_above_sma_20())
        .unwrap();

    let order: Vec<&str> = report.diagnostics.iter().map(|d| d.symbol.as_str()).collect();
    assert_eq!(order, vec!["ZZ", "AA", "MM"]);
}

// ── Idempotency and caching ──────────────────────────────────────────

#[test]
fn repeated_screens_are_identical_and_reuse_the_cache() {
    let source = Arc::new(SyntheticSource::new());
    let screener = Screener::new(source.clone());
    let universe = Universe::default_us();
    let spec = daily_spec().with_macd(12, 26, 9);
    let cond: Condition = "close > sma_20 && close > macd_12_26_9".parse().unwrap();

    let first = screener.screen(&universe, &spec, &cond).unwrap();
    let fetches = source.fetch_count();
    let computations = screener.cache().column_stats().computations;
    assert_eq!(fetches, universe.len());

    let second = screener.screen(&universe, &spec, &cond).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.fingerprint, second.fingerprint);
    assert_eq!(source.fetch_count(), fetches, "second run must not refetch");
    assert_eq!(screener.cache().column_stats().computations, computations);
    assert!(screener.cache().column_stats().hits >= computations);
}

#[test]
fn failed_fetches_are_retried_on_the_next_run() {
    let source = Arc::new(SyntheticSource::new().with_failure("BAD"));
    let screener = Screener::new(source.clone());
    let universe = tech(&["BAD"]);

    screener.screen(&universe, &daily_spec(), &close_above_sma_20()).unwrap();
    screener.screen(&universe, &daily_spec(), &close_above_sma_20()).unwrap();

    assert_eq!(source.fetch_count(), 2);
    assert_eq!(screener.cache().prices_len(), 0);
}

#[test]
fn clearing_the_cache_forces_a_refetch() {
    let source = Arc::new(SyntheticSource::new());
    let screener = Screener::new(source.clone());
    let universe = tech(&["AAA", "BBB"]);

    screener.screen(&universe, &daily_spec(), &close_above_sma_20()).unwrap();
    let computations = screener.cache().column_stats().computations;
    screener.cache().clear();
    assert_eq!(screener.cache().columns_len(), 0);
    screener.screen(&universe, &daily_spec(), &close_above_sma_20()).unwrap();

    assert_eq!(source.fetch_count(), 4);
    assert_eq!(screener.cache().column_stats().computations, 2 * computations);
}

#[test]
fn threaded_and_sequential_runs_agree() {
    let universe = Universe::default_us();
    let spec = daily_spec().with_smoothed_macd(12, 26, 9, 9);
    let cond: Condition = "macd_12_26_9 > macd_12_26_9_sma_9 && close > sma_20"
        .parse()
        .unwrap();
    let make_source = || Arc::new(SyntheticSource::new().with_failure("NFLX"));

    let sequential = Screener::new(make_source())
        .screen(&universe, &spec, &cond)
        .unwrap();
    let threaded = Screener::new(make_source())
        .with_threads(4)
        .unwrap()
        .screen(&universe, &spec, &cond)
        .unwrap();

    assert_eq!(sequential, threaded);
}

// ── Configuration errors ─────────────────────────────────────────────

#[test]
fn undeclared_column_fails_before_any_fetch() {
    let source = Arc::new(SyntheticSource::new());
    let screener = Screener::new(source.clone());
    let cond: Condition = "close > sma_50".parse().unwrap();

    let err = screener
        .screen(&tech(&["AAA"]), &daily_spec(), &cond)
        .unwrap_err();

    assert!(matches!(
        err,
        ScreenError::Indicator(IndicatorError::ColumnNotFound { ref column }) if column == "sma_50"
    ));
    assert_eq!(source.fetch_count(), 0);
}

#[test]
fn invalid_parameters_fail_the_run() {
    let spec = IndicatorSpec::new(Period::Months(6), Interval::OneDay).with_moving_average(0);
    let err = Screener::new(Arc::new(SyntheticSource::new()))
        .screen(&tech(&["AAA"]), &spec, &Condition::default())
        .unwrap_err();
    assert!(matches!(
        err,
        ScreenError::Indicator(IndicatorError::InvalidParameter(_))
    ));
}

#[test]
fn universe_listing_failure_is_fatal() {
    let err = Screener::new(Arc::new(SyntheticSource::new()))
        .screen(&BrokenUniverse, &daily_spec(), &close_above_sma_20())
        .unwrap_err();
    assert!(matches!(err, ScreenError::Universe(_)));
}

// ── Cancellation ─────────────────────────────────────────────────────

#[test]
fn cancelled_run_returns_partial_report() {
    let cancel = AtomicBool::new(true);
    let report = Screener::new(Arc::new(SyntheticSource::new()))
        .screen_with_cancel(
            &Universe::default_us(),
            &daily_spec(),
            &close_above_sma_20(),
            &cancel,
        )
        .unwrap();

    assert!(report.cancelled);
    assert_eq!(report.evaluated, 0);
    assert!(report.diagnostics.is_empty());
    assert!(report.result.is_empty());
}

// ── Default configuration ────────────────────────────────────────────

#[test]
fn default_config_screens_the_default_universe() {
    let config = ScreenConfig::default();
    let report = Screener::new(Arc::new(SyntheticSource::new()))
        .screen(&Universe::default_us(), &config.indicators, &config.condition)
        .unwrap();

    assert_eq!(report.evaluated, Universe::default_us().len());
    assert_eq!(report.diagnostics_of(DiagnosticKind::InsufficientData).count(), 0);
}

// ── Charting series ──────────────────────────────────────────────────

#[test]
fn series_for_reuses_screening_work() {
    let source = Arc::new(SyntheticSource::new());
    let screener = Screener::new(source.clone());
    let spec = daily_spec().with_macd(5, 26, 9).with_macd(12, 26, 9);
    let cond: Condition = "macd_5_26_9 > macd_12_26_9".parse().unwrap();

    screener.screen(&tech(&["AAA"]), &spec, &cond).unwrap();
    let computations = screener.cache().column_stats().computations;

    let series = screener.series_for("AAA", &spec).unwrap();
    assert_eq!(source.fetch_count(), 1);
    assert_eq!(screener.cache().column_stats().computations, computations);

    let last = series.last_row().unwrap();
    let fast = series.value("macd_5_26_9", last).unwrap();
    let slow = series.value("macd_12_26_9", last).unwrap();
    assert_ne!(fast, slow);

    let csv = series_csv(&series).unwrap();
    let header = csv.lines().next().unwrap();
    assert_eq!(
        header,
        "timestamp,open,high,low,close,volume,macd_12_26_9,macd_5_26_9,sma_20"
    );
    assert_eq!(csv.lines().count(), series.len() + 1);
}

#[test]
fn series_for_unknown_symbol_reports_the_symbol() {
    let screener = Screener::new(Arc::new(SyntheticSource::new().with_failure("GONE")));
    let err = screener.series_for("GONE", &daily_spec()).unwrap_err();
    assert!(matches!(err, ScreenError::Data { ref symbol, .. } if symbol == "GONE"));
}
