//! Export of screening reports and indicator series.
//!
//! - **JSON**: the full `ScreenReport` (result, diagnostics, counts, fingerprint)
//! - **CSV**: one `sector,symbol` row per passing symbol
//! - **Series CSV**: bars plus every indicator column, for charting tools

use std::path::Path;

use anyhow::{Context, Result};
use screenlab_core::domain::IndicatorSeries;

use crate::pipeline::ScreenReport;
use crate::result::ScreeningResult;

// ─── JSON export ────────────────────────────────────────────────────

/// Serialize a `ScreenReport` to pretty JSON.
pub fn export_json(report: &ScreenReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("failed to serialize ScreenReport to JSON")
}

/// Deserialize a `ScreenReport` from JSON.
pub fn import_json(json: &str) -> Result<ScreenReport> {
    serde_json::from_str(json).context("failed to deserialize ScreenReport from JSON")
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Export the sector grouping as `sector,symbol` rows.
pub fn export_csv(result: &ScreeningResult) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["sector", "symbol"])?;
    for (sector, symbol) in result.rows() {
        wtr.write_record([sector, symbol])?;
    }
    finish(wtr)
}

/// Export bars and indicator columns; undefined values are empty cells.
pub fn series_csv(series: &IndicatorSeries) -> Result<String> {
    let columns: Vec<&str> = series.column_names().collect();
    let mut wtr = csv::Writer::from_writer(vec![]);

    let mut header = vec!["timestamp", "open", "high", "low", "close", "volume"];
    header.extend(columns.iter().copied());
    wtr.write_record(&header)?;

    for (row, bar) in series.prices().bars().iter().enumerate() {
        let mut record = vec![
            bar.timestamp.to_rfc3339(),
            format!("{:.4}", bar.open),
            format!("{:.4}", bar.high),
            format!("{:.4}", bar.low),
            format!("{:.4}", bar.close),
            bar.volume.to_string(),
        ];
        record.extend(
            columns
                .iter()
                .map(|c| series.value(c, row).map(|v| format!("{v:.6}")).unwrap_or_default()),
        );
        wtr.write_record(&record)?;
    }
    finish(wtr)
}

fn finish(wtr: csv::Writer<Vec<u8>>) -> Result<String> {
    let bytes = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(bytes).context("CSV output is not UTF-8")
}

/// Write `content` to `path`, creating parent directories.
pub fn write_file(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(path, content).with_context(|| format!("failed to write {}", path.display()))
}
