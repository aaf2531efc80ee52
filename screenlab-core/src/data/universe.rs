//! Universe configuration: the symbols to screen and their sectors.
//!
//! A universe is an ordered list of `(symbol, sector)` entries. It can be
//! loaded from a TOML file with sectors and their member tickers, or from a
//! CSV table with `Symbol` and `Sector` (or `GICS Sector`) columns such as an
//! exported S&P 500 constituents list.

use super::provider::DataError;
use crate::domain::UNKNOWN_SECTOR;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::io::Read;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UniverseError {
    #[error("read universe file: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse universe TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("serialize universe TOML: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("parse universe CSV: {0}")]
    Csv(#[from] csv::Error),
}

/// One symbol of the universe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniverseEntry {
    pub symbol: String,
    pub sector: Option<String>,
}

impl UniverseEntry {
    pub fn new(symbol: impl Into<String>, sector: Option<&str>) -> Self {
        Self {
            symbol: symbol.into(),
            sector: sector.map(String::from),
        }
    }

    /// Sector bucket this symbol is reported under.
    pub fn sector_label(&self) -> &str {
        self.sector.as_deref().unwrap_or(UNKNOWN_SECTOR)
    }
}

/// Anything that can list the universe to screen.
///
/// Implementations return a point-in-time snapshot; the pipeline does not
/// cache it.
pub trait UniverseSource {
    fn list(&self) -> Result<Vec<UniverseEntry>, DataError>;
}

/// On-disk TOML layout: sector → tickers, plus tickers with no sector.
#[derive(Debug, Default, Serialize, Deserialize)]
struct UniverseFile {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    unclassified: Vec<String>,
    #[serde(default)]
    sectors: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(alias = "Symbol", alias = "ticker", alias = "Ticker")]
    symbol: String,
    #[serde(default, alias = "Sector", alias = "GICS Sector")]
    sector: Option<String>,
}

/// A static universe.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Universe {
    entries: Vec<UniverseEntry>,
}

impl Universe {
    /// Build a universe, keeping the first occurrence of each symbol.
    pub fn new(entries: Vec<UniverseEntry>) -> Self {
        let mut seen = HashSet::new();
        let entries = entries
            .into_iter()
            .filter(|e| {
                let fresh = seen.insert(e.symbol.clone());
                if !fresh {
                    tracing::warn!(symbol = %e.symbol, "duplicate universe entry ignored");
                }
                fresh
            })
            .collect();
        Self { entries }
    }

    /// Load a universe from a `.toml` or `.csv` file.
    pub fn from_file(path: &Path) -> Result<Self, UniverseError> {
        let is_csv = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
        if is_csv {
            Self::from_csv(std::fs::File::open(path)?)
        } else {
            Self::from_toml(&std::fs::read_to_string(path)?)
        }
    }

    /// Parse a universe from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, UniverseError> {
        let file: UniverseFile = toml::from_str(content)?;
        let mut entries: Vec<UniverseEntry> = file
            .sectors
            .iter()
            .flat_map(|(sector, tickers)| {
                tickers
                    .iter()
                    .map(move |t| UniverseEntry::new(t.trim(), Some(sector.as_str())))
            })
            .collect();
        entries.extend(
            file.unclassified
                .iter()
                .map(|t| UniverseEntry::new(t.trim(), None)),
        );
        Ok(Self::new(entries))
    }

    /// Parse a universe from CSV with a header row.
    pub fn from_csv(reader: impl Read) -> Result<Self, UniverseError> {
        let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let mut entries = Vec::new();
        for row in rdr.deserialize::<CsvRow>() {
            let row = row?;
            if row.symbol.is_empty() {
                continue;
            }
            let sector = row.sector.filter(|s| !s.is_empty());
            entries.push(UniverseEntry {
                symbol: row.symbol,
                sector,
            });
        }
        Ok(Self::new(entries))
    }

    /// Serialize the universe to TOML.
    pub fn to_toml(&self) -> Result<String, UniverseError> {
        let mut file = UniverseFile::default();
        for entry in &self.entries {
            match &entry.sector {
                Some(sector) => file
                    .sectors
                    .entry(sector.clone())
                    .or_default()
                    .push(entry.symbol.clone()),
                None => file.unclassified.push(entry.symbol.clone()),
            }
        }
        Ok(toml::to_string_pretty(&file)?)
    }

    pub fn entries(&self) -> &[UniverseEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sector labels present, sorted, with the unknown bucket if used.
    pub fn sector_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.iter().map(|e| e.sector_label()).collect();
        names.sort_unstable();
        names.dedup();
        names
    }

    /// Symbols in a sector, in universe order.
    pub fn sector_symbols(&self, sector: &str) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|e| e.sector_label() == sector)
            .map(|e| e.symbol.as_str())
            .collect()
    }

    /// Create a default US equity universe with major sectors.
    pub fn default_us() -> Self {
        let sectors: [(&str, &[&str]); 6] = [
            (
                "Communication Services",
                &["GOOGL", "META", "NFLX", "DIS", "VZ", "T"],
            ),
            ("Consumer Staples", &["WMT", "PG", "KO", "PEP", "COST"]),
            ("Energy", &["XOM", "CVX", "COP", "SLB", "EOG", "MPC"]),
            ("Financials", &["JPM", "BAC", "WFC", "GS", "MS", "BLK", "V"]),
            ("Health Care", &["JNJ", "UNH", "PFE", "ABBV", "MRK", "LLY"]),
            (
                "Information Technology",
                &["AAPL", "MSFT", "NVDA", "AVGO", "CRM", "ADBE", "ORCL"],
            ),
        ];
        let entries = sectors
            .iter()
            .flat_map(|(sector, tickers)| {
                tickers.iter().map(move |t| UniverseEntry::new(*t, Some(*sector)))
            })
            .collect();
        Self::new(entries)
    }
}

impl UniverseSource for Universe {
    fn list(&self) -> Result<Vec<UniverseEntry>, DataError> {
        Ok(self.entries.clone())
    }
}
