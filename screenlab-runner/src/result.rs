//! Sector-grouped screening result.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Passing symbols grouped by sector label.
///
/// Both levels are sorted, so two results with the same content compare,
/// serialize and fingerprint identically no matter the insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScreeningResult {
    sectors: BTreeMap<String, BTreeSet<String>>,
}

impl ScreeningResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `symbol` as passing under `sector`. Returns false if already present.
    pub fn insert(&mut self, sector: impl Into<String>, symbol: impl Into<String>) -> bool {
        self.sectors
            .entry(sector.into())
            .or_default()
            .insert(symbol.into())
    }

    pub fn sectors(&self) -> impl Iterator<Item = (&str, &BTreeSet<String>)> {
        self.sectors.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn symbols(&self, sector: &str) -> Option<&BTreeSet<String>> {
        self.sectors.get(sector)
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.sectors.values().any(|s| s.contains(symbol))
    }

    /// Number of passing symbols across all sectors.
    pub fn len(&self) -> usize {
        self.sectors.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.sectors.is_empty()
    }

    pub fn sector_count(&self) -> usize {
        self.sectors.len()
    }

    /// `(sector, symbol)` pairs in sorted order.
    pub fn rows(&self) -> impl Iterator<Item = (&str, &str)> {
        self.sectors.iter().flat_map(|(sector, symbols)| {
            symbols.iter().map(move |s| (sector.as_str(), s.as_str()))
        })
    }

    /// BLAKE3 digest of the result content.
    pub fn fingerprint(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        for (sector, symbol) in self.rows() {
            hasher.update(sector.as_bytes());
            hasher.update(b"\t");
            hasher.update(symbol.as_bytes());
            hasher.update(b"\n");
        }
        hasher.finalize().to_hex().to_string()
    }
}
