//! Synthetic price source.
//!
//! Generates a deterministic random walk per symbol (seeded from a BLAKE3
//! hash of the symbol name), so offline runs are reproducible. Fixed close
//! series and forced failures can be registered per symbol for tests and demos.

use super::provider::{DataError, PriceSource};
use crate::domain::{Interval, Period, PriceBar, PriceSeries};
use chrono::{DateTime, Datelike, TimeZone, Utc, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Bars generated for `Period::Max`.
const MAX_PERIOD_BARS: usize = 1260;

/// Upper bound on generated bars for long intraday windows.
const BAR_CAP: usize = 5000;

/// Deterministic offline price source.
pub struct SyntheticSource {
    anchor: DateTime<Utc>,
    fixed: HashMap<String, Vec<f64>>,
    failing: HashSet<String>,
    fetches: AtomicUsize,
}

impl SyntheticSource {
    pub fn new() -> Self {
        Self {
            anchor: Utc
                .with_ymd_and_hms(2024, 1, 2, 21, 0, 0)
                .single()
                .unwrap_or_default(),
            fixed: HashMap::new(),
            failing: HashSet::new(),
            fetches: AtomicUsize::new(0),
        }
    }

    /// Serve exactly these closes for `symbol`, regardless of period.
    pub fn with_closes(mut self, symbol: impl Into<String>, closes: Vec<f64>) -> Self {
        self.fixed.insert(symbol.into(), closes);
        self
    }

    /// Make every fetch of `symbol` fail with `DataError::NetworkUnreachable`.
    pub fn with_failure(mut self, symbol: impl Into<String>) -> Self {
        self.failing.insert(symbol.into());
        self
    }

    /// Number of `fetch` calls served so far, failures included.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// How many bars a period spans at an interval, roughly as an exchange would.
    fn bar_count(period: Period, interval: Interval) -> usize {
        let Some(days) = period.approx_days() else {
            return MAX_PERIOD_BARS;
        };
        let trading_days = (days as usize * 5).div_ceil(7).max(1);
        let count = match interval {
            Interval::OneDay => trading_days,
            Interval::OneWeek => (days as usize).div_ceil(7),
            Interval::OneMonth => (days as usize).div_ceil(30),
            intraday => {
                let per_day = (390 / intraday.step().num_minutes().max(1)) as usize;
                trading_days * per_day.max(1)
            }
        };
        count.clamp(1, BAR_CAP)
    }

    /// Timestamps spaced by `interval`, skipping weekends for daily bars.
    fn timestamps(&self, n: usize, interval: Interval) -> Vec<DateTime<Utc>> {
        let mut out = Vec::with_capacity(n);
        let mut current = self.anchor;
        while out.len() < n {
            let weekend = matches!(current.weekday(), Weekday::Sat | Weekday::Sun);
            if !(interval == Interval::OneDay && weekend) {
                out.push(current);
            }
            current += interval.step();
        }
        out
    }

    fn random_walk(symbol: &str, n: usize) -> Vec<f64> {
        let seed: [u8; 32] = *blake3::hash(symbol.as_bytes()).as_bytes();
        let mut rng = StdRng::from_seed(seed);
        let mut price = rng.gen_range(20.0..400.0_f64);
        (0..n)
            .map(|_| {
                price *= 1.0 + rng.gen_range(-0.025..0.0265);
                price
            })
            .collect()
    }

    fn bars_from_closes(&self, symbol: &str, closes: &[f64], interval: Interval) -> Vec<PriceBar> {
        let seed: [u8; 32] = *blake3::hash(symbol.as_bytes()).as_bytes();
        let mut rng = StdRng::from_seed(seed);
        self.timestamps(closes.len(), interval)
            .into_iter()
            .zip(closes)
            .enumerate()
            .map(|(i, (timestamp, &close))| {
                let open = if i == 0 { close } else { closes[i - 1] };
                PriceBar {
                    timestamp,
                    open,
                    high: open.max(close) * (1.0 + rng.gen_range(0.0..0.01)),
                    low: open.min(close) * (1.0 - rng.gen_range(0.0..0.01)),
                    close,
                    volume: rng.gen_range(500_000..5_000_000u64),
                }
            })
            .collect()
    }
}

impl Default for SyntheticSource {
    fn default() -> Self {
        Self::new()
    }
}

impl PriceSource for SyntheticSource {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn fetch(
        &self,
        symbol: &str,
        period: Period,
        interval: Interval,
    ) -> Result<PriceSeries, DataError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);

        if self.failing.contains(symbol) {
            return Err(DataError::NetworkUnreachable(format!(
                "synthetic failure for {symbol}"
            )));
        }

        let closes = match self.fixed.get(symbol) {
            Some(closes) => closes.clone(),
            None => Self::random_walk(symbol, Self::bar_count(period, interval)),
        };
        let bars = self.bars_from_closes(symbol, &closes, interval);
        Ok(PriceSeries::new(symbol, bars)?)
    }
}
