//! Domain types for screenlab

pub mod bar;
pub mod period;
pub mod series;

pub use bar::{PriceBar, PriceField};
pub use period::{Interval, Period, PeriodError};
pub use series::{IndicatorSeries, PriceSeries, SeriesError};

/// Symbol type alias
pub type Symbol = String;

/// Sector label type alias
pub type SectorLabel = String;

/// Bucket used for symbols whose universe entry carries no sector.
pub const UNKNOWN_SECTOR: &str = "Unknown";
