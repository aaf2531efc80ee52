//! Price data sources and the screening universe.

pub mod circuit_breaker;
pub mod provider;
pub mod synthetic;
pub mod universe;
pub mod yahoo;

pub use circuit_breaker::{BreakerState, CircuitBreaker};
pub use provider::{DataError, PriceSource};
pub use synthetic::SyntheticSource;
pub use universe::{Universe, UniverseEntry, UniverseError, UniverseSource};
pub use yahoo::YahooSource;
