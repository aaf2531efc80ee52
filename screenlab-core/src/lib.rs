//! Screenlab Core: price series, indicators, conditions, and the result cache.
//!
//! This crate contains everything below the screening pipeline:
//! - Domain types (bars, price series, indicator series, periods, intervals)
//! - Indicator engine (moving averages, MACD line, smoothing of any column)
//! - Condition evaluation on the most recent row of a series
//! - Price sources (Yahoo Finance, deterministic synthetic) and universes
//! - Concurrent get-or-compute cache for fetches and indicator columns

pub mod cache;
pub mod condition;
pub mod data;
pub mod domain;
pub mod indicators;
