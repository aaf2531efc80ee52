//! Screening conditions.
//!
//! A `Condition` is an AND of primitive comparisons evaluated against the
//! last row of an indicator series. Operands are raw bar fields, indicator
//! columns or constants. An operand that is undefined on the last row
//! (warm-up NaN, missing column) makes the whole condition false.
//!
//! Conditions have a compact text form used in config files and on the
//! command line:
//!
//! ```text
//! close > sma_20 && macd_12_26_9_sma_9 > macd_12_26_9
//! ```

use crate::domain::{IndicatorSeries, PriceField};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConditionError {
    #[error("cannot evaluate a condition on an empty series ('{symbol}')")]
    EmptySeries { symbol: String },

    #[error("invalid condition: {0}")]
    Parse(String),
}

/// One side of a comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Field(PriceField),
    Column(String),
    Constant(f64),
}

impl Operand {
    pub fn close() -> Self {
        Operand::Field(PriceField::Close)
    }

    pub fn column(name: impl Into<String>) -> Self {
        Operand::Column(name.into())
    }

    /// Value of this operand on `row`, `None` when undefined.
    fn resolve(&self, series: &IndicatorSeries, row: usize) -> Option<f64> {
        let value = match self {
            Operand::Field(field) => series.prices().bars().get(row)?.field(*field),
            Operand::Column(name) => series.value(name, row)?,
            Operand::Constant(c) => *c,
        };
        (!value.is_nan()).then_some(value)
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Field(field) => write!(f, "{field}"),
            Operand::Column(name) => f.write_str(name),
            Operand::Constant(c) => write!(f, "{c}"),
        }
    }
}

impl FromStr for Operand {
    type Err = ConditionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ConditionError::Parse("missing operand".into()));
        }
        if let Ok(c) = s.parse::<f64>() {
            if !c.is_finite() {
                return Err(ConditionError::Parse(format!("non-finite constant '{s}'")));
            }
            return Ok(Operand::Constant(c));
        }
        if let Ok(field) = s.parse::<PriceField>() {
            return Ok(Operand::Field(field));
        }
        let mut chars = s.chars();
        let valid_start = chars
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
        if valid_start && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
            Ok(Operand::Column(s.to_string()))
        } else {
            Err(ConditionError::Parse(format!("invalid operand '{s}'")))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    Gt,
    Ge,
    Lt,
    Le,
}

impl Comparator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Comparator::Gt => ">",
            Comparator::Ge => ">=",
            Comparator::Lt => "<",
            Comparator::Le => "<=",
        }
    }

    fn holds(&self, left: f64, right: f64) -> bool {
        match self {
            Comparator::Gt => left > right,
            Comparator::Ge => left >= right,
            Comparator::Lt => left < right,
            Comparator::Le => left <= right,
        }
    }
}

/// A primitive `left op right` test.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub left: Operand,
    pub op: Comparator,
    pub right: Operand,
}

impl Comparison {
    pub fn new(left: Operand, op: Comparator, right: Operand) -> Self {
        Self { left, op, right }
    }

    /// `close > column`
    pub fn close_above(column: impl Into<String>) -> Self {
        Self::new(Operand::close(), Comparator::Gt, Operand::column(column))
    }

    /// Test the comparison on `row`; undefined operands fail it.
    pub fn holds_at(&self, series: &IndicatorSeries, row: usize) -> bool {
        match (
            self.left.resolve(series, row),
            self.right.resolve(series, row),
        ) {
            (Some(l), Some(r)) => self.op.holds(l, r),
            _ => false,
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.left, self.op.as_str(), self.right)
    }
}

impl FromStr for Comparison {
    type Err = ConditionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let pos = s
            .find(['<', '>'])
            .ok_or_else(|| ConditionError::Parse(format!("no comparator in '{}'", s.trim())))?;
        let strict = !s[pos + 1..].starts_with('=');
        let op = match (&s[pos..pos + 1], strict) {
            (">", true) => Comparator::Gt,
            (">", false) => Comparator::Ge,
            ("<", true) => Comparator::Lt,
            _ => Comparator::Le,
        };
        let rhs_start = if strict { pos + 1 } else { pos + 2 };
        Ok(Self {
            left: s[..pos].parse()?,
            op,
            right: s[rhs_start..].parse()?,
        })
    }
}

/// AND-composition of comparisons. An empty condition always holds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Condition {
    clauses: Vec<Comparison>,
}

impl Condition {
    pub fn new(clauses: Vec<Comparison>) -> Self {
        Self { clauses }
    }

    /// Add another clause.
    pub fn and(mut self, clause: Comparison) -> Self {
        self.clauses.push(clause);
        self
    }

    pub fn clauses(&self) -> &[Comparison] {
        &self.clauses
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Indicator columns referenced by any clause.
    pub fn columns(&self) -> BTreeSet<&str> {
        self.clauses
            .iter()
            .flat_map(|c| [&c.left, &c.right])
            .filter_map(|o| match o {
                Operand::Column(name) => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, clause) in self.clauses.iter().enumerate() {
            if i > 0 {
                f.write_str(" && ")?;
            }
            write!(f, "{clause}")?;
        }
        Ok(())
    }
}

impl FromStr for Condition {
    type Err = ConditionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Ok(Self::default());
        }
        let clauses = s
            .split("&&")
            .map(str::parse)
            .collect::<Result<Vec<Comparison>, _>>()?;
        Ok(Self { clauses })
    }
}

impl TryFrom<String> for Condition {
    type Error = ConditionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Condition> for String {
    fn from(value: Condition) -> Self {
        value.to_string()
    }
}

/// Evaluate `condition` on the last row of `series`.
///
/// Clauses are tested in order and evaluation stops at the first failing one.
pub fn evaluate(series: &IndicatorSeries, condition: &Condition) -> Result<bool, ConditionError> {
    let row = series.last_row().ok_or_else(|| ConditionError::EmptySeries {
        symbol: series.symbol().to_string(),
    })?;
    Ok(condition.clauses.iter().all(|c| c.holds_at(series, row)))
}
