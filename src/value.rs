//! Value algebra
//!
//! A `Value` is one measured quantity bound to a [`Metric`]. Values of the same
//! metric combine by summation; every value has a canonical text form
//! (`LINE: 3/4`, `COMPLEXITY: 7`) that parses back to an equal value.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::{CoverageError, Result};
use crate::metric::{Metric, ValueKind};

/// Covered and missed items of a coverage metric (lines, branches, ...)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Coverage {
    metric: Metric,
    covered: u64,
    missed: u64,
}

impl Coverage {
    /// Fails with `MetricMismatch` if `metric` is not a coverage metric and
    /// with `Overflow` if the total does not fit in a `u64`
    pub fn new(metric: Metric, covered: u64, missed: u64) -> Result<Self> {
        expect_kind(metric, ValueKind::Coverage)?;
        covered
            .checked_add(missed)
            .ok_or(CoverageError::Overflow(metric))?;
        Ok(Self {
            metric,
            covered,
            missed,
        })
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    pub fn covered(&self) -> u64 {
        self.covered
    }

    pub fn missed(&self) -> u64 {
        self.missed
    }

    /// Never overflows: construction rejects totals beyond `u64::MAX`
    pub fn total(&self) -> u64 {
        self.covered.saturating_add(self.missed)
    }

    /// Whether any item was counted at all
    pub fn is_set(&self) -> bool {
        self.total() > 0
    }

    /// Covered share in `0.0..=1.0`; `None` when nothing was counted
    pub fn ratio(&self) -> Option<f64> {
        if self.is_set() {
            Some(self.covered as f64 / self.total() as f64)
        } else {
            None
        }
    }

    pub fn percentage(&self) -> Option<f64> {
        self.ratio().map(|r| r * 100.0)
    }
}

/// Exact rational used by density metrics
///
/// Combination sums numerators and denominators independently, which keeps
/// the weighted average intact across merges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FractionValue {
    metric: Metric,
    numerator: u64,
    denominator: u64,
}

impl FractionValue {
    pub fn new(metric: Metric, numerator: u64, denominator: u64) -> Result<Self> {
        expect_kind(metric, ValueKind::Fraction)?;
        if denominator == 0 {
            return Err(CoverageError::InvalidFormat(format!(
                "{}: {}/{}",
                metric, numerator, denominator
            )));
        }
        Ok(Self {
            metric,
            numerator,
            denominator,
        })
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    pub fn numerator(&self) -> u64 {
        self.numerator
    }

    pub fn denominator(&self) -> u64 {
        self.denominator
    }

    pub fn ratio(&self) -> f64 {
        self.numerator as f64 / self.denominator as f64
    }
}

/// One measured quantity; the variant is fixed by the metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Value {
    Coverage(Coverage),
    Fraction(FractionValue),
    Complexity(u64),
    LinesOfCode(u64),
    TestCount(u64),
}

impl Value {
    pub fn coverage(metric: Metric, covered: u64, missed: u64) -> Result<Value> {
        Coverage::new(metric, covered, missed).map(Value::Coverage)
    }

    pub fn fraction(metric: Metric, numerator: u64, denominator: u64) -> Result<Value> {
        FractionValue::new(metric, numerator, denominator).map(Value::Fraction)
    }

    pub fn metric(&self) -> Metric {
        match self {
            Value::Coverage(coverage) => coverage.metric,
            Value::Fraction(fraction) => fraction.metric,
            Value::Complexity(_) => Metric::Complexity,
            Value::LinesOfCode(_) => Metric::Loc,
            Value::TestCount(_) => Metric::Tests,
        }
    }

    /// Sums two values of the same metric
    pub fn combine(&self, other: &Value) -> Result<Value> {
        if self.metric() != other.metric() {
            return Err(CoverageError::MetricMismatch {
                left: self.metric(),
                right: other.metric(),
            });
        }

        let metric = self.metric();
        let add = |a: u64, b: u64| a.checked_add(b).ok_or(CoverageError::Overflow(metric));

        let combined = match (self, other) {
            (Value::Coverage(a), Value::Coverage(b)) => Value::Coverage(Coverage::new(
                metric,
                add(a.covered, b.covered)?,
                add(a.missed, b.missed)?,
            )?),
            (Value::Fraction(a), Value::Fraction(b)) => Value::Fraction(FractionValue {
                metric,
                numerator: add(a.numerator, b.numerator)?,
                denominator: add(a.denominator, b.denominator)?,
            }),
            (Value::Complexity(a), Value::Complexity(b)) => Value::Complexity(add(*a, *b)?),
            (Value::LinesOfCode(a), Value::LinesOfCode(b)) => Value::LinesOfCode(add(*a, *b)?),
            (Value::TestCount(a), Value::TestCount(b)) => Value::TestCount(add(*a, *b)?),
            _ => {
                return Err(CoverageError::MetricMismatch {
                    left: self.metric(),
                    right: other.metric(),
                })
            }
        };

        Ok(combined)
    }

    /// Finds the first value of `metric` in `values`
    pub fn get_value(metric: Metric, values: &[Value]) -> Result<&Value> {
        values
            .iter()
            .find(|v| v.metric() == metric)
            .ok_or(CoverageError::NotFound(metric))
    }

    /// The scalar payload of count-like variants
    pub fn count(&self) -> Option<u64> {
        match self {
            Value::Complexity(n) | Value::LinesOfCode(n) | Value::TestCount(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_coverage(&self) -> Option<&Coverage> {
        match self {
            Value::Coverage(coverage) => Some(coverage),
            _ => None,
        }
    }
}

fn expect_kind(metric: Metric, kind: ValueKind) -> Result<()> {
    if metric.value_kind() == kind {
        Ok(())
    } else {
        Err(CoverageError::MetricMismatch {
            left: metric,
            right: canonical_metric(kind),
        })
    }
}

fn canonical_metric(kind: ValueKind) -> Metric {
    match kind {
        ValueKind::Coverage => Metric::Line,
        ValueKind::Fraction => Metric::ComplexityDensity,
        ValueKind::Complexity => Metric::Complexity,
        ValueKind::LinesOfCode => Metric::Loc,
        ValueKind::TestCount => Metric::Tests,
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Coverage(c) => write!(f, "{}: {}/{}", c.metric, c.covered, c.total()),
            Value::Fraction(v) => write!(f, "{}: {}/{}", v.metric, v.numerator, v.denominator),
            Value::Complexity(n) | Value::LinesOfCode(n) | Value::TestCount(n) => {
                write!(f, "{}: {}", self.metric(), n)
            }
        }
    }
}

impl FromStr for Value {
    type Err = CoverageError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || CoverageError::InvalidFormat(s.to_string());

        let (name, payload) = s.split_once(':').ok_or_else(invalid)?;
        let metric = Metric::from_name(name.trim()).ok_or_else(invalid)?;
        let payload = payload.trim();

        match metric.value_kind() {
            ValueKind::Coverage => {
                let (covered, total) = parse_pair(payload).ok_or_else(invalid)?;
                if covered > total {
                    return Err(invalid());
                }
                Value::coverage(metric, covered, total - covered)
            }
            ValueKind::Fraction => {
                let (numerator, denominator) = parse_pair(payload).ok_or_else(invalid)?;
                if denominator == 0 {
                    return Err(invalid());
                }
                Value::fraction(metric, numerator, denominator)
            }
            ValueKind::Complexity => parse_count(payload).map(Value::Complexity).ok_or_else(invalid),
            ValueKind::LinesOfCode => parse_count(payload).map(Value::LinesOfCode).ok_or_else(invalid),
            ValueKind::TestCount => parse_count(payload).map(Value::TestCount).ok_or_else(invalid),
        }
    }
}

fn parse_pair(payload: &str) -> Option<(u64, u64)> {
    let (left, right) = payload.split_once('/')?;
    Some((left.trim().parse().ok()?, right.trim().parse().ok()?))
}

/// Parses a non-negative count, rounding float input to the nearest integer
pub(crate) fn parse_count(text: &str) -> Option<u64> {
    let text = text.trim();
    if let Ok(n) = text.parse::<u64>() {
        return Some(n);
    }
    let float = text.parse::<f64>().ok()?;
    if !float.is_finite() || float < 0.0 {
        return None;
    }
    Some(float.round() as u64)
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}
