//! Core value, time, and error types shared by every module.

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unit a [`TimeSpan`] is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeUnit {
    #[default]
    Millisecond,
    Second,
    Minute,
    Hour,
    Day,
}

impl TimeUnit {
    /// Length of one unit in milliseconds.
    pub fn millis(self) -> i64 {
        match self {
            TimeUnit::Millisecond => 1,
            TimeUnit::Second => 1_000,
            TimeUnit::Minute => 60_000,
            TimeUnit::Hour => 3_600_000,
            TimeUnit::Day => 86_400_000,
        }
    }
}

/// A signed duration expressed as a count of [`TimeUnit`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TimeSpan {
    pub value: i64,
    #[serde(default)]
    pub unit: TimeUnit,
}

impl TimeSpan {
    pub const ZERO: TimeSpan = TimeSpan {
        value: 0,
        unit: TimeUnit::Millisecond,
    };

    pub fn new(value: i64, unit: TimeUnit) -> Self {
        Self { value, unit }
    }

    pub fn millis(&self) -> i64 {
        self.value.saturating_mul(self.unit.millis())
    }

    pub fn to_duration(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(self.millis())
    }
}

/// A closed time interval in epoch milliseconds. `start <= finish` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Interval {
    pub start: i64,
    pub finish: i64,
}

impl Interval {
    /// Build an interval, ordering the endpoints.
    pub fn new(start: i64, finish: i64) -> Self {
        if start <= finish {
            Self { start, finish }
        } else {
            Self {
                start: finish,
                finish: start,
            }
        }
    }

    /// A zero-length interval at `at`.
    pub fn point(at: i64) -> Self {
        Self {
            start: at,
            finish: at,
        }
    }

    /// Smallest interval covering both.
    pub fn span(&self, other: &Interval) -> Interval {
        Interval {
            start: self.start.min(other.start),
            finish: self.finish.max(other.finish),
        }
    }

    pub fn duration_millis(&self) -> i64 {
        self.finish - self.start
    }

    pub fn is_point(&self) -> bool {
        self.start == self.finish
    }

    /// True if the intervals share at least one instant.
    pub fn overlaps(&self, other: &Interval) -> bool {
        self.start <= other.finish && other.start <= self.finish
    }

    /// True if this interval finishes exactly where `other` starts.
    pub fn meets(&self, other: &Interval) -> bool {
        self.finish == other.start
    }

    pub fn contains(&self, other: &Interval) -> bool {
        self.start <= other.start && other.finish <= self.finish
    }

    pub fn contains_instant(&self, at: i64) -> bool {
        self.start <= at && at <= self.finish
    }

    pub fn intersection(&self, other: &Interval) -> Option<Interval> {
        let start = self.start.max(other.start);
        let finish = self.finish.min(other.finish);
        (start <= finish).then_some(Interval { start, finish })
    }

    /// Time from the end of this interval to the start of `other`. Negative
    /// when they overlap.
    pub fn gap_to(&self, other: &Interval) -> i64 {
        other.start - self.finish
    }

    /// Shift both endpoints; the result is re-ordered if the shifts cross.
    pub fn shifted(&self, start_by: i64, finish_by: i64) -> Interval {
        Interval::new(self.start + start_by, self.finish + finish_by)
    }

    pub fn start_datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.start)
    }

    pub fn finish_datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.finish)
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.start_datetime(), self.finish_datetime()) {
            (Some(s), Some(e)) => write!(f, "[{}, {}]", s.to_rfc3339(), e.to_rfc3339()),
            _ => write!(f, "[{}, {}]", self.start, self.finish),
        }
    }
}

/// Type tag for [`Value`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    Number,
    Nominal,
    Boolean,
    List,
    #[default]
    Any,
}

impl ValueType {
    /// Whether a value of type `other` is acceptable where `self` is expected.
    pub fn accepts(self, other: ValueType) -> bool {
        self == ValueType::Any || self == other
    }
}

/// A data value carried by a proposition or used as a definition target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Boolean(bool),
    Number(f64),
    Nominal(String),
    List(Vec<Value>),
}

impl Value {
    pub fn nominal(s: impl Into<String>) -> Self {
        Value::Nominal(s.into())
    }

    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Boolean(_) => ValueType::Boolean,
            Value::Number(_) => ValueType::Number,
            Value::Nominal(_) => ValueType::Nominal,
            Value::List(_) => ValueType::List,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Partial order within a value type. Values of different types are
    /// incomparable.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
            (Value::Nominal(a), Value::Nominal(b)) => Some(a.cmp(b)),
            (Value::Boolean(a), Value::Boolean(b)) => Some(a.cmp(b)),
            (Value::List(a), Value::List(b)) if a == b => Some(Ordering::Equal),
            _ => None,
        }
    }

    /// Evaluate `self <comparator> rhs`.
    pub fn satisfies(&self, comparator: ValueComparator, rhs: &Value) -> bool {
        match comparator {
            ValueComparator::Equal => self == rhs,
            ValueComparator::NotEqual => self != rhs,
            ValueComparator::GreaterThan => self.compare(rhs) == Some(Ordering::Greater),
            ValueComparator::GreaterThanOrEqual => matches!(
                self.compare(rhs),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            ValueComparator::LessThan => self.compare(rhs) == Some(Ordering::Less),
            ValueComparator::LessThanOrEqual => {
                matches!(self.compare(rhs), Some(Ordering::Less | Ordering::Equal))
            }
            ValueComparator::In => match rhs {
                Value::List(items) => items.contains(self),
                other => self == other,
            },
            ValueComparator::NotIn => match rhs {
                Value::List(items) => !items.contains(self),
                other => self != other,
            },
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Boolean(v) => write!(f, "{v}"),
            Value::Number(v) => write!(f, "{v}"),
            Value::Nominal(v) => write!(f, "{v}"),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
        }
    }
}

/// Comparison operator used by algorithm parameters and value constraints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueComparator {
    #[serde(rename = "=")]
    Equal,
    #[serde(rename = "!=")]
    NotEqual,
    #[serde(rename = ">")]
    GreaterThan,
    #[serde(rename = ">=")]
    GreaterThanOrEqual,
    #[serde(rename = "<")]
    LessThan,
    #[serde(rename = "<=")]
    LessThanOrEqual,
    #[serde(rename = "in")]
    In,
    #[serde(rename = "not_in")]
    NotIn,
}

impl fmt::Display for ValueComparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ValueComparator::Equal => "=",
            ValueComparator::NotEqual => "!=",
            ValueComparator::GreaterThan => ">",
            ValueComparator::GreaterThanOrEqual => ">=",
            ValueComparator::LessThan => "<",
            ValueComparator::LessThanOrEqual => "<=",
            ValueComparator::In => "in",
            ValueComparator::NotIn => "not_in",
        };
        f.write_str(s)
    }
}

/// Errors that can occur while defining knowledge or deriving abstractions.
#[derive(thiserror::Error, Debug)]
pub enum AbstractionError {
    #[error("Invalid definition: {0}")]
    InvalidDefinition(String),

    #[error("Duplicate definition id: {0}")]
    DuplicateDefinition(String),

    #[error("Unknown proposition definition: {0}")]
    UnknownDefinition(String),

    #[error("No such algorithm {algorithm} for definition {definition}")]
    NoSuchAlgorithm {
        definition: String,
        algorithm: String,
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Knowledge source read failed for {id}: {reason}")]
    KnowledgeSourceRead { id: String, reason: String },

    #[error("Algorithm {algorithm} failed: {reason}")]
    AlgorithmProcessing { algorithm: String, reason: String },

    #[error("Rule firing limit of {0} exceeded")]
    FiringLimitExceeded(usize),

    #[error("Invalid executor state: expected {expected}, was {actual}")]
    InvalidState {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Broad classification of an [`AbstractionError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Bad knowledge; raised at configuration time and never retried.
    Definition,
    /// A collaborator failed to read a definition.
    Read,
    /// Raised while deriving abstractions for one key.
    Processing,
    Internal,
}

impl AbstractionError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            AbstractionError::InvalidDefinition(_)
            | AbstractionError::DuplicateDefinition(_)
            | AbstractionError::UnknownDefinition(_)
            | AbstractionError::NoSuchAlgorithm { .. }
            | AbstractionError::InvalidArgument(_) => ErrorCategory::Definition,
            AbstractionError::KnowledgeSourceRead { .. }
            | AbstractionError::Json(_)
            | AbstractionError::Io(_) => ErrorCategory::Read,
            AbstractionError::AlgorithmProcessing { .. }
            | AbstractionError::FiringLimitExceeded(_) => ErrorCategory::Processing,
            AbstractionError::InvalidState { .. } | AbstractionError::Internal(_) => {
                ErrorCategory::Internal
            }
        }
    }
}

/// Convenience result type.
pub type AbstractionResult<T> = Result<T, AbstractionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_span_and_gap() {
        let a = Interval::new(0, 10);
        let b = Interval::new(15, 20);
        assert_eq!(a.span(&b), Interval::new(0, 20));
        assert_eq!(a.gap_to(&b), 5);
        assert!(!a.overlaps(&b));
        assert!(Interval::new(0, 15).meets(&b));
    }

    #[test]
    fn test_interval_new_orders_endpoints() {
        let i = Interval::new(9, 3);
        assert_eq!(i.start, 3);
        assert_eq!(i.finish, 9);
    }

    #[test]
    fn test_interval_intersection() {
        let a = Interval::new(0, 10);
        assert_eq!(a.intersection(&Interval::new(5, 20)), Some(Interval::new(5, 10)));
        assert_eq!(a.intersection(&Interval::new(11, 20)), None);
    }

    #[test]
    fn test_timespan_millis() {
        assert_eq!(TimeSpan::new(2, TimeUnit::Hour).millis(), 7_200_000);
        assert_eq!(TimeSpan::ZERO.millis(), 0);
    }

    #[test]
    fn test_value_comparators() {
        let five = Value::Number(5.0);
        assert!(five.satisfies(ValueComparator::GreaterThan, &Value::Number(4.0)));
        assert!(five.satisfies(ValueComparator::LessThanOrEqual, &Value::Number(5.0)));
        assert!(!five.satisfies(ValueComparator::LessThan, &Value::nominal("5")));
        let set = Value::List(vec![Value::nominal("LOW"), Value::nominal("HIGH")]);
        assert!(Value::nominal("LOW").satisfies(ValueComparator::In, &set));
        assert!(Value::nominal("NORMAL").satisfies(ValueComparator::NotIn, &set));
    }

    #[test]
    fn test_value_json_untagged() {
        let v: Value = serde_json::from_str("\"HIGH\"").unwrap();
        assert_eq!(v, Value::nominal("HIGH"));
        let n: Value = serde_json::from_str("3.5").unwrap();
        assert_eq!(n, Value::Number(3.5));
        let b: Value = serde_json::from_str("true").unwrap();
        assert_eq!(b, Value::Boolean(true));
    }

    #[test]
    fn test_error_categories() {
        let e = AbstractionError::NoSuchAlgorithm {
            definition: "A".into(),
            algorithm: "x".into(),
        };
        assert_eq!(e.category(), ErrorCategory::Definition);
        assert_eq!(
            AbstractionError::FiringLimitExceeded(3).category(),
            ErrorCategory::Processing
        );
    }
}
