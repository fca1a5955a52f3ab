//! Pluggable value classifiers applied to candidate segments.
//!
//! An [`Algorithm`] looks at the values inside a [`Segment`] and either
//! yields a value (matched against a value definition's target) or nothing.
//! Algorithms are looked up by id through an [`AlgorithmSource`].

pub mod state;
pub mod trend;

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::proposition::Proposition;
use crate::sequence::Segment;
use crate::types::{AbstractionError, AbstractionResult, Value, ValueComparator, ValueType};

pub use state::StateDetector;
pub use trend::TrendDetector;

/// A segment of primitive parameters as seen by an algorithm.
pub type ParameterSegment<'a> = Segment<'a, Arc<Proposition>>;

/// A parameter an algorithm accepts, with the comparators allowed for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlgorithmParameter {
    pub name: String,
    pub value_type: ValueType,
    pub comparators: Vec<ValueComparator>,
}

impl AlgorithmParameter {
    pub fn new(
        name: impl Into<String>,
        value_type: ValueType,
        comparators: &[ValueComparator],
    ) -> Self {
        Self {
            name: name.into(),
            value_type,
            comparators: comparators.to_vec(),
        }
    }
}

/// One `(value, comparator)` argument bound to a named parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlgorithmArgument {
    pub value: Value,
    pub comparator: ValueComparator,
}

impl AlgorithmArgument {
    pub fn new(value: Value, comparator: ValueComparator) -> Self {
        Self { value, comparator }
    }
}

/// Arguments a value definition passes to its algorithm.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlgorithmArguments(BTreeMap<String, AlgorithmArgument>);

impl AlgorithmArguments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: Value, comparator: ValueComparator) -> Self {
        self.0
            .insert(name.into(), AlgorithmArgument::new(value, comparator));
        self
    }

    pub fn get(&self, name: &str) -> Option<&AlgorithmArgument> {
        self.0.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &AlgorithmArgument)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Numeric argument, or an error naming the algorithm if the value is not
    /// a number.
    pub fn number(&self, algorithm: &str, name: &str) -> AbstractionResult<Option<(f64, ValueComparator)>> {
        match self.get(name) {
            None => Ok(None),
            Some(arg) => match arg.value.as_number() {
                Some(n) => Ok(Some((n, arg.comparator))),
                None => Err(AbstractionError::AlgorithmProcessing {
                    algorithm: algorithm.to_string(),
                    reason: format!("argument {name} must be a number, got {}", arg.value),
                }),
            },
        }
    }
}

/// A pure value classifier over a window of primitive parameters.
pub trait Algorithm: Send + Sync + fmt::Debug {
    fn id(&self) -> &str;

    /// Type of the primitive parameter values this algorithm reads.
    fn input_value_type(&self) -> ValueType;

    fn minimum_number_of_values(&self) -> usize;

    /// `None` means unbounded.
    fn maximum_number_of_values(&self) -> Option<usize>;

    /// When set, a row advance moves the window end forward by this many
    /// elements instead of recomputing it from the new start.
    fn advance_row_skip_end(&self) -> Option<usize> {
        None
    }

    fn parameters(&self) -> &[AlgorithmParameter];

    /// Check arguments once before any segment is computed.
    fn initialize(&self, _arguments: &AlgorithmArguments) -> AbstractionResult<()> {
        Ok(())
    }

    /// Classify a segment. `Ok(None)` means no value.
    fn compute(
        &self,
        segment: &ParameterSegment<'_>,
        arguments: &AlgorithmArguments,
    ) -> AbstractionResult<Option<Value>>;

    fn parameter(&self, name: &str) -> Option<&AlgorithmParameter> {
        self.parameters().iter().find(|p| p.name == name)
    }
}

/// Looks up algorithms by id.
pub trait AlgorithmSource: Send + Sync {
    fn read_algorithm(&self, id: &str) -> AbstractionResult<Option<Arc<dyn Algorithm>>>;
}

/// In-memory algorithm registry.
#[derive(Debug, Clone, Default)]
pub struct Algorithms {
    by_id: HashMap<String, Arc<dyn Algorithm>>,
}

impl Algorithms {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding [`StateDetector`] and [`TrendDetector`].
    pub fn with_builtins() -> Self {
        let mut algorithms = Self::new();
        algorithms.register(Arc::new(StateDetector::new()));
        algorithms.register(Arc::new(TrendDetector::new()));
        algorithms
    }

    /// Add or replace an algorithm.
    pub fn register(&mut self, algorithm: Arc<dyn Algorithm>) {
        self.by_id.insert(algorithm.id().to_string(), algorithm);
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn Algorithm>> {
        self.by_id.get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

impl AlgorithmSource for Algorithms {
    fn read_algorithm(&self, id: &str) -> AbstractionResult<Option<Arc<dyn Algorithm>>> {
        Ok(self.get(id))
    }
}

/// Values of the segment's parameters, failing on facts with no value.
pub(crate) fn segment_values<'a>(
    algorithm: &str,
    segment: &ParameterSegment<'a>,
) -> AbstractionResult<Vec<&'a Value>> {
    segment
        .items()
        .iter()
        .map(|p| {
            p.value.as_ref().ok_or_else(|| AbstractionError::AlgorithmProcessing {
                algorithm: algorithm.to_string(),
                reason: format!("{} has no value", p.def_id),
            })
        })
        .collect()
}

/// Apply an optional numeric threshold argument.
pub(crate) fn check_threshold(value: f64, threshold: Option<(f64, ValueComparator)>) -> bool {
    match threshold {
        None => true,
        Some((bound, comparator)) => Value::Number(value).satisfies(comparator, &Value::Number(bound)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_registry() {
        let algorithms = Algorithms::with_builtins();
        assert_eq!(algorithms.len(), 2);
        assert!(algorithms.read_algorithm(state::STATE_DETECTOR).unwrap().is_some());
        assert!(algorithms.read_algorithm(trend::TREND_DETECTOR).unwrap().is_some());
        assert!(algorithms.read_algorithm("missing").unwrap().is_none());
    }

    #[test]
    fn test_number_argument_type_checked() {
        let args = AlgorithmArguments::new().with("minThreshold", Value::nominal("x"), ValueComparator::GreaterThan);
        assert!(args.number("stateDetector", "minThreshold").is_err());
        assert!(args.number("stateDetector", "maxThreshold").unwrap().is_none());
    }

    #[test]
    fn test_arguments_json() {
        let json = r#"{"minThreshold":{"value":100,"comparator":">="}}"#;
        let args: AlgorithmArguments = serde_json::from_str(json).unwrap();
        let arg = args.get("minThreshold").unwrap();
        assert_eq!(arg.value, Value::Number(100.0));
        assert_eq!(arg.comparator, ValueComparator::GreaterThanOrEqual);
    }
}
