//! State detection: every value in the window lies in a range or set.

use crate::types::{AbstractionError, AbstractionResult, Value, ValueComparator, ValueType};

use super::{check_threshold, segment_values, Algorithm, AlgorithmArguments, AlgorithmParameter, ParameterSegment};

pub const STATE_DETECTOR: &str = "stateDetector";

/// Yields `true` when every value satisfies the `minThreshold`,
/// `maxThreshold` and `value` arguments that are present.
#[derive(Debug)]
pub struct StateDetector {
    parameters: Vec<AlgorithmParameter>,
}

impl StateDetector {
    pub fn new() -> Self {
        use ValueComparator::*;
        Self {
            parameters: vec![
                AlgorithmParameter::new("minThreshold", ValueType::Number, &[GreaterThan, GreaterThanOrEqual]),
                AlgorithmParameter::new("maxThreshold", ValueType::Number, &[LessThan, LessThanOrEqual]),
                AlgorithmParameter::new("value", ValueType::Any, &[Equal, NotEqual, In, NotIn]),
            ],
        }
    }
}

impl Default for StateDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl Algorithm for StateDetector {
    fn id(&self) -> &str {
        STATE_DETECTOR
    }

    fn input_value_type(&self) -> ValueType {
        ValueType::Any
    }

    fn minimum_number_of_values(&self) -> usize {
        1
    }

    fn maximum_number_of_values(&self) -> Option<usize> {
        Some(1)
    }

    fn parameters(&self) -> &[AlgorithmParameter] {
        &self.parameters
    }

    fn initialize(&self, arguments: &AlgorithmArguments) -> AbstractionResult<()> {
        arguments.number(STATE_DETECTOR, "minThreshold")?;
        arguments.number(STATE_DETECTOR, "maxThreshold")?;
        if arguments.is_empty() {
            return Err(AbstractionError::AlgorithmProcessing {
                algorithm: STATE_DETECTOR.to_string(),
                reason: "at least one of minThreshold, maxThreshold or value is required".into(),
            });
        }
        Ok(())
    }

    fn compute(
        &self,
        segment: &ParameterSegment<'_>,
        arguments: &AlgorithmArguments,
    ) -> AbstractionResult<Option<Value>> {
        let min = arguments.number(STATE_DETECTOR, "minThreshold")?;
        let max = arguments.number(STATE_DETECTOR, "maxThreshold")?;
        let expected = arguments.get("value");

        for value in segment_values(STATE_DETECTOR, segment)? {
            if min.is_some() || max.is_some() {
                let Some(n) = value.as_number() else {
                    return Ok(None);
                };
                if !check_threshold(n, min) || !check_threshold(n, max) {
                    return Ok(None);
                }
            }
            if let Some(arg) = expected {
                if !value.satisfies(arg.comparator, &arg.value) {
                    return Ok(None);
                }
            }
        }
        Ok(Some(Value::Boolean(true)))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::proposition::Proposition;
    use crate::sequence::{Segment, Sequence};

    fn seq(values: &[Value]) -> Sequence<Arc<Proposition>> {
        Sequence::new(
            values
                .iter()
                .enumerate()
                .map(|(i, v)| Arc::new(Proposition::primitive_parameter("HR", i as i64, v.clone())))
                .collect(),
        )
    }

    #[test]
    fn test_threshold_range() {
        let s = seq(&[Value::Number(120.0), Value::Number(90.0)]);
        let args = AlgorithmArguments::new().with("minThreshold", Value::Number(100.0), ValueComparator::GreaterThanOrEqual);
        let detector = StateDetector::new();
        let high = Segment::new(&s, 0, 0).unwrap();
        let normal = Segment::new(&s, 1, 1).unwrap();
        assert_eq!(detector.compute(&high, &args).unwrap(), Some(Value::Boolean(true)));
        assert_eq!(detector.compute(&normal, &args).unwrap(), None);
    }

    #[test]
    fn test_nominal_value_in_set() {
        let s = seq(&[Value::nominal("LOW")]);
        let args = AlgorithmArguments::new().with(
            "value",
            Value::List(vec![Value::nominal("LOW"), Value::nominal("VERY_LOW")]),
            ValueComparator::In,
        );
        let seg = Segment::new(&s, 0, 0).unwrap();
        assert_eq!(StateDetector::new().compute(&seg, &args).unwrap(), Some(Value::Boolean(true)));
    }

    #[test]
    fn test_initialize_requires_arguments() {
        assert!(StateDetector::new().initialize(&AlgorithmArguments::new()).is_err());
    }
}
