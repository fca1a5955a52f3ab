//! Trend detection using least-squares regression over the window.

use crate::types::{AbstractionResult, Value, ValueComparator, ValueType};

use super::{check_threshold, segment_values, Algorithm, AlgorithmArguments, AlgorithmParameter, ParameterSegment};
use crate::sequence::Temporal;

pub const TREND_DETECTOR: &str = "trendDetector";

const MILLIS_PER_HOUR: f64 = 3_600_000.0;

/// Yields `true` when the fitted slope (value units per hour) satisfies the
/// `minThreshold` and `maxThreshold` arguments.
#[derive(Debug)]
pub struct TrendDetector {
    parameters: Vec<AlgorithmParameter>,
}

impl TrendDetector {
    pub fn new() -> Self {
        use ValueComparator::*;
        Self {
            parameters: vec![
                AlgorithmParameter::new("minThreshold", ValueType::Number, &[GreaterThan, GreaterThanOrEqual]),
                AlgorithmParameter::new("maxThreshold", ValueType::Number, &[LessThan, LessThanOrEqual]),
            ],
        }
    }
}

impl Default for TrendDetector {
    fn default() -> Self {
        Self::new()
    }
}

/// Least-squares slope of `(x, y)` points, `None` when every x is equal.
pub fn slope(points: &[(f64, f64)]) -> Option<f64> {
    if points.len() < 2 {
        return None;
    }
    let n = points.len() as f64;
    let sum_x: f64 = points.iter().map(|(x, _)| x).sum();
    let sum_y: f64 = points.iter().map(|(_, y)| y).sum();
    let sum_xy: f64 = points.iter().map(|(x, y)| x * y).sum();
    let sum_x2: f64 = points.iter().map(|(x, _)| x * x).sum();

    // slope = (n*Σxy - Σx*Σy) / (n*Σx² - (Σx)²)
    let denom = n * sum_x2 - sum_x * sum_x;
    if denom.abs() < 1e-10 {
        return None;
    }
    Some((n * sum_xy - sum_x * sum_y) / denom)
}

impl Algorithm for TrendDetector {
    fn id(&self) -> &str {
        TREND_DETECTOR
    }

    fn input_value_type(&self) -> ValueType {
        ValueType::Number
    }

    fn minimum_number_of_values(&self) -> usize {
        2
    }

    fn maximum_number_of_values(&self) -> Option<usize> {
        None
    }

    fn parameters(&self) -> &[AlgorithmParameter] {
        &self.parameters
    }

    fn initialize(&self, arguments: &AlgorithmArguments) -> AbstractionResult<()> {
        arguments.number(TREND_DETECTOR, "minThreshold")?;
        arguments.number(TREND_DETECTOR, "maxThreshold")?;
        Ok(())
    }

    fn compute(
        &self,
        segment: &ParameterSegment<'_>,
        arguments: &AlgorithmArguments,
    ) -> AbstractionResult<Option<Value>> {
        let values = segment_values(TREND_DETECTOR, segment)?;
        let origin = segment.first().interval().start;
        let mut points = Vec::with_capacity(values.len());
        for (item, value) in segment.items().iter().zip(values) {
            let Some(y) = value.as_number() else {
                return Ok(None);
            };
            let x = (item.interval().start - origin) as f64 / MILLIS_PER_HOUR;
            points.push((x, y));
        }

        let Some(slope) = slope(&points) else {
            return Ok(None);
        };
        let min = arguments.number(TREND_DETECTOR, "minThreshold")?;
        let max = arguments.number(TREND_DETECTOR, "maxThreshold")?;
        if check_threshold(slope, min) && check_threshold(slope, max) {
            Ok(Some(Value::Boolean(true)))
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::proposition::Proposition;
    use crate::sequence::{Segment, Sequence};

    const HOUR: i64 = 3_600_000;

    #[test]
    fn test_slope() {
        let s = slope(&[(0.0, 1.0), (1.0, 3.0), (2.0, 5.0)]).unwrap();
        assert!((s - 2.0).abs() < 1e-9);
        assert!(slope(&[(1.0, 1.0), (1.0, 2.0)]).is_none());
    }

    #[test]
    fn test_increasing_trend() {
        let s = Sequence::new(
            [10.0, 20.0, 30.0]
                .iter()
                .enumerate()
                .map(|(i, v)| Arc::new(Proposition::primitive_parameter("Glucose", i as i64 * HOUR, Value::Number(*v))))
                .collect(),
        );
        let seg = Segment::new(&s, 0, 2).unwrap();
        let rising = AlgorithmArguments::new().with("minThreshold", Value::Number(5.0), ValueComparator::GreaterThan);
        let falling = AlgorithmArguments::new().with("maxThreshold", Value::Number(0.0), ValueComparator::LessThan);
        let detector = TrendDetector::new();
        assert_eq!(detector.compute(&seg, &rising).unwrap(), Some(Value::Boolean(true)));
        assert_eq!(detector.compute(&seg, &falling).unwrap(), None);
    }
}
