//! Low-level abstractions: values classified over windows of one parameter.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::algorithm::{Algorithm, AlgorithmArguments, ParameterSegment};
use crate::finder::{ValueGap, WindowSettings};
use crate::gap::{GapFunction, HorizontalTemporalInference, MinMaxGapBetweenValues};
use crate::types::{AbstractionResult, TimeSpan, Value};

/// How the window bounds are chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlidingWindowWidthMode {
    /// Bounds come from the algorithm.
    #[default]
    Default,
    /// Bounds come from the definition's min/max number of values.
    Range,
    /// The whole remaining sequence.
    All,
}

/// One output value and the algorithm arguments that produce it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LowLevelAbstractionValueDefinition {
    pub value: Value,
    #[serde(default)]
    pub parameters: AlgorithmArguments,
}

impl LowLevelAbstractionValueDefinition {
    pub fn new(value: Value) -> Self {
        Self {
            value,
            parameters: AlgorithmArguments::new(),
        }
    }

    pub fn with_parameters(mut self, parameters: AlgorithmArguments) -> Self {
        self.parameters = parameters;
        self
    }
}

fn one() -> usize {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LowLevelAbstractionDefinition {
    pub abstracted_from: BTreeSet<String>,
    #[serde(default)]
    pub algorithm_id: Option<String>,
    #[serde(default)]
    pub value_definitions: Vec<LowLevelAbstractionValueDefinition>,
    #[serde(default)]
    pub window_mode: SlidingWindowWidthMode,
    #[serde(default = "one")]
    pub minimum_number_of_values: usize,
    #[serde(default)]
    pub maximum_number_of_values: Option<usize>,
    #[serde(default)]
    pub minimum_duration: Option<TimeSpan>,
    #[serde(default)]
    pub maximum_duration: Option<TimeSpan>,
    #[serde(default)]
    pub gap_between_values: MinMaxGapBetweenValues,
    #[serde(default)]
    pub skip_start: usize,
    #[serde(default = "one")]
    pub skip_end: usize,
    #[serde(default)]
    pub skip: usize,
    #[serde(default)]
    pub max_overlapping: usize,
    #[serde(default)]
    pub gap_function: GapFunction,
    /// When set, the parameters are scanned separately inside each interval
    /// of this context.
    #[serde(default)]
    pub context_id: Option<String>,
}

impl LowLevelAbstractionDefinition {
    pub fn new<I, S>(abstracted_from: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            abstracted_from: abstracted_from.into_iter().map(Into::into).collect(),
            algorithm_id: None,
            value_definitions: Vec::new(),
            window_mode: SlidingWindowWidthMode::Default,
            minimum_number_of_values: 1,
            maximum_number_of_values: None,
            minimum_duration: None,
            maximum_duration: None,
            gap_between_values: MinMaxGapBetweenValues::default(),
            skip_start: 0,
            skip_end: 1,
            skip: 0,
            max_overlapping: 0,
            gap_function: GapFunction::DEFAULT,
            context_id: None,
        }
    }

    pub fn with_algorithm(mut self, algorithm_id: impl Into<String>) -> Self {
        self.algorithm_id = Some(algorithm_id.into());
        self
    }

    pub fn with_value_definition(mut self, value_definition: LowLevelAbstractionValueDefinition) -> Self {
        self.value_definitions.push(value_definition);
        self
    }

    /// Switch to [`SlidingWindowWidthMode::Range`] with these bounds.
    pub fn with_range(mut self, minimum: usize, maximum: Option<usize>) -> Self {
        self.window_mode = SlidingWindowWidthMode::Range;
        self.minimum_number_of_values = minimum;
        self.maximum_number_of_values = maximum;
        self
    }

    /// Window bounds as `(minimum, maximum)`; a `None` maximum is unbounded.
    pub fn window_bounds(&self, algorithm: Option<&dyn Algorithm>) -> (usize, Option<usize>) {
        match self.window_mode {
            // a zero minimum starts the scan with the whole sequence
            SlidingWindowWidthMode::Range => (self.minimum_number_of_values, self.maximum_number_of_values),
            SlidingWindowWidthMode::All => (1, None),
            SlidingWindowWidthMode::Default => match algorithm {
                Some(a) => (a.minimum_number_of_values().max(1), a.maximum_number_of_values()),
                None => (1, Some(1)),
            },
        }
    }

    pub fn window_settings(
        &self,
        algorithm: Option<&dyn Algorithm>,
        hti: HorizontalTemporalInference,
    ) -> WindowSettings {
        let (minimum_values, maximum_values) = self.window_bounds(algorithm);
        WindowSettings {
            minimum_values,
            maximum_values,
            all: self.window_mode == SlidingWindowWidthMode::All,
            minimum_duration: self.minimum_duration.map(|d| d.millis()),
            maximum_duration: self.maximum_duration.map(|d| d.millis()),
            value_gap: ValueGap::MinMax(self.gap_between_values),
            skip_start: self.skip_start,
            skip_end: self.skip_end,
            skip: self.skip,
            max_overlapping: self.max_overlapping,
            advance_row_skip_end: algorithm.and_then(|a| a.advance_row_skip_end()),
            hti,
            gap_function: self.gap_function,
        }
    }

    /// First value definition, in declaration order, that the segment
    /// satisfies. Without an algorithm the first value definition matches.
    pub fn satisfied_by(
        &self,
        segment: &ParameterSegment<'_>,
        algorithm: Option<&dyn Algorithm>,
    ) -> AbstractionResult<Option<&LowLevelAbstractionValueDefinition>> {
        let Some(algorithm) = algorithm else {
            return Ok(self.value_definitions.first());
        };
        for value_definition in &self.value_definitions {
            if let Some(result) = algorithm.compute(segment, &value_definition.parameters)? {
                if result == value_definition.value || result == Value::Boolean(true) {
                    return Ok(Some(value_definition));
                }
            }
        }
        Ok(None)
    }
}
