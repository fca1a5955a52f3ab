//! Constraints on a single fact used by pattern-style definitions, and the
//! temporal offsets that place their output intervals.

use serde::{Deserialize, Serialize};

use crate::proposition::Proposition;
use crate::types::{Interval, TimeSpan, Value, ValueComparator};

/// A constraint on one named property of a fact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyConstraint {
    pub property: String,
    pub comparator: ValueComparator,
    pub value: Value,
}

impl PropertyConstraint {
    pub fn matches(&self, proposition: &Proposition) -> bool {
        proposition
            .property(&self.property)
            .is_some_and(|v| v.satisfies(self.comparator, &self.value))
    }
}

/// A proposition id plus optional value, duration and property constraints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtendedPropositionDefinition {
    pub proposition_id: String,
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub min_duration: Option<TimeSpan>,
    #[serde(default)]
    pub max_duration: Option<TimeSpan>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub property_constraints: Vec<PropertyConstraint>,
}

impl ExtendedPropositionDefinition {
    pub fn new(proposition_id: impl Into<String>) -> Self {
        Self {
            proposition_id: proposition_id.into(),
            value: None,
            min_duration: None,
            max_duration: None,
            property_constraints: Vec::new(),
        }
    }

    pub fn with_value(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }

    pub fn with_durations(mut self, min: Option<TimeSpan>, max: Option<TimeSpan>) -> Self {
        self.min_duration = min;
        self.max_duration = max;
        self
    }

    pub fn with_property_constraint(mut self, constraint: PropertyConstraint) -> Self {
        self.property_constraints.push(constraint);
        self
    }

    pub fn matches(&self, proposition: &Proposition) -> bool {
        if proposition.def_id != self.proposition_id {
            return false;
        }
        if let Some(value) = &self.value {
            if proposition.value.as_ref() != Some(value) {
                return false;
            }
        }
        let duration = proposition.interval.map(|i| i.duration_millis()).unwrap_or_default();
        if self.min_duration.is_some_and(|min| duration < min.millis()) {
            return false;
        }
        if self.max_duration.is_some_and(|max| duration > max.millis()) {
            return false;
        }
        self.property_constraints.iter().all(|c| c.matches(proposition))
    }
}

/// Which endpoint of a matched fact an offset is measured from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    #[default]
    Start,
    Finish,
}

impl Side {
    fn of(self, interval: &Interval) -> i64 {
        match self {
            Side::Start => interval.start,
            Side::Finish => interval.finish,
        }
    }
}

/// Places an output interval relative to matched facts, by element position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemporalPatternOffset {
    pub start_index: usize,
    #[serde(default)]
    pub start_side: Side,
    #[serde(default)]
    pub start_offset: TimeSpan,
    pub finish_index: usize,
    #[serde(default = "finish_side")]
    pub finish_side: Side,
    #[serde(default)]
    pub finish_offset: TimeSpan,
}

fn finish_side() -> Side {
    Side::Finish
}

impl TemporalPatternOffset {
    /// Output interval for facts matched to elements in order. `None` when an
    /// index has no matched fact.
    pub fn apply(&self, matched: &[Interval]) -> Option<Interval> {
        let start = matched.get(self.start_index)?;
        let finish = matched.get(self.finish_index)?;
        Some(Interval::new(
            self.start_side.of(start) + self.start_offset.millis(),
            self.finish_side.of(finish) + self.finish_offset.millis(),
        ))
    }
}

/// Hull of the matched intervals, or the offset interval when one applies.
pub fn output_interval(offset: Option<&TemporalPatternOffset>, matched: &[Interval]) -> Option<Interval> {
    offset
        .and_then(|o| o.apply(matched))
        .or_else(|| matched.iter().copied().reduce(|a, b| a.span(&b)))
}
