//! Compound low-level abstractions: a classification matrix over several
//! low-level abstractions that hold at the same time.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::gap::GapFunction;
use crate::proposition::Proposition;
use crate::types::Value;

/// How the requirements of a classification combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchOperator {
    /// Every requirement must hold.
    #[default]
    All,
    /// At least one requirement must hold.
    Any,
}

/// A low-level abstraction that must hold with a given value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationRequirement {
    pub low_level_id: String,
    pub value: Value,
}

/// A named output value and its requirements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueClassification {
    pub value: String,
    pub requirements: Vec<ClassificationRequirement>,
}

impl ValueClassification {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            requirements: Vec::new(),
        }
    }

    pub fn requires(mut self, low_level_id: impl Into<String>, value: Value) -> Self {
        self.requirements.push(ClassificationRequirement {
            low_level_id: low_level_id.into(),
            value,
        });
        self
    }

    /// Whether the facts active in one section satisfy this classification.
    pub fn matches(&self, operator: MatchOperator, active: &[&Proposition]) -> bool {
        let holds = |r: &ClassificationRequirement| {
            active
                .iter()
                .any(|p| p.def_id == r.low_level_id && p.value.as_ref() == Some(&r.value))
        };
        match operator {
            MatchOperator::All => !self.requirements.is_empty() && self.requirements.iter().all(holds),
            MatchOperator::Any => self.requirements.iter().any(holds),
        }
    }
}

fn one() -> usize {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompoundLowLevelAbstractionDefinition {
    pub classifications: Vec<ValueClassification>,
    #[serde(default)]
    pub operator: MatchOperator,
    #[serde(default = "one")]
    pub minimum_number_of_values: usize,
    /// Gap allowed between consecutive classified sections in one run.
    #[serde(default)]
    pub gap_between_values: GapFunction,
    #[serde(default)]
    pub skip: usize,
    #[serde(default)]
    pub gap_function: GapFunction,
}

impl CompoundLowLevelAbstractionDefinition {
    pub fn new(operator: MatchOperator) -> Self {
        Self {
            classifications: Vec::new(),
            operator,
            minimum_number_of_values: 1,
            gap_between_values: GapFunction::DEFAULT,
            skip: 0,
            gap_function: GapFunction::DEFAULT,
        }
    }

    pub fn with_classification(mut self, classification: ValueClassification) -> Self {
        self.classifications.push(classification);
        self
    }

    pub fn abstracted_from(&self) -> BTreeSet<String> {
        self.classifications
            .iter()
            .flat_map(|c| c.requirements.iter().map(|r| r.low_level_id.clone()))
            .collect()
    }

    /// First classification, in declaration order, matched by `active`.
    pub fn classify(&self, active: &[&Proposition]) -> Option<&ValueClassification> {
        self.classifications
            .iter()
            .find(|c| c.matches(self.operator, active))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Interval;

    fn fact(id: &str, value: &str) -> Proposition {
        Proposition::abstract_parameter(id, Interval::new(0, 1), Some(Value::nominal(value)))
    }

    #[test]
    fn test_all_requires_every_source() {
        let def = CompoundLowLevelAbstractionDefinition::new(MatchOperator::All).with_classification(
            ValueClassification::new("BOTH_HIGH")
                .requires("A", Value::nominal("HIGH"))
                .requires("B", Value::nominal("HIGH")),
        );
        let a = fact("A", "HIGH");
        let b = fact("B", "HIGH");
        let b_low = fact("B", "LOW");
        assert!(def.classify(&[&a, &b]).is_some());
        assert!(def.classify(&[&a, &b_low]).is_none());
        assert!(def.classify(&[&a]).is_none());
    }

    #[test]
    fn test_any_requires_one_source() {
        let def = CompoundLowLevelAbstractionDefinition::new(MatchOperator::Any).with_classification(
            ValueClassification::new("EITHER_HIGH")
                .requires("A", Value::nominal("HIGH"))
                .requires("B", Value::nominal("HIGH")),
        );
        let b = fact("B", "HIGH");
        assert_eq!(def.classify(&[&b]).unwrap().value, "EITHER_HIGH");
        assert_eq!(
            def.abstracted_from().into_iter().collect::<Vec<_>>(),
            vec!["A".to_string(), "B".to_string()]
        );
    }
}
