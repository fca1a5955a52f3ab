//! Contexts: intervals induced by other facts, or by the overlap of other
//! contexts.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::gap::GapFunction;
use crate::types::{Interval, TimeSpan};

use super::extended::ExtendedPropositionDefinition;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextDefinition {
    #[serde(default)]
    pub induced_by: Vec<ExtendedPropositionDefinition>,
    /// Added to the inducing fact's start.
    #[serde(default)]
    pub start_offset: Option<TimeSpan>,
    /// Added to the inducing fact's finish.
    #[serde(default)]
    pub finish_offset: Option<TimeSpan>,
    /// Each combination of one fact per sub-context yields a context over
    /// their intersection.
    #[serde(default)]
    pub sub_contexts: Vec<String>,
    #[serde(default)]
    pub gap_function: GapFunction,
}

impl ContextDefinition {
    pub fn new() -> Self {
        Self {
            induced_by: Vec::new(),
            start_offset: None,
            finish_offset: None,
            sub_contexts: Vec::new(),
            gap_function: GapFunction::DEFAULT,
        }
    }

    pub fn induced_by(mut self, element: ExtendedPropositionDefinition) -> Self {
        self.induced_by.push(element);
        self
    }

    pub fn with_sub_context(mut self, id: impl Into<String>) -> Self {
        self.sub_contexts.push(id.into());
        self
    }

    pub fn with_offsets(mut self, start: Option<TimeSpan>, finish: Option<TimeSpan>) -> Self {
        self.start_offset = start;
        self.finish_offset = finish;
        self
    }

    pub fn abstracted_from(&self) -> BTreeSet<String> {
        self.induced_by
            .iter()
            .map(|e| e.proposition_id.clone())
            .chain(self.sub_contexts.iter().cloned())
            .collect()
    }

    /// Context interval for an inducing fact's interval.
    pub fn induced_interval(&self, inducer: &Interval) -> Interval {
        inducer.shifted(
            self.start_offset.map(|o| o.millis()).unwrap_or_default(),
            self.finish_offset.map(|o| o.millis()).unwrap_or_default(),
        )
    }
}

impl Default for ContextDefinition {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TimeUnit;

    #[test]
    fn test_induced_interval_offsets() {
        let def = ContextDefinition::new()
            .induced_by(ExtendedPropositionDefinition::new("Chemo"))
            .with_offsets(None, Some(TimeSpan::new(2, TimeUnit::Day)));
        let i = def.induced_interval(&Interval::new(0, 1_000));
        assert_eq!(i, Interval::new(0, 1_000 + 2 * 86_400_000));
        assert!(def.abstracted_from().contains("Chemo"));
    }
}
