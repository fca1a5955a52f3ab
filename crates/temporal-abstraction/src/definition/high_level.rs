//! High-level abstractions: several facts related to each other in time.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::gap::GapFunction;
use crate::relation::Relation;
use crate::types::{AbstractionError, AbstractionResult};

use super::extended::{ExtendedPropositionDefinition, TemporalPatternOffset};

/// A relation that must hold between the facts matched to two elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementRelation {
    pub lhs: usize,
    pub rhs: usize,
    pub relation: Relation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HighLevelAbstractionDefinition {
    pub elements: Vec<ExtendedPropositionDefinition>,
    #[serde(default)]
    pub relations: Vec<ElementRelation>,
    #[serde(default)]
    pub temporal_offset: Option<TemporalPatternOffset>,
    #[serde(default)]
    pub gap_function: GapFunction,
}

impl HighLevelAbstractionDefinition {
    pub fn new() -> Self {
        Self {
            elements: Vec::new(),
            relations: Vec::new(),
            temporal_offset: None,
            gap_function: GapFunction::DEFAULT,
        }
    }

    /// Add an element and return its index.
    pub fn add_element(&mut self, element: ExtendedPropositionDefinition) -> usize {
        self.elements.push(element);
        self.elements.len() - 1
    }

    pub fn with_element(mut self, element: ExtendedPropositionDefinition) -> Self {
        self.add_element(element);
        self
    }

    /// Relate two elements by index.
    pub fn with_relation(mut self, lhs: usize, rhs: usize, relation: Relation) -> Self {
        self.relations.push(ElementRelation { lhs, rhs, relation });
        self
    }

    pub fn abstracted_from(&self) -> BTreeSet<String> {
        self.elements
            .iter()
            .map(|e| e.proposition_id.clone())
            .collect()
    }

    /// Relations and offsets must refer to existing elements.
    pub fn validate(&self, id: &str) -> AbstractionResult<()> {
        let n = self.elements.len();
        if n == 0 {
            return Err(AbstractionError::InvalidDefinition(format!(
                "{id}: high-level abstraction has no elements"
            )));
        }
        for r in &self.relations {
            if r.lhs >= n || r.rhs >= n || r.lhs == r.rhs {
                return Err(AbstractionError::InvalidDefinition(format!(
                    "{id}: relation between elements {} and {} is out of range",
                    r.lhs, r.rhs
                )));
            }
        }
        if let Some(offset) = &self.temporal_offset {
            if offset.start_index >= n || offset.finish_index >= n {
                return Err(AbstractionError::InvalidDefinition(format!(
                    "{id}: temporal offset refers to a missing element"
                )));
            }
        }
        Ok(())
    }
}

impl Default for HighLevelAbstractionDefinition {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relation::AllenRelation;

    #[test]
    fn test_validate_relation_indices() {
        let def = HighLevelAbstractionDefinition::new()
            .with_element(ExtendedPropositionDefinition::new("A"))
            .with_element(ExtendedPropositionDefinition::new("B"))
            .with_relation(0, 1, Relation::allen(AllenRelation::Before));
        assert!(def.validate("H").is_ok());
        let bad = def.clone().with_relation(0, 2, Relation::allen(AllenRelation::Before));
        assert!(bad.validate("H").is_err());
        assert!(HighLevelAbstractionDefinition::new().validate("H").is_err());
    }
}
