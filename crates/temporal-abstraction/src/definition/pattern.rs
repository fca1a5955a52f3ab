//! Pairs and sequential temporal patterns: chains of facts with a relation
//! between each adjacent pair.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::gap::GapFunction;
use crate::relation::Relation;

use super::extended::{ExtendedPropositionDefinition, TemporalPatternOffset};

/// An element after the first, with its relation to the previous element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubsequentElement {
    pub element: ExtendedPropositionDefinition,
    pub relation: Relation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequentialTemporalPatternDefinition {
    pub first: ExtendedPropositionDefinition,
    #[serde(default)]
    pub subsequent: Vec<SubsequentElement>,
    /// Assert a result when only a prefix of the chain is found.
    #[serde(default)]
    pub allow_partial_matches: bool,
    #[serde(default)]
    pub temporal_offset: Option<TemporalPatternOffset>,
    #[serde(default)]
    pub gap_function: GapFunction,
}

impl SequentialTemporalPatternDefinition {
    pub fn new(first: ExtendedPropositionDefinition) -> Self {
        Self {
            first,
            subsequent: Vec::new(),
            allow_partial_matches: false,
            temporal_offset: None,
            gap_function: GapFunction::DEFAULT,
        }
    }

    pub fn then(mut self, element: ExtendedPropositionDefinition, relation: Relation) -> Self {
        self.subsequent.push(SubsequentElement { element, relation });
        self
    }

    pub fn elements(&self) -> impl Iterator<Item = &ExtendedPropositionDefinition> {
        std::iter::once(&self.first).chain(self.subsequent.iter().map(|s| &s.element))
    }

    pub fn abstracted_from(&self) -> BTreeSet<String> {
        self.elements().map(|e| e.proposition_id.clone()).collect()
    }
}

/// Two facts related in time. When `second_required` is false a left fact
/// alone produces a result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairDefinition {
    pub left: ExtendedPropositionDefinition,
    pub right: ExtendedPropositionDefinition,
    pub relation: Relation,
    #[serde(default = "second_required")]
    pub second_required: bool,
    #[serde(default)]
    pub temporal_offset: Option<TemporalPatternOffset>,
}

fn second_required() -> bool {
    true
}

impl PairDefinition {
    pub fn new(
        left: ExtendedPropositionDefinition,
        right: ExtendedPropositionDefinition,
        relation: Relation,
    ) -> Self {
        Self {
            left,
            right,
            relation,
            second_required: true,
            temporal_offset: None,
        }
    }

    pub fn abstracted_from(&self) -> BTreeSet<String> {
        [self.left.proposition_id.clone(), self.right.proposition_id.clone()]
            .into_iter()
            .collect()
    }

    /// The equivalent two-element sequential pattern.
    pub fn as_sequential(&self) -> SequentialTemporalPatternDefinition {
        SequentialTemporalPatternDefinition {
            first: self.left.clone(),
            subsequent: vec![SubsequentElement {
                element: self.right.clone(),
                relation: self.relation,
            }],
            allow_partial_matches: !self.second_required,
            temporal_offset: self.temporal_offset,
            gap_function: GapFunction::DEFAULT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relation::AllenRelation;

    #[test]
    fn test_pair_as_sequential() {
        let mut pair = PairDefinition::new(
            ExtendedPropositionDefinition::new("A"),
            ExtendedPropositionDefinition::new("B"),
            Relation::allen(AllenRelation::Before),
        );
        pair.second_required = false;
        let seq = pair.as_sequential();
        assert!(seq.allow_partial_matches);
        assert_eq!(seq.elements().count(), 2);
        assert_eq!(pair.abstracted_from().len(), 2);
    }
}
