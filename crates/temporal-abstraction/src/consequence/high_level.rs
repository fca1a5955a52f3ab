use std::sync::Arc;

use tracing::debug;

use crate::definition::{output_interval, DefinitionKind, HighLevelAbstractionDefinition, PropositionDefinition};
use crate::engine::{Consequence, RuleContext};
use crate::proposition::Proposition;
use crate::sequence::Temporal;
use crate::types::{AbstractionError, AbstractionResult, Interval};

use super::combine;

struct Search<'a> {
    definition: &'a HighLevelAbstractionDefinition,
    candidates: Vec<Vec<&'a Arc<Proposition>>>,
    chosen: Vec<&'a Arc<Proposition>>,
    found: Vec<Vec<Arc<Proposition>>>,
}

impl<'a> Search<'a> {
    /// Relations whose elements are both assigned once element `k` is.
    fn consistent(&self, k: usize, fact: &Arc<Proposition>) -> bool {
        if self.chosen.iter().any(|c| c.unique_id == fact.unique_id) {
            return false;
        }
        let at = |i: usize| if i == k { fact.interval() } else { self.chosen[i].interval() };
        self.definition
            .relations
            .iter()
            .filter(|r| r.lhs.max(r.rhs) == k)
            .all(|r| r.relation.has_relation(&at(r.lhs), &at(r.rhs)))
    }

    fn run(&mut self, k: usize) {
        if k == self.candidates.len() {
            self.found.push(self.chosen.iter().map(|p| Arc::clone(p)).collect());
            return;
        }
        for i in 0..self.candidates[k].len() {
            let fact = self.candidates[k][i];
            if self.consistent(k, fact) {
                self.chosen.push(fact);
                self.run(k + 1);
                self.chosen.pop();
            }
        }
    }
}

/// Every assignment of distinct facts to elements under which all
/// relations hold, indexed by element position.
pub fn match_elements(
    definition: &HighLevelAbstractionDefinition,
    facts: &[Arc<Proposition>],
) -> Vec<Vec<Arc<Proposition>>> {
    let candidates: Vec<Vec<&Arc<Proposition>>> = definition
        .elements
        .iter()
        .map(|element| {
            facts
                .iter()
                .filter(|p| p.is_temporal() && element.matches(p))
                .collect()
        })
        .collect();
    if candidates.is_empty() || candidates.iter().any(Vec::is_empty) {
        return Vec::new();
    }
    let mut search = Search {
        definition,
        candidates,
        chosen: Vec::new(),
        found: Vec::new(),
    };
    search.run(0);
    search.found
}

#[derive(Debug)]
pub struct HighLevelAbstractionConsequence {
    definition: Arc<PropositionDefinition>,
}

impl HighLevelAbstractionConsequence {
    pub fn new(definition: Arc<PropositionDefinition>) -> Self {
        Self { definition }
    }

    fn high_level(&self) -> AbstractionResult<&HighLevelAbstractionDefinition> {
        match self.definition.kind() {
            DefinitionKind::HighLevelAbstraction(d) => Ok(d),
            _ => Err(AbstractionError::Internal(format!(
                "{} is not a high-level abstraction",
                self.definition.id()
            ))),
        }
    }
}

impl Consequence for HighLevelAbstractionConsequence {
    fn fire(&self, ctx: &mut RuleContext<'_>) -> AbstractionResult<()> {
        let high_level = self.high_level()?;
        let facts = ctx.facts_of(&high_level.abstracted_from());

        let mut outputs = Vec::new();
        for assignment in match_elements(high_level, &facts) {
            let matched: Vec<Interval> = assignment.iter().map(|p| p.interval()).collect();
            let Some(interval) = output_interval(high_level.temporal_offset.as_ref(), &matched) else {
                continue;
            };
            let derived = Arc::new(Proposition::abstract_parameter(self.definition.id(), interval, None));
            for source in &assignment {
                ctx.derivations().proposition_asserted(source, &derived);
            }
            outputs.push(derived);
        }

        let combined = combine(
            outputs,
            self.definition.horizontal_temporal_inference(),
            high_level.gap_function,
            ctx.derivations(),
        );
        debug!(definition = self.definition.id(), asserted = combined.len(), "high-level abstraction fired");
        for fact in combined {
            ctx.assert(fact);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::ExtendedPropositionDefinition;
    use crate::relation::{AllenRelation, Relation};
    use crate::types::Value;

    fn state(id: &str, value: &str, start: i64, finish: i64) -> Arc<Proposition> {
        Arc::new(Proposition::abstract_parameter(
            id,
            Interval::new(start, finish),
            Some(Value::nominal(value)),
        ))
    }

    fn fever_during_neutropenia() -> HighLevelAbstractionDefinition {
        HighLevelAbstractionDefinition::new()
            .with_element(ExtendedPropositionDefinition::new("TEMP_STATE").with_value(Value::nominal("HIGH")))
            .with_element(ExtendedPropositionDefinition::new("ANC_STATE").with_value(Value::nominal("LOW")))
            .with_relation(0, 1, Relation::allen(AllenRelation::During))
    }

    #[test]
    fn test_relation_filters_assignments() {
        let facts = vec![
            state("ANC_STATE", "LOW", 0, 100),
            state("TEMP_STATE", "HIGH", 10, 20),
            state("TEMP_STATE", "HIGH", 90, 120),
        ];
        let found = match_elements(&fever_during_neutropenia(), &facts);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0][0].interval, Some(Interval::new(10, 20)));
    }

    #[test]
    fn test_missing_element_matches_nothing() {
        let facts = vec![state("TEMP_STATE", "HIGH", 10, 20)];
        assert!(match_elements(&fever_during_neutropenia(), &facts).is_empty());
    }

    #[test]
    fn test_elements_of_one_definition_take_distinct_facts() {
        let twice = HighLevelAbstractionDefinition::new()
            .with_element(ExtendedPropositionDefinition::new("E"))
            .with_element(ExtendedPropositionDefinition::new("E"));
        let one = vec![Arc::new(Proposition::event("E", Interval::new(0, 1)))];
        assert!(match_elements(&twice, &one).is_empty());
    }
}
