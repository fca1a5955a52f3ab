use std::sync::Arc;

use tracing::debug;

use crate::definition::{output_interval, DefinitionKind, PropositionDefinition, SequentialTemporalPatternDefinition};
use crate::engine::{Consequence, RuleContext};
use crate::proposition::{Proposition, UniqueId};
use crate::sequence::Temporal;
use crate::types::{AbstractionError, AbstractionResult, Interval};

use super::combine;

/// Chain facts of successive elements, each related to the one before.
/// Returns one chain per first-element candidate that reaches the end, or,
/// with `allow_partial`, the longest prefix found.
pub fn match_chains(
    pattern: &SequentialTemporalPatternDefinition,
    facts: &[Arc<Proposition>],
) -> Vec<Vec<Arc<Proposition>>> {
    let candidates: Vec<Vec<&Arc<Proposition>>> = pattern
        .elements()
        .map(|element| {
            facts
                .iter()
                .filter(|p| p.is_temporal() && element.matches(p))
                .collect()
        })
        .collect();

    let mut chains = Vec::new();
    let Some(firsts) = candidates.first() else {
        return chains;
    };
    for first in firsts {
        let mut chain: Vec<Arc<Proposition>> = vec![Arc::clone(first)];
        for (k, step) in pattern.subsequent.iter().enumerate() {
            let previous = chain[chain.len() - 1].interval();
            let used: Vec<UniqueId> = chain.iter().map(|p| p.unique_id).collect();
            let next = candidates[k + 1]
                .iter()
                .find(|c| !used.contains(&c.unique_id) && step.relation.has_relation(&previous, &c.interval()));
            match next {
                Some(next) => chain.push(Arc::clone(next)),
                None => break,
            }
        }
        if chain.len() == candidates.len() || pattern.allow_partial_matches {
            chains.push(chain);
        }
    }
    chains
}

/// Sequential patterns, and pairs through their two-element form.
#[derive(Debug)]
pub struct SequentialPatternConsequence {
    definition: Arc<PropositionDefinition>,
    pattern: SequentialTemporalPatternDefinition,
}

impl SequentialPatternConsequence {
    pub fn new(definition: Arc<PropositionDefinition>) -> AbstractionResult<Self> {
        let pattern = match definition.kind() {
            DefinitionKind::SequentialTemporalPattern(p) => p.clone(),
            DefinitionKind::Pair(p) => p.as_sequential(),
            _ => {
                return Err(AbstractionError::InvalidDefinition(format!(
                    "{} is not a pair or sequential pattern",
                    definition.id()
                )))
            }
        };
        Ok(Self { definition, pattern })
    }
}

impl Consequence for SequentialPatternConsequence {
    fn fire(&self, ctx: &mut RuleContext<'_>) -> AbstractionResult<()> {
        let facts = ctx.facts_of(&self.pattern.abstracted_from());
        let mut outputs = Vec::new();
        for chain in match_chains(&self.pattern, &facts) {
            let matched: Vec<Interval> = chain.iter().map(|p| p.interval()).collect();
            let Some(interval) = output_interval(self.pattern.temporal_offset.as_ref(), &matched) else {
                continue;
            };
            let derived = Arc::new(Proposition::abstract_parameter(self.definition.id(), interval, None));
            for source in &chain {
                ctx.derivations().proposition_asserted(source, &derived);
            }
            outputs.push(derived);
        }

        let found = outputs.len();
        let combined = combine(
            outputs,
            self.definition.horizontal_temporal_inference(),
            self.pattern.gap_function,
            ctx.derivations(),
        );
        debug!(definition = self.definition.id(), found, asserted = combined.len(), "sequential pattern fired");
        for fact in combined {
            ctx.assert(fact);
        }
        Ok(())
    }
}
