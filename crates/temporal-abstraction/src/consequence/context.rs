use std::sync::Arc;

use tracing::debug;

use crate::definition::{ContextDefinition, PropositionDefinition};
use crate::engine::{Consequence, RuleContext};
use crate::proposition::Proposition;
use crate::types::{AbstractionError, AbstractionResult, Interval};

use super::combine;

/// Intersections over every combination of one fact per sub-context.
/// Combinations that do not overlap yield nothing.
pub fn intersections(groups: &[Vec<Arc<Proposition>>]) -> Vec<(Interval, Vec<Arc<Proposition>>)> {
    let mut partial: Vec<(Option<Interval>, Vec<Arc<Proposition>>)> = vec![(None, Vec::new())];
    for group in groups {
        let mut next = Vec::new();
        for (interval, members) in &partial {
            for fact in group {
                let Some(i) = fact.interval else {
                    continue;
                };
                let narrowed = match interval {
                    Some(current) => current.intersection(&i),
                    None => Some(i),
                };
                if let Some(narrowed) = narrowed {
                    let mut members = members.clone();
                    members.push(Arc::clone(fact));
                    next.push((Some(narrowed), members));
                }
            }
        }
        partial = next;
    }
    partial
        .into_iter()
        .filter_map(|(interval, members)| interval.map(|i| (i, members)))
        .collect()
}

#[derive(Debug)]
pub struct ContextConsequence {
    definition: Arc<PropositionDefinition>,
}

impl ContextConsequence {
    pub fn new(definition: Arc<PropositionDefinition>) -> Self {
        Self { definition }
    }

    fn context(&self) -> AbstractionResult<&ContextDefinition> {
        self.definition
            .as_context()
            .ok_or_else(|| AbstractionError::Internal(format!("{} is not a context", self.definition.id())))
    }
}

impl Consequence for ContextConsequence {
    fn fire(&self, ctx: &mut RuleContext<'_>) -> AbstractionResult<()> {
        let context = self.context()?;
        let mut outputs = Vec::new();

        for element in &context.induced_by {
            for inducer in ctx.facts_of([&element.proposition_id]) {
                let Some(interval) = inducer.interval else {
                    continue;
                };
                if !element.matches(&inducer) {
                    continue;
                }
                let derived = Arc::new(Proposition::context(
                    self.definition.id(),
                    context.induced_interval(&interval),
                ));
                ctx.derivations().proposition_asserted(&inducer, &derived);
                outputs.push(derived);
            }
        }

        if !context.sub_contexts.is_empty() {
            let groups: Vec<Vec<Arc<Proposition>>> = context
                .sub_contexts
                .iter()
                .map(|id| ctx.facts_of([id]))
                .collect();
            for (interval, members) in intersections(&groups) {
                let derived = Arc::new(Proposition::context(self.definition.id(), interval));
                for member in &members {
                    ctx.derivations().proposition_asserted(member, &derived);
                }
                outputs.push(derived);
            }
        }

        let combined = combine(
            outputs,
            self.definition.horizontal_temporal_inference(),
            context.gap_function,
            ctx.derivations(),
        );
        debug!(definition = self.definition.id(), asserted = combined.len(), "context fired");
        for fact in combined {
            ctx.assert(fact);
        }
        Ok(())
    }
}
