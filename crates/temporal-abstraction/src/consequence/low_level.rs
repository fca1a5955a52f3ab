use std::sync::Arc;

use tracing::debug;

use crate::algorithm::Algorithm;
use crate::definition::PropositionDefinition;
use crate::engine::{Consequence, RuleContext};
use crate::finder::LowLevelAbstractionFinder;
use crate::proposition::Proposition;
use crate::sequence::Sequence;
use crate::types::{AbstractionError, AbstractionResult};

/// Runs the sliding-window finder over the definition's source parameters.
#[derive(Debug)]
pub struct LowLevelAbstractionConsequence {
    definition: Arc<PropositionDefinition>,
    algorithm: Option<Arc<dyn Algorithm>>,
}

impl LowLevelAbstractionConsequence {
    pub fn new(definition: Arc<PropositionDefinition>, algorithm: Option<Arc<dyn Algorithm>>) -> Self {
        Self { definition, algorithm }
    }
}

impl Consequence for LowLevelAbstractionConsequence {
    fn fire(&self, ctx: &mut RuleContext<'_>) -> AbstractionResult<()> {
        let low_level = self.definition.as_low_level().ok_or_else(|| {
            AbstractionError::Internal(format!("{} is not a low-level abstraction", self.definition.id()))
        })?;
        let finder = LowLevelAbstractionFinder::new(&self.definition, self.algorithm.as_deref())?;
        finder.initialize()?;

        let parameters: Vec<Arc<Proposition>> = ctx
            .facts_of(&low_level.abstracted_from)
            .into_iter()
            .filter(|p| p.is_temporal())
            .collect();
        let sequence = Sequence::new(parameters);
        if sequence.is_empty() {
            return Ok(());
        }

        let mut found: Vec<Arc<Proposition>> = Vec::new();
        match &low_level.context_id {
            Some(context_id) => {
                for context in ctx.facts_of([context_id]) {
                    let Some(interval) = context.interval else {
                        continue;
                    };
                    let inside = sequence.within(&interval);
                    finder.process(&inside, &mut found, ctx.derivations())?;
                }
            }
            None => {
                finder.process(&sequence, &mut found, ctx.derivations())?;
            }
        }
        debug!(definition = self.definition.id(), found = found.len(), "low-level abstraction fired");
        for fact in found {
            ctx.assert(fact);
        }
        Ok(())
    }
}
