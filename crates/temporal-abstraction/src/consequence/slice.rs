use std::sync::Arc;

use tracing::debug;

use crate::definition::{DefinitionKind, PropositionDefinition, SliceDefinition};
use crate::engine::{Consequence, RuleContext};
use crate::proposition::Proposition;
use crate::sequence::Temporal;
use crate::types::{AbstractionError, AbstractionResult};

/// Selects `[min_index, max_index)` of the time-sorted sources.
#[derive(Debug)]
pub struct SliceConsequence {
    definition: Arc<PropositionDefinition>,
}

impl SliceConsequence {
    pub fn new(definition: Arc<PropositionDefinition>) -> Self {
        Self { definition }
    }

    fn slice(&self) -> AbstractionResult<&SliceDefinition> {
        match self.definition.kind() {
            DefinitionKind::Slice(d) => Ok(d),
            _ => Err(AbstractionError::Internal(format!("{} is not a slice", self.definition.id()))),
        }
    }
}

impl Consequence for SliceConsequence {
    fn fire(&self, ctx: &mut RuleContext<'_>) -> AbstractionResult<()> {
        let slice = self.slice()?;
        let sources: Vec<Arc<Proposition>> = ctx
            .facts_of(&slice.abstracted_from)
            .into_iter()
            .filter(|p| p.is_temporal())
            .collect();
        let selected = &sources[slice.range(sources.len())];
        if selected.is_empty() {
            return Ok(());
        }

        if slice.merged_interval {
            let Some(hull) = selected.iter().map(|p| p.interval()).reduce(|a, b| a.span(&b)) else {
                return Ok(());
            };
            let derived = Arc::new(Proposition::abstract_parameter(self.definition.id(), hull, None));
            for source in selected {
                ctx.derivations().proposition_asserted(source, &derived);
            }
            ctx.assert(derived);
        } else {
            for source in selected {
                let derived = Arc::new(Proposition::abstract_parameter(
                    self.definition.id(),
                    source.interval(),
                    source.value.clone(),
                ));
                ctx.derivations().proposition_asserted(source, &derived);
                ctx.assert(derived);
            }
        }
        debug!(definition = self.definition.id(), selected = selected.len(), "slice fired");
        Ok(())
    }
}
