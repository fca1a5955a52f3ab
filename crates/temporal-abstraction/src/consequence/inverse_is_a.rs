use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::trace;

use crate::engine::{Consequence, RuleContext};
use crate::types::AbstractionResult;

/// Copies each child fact up to the parent definition.
#[derive(Debug)]
pub struct InverseIsAConsequence {
    parent_id: String,
    children: BTreeSet<String>,
}

impl InverseIsAConsequence {
    pub fn new<I, S>(parent_id: impl Into<String>, children: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            parent_id: parent_id.into(),
            children: children.into_iter().map(Into::into).collect(),
        }
    }
}

impl Consequence for InverseIsAConsequence {
    fn fire(&self, ctx: &mut RuleContext<'_>) -> AbstractionResult<()> {
        for child in ctx.facts_of(&self.children) {
            let copy = Arc::new(child.relabeled(self.parent_id.clone()));
            trace!(parent = %self.parent_id, child = %child.def_id, "propagating up is-a");
            ctx.derivations().proposition_asserted(&child, &copy);
            ctx.assert(copy);
        }
        Ok(())
    }
}
