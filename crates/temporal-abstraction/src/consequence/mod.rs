//! Rule consequences: the derivation step run when a definition's rule fires.

pub mod compound;
pub mod context;
pub mod high_level;
pub mod inverse_is_a;
pub mod low_level;
pub mod sequential;
pub mod slice;

use std::sync::Arc;

use tracing::trace;

use crate::derivations::DerivationsBuilder;
use crate::gap::{GapFunction, HorizontalTemporalInference};
use crate::proposition::Proposition;
use crate::sequence::Temporal;
use crate::types::Interval;

pub use compound::CompoundAbstractionConsequence;
pub use context::ContextConsequence;
pub use high_level::HighLevelAbstractionConsequence;
pub use inverse_is_a::InverseIsAConsequence;
pub use low_level::LowLevelAbstractionConsequence;
pub use sequential::SequentialPatternConsequence;
pub use slice::SliceConsequence;

fn respanned(p: &Proposition, interval: Interval) -> Proposition {
    let mut copy = p.relabeled(p.def_id.clone());
    copy.interval = Some(interval);
    copy
}

/// Combine same-valued outputs whose intervals horizontal inference or the
/// gap function accepts. Links of combined facts move to their replacement.
pub fn combine(
    outputs: Vec<Arc<Proposition>>,
    hti: HorizontalTemporalInference,
    gap_function: GapFunction,
    derivations: &mut DerivationsBuilder,
) -> Vec<Arc<Proposition>> {
    let mut groups: Vec<Vec<Arc<Proposition>>> = Vec::new();
    for p in outputs {
        match groups
            .iter_mut()
            .find(|g| g[0].def_id == p.def_id && g[0].value == p.value)
        {
            Some(group) => group.push(p),
            None => groups.push(vec![p]),
        }
    }

    let mut combined = Vec::new();
    for mut group in groups {
        group.sort_by_key(|p| {
            let i = p.interval();
            (i.start, i.finish)
        });
        let mut iter = group.into_iter();
        let Some(mut current) = iter.next() else {
            continue;
        };
        for next in iter {
            let (a, b) = (current.interval(), next.interval());
            if a == b || hti.execute(&a, &b) || gap_function.accepts(&a, &b) {
                let merged = Arc::new(respanned(&current, a.span(&b)));
                trace!(def_id = %merged.def_id, interval = %a.span(&b), "combining");
                derivations.proposition_combined(&[Arc::clone(&current), Arc::clone(&next)], &merged);
                current = merged;
            } else {
                combined.push(current);
                current = next;
            }
        }
        combined.push(current);
    }
    combined
}
