use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::debug;

use crate::definition::{CompoundLowLevelAbstractionDefinition, DefinitionKind, PropositionDefinition};
use crate::engine::{Consequence, RuleContext};
use crate::finder::{find_patterns, ValueGap, WindowSettings};
use crate::proposition::Proposition;
use crate::sequence::{Sequence, Temporal};
use crate::types::{AbstractionError, AbstractionResult, Interval, Value};

use super::combine;

/// A stretch of time with a fixed set of active source facts.
#[derive(Debug, Clone)]
pub struct Section {
    pub interval: Interval,
    pub active: Vec<Arc<Proposition>>,
}

impl Temporal for Section {
    fn interval(&self) -> Interval {
        self.interval
    }
}

/// Cut the time line at every start and finish. Each boundary where a
/// zero-length fact lies becomes a point section and each span between
/// consecutive boundaries becomes a span section, even when no fact covers
/// it, so that uncovered time separates the sections around it.
pub fn sections(facts: &[Arc<Proposition>]) -> Vec<Section> {
    let intervals: Vec<(Interval, &Arc<Proposition>)> = facts
        .iter()
        .filter_map(|p| p.interval.map(|i| (i, p)))
        .collect();
    let boundaries: Vec<i64> = intervals
        .iter()
        .flat_map(|(i, _)| [i.start, i.finish])
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let active_in = |section: &Interval| -> Vec<Arc<Proposition>> {
        intervals
            .iter()
            .filter(|(i, _)| i.contains(section))
            .map(|(_, p)| Arc::clone(p))
            .collect()
    };

    let mut out = Vec::new();
    for (k, &b) in boundaries.iter().enumerate() {
        if intervals.iter().any(|(i, _)| i.is_point() && i.start == b) {
            let point = Interval::point(b);
            out.push(Section {
                interval: point,
                active: active_in(&point),
            });
        }
        if let Some(&next) = boundaries.get(k + 1) {
            let span = Interval::new(b, next);
            out.push(Section {
                interval: span,
                active: active_in(&span),
            });
        }
    }
    out
}

/// Classification-matrix matching over interval sections.
#[derive(Debug)]
pub struct CompoundAbstractionConsequence {
    definition: Arc<PropositionDefinition>,
}

impl CompoundAbstractionConsequence {
    pub fn new(definition: Arc<PropositionDefinition>) -> Self {
        Self { definition }
    }

    fn compound(&self) -> AbstractionResult<&CompoundLowLevelAbstractionDefinition> {
        match self.definition.kind() {
            DefinitionKind::CompoundLowLevelAbstraction(d) => Ok(d),
            _ => Err(AbstractionError::Internal(format!(
                "{} is not a compound abstraction",
                self.definition.id()
            ))),
        }
    }
}

impl Consequence for CompoundAbstractionConsequence {
    fn fire(&self, ctx: &mut RuleContext<'_>) -> AbstractionResult<()> {
        let compound = self.compound()?;
        let facts = ctx.facts_of(&compound.abstracted_from());

        // unclassified sections stay in the sequence and break runs
        let (sections, values): (Vec<Section>, Vec<Option<Value>>) = sections(&facts)
            .into_iter()
            .map(|section| {
                let active: Vec<&Proposition> = section.active.iter().map(|p| p.as_ref()).collect();
                let value = compound.classify(&active).map(|c| Value::nominal(c.value.clone()));
                (section, value)
            })
            .unzip();
        if values.iter().all(Option::is_none) {
            return Ok(());
        }

        let sequence = Sequence::new(sections);
        let minimum = compound.minimum_number_of_values.max(1);
        let settings = WindowSettings {
            minimum_values: minimum,
            maximum_values: Some(minimum),
            value_gap: ValueGap::Function(compound.gap_between_values),
            skip: compound.skip,
            hti: self.definition.horizontal_temporal_inference(),
            gap_function: compound.gap_function,
            ..WindowSettings::default()
        };
        // sections are already in time order, so indices line up with values
        let matches = find_patterns(&sequence, &settings, |segment| {
            let window = &values[segment.first_index()..=segment.last_index()];
            let Some(first) = window[0].as_ref() else {
                return Ok(None);
            };
            let uniform = window.iter().all(|v| v.as_ref() == Some(first));
            Ok(uniform.then(|| first.clone()))
        })?;

        let mut outputs = Vec::with_capacity(matches.len());
        for m in &matches {
            let abstraction = Arc::new(Proposition::abstract_parameter(
                self.definition.id(),
                m.interval,
                Some(m.value.clone()),
            ));
            for section in &sequence.as_slice()[m.first..=m.last] {
                for source in &section.active {
                    ctx.derivations().proposition_asserted(source, &abstraction);
                }
            }
            outputs.push(abstraction);
        }

        let combined = combine(
            outputs,
            self.definition.horizontal_temporal_inference(),
            compound.gap_function,
            ctx.derivations(),
        );
        debug!(definition = self.definition.id(), asserted = combined.len(), "compound abstraction fired");
        for fact in combined {
            ctx.assert(fact);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fact(id: &str, start: i64, finish: i64) -> Arc<Proposition> {
        Arc::new(Proposition::abstract_parameter(id, Interval::new(start, finish), Some(Value::nominal("HIGH"))))
    }

    #[test]
    fn test_sections_split_at_boundaries() {
        let s = sections(&[fact("A", 0, 10), fact("B", 5, 15)]);
        let spans: Vec<(Interval, usize)> = s.iter().map(|s| (s.interval, s.active.len())).collect();
        assert_eq!(
            spans,
            vec![
                (Interval::new(0, 5), 1),
                (Interval::new(5, 10), 2),
                (Interval::new(10, 15), 1),
            ]
        );
    }

    #[test]
    fn test_sections_points_and_gaps() {
        let s = sections(&[fact("A", 0, 0), fact("B", 10, 20)]);
        let spans: Vec<Interval> = s.iter().map(|s| s.interval).collect();
        assert_eq!(spans, vec![Interval::point(0), Interval::new(0, 10), Interval::new(10, 20)]);
        assert!(s[1].active.is_empty());
    }
}
