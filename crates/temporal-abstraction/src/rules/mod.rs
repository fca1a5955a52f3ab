//! Rule compilation: turn the definitions reachable from a query's ids into
//! a [`RuleSet`].
//!
//! Definitions are collected dependency-first, algorithms are validated,
//! then each derivable definition gets one primary rule and each definition
//! with inverse-is-a children gets one lower-salience propagation rule.

pub mod validate;

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use tracing::{debug, info};

use crate::algorithm::{Algorithm, AlgorithmSource};
use crate::consequence::{
    CompoundAbstractionConsequence, ContextConsequence, HighLevelAbstractionConsequence, InverseIsAConsequence,
    LowLevelAbstractionConsequence, SequentialPatternConsequence, SliceConsequence,
};
use crate::definition::{DefinitionKind, PropositionDefinition};
use crate::engine::{Condition, Consequence, Rule, RuleSet, Salience};
use crate::knowledge::KnowledgeSource;
use crate::types::{AbstractionError, AbstractionResult};

pub use validate::validate_algorithms;

/// Compiled rules plus the definitions they were built from.
#[derive(Debug, Clone)]
pub struct RuleBase {
    rules: RuleSet,
    definitions: Vec<Arc<PropositionDefinition>>,
    requested: BTreeSet<String>,
}

impl RuleBase {
    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Reachable definitions, dependencies before dependents.
    pub fn definitions(&self) -> &[Arc<PropositionDefinition>] {
        &self.definitions
    }

    pub fn definition(&self, id: &str) -> Option<&Arc<PropositionDefinition>> {
        self.definitions.iter().find(|d| d.id() == id)
    }

    /// Ids the rule base was built for.
    pub fn requested(&self) -> &BTreeSet<String> {
        &self.requested
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

pub struct RuleBaseBuilder<'a> {
    knowledge: &'a dyn KnowledgeSource,
    algorithms: &'a dyn AlgorithmSource,
}

impl<'a> RuleBaseBuilder<'a> {
    pub fn new(knowledge: &'a dyn KnowledgeSource, algorithms: &'a dyn AlgorithmSource) -> Self {
        Self { knowledge, algorithms }
    }

    /// Definitions reachable from `ids` through inverse-is-a,
    /// abstracted-from and context edges, dependencies first.
    pub fn reachable<I, S>(&self, ids: I) -> AbstractionResult<Vec<Arc<PropositionDefinition>>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut marks: HashMap<String, Mark> = HashMap::new();
        let mut order = Vec::new();
        for id in ids {
            self.visit(id.as_ref(), &mut marks, &mut order)?;
        }
        Ok(order)
    }

    fn visit(
        &self,
        id: &str,
        marks: &mut HashMap<String, Mark>,
        order: &mut Vec<Arc<PropositionDefinition>>,
    ) -> AbstractionResult<()> {
        match marks.get(id) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::Visiting) => {
                return Err(AbstractionError::InvalidDefinition(format!(
                    "definition {id} depends on itself"
                )))
            }
            None => {}
        }
        marks.insert(id.to_string(), Mark::Visiting);
        let definition = self.knowledge.require(id)?;
        for dependency in definition.dependencies() {
            self.visit(&dependency, marks, order)?;
        }
        marks.insert(id.to_string(), Mark::Done);
        order.push(definition);
        Ok(())
    }

    pub fn build<I, S>(&self, ids: I) -> AbstractionResult<RuleBase>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let requested: BTreeSet<String> = ids.into_iter().map(|s| s.as_ref().to_string()).collect();
        let definitions = self.reachable(&requested)?;
        let algorithms = validate_algorithms(&definitions, self.algorithms)?;

        let mut rules = RuleSet::new();
        for definition in &definitions {
            if let Some(rule) = primary_rule(definition, &algorithms)? {
                debug!(rule = %rule.name, "built rule");
                rules.push(rule);
            }
            if !definition.inverse_is_a().is_empty() {
                let children = definition.inverse_is_a().to_vec();
                rules.push(Rule::new(
                    format!("inverse_is_a:{}", definition.id()),
                    Salience::INVERSE_IS_A,
                    Condition::new(children.iter().cloned()),
                    Arc::new(InverseIsAConsequence::new(definition.id(), children)),
                ));
            }
        }
        info!(
            requested = requested.len(),
            definitions = definitions.len(),
            rules = rules.len(),
            "built rule base"
        );
        Ok(RuleBase {
            rules,
            definitions,
            requested,
        })
    }
}

fn primary_rule(
    definition: &Arc<PropositionDefinition>,
    algorithms: &HashMap<String, Arc<dyn Algorithm>>,
) -> AbstractionResult<Option<Rule>> {
    let consequence: Arc<dyn Consequence> = match definition.kind() {
        DefinitionKind::LowLevelAbstraction(_) => Arc::new(LowLevelAbstractionConsequence::new(
            Arc::clone(definition),
            algorithms.get(definition.id()).cloned(),
        )),
        DefinitionKind::CompoundLowLevelAbstraction(_) => {
            Arc::new(CompoundAbstractionConsequence::new(Arc::clone(definition)))
        }
        DefinitionKind::HighLevelAbstraction(_) => {
            Arc::new(HighLevelAbstractionConsequence::new(Arc::clone(definition)))
        }
        DefinitionKind::Slice(_) => Arc::new(SliceConsequence::new(Arc::clone(definition))),
        DefinitionKind::Pair(_) | DefinitionKind::SequentialTemporalPattern(_) => {
            Arc::new(SequentialPatternConsequence::new(Arc::clone(definition))?)
        }
        DefinitionKind::Context(_) => Arc::new(ContextConsequence::new(Arc::clone(definition))),
        DefinitionKind::PrimitiveParameter { .. }
        | DefinitionKind::Event
        | DefinitionKind::Constant
        | DefinitionKind::Aggregation(_) => return Ok(None),
    };

    let mut sources = definition.abstracted_from();
    if let Some(context_id) = definition.as_low_level().and_then(|d| d.context_id.clone()) {
        sources.insert(context_id);
    }
    Ok(Some(Rule::new(
        format!("{}:{}", definition.kind().name(), definition.id()),
        Salience::PRIMARY,
        Condition::new(sources),
        consequence,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::Algorithms;
    use crate::definition::{LowLevelAbstractionDefinition, SliceDefinition};
    use crate::knowledge::InMemoryKnowledgeSource;
    use crate::types::ValueType;

    fn knowledge() -> InMemoryKnowledgeSource {
        InMemoryKnowledgeSource::from_definitions([
            PropositionDefinition::primitive_parameter("HR", ValueType::Number),
            PropositionDefinition::low_level("HR_ANY", LowLevelAbstractionDefinition::new(["HR"])),
            PropositionDefinition::slice("FIRST_HR", SliceDefinition::new(["HR"], 0, Some(1))),
            PropositionDefinition::event("Vitals").with_inverse_is_a(["HR_ANY"]),
        ])
        .unwrap()
    }

    #[test]
    fn test_reachable_is_dependency_first() {
        let kb = knowledge();
        let algorithms = Algorithms::new();
        let builder = RuleBaseBuilder::new(&kb, &algorithms);
        let order: Vec<String> = builder
            .reachable(["Vitals"])
            .unwrap()
            .iter()
            .map(|d| d.id().to_string())
            .collect();
        assert_eq!(order, vec!["HR", "HR_ANY", "Vitals"]);
    }

    #[test]
    fn test_build_names_and_salience() {
        let kb = knowledge();
        let algorithms = Algorithms::new();
        let base = RuleBaseBuilder::new(&kb, &algorithms)
            .build(["Vitals", "FIRST_HR"])
            .unwrap();
        let rules = base.rules();
        assert_eq!(rules.len(), 3);
        assert_eq!(
            rules.get("low_level_abstraction:HR_ANY").map(|r| r.salience),
            Some(Salience::PRIMARY)
        );
        assert!(rules.get("slice:FIRST_HR").is_some());
        assert_eq!(
            rules.get("inverse_is_a:Vitals").map(|r| r.salience),
            Some(Salience::INVERSE_IS_A)
        );
        assert!(base.definition("HR").is_some());
    }

    #[test]
    fn test_unknown_id_fails() {
        let kb = knowledge();
        let algorithms = Algorithms::new();
        let err = RuleBaseBuilder::new(&kb, &algorithms).build(["missing"]).err();
        assert!(matches!(err, Some(AbstractionError::UnknownDefinition(_))));
    }

    #[test]
    fn test_cycle_fails() {
        let kb = InMemoryKnowledgeSource::from_definitions([
            PropositionDefinition::event("A").with_inverse_is_a(["B"]),
            PropositionDefinition::event("B").with_inverse_is_a(["A"]),
        ])
        .unwrap();
        let algorithms = Algorithms::new();
        let err = RuleBaseBuilder::new(&kb, &algorithms).build(["A"]).err();
        assert!(matches!(err, Some(AbstractionError::InvalidDefinition(_))));
    }
}
