//! Built-in forward-chaining engine.

use std::cmp::Reverse;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, trace};

use crate::derivations::DerivationsBuilder;
use crate::proposition::{sort_by_time, Proposition, UniqueId};
use crate::types::{AbstractionError, AbstractionResult};

use super::{Rule, RuleContext, RuleEngine, RuleSession, RuleSet, WorkingMemory};

pub const DEFAULT_FIRING_LIMIT: usize = 10_000;

/// Salience-ordered agenda engine. A rule that fires again first loses the
/// facts it asserted last time.
#[derive(Debug, Clone)]
pub struct ForwardChainingEngine {
    firing_limit: usize,
}

impl ForwardChainingEngine {
    pub fn new(firing_limit: usize) -> Self {
        Self { firing_limit }
    }

    pub fn firing_limit(&self) -> usize {
        self.firing_limit
    }
}

impl Default for ForwardChainingEngine {
    fn default() -> Self {
        Self::new(DEFAULT_FIRING_LIMIT)
    }
}

impl RuleEngine for ForwardChainingEngine {
    type Session = ForwardChainingSession;

    fn compile(&self, rules: &RuleSet) -> AbstractionResult<Self::Session> {
        let mut names = HashSet::new();
        let mut index: HashMap<String, Vec<usize>> = HashMap::new();
        for (i, rule) in rules.rules().iter().enumerate() {
            if !names.insert(rule.name.as_str()) {
                return Err(AbstractionError::InvalidDefinition(format!(
                    "duplicate rule name {}",
                    rule.name
                )));
            }
            for def_id in rule.condition.def_ids() {
                index.entry(def_id.clone()).or_default().push(i);
            }
        }
        debug!(rules = rules.len(), "compiled rule set");
        Ok(ForwardChainingSession {
            rules: rules.rules().into(),
            index: Arc::new(index),
            memory: WorkingMemory::new(),
            derivations: DerivationsBuilder::new(),
            inputs: HashSet::new(),
            outputs: vec![Vec::new(); rules.len()],
            agenda: BTreeSet::new(),
            firing_limit: self.firing_limit,
        })
    }
}

pub struct ForwardChainingSession {
    rules: Arc<[Rule]>,
    index: Arc<HashMap<String, Vec<usize>>>,
    memory: WorkingMemory,
    derivations: DerivationsBuilder,
    inputs: HashSet<UniqueId>,
    /// Facts each rule asserted in its latest firing.
    outputs: Vec<Vec<UniqueId>>,
    agenda: BTreeSet<(Reverse<super::Salience>, usize)>,
    firing_limit: usize,
}

impl ForwardChainingSession {
    fn activate(&mut self, def_id: &str) {
        if let Some(rules) = self.index.get(def_id) {
            for &i in rules {
                self.agenda.insert((Reverse(self.rules[i].salience), i));
            }
        }
    }

    fn insert(&mut self, fact: Arc<Proposition>) {
        let def_id = fact.def_id.clone();
        if self.memory.insert(fact) {
            self.activate(&def_id);
        }
    }

    fn remove(&mut self, id: &UniqueId) -> Option<Arc<Proposition>> {
        let fact = self.memory.remove(id)?;
        self.derivations.proposition_retracted(id);
        self.activate(&fact.def_id);
        Some(fact)
    }

    pub fn working_memory(&self) -> &WorkingMemory {
        &self.memory
    }

    /// Rules currently waiting to fire, by name, in firing order.
    pub fn agenda(&self) -> Vec<&str> {
        self.agenda
            .iter()
            .map(|(_, i)| self.rules[*i].name.as_str())
            .collect()
    }
}

impl RuleSession for ForwardChainingSession {
    fn assert_fact(&mut self, fact: Arc<Proposition>) {
        self.inputs.insert(fact.unique_id);
        self.insert(fact);
    }

    fn retract_fact(&mut self, id: &UniqueId) -> Option<Arc<Proposition>> {
        self.inputs.remove(id);
        self.remove(id)
    }

    fn fire_all(&mut self) -> AbstractionResult<usize> {
        let rules = Arc::clone(&self.rules);
        let mut fired = 0;
        while let Some((_, i)) = self.agenda.pop_first() {
            fired += 1;
            if fired > self.firing_limit {
                self.agenda.clear();
                return Err(AbstractionError::FiringLimitExceeded(self.firing_limit));
            }
            let rule = &rules[i];
            for id in std::mem::take(&mut self.outputs[i]) {
                self.remove(&id);
            }
            trace!(rule = %rule.name, "firing");

            let mut ctx = RuleContext::new(&rule.name, &self.memory, &mut self.derivations);
            rule.consequence.fire(&mut ctx)?;
            let (asserted, retracted) = ctx.into_changes();

            for id in &retracted {
                self.inputs.remove(id);
                self.remove(id);
            }
            debug!(rule = %rule.name, asserted = asserted.len(), retracted = retracted.len(), "fired");
            for fact in asserted {
                self.outputs[i].push(fact.unique_id);
                self.insert(fact);
            }
        }
        Ok(fired)
    }

    fn facts_where(&self, predicate: &dyn Fn(&Proposition) -> bool) -> Vec<Arc<Proposition>> {
        let mut facts: Vec<Arc<Proposition>> = self
            .memory
            .iter()
            .filter(|p| predicate(p))
            .cloned()
            .collect();
        sort_by_time(&mut facts);
        facts
    }

    fn input_facts(&self) -> Vec<Arc<Proposition>> {
        self.facts_where(&|p: &Proposition| self.inputs.contains(&p.unique_id))
    }

    fn derivations(&self) -> &DerivationsBuilder {
        &self.derivations
    }

    fn take_derivations(&mut self) -> DerivationsBuilder {
        std::mem::take(&mut self.derivations)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::engine::{Condition, Consequence, Salience};
    use crate::types::{Interval, Value};

    /// Copies every fact of `from` to `to`, linking each copy to its source.
    #[derive(Debug)]
    struct CopyFacts {
        from: String,
        to: String,
        firings: Arc<AtomicUsize>,
    }

    impl Consequence for CopyFacts {
        fn fire(&self, ctx: &mut RuleContext<'_>) -> AbstractionResult<()> {
            self.firings.fetch_add(1, Ordering::SeqCst);
            for fact in ctx.facts_of([&self.from]) {
                let copy = Arc::new(fact.relabeled(self.to.clone()));
                ctx.derivations().proposition_asserted(&fact, &copy);
                ctx.assert(copy);
            }
            Ok(())
        }
    }

    fn copy_rule(name: &str, from: &str, to: &str, salience: Salience) -> (Rule, Arc<AtomicUsize>) {
        let firings = Arc::new(AtomicUsize::new(0));
        let rule = Rule::new(
            name,
            salience,
            Condition::new([from]),
            Arc::new(CopyFacts {
                from: from.into(),
                to: to.into(),
                firings: Arc::clone(&firings),
            }),
        );
        (rule, firings)
    }

    fn fact(def_id: &str, at: i64) -> Arc<Proposition> {
        Arc::new(Proposition::primitive_parameter(def_id, at, Value::Number(1.0)))
    }

    #[test]
    fn test_chain_fires_in_order() {
        let mut rules = RuleSet::new();
        let (a_to_b, _) = copy_rule("a_to_b", "A", "B", Salience::PRIMARY);
        let (b_to_c, _) = copy_rule("b_to_c", "B", "C", Salience::PRIMARY);
        rules.push(a_to_b);
        rules.push(b_to_c);
        let mut session = ForwardChainingEngine::default().compile(&rules).unwrap();
        session.assert_fact(fact("A", 0));
        assert_eq!(session.fire_all().unwrap(), 2);
        let c = session.facts_where(&|p: &Proposition| p.def_id == "C");
        assert_eq!(c.len(), 1);
        assert_eq!(session.input_facts().len(), 1);
        assert!(session.derivations().is_consistent());
    }

    #[test]
    fn test_salience_orders_agenda() {
        let mut rules = RuleSet::new();
        let (low, _) = copy_rule("low", "A", "L", Salience::INVERSE_IS_A);
        let (high, _) = copy_rule("high", "A", "H", Salience::PRIMARY);
        rules.push(low);
        rules.push(high);
        let mut session = ForwardChainingEngine::default().compile(&rules).unwrap();
        session.assert_fact(fact("A", 0));
        assert_eq!(session.agenda(), vec!["high", "low"]);
    }

    #[test]
    fn test_refiring_replaces_previous_outputs() {
        let mut rules = RuleSet::new();
        let (rule, firings) = copy_rule("a_to_b", "A", "B", Salience::PRIMARY);
        rules.push(rule);
        let mut session = ForwardChainingEngine::default().compile(&rules).unwrap();
        session.assert_fact(fact("A", 0));
        session.fire_all().unwrap();
        session.assert_fact(fact("A", 1));
        session.fire_all().unwrap();
        assert_eq!(firings.load(Ordering::SeqCst), 2);
        assert_eq!(session.facts_where(&|p: &Proposition| p.def_id == "B").len(), 2);
        assert!(session.derivations().is_consistent());
    }

    #[test]
    fn test_retract_input_retracts_derived() {
        let mut rules = RuleSet::new();
        let (rule, _) = copy_rule("a_to_b", "A", "B", Salience::PRIMARY);
        rules.push(rule);
        let mut session = ForwardChainingEngine::default().compile(&rules).unwrap();
        let a = fact("A", 0);
        session.assert_fact(Arc::clone(&a));
        session.fire_all().unwrap();
        session.retract_fact(&a.unique_id).unwrap();
        session.fire_all().unwrap();
        assert!(session.facts().is_empty());
        assert!(session.derivations().is_empty());
    }

    #[test]
    fn test_cycle_hits_firing_limit() {
        let mut rules = RuleSet::new();
        let (ab, _) = copy_rule("a_to_b", "A", "B", Salience::PRIMARY);
        let (ba, _) = copy_rule("b_to_a", "B", "A", Salience::PRIMARY);
        rules.push(ab);
        rules.push(ba);
        let mut session = ForwardChainingEngine::new(50).compile(&rules).unwrap();
        session.assert_fact(fact("A", 0));
        let err = session.fire_all().unwrap_err();
        assert!(matches!(err, AbstractionError::FiringLimitExceeded(50)));
    }

    #[test]
    fn test_duplicate_rule_names_rejected() {
        let mut rules = RuleSet::new();
        let (a, _) = copy_rule("same", "A", "B", Salience::PRIMARY);
        let (b, _) = copy_rule("same", "B", "C", Salience::PRIMARY);
        rules.push(a);
        rules.push(b);
        assert!(ForwardChainingEngine::default().compile(&rules).is_err());
    }

    #[test]
    fn test_take_derivations_leaves_empty_builder() {
        let mut rules = RuleSet::new();
        let (rule, _) = copy_rule("a_to_b", "A", "B", Salience::PRIMARY);
        rules.push(rule);
        let mut session = ForwardChainingEngine::default().compile(&rules).unwrap();
        session.assert_fact(Arc::new(Proposition::event("A", Interval::new(0, 5))));
        session.fire_all().unwrap();
        let taken = session.take_derivations();
        assert!(!taken.is_empty());
        assert!(session.derivations().is_empty());
    }
}
