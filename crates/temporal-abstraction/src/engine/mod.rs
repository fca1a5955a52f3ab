//! Production-rule engine interface.
//!
//! A [`RuleSet`] is compiled by a [`RuleEngine`] into a [`RuleSession`] that
//! holds one key's facts. Rules are activated by changes to facts whose
//! definition id appears in their [`Condition`], and fire in salience order.

pub mod forward;
pub mod working_memory;

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use crate::derivations::DerivationsBuilder;
use crate::proposition::{sort_by_time, Proposition, UniqueId};
use crate::types::AbstractionResult;

pub use forward::{ForwardChainingEngine, ForwardChainingSession};
pub use working_memory::WorkingMemory;

/// Firing priority; higher fires first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Salience(pub i32);

impl Salience {
    /// Rules deriving a definition's own facts.
    pub const PRIMARY: Salience = Salience(10);
    /// Rules copying child facts up to a parent definition.
    pub const INVERSE_IS_A: Salience = Salience(5);
}

/// Definition ids whose facts activate a rule.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Condition {
    def_ids: BTreeSet<String>,
}

impl Condition {
    pub fn new<I, S>(def_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            def_ids: def_ids.into_iter().map(Into::into).collect(),
        }
    }

    pub fn def_ids(&self) -> &BTreeSet<String> {
        &self.def_ids
    }

    pub fn matches(&self, def_id: &str) -> bool {
        self.def_ids.contains(def_id)
    }
}

/// What a rule does when it fires.
pub trait Consequence: Send + Sync + fmt::Debug {
    fn fire(&self, ctx: &mut RuleContext<'_>) -> AbstractionResult<()>;
}

#[derive(Debug, Clone)]
pub struct Rule {
    pub name: String,
    pub salience: Salience,
    pub condition: Condition,
    pub consequence: Arc<dyn Consequence>,
}

impl Rule {
    pub fn new(
        name: impl Into<String>,
        salience: Salience,
        condition: Condition,
        consequence: Arc<dyn Consequence>,
    ) -> Self {
        Self {
            name: name.into(),
            salience,
            condition,
            consequence,
        }
    }
}

/// Rules in compile order.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, rule: Rule) {
        self.rules.push(rule);
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.name == name)
    }
}

/// What a firing consequence sees and changes.
pub struct RuleContext<'a> {
    rule: &'a str,
    memory: &'a WorkingMemory,
    derivations: &'a mut DerivationsBuilder,
    asserted: Vec<Arc<Proposition>>,
    retracted: Vec<UniqueId>,
}

impl<'a> RuleContext<'a> {
    pub fn new(rule: &'a str, memory: &'a WorkingMemory, derivations: &'a mut DerivationsBuilder) -> Self {
        Self {
            rule,
            memory,
            derivations,
            asserted: Vec::new(),
            retracted: Vec::new(),
        }
    }

    pub fn rule(&self) -> &str {
        self.rule
    }

    /// Facts with any of these definition ids, time-sorted.
    pub fn facts_of<'i, I>(&self, def_ids: I) -> Vec<Arc<Proposition>>
    where
        I: IntoIterator<Item = &'i String>,
    {
        let mut facts: Vec<Arc<Proposition>> = def_ids
            .into_iter()
            .flat_map(|id| self.memory.of_def(id).iter().cloned())
            .filter(|p| !self.retracted.contains(&p.unique_id))
            .collect();
        sort_by_time(&mut facts);
        facts
    }

    pub fn derivations(&mut self) -> &mut DerivationsBuilder {
        self.derivations
    }

    pub fn assert(&mut self, fact: Arc<Proposition>) {
        self.asserted.push(fact);
    }

    pub fn retract(&mut self, id: UniqueId) {
        self.retracted.push(id);
    }

    /// Facts asserted and ids retracted during the firing.
    pub fn into_changes(self) -> (Vec<Arc<Proposition>>, Vec<UniqueId>) {
        (self.asserted, self.retracted)
    }
}

/// Compiles rule sets into sessions.
pub trait RuleEngine: Send + Sync {
    type Session: RuleSession;

    fn compile(&self, rules: &RuleSet) -> AbstractionResult<Self::Session>;
}

/// One key's facts and the rules running over them.
pub trait RuleSession: Send {
    fn assert_fact(&mut self, fact: Arc<Proposition>);

    /// Remove a fact; rules depending on it re-fire on the next
    /// [`fire_all`](Self::fire_all).
    fn retract_fact(&mut self, id: &UniqueId) -> Option<Arc<Proposition>>;

    /// Fire until the agenda is empty. Returns the number of firings.
    fn fire_all(&mut self) -> AbstractionResult<usize>;

    fn facts_where(&self, predicate: &dyn Fn(&Proposition) -> bool) -> Vec<Arc<Proposition>>;

    /// Facts asserted from outside the session, time-sorted.
    fn input_facts(&self) -> Vec<Arc<Proposition>>;

    fn derivations(&self) -> &DerivationsBuilder;

    /// Hand over the derivations recorded so far, leaving an empty builder.
    fn take_derivations(&mut self) -> DerivationsBuilder;

    fn facts(&self) -> Vec<Arc<Proposition>> {
        self.facts_where(&|_: &Proposition| true)
    }
}
