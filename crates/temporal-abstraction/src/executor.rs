//! Per-key execution of a compiled rule base.
//!
//! An [`Executor`] walks each key through
//! `Uninitialized → RuleBaseBuilt → SessionActive → RulesFired →
//! ResultsExtracted → Reset`, reporting out-of-order calls as
//! [`AbstractionError::InvalidState`]. In stateful mode one session per key
//! is kept between calls; growing the rule base reattaches every kept
//! session's input facts to a session compiled from the new rule base.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::algorithm::AlgorithmSource;
use crate::engine::forward::DEFAULT_FIRING_LIMIT;
use crate::engine::{ForwardChainingEngine, RuleEngine, RuleSession};
use crate::knowledge::KnowledgeSource;
use crate::proposition::{Proposition, UniqueId};
use crate::rules::{RuleBase, RuleBaseBuilder};
use crate::types::{AbstractionError, AbstractionResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutorConfig {
    pub firing_limit: usize,
    /// Keep one session per key across calls.
    pub stateful: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            firing_limit: DEFAULT_FIRING_LIMIT,
            stateful: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutorState {
    Uninitialized,
    RuleBaseBuilt,
    SessionActive,
    RulesFired,
    ResultsExtracted,
    Reset,
}

impl ExecutorState {
    pub fn as_str(self) -> &'static str {
        match self {
            ExecutorState::Uninitialized => "uninitialized",
            ExecutorState::RuleBaseBuilt => "rule_base_built",
            ExecutorState::SessionActive => "session_active",
            ExecutorState::RulesFired => "rules_fired",
            ExecutorState::ResultsExtracted => "results_extracted",
            ExecutorState::Reset => "reset",
        }
    }
}

/// One key's output: the facts of the requested definitions plus every
/// derivation link recorded for the key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyResults {
    pub key_id: String,
    pub propositions: Vec<Arc<Proposition>>,
    pub forward: HashMap<UniqueId, Vec<UniqueId>>,
    pub backward: HashMap<UniqueId, Vec<UniqueId>>,
    /// Every fact an id above refers to.
    pub references: HashMap<UniqueId, Arc<Proposition>>,
}

pub struct Executor<E: RuleEngine = ForwardChainingEngine> {
    engine: E,
    knowledge: Arc<dyn KnowledgeSource>,
    algorithms: Arc<dyn AlgorithmSource>,
    config: ExecutorConfig,
    state: ExecutorState,
    rule_base: Option<RuleBase>,
    sessions: HashMap<String, E::Session>,
    current: Option<(String, E::Session)>,
}

impl Executor<ForwardChainingEngine> {
    pub fn new(
        knowledge: Arc<dyn KnowledgeSource>,
        algorithms: Arc<dyn AlgorithmSource>,
        config: ExecutorConfig,
    ) -> Self {
        Self::with_engine(ForwardChainingEngine::new(config.firing_limit), knowledge, algorithms, config)
    }
}

impl<E: RuleEngine> Executor<E> {
    pub fn with_engine(
        engine: E,
        knowledge: Arc<dyn KnowledgeSource>,
        algorithms: Arc<dyn AlgorithmSource>,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            engine,
            knowledge,
            algorithms,
            config,
            state: ExecutorState::Uninitialized,
            rule_base: None,
            sessions: HashMap::new(),
            current: None,
        }
    }

    pub fn state(&self) -> ExecutorState {
        self.state
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    pub fn rule_base(&self) -> Option<&RuleBase> {
        self.rule_base.as_ref()
    }

    /// Keys with a kept session.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    fn require(&self, allowed: &[ExecutorState], expected: &'static str) -> AbstractionResult<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(AbstractionError::InvalidState {
                expected,
                actual: self.state.as_str(),
            })
        }
    }

    fn compiled_rule_base(&self) -> AbstractionResult<&RuleBase> {
        self.rule_base.as_ref().ok_or(AbstractionError::InvalidState {
            expected: "rule_base_built",
            actual: self.state.as_str(),
        })
    }

    pub fn build_rule_base<I, S>(&mut self, ids: I) -> AbstractionResult<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.require(&[ExecutorState::Uninitialized], "uninitialized")?;
        let rule_base =
            RuleBaseBuilder::new(self.knowledge.as_ref(), self.algorithms.as_ref()).build(ids)?;
        self.rule_base = Some(rule_base);
        self.state = ExecutorState::RuleBaseBuilt;
        Ok(())
    }

    /// Grow the rule base with more requested ids. Kept sessions are
    /// snapshotted and reattached to sessions of the rebuilt rule base.
    /// Returns false when every id was already requested.
    pub fn add_proposition_ids<I, S>(&mut self, ids: I) -> AbstractionResult<bool>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.require(
            &[ExecutorState::RuleBaseBuilt, ExecutorState::Reset],
            "rule_base_built or reset",
        )?;
        let current = self.compiled_rule_base()?;
        let mut requested: BTreeSet<String> = current.requested().clone();
        let before = requested.len();
        requested.extend(ids.into_iter().map(|s| s.as_ref().to_string()));
        if requested.len() == before {
            return Ok(false);
        }

        let rule_base =
            RuleBaseBuilder::new(self.knowledge.as_ref(), self.algorithms.as_ref()).build(&requested)?;
        let mut reattached = HashMap::with_capacity(self.sessions.len());
        for (key_id, session) in self.sessions.drain() {
            let snapshot = serde_json::to_string(&session.input_facts()).map_err(|e| {
                AbstractionError::Internal(format!("failed to snapshot session for key {key_id}: {e}"))
            })?;
            let facts: Vec<Arc<Proposition>> = serde_json::from_str(&snapshot).map_err(|e| {
                AbstractionError::Internal(format!("failed to restore session for key {key_id}: {e}"))
            })?;
            let mut fresh = self.engine.compile(rule_base.rules())?;
            for fact in facts {
                fresh.assert_fact(fact);
            }
            debug!(key_id = %key_id, "reattached session");
            reattached.insert(key_id, fresh);
        }
        self.sessions = reattached;
        info!(
            requested = requested.len(),
            sessions = self.sessions.len(),
            "rule base grown"
        );
        self.rule_base = Some(rule_base);
        Ok(true)
    }

    /// Open a session for `key_id` and assert `facts` into it. In stateful
    /// mode the key's kept session is reused.
    pub fn create_session(
        &mut self,
        key_id: &str,
        facts: impl IntoIterator<Item = Arc<Proposition>>,
    ) -> AbstractionResult<()> {
        self.require(
            &[ExecutorState::RuleBaseBuilt, ExecutorState::Reset],
            "rule_base_built or reset",
        )?;
        let kept = if self.config.stateful {
            self.sessions.remove(key_id)
        } else {
            None
        };
        let mut session = match kept {
            Some(session) => session,
            None => self.engine.compile(self.compiled_rule_base()?.rules())?,
        };
        for fact in facts {
            session.assert_fact(fact);
        }
        self.current = Some((key_id.to_string(), session));
        self.state = ExecutorState::SessionActive;
        Ok(())
    }

    pub fn fire(&mut self) -> AbstractionResult<usize> {
        self.require(&[ExecutorState::SessionActive], "session_active")?;
        let (key_id, session) = self.current.as_mut().ok_or(AbstractionError::InvalidState {
            expected: "session_active",
            actual: "no session",
        })?;
        let fired = session.fire_all()?;
        debug!(key_id = %key_id, fired, "rules fired");
        self.state = ExecutorState::RulesFired;
        Ok(fired)
    }

    pub fn extract_results(&mut self) -> AbstractionResult<KeyResults> {
        self.require(&[ExecutorState::RulesFired], "rules_fired")?;
        let requested = self.compiled_rule_base()?.requested().clone();
        let (key_id, session) = self.current.as_ref().ok_or(AbstractionError::InvalidState {
            expected: "rules_fired",
            actual: "no session",
        })?;

        let propositions = session.facts_where(&|p: &Proposition| requested.contains(&p.def_id));
        let derivations = session.derivations();
        let references: HashMap<UniqueId, Arc<Proposition>> = derivations
            .referenced()
            .chain(propositions.iter())
            .map(|p| (p.unique_id, Arc::clone(p)))
            .collect();
        let results = KeyResults {
            key_id: key_id.clone(),
            forward: derivations.forward_ids(),
            backward: derivations.backward_ids(),
            references,
            propositions,
        };
        self.state = ExecutorState::ResultsExtracted;
        Ok(results)
    }

    /// Finish the current key. A stateless session is dropped with its
    /// derivations; a stateful one is kept for the key's next call.
    pub fn reset(&mut self) -> AbstractionResult<()> {
        self.require(&[ExecutorState::ResultsExtracted], "results_extracted")?;
        if let Some((key_id, mut session)) = self.current.take() {
            if self.config.stateful {
                self.sessions.insert(key_id, session);
            } else {
                session.take_derivations().reset();
            }
        }
        self.state = ExecutorState::Reset;
        Ok(())
    }

    /// Drop the current key after a failure, leaving the executor ready for
    /// the next key.
    pub fn abort(&mut self) {
        if let Some((key_id, _)) = self.current.take() {
            warn!(key_id = %key_id, state = self.state.as_str(), "aborting key");
        }
        if self.rule_base.is_some() {
            self.state = ExecutorState::Reset;
        }
    }

    /// Run one key from session creation to reset.
    pub fn process_key(
        &mut self,
        key_id: &str,
        facts: impl IntoIterator<Item = Arc<Proposition>>,
    ) -> AbstractionResult<KeyResults> {
        let run = |this: &mut Self| -> AbstractionResult<KeyResults> {
            this.create_session(key_id, facts)?;
            this.fire()?;
            let results = this.extract_results()?;
            this.reset()?;
            Ok(results)
        };
        match run(self) {
            Ok(results) => Ok(results),
            Err(e) => {
                self.abort();
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::Algorithms;
    use crate::definition::{LowLevelAbstractionDefinition, LowLevelAbstractionValueDefinition, PropositionDefinition};
    use crate::knowledge::InMemoryKnowledgeSource;
    use crate::types::{Value, ValueType};

    fn executor(stateful: bool) -> Executor {
        let kb = InMemoryKnowledgeSource::from_definitions([
            PropositionDefinition::primitive_parameter("HR", ValueType::Number),
            PropositionDefinition::low_level(
                "HR_SEEN",
                LowLevelAbstractionDefinition::new(["HR"])
                    .with_value_definition(LowLevelAbstractionValueDefinition::new(Value::nominal("SEEN"))),
            ),
            PropositionDefinition::event("Visit"),
        ])
        .unwrap();
        Executor::new(
            Arc::new(kb),
            Arc::new(Algorithms::with_builtins()),
            ExecutorConfig {
                stateful,
                ..ExecutorConfig::default()
            },
        )
    }

    fn hr(at: i64) -> Arc<Proposition> {
        Arc::new(Proposition::primitive_parameter("HR", at, Value::Number(80.0)))
    }

    #[test]
    fn test_out_of_order_calls_fail() {
        let mut ex = executor(false);
        let err = ex.fire().unwrap_err();
        assert!(matches!(
            err,
            AbstractionError::InvalidState {
                actual: "uninitialized",
                ..
            }
        ));
        ex.build_rule_base(["HR_SEEN"]).unwrap();
        assert!(ex.build_rule_base(["HR_SEEN"]).is_err());
        assert!(ex.extract_results().is_err());
    }

    #[test]
    fn test_process_key_walks_states() {
        let mut ex = executor(false);
        ex.build_rule_base(["HR_SEEN"]).unwrap();
        let results = ex.process_key("p1", [hr(0), hr(1)]).unwrap();
        assert_eq!(ex.state(), ExecutorState::Reset);
        assert_eq!(results.key_id, "p1");
        assert_eq!(results.propositions.len(), 1);
        let derived = &results.propositions[0];
        assert_eq!(results.backward[&derived.unique_id].len(), 2);
        assert!(results.references.contains_key(&derived.unique_id));
        assert_eq!(ex.session_count(), 0);
    }

    #[test]
    fn test_stateful_session_accumulates() {
        let mut ex = executor(true);
        ex.build_rule_base(["HR_SEEN"]).unwrap();
        ex.process_key("p1", [hr(0)]).unwrap();
        let results = ex.process_key("p1", [hr(1)]).unwrap();
        assert_eq!(results.propositions.len(), 1);
        assert_eq!(
            results.propositions[0].interval,
            Some(crate::types::Interval::new(0, 1))
        );
        assert_eq!(ex.session_count(), 1);
    }

    #[test]
    fn test_add_proposition_ids_reattaches_sessions() {
        let mut ex = executor(true);
        ex.build_rule_base(["Visit"]).unwrap();
        let results = ex.process_key("p1", [hr(0), hr(1)]).unwrap();
        assert!(results.propositions.is_empty());

        assert!(ex.add_proposition_ids(["HR_SEEN"]).unwrap());
        assert!(!ex.add_proposition_ids(["HR_SEEN"]).unwrap());
        assert_eq!(ex.session_count(), 1);
        let results = ex.process_key("p1", Vec::new()).unwrap();
        assert_eq!(results.propositions.len(), 1);
    }

    #[test]
    fn test_failure_aborts_key() {
        let mut ex = executor(false);
        ex.build_rule_base(["HR_SEEN"]).unwrap();
        ex.create_session("p1", [hr(0)]).unwrap();
        assert!(ex.create_session("p2", [hr(0)]).is_err());
        ex.abort();
        assert_eq!(ex.state(), ExecutorState::Reset);
        assert!(ex.process_key("p2", [hr(0)]).is_ok());
    }
}
