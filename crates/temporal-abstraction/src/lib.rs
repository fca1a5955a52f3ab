//! Temporal abstraction: derives trends, states, patterns and contexts from time-stamped data with full provenance.

pub mod algorithm;
pub mod consequence;
pub mod definition;
pub mod derivations;
pub mod engine;
pub mod executor;
pub mod finder;
pub mod gap;
pub mod knowledge;
pub mod proposition;
pub mod relation;
pub mod rules;
pub mod sequence;
pub mod types;

pub use algorithm::{
    Algorithm, AlgorithmArgument, AlgorithmArguments, AlgorithmParameter, AlgorithmSource, Algorithms,
    ParameterSegment, StateDetector, TrendDetector,
};
pub use definition::{DefinitionKind, PropositionDefinition};
pub use derivations::DerivationsBuilder;
pub use engine::{ForwardChainingEngine, RuleEngine, RuleSession, Salience};
pub use executor::{Executor, ExecutorConfig, ExecutorState, KeyResults};
pub use finder::{find_patterns, LowLevelAbstractionFinder, PatternMatch, WindowSettings};
pub use gap::{GapFunction, HorizontalTemporalInference, MinMaxGapBetweenValues};
pub use knowledge::{CachingKnowledgeSource, DefinitionCache, InMemoryKnowledgeSource, KnowledgeSource};
pub use proposition::{Proposition, PropositionKind, UniqueId};
pub use relation::{AllenRelation, DistanceConstraints, Relation};
pub use rules::{RuleBase, RuleBaseBuilder};
pub use sequence::{Segment, Sequence, Temporal};
pub use types::*;
