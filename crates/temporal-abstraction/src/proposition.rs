//! Runtime facts: observed data and derived abstractions.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::sequence::Temporal;
use crate::types::{Interval, Value};

/// Identity of a single fact, unique across keys and queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UniqueId(Uuid);

impl UniqueId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for UniqueId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UniqueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What sort of fact a [`Proposition`] is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropositionKind {
    PrimitiveParameter,
    Event,
    Constant,
    AbstractParameter,
    Context,
}

/// A time-stamped fact in working memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposition {
    #[serde(default)]
    pub unique_id: UniqueId,
    pub def_id: String,
    pub kind: PropositionKind,
    /// `None` for atemporal constants.
    #[serde(default)]
    pub interval: Option<Interval>,
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, Value>,
}

impl Proposition {
    fn build(
        def_id: impl Into<String>,
        kind: PropositionKind,
        interval: Option<Interval>,
        value: Option<Value>,
    ) -> Self {
        Self {
            unique_id: UniqueId::new(),
            def_id: def_id.into(),
            kind,
            interval,
            value,
            properties: BTreeMap::new(),
        }
    }

    /// An observed value at a single instant.
    pub fn primitive_parameter(def_id: impl Into<String>, at: i64, value: Value) -> Self {
        Self::build(
            def_id,
            PropositionKind::PrimitiveParameter,
            Some(Interval::point(at)),
            Some(value),
        )
    }

    pub fn event(def_id: impl Into<String>, interval: Interval) -> Self {
        Self::build(def_id, PropositionKind::Event, Some(interval), None)
    }

    pub fn constant(def_id: impl Into<String>, value: Option<Value>) -> Self {
        Self::build(def_id, PropositionKind::Constant, None, value)
    }

    pub fn abstract_parameter(
        def_id: impl Into<String>,
        interval: Interval,
        value: Option<Value>,
    ) -> Self {
        Self::build(
            def_id,
            PropositionKind::AbstractParameter,
            Some(interval),
            value,
        )
    }

    pub fn context(def_id: impl Into<String>, interval: Interval) -> Self {
        Self::build(def_id, PropositionKind::Context, Some(interval), None)
    }

    pub fn with_property(mut self, name: impl Into<String>, value: Value) -> Self {
        self.properties.insert(name.into(), value);
        self
    }

    /// Copy of this fact under another definition id with a fresh identity.
    pub fn relabeled(&self, def_id: impl Into<String>) -> Self {
        Self {
            unique_id: UniqueId::new(),
            def_id: def_id.into(),
            kind: self.kind,
            interval: self.interval,
            value: self.value.clone(),
            properties: self.properties.clone(),
        }
    }

    pub fn is_temporal(&self) -> bool {
        self.interval.is_some()
    }

    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }
}

impl Temporal for Proposition {
    fn interval(&self) -> Interval {
        self.interval.unwrap_or_default()
    }
}

impl Temporal for Arc<Proposition> {
    fn interval(&self) -> Interval {
        self.as_ref().interval.unwrap_or_default()
    }
}

impl fmt::Display for Proposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.def_id)?;
        if let Some(value) = &self.value {
            write!(f, "={value}")?;
        }
        if let Some(interval) = &self.interval {
            write!(f, " {interval}")?;
        }
        Ok(())
    }
}

/// Sort facts by start then finish; atemporal facts sort first.
pub fn sort_by_time(facts: &mut [Arc<Proposition>]) {
    facts.sort_by_key(|p| p.interval.map(|i| (i.start, i.finish)));
}
