//! Knowledge definitions.
//!
//! Every definition is a [`PropositionDefinition`]: shared metadata plus a
//! [`DefinitionKind`] carrying the kind-specific part. The `children` cache
//! (inverse-is-a ids plus abstracted-from ids) is recomputed by every setter
//! that changes either input.

pub mod compound;
pub mod context;
pub mod extended;
pub mod high_level;
pub mod low_level;
pub mod pattern;
pub mod slice;

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use crate::gap::HorizontalTemporalInference;
use crate::types::{AbstractionError, AbstractionResult, ValueType};

pub use compound::{
    ClassificationRequirement, CompoundLowLevelAbstractionDefinition, MatchOperator, ValueClassification,
};
pub use context::ContextDefinition;
pub use extended::{output_interval, ExtendedPropositionDefinition, PropertyConstraint, Side, TemporalPatternOffset};
pub use high_level::{ElementRelation, HighLevelAbstractionDefinition};
pub use low_level::{LowLevelAbstractionDefinition, LowLevelAbstractionValueDefinition, SlidingWindowWidthMode};
pub use pattern::{PairDefinition, SequentialTemporalPatternDefinition, SubsequentElement};
pub use slice::{AggregationDefinition, SliceDefinition};

/// A typed property facts of a definition may carry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDefinition {
    pub id: String,
    #[serde(default)]
    pub value_type: ValueType,
}

/// A named reference from facts of a definition to facts of others.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceDefinition {
    pub id: String,
    pub proposition_ids: Vec<String>,
}

/// Kind-specific part of a definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DefinitionKind {
    PrimitiveParameter {
        #[serde(default)]
        value_type: ValueType,
    },
    Event,
    Constant,
    LowLevelAbstraction(LowLevelAbstractionDefinition),
    CompoundLowLevelAbstraction(CompoundLowLevelAbstractionDefinition),
    HighLevelAbstraction(HighLevelAbstractionDefinition),
    Slice(SliceDefinition),
    Pair(PairDefinition),
    SequentialTemporalPattern(SequentialTemporalPatternDefinition),
    Aggregation(AggregationDefinition),
    Context(ContextDefinition),
}

impl DefinitionKind {
    pub fn name(&self) -> &'static str {
        match self {
            DefinitionKind::PrimitiveParameter { .. } => "primitive_parameter",
            DefinitionKind::Event => "event",
            DefinitionKind::Constant => "constant",
            DefinitionKind::LowLevelAbstraction(_) => "low_level_abstraction",
            DefinitionKind::CompoundLowLevelAbstraction(_) => "compound_low_level_abstraction",
            DefinitionKind::HighLevelAbstraction(_) => "high_level_abstraction",
            DefinitionKind::Slice(_) => "slice",
            DefinitionKind::Pair(_) => "pair",
            DefinitionKind::SequentialTemporalPattern(_) => "sequential_temporal_pattern",
            DefinitionKind::Aggregation(_) => "aggregation",
            DefinitionKind::Context(_) => "context",
        }
    }

    /// Ids this kind is derived from.
    pub fn abstracted_from(&self) -> BTreeSet<String> {
        match self {
            DefinitionKind::PrimitiveParameter { .. } | DefinitionKind::Event | DefinitionKind::Constant => {
                BTreeSet::new()
            }
            DefinitionKind::LowLevelAbstraction(d) => d.abstracted_from.clone(),
            DefinitionKind::CompoundLowLevelAbstraction(d) => d.abstracted_from(),
            DefinitionKind::HighLevelAbstraction(d) => d.abstracted_from(),
            DefinitionKind::Slice(d) => d.abstracted_from.clone(),
            DefinitionKind::Pair(d) => d.abstracted_from(),
            DefinitionKind::SequentialTemporalPattern(d) => d.abstracted_from(),
            DefinitionKind::Aggregation(d) => BTreeSet::from([d.abstracted_from.clone()]),
            DefinitionKind::Context(d) => d.abstracted_from(),
        }
    }

    pub fn is_abstraction(&self) -> bool {
        matches!(
            self,
            DefinitionKind::LowLevelAbstraction(_)
                | DefinitionKind::CompoundLowLevelAbstraction(_)
                | DefinitionKind::HighLevelAbstraction(_)
                | DefinitionKind::Slice(_)
                | DefinitionKind::Pair(_)
                | DefinitionKind::SequentialTemporalPattern(_)
                | DefinitionKind::Aggregation(_)
        )
    }

    fn validate(&self, id: &str) -> AbstractionResult<()> {
        match self {
            DefinitionKind::HighLevelAbstraction(d) => d.validate(id),
            DefinitionKind::LowLevelAbstraction(d) if d.abstracted_from.is_empty() => Err(
                AbstractionError::InvalidDefinition(format!("{id}: low-level abstraction has no sources")),
            ),
            DefinitionKind::Slice(d) if d.max_index.is_some_and(|m| m < d.min_index) => Err(
                AbstractionError::InvalidDefinition(format!("{id}: slice max_index is below min_index")),
            ),
            _ => Ok(()),
        }
    }
}

fn default_true() -> bool {
    true
}

/// Serialized form; deserializing goes through [`PropositionDefinition::try_from`]
/// so the children cache is built and duplicates are rejected.
#[derive(Deserialize)]
struct DefinitionRecord {
    id: String,
    #[serde(default)]
    display_name: String,
    #[serde(default)]
    abbreviated_display_name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    term_ids: Vec<String>,
    #[serde(default)]
    property_definitions: Vec<PropertyDefinition>,
    #[serde(default)]
    reference_definitions: Vec<ReferenceDefinition>,
    #[serde(default)]
    inverse_is_a: Vec<String>,
    #[serde(default = "default_true")]
    concatenable: bool,
    #[serde(default = "default_true")]
    solid: bool,
    #[serde(flatten)]
    kind: DefinitionKind,
}

/// A definition of one kind of fact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "DefinitionRecord")]
pub struct PropositionDefinition {
    id: String,
    display_name: String,
    abbreviated_display_name: String,
    description: String,
    term_ids: Vec<String>,
    property_definitions: Vec<PropertyDefinition>,
    reference_definitions: Vec<ReferenceDefinition>,
    inverse_is_a: Vec<String>,
    concatenable: bool,
    solid: bool,
    #[serde(flatten)]
    kind: DefinitionKind,
    #[serde(skip)]
    children: BTreeSet<String>,
}

impl TryFrom<DefinitionRecord> for PropositionDefinition {
    type Error = AbstractionError;

    fn try_from(r: DefinitionRecord) -> AbstractionResult<Self> {
        let mut def = PropositionDefinition::new(r.id, r.kind);
        def.display_name = r.display_name;
        def.abbreviated_display_name = r.abbreviated_display_name;
        def.description = r.description;
        def.term_ids = r.term_ids;
        def.concatenable = r.concatenable;
        def.solid = r.solid;
        def.set_property_definitions(r.property_definitions)?;
        def.set_reference_definitions(r.reference_definitions)?;
        def.set_inverse_is_a(r.inverse_is_a);
        def.kind.validate(&def.id)?;
        Ok(def)
    }
}

fn unique_ids<'a>(owner: &str, what: &str, ids: impl Iterator<Item = &'a str>) -> AbstractionResult<()> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(AbstractionError::InvalidDefinition(format!(
                "{owner}: duplicate {what} {id}"
            )));
        }
    }
    Ok(())
}

impl PropositionDefinition {
    pub fn new(id: impl Into<String>, kind: DefinitionKind) -> Self {
        let id = id.into();
        let mut def = Self {
            display_name: id.clone(),
            abbreviated_display_name: String::new(),
            description: String::new(),
            term_ids: Vec::new(),
            property_definitions: Vec::new(),
            reference_definitions: Vec::new(),
            inverse_is_a: Vec::new(),
            concatenable: true,
            solid: true,
            kind,
            children: BTreeSet::new(),
            id,
        };
        def.recompute_children();
        def
    }

    pub fn primitive_parameter(id: impl Into<String>, value_type: ValueType) -> Self {
        Self::new(id, DefinitionKind::PrimitiveParameter { value_type })
    }

    pub fn event(id: impl Into<String>) -> Self {
        Self::new(id, DefinitionKind::Event)
    }

    pub fn constant(id: impl Into<String>) -> Self {
        Self::new(id, DefinitionKind::Constant)
    }

    pub fn low_level(id: impl Into<String>, def: LowLevelAbstractionDefinition) -> Self {
        Self::new(id, DefinitionKind::LowLevelAbstraction(def))
    }

    pub fn compound(id: impl Into<String>, def: CompoundLowLevelAbstractionDefinition) -> Self {
        Self::new(id, DefinitionKind::CompoundLowLevelAbstraction(def))
    }

    pub fn high_level(id: impl Into<String>, def: HighLevelAbstractionDefinition) -> Self {
        Self::new(id, DefinitionKind::HighLevelAbstraction(def))
    }

    pub fn slice(id: impl Into<String>, def: SliceDefinition) -> Self {
        Self::new(id, DefinitionKind::Slice(def))
    }

    pub fn pair(id: impl Into<String>, def: PairDefinition) -> Self {
        Self::new(id, DefinitionKind::Pair(def))
    }

    pub fn sequential(id: impl Into<String>, def: SequentialTemporalPatternDefinition) -> Self {
        Self::new(id, DefinitionKind::SequentialTemporalPattern(def))
    }

    pub fn aggregation(id: impl Into<String>, def: AggregationDefinition) -> Self {
        Self::new(id, DefinitionKind::Aggregation(def))
    }

    pub fn context(id: impl Into<String>, def: ContextDefinition) -> Self {
        Self::new(id, DefinitionKind::Context(def))
    }

    fn recompute_children(&mut self) {
        let mut children: BTreeSet<String> = self.inverse_is_a.iter().cloned().collect();
        children.extend(self.kind.abstracted_from());
        self.children = children;
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn abbreviated_display_name(&self) -> &str {
        &self.abbreviated_display_name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn term_ids(&self) -> &[String] {
        &self.term_ids
    }

    pub fn property_definitions(&self) -> &[PropertyDefinition] {
        &self.property_definitions
    }

    pub fn property_definition(&self, id: &str) -> Option<&PropertyDefinition> {
        self.property_definitions.iter().find(|p| p.id == id)
    }

    pub fn reference_definitions(&self) -> &[ReferenceDefinition] {
        &self.reference_definitions
    }

    pub fn inverse_is_a(&self) -> &[String] {
        &self.inverse_is_a
    }

    pub fn kind(&self) -> &DefinitionKind {
        &self.kind
    }

    /// Inverse-is-a ids plus abstracted-from ids.
    pub fn children(&self) -> &BTreeSet<String> {
        &self.children
    }

    pub fn abstracted_from(&self) -> BTreeSet<String> {
        self.kind.abstracted_from()
    }

    /// Every id this definition needs facts for: children plus the
    /// low-level context id.
    pub fn dependencies(&self) -> BTreeSet<String> {
        let mut deps = self.children.clone();
        if let DefinitionKind::LowLevelAbstraction(d) = &self.kind {
            deps.extend(d.context_id.iter().cloned());
        }
        deps
    }

    pub fn is_concatenable(&self) -> bool {
        match self.kind {
            DefinitionKind::Slice(_) => false,
            _ => self.concatenable,
        }
    }

    pub fn is_solid(&self) -> bool {
        match self.kind {
            DefinitionKind::Slice(_) => true,
            _ => self.solid,
        }
    }

    pub fn horizontal_temporal_inference(&self) -> HorizontalTemporalInference {
        HorizontalTemporalInference::new(self.is_concatenable(), self.is_solid())
    }

    pub fn as_low_level(&self) -> Option<&LowLevelAbstractionDefinition> {
        match &self.kind {
            DefinitionKind::LowLevelAbstraction(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_context(&self) -> Option<&ContextDefinition> {
        match &self.kind {
            DefinitionKind::Context(d) => Some(d),
            _ => None,
        }
    }

    pub fn set_display_name(&mut self, name: impl Into<String>) {
        self.display_name = name.into();
    }

    pub fn set_abbreviated_display_name(&mut self, name: impl Into<String>) {
        self.abbreviated_display_name = name.into();
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
    }

    pub fn set_term_ids(&mut self, term_ids: Vec<String>) {
        self.term_ids = term_ids;
    }

    pub fn set_concatenable(&mut self, concatenable: bool) {
        self.concatenable = concatenable;
    }

    pub fn set_solid(&mut self, solid: bool) {
        self.solid = solid;
    }

    /// Rejects duplicate property ids.
    pub fn set_property_definitions(&mut self, defs: Vec<PropertyDefinition>) -> AbstractionResult<()> {
        unique_ids(&self.id, "property definition", defs.iter().map(|d| d.id.as_str()))?;
        self.property_definitions = defs;
        Ok(())
    }

    /// Rejects duplicate reference ids.
    pub fn set_reference_definitions(&mut self, defs: Vec<ReferenceDefinition>) -> AbstractionResult<()> {
        unique_ids(&self.id, "reference definition", defs.iter().map(|d| d.id.as_str()))?;
        self.reference_definitions = defs;
        Ok(())
    }

    pub fn set_inverse_is_a(&mut self, ids: Vec<String>) {
        self.inverse_is_a = ids;
        self.recompute_children();
    }

    pub fn add_inverse_is_a(&mut self, id: impl Into<String>) {
        self.inverse_is_a.push(id.into());
        self.recompute_children();
    }

    pub fn set_kind(&mut self, kind: DefinitionKind) -> AbstractionResult<()> {
        kind.validate(&self.id)?;
        self.kind = kind;
        self.recompute_children();
        Ok(())
    }

    /// Edit the kind in place, then recompute the children cache.
    pub fn update_kind<R>(&mut self, f: impl FnOnce(&mut DefinitionKind) -> R) -> R {
        let result = f(&mut self.kind);
        self.recompute_children();
        result
    }

    pub fn with_inverse_is_a<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set_inverse_is_a(ids.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_concatenable(mut self, concatenable: bool) -> Self {
        self.concatenable = concatenable;
        self
    }

    pub fn with_solid(mut self, solid: bool) -> Self {
        self.solid = solid;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Value;

    #[test]
    fn test_children_recomputed_by_setters() {
        let mut def = PropositionDefinition::low_level("HR_STATE", LowLevelAbstractionDefinition::new(["HR"]));
        assert_eq!(def.children().len(), 1);
        def.add_inverse_is_a("HR_STATE_CHILD");
        assert!(def.children().contains("HR_STATE_CHILD"));
        def.update_kind(|kind| {
            if let DefinitionKind::LowLevelAbstraction(d) = kind {
                d.abstracted_from.insert("PULSE".into());
            }
        });
        assert!(def.children().contains("PULSE"));
        assert_eq!(def.children().len(), 3);
    }

    #[test]
    fn test_duplicate_property_definitions_rejected() {
        let mut def = PropositionDefinition::event("Dose");
        let prop = PropertyDefinition {
            id: "route".into(),
            value_type: ValueType::Nominal,
        };
        let err = def.set_property_definitions(vec![prop.clone(), prop]).unwrap_err();
        assert!(matches!(err, AbstractionError::InvalidDefinition(_)));
    }

    #[test]
    fn test_slice_is_solid_never_concatenable() {
        let def = PropositionDefinition::slice("FirstTwo", SliceDefinition::new(["A"], 0, Some(2)))
            .with_concatenable(true)
            .with_solid(false);
        assert!(!def.is_concatenable());
        assert!(def.is_solid());
    }

    #[test]
    fn test_json_builds_children() {
        let json = r#"{
            "id": "HR_STATE",
            "type": "low_level_abstraction",
            "abstracted_from": ["HR"],
            "algorithm_id": "stateDetector",
            "value_definitions": [
                {"value": "HIGH", "parameters": {"minThreshold": {"value": 100, "comparator": ">"}}}
            ],
            "inverse_is_a": ["HR_STATE_DETAIL"]
        }"#;
        let def: PropositionDefinition = serde_json::from_str(json).unwrap();
        assert!(def.children().contains("HR"));
        assert!(def.children().contains("HR_STATE_DETAIL"));
        let low = def.as_low_level().unwrap();
        assert_eq!(low.value_definitions[0].value, Value::nominal("HIGH"));
        assert!(def.is_concatenable());
    }

    #[test]
    fn test_json_rejects_duplicate_references() {
        let json = r#"{
            "id": "Enc",
            "type": "event",
            "reference_definitions": [
                {"id": "labs", "proposition_ids": ["Lab"]},
                {"id": "labs", "proposition_ids": ["Lab"]}
            ]
        }"#;
        assert!(serde_json::from_str::<PropositionDefinition>(json).is_err());
    }

    #[test]
    fn test_context_dependency_included() {
        let mut low = LowLevelAbstractionDefinition::new(["HR"]);
        low.context_id = Some("ICU".into());
        let def = PropositionDefinition::low_level("HR_STATE", low);
        assert!(def.dependencies().contains("ICU"));
        assert!(!def.children().contains("ICU"));
    }
}
