//! Knowledge sources: where definitions are read from.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::Arc;

use dashmap::{DashMap, DashSet};
use tracing::{debug, info};

use crate::definition::{DefinitionKind, PropositionDefinition};
use crate::types::{AbstractionError, AbstractionResult};

/// Read access to proposition definitions.
pub trait KnowledgeSource: Send + Sync {
    /// `Ok(None)` when no definition has this id.
    fn read_proposition_definition(&self, id: &str) -> AbstractionResult<Option<Arc<PropositionDefinition>>>;

    /// Ids of definitions listing `id` among their inverse-is-a children.
    fn read_is_a(&self, id: &str) -> AbstractionResult<Vec<String>>;

    fn read_abstraction_definition(&self, id: &str) -> AbstractionResult<Option<Arc<PropositionDefinition>>> {
        Ok(self
            .read_proposition_definition(id)?
            .filter(|d| d.kind().is_abstraction()))
    }

    fn read_context_definition(&self, id: &str) -> AbstractionResult<Option<Arc<PropositionDefinition>>> {
        Ok(self
            .read_proposition_definition(id)?
            .filter(|d| matches!(d.kind(), DefinitionKind::Context(_))))
    }

    fn read_event_definition(&self, id: &str) -> AbstractionResult<Option<Arc<PropositionDefinition>>> {
        Ok(self
            .read_proposition_definition(id)?
            .filter(|d| matches!(d.kind(), DefinitionKind::Event)))
    }

    /// Definitions `id` is abstracted from. Every one must resolve.
    fn read_abstracted_from(&self, id: &str) -> AbstractionResult<Vec<Arc<PropositionDefinition>>> {
        let def = self.require(id)?;
        def.abstracted_from().iter().map(|child| self.require(child)).collect()
    }

    /// Inverse-is-a children of `id`. Every one must resolve.
    fn read_inverse_is_a(&self, id: &str) -> AbstractionResult<Vec<Arc<PropositionDefinition>>> {
        let def = self.require(id)?;
        def.inverse_is_a().iter().map(|child| self.require(child)).collect()
    }

    /// Like [`read_proposition_definition`](Self::read_proposition_definition)
    /// but a missing id is an error.
    fn require(&self, id: &str) -> AbstractionResult<Arc<PropositionDefinition>> {
        self.read_proposition_definition(id)?
            .ok_or_else(|| AbstractionError::UnknownDefinition(id.to_string()))
    }
}

/// Definitions held in memory.
#[derive(Debug, Default, Clone)]
pub struct InMemoryKnowledgeSource {
    definitions: HashMap<String, Arc<PropositionDefinition>>,
    parents: HashMap<String, BTreeSet<String>>,
}

impl InMemoryKnowledgeSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from definitions, rejecting duplicate ids.
    pub fn from_definitions(
        definitions: impl IntoIterator<Item = PropositionDefinition>,
    ) -> AbstractionResult<Self> {
        let mut source = Self::new();
        for def in definitions {
            source.add(def)?;
        }
        Ok(source)
    }

    /// Parse a JSON array of definitions.
    pub fn from_json(json: &str) -> AbstractionResult<Self> {
        let definitions: Vec<PropositionDefinition> = serde_json::from_str(json)?;
        let source = Self::from_definitions(definitions)?;
        info!(definitions = source.len(), "Loaded knowledge base");
        Ok(source)
    }

    pub fn from_file(path: &Path) -> AbstractionResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn add(&mut self, def: PropositionDefinition) -> AbstractionResult<()> {
        if self.definitions.contains_key(def.id()) {
            return Err(AbstractionError::DuplicateDefinition(def.id().to_string()));
        }
        for child in def.inverse_is_a() {
            self.parents
                .entry(child.clone())
                .or_default()
                .insert(def.id().to_string());
        }
        self.definitions.insert(def.id().to_string(), Arc::new(def));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &String> {
        self.definitions.keys()
    }
}

impl KnowledgeSource for InMemoryKnowledgeSource {
    fn read_proposition_definition(&self, id: &str) -> AbstractionResult<Option<Arc<PropositionDefinition>>> {
        Ok(self.definitions.get(id).cloned())
    }

    fn read_is_a(&self, id: &str) -> AbstractionResult<Vec<String>> {
        Ok(self
            .parents
            .get(id)
            .map(|p| p.iter().cloned().collect())
            .unwrap_or_default())
    }
}

/// Resolved definitions and ids known to be missing.
#[derive(Debug, Default)]
pub struct DefinitionCache {
    found: DashMap<String, Arc<PropositionDefinition>>,
    not_found: DashSet<String>,
}

impl DefinitionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.found.len()
    }

    pub fn is_empty(&self) -> bool {
        self.found.is_empty()
    }

    pub fn is_known_missing(&self, id: &str) -> bool {
        self.not_found.contains(id)
    }

    pub fn clear(&self) {
        self.found.clear();
        self.not_found.clear();
    }
}

/// Caches the reads of another knowledge source.
pub struct CachingKnowledgeSource<K> {
    inner: K,
    cache: DefinitionCache,
}

impl<K: KnowledgeSource> CachingKnowledgeSource<K> {
    pub fn new(inner: K) -> Self {
        Self {
            inner,
            cache: DefinitionCache::new(),
        }
    }

    pub fn cache(&self) -> &DefinitionCache {
        &self.cache
    }

    pub fn inner(&self) -> &K {
        &self.inner
    }
}

impl<K: KnowledgeSource> KnowledgeSource for CachingKnowledgeSource<K> {
    fn read_proposition_definition(&self, id: &str) -> AbstractionResult<Option<Arc<PropositionDefinition>>> {
        if let Some(def) = self.cache.found.get(id) {
            return Ok(Some(Arc::clone(def.value())));
        }
        if self.cache.is_known_missing(id) {
            return Ok(None);
        }
        match self.inner.read_proposition_definition(id)? {
            Some(def) => {
                self.cache.found.insert(id.to_string(), Arc::clone(&def));
                Ok(Some(def))
            }
            None => {
                debug!(id, "definition not found, caching miss");
                self.cache.not_found.insert(id.to_string());
                Ok(None)
            }
        }
    }

    fn read_is_a(&self, id: &str) -> AbstractionResult<Vec<String>> {
        self.inner.read_is_a(id)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::definition::LowLevelAbstractionDefinition;
    use crate::types::ValueType;

    fn base() -> InMemoryKnowledgeSource {
        InMemoryKnowledgeSource::from_definitions([
            PropositionDefinition::primitive_parameter("HR", ValueType::Number),
            PropositionDefinition::low_level("HR_STATE", LowLevelAbstractionDefinition::new(["HR"])),
            PropositionDefinition::event("Vital").with_inverse_is_a(["HR"]),
        ])
        .unwrap()
    }

    #[test]
    fn test_duplicate_rejected() {
        let err = InMemoryKnowledgeSource::from_definitions([
            PropositionDefinition::event("E"),
            PropositionDefinition::event("E"),
        ])
        .unwrap_err();
        assert!(matches!(err, AbstractionError::DuplicateDefinition(id) if id == "E"));
    }

    #[test]
    fn test_reads_by_kind() {
        let ks = base();
        assert!(ks.read_abstraction_definition("HR_STATE").unwrap().is_some());
        assert!(ks.read_abstraction_definition("HR").unwrap().is_none());
        assert!(ks.read_event_definition("Vital").unwrap().is_some());
        assert_eq!(ks.read_abstracted_from("HR_STATE").unwrap()[0].id(), "HR");
        assert_eq!(ks.read_inverse_is_a("Vital").unwrap()[0].id(), "HR");
        assert_eq!(ks.read_is_a("HR").unwrap(), vec!["Vital".to_string()]);
    }

    #[test]
    fn test_unresolvable_abstracted_from() {
        let ks = InMemoryKnowledgeSource::from_definitions([PropositionDefinition::low_level(
            "X",
            LowLevelAbstractionDefinition::new(["MISSING"]),
        )])
        .unwrap();
        let err = ks.read_abstracted_from("X").unwrap_err();
        assert!(matches!(err, AbstractionError::UnknownDefinition(id) if id == "MISSING"));
    }

    struct Counting {
        inner: InMemoryKnowledgeSource,
        reads: AtomicUsize,
    }

    impl KnowledgeSource for Counting {
        fn read_proposition_definition(&self, id: &str) -> AbstractionResult<Option<Arc<PropositionDefinition>>> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.inner.read_proposition_definition(id)
        }

        fn read_is_a(&self, id: &str) -> AbstractionResult<Vec<String>> {
            self.inner.read_is_a(id)
        }
    }

    #[test]
    fn test_caching_source_caches_hits_and_misses() {
        let ks = CachingKnowledgeSource::new(Counting {
            inner: base(),
            reads: AtomicUsize::new(0),
        });
        ks.read_proposition_definition("HR").unwrap();
        ks.read_proposition_definition("HR").unwrap();
        ks.read_proposition_definition("NOPE").unwrap();
        ks.read_proposition_definition("NOPE").unwrap();
        assert_eq!(ks.inner().reads.load(Ordering::SeqCst), 2);
        assert!(ks.cache().is_known_missing("NOPE"));
        assert_eq!(ks.cache().len(), 1);
    }

    #[test]
    fn test_from_json() {
        let json = r#"[
            {"id": "HR", "type": "primitive_parameter", "value_type": "number"},
            {"id": "HR_STATE", "type": "low_level_abstraction", "abstracted_from": ["HR"]}
        ]"#;
        let ks = InMemoryKnowledgeSource::from_json(json).unwrap();
        assert_eq!(ks.len(), 2);
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("knowledge.json");
        std::fs::write(&path, r#"[{"id": "Vital", "type": "event", "inverse_is_a": ["HR"]},
            {"id": "HR", "type": "primitive_parameter", "value_type": "number"}]"#)
            .unwrap();
        let ks = InMemoryKnowledgeSource::from_file(&path).unwrap();
        assert_eq!(ks.read_is_a("HR").unwrap(), vec!["Vital".to_string()]);
        assert!(InMemoryKnowledgeSource::from_file(&dir.path().join("missing.json")).is_err());
    }
}
