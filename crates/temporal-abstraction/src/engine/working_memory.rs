//! Fact storage indexed by identity and definition id.

use std::collections::HashMap;
use std::sync::Arc;

use crate::proposition::{Proposition, UniqueId};

#[derive(Debug, Clone, Default)]
pub struct WorkingMemory {
    facts: HashMap<UniqueId, Arc<Proposition>>,
    by_def: HashMap<String, Vec<Arc<Proposition>>>,
}

impl WorkingMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if a fact with the same identity is already present.
    pub fn insert(&mut self, fact: Arc<Proposition>) -> bool {
        if self.facts.contains_key(&fact.unique_id) {
            return false;
        }
        self.by_def
            .entry(fact.def_id.clone())
            .or_default()
            .push(Arc::clone(&fact));
        self.facts.insert(fact.unique_id, fact);
        true
    }

    pub fn remove(&mut self, id: &UniqueId) -> Option<Arc<Proposition>> {
        let fact = self.facts.remove(id)?;
        if let Some(list) = self.by_def.get_mut(&fact.def_id) {
            list.retain(|p| p.unique_id != *id);
            if list.is_empty() {
                self.by_def.remove(&fact.def_id);
            }
        }
        Some(fact)
    }

    pub fn get(&self, id: &UniqueId) -> Option<&Arc<Proposition>> {
        self.facts.get(id)
    }

    pub fn contains(&self, id: &UniqueId) -> bool {
        self.facts.contains_key(id)
    }

    /// Facts of one definition in insertion order.
    pub fn of_def(&self, def_id: &str) -> &[Arc<Proposition>] {
        self.by_def.get(def_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Proposition>> {
        self.facts.values()
    }

    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Value;

    #[test]
    fn test_insert_remove() {
        let mut wm = WorkingMemory::new();
        let p = Arc::new(Proposition::primitive_parameter("HR", 0, Value::Number(1.0)));
        assert!(wm.insert(Arc::clone(&p)));
        assert!(!wm.insert(Arc::clone(&p)));
        assert_eq!(wm.of_def("HR").len(), 1);
        assert!(wm.remove(&p.unique_id).is_some());
        assert!(wm.of_def("HR").is_empty());
        assert!(wm.is_empty());
    }
}
