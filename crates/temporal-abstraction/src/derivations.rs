//! Provenance links between source facts and the facts derived from them.

use std::collections::HashMap;
use std::sync::Arc;

use crate::proposition::{Proposition, UniqueId};

/// Forward (source → derived) and backward (derived → source) links for one
/// key's processing pass.
#[derive(Debug, Clone, Default)]
pub struct DerivationsBuilder {
    forward: HashMap<UniqueId, Vec<Arc<Proposition>>>,
    backward: HashMap<UniqueId, Vec<Arc<Proposition>>>,
}

fn push_unique(list: &mut Vec<Arc<Proposition>>, p: &Arc<Proposition>) {
    if !list.iter().any(|q| q.unique_id == p.unique_id) {
        list.push(Arc::clone(p));
    }
}

fn remove_id(map: &mut HashMap<UniqueId, Vec<Arc<Proposition>>>, key: &UniqueId, id: &UniqueId) {
    if let Some(list) = map.get_mut(key) {
        list.retain(|p| p.unique_id != *id);
        if list.is_empty() {
            map.remove(key);
        }
    }
}

fn replace_in(
    map: &mut HashMap<UniqueId, Vec<Arc<Proposition>>>,
    key: &UniqueId,
    old: &Arc<Proposition>,
    new: &Arc<Proposition>,
) {
    let list = map.entry(*key).or_default();
    list.retain(|p| p.unique_id != old.unique_id);
    push_unique(list, new);
}

impl DerivationsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `derived` was derived from `source`.
    pub fn proposition_asserted(&mut self, source: &Arc<Proposition>, derived: &Arc<Proposition>) {
        push_unique(self.forward.entry(source.unique_id).or_default(), derived);
        push_unique(self.backward.entry(derived.unique_id).or_default(), source);
    }

    /// Add `source` to the backward links of `derived` only.
    pub fn proposition_asserted_backward(&mut self, source: &Arc<Proposition>, derived: &Arc<Proposition>) {
        push_unique(self.backward.entry(derived.unique_id).or_default(), source);
    }

    /// Remove and return everything derived from `source`. Only the forward
    /// entry is removed; callers re-point the backward side.
    pub fn proposition_retracted_forward(&mut self, source: &Proposition) -> Vec<Arc<Proposition>> {
        self.forward.remove(&source.unique_id).unwrap_or_default()
    }

    /// Remove and return the sources of `derived`. Only the backward entry is
    /// removed; callers re-point the forward side.
    pub fn proposition_retracted_backward(&mut self, derived: &Proposition) -> Vec<Arc<Proposition>> {
        self.backward.remove(&derived.unique_id).unwrap_or_default()
    }

    /// In `forward[source]`, replace `old` with `new`.
    pub fn proposition_replace_forward(
        &mut self,
        source: &Proposition,
        old: &Arc<Proposition>,
        new: &Arc<Proposition>,
    ) {
        replace_in(&mut self.forward, &source.unique_id, old, new);
    }

    /// In `backward[derived]`, replace `old` with `new`.
    pub fn proposition_replace_backward(
        &mut self,
        derived: &Proposition,
        old: &Arc<Proposition>,
        new: &Arc<Proposition>,
    ) {
        replace_in(&mut self.backward, &derived.unique_id, old, new);
    }

    /// Move every link of the `olds` onto `new`. Afterwards the ancestors of
    /// `new` are the union of the ancestors of the `olds`, and nothing links
    /// to an old fact any more.
    pub fn proposition_combined(&mut self, olds: &[Arc<Proposition>], new: &Arc<Proposition>) {
        for old in olds {
            if old.unique_id == new.unique_id {
                continue;
            }
            for ancestor in self.proposition_retracted_backward(old) {
                self.proposition_replace_forward(&ancestor, old, new);
                self.proposition_asserted_backward(&ancestor, new);
            }
            for descendant in self.proposition_retracted_forward(old) {
                self.proposition_replace_backward(&descendant, old, new);
                push_unique(self.forward.entry(new.unique_id).or_default(), &descendant);
            }
        }
    }

    /// Drop every link that touches `id`.
    pub fn proposition_retracted(&mut self, id: &UniqueId) {
        if let Some(derived) = self.forward.remove(id) {
            for d in derived {
                remove_id(&mut self.backward, &d.unique_id, id);
            }
        }
        if let Some(sources) = self.backward.remove(id) {
            for s in sources {
                remove_id(&mut self.forward, &s.unique_id, id);
            }
        }
    }

    pub fn forward(&self, source: &UniqueId) -> &[Arc<Proposition>] {
        self.forward.get(source).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn backward(&self, derived: &UniqueId) -> &[Arc<Proposition>] {
        self.backward.get(derived).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty() && self.backward.is_empty()
    }

    /// Every forward link has a matching backward link and vice versa.
    pub fn is_consistent(&self) -> bool {
        let forward_ok = self.forward.iter().all(|(source, derived)| {
            derived
                .iter()
                .all(|d| self.backward(&d.unique_id).iter().any(|s| s.unique_id == *source))
        });
        let backward_ok = self.backward.iter().all(|(derived, sources)| {
            sources
                .iter()
                .all(|s| self.forward(&s.unique_id).iter().any(|d| d.unique_id == *derived))
        });
        forward_ok && backward_ok
    }

    /// Links as id lists, for results.
    pub fn forward_ids(&self) -> HashMap<UniqueId, Vec<UniqueId>> {
        Self::ids(&self.forward)
    }

    pub fn backward_ids(&self) -> HashMap<UniqueId, Vec<UniqueId>> {
        Self::ids(&self.backward)
    }

    fn ids(map: &HashMap<UniqueId, Vec<Arc<Proposition>>>) -> HashMap<UniqueId, Vec<UniqueId>> {
        map.iter()
            .map(|(k, v)| (*k, v.iter().map(|p| p.unique_id).collect()))
            .collect()
    }

    /// Every fact appearing on either side of a link.
    pub fn referenced(&self) -> impl Iterator<Item = &Arc<Proposition>> {
        self.forward.values().chain(self.backward.values()).flatten()
    }

    pub fn reset(&mut self) {
        self.forward.clear();
        self.backward.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Interval, Value};

    fn fact(def_id: &str, at: i64) -> Arc<Proposition> {
        Arc::new(Proposition::primitive_parameter(def_id, at, Value::Number(1.0)))
    }

    fn abstraction(def_id: &str) -> Arc<Proposition> {
        Arc::new(Proposition::abstract_parameter(def_id, Interval::new(0, 1), None))
    }

    #[test]
    fn test_asserted_then_reset_is_empty() {
        let mut d = DerivationsBuilder::new();
        let a = fact("A", 0);
        let b = abstraction("B");
        let c = abstraction("C");
        d.proposition_asserted(&a, &b);
        d.proposition_asserted(&b, &c);
        d.proposition_asserted(&a, &b);
        assert_eq!(d.forward(&a.unique_id).len(), 1);
        assert!(d.is_consistent());
        d.reset();
        assert!(d.is_empty());
        assert!(d.forward_ids().is_empty());
        assert!(d.backward_ids().is_empty());
    }

    #[test]
    fn test_combine_migrates_ancestors() {
        let mut d = DerivationsBuilder::new();
        let x = fact("X", 0);
        let y = fact("Y", 1);
        let p1 = abstraction("P");
        let p2 = abstraction("P");
        let r = abstraction("P");
        d.proposition_asserted(&x, &p1);
        d.proposition_asserted(&y, &p2);

        d.proposition_combined(&[Arc::clone(&p1), Arc::clone(&p2)], &r);

        let ancestors: Vec<UniqueId> = d.backward(&r.unique_id).iter().map(|p| p.unique_id).collect();
        assert!(ancestors.contains(&x.unique_id));
        assert!(ancestors.contains(&y.unique_id));
        for source in [&x, &y] {
            let fwd: Vec<UniqueId> = d.forward(&source.unique_id).iter().map(|p| p.unique_id).collect();
            assert!(fwd.contains(&r.unique_id));
            assert!(!fwd.contains(&p1.unique_id));
            assert!(!fwd.contains(&p2.unique_id));
        }
        assert!(d.backward(&p1.unique_id).is_empty());
        assert!(d.is_consistent());
    }

    #[test]
    fn test_combine_migrates_descendants() {
        let mut d = DerivationsBuilder::new();
        let p1 = abstraction("P");
        let child = abstraction("Q");
        let r = abstraction("P");
        d.proposition_asserted(&p1, &child);
        d.proposition_combined(&[Arc::clone(&p1)], &r);
        assert_eq!(d.backward(&child.unique_id)[0].unique_id, r.unique_id);
        assert_eq!(d.forward(&r.unique_id)[0].unique_id, child.unique_id);
        assert!(d.is_consistent());
    }

    #[test]
    fn test_retracted_removes_all_links() {
        let mut d = DerivationsBuilder::new();
        let a = fact("A", 0);
        let b = abstraction("B");
        let c = abstraction("C");
        d.proposition_asserted(&a, &b);
        d.proposition_asserted(&b, &c);
        d.proposition_retracted(&b.unique_id);
        assert!(d.is_empty());
    }

    #[test]
    fn test_retracted_forward_returns_counterparts() {
        let mut d = DerivationsBuilder::new();
        let a = fact("A", 0);
        let b = abstraction("B");
        d.proposition_asserted(&a, &b);
        let derived = d.proposition_retracted_forward(&a);
        assert_eq!(derived.len(), 1);
        let sources = d.proposition_retracted_backward(&b);
        assert_eq!(sources[0].unique_id, a.unique_id);
        assert!(d.is_empty());
    }
}
