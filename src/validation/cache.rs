//! Caller-owned cache of the last validation pass
//!
//! The engine never reads or writes this; callers decide when results are
//! stale (typically after persisting a mutation).

use crate::graph::{ReqId, ValidationResult};
use dashmap::DashMap;
use std::collections::BTreeMap;

#[derive(Debug, Default)]
pub struct ValidationCache {
    results: DashMap<ReqId, ValidationResult>,
}

impl ValidationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&self, result: ValidationResult) {
        self.results.insert(result.requirement_id.clone(), result);
    }

    /// Replace the whole cache with a fresh pass
    pub fn store_all(&self, results: BTreeMap<ReqId, ValidationResult>) {
        self.results.clear();
        for (id, result) in results {
            self.results.insert(id, result);
        }
    }

    pub fn get(&self, id: &ReqId) -> Option<ValidationResult> {
        self.results.get(id).map(|r| r.clone())
    }

    /// Drop the cached result for each id; returns how many were present
    pub fn invalidate<'a>(&self, ids: impl IntoIterator<Item = &'a ReqId>) -> usize {
        ids.into_iter()
            .filter(|id| self.results.remove(*id).is_some())
            .count()
    }

    pub fn clear(&self) {
        self.results.clear();
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_get_invalidate() {
        let cache = ValidationCache::new();
        let a = ReqId::from("A");
        let b = ReqId::from("B");
        cache.store(ValidationResult::new(a.clone(), vec![]));
        cache.store(ValidationResult::new(b.clone(), vec![]));
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&a).map(|r| r.score), Some(100));

        assert_eq!(cache.invalidate([&a, &ReqId::from("missing")]), 1);
        assert!(cache.get(&a).is_none());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn store_all_replaces_previous_pass() {
        let cache = ValidationCache::new();
        cache.store(ValidationResult::new(ReqId::from("OLD"), vec![]));
        let mut fresh = BTreeMap::new();
        fresh.insert(ReqId::from("NEW"), ValidationResult::new(ReqId::from("NEW"), vec![]));
        cache.store_all(fresh);
        assert!(cache.get(&ReqId::from("OLD")).is_none());
        assert!(!cache.is_empty());
    }
}
