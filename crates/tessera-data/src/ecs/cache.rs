// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The incrementally maintained cache of filter step results.

use std::collections::{BTreeSet, HashMap, HashSet};

use log::trace;
use tessera_core::ecs::{EntityId, Identifier};

use crate::ecs::{Domain, MutationBatch, ResolvedStep};

/// What the cache needs from the world to compute and reconcile a step.
///
/// The world implements this on a borrowed view of its index and entity
/// store, which lets the cache be updated while the rest of the world is read.
pub trait MatchSource {
    /// Evaluates `step` against the whole store.
    fn evaluate(&self, step: &ResolvedStep) -> BTreeSet<EntityId>;

    /// True if `entity` exists and currently satisfies `step`.
    fn qualifies(&self, entity: &EntityId, step: &ResolvedStep) -> bool;

    /// True if `entity` is still stored.
    fn is_alive(&self, entity: &EntityId) -> bool;

    /// A counter bumped every time reconciliation removes entities.
    fn destroy_epoch(&self) -> u64;
}

#[derive(Debug, Clone)]
struct CacheEntry {
    ids: BTreeSet<EntityId>,
    /// The destroy epoch `ids` was last checked against.
    epoch: u64,
}

/// Hit/miss counters, mostly useful in tests and benchmarks.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// Reads answered from an entry with nothing pending.
    pub hits: u64,
    /// Reads that reconciled pending entities first.
    pub refreshes: u64,
    /// Reads that had to evaluate the step from scratch.
    pub misses: u64,
}

/// Memoizes each cacheable step under its canonical key and keeps it current
/// without rescanning the store.
///
/// Mutations are not applied to entries when they happen. Instead the entity
/// is appended to the pending list of every key that depends on the attribute
/// it touched, found through a reverse index from operand identifier to cache
/// keys. On the next read of a key, only its pending entities are re-tested:
/// they are removed from the cached set and the ones that still qualify are
/// put back. The cost of a read is bounded by what changed, not by the
/// population.
#[derive(Debug, Default)]
pub struct QueryCache {
    entries: HashMap<String, CacheEntry>,
    pending: HashMap<String, BTreeSet<EntityId>>,
    dependents: HashMap<(Domain, Identifier), HashSet<String>>,
    stats: CacheStats,
}

impl QueryCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `entity` to the pending list of every key depending on one of `operands`.
    pub fn tag(&mut self, entity: &EntityId, operands: &[(Domain, Identifier)]) {
        for operand in operands {
            let Some(keys) = self.dependents.get(operand) else {
                continue;
            };
            for key in keys {
                if self.entries.contains_key(key) {
                    self.pending
                        .entry(key.clone())
                        .or_default()
                        .insert(entity.clone());
                }
            }
        }
    }

    /// Appends `entity` to the pending list of every key.
    ///
    /// Creations and removals can change the result of any step, `None` steps
    /// in particular, whatever operands they name.
    pub fn tag_all(&mut self, entity: &EntityId) {
        for key in self.entries.keys() {
            self.pending
                .entry(key.clone())
                .or_default()
                .insert(entity.clone());
        }
    }

    /// Distributes a drained mutation batch into per-key pending lists.
    pub fn refresh(&mut self, batch: &MutationBatch) {
        if self.entries.is_empty() || batch.is_empty() {
            return;
        }
        for (operand, entities) in &batch.touched {
            for entity in entities {
                self.tag(entity, std::slice::from_ref(operand));
            }
        }
        for entity in batch.created.iter().chain(&batch.destroyed) {
            self.tag_all(entity);
        }
        trace!(
            "Query cache took {} mutation(s) into {} pending list(s)",
            batch.len(),
            self.pending.len()
        );
    }

    /// Returns the current result of `step`, computing or reconciling it as needed.
    ///
    /// A key with no entry yet is evaluated from scratch. Entities removed from
    /// the store are filtered out against the destroy epoch regardless of what
    /// the pending lists say, so a stale entry never yields a dangling id.
    pub fn resolve(&mut self, step: &ResolvedStep, source: &impl MatchSource) -> &BTreeSet<EntityId> {
        let key = step.cache_key.as_str();

        if let Some(entry) = self.entries.get_mut(key) {
            let pending = self.pending.remove(key).unwrap_or_default();
            if pending.is_empty() {
                self.stats.hits += 1;
            } else {
                self.stats.refreshes += 1;
                let retested = pending.len();
                for entity in &pending {
                    entry.ids.remove(entity);
                }
                let mut requalified = 0;
                for entity in pending {
                    if source.qualifies(&entity, step) {
                        entry.ids.insert(entity);
                        requalified += 1;
                    }
                }
                trace!("Query cache refreshed '{key}': {requalified}/{retested} pending entities still match");
            }

            let epoch = source.destroy_epoch();
            if entry.epoch != epoch {
                entry.ids.retain(|entity| source.is_alive(entity));
                entry.epoch = epoch;
            }
        } else {
            self.stats.misses += 1;
            trace!("Query cache miss for '{key}', evaluating from the index");
            self.pending.remove(key);
            for identifier in &step.identifiers {
                self.dependents
                    .entry((step.domain, *identifier))
                    .or_default()
                    .insert(key.to_owned());
            }
            let entry = CacheEntry {
                ids: source.evaluate(step),
                epoch: source.destroy_epoch(),
            };
            self.entries.insert(key.to_owned(), entry);
        }

        &self.entries[key].ids
    }

    /// Drops every entry depending on an identifier that is being released.
    pub fn invalidate_identifier(&mut self, domain: Domain, identifier: Identifier) {
        if let Some(keys) = self.dependents.remove(&(domain, identifier)) {
            for key in keys {
                self.entries.remove(&key);
                self.pending.remove(&key);
            }
        }
    }

    /// Forgets everything.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.pending.clear();
        self.dependents.clear();
    }

    /// Number of cached keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True if `key` has a cached result.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of entities waiting to be re-tested for `key`.
    pub fn pending_len(&self, key: &str) -> usize {
        self.pending.get(key).map_or(0, BTreeSet::len)
    }

    /// Hit/miss counters.
    pub fn stats(&self) -> CacheStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::Constraint;
    use std::cell::Cell;
    use std::collections::BTreeMap;
    use tessera_core::ecs::KeySet;

    /// A store reduced to a map of entity → tag key.
    #[derive(Default)]
    struct FakeSource {
        keys: BTreeMap<EntityId, KeySet>,
        epoch: u64,
        evaluations: Cell<usize>,
        qualify_calls: Cell<usize>,
    }

    impl MatchSource for FakeSource {
        fn evaluate(&self, step: &ResolvedStep) -> BTreeSet<EntityId> {
            self.evaluations.set(self.evaluations.get() + 1);
            self.keys
                .iter()
                .filter(|(_, key)| step.matches(key))
                .map(|(id, _)| id.clone())
                .collect()
        }

        fn qualifies(&self, entity: &EntityId, step: &ResolvedStep) -> bool {
            self.qualify_calls.set(self.qualify_calls.get() + 1);
            self.keys.get(entity).map_or(false, |key| step.matches(key))
        }

        fn is_alive(&self, entity: &EntityId) -> bool {
            self.keys.contains_key(entity)
        }

        fn destroy_epoch(&self) -> u64 {
            self.epoch
        }
    }

    fn all_tag(id: Identifier) -> ResolvedStep {
        ResolvedStep {
            constraint: Constraint::All,
            domain: Domain::Tag,
            identifiers: vec![id],
            mask: id.key(),
            fully_resolved: true,
            cache_key: format!("all:tag:{}", id.0),
        }
    }

    fn source_with(n: usize, key: &KeySet) -> FakeSource {
        let mut source = FakeSource::default();
        for i in 0..n {
            source.keys.insert(EntityId::new(format!("e{i}")), key.clone());
        }
        source
    }

    #[test]
    fn test_second_read_is_a_hit() {
        let tag = Identifier(0);
        let source = source_with(5, &tag.key());
        let mut cache = QueryCache::new();
        let step = all_tag(tag);

        assert_eq!(cache.resolve(&step, &source).len(), 5);
        assert_eq!(cache.resolve(&step, &source).len(), 5);
        assert_eq!(source.evaluations.get(), 1);
        assert_eq!(cache.stats(), CacheStats { hits: 1, refreshes: 0, misses: 1 });
    }

    #[test]
    fn test_refresh_only_retests_pending_entities() {
        let tag = Identifier(0);
        let mut source = source_with(100, &tag.key());
        let mut cache = QueryCache::new();
        let step = all_tag(tag);
        cache.resolve(&step, &source);

        // One entity loses the tag, one new entity gains it.
        let lost = EntityId::new("e3");
        let gained = EntityId::new("new");
        source.keys.insert(lost.clone(), KeySet::new());
        source.keys.insert(gained.clone(), tag.key());

        let mut batch = MutationBatch::default();
        batch.touched.insert((Domain::Tag, tag), [lost.clone()].into_iter().collect());
        batch.created.insert(gained.clone());
        cache.refresh(&batch);
        assert_eq!(cache.pending_len(&step.cache_key), 2);

        let result = cache.resolve(&step, &source).clone();
        assert_eq!(result.len(), 100);
        assert!(!result.contains(&lost));
        assert!(result.contains(&gained));
        assert_eq!(source.qualify_calls.get(), 2);
        assert_eq!(source.evaluations.get(), 1);
        assert_eq!(cache.pending_len(&step.cache_key), 0);
    }

    #[test]
    fn test_unrelated_mutations_leave_entry_untouched() {
        let tag = Identifier(0);
        let other = Identifier(1);
        let source = source_with(3, &tag.key());
        let mut cache = QueryCache::new();
        let step = all_tag(tag);
        cache.resolve(&step, &source);

        cache.tag(&EntityId::new("e1"), &[(Domain::Tag, other)]);
        cache.tag(&EntityId::new("e1"), &[(Domain::Component, tag)]);
        assert_eq!(cache.pending_len(&step.cache_key), 0);
    }

    #[test]
    fn test_removed_entities_are_filtered_without_pending() {
        let tag = Identifier(0);
        let mut source = source_with(4, &tag.key());
        let mut cache = QueryCache::new();
        let step = all_tag(tag);
        cache.resolve(&step, &source);

        source.keys.remove(&EntityId::new("e0"));
        source.epoch += 1;
        assert_eq!(cache.resolve(&step, &source).len(), 3);
    }

    #[test]
    fn test_invalidate_identifier_drops_dependents() {
        let tag = Identifier(0);
        let source = source_with(2, &tag.key());
        let mut cache = QueryCache::new();
        let step = all_tag(tag);
        cache.resolve(&step, &source);
        assert!(cache.contains(&step.cache_key));

        cache.invalidate_identifier(Domain::Tag, tag);
        assert!(cache.is_empty());
        cache.resolve(&step, &source);
        assert_eq!(source.evaluations.get(), 2);
    }
}
