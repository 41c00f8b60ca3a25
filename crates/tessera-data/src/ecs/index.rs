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

//! Maps composite keys to the entities currently holding them.

use std::collections::{BTreeSet, HashMap};

use tessera_core::ecs::{EntityId, KeySet};

use crate::ecs::Domain;

/// Groups entities by the composite key they hold in one domain.
///
/// A filter step tests each distinct composite key once instead of each
/// entity, then unions the buckets of the keys that matched.
#[derive(Debug, Default, Clone)]
pub struct EntityIndex {
    buckets: HashMap<KeySet, BTreeSet<EntityId>>,
}

impl EntityIndex {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Files `entity` under `key`.
    pub fn append(&mut self, key: &KeySet, entity: EntityId) {
        self.buckets.entry(key.clone()).or_default().insert(entity);
    }

    /// Removes `entity` from the bucket of `key`, dropping the bucket once empty.
    pub fn remove(&mut self, key: &KeySet, entity: &EntityId) -> bool {
        let Some(bucket) = self.buckets.get_mut(key) else {
            return false;
        };
        let removed = bucket.remove(entity);
        if bucket.is_empty() {
            self.buckets.remove(key);
        }
        removed
    }

    /// Moves `entity` from the bucket of `old` to the bucket of `new`.
    pub fn rekey(&mut self, old: &KeySet, new: &KeySet, entity: &EntityId) {
        if old != new {
            self.remove(old, entity);
            self.append(new, entity.clone());
        }
    }

    /// The union of the entities filed under any of `keys`.
    pub fn all(&self, keys: &[KeySet]) -> Vec<EntityId> {
        let mut out = BTreeSet::new();
        for key in keys {
            if let Some(bucket) = self.buckets.get(key) {
                out.extend(bucket.iter().cloned());
            }
        }
        out.into_iter().collect()
    }

    /// The entities whose composite key satisfies `predicate`.
    pub fn matching(&self, predicate: impl Fn(&KeySet) -> bool) -> BTreeSet<EntityId> {
        self.buckets
            .iter()
            .filter(|(key, _)| predicate(key))
            .flat_map(|(_, bucket)| bucket.iter().cloned())
            .collect()
    }

    /// The distinct composite keys currently in use.
    pub fn keys(&self) -> impl Iterator<Item = &KeySet> {
        self.buckets.keys()
    }

    /// Total number of indexed entities.
    pub fn len(&self) -> usize {
        self.buckets.values().map(BTreeSet::len).sum()
    }

    /// True if nothing is indexed.
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

/// One [`EntityIndex`] per indexed domain.
#[derive(Debug, Default, Clone)]
pub struct DomainIndices {
    /// Indexed by component key.
    pub component: EntityIndex,
    /// Indexed by tag key.
    pub tag: EntityIndex,
    /// Indexed by entity type key.
    pub entity_type: EntityIndex,
}

impl DomainIndices {
    /// The index for `domain`; `None` for [`Domain::Id`].
    pub fn get(&self, domain: Domain) -> Option<&EntityIndex> {
        match domain {
            Domain::Component => Some(&self.component),
            Domain::Tag => Some(&self.tag),
            Domain::EntityType => Some(&self.entity_type),
            Domain::Id => None,
        }
    }
}
