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

//! Internal entity storage and reference bookkeeping.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use tessera_core::ecs::EntityId;

use crate::ecs::Entity;

/// Internal arena of entity records keyed by id.
///
/// Besides the records themselves, the store tracks which entities reference
/// which: `references` maps a holder to the targets its components point at,
/// `referrers` is the reverse. Destroying an entity uses `referrers` to find
/// every inbound reference without scanning the world.
#[derive(Debug, Default, Clone)]
pub(crate) struct EntityStore {
    pub(crate) entities: BTreeMap<EntityId, Entity>,
    references: HashMap<EntityId, BTreeSet<EntityId>>,
    referrers: HashMap<EntityId, BTreeSet<EntityId>>,
}

impl EntityStore {
    /// Creates a new, empty `EntityStore`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a record and links its outbound references.
    pub fn insert(&mut self, entity: Entity) {
        let id = entity.id.clone();
        self.entities.insert(id.clone(), entity);
        self.relink(&id);
    }

    /// Removes a record, dropping its outbound bookkeeping.
    ///
    /// Returns the record and the entities that still hold references to it.
    pub fn remove(&mut self, id: &EntityId) -> Option<(Entity, BTreeSet<EntityId>)> {
        let entity = self.entities.remove(id)?;
        if let Some(targets) = self.references.remove(id) {
            for target in targets {
                self.unlink_referrer(&target, id);
            }
        }
        let holders = self.referrers.remove(id).unwrap_or_default();
        Some((entity, holders))
    }

    /// Recomputes the outbound references of `holder` from its current components.
    pub fn relink(&mut self, holder: &EntityId) {
        let current = self
            .entities
            .get(holder)
            .map(Entity::references)
            .unwrap_or_default();
        let previous = self.references.remove(holder).unwrap_or_default();

        for gone in previous.difference(&current) {
            self.unlink_referrer(gone, holder);
        }
        for added in current.difference(&previous) {
            self.referrers
                .entry(added.clone())
                .or_default()
                .insert(holder.clone());
        }
        if !current.is_empty() {
            self.references.insert(holder.clone(), current);
        }
    }

    /// The entities currently referencing `target`.
    pub fn referrers_of(&self, target: &EntityId) -> Option<&BTreeSet<EntityId>> {
        self.referrers.get(target)
    }

    pub fn get(&self, id: &EntityId) -> Option<&Entity> {
        self.entities.get(id)
    }

    pub fn get_mut(&mut self, id: &EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(id)
    }

    pub fn contains(&self, id: &EntityId) -> bool {
        self.entities.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Iterates the records in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    fn unlink_referrer(&mut self, target: &EntityId, holder: &EntityId) {
        if let Some(holders) = self.referrers.get_mut(target) {
            holders.remove(holder);
            if holders.is_empty() {
                self.referrers.remove(target);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tessera_core::ecs::{KeySet, Value};

    fn record(id: &str, target: Option<&str>) -> Entity {
        let mut components = BTreeMap::new();
        if let Some(target) = target {
            components.insert(
                "Link".to_string(),
                Value::object([("to", Value::Entity(EntityId::new(target)))]),
            );
        }
        Entity {
            id: EntityId::new(id),
            type_name: "T".into(),
            type_key: KeySet::new(),
            component_key: KeySet::new(),
            tag_key: KeySet::new(),
            tags: Default::default(),
            components,
        }
    }

    #[test]
    fn test_referrers_follow_inserts_and_removals() {
        let mut store = EntityStore::new();
        store.insert(record("a", Some("b")));
        store.insert(record("b", Some("a")));

        let a = EntityId::new("a");
        let b = EntityId::new("b");
        assert!(store.referrers_of(&b).unwrap().contains(&a));

        let (_, holders) = store.remove(&b).unwrap();
        assert_eq!(holders.into_iter().collect::<Vec<_>>(), vec![a.clone()]);
        // b's outbound reference to a is gone with it.
        assert!(store.referrers_of(&a).is_none());
    }

    #[test]
    fn test_relink_drops_stale_targets() {
        let mut store = EntityStore::new();
        store.insert(record("a", Some("b")));
        let a = EntityId::new("a");
        store.get_mut(&a).unwrap().components.clear();
        store.relink(&a);
        assert!(store.referrers_of(&EntityId::new("b")).is_none());
    }
}
