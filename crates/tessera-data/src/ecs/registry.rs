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

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use log::warn;
use tessera_core::ecs::{Identifier, Value};

use crate::ecs::{ComponentType, Domain, EntityType};

/// Assigns each distinct string key a single-bit [`Identifier`].
///
/// Bits come from a reusable pool: registering a new key takes the lowest
/// released bit before growing the pool. Two live keys never share a bit.
#[derive(Debug, Default, Clone)]
pub struct KeyRegistry {
    ids: HashMap<String, Identifier>,
    names: HashMap<Identifier, String>,
    /// Released bits, available for reuse.
    free: BTreeSet<u32>,
    /// The next never-used bit.
    next: u32,
}

impl KeyRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the identifier for `key`, allocating one if the key is new.
    pub fn register(&mut self, key: &str) -> Identifier {
        if let Some(id) = self.ids.get(key) {
            return *id;
        }
        let bit = match self.free.pop_first() {
            Some(bit) => bit,
            None => {
                let bit = self.next;
                self.next += 1;
                bit
            }
        };
        let id = Identifier(bit);
        self.ids.insert(key.to_owned(), id);
        self.names.insert(id, key.to_owned());
        id
    }

    /// Looks up the identifier of a registered key.
    pub fn get_id(&self, key: &str) -> Option<Identifier> {
        self.ids.get(key).copied()
    }

    /// Looks up the key an identifier is currently assigned to.
    pub fn name_of(&self, id: Identifier) -> Option<&str> {
        self.names.get(&id).map(String::as_str)
    }

    /// Frees the bit of `key` for reuse and returns it.
    ///
    /// Composite keys that still contain the bit are left untouched; they stay
    /// valid bit patterns until the owning entity re-derives them.
    pub fn release(&mut self, key: &str) -> Option<Identifier> {
        let id = self.ids.remove(key)?;
        self.names.remove(&id);
        self.free.insert(id.0);
        Some(id)
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// True if no key is registered.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// All identifier pools and type descriptors of a world.
///
/// Component names, tags and entity type names live in separate pools, so a
/// tag and a component may share a name without sharing a bit.
#[derive(Debug, Default)]
pub struct Registry {
    pub(crate) components: KeyRegistry,
    pub(crate) tags: KeyRegistry,
    pub(crate) entity_types: KeyRegistry,
    component_types: BTreeMap<String, ComponentType>,
    entity_type_defs: BTreeMap<String, EntityType>,
    /// Tags declared up front; they keep their bit even while unused.
    pinned_tags: HashSet<String>,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the identifier pool backing an indexed domain.
    pub fn keys(&self, domain: Domain) -> Option<&KeyRegistry> {
        match domain {
            Domain::Component => Some(&self.components),
            Domain::Tag => Some(&self.tags),
            Domain::EntityType => Some(&self.entity_types),
            Domain::Id => None,
        }
    }

    /// Frees the bit of `key` in the pool of `domain`.
    ///
    /// The descriptor of a released component or entity type is kept.
    pub(crate) fn release_key(&mut self, domain: Domain, key: &str) -> Option<Identifier> {
        match domain {
            Domain::Component => self.components.release(key),
            Domain::Tag => self.tags.release(key),
            Domain::EntityType => self.entity_types.release(key),
            Domain::Id => None,
        }
    }

    /// Declares a component type. Idempotent: a second declaration keeps the first.
    pub fn register_component(&mut self, component: ComponentType) -> Identifier {
        let id = self.components.register(&component.name);
        self.component_types
            .entry(component.name.clone())
            .or_insert(component);
        id
    }

    /// Declares an entity type, registering any of its components not yet known.
    pub fn register_entity_type(&mut self, entity_type: EntityType) -> Identifier {
        for component in &entity_type.components {
            if !self.component_types.contains_key(component) {
                if !entity_type.anonymous {
                    warn!(
                        "Entity type '{}' names unregistered component '{}'; registering it with null defaults",
                        entity_type.name, component
                    );
                }
                self.register_component(ComponentType::new(component.clone()));
            }
        }
        let id = self.entity_types.register(&entity_type.name);
        self.entity_type_defs
            .entry(entity_type.name.clone())
            .or_insert(entity_type);
        id
    }

    /// Declares a tag and pins it so it is never released.
    pub fn register_tag(&mut self, tag: &str) -> Identifier {
        self.pinned_tags.insert(tag.to_owned());
        self.tags.register(tag)
    }

    /// Returns the descriptor of a component type.
    pub fn component_type(&self, name: &str) -> Option<&ComponentType> {
        self.component_types.get(name)
    }

    /// Returns the descriptor of an entity type.
    pub fn entity_type(&self, name: &str) -> Option<&EntityType> {
        self.entity_type_defs.get(name)
    }

    /// Iterates the declared component types in name order.
    pub fn component_types(&self) -> impl Iterator<Item = &ComponentType> {
        self.component_types.values()
    }

    /// Iterates the declared entity types in name order.
    pub fn entity_types(&self) -> impl Iterator<Item = &EntityType> {
        self.entity_type_defs.values()
    }

    /// Returns a component's default data, registering the type lazily on first use.
    pub(crate) fn component_defaults(&mut self, name: &str) -> (Identifier, Value) {
        if !self.component_types.contains_key(name) {
            self.register_component(ComponentType::new(name));
        }
        let id = self.components.register(name);
        let defaults = self
            .component_types
            .get(name)
            .map(|c| c.defaults.clone())
            .unwrap_or_default();
        (id, defaults)
    }

    /// True if the tag was declared through [`Registry::register_tag`].
    pub fn is_pinned_tag(&self, tag: &str) -> bool {
        self.pinned_tags.contains(tag)
    }
}
