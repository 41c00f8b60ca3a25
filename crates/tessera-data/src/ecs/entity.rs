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

use std::collections::{BTreeMap, BTreeSet};

use tessera_core::ecs::{EntityId, KeySet, Value};

use crate::ecs::Domain;

/// The record the world keeps for one entity.
///
/// Entities are owned by the world and only change through its operations,
/// which keep the composite keys in step with the tags and components.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub(crate) id: EntityId,
    pub(crate) type_name: String,
    /// The single bit of the entity's type.
    pub(crate) type_key: KeySet,
    /// Bitwise OR of the entity's component identifiers.
    pub(crate) component_key: KeySet,
    /// Bitwise OR of the entity's tag identifiers.
    pub(crate) tag_key: KeySet,
    pub(crate) tags: BTreeSet<String>,
    pub(crate) components: BTreeMap<String, Value>,
}

impl Entity {
    /// The entity's id.
    pub fn id(&self) -> &EntityId {
        &self.id
    }

    /// The name of the entity type the entity was created as.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// The entity's tags in name order.
    pub fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    /// True if the entity carries `tag`.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    /// The entity's components keyed by component type name.
    pub fn components(&self) -> &BTreeMap<String, Value> {
        &self.components
    }

    /// The data of one component.
    pub fn component(&self, name: &str) -> Option<&Value> {
        self.components.get(name)
    }

    /// True if the entity has a component of type `name`.
    pub fn has_component(&self, name: &str) -> bool {
        self.components.contains_key(name)
    }

    /// The composite key for an indexed domain; `None` for [`Domain::Id`].
    pub fn key(&self, domain: Domain) -> Option<&KeySet> {
        match domain {
            Domain::Component => Some(&self.component_key),
            Domain::Tag => Some(&self.tag_key),
            Domain::EntityType => Some(&self.type_key),
            Domain::Id => None,
        }
    }

    /// Every entity referenced from any component.
    pub fn references(&self) -> BTreeSet<EntityId> {
        let mut refs = BTreeSet::new();
        for value in self.components.values() {
            value.collect_references(&mut refs);
        }
        refs
    }
}
