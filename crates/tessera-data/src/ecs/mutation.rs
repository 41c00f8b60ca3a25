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

//! Batches the changes made to filterable attributes between reconciliations.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use tessera_core::ecs::{EntityId, Identifier};

use crate::ecs::Domain;

/// What happened to an entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationKind {
    /// The entity was created.
    Created,
    /// The entity was removed at reconciliation.
    Destroyed,
    /// A component type was attached.
    ComponentAdded(Identifier),
    /// A component type was detached.
    ComponentRemoved(Identifier),
    /// A tag was added.
    TagAdded(Identifier),
    /// A tag was removed.
    TagRemoved(Identifier),
    /// The data of a component changed. Not filterable, only marked for this tick.
    ComponentChanged(String),
}

/// A single recorded change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mutation {
    /// The entity that changed.
    pub entity: EntityId,
    /// The change.
    pub kind: MutationKind,
}

impl Mutation {
    /// Creates a mutation record.
    pub fn new(entity: EntityId, kind: MutationKind) -> Self {
        Self { entity, kind }
    }

    /// The filterable attribute this mutation touches, if it touches exactly one.
    pub fn touched(&self) -> Option<(Domain, Identifier)> {
        match self.kind {
            MutationKind::ComponentAdded(id) | MutationKind::ComponentRemoved(id) => {
                Some((Domain::Component, id))
            }
            MutationKind::TagAdded(id) | MutationKind::TagRemoved(id) => Some((Domain::Tag, id)),
            _ => None,
        }
    }

    /// The domains whose full-result memos this mutation invalidates.
    pub fn domains(&self) -> &'static [Domain] {
        match self.kind {
            MutationKind::Created | MutationKind::Destroyed => &Domain::INDEXED,
            MutationKind::ComponentAdded(_) | MutationKind::ComponentRemoved(_) => {
                &[Domain::Component]
            }
            MutationKind::TagAdded(_) | MutationKind::TagRemoved(_) => &[Domain::Tag],
            MutationKind::ComponentChanged(_) => &[],
        }
    }
}

/// The deduplicated changes accumulated since the last drain.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MutationBatch {
    /// Entities whose holding of an attribute changed, grouped by attribute.
    pub touched: BTreeMap<(Domain, Identifier), BTreeSet<EntityId>>,
    /// Entities created.
    pub created: BTreeSet<EntityId>,
    /// Entities removed.
    pub destroyed: BTreeSet<EntityId>,
}

impl MutationBatch {
    /// True if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.touched.is_empty() && self.created.is_empty() && self.destroyed.is_empty()
    }

    /// Total number of (entity, attribute) pairs plus creations and removals.
    pub fn len(&self) -> usize {
        self.touched.values().map(BTreeSet::len).sum::<usize>()
            + self.created.len()
            + self.destroyed.len()
    }
}

type Listener = Box<dyn FnMut(&Mutation) + Send>;

/// Records every mutation, batching the filterable ones for the query cache and
/// keeping per-tick markers for callers.
///
/// Two consumers read it differently. The query cache drains the batch and
/// reconciles its entries incrementally. `on_change` listeners are told about
/// each mutation as it happens, which suits caches that can only be thrown away.
#[derive(Default)]
pub struct MutationLog {
    batch: MutationBatch,
    created_this_tick: BTreeSet<EntityId>,
    changed_this_tick: HashMap<String, BTreeSet<EntityId>>,
    listeners: Vec<Listener>,
}

impl fmt::Debug for MutationLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutationLog")
            .field("batch", &self.batch)
            .field("created_this_tick", &self.created_this_tick)
            .field("changed_this_tick", &self.changed_this_tick)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl MutationLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener called synchronously for every recorded mutation.
    pub fn on_change(&mut self, listener: impl FnMut(&Mutation) + Send + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Records a mutation.
    pub fn record(&mut self, mutation: Mutation) {
        match &mutation.kind {
            MutationKind::Created => {
                self.batch.created.insert(mutation.entity.clone());
                self.created_this_tick.insert(mutation.entity.clone());
            }
            MutationKind::Destroyed => {
                self.batch.destroyed.insert(mutation.entity.clone());
                self.created_this_tick.remove(&mutation.entity);
                for changed in self.changed_this_tick.values_mut() {
                    changed.remove(&mutation.entity);
                }
            }
            MutationKind::ComponentChanged(component) => {
                self.changed_this_tick
                    .entry(component.clone())
                    .or_default()
                    .insert(mutation.entity.clone());
            }
            _ => {}
        }
        if let Some(attribute) = mutation.touched() {
            self.batch
                .touched
                .entry(attribute)
                .or_default()
                .insert(mutation.entity.clone());
        }
        for listener in &mut self.listeners {
            listener(&mutation);
        }
    }

    /// True if the batch holds anything not yet drained.
    pub fn has_pending(&self) -> bool {
        !self.batch.is_empty()
    }

    /// Takes the accumulated batch, leaving an empty one.
    pub fn drain(&mut self) -> MutationBatch {
        std::mem::take(&mut self.batch)
    }

    /// Entities created since the last reconciliation.
    pub fn created_this_tick(&self) -> impl Iterator<Item = &EntityId> {
        self.created_this_tick.iter()
    }

    /// Entities whose `component` data changed since the last reconciliation.
    pub fn changed_this_tick(&self, component: &str) -> impl Iterator<Item = &EntityId> {
        self.changed_this_tick
            .get(component)
            .into_iter()
            .flat_map(|ids| ids.iter())
    }

    /// Clears the per-tick markers. The batch is left alone.
    pub fn clear_markers(&mut self) {
        self.created_this_tick.clear();
        self.changed_this_tick.clear();
    }
}
