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

use std::collections::{BTreeMap, BTreeSet, HashMap};

use log::{debug, trace};
use tessera_core::ecs::{EntityId, Identifier, KeySet, Value};

use crate::config::WorldConfig;
use crate::ecs::{
    entity_store::EntityStore, planner::QueryPlanner, query::IndexMemo, tick::TickClock,
    ComponentType, Domain, DomainIndices, Entity, EntityType, Mutation, MutationKind, MutationLog,
    QueryCache, Registry, WorldError, WorldResult,
};

/// The container for every entity, its indices, and the query machinery.
///
/// Structural changes (components and tags gained or lost, creations) are
/// applied to the entity and its index buckets immediately and recorded in the
/// [`MutationLog`]. Destruction is deferred: [`World::destroy`] only marks the
/// entity, and [`World::cleanup`] removes everything marked at once, clears
/// references to it, and releases the identifiers nobody holds anymore.
#[derive(Debug, Default)]
pub struct World {
    pub(crate) config: WorldConfig,
    pub(crate) registry: Registry,
    pub(crate) store: EntityStore,
    pub(crate) indices: DomainIndices,
    pub(crate) log: MutationLog,
    pub(crate) cache: QueryCache,
    pub(crate) memo: IndexMemo,
    pub(crate) planner: QueryPlanner,
    pub(crate) pending_destroy: BTreeSet<EntityId>,
    /// Bumped whenever reconciliation removes at least one entity.
    pub(crate) destroy_epoch: u64,
    pub(crate) clock: TickClock,
    component_usage: KeyUsage,
    tag_usage: KeyUsage,
    type_usage: KeyUsage,
}

/// Number of stored entities holding each key of one domain.
#[derive(Debug, Default)]
struct KeyUsage {
    counts: HashMap<String, usize>,
    /// Keys whose count dropped to zero since the last reconciliation.
    unused: BTreeSet<String>,
}

impl KeyUsage {
    fn acquire(&mut self, key: &str) {
        *self.counts.entry(key.to_owned()).or_default() += 1;
        self.unused.remove(key);
    }

    fn release(&mut self, key: &str) {
        if let Some(count) = self.counts.get_mut(key) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.counts.remove(key);
                self.unused.insert(key.to_owned());
            }
        }
    }

    /// Drains the keys that are still unused.
    fn take_unused(&mut self) -> Vec<String> {
        let unused = std::mem::take(&mut self.unused);
        unused
            .into_iter()
            .filter(|key| !self.counts.contains_key(key))
            .collect()
    }
}

impl World {
    /// Creates an empty world with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty world with `config`.
    pub fn with_config(config: WorldConfig) -> WorldResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            ..Self::default()
        })
    }

    /// The configuration this world runs with.
    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// The identifier pools and type descriptors.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// The query cache, for inspection.
    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    /// The mutation log, mainly to attach `on_change` listeners.
    pub fn mutation_log_mut(&mut self) -> &mut MutationLog {
        &mut self.log
    }

    /// Declares entity types, component types and tags in one call.
    ///
    /// Component types are declared first so entity types find their defaults.
    /// Tags declared here are pinned and keep their identifier while unused.
    pub fn register(
        &mut self,
        entity_types: &[EntityType],
        component_types: &[ComponentType],
        tags: &[&str],
    ) {
        for component in component_types {
            self.registry.register_component(component.clone());
        }
        for entity_type in entity_types {
            self.registry.register_entity_type(entity_type.clone());
        }
        for tag in tags {
            self.registry.register_tag(tag);
        }
        debug!(
            "Registered {} entity type(s), {} component type(s), {} tag(s)",
            entity_types.len(),
            component_types.len(),
            tags.len()
        );
    }

    /// Declares a single component type.
    pub fn register_component(&mut self, component: ComponentType) -> Identifier {
        self.registry.register_component(component)
    }

    /// Declares a single entity type.
    pub fn register_entity_type(&mut self, entity_type: EntityType) -> Identifier {
        self.registry.register_entity_type(entity_type)
    }

    /// Declares and pins a single tag.
    pub fn register_tag(&mut self, tag: &str) -> Identifier {
        self.registry.register_tag(tag)
    }

    /// Creates an entity of a registered type with a fresh id.
    ///
    /// Each component of the type starts from the data supplied for it merged
    /// over the component's defaults. Data for components the type does not
    /// declare adds those components too.
    pub fn create(
        &mut self,
        entity_type: &str,
        data: Vec<(&str, Value)>,
        tags: &[&str],
    ) -> WorldResult<EntityId> {
        let data = data
            .into_iter()
            .map(|(name, value)| (name.to_owned(), value))
            .collect();
        self.create_with_id(EntityId::generate(), entity_type, data, tags)
    }

    /// Creates an entity of the anonymous type made of `components`,
    /// registering that type on first use.
    pub fn create_anonymous(
        &mut self,
        components: &[&str],
        data: Vec<(&str, Value)>,
        tags: &[&str],
    ) -> WorldResult<EntityId> {
        let entity_type = EntityType::anonymous(components);
        let name = entity_type.name.clone();
        if self.registry.entity_type(&name).is_none() {
            self.registry.register_entity_type(entity_type);
        }
        self.create(&name, data, tags)
    }

    /// Creates an entity with a caller-chosen id.
    pub fn create_with_id(
        &mut self,
        id: EntityId,
        entity_type: &str,
        mut data: BTreeMap<String, Value>,
        tags: &[&str],
    ) -> WorldResult<EntityId> {
        let definition = self
            .registry
            .entity_type(entity_type)
            .cloned()
            .ok_or_else(|| WorldError::UnknownEntityType(entity_type.to_owned()))?;
        if self.store.contains(&id) {
            return Err(WorldError::DuplicateEntityId(id));
        }

        let declared = definition
            .components
            .iter()
            .map(|name| {
                let supplied = data.remove(name).unwrap_or_default();
                (name.clone(), supplied)
            })
            .collect::<Vec<_>>();
        let mut components = BTreeMap::new();
        for (name, supplied) in declared.into_iter().chain(data) {
            let (_, defaults) = self.registry.component_defaults(&name);
            components.insert(name, supplied.merged_over(&defaults));
        }
        self.insert_entity(id, &definition.name, components, tags)
    }

    /// Recreates an entity exactly as it was saved.
    ///
    /// Unlike [`World::create_with_id`], the entity gets precisely the
    /// components in `components`, stored verbatim: no defaults are merged and
    /// components declared by the type but absent here are not added.
    pub fn restore(
        &mut self,
        id: EntityId,
        entity_type: &str,
        components: BTreeMap<String, Value>,
        tags: &[&str],
    ) -> WorldResult<EntityId> {
        if self.registry.entity_type(entity_type).is_none() {
            return Err(WorldError::UnknownEntityType(entity_type.to_owned()));
        }
        if self.store.contains(&id) {
            return Err(WorldError::DuplicateEntityId(id));
        }
        self.insert_entity(id, entity_type, components, tags)
    }

    /// Attaches a component, merging `data` over its defaults.
    ///
    /// Returns `Ok(false)` if the entity already has it.
    pub fn add_component(&mut self, id: &EntityId, name: &str, data: Value) -> WorldResult<bool> {
        if self.require(id)?.has_component(name) {
            return Ok(false);
        }
        let (component_id, defaults) = self.registry.component_defaults(name);
        self.component_usage.acquire(name);
        let entity = self.require_mut(id)?;
        let old_key = entity.component_key.clone();
        entity.component_key.set(component_id);
        entity
            .components
            .insert(name.to_owned(), data.merged_over(&defaults));
        let new_key = entity.component_key.clone();

        self.indices.component.rekey(&old_key, &new_key, id);
        self.store.relink(id);
        self.note(Mutation::new(
            id.clone(),
            MutationKind::ComponentAdded(component_id),
        ));
        Ok(true)
    }

    /// Detaches a component. Returns `Ok(false)` if the entity does not have it.
    pub fn remove_component(&mut self, id: &EntityId, name: &str) -> WorldResult<bool> {
        if !self.require(id)?.has_component(name) {
            return Ok(false);
        }
        let Some(component_id) = self.registry.components.get_id(name) else {
            return Ok(false);
        };
        let entity = self.require_mut(id)?;
        let old_key = entity.component_key.clone();
        entity.component_key.clear(component_id);
        entity.components.remove(name);
        let new_key = entity.component_key.clone();

        self.indices.component.rekey(&old_key, &new_key, id);
        self.store.relink(id);
        self.component_usage.release(name);
        self.note(Mutation::new(
            id.clone(),
            MutationKind::ComponentRemoved(component_id),
        ));
        Ok(true)
    }

    /// Adds a tag, registering it lazily. Returns `Ok(false)` if already present.
    pub fn add_tag(&mut self, id: &EntityId, tag: &str) -> WorldResult<bool> {
        if self.require(id)?.has_tag(tag) {
            return Ok(false);
        }
        let tag_id = self.registry.tags.register(tag);
        self.tag_usage.acquire(tag);
        let entity = self.require_mut(id)?;
        let old_key = entity.tag_key.clone();
        entity.tag_key.set(tag_id);
        entity.tags.insert(tag.to_owned());
        let new_key = entity.tag_key.clone();

        self.indices.tag.rekey(&old_key, &new_key, id);
        self.note(Mutation::new(id.clone(), MutationKind::TagAdded(tag_id)));
        Ok(true)
    }

    /// Removes a tag. Returns `Ok(false)` if the entity does not carry it.
    pub fn remove_tag(&mut self, id: &EntityId, tag: &str) -> WorldResult<bool> {
        if !self.require(id)?.has_tag(tag) {
            return Ok(false);
        }
        let Some(tag_id) = self.registry.tags.get_id(tag) else {
            return Ok(false);
        };
        let entity = self.require_mut(id)?;
        let old_key = entity.tag_key.clone();
        entity.tag_key.clear(tag_id);
        entity.tags.remove(tag);
        let new_key = entity.tag_key.clone();

        self.indices.tag.rekey(&old_key, &new_key, id);
        self.tag_usage.release(tag);
        self.note(Mutation::new(id.clone(), MutationKind::TagRemoved(tag_id)));
        Ok(true)
    }

    /// Replaces a component's data, attaching the component if it is missing.
    pub fn set_component(&mut self, id: &EntityId, name: &str, data: Value) -> WorldResult<()> {
        if !self.require(id)?.has_component(name) {
            self.add_component(id, name, data)?;
            return Ok(());
        }
        self.require_mut(id)?
            .components
            .insert(name.to_owned(), data);
        self.store.relink(id);
        self.note(Mutation::new(
            id.clone(),
            MutationKind::ComponentChanged(name.to_owned()),
        ));
        Ok(())
    }

    /// Edits a component's data in place.
    ///
    /// Returns `Ok(false)` if the entity does not have the component.
    pub fn update_component(
        &mut self,
        id: &EntityId,
        name: &str,
        edit: impl FnOnce(&mut Value),
    ) -> WorldResult<bool> {
        let entity = self.require_mut(id)?;
        let Some(value) = entity.components.get_mut(name) else {
            return Ok(false);
        };
        edit(value);
        self.store.relink(id);
        self.note(Mutation::new(
            id.clone(),
            MutationKind::ComponentChanged(name.to_owned()),
        ));
        Ok(true)
    }

    /// Marks an entity for removal at the next reconciliation.
    ///
    /// The entity stays visible to queries until then, but references to it no
    /// longer resolve. Returns false for unknown or already marked entities.
    pub fn destroy(&mut self, id: &EntityId) -> bool {
        if !self.store.contains(id) || !self.pending_destroy.insert(id.clone()) {
            return false;
        }
        trace!("Entity {id} marked for destruction");
        true
    }

    /// True if `id` is marked for removal.
    pub fn is_pending_destroy(&self, id: &EntityId) -> bool {
        self.pending_destroy.contains(id)
    }

    /// Reconciles the world.
    ///
    /// Clears the per-tick change markers, removes every marked entity and
    /// nulls out references to them, brings the query cache up to date, then
    /// releases the identifiers of keys no stored entity holds anymore.
    ///
    /// References cleared here are reported by
    /// [`World::changed_this_tick`] until the next reconciliation.
    pub fn cleanup(&mut self) {
        self.log.clear_markers();
        let doomed = std::mem::take(&mut self.pending_destroy);
        let removed = doomed.len();
        for id in &doomed {
            self.remove_entity(id);
        }
        if removed > 0 {
            self.destroy_epoch += 1;
        }
        self.sync_cache();

        let released = if self.config.release_unused_keys {
            self.release_unused_keys()
        } else {
            for domain in Domain::INDEXED {
                self.usage_mut(domain).unused.clear();
            }
            0
        };
        if removed > 0 || released > 0 {
            debug!(
                "Reconciled world: {removed} entity(ies) removed, {released} identifier(s) released"
            );
        }
    }

    /// Returns an entity record.
    pub fn get(&self, id: &EntityId) -> Option<&Entity> {
        self.store.get(id)
    }

    /// Returns the data of one component of an entity.
    pub fn component(&self, id: &EntityId, name: &str) -> Option<&Value> {
        self.store.get(id)?.component(name)
    }

    /// True if the entity exists and has the component.
    pub fn has_component(&self, id: &EntityId, name: &str) -> bool {
        self.store.get(id).is_some_and(|e| e.has_component(name))
    }

    /// True if the entity is stored, marked for removal or not.
    pub fn contains(&self, id: &EntityId) -> bool {
        self.store.contains(id)
    }

    /// Number of stored entities, including those marked for removal.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// True if no entity is stored.
    pub fn is_empty(&self) -> bool {
        self.store.len() == 0
    }

    /// Iterates every stored entity in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.store.iter()
    }

    /// Follows an entity reference held in a component value.
    ///
    /// Yields nothing if the value is not a reference, or if its target is
    /// gone or marked for removal.
    pub fn resolve_ref(&self, value: &Value) -> Option<&Entity> {
        let target = value.as_entity()?;
        if self.pending_destroy.contains(target) {
            return None;
        }
        self.store.get(target)
    }

    /// The entities whose components currently reference `target`.
    pub fn referrers_of(&self, target: &EntityId) -> Vec<EntityId> {
        self.store
            .referrers_of(target)
            .map(|holders| holders.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Entities created since the last reconciliation.
    pub fn created_this_tick(&self) -> impl Iterator<Item = &EntityId> {
        self.log.created_this_tick()
    }

    /// Entities whose `component` data changed since the last reconciliation.
    pub fn changed_this_tick(&self, component: &str) -> impl Iterator<Item = &EntityId> {
        self.log.changed_this_tick(component)
    }

    /// Applies the pending mutation batch to the query cache.
    pub(crate) fn sync_cache(&mut self) {
        if self.log.has_pending() {
            let batch = self.log.drain();
            self.cache.refresh(&batch);
        }
    }

    fn insert_entity(
        &mut self,
        id: EntityId,
        entity_type: &str,
        components: BTreeMap<String, Value>,
        tags: &[&str],
    ) -> WorldResult<EntityId> {
        let type_id = self.registry.entity_types.register(entity_type);
        self.type_usage.acquire(entity_type);
        let mut component_key = KeySet::new();
        for name in components.keys() {
            let (component_id, _) = self.registry.component_defaults(name);
            self.component_usage.acquire(name);
            component_key.set(component_id);
        }

        let mut tag_set = BTreeSet::new();
        let mut tag_key = KeySet::new();
        for tag in tags {
            if tag_set.insert((*tag).to_owned()) {
                tag_key.set(self.registry.tags.register(tag));
                self.tag_usage.acquire(tag);
            }
        }

        let entity = Entity {
            id: id.clone(),
            type_name: entity_type.to_owned(),
            type_key: type_id.key(),
            component_key,
            tag_key,
            tags: tag_set,
            components,
        };
        self.indices.component.append(&entity.component_key, id.clone());
        self.indices.tag.append(&entity.tag_key, id.clone());
        self.indices.entity_type.append(&entity.type_key, id.clone());
        self.store.insert(entity);

        self.note(Mutation::new(id.clone(), MutationKind::Created));
        trace!("Created entity {id} of type '{entity_type}'");
        Ok(id)
    }

    fn note(&mut self, mutation: Mutation) {
        for domain in mutation.domains() {
            self.memo.invalidate(*domain);
        }
        self.log.record(mutation);
    }

    fn require(&self, id: &EntityId) -> WorldResult<&Entity> {
        self.store
            .get(id)
            .ok_or_else(|| WorldError::EntityNotFound(id.clone()))
    }

    fn require_mut(&mut self, id: &EntityId) -> WorldResult<&mut Entity> {
        self.store
            .get_mut(id)
            .ok_or_else(|| WorldError::EntityNotFound(id.clone()))
    }

    fn usage_mut(&mut self, domain: Domain) -> &mut KeyUsage {
        match domain {
            Domain::Component => &mut self.component_usage,
            Domain::Tag => &mut self.tag_usage,
            Domain::EntityType | Domain::Id => &mut self.type_usage,
        }
    }

    fn remove_entity(&mut self, id: &EntityId) {
        let Some((entity, holders)) = self.store.remove(id) else {
            return;
        };
        self.indices.component.remove(&entity.component_key, id);
        self.indices.tag.remove(&entity.tag_key, id);
        self.indices.entity_type.remove(&entity.type_key, id);
        self.type_usage.release(&entity.type_name);
        for name in entity.components.keys() {
            self.component_usage.release(name);
        }
        for tag in &entity.tags {
            self.tag_usage.release(tag);
        }

        for holder in holders {
            let Some(record) = self.store.get_mut(&holder) else {
                continue;
            };
            let changed: Vec<String> = record
                .components
                .iter_mut()
                .filter_map(|(name, value)| (value.nullify_references(id) > 0).then(|| name.clone()))
                .collect();
            self.store.relink(&holder);
            for name in changed {
                self.note(Mutation::new(
                    holder.clone(),
                    MutationKind::ComponentChanged(name),
                ));
            }
        }
        self.note(Mutation::new(id.clone(), MutationKind::Destroyed));
    }

    /// Frees the bits of keys that went unused, dropping every cached result
    /// that depends on them. Descriptors stay registered, so a released
    /// component or entity type gets a bit again the next time it is used.
    fn release_unused_keys(&mut self) -> usize {
        let mut released = 0;
        for domain in Domain::INDEXED {
            for key in self.usage_mut(domain).take_unused() {
                if domain == Domain::Tag && self.registry.is_pinned_tag(&key) {
                    continue;
                }
                let Some(identifier) = self.registry.release_key(domain, &key) else {
                    continue;
                };
                self.cache.invalidate_identifier(domain, identifier);
                self.memo.invalidate(domain);
                trace!("Released {domain} '{key}' (bit {})", identifier.0);
                released += 1;
            }
        }
        released
    }
}
