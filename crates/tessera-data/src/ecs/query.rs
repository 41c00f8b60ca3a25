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

//! The query builder and the step-by-step execution of a query plan.

use std::collections::{BTreeSet, HashMap};

use log::trace;
use tessera_core::ecs::{EntityId, KeySet};

use crate::ecs::{
    entity_store::EntityStore, planner::canonicalize, Constraint, Domain, DomainIndices, Entity,
    MatchSource, QueryStep, ResolvedStep, World,
};

/// An ordered list of filter steps.
///
/// Steps are intersected: an entity is returned only if it passes every step.
/// The order steps are added in does not matter; equivalent queries share a
/// canonical [`Query::key`] and the same cached step results.
///
/// ```ignore
/// let burning = Query::new()
///     .all_components(["Health"])
///     .any_tags(["burning", "frozen"])
///     .none_types(["Boss"]);
/// let ids = world.query(&burning);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Query {
    steps: Vec<QueryStep>,
}

impl Query {
    /// Creates an empty query, which matches every entity.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a step.
    pub fn step<S: Into<String>>(
        mut self,
        constraint: Constraint,
        domain: Domain,
        operands: impl IntoIterator<Item = S>,
    ) -> Self {
        self.steps.push(QueryStep::new(constraint, domain, operands));
        self
    }

    /// The steps in the order they were added.
    pub fn steps(&self) -> &[QueryStep] {
        &self.steps
    }

    /// The canonical key: equal for any two queries with the same steps in any order.
    pub fn key(&self) -> String {
        canonicalize(&self.steps).key
    }

    /// Runs the query against `world`.
    pub fn get(&self, world: &mut World) -> Vec<EntityId> {
        world.query(self)
    }
}

macro_rules! step_helpers {
    ($($name:ident => $constraint:ident, $domain:ident;)*) => {
        impl Query {
            $(
                #[doc = concat!("Appends a `", stringify!($constraint), "` step over `", stringify!($domain), "` operands.")]
                pub fn $name<S: Into<String>>(self, operands: impl IntoIterator<Item = S>) -> Self {
                    self.step(Constraint::$constraint, Domain::$domain, operands)
                }
            )*
        }
    };
}

step_helpers! {
    all_components => All, Component;
    any_components => Any, Component;
    none_components => None, Component;
    some_components => Some, Component;
    all_tags => All, Tag;
    any_tags => Any, Tag;
    none_tags => None, Tag;
    some_tags => Some, Tag;
    all_types => All, EntityType;
    any_types => Any, EntityType;
    none_types => None, EntityType;
    some_types => Some, EntityType;
    ids => Any, Id;
    exclude_ids => None, Id;
}

/// Iterates the records matched by a query, in id order.
pub struct QueryIter<'w> {
    world: &'w World,
    ids: std::vec::IntoIter<EntityId>,
}

impl<'w> Iterator for QueryIter<'w> {
    type Item = &'w Entity;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let id = self.ids.next()?;
            if let Some(entity) = self.world.store.get(&id) {
                return Some(entity);
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.ids.len()))
    }
}

/// Whole-store step results that are thrown away, not reconciled.
///
/// Used for steps the query cache does not hold: `Some` steps with nothing to
/// narrow yet, and steps naming an operand that has no identifier. Any
/// mutation in a domain drops that domain's results.
#[derive(Debug, Default)]
pub(crate) struct IndexMemo {
    sets: HashMap<Domain, HashMap<String, BTreeSet<EntityId>>>,
}

impl IndexMemo {
    pub(crate) fn invalidate(&mut self, domain: Domain) {
        self.sets.remove(&domain);
    }

    fn get_or_compute(
        &mut self,
        domain: Domain,
        signature: String,
        compute: impl FnOnce() -> BTreeSet<EntityId>,
    ) -> &BTreeSet<EntityId> {
        self.sets
            .entry(domain)
            .or_default()
            .entry(signature)
            .or_insert_with(compute)
    }
}

/// The part of a world a filter step is evaluated against.
struct IndexView<'w> {
    store: &'w EntityStore,
    indices: &'w DomainIndices,
    destroy_epoch: u64,
}

impl MatchSource for IndexView<'_> {
    fn evaluate(&self, step: &ResolvedStep) -> BTreeSet<EntityId> {
        self.indices
            .get(step.domain)
            .map(|index| index.matching(|key| step.matches(key)))
            .unwrap_or_default()
    }

    fn qualifies(&self, entity: &EntityId, step: &ResolvedStep) -> bool {
        self.store
            .get(entity)
            .and_then(|e| e.key(step.domain))
            .is_some_and(|key| step.matches(key))
    }

    fn is_alive(&self, entity: &EntityId) -> bool {
        self.store.contains(entity)
    }

    fn destroy_epoch(&self) -> u64 {
        self.destroy_epoch
    }
}

fn intersect(running: Option<BTreeSet<EntityId>>, matched: &BTreeSet<EntityId>) -> BTreeSet<EntityId> {
    match running {
        None => matched.clone(),
        Some(mut running) => {
            running.retain(|id| matched.contains(id));
            running
        }
    }
}

impl World {
    /// Runs a query and returns the matching ids in ascending order.
    ///
    /// Pending mutations are applied to the query cache first. Steps run in
    /// canonical order and execution stops as soon as the running result is
    /// empty. A query with no steps returns every stored entity.
    pub fn query(&mut self, query: &Query) -> Vec<EntityId> {
        self.sync_cache();
        let plan = self.planner.plan(query.steps());

        let mut running: Option<BTreeSet<EntityId>> = None;
        for step in &plan.steps {
            let narrowed = match step.domain {
                Domain::Id => self.id_step(step, running),
                _ => self.filter_step(step, running),
            };
            if narrowed.is_empty() {
                trace!("Query '{}' short-circuited at step '{}'", plan.key, step.signature());
                return Vec::new();
            }
            running = Some(narrowed);
        }

        match running {
            Some(ids) => ids.into_iter().collect(),
            None => self.store.entities.keys().cloned().collect(),
        }
    }

    /// Runs a query and iterates the matching records.
    pub fn query_iter(&mut self, query: &Query) -> QueryIter<'_> {
        let ids = self.query(query);
        QueryIter {
            world: self,
            ids: ids.into_iter(),
        }
    }

    /// Looks the operands of `step` up in the registry.
    fn resolve_step(&self, step: &QueryStep) -> ResolvedStep {
        let keys = self.registry.keys(step.domain);
        let mut identifiers = Vec::with_capacity(step.operands.len());
        let mut fully_resolved = true;
        for operand in &step.operands {
            match keys.and_then(|k| k.get_id(operand)) {
                Some(id) => identifiers.push(id),
                None => fully_resolved = false,
            }
        }
        ResolvedStep {
            constraint: step.constraint,
            domain: step.domain,
            mask: KeySet::from_identifiers(identifiers.iter().copied()),
            identifiers,
            fully_resolved,
            cache_key: step.cache_key.clone(),
        }
    }

    fn id_step(&self, step: &QueryStep, running: Option<BTreeSet<EntityId>>) -> BTreeSet<EntityId> {
        let named: BTreeSet<EntityId> = step
            .operands
            .iter()
            .map(|operand| EntityId::new(operand.as_str()))
            .filter(|id| self.store.contains(id))
            .collect();
        match (step.constraint, running) {
            (Constraint::None, Some(mut running)) => {
                running.retain(|id| !named.contains(id));
                running
            }
            (Constraint::None, None) => self
                .store
                .entities
                .keys()
                .filter(|id| !named.contains(*id))
                .cloned()
                .collect(),
            (_, running) => intersect(running, &named),
        }
    }

    fn filter_step(
        &mut self,
        step: &QueryStep,
        running: Option<BTreeSet<EntityId>>,
    ) -> BTreeSet<EntityId> {
        let resolved = self.resolve_step(step);
        let view = IndexView {
            store: &self.store,
            indices: &self.indices,
            destroy_epoch: self.destroy_epoch,
        };

        // A narrowing step only looks at what is already selected.
        let running = match (step.constraint, running) {
            (Constraint::Some, Some(mut running)) => {
                running.retain(|id| view.qualifies(id, &resolved));
                return running;
            }
            (_, running) => running,
        };

        if !self.config.cache_queries {
            return intersect(running, &view.evaluate(&resolved));
        }
        if resolved.cacheable() {
            let matched = self.cache.resolve(&resolved, &view);
            return intersect(running, matched);
        }
        let matched = self
            .memo
            .get_or_compute(step.domain, step.signature(), || view.evaluate(&resolved));
        intersect(running, matched)
    }
}
