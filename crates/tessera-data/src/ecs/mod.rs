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

//! Implements Tessera's tag-and-component entity store.
//!
//! Entities are records of named components and string tags. Every component
//! name, tag and entity-type name is given a single-bit [`Identifier`] by the
//! [`Registry`], and each entity carries one composite [`KeySet`] per domain.
//! The [`EntityIndex`] groups entities by composite key so a filter step only
//! has to test each distinct key once.
//!
//! Queries are ordered lists of filter steps. The planner canonicalizes them so
//! that equivalent queries share cache keys, and the [`QueryCache`] keeps each
//! step's result up to date incrementally from the [`MutationLog`]: on read it
//! only re-tests the entities that changed since the last read.
//!
//! The primary entry point for interacting with the store is the [`World`] struct.

mod cache;
mod component;
mod entity;
mod entity_store;
mod error;
mod index;
mod mutation;
mod planner;
mod query;
mod query_plan;
mod registry;
mod tick;
mod world;

pub use cache::{CacheStats, MatchSource, QueryCache};
pub use component::{synthesized_name, ComponentType, EntityType, TYPE_SEPARATOR};
pub use entity::Entity;
pub use error::{WorldError, WorldResult};
pub use index::{DomainIndices, EntityIndex};
pub use mutation::{Mutation, MutationBatch, MutationKind, MutationLog};
pub use query::{Query, QueryIter};
pub use query_plan::{Constraint, Domain, QueryPlan, QueryStep, ResolvedStep};
pub use registry::{KeyRegistry, Registry};
pub use tick::TickStatus;
pub use world::World;

pub use tessera_core::ecs::{EntityId, Identifier, KeySet, PathSegment, Value};

#[cfg(test)]
mod tests;
