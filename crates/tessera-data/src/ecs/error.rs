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

//! Errors raised by calling-convention misuse of the world.
//!
//! Data-shape anomalies (unknown keys in a query, dangling references, a tick
//! requested while another is running) never surface here: they are absorbed
//! with a warning and a safe default.

use tessera_core::ecs::EntityId;
use thiserror::Error;

/// An error returned by a [`World`](crate::ecs::World) operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorldError {
    /// The entity type was never registered, so no valid entity can be produced.
    #[error("entity type `{0}` is not registered")]
    UnknownEntityType(String),
    /// The operation targeted an entity that does not exist.
    #[error("entity `{0}` does not exist")]
    EntityNotFound(EntityId),
    /// An entity with this id is already stored.
    #[error("an entity with id `{0}` already exists")]
    DuplicateEntityId(EntityId),
    /// A configuration value is out of range or could not be parsed.
    #[error("invalid world configuration: {0}")]
    InvalidConfig(String),
}

/// A `Result` alias for world operations.
pub type WorldResult<T> = Result<T, WorldError>;
