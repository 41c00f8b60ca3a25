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

//! The snapshot format and the passes that produce and consume it.

mod codec;
mod deserializer;
mod format;
mod serializer;
mod strategy;

pub use codec::{decode_string, encode_string, Decoded, BIGINT_MARKER, ENTITY_REF_SENTINEL};
pub use deserializer::{Deserializer, LoadReport};
pub use format::{Snapshot, SnapshotRecord};
pub use serializer::Serializer;
pub use strategy::{
    DeserializationError, JsonSnapshotStrategy, SerializationError, SnapshotStrategy,
};

use tessera_data::ecs::World;

/// Captures every stored entity of `world`.
pub fn save(world: &World) -> Snapshot {
    Serializer::new(world).serialize()
}

/// Recreates the entities of `snapshot` in `world`, keeping their ids.
///
/// Anomalies in the snapshot never fail the load; they are logged and listed
/// in the returned report.
pub fn load(world: &mut World, snapshot: &Snapshot) -> LoadReport {
    Deserializer::new(world).load(snapshot)
}
