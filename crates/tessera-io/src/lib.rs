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

//! Saving and restoring Tessera worlds.
//!
//! A [`Snapshot`] is a flat list of entity records whose component data is a
//! JSON tree. References between entities are written as tagged strings
//! instead of being inlined, which keeps the snapshot flat and lets cyclic
//! entity graphs round-trip. Loading is done in two passes: every entity is
//! recreated first, then references are relinked.

#![warn(missing_docs)]

pub mod snapshot;

pub use snapshot::{
    load, save, DeserializationError, Deserializer, JsonSnapshotStrategy, LoadReport,
    SerializationError, Serializer, Snapshot, SnapshotRecord, SnapshotStrategy,
};
