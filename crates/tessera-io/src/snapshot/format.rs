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

//! The on-disk shape of a snapshot.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};

use crate::snapshot::{DeserializationError, SerializationError};

/// One saved entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    /// The entity's id, kept across save and load.
    pub id: String,
    /// A registered entity type name, or the `|`-joined component names of an
    /// entity that has no registered type.
    #[serde(rename = "type")]
    pub entity_type: String,
    /// The entity's tags.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Component name to component data.
    #[serde(rename = "$", default)]
    pub data: Map<String, Json>,
}

/// A flat, ordered list of entity records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot {
    /// The records, in entity id order when produced by the serializer.
    pub records: Vec<SnapshotRecord>,
}

impl Snapshot {
    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True if there are no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterates the records.
    pub fn iter(&self) -> impl Iterator<Item = &SnapshotRecord> {
        self.records.iter()
    }

    /// Looks a record up by entity id.
    pub fn record(&self, id: &str) -> Option<&SnapshotRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    /// Compact JSON text.
    pub fn to_json(&self) -> Result<String, SerializationError> {
        serde_json::to_string(self).map_err(|e| SerializationError::ProcessingFailed(e.to_string()))
    }

    /// Indented JSON text.
    pub fn to_json_pretty(&self) -> Result<String, SerializationError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| SerializationError::ProcessingFailed(e.to_string()))
    }

    /// Parses JSON text.
    pub fn from_json(text: &str) -> Result<Self, DeserializationError> {
        serde_json::from_str(text).map_err(|e| DeserializationError::InvalidFormat(e.to_string()))
    }

    /// Parses JSON bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, DeserializationError> {
        serde_json::from_slice(bytes).map_err(|e| DeserializationError::InvalidFormat(e.to_string()))
    }

    /// Writes indented JSON to `path`.
    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<(), SerializationError> {
        let text = self.to_json_pretty()?;
        fs::write(path, text).map_err(SerializationError::Io)
    }

    /// Reads a snapshot written by [`Snapshot::write_to`].
    pub fn read_from(path: impl AsRef<Path>) -> Result<Self, DeserializationError> {
        let bytes = fs::read(path).map_err(DeserializationError::Io)?;
        Self::from_slice(&bytes)
    }
}
