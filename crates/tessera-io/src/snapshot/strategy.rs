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

//! Defines the contract for byte-level snapshot strategies and their error types.

use std::error::Error;
use std::fmt;
use std::io;

use tessera_data::ecs::World;

use crate::snapshot::{load, save, LoadReport, Snapshot};

/// An error that can occur while producing snapshot bytes.
#[derive(Debug)]
pub enum SerializationError {
    /// The snapshot could not be encoded.
    ProcessingFailed(String),
    /// Writing the encoded snapshot failed.
    Io(io::Error),
}

/// An error that can occur while reading snapshot bytes.
///
/// Only bytes that cannot be decoded at all fail a load. Problems with
/// individual records are reported in the [`LoadReport`] instead.
#[derive(Debug)]
pub enum DeserializationError {
    /// The data is not a snapshot.
    InvalidFormat(String),
    /// Reading the snapshot failed.
    Io(io::Error),
}

impl fmt::Display for SerializationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SerializationError::ProcessingFailed(msg) => {
                write!(f, "Serialization failed: {}", msg)
            }
            SerializationError::Io(e) => write!(f, "Serialization failed: I/O - {}", e),
        }
    }
}

impl fmt::Display for DeserializationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeserializationError::InvalidFormat(msg) => {
                write!(f, "Deserialization failed: Invalid format - {}", msg)
            }
            DeserializationError::Io(e) => write!(f, "Deserialization failed: I/O - {}", e),
        }
    }
}

impl Error for SerializationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            SerializationError::Io(e) => Some(e),
            SerializationError::ProcessingFailed(_) => None,
        }
    }
}

impl Error for DeserializationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            DeserializationError::Io(e) => Some(e),
            DeserializationError::InvalidFormat(_) => None,
        }
    }
}

/// The contract for converting a world to and from bytes.
pub trait SnapshotStrategy: Send + Sync {
    /// Returns the unique, versioned identifier of this strategy.
    ///
    /// Example: `"TS_SNAPSHOT_JSON_V1"`.
    fn strategy_id(&self) -> &'static str;

    /// Serializes every stored entity of `world`.
    fn serialize(&self, world: &World) -> Result<Vec<u8>, SerializationError>;

    /// Populates `world` from bytes produced by [`SnapshotStrategy::serialize`].
    fn deserialize(&self, data: &[u8], world: &mut World)
        -> Result<LoadReport, DeserializationError>;
}

/// Stores snapshots as JSON text.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonSnapshotStrategy {
    /// Indent the output for humans.
    pub pretty: bool,
}

impl JsonSnapshotStrategy {
    /// Creates a strategy producing compact JSON.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a strategy producing indented JSON.
    pub fn pretty() -> Self {
        Self { pretty: true }
    }
}

impl SnapshotStrategy for JsonSnapshotStrategy {
    fn strategy_id(&self) -> &'static str {
        "TS_SNAPSHOT_JSON_V1"
    }

    fn serialize(&self, world: &World) -> Result<Vec<u8>, SerializationError> {
        let snapshot = save(world);
        let text = if self.pretty {
            snapshot.to_json_pretty()?
        } else {
            snapshot.to_json()?
        };
        Ok(text.into_bytes())
    }

    fn deserialize(
        &self,
        data: &[u8],
        world: &mut World,
    ) -> Result<LoadReport, DeserializationError> {
        let snapshot = Snapshot::from_slice(data)?;
        Ok(load(world, &snapshot))
    }
}
