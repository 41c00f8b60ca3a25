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

//! Runtime configuration of a [`World`](crate::ecs::World).

use crate::ecs::{WorldError, WorldResult};
use serde::{Deserialize, Serialize};

/// Tunables for a world. Every field has a default, so a config document only
/// needs to name the fields it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Memoize filter steps in the query cache. When disabled, every step is
    /// computed fresh from the entity index.
    pub cache_queries: bool,
    /// At reconciliation, release the identifier of every component, tag and
    /// entity type no stored entity holds anymore. Tags pre-declared through
    /// `World::register` are never released.
    pub release_unused_keys: bool,
    /// Deepest component value nesting the serializer will descend into.
    pub max_value_depth: usize,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            cache_queries: true,
            release_unused_keys: true,
            max_value_depth: 128,
        }
    }
}

impl WorldConfig {
    /// Parses a configuration from a RON document.
    pub fn from_ron_str(source: &str) -> WorldResult<Self> {
        let config: WorldConfig =
            ron::from_str(source).map_err(|e| WorldError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the values are usable.
    pub fn validate(&self) -> WorldResult<()> {
        if self.max_value_depth == 0 {
            return Err(WorldError::InvalidConfig(
                "max_value_depth must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_ron_document_keeps_defaults() {
        let config = WorldConfig::from_ron_str("(cache_queries: false)").unwrap();
        assert!(!config.cache_queries);
        assert!(config.release_unused_keys);
        assert_eq!(config.max_value_depth, 128);
    }

    #[test]
    fn test_zero_depth_is_rejected() {
        let err = WorldConfig::from_ron_str("(max_value_depth: 0)").unwrap_err();
        assert!(matches!(err, WorldError::InvalidConfig(_)));
    }

    #[test]
    fn test_malformed_document_is_rejected() {
        assert!(WorldConfig::from_ron_str("(cache_queries: ").is_err());
    }
}
