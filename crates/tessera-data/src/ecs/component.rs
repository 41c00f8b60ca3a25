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

//! Data-driven descriptors for component types and entity types.

use tessera_core::ecs::Value;

/// Separator used when an entity type is named after its component list.
pub const TYPE_SEPARATOR: char = '|';

/// Describes a kind of component: its name and the data a new instance starts with.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentType {
    /// The unique name of the component type.
    pub name: String,
    /// Data merged under whatever an entity supplies when the component is attached.
    pub defaults: Value,
}

impl ComponentType {
    /// Creates a component type with `Null` defaults.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            defaults: Value::Null,
        }
    }

    /// Sets the default data.
    pub fn with_defaults(mut self, defaults: Value) -> Self {
        self.defaults = defaults;
        self
    }
}

/// Describes a kind of entity as an ordered set of component types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityType {
    /// The unique name of the entity type.
    pub name: String,
    /// The component types every new entity of this type starts with.
    pub components: Vec<String>,
    /// True when the type was synthesized from a component list rather than declared.
    pub anonymous: bool,
}

impl EntityType {
    /// Declares a named entity type.
    pub fn new<S: Into<String>>(name: impl Into<String>, components: impl IntoIterator<Item = S>) -> Self {
        let mut components: Vec<String> = components.into_iter().map(Into::into).collect();
        dedup_in_place(&mut components);
        Self {
            name: name.into(),
            components,
            anonymous: false,
        }
    }

    /// Synthesizes an unnamed entity type from a component list.
    ///
    /// The name is the sorted component names joined with `|`, so the same set
    /// of components always produces the same type.
    pub fn anonymous<S: AsRef<str>>(components: &[S]) -> Self {
        let mut components: Vec<String> = components.iter().map(|c| c.as_ref().to_owned()).collect();
        components.sort();
        components.dedup();
        Self {
            name: synthesized_name(components.iter().map(String::as_str)),
            components,
            anonymous: true,
        }
    }
}

/// Joins component names into a synthesized type key.
pub fn synthesized_name<'a>(components: impl IntoIterator<Item = &'a str>) -> String {
    let mut names: Vec<&str> = components.into_iter().collect();
    names.sort_unstable();
    names.dedup();
    names.join(&TYPE_SEPARATOR.to_string())
}

fn dedup_in_place(items: &mut Vec<String>) {
    let mut seen = std::collections::HashSet::new();
    items.retain(|item| seen.insert(item.clone()));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anonymous_name_is_order_independent() {
        let a = EntityType::anonymous(&["Velocity", "Position"]);
        let b = EntityType::anonymous(&["Position", "Velocity", "Position"]);
        assert_eq!(a.name, "Position|Velocity");
        assert_eq!(a, b);
        assert!(a.anonymous);
    }

    #[test]
    fn test_named_type_keeps_declared_order() {
        let t = EntityType::new("Ship", ["Hull", "Engine", "Hull"]);
        assert_eq!(t.components, vec!["Hull".to_string(), "Engine".to_string()]);
        assert!(!t.anonymous);
    }
}
