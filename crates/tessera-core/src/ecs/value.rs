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

//! The structured value held by a component.

use crate::ecs::EntityId;
use num_bigint::BigInt;
use std::collections::{BTreeMap, BTreeSet};

/// Component data: primitives, nested arrays and objects, arbitrary-precision
/// integers, or a reference to another entity.
///
/// A value is owned by exactly one component of one entity. Entity references
/// are stored by id rather than by pointer, so a reference cycle between two
/// entities never becomes an ownership cycle.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// The absence of a value. Dangling references resolve to this.
    #[default]
    Null,
    /// A boolean.
    Bool(bool),
    /// A signed integer that fits in 64 bits.
    Int(i64),
    /// A floating point number.
    Float(f64),
    /// An integer of arbitrary precision.
    BigInt(BigInt),
    /// A UTF-8 string.
    String(String),
    /// An ordered list of values.
    Array(Vec<Value>),
    /// A map from field names to values.
    Object(BTreeMap<String, Value>),
    /// A reference to another entity.
    Entity(EntityId),
}

/// One step of a path into a nested [`Value`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// A field of an object.
    Key(String),
    /// An element of an array.
    Index(usize),
}

impl Value {
    /// Builds an object value from `(field, value)` pairs.
    pub fn object<K: Into<String>>(fields: impl IntoIterator<Item = (K, Value)>) -> Self {
        Value::Object(fields.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Returns true for [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Looks up a field when this value is an object.
    pub fn get(&self, field: &str) -> Option<&Value> {
        match self {
            Value::Object(map) => map.get(field),
            _ => None,
        }
    }

    /// Mutable counterpart of [`Value::get`].
    pub fn get_mut(&mut self, field: &str) -> Option<&mut Value> {
        match self {
            Value::Object(map) => map.get_mut(field),
            _ => None,
        }
    }

    /// Sets a field, turning a `Null` into an empty object first.
    ///
    /// Returns `false` (and changes nothing) if the value is neither an object nor `Null`.
    pub fn set(&mut self, field: impl Into<String>, value: Value) -> bool {
        if self.is_null() {
            *self = Value::Object(BTreeMap::new());
        }
        match self {
            Value::Object(map) => {
                map.insert(field.into(), value);
                true
            }
            _ => false,
        }
    }

    /// Returns the integer if this is an `Int`.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the number as `f64` if this is an `Int` or a `Float`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the big integer if this is a `BigInt`.
    pub fn as_bigint(&self) -> Option<&BigInt> {
        match self {
            Value::BigInt(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the string slice if this is a `String`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the referenced entity if this is an `Entity`.
    pub fn as_entity(&self) -> Option<&EntityId> {
        match self {
            Value::Entity(id) => Some(id),
            _ => None,
        }
    }

    /// Deep-merges `self` over `defaults`.
    ///
    /// Object fields present in `self` win; fields only in `defaults` are kept.
    /// Any non-object on either side means `self` replaces the default outright,
    /// except that a `Null` override leaves the default in place.
    pub fn merged_over(self, defaults: &Value) -> Value {
        match (self, defaults) {
            (Value::Null, d) => d.clone(),
            (Value::Object(mut over), Value::Object(base)) => {
                for (field, default) in base {
                    match over.remove(field) {
                        Some(v) => {
                            over.insert(field.clone(), v.merged_over(default));
                        }
                        None => {
                            over.insert(field.clone(), default.clone());
                        }
                    }
                }
                Value::Object(over)
            }
            (v, _) => v,
        }
    }

    /// Adds every entity referenced anywhere in this value to `out`.
    pub fn collect_references(&self, out: &mut BTreeSet<EntityId>) {
        match self {
            Value::Entity(id) => {
                out.insert(id.clone());
            }
            Value::Array(items) => items.iter().for_each(|v| v.collect_references(out)),
            Value::Object(map) => map.values().for_each(|v| v.collect_references(out)),
            _ => {}
        }
    }

    /// Replaces every reference to `target` with `Null`, returning how many were replaced.
    pub fn nullify_references(&mut self, target: &EntityId) -> usize {
        match self {
            Value::Entity(id) if id == target => {
                *self = Value::Null;
                1
            }
            Value::Array(items) => items.iter_mut().map(|v| v.nullify_references(target)).sum(),
            Value::Object(map) => map.values_mut().map(|v| v.nullify_references(target)).sum(),
            _ => 0,
        }
    }

    /// Walks `path` and returns the nested value it points at.
    pub fn at_path_mut(&mut self, path: &[PathSegment]) -> Option<&mut Value> {
        let mut current = self;
        for segment in path {
            current = match (segment, current) {
                (PathSegment::Key(k), Value::Object(map)) => map.get_mut(k)?,
                (PathSegment::Index(i), Value::Array(items)) => items.get_mut(*i)?,
                _ => return None,
            };
        }
        Some(current)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v.into())
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<BigInt> for Value {
    fn from(v: BigInt) -> Self {
        Value::BigInt(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<EntityId> for Value {
    fn from(v: EntityId) -> Self {
        Value::Entity(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::Array(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_keeps_defaults_and_overrides() {
        let defaults = Value::object([
            ("hp", Value::Int(100)),
            ("pos", Value::object([("x", Value::Int(0)), ("y", Value::Int(0))])),
        ]);
        let over = Value::object([("pos", Value::object([("x", Value::Int(5))]))]);

        let merged = over.merged_over(&defaults);
        assert_eq!(merged.get("hp"), Some(&Value::Int(100)));
        assert_eq!(merged.get("pos").and_then(|p| p.get("x")), Some(&Value::Int(5)));
        assert_eq!(merged.get("pos").and_then(|p| p.get("y")), Some(&Value::Int(0)));

        assert_eq!(Value::Null.merged_over(&defaults), defaults);
        assert_eq!(Value::Int(3).merged_over(&defaults), Value::Int(3));
    }

    #[test]
    fn test_reference_collection_and_nullify() {
        let a = EntityId::new("a");
        let b = EntityId::new("b");
        let mut value = Value::object([
            ("target", Value::Entity(a.clone())),
            ("others", Value::Array(vec![Value::Entity(b.clone()), Value::Entity(a.clone())])),
        ]);

        let mut refs = BTreeSet::new();
        value.collect_references(&mut refs);
        assert_eq!(refs.into_iter().collect::<Vec<_>>(), vec![a.clone(), b.clone()]);

        assert_eq!(value.nullify_references(&a), 2);
        assert_eq!(value.get("target"), Some(&Value::Null));
        assert_eq!(
            value.get("others"),
            Some(&Value::Array(vec![Value::Entity(b), Value::Null]))
        );
    }

    #[test]
    fn test_at_path_mut() {
        let mut value = Value::object([("list", Value::Array(vec![Value::Null, Value::Int(1)]))]);
        let path = [PathSegment::Key("list".into()), PathSegment::Index(1)];
        *value.at_path_mut(&path).unwrap() = Value::Int(7);
        assert_eq!(value.get("list"), Some(&Value::Array(vec![Value::Null, Value::Int(7)])));
        assert!(value.at_path_mut(&[PathSegment::Index(0)]).is_none());
    }
}
