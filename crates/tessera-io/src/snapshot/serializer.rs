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

use log::warn;
use serde_json::{Map, Number, Value as Json};
use tessera_core::ecs::{EntityId, Value};
use tessera_data::ecs::{synthesized_name, Entity, World};

use crate::snapshot::codec::{encode_bigint, encode_entity_ref, encode_string};
use crate::snapshot::{Snapshot, SnapshotRecord};

/// Walks the component data of a world depth-first and flattens it into a [`Snapshot`].
///
/// References to other entities are written as tagged strings, never
/// inlined, so the output stays flat whatever the shape of the entity graph.
/// Values nested deeper than the world's `max_value_depth` are written as
/// `null`.
pub struct Serializer<'w> {
    world: &'w World,
    max_depth: usize,
}

impl<'w> Serializer<'w> {
    /// Creates a serializer reading `world`.
    pub fn new(world: &'w World) -> Self {
        Self {
            world,
            max_depth: world.config().max_value_depth,
        }
    }

    /// Produces one record per stored entity, in id order.
    pub fn serialize(&self) -> Snapshot {
        Snapshot {
            records: self.world.iter().map(|e| self.record(e)).collect(),
        }
    }

    fn record(&self, entity: &Entity) -> SnapshotRecord {
        let anonymous = self
            .world
            .registry()
            .entity_type(entity.type_name())
            .map_or(true, |t| t.anonymous);
        // An unnamed type is described by what the entity holds now.
        let entity_type = if anonymous {
            synthesized_name(entity.components().keys().map(String::as_str))
        } else {
            entity.type_name().to_owned()
        };

        let mut data = Map::new();
        for (name, value) in entity.components() {
            data.insert(name.clone(), self.write_value(value, entity.id(), 1));
        }

        SnapshotRecord {
            id: entity.id().to_string(),
            entity_type,
            tags: entity.tags().iter().cloned().collect(),
            data,
        }
    }

    fn write_value(&self, value: &Value, owner: &EntityId, depth: usize) -> Json {
        if depth > self.max_depth {
            warn!(
                "Component data of entity {owner} is nested deeper than {} levels; writing null",
                self.max_depth
            );
            return Json::Null;
        }
        match value {
            Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Int(i) => Json::Number((*i).into()),
            Value::Float(f) => match Number::from_f64(*f) {
                Some(n) => Json::Number(n),
                None => {
                    warn!("Entity {owner} holds a non-finite float ({f}); writing null");
                    Json::Null
                }
            },
            Value::BigInt(n) => Json::String(encode_bigint(n)),
            Value::String(s) => Json::String(encode_string(s).into_owned()),
            Value::Entity(target) => Json::String(encode_entity_ref(target)),
            Value::Array(items) => Json::Array(
                items
                    .iter()
                    .map(|item| self.write_value(item, owner, depth + 1))
                    .collect(),
            ),
            Value::Object(fields) => Json::Object(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), self.write_value(v, owner, depth + 1)))
                    .collect(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_data::ecs::{ComponentType, EntityType};
    use tessera_data::WorldConfig;

    #[test]
    fn test_named_and_anonymous_type_keys() {
        let mut world = World::new();
        world.register(
            &[EntityType::new("Ship", ["Position"])],
            &[ComponentType::new("Position")],
            &[],
        );
        let ship = world.create("Ship", vec![], &[]).unwrap();
        let blob = world.create_anonymous(&["B", "A"], vec![], &[]).unwrap();
        world.add_component(&blob, "C", Value::Int(1)).unwrap();

        let snapshot = Serializer::new(&world).serialize();
        assert_eq!(snapshot.record(ship.as_str()).unwrap().entity_type, "Ship");
        assert_eq!(snapshot.record(blob.as_str()).unwrap().entity_type, "A|B|C");
    }

    #[test]
    fn test_values_are_encoded() {
        let mut world = World::new();
        let target = world.create_anonymous(&["A"], vec![], &[]).unwrap();
        let big: num_bigint::BigInt = "98765432109876543210".parse().unwrap();
        let holder = world
            .create_anonymous(
                &["Data"],
                vec![(
                    "Data",
                    Value::object([
                        ("big", Value::BigInt(big)),
                        ("link", Value::Entity(target.clone())),
                        ("text", Value::from("7n")),
                        ("nan", Value::Float(f64::NAN)),
                    ]),
                )],
                &[],
            )
            .unwrap();

        let snapshot = Serializer::new(&world).serialize();
        let data = &snapshot.record(holder.as_str()).unwrap().data["Data"];
        assert_eq!(data["big"], Json::from("98765432109876543210n"));
        assert_eq!(data["link"], Json::from(format!("@entity|{target}")));
        assert_eq!(data["text"], Json::from("\\7n"));
        assert_eq!(data["nan"], Json::Null);
    }

    #[test]
    fn test_depth_limit_writes_null() {
        let mut world = World::with_config(WorldConfig {
            max_value_depth: 2,
            ..WorldConfig::default()
        })
        .unwrap();
        let nested = Value::Array(vec![Value::Array(vec![Value::Int(1)])]);
        let id = world
            .create_anonymous(&["Deep"], vec![("Deep", nested)], &[])
            .unwrap();

        let snapshot = Serializer::new(&world).serialize();
        assert_eq!(
            snapshot.record(id.as_str()).unwrap().data["Deep"],
            serde_json::json!([[null]])
        );
    }
}
