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

use std::collections::BTreeMap;

use log::{debug, trace, warn};
use num_bigint::BigInt;
use serde_json::Value as Json;
use tessera_core::ecs::{EntityId, PathSegment, Value};
use tessera_data::ecs::{synthesized_name, ComponentType, EntityType, World};

use crate::snapshot::codec::{decode_string, Decoded};
use crate::snapshot::{Snapshot, SnapshotRecord};

/// What a load did, and every anomaly it absorbed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LoadReport {
    /// Records recreated as entities.
    pub loaded: usize,
    /// Records left out, because their id was taken or their entity could not be built.
    pub skipped: usize,
    /// References pointed at their reconstructed target.
    pub relinked: usize,
    /// References whose target was not found; they were left `null`.
    pub dangling: usize,
    /// One message per recoverable anomaly, in the order they were met.
    pub warnings: Vec<String>,
}

/// A reference field awaiting the relink pass.
#[derive(Debug)]
struct PendingLink {
    holder: EntityId,
    component: String,
    path: Vec<PathSegment>,
    target: EntityId,
}

/// Rebuilds entities from a [`Snapshot`] in two passes.
///
/// The first pass recreates every record under its saved id, with every
/// reference field left `null` and remembered. The second pass, once all
/// records exist, points each remembered field at its target. References can
/// therefore go forward, backward, or around a cycle.
pub struct Deserializer<'w> {
    world: &'w mut World,
    links: Vec<PendingLink>,
    report: LoadReport,
}

impl<'w> Deserializer<'w> {
    /// Creates a deserializer populating `world`.
    pub fn new(world: &'w mut World) -> Self {
        Self {
            world,
            links: Vec::new(),
            report: LoadReport::default(),
        }
    }

    /// Runs both passes and returns the report.
    pub fn load(mut self, snapshot: &Snapshot) -> LoadReport {
        // First Pass: recreate every entity under its saved id.
        for record in &snapshot.records {
            self.materialize(record);
        }
        // Second Pass: every saved id now exists, so references can be resolved.
        self.relink();

        debug!(
            "Loaded snapshot: {} entity(ies), {} skipped, {} reference(s) relinked, {} dangling",
            self.report.loaded, self.report.skipped, self.report.relinked, self.report.dangling
        );
        self.report
    }

    fn materialize(&mut self, record: &SnapshotRecord) {
        let id = EntityId::new(&record.id);
        if self.world.contains(&id) {
            self.warn(format!(
                "Snapshot record '{id}' skipped: an entity with that id already exists"
            ));
            self.report.skipped += 1;
            return;
        }

        let entity_type = self.resolve_type(record);

        let mut links = Vec::new();
        let mut data = BTreeMap::new();
        for (component, json) in &record.data {
            let mut path = Vec::new();
            let mut fields = Vec::new();
            let value = read_value(json, &mut path, &mut fields);
            links.extend(fields.into_iter().map(|(path, target)| PendingLink {
                holder: id.clone(),
                component: component.clone(),
                path,
                target,
            }));
            data.insert(component.clone(), value);
        }

        let tags: Vec<&str> = record.tags.iter().map(String::as_str).collect();
        if let Err(e) = self.world.restore(id.clone(), &entity_type, data, &tags) {
            self.warn(format!("Snapshot record '{id}' skipped: {e}"));
            self.report.skipped += 1;
            return;
        }

        self.links.extend(links);
        self.report.loaded += 1;
        trace!("Materialized entity {id} as '{entity_type}'");
    }

    /// Finds the entity type a record names, registering it from the record if
    /// the receiving world has never heard of it.
    fn resolve_type(&mut self, record: &SnapshotRecord) -> String {
        let missing: Vec<String> = record
            .data
            .keys()
            .filter(|name| self.world.registry().component_type(name).is_none())
            .cloned()
            .collect();
        for name in &missing {
            self.world.register_component(ComponentType::new(name.clone()));
        }

        if self.world.registry().entity_type(&record.entity_type).is_some() {
            if !missing.is_empty() {
                self.warn(format!(
                    "Snapshot record '{}' uses unregistered component(s) [{}]; registered with null defaults",
                    record.id,
                    missing.join(", ")
                ));
            }
            return record.entity_type.clone();
        }

        let components: Vec<&str> = record.data.keys().map(String::as_str).collect();
        let entity_type = if record.entity_type == synthesized_name(components.iter().copied()) {
            EntityType::anonymous(&components)
        } else {
            EntityType::new(record.entity_type.clone(), components.iter().copied())
        };
        self.warn(format!(
            "Entity type '{}' is not registered; registering it from the snapshot with component(s) [{}]{}",
            record.entity_type,
            components.join(", "),
            if missing.is_empty() {
                String::new()
            } else {
                format!(", of which unregistered: [{}]", missing.join(", "))
            }
        ));
        let name = entity_type.name.clone();
        self.world.register_entity_type(entity_type);
        name
    }

    fn relink(&mut self) {
        for link in std::mem::take(&mut self.links) {
            let target_alive =
                self.world.contains(&link.target) && !self.world.is_pending_destroy(&link.target);
            if !target_alive {
                trace!(
                    "Reference from {} to missing entity {} left null",
                    link.holder,
                    link.target
                );
                self.report.dangling += 1;
                continue;
            }

            let PendingLink {
                holder,
                component,
                path,
                target,
            } = link;
            let mut placed = false;
            let updated = self.world.update_component(&holder, &component, |value| {
                if let Some(slot) = value.at_path_mut(&path) {
                    *slot = Value::Entity(target);
                    placed = true;
                }
            });
            if matches!(updated, Ok(true)) && placed {
                self.report.relinked += 1;
            } else {
                self.report.dangling += 1;
            }
        }
    }

    fn warn(&mut self, message: String) {
        warn!("{message}");
        self.report.warnings.push(message);
    }
}

/// Converts snapshot JSON back into component data.
///
/// Every reference found is left `null` and its location appended to `links`.
fn read_value(
    json: &Json,
    path: &mut Vec<PathSegment>,
    links: &mut Vec<(Vec<PathSegment>, EntityId)>,
) -> Value {
    match json {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Bool(*b),
        Json::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Int(i)
            } else if let Some(u) = n.as_u64() {
                Value::BigInt(BigInt::from(u))
            } else {
                n.as_f64().map_or(Value::Null, Value::Float)
            }
        }
        Json::String(s) => match decode_string(s) {
            Decoded::Entity(target) => {
                links.push((path.clone(), target));
                Value::Null
            }
            Decoded::BigInt(n) => Value::BigInt(n),
            Decoded::Text(text) => Value::String(text.into_owned()),
        },
        Json::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                path.push(PathSegment::Index(i));
                out.push(read_value(item, path, links));
                path.pop();
            }
            Value::Array(out)
        }
        Json::Object(fields) => {
            let mut out = BTreeMap::new();
            for (key, item) in fields {
                path.push(PathSegment::Key(key.clone()));
                out.insert(key.clone(), read_value(item, path, links));
                path.pop();
            }
            Value::Object(out)
        }
    }
}
