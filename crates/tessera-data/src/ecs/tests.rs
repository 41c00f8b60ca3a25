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

use std::sync::{Arc, Mutex};

use super::*;
use crate::config::WorldConfig;

// --- FIXTURES ---

/// A world with `Ship {Position, Velocity}` and `Rock {Position}` declared.
fn space_world() -> World {
    let mut world = World::new();
    world.register(
        &[
            EntityType::new("Ship", ["Position", "Velocity"]),
            EntityType::new("Rock", ["Position"]),
        ],
        &[
            ComponentType::new("Position")
                .with_defaults(Value::object([("x", Value::Int(0)), ("y", Value::Int(0))])),
            ComponentType::new("Velocity"),
            ComponentType::new("Link"),
        ],
        &[],
    );
    world
}

fn spawn(world: &mut World, entity_type: &str, n: usize, tags: &[&str]) -> Vec<EntityId> {
    (0..n)
        .map(|_| world.create(entity_type, vec![], tags).unwrap())
        .collect()
}

// --- TESTS ---

#[test]
fn test_component_steps_count_matching_entities() {
    // --- 1. SETUP ---
    let mut world = space_world();
    spawn(&mut world, "Ship", 7, &[]);
    spawn(&mut world, "Rock", 4, &[]);

    // --- 2. ASSERTIONS ---
    assert_eq!(world.query(&Query::new().all_components(["Position"])).len(), 11);
    assert_eq!(
        world
            .query(&Query::new().all_components(["Position", "Velocity"]))
            .len(),
        7
    );
    assert_eq!(
        world.query(&Query::new().none_components(["Position"])).len(),
        0,
        "Every entity has a Position"
    );
    assert_eq!(world.query(&Query::new().none_components(["Velocity"])).len(), 4);
    assert_eq!(world.query(&Query::new().all_types(["Rock"])).len(), 4);
    assert_eq!(world.query(&Query::new()).len(), 11, "An empty query matches everything");
}

#[test]
fn test_tag_steps_scenario() {
    let mut world = World::new();
    spawn_anonymous(&mut world, 5, &["a", "b", "c"]);
    spawn_anonymous(&mut world, 5, &["a"]);
    spawn_anonymous(&mut world, 5, &[]);

    assert_eq!(world.query(&Query::new().all_tags(["a"])).len(), 10);
    assert_eq!(world.query(&Query::new().none_tags(["a"])).len(), 5);
    assert_eq!(world.query(&Query::new().any_tags(["a", "b"])).len(), 10);
    assert_eq!(world.query(&Query::new().all_tags(["a", "b"])).len(), 5);
}

fn spawn_anonymous(world: &mut World, n: usize, tags: &[&str]) {
    for _ in 0..n {
        world.create_anonymous(&["Marker"], vec![], tags).unwrap();
    }
}

#[test]
fn test_cached_query_follows_creations_and_destruction() {
    // --- 1. SETUP ---
    let mut world = space_world();
    let query = Query::new().all_components(["Velocity"]).none_tags(["docked"]);
    let ships = spawn(&mut world, "Ship", 20, &[]);
    assert_eq!(query.get(&mut world).len(), 20);
    assert_eq!(
        world.cache().len(),
        1,
        "A step naming a tag nobody carries yet is not cached"
    );

    // --- 2. ACTION & ASSERTIONS ---
    // A new matching entity shows up without rebuilding the query.
    let extra = world.create("Ship", vec![], &[]).unwrap();
    assert_eq!(query.get(&mut world).len(), 21);

    // Destruction is deferred until reconciliation.
    assert!(world.destroy(&ships[0]));
    assert_eq!(query.get(&mut world).len(), 21);
    world.cleanup();
    let result = query.get(&mut world);
    assert_eq!(result.len(), 20);
    assert!(!result.contains(&ships[0]));
    assert!(result.contains(&extra));

    // Tagging takes an entity out of the `None` step.
    world.add_tag(&extra, "docked").unwrap();
    assert_eq!(query.get(&mut world).len(), 19);
    assert!(world.cache().stats().refreshes > 0);
}

#[test]
fn test_destroy_nullifies_inbound_references() {
    let mut world = space_world();
    let target = world.create("Rock", vec![], &[]).unwrap();
    let holder = world
        .create(
            "Ship",
            vec![("Link", Value::object([("to", Value::Entity(target.clone()))]))],
            &[],
        )
        .unwrap();
    let link = world.component(&holder, "Link").unwrap().get("to").unwrap().clone();
    assert_eq!(world.resolve_ref(&link).map(Entity::id), Some(&target));
    assert_eq!(world.referrers_of(&target), vec![holder.clone()]);

    world.destroy(&target);
    // The target is still stored, but no longer resolvable.
    assert!(world.contains(&target));
    assert!(world.resolve_ref(&link).is_none());

    world.cleanup();
    assert!(!world.contains(&target));
    assert_eq!(
        world.component(&holder, "Link").unwrap().get("to"),
        Some(&Value::Null),
        "The reference must be cleared at reconciliation"
    );
    assert!(world.referrers_of(&target).is_empty());
}

#[test]
fn test_cleanup_marks_reference_clears_as_changes() {
    let mut world = space_world();
    let target = world.create("Rock", vec![], &[]).unwrap();
    let holder = world
        .create("Ship", vec![("Link", Value::Entity(target.clone()))], &[])
        .unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    world
        .mutation_log_mut()
        .on_change(move |m| sink.lock().unwrap().push((m.entity.clone(), m.kind.clone())));

    world.destroy(&target);
    world.cleanup();
    let seen = seen.lock().unwrap();
    assert!(seen.contains(&(holder, MutationKind::ComponentChanged("Link".into()))));
    assert!(seen.contains(&(target, MutationKind::Destroyed)));
}

#[test]
fn test_tick_reentrancy_is_skipped() {
    let mut world = World::new();
    assert_eq!(world.begin_tick(0.016, 1.0), TickStatus::Started);
    assert_eq!(world.begin_tick(0.016, 2.0), TickStatus::Skipped);
    assert_eq!(world.time(), 1.0, "A skipped tick must not advance the clock");
    world.end_tick();

    let status = world.tick(0.016, 3.0, |w| {
        assert!(w.is_ticking());
        assert_eq!(w.tick(0.016, 4.0, |_| {}), TickStatus::Skipped);
    });
    assert_eq!(status, TickStatus::Started);
    assert_eq!(world.tick_count(), 2);
    assert!(!world.is_ticking());
}

#[test]
fn test_tick_boundary_destroys_and_clears_markers() {
    let mut world = space_world();
    let rock = world.create("Rock", vec![], &[]).unwrap();
    assert_eq!(world.created_this_tick().count(), 1);

    world.tick(0.1, 0.1, |w| {
        w.destroy(&rock);
        assert!(w.is_pending_destroy(&rock));
    });
    assert!(!world.contains(&rock));
    assert_eq!(world.created_this_tick().count(), 0);
}

#[test]
fn test_unused_tag_is_released_and_bit_reused() {
    let mut world = World::new();
    let e = world.create_anonymous(&["Marker"], vec![], &["temp"]).unwrap();
    let temp_bit = world.registry().tags.get_id("temp").unwrap();
    assert_eq!(world.query(&Query::new().all_tags(["temp"])).len(), 1);

    world.remove_tag(&e, "temp").unwrap();
    world.cleanup();
    assert_eq!(world.registry().tags.get_id("temp"), None);
    assert!(world.query(&Query::new().all_tags(["temp"])).is_empty());

    // The freed bit goes to the next new tag, and old cached results don't leak.
    world.add_tag(&e, "other").unwrap();
    assert_eq!(world.registry().tags.get_id("other"), Some(temp_bit));
    assert!(world.query(&Query::new().all_tags(["temp"])).is_empty());
    assert_eq!(world.query(&Query::new().all_tags(["other"])), vec![e]);
}

#[test]
fn test_registered_tags_are_pinned() {
    let mut world = World::new();
    world.register(&[], &[], &["player"]);
    let e = world.create_anonymous(&["Marker"], vec![], &["player"]).unwrap();
    world.destroy(&e);
    world.cleanup();
    assert!(world.registry().tags.get_id("player").is_some());
}

#[test]
fn test_double_add_and_absent_remove_are_noops() {
    let mut world = space_world();
    let ship = world
        .create("Ship", vec![("Velocity", Value::Int(3))], &[])
        .unwrap();

    assert!(!world.add_component(&ship, "Velocity", Value::Int(9)).unwrap());
    assert_eq!(world.component(&ship, "Velocity"), Some(&Value::Int(3)));
    assert!(!world.remove_component(&ship, "Shield").unwrap());
    assert!(!world.remove_tag(&ship, "ghost").unwrap());

    let ghost = EntityId::new("ghost");
    assert!(matches!(
        world.add_tag(&ghost, "x"),
        Err(WorldError::EntityNotFound(_))
    ));
}

#[test]
fn test_create_with_unknown_type_fails() {
    let mut world = World::new();
    let err = world.create("Dragon", vec![], &[]).unwrap_err();
    assert_eq!(err, WorldError::UnknownEntityType("Dragon".into()));
    assert!(world.is_empty());
}

#[test]
fn test_create_with_duplicate_id_fails() {
    let mut world = space_world();
    let id = EntityId::new("fixed");
    world
        .create_with_id(id.clone(), "Rock", Default::default(), &[])
        .unwrap();
    assert_eq!(
        world.create_with_id(id.clone(), "Rock", Default::default(), &[]),
        Err(WorldError::DuplicateEntityId(id))
    );
}

#[test]
fn test_defaults_are_merged_under_supplied_data() {
    let mut world = space_world();
    let rock = world
        .create("Rock", vec![("Position", Value::object([("x", Value::Int(5))]))], &[])
        .unwrap();
    let position = world.component(&rock, "Position").unwrap();
    assert_eq!(position.get("x"), Some(&Value::Int(5)));
    assert_eq!(position.get("y"), Some(&Value::Int(0)));
}

#[test]
fn test_unknown_operands_match_nothing() {
    let mut world = space_world();
    spawn(&mut world, "Rock", 3, &[]);

    assert!(world.query(&Query::new().all_components(["Nope"])).is_empty());
    assert!(world.query(&Query::new().any_tags(["nope"])).is_empty());
    assert_eq!(world.query(&Query::new().none_tags(["nope"])).len(), 3);
    assert!(world.cache().is_empty(), "Unresolved steps are never cached");
}

#[test]
fn test_some_step_narrows_running_set() {
    let mut world = space_world();
    let fast = spawn(&mut world, "Ship", 2, &["fast"]);
    spawn(&mut world, "Ship", 3, &[]);
    spawn(&mut world, "Rock", 4, &["fast"]);

    let query = Query::new().all_types(["Ship"]).some_tags(["fast"]);
    let mut result = world.query(&query);
    result.sort();
    let mut expected = fast.clone();
    expected.sort();
    assert_eq!(result, expected);

    // On its own, a `Some` step behaves like `Any`.
    assert_eq!(world.query(&Query::new().some_tags(["fast"])).len(), 6);
}

#[test]
fn test_id_steps() {
    let mut world = space_world();
    let rocks = spawn(&mut world, "Rock", 3, &[]);

    let picked = world.query(&Query::new().ids([rocks[1].as_str(), "missing"]));
    assert_eq!(picked, vec![rocks[1].clone()]);

    let rest = world.query(&Query::new().all_types(["Rock"]).exclude_ids([rocks[0].as_str()]));
    assert_eq!(rest.len(), 2);
    assert!(!rest.contains(&rocks[0]));
}

#[test]
fn test_equivalent_queries_share_cache_entries() {
    let mut world = space_world();
    spawn(&mut world, "Ship", 2, &["a", "b"]);
    let q1 = Query::new().all_tags(["a", "b"]).all_components(["Velocity"]);
    let q2 = Query::new().all_components(["Velocity"]).all_tags(["b", "a"]);
    assert_eq!(q1.key(), q2.key());

    world.query(&q1);
    let misses = world.cache().stats().misses;
    world.query(&q2);
    assert_eq!(world.cache().stats().misses, misses);
}

#[test]
fn test_uncached_world_agrees_with_cached_world() {
    let mut cached = space_world();
    let mut fresh = World::with_config(WorldConfig {
        cache_queries: false,
        ..WorldConfig::default()
    })
    .unwrap();
    fresh.register(
        &[EntityType::new("Ship", ["Position", "Velocity"])],
        &[],
        &[],
    );

    let queries = [
        Query::new().all_tags(["red"]),
        Query::new().any_tags(["red", "blue"]).none_components(["Shield"]),
        Query::new().all_components(["Position"]).none_tags(["blue"]),
    ];
    for world in [&mut cached, &mut fresh] {
        for i in 0..30 {
            let tags: &[&str] = match i % 3 {
                0 => &["red"],
                1 => &["red", "blue"],
                _ => &[],
            };
            let id = world
                .create_with_id(EntityId::new(format!("e{i:02}")), "Ship", Default::default(), tags)
                .unwrap();
            if i % 4 == 0 {
                world.add_component(&id, "Shield", Value::Null).unwrap();
            }
        }
        for query in &queries {
            world.query(query);
        }
        // Mutate after the first reads so the cached world reconciles incrementally.
        for i in (0..30).step_by(5) {
            let id = EntityId::new(format!("e{i:02}"));
            world.add_tag(&id, "blue").unwrap();
            world.remove_tag(&id, "red").unwrap();
        }
        world.destroy(&EntityId::new("e01"));
        world.cleanup();
    }

    for query in &queries {
        assert_eq!(cached.query(query), fresh.query(query), "{}", query.key());
    }
    assert!(fresh.cache().is_empty());
}

#[test]
fn test_query_iter_yields_records() {
    let mut world = space_world();
    spawn(&mut world, "Rock", 2, &[]);
    let types: Vec<&str> = world
        .query_iter(&Query::new().all_types(["Rock"]))
        .map(Entity::type_name)
        .collect();
    assert_eq!(types, vec!["Rock", "Rock"]);
}

#[test]
fn test_changed_this_tick_tracks_updates() {
    let mut world = space_world();
    let ship = world.create("Ship", vec![], &[]).unwrap();
    world.cleanup();

    assert!(world
        .update_component(&ship, "Position", |p| {
            p.set("x", Value::Int(4));
        })
        .unwrap());
    assert_eq!(world.changed_this_tick("Position").collect::<Vec<_>>(), vec![&ship]);
    assert_eq!(world.changed_this_tick("Velocity").count(), 0);
    assert!(!world.update_component(&ship, "Shield", |_| {}).unwrap());
}

#[test]
fn test_restore_stores_components_verbatim() {
    let mut world = space_world();
    let mut components = std::collections::BTreeMap::new();
    components.insert("Position".to_string(), Value::Null);
    components.insert("Cargo".to_string(), Value::Int(3));
    let id = world
        .restore(EntityId::new("saved"), "Ship", components, &["loaded"])
        .unwrap();

    // No defaults merged, and the undeclared-here Velocity is not added.
    assert_eq!(world.component(&id, "Position"), Some(&Value::Null));
    assert!(!world.has_component(&id, "Velocity"));
    assert_eq!(world.query(&Query::new().all_components(["Cargo"])), vec![id.clone()]);
    assert_eq!(world.query(&Query::new().all_tags(["loaded"])), vec![id]);
}

#[test]
fn test_delimiters_in_operand_names_do_not_alias() {
    // --- 1. SETUP ---
    let mut world = World::new();
    let pair = world.create_anonymous(&["Marker"], vec![], &["a", "b"]).unwrap();
    let joined = world.create_anonymous(&["Marker"], vec![], &["a,b"]).unwrap();

    let split = Query::new().all_tags(["a", "b"]);
    let single = Query::new().all_tags(["a,b"]);
    assert_ne!(split.key(), single.key());

    // --- 2. ASSERTIONS ---
    assert_eq!(world.query(&single), vec![joined.clone()]);
    assert_eq!(world.query(&split), vec![pair.clone()]);
    assert_eq!(world.cache().len(), 2);

    // Both steps run together instead of collapsing into one.
    let both = Query::new().all_tags(["a", "b"]).all_tags(["a,b"]);
    assert!(world.query(&both).is_empty());
    assert_eq!(world.query(&Query::new().any_tags(["a;b", "a:b"])).len(), 0);
}

#[test]
fn test_id_queries_do_not_accumulate_plans() {
    let mut world = space_world();
    let rocks = spawn(&mut world, "Rock", 50, &[]);
    for _ in 0..4 {
        world.tick(0.1, 0.1, |w| {
            for id in &rocks {
                assert_eq!(w.query(&Query::new().ids([id.as_str()])), vec![id.clone()]);
            }
        });
    }
    assert_eq!(world.planner.len(), 0);

    world.query(&Query::new().all_types(["Rock"]));
    assert_eq!(world.planner.len(), 1);
}

#[test]
fn test_unused_component_and_type_bits_are_released_and_reused() {
    // --- 1. SETUP ---
    let mut world = World::new();
    let cargo = world.create_anonymous(&["Cargo"], vec![], &[]).unwrap();
    let component_bit = world.registry().components.get_id("Cargo").unwrap();
    let type_bit = world.registry().entity_types.get_id("Cargo").unwrap();
    assert_eq!(
        world.query(&Query::new().all_components(["Cargo"])),
        vec![cargo.clone()]
    );
    assert_eq!(world.cache().len(), 1);

    // --- 2. ACTION ---
    world.destroy(&cargo);
    world.cleanup();

    // --- 3. ASSERTIONS ---
    assert_eq!(world.registry().components.get_id("Cargo"), None);
    assert_eq!(world.registry().entity_types.get_id("Cargo"), None);
    assert!(
        world.registry().entity_type("Cargo").is_some(),
        "The descriptor outlives its bit"
    );
    assert!(world.cache().is_empty());

    // The freed bits go to the next new keys, and old cached results don't leak.
    let fuel = world.create_anonymous(&["Fuel"], vec![], &[]).unwrap();
    assert_eq!(world.registry().components.get_id("Fuel"), Some(component_bit));
    assert_eq!(world.registry().entity_types.get_id("Fuel"), Some(type_bit));
    assert!(world.query(&Query::new().all_components(["Cargo"])).is_empty());
    assert_eq!(world.query(&Query::new().all_components(["Fuel"])), vec![fuel.clone()]);

    // A released type is keyed again when it is used again.
    let again = world.create_anonymous(&["Cargo"], vec![], &[]).unwrap();
    assert_eq!(world.query(&Query::new().all_types(["Cargo"])), vec![again]);
    assert_eq!(world.query(&Query::new().all_types(["Fuel"])), vec![fuel]);
}

#[test]
fn test_removed_component_bit_is_released() {
    let mut world = space_world();
    let ship = world.create("Ship", vec![], &[]).unwrap();
    world.add_component(&ship, "Shield", Value::Int(1)).unwrap();
    assert!(world.registry().components.get_id("Shield").is_some());

    world.remove_component(&ship, "Shield").unwrap();
    world.cleanup();
    assert_eq!(world.registry().components.get_id("Shield"), None);
    assert!(world.registry().components.get_id("Position").is_some());

    let fresh = World::with_config(WorldConfig {
        release_unused_keys: false,
        ..WorldConfig::default()
    });
    let mut world = fresh.unwrap();
    let e = world.create_anonymous(&["Shield"], vec![], &[]).unwrap();
    world.destroy(&e);
    world.cleanup();
    assert!(world.registry().components.get_id("Shield").is_some());
}

#[test]
fn test_cleared_references_are_changes_of_the_next_tick() {
    let mut world = space_world();
    let target = world.create("Rock", vec![], &[]).unwrap();
    let holder = world
        .create("Ship", vec![("Link", Value::Entity(target.clone()))], &[])
        .unwrap();
    world.cleanup();

    world.destroy(&target);
    world.cleanup();
    assert_eq!(world.changed_this_tick("Link").collect::<Vec<_>>(), vec![&holder]);

    world.cleanup();
    assert_eq!(world.changed_this_tick("Link").count(), 0);
}
