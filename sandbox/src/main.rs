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

// Main binary for trying the store by hand.
//
// Usage: sandbox [SNAPSHOT_PATH] [CONFIG_RON]

use std::env;
use std::fs;

use anyhow::{Context, Result};
use tessera_data::ecs::{ComponentType, EntityType, Query, Value, World};
use tessera_data::WorldConfig;
use tessera_io::{load, save, Snapshot};

fn build_world(config: WorldConfig) -> Result<World> {
    let mut world = World::with_config(config)?;
    world.register(
        &[
            EntityType::new("Ship", ["Position", "Velocity", "Target"]),
            EntityType::new("Station", ["Position"]),
        ],
        &[
            ComponentType::new("Position")
                .with_defaults(Value::object([("x", Value::Int(0)), ("y", Value::Int(0))])),
            ComponentType::new("Velocity")
                .with_defaults(Value::object([("dx", Value::Int(1)), ("dy", Value::Int(0))])),
            ComponentType::new("Target"),
        ],
        &["hostile", "docked"],
    );

    let station = world.create("Station", vec![], &[])?;
    for i in 0..8i64 {
        let tags: &[&str] = if i % 2 == 0 { &["hostile"] } else { &[] };
        world.create(
            "Ship",
            vec![
                ("Position", Value::object([("x", Value::Int(i * 10))])),
                ("Target", Value::Entity(station.clone())),
            ],
            tags,
        )?;
    }
    Ok(world)
}

/// Moves every ship by its velocity and docks the ones that reach the station.
fn step(world: &mut World) -> Result<()> {
    let moving = world.query(&Query::new().all_components(["Position", "Velocity"]).none_tags(["docked"]));
    for id in moving {
        let dx = world
            .component(&id, "Velocity")
            .and_then(|v| v.get("dx"))
            .and_then(Value::as_i64)
            .unwrap_or(0);
        let mut arrived = false;
        world.update_component(&id, "Position", |position| {
            let x = position.get("x").and_then(Value::as_i64).unwrap_or(0) - dx;
            position.set("x", Value::Int(x));
            arrived = x <= 0;
        })?;
        if arrived {
            world.add_tag(&id, "docked")?;
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    use env_logger::{Builder, Env};

    Builder::from_env(Env::default().default_filter_or("info")).init();

    let mut args = env::args().skip(1);
    let snapshot_path = args.next();
    let config = match args.next() {
        Some(path) => {
            let text = fs::read_to_string(&path).with_context(|| format!("reading {path}"))?;
            WorldConfig::from_ron_str(&text)?
        }
        None => WorldConfig::default(),
    };

    let mut world = build_world(config)?;
    for frame in 1..=12u32 {
        let mut result = Ok(());
        world.tick(1.0 / 60.0, f64::from(frame) / 60.0, |w| result = step(w));
        result?;
    }

    let hostile = Query::new().all_tags(["hostile"]).none_tags(["docked"]);
    log::info!(
        "After {} ticks: {} entities, {} docked, {} hostile still flying",
        world.tick_count(),
        world.len(),
        world.query(&Query::new().all_tags(["docked"])).len(),
        world.query(&hostile).len()
    );
    log::info!("Query cache: {:?}", world.cache().stats());

    let snapshot = save(&world);
    let snapshot = match snapshot_path {
        Some(path) => {
            snapshot.write_to(&path)?;
            log::info!("Snapshot written to {path}");
            Snapshot::read_from(&path)?
        }
        None => snapshot,
    };

    let mut restored = World::new();
    let report = load(&mut restored, &snapshot);
    log::info!(
        "Reloaded {} entities ({} references relinked, {} warnings)",
        report.loaded,
        report.relinked,
        report.warnings.len()
    );
    anyhow::ensure!(
        save(&restored) == snapshot,
        "reloaded world does not match the snapshot it came from"
    );
    Ok(())
}
