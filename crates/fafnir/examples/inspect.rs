//! Introspection — serializing components without knowing their types.
//!
//! `visit` hands every attached component over as a `(sequence, &dyn Any)`
//! pair; a registration table keyed by [`type_sequence`] maps each pair
//! back to a typed encoder. This is how a save system serializes entities
//! it has no static component list for.
//!
//! Run with: `cargo run -p fafnir --example inspect`

use std::any::Any;
use std::collections::HashMap;

use fafnir::pool::type_sequence;
use fafnir::prelude::*;
use serde::Serialize;

// ── Components ───────────────────────────────────────────────────────────

#[derive(Serialize)]
struct Position {
    x: f32,
    y: f32,
}

#[derive(Serialize)]
struct Health(u32);

#[derive(Serialize)]
struct Name(String);

// ── Encoder table ────────────────────────────────────────────────────────

type Encode = fn(&dyn Any) -> serde_json::Value;

fn encoder<T: Serialize + 'static>(name: &'static str) -> (usize, (&'static str, Encode)) {
    (type_sequence::<T>(), (name, |component| {
        let component = component
            .downcast_ref::<T>()
            .expect("encoder registered under the wrong sequence");
        serde_json::to_value(component).expect("component serializes")
    }))
}

fn main() {
    env_logger::init();

    let encoders: HashMap<usize, (&str, Encode)> = [
        encoder::<Position>("position"),
        encoder::<Health>("health"),
        encoder::<Name>("name"),
    ]
    .into_iter()
    .collect();

    let mut registry = Registry::new();

    let knight = registry.create_entity();
    registry.emplace_component(knight, Name("knight".to_string()));
    registry.emplace_component(knight, Position { x: 4.0, y: -2.0 });
    registry.emplace_component(knight, Health(80));

    let rock = registry.create_entity();
    registry.emplace_component(rock, Position { x: 0.0, y: 0.0 });

    // Oldest first for stable output.
    let mut entities = Vec::new();
    registry.each_entity(|entity| entities.push(entity));
    for entity in entities.into_iter().rev() {
        let mut components = serde_json::Map::new();
        registry.visit(entity, |sequence, component| {
            // Unregistered components are skipped, not an error.
            if let Some((name, encode)) = encoders.get(&sequence) {
                components.insert((*name).to_string(), encode(component));
            }
        });
        let record = serde_json::json!({
            "entity": entity,
            "components": components,
        });
        println!("{record}");
    }
}
