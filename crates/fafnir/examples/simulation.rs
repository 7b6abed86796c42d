//! Simulation loop — velocity integration over an intersection view.
//!
//! A headless frame: integrate positions for entities with a velocity,
//! tick down lifetimes, destroy the expired, and watch their slots come
//! back recycled with bumped versions.
//!
//! Run with: `cargo run -p fafnir --example simulation`

use fafnir::prelude::*;

// ── Components ───────────────────────────────────────────────────────────

#[derive(Debug)]
struct Position {
    x: f32,
    y: f32,
}

struct Velocity {
    dx: f32,
    dy: f32,
}

struct Lifetime(u32);

fn main() {
    env_logger::init();

    let mut registry = Registry::new();

    for i in 0..5u32 {
        let entity = registry.create_entity();
        registry.emplace_component(
            entity,
            Position {
                x: 0.0,
                y: i as f32 * 10.0,
            },
        );
        registry.emplace_component(
            entity,
            Velocity {
                dx: 1.0 + i as f32,
                dy: 0.0,
            },
        );
        // Every other entity expires after two steps.
        if i % 2 == 0 {
            registry.emplace_component(entity, Lifetime(2));
        }
    }

    for step in 0..4 {
        registry
            .view::<(&mut Position, &Velocity)>()
            .each(|_, (position, velocity)| {
                position.x += velocity.dx;
                position.y += velocity.dy;
            });

        // Structural changes wait until the scan is over: collect the
        // expired first, then destroy them.
        let mut expired = Vec::new();
        registry.view::<(&mut Lifetime,)>().each(|entity, (lifetime,)| {
            if lifetime.0 == 0 {
                expired.push(entity);
            } else {
                lifetime.0 -= 1;
            }
        });
        for entity in expired {
            registry.destroy_entity(entity);
        }

        println!("after step {step}: {} alive", registry.alive_count());
    }

    // The freed slots are reused, but with fresh versions; any handle
    // from before the destroy stays invalid.
    let recycled = registry.create_entity();
    println!("recycled handle: {recycled:?}");

    println!("survivors:");
    registry.each_entity(|entity| {
        match registry.try_get_component::<Position>(entity) {
            Some(position) => println!("  {entity}: {position:?}"),
            None => println!("  {entity}: (bare)"),
        }
    });
}
