//! Signals — keeping an inspector cache in sync with the registry.
//!
//! An editor-style consumer subscribes to construction and destruction of
//! `Label` components and mirrors them into its own map, without polling.
//! Blocking mutes the subscription for a bulk load; dropping the
//! connection ends it for good.
//!
//! Run with: `cargo run -p fafnir --example signals`

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use fafnir::prelude::*;

struct Label(&'static str);

fn main() {
    env_logger::init();

    let mut registry = Registry::new();
    let cache: Rc<RefCell<BTreeMap<u64, &'static str>>> = Rc::default();

    let sync = Rc::clone(&cache);
    let on_add = registry
        .on_construct::<Label>()
        .connect(move |registry: &mut Registry, &entity| {
            let label = registry.get_component::<Label>(entity);
            sync.borrow_mut().insert(entity.to_raw(), label.0);
        });

    let sync = Rc::clone(&cache);
    let on_remove = registry
        .on_destroy::<Label>()
        .connect(move |_: &mut Registry, &entity| {
            sync.borrow_mut().remove(&entity.to_raw());
        });

    let player = registry.create_entity();
    registry.emplace_component(player, Label("player"));
    let boss = registry.create_entity();
    registry.emplace_component(boss, Label("boss"));
    println!("cache after two spawns: {:?}", cache.borrow());

    registry.destroy_entity(boss);
    println!("cache after the boss dies: {:?}", cache.borrow());

    // A bulk load the inspector doesn't care about: mute, load, rebuild.
    on_add.block();
    for _ in 0..3 {
        let entity = registry.create_entity();
        registry.emplace_component(entity, Label("scenery"));
    }
    on_add.unblock();
    println!("cache after a muted bulk load: {:?}", cache.borrow());

    // Dropping the connections disconnects them; later edits go unseen.
    drop(on_add);
    drop(on_remove);
    registry.destroy_entity(player);
    println!("cache after disconnecting: {:?}", cache.borrow());
}
