//! Entity hierarchies — a tiny solar system.
//!
//! Builds a sun/planet/moon tree, reparents a moon, bounces off the cycle
//! check, then destroys a planet and lets the cascade take its subtree.
//!
//! Run with: `cargo run -p fafnir --example hierarchy`

use fafnir::prelude::*;

struct Name(&'static str);

fn main() {
    env_logger::init();

    let mut registry = Registry::new();
    let hierarchy = HierarchySystem::new(&mut registry);

    let _changes = hierarchy
        .on_changed()
        .connect(|_: &mut Registry, event: &ParentChanged| {
            println!("  (moved {:?} under {:?})", event.child, event.parent);
        });

    let sun = named(&mut registry, "sun");
    let earth = named(&mut registry, "earth");
    let mars = named(&mut registry, "mars");
    let moon = named(&mut registry, "moon");
    let phobos = named(&mut registry, "phobos");

    hierarchy.append_child(&mut registry, sun, earth).unwrap();
    hierarchy.append_child(&mut registry, sun, mars).unwrap();
    hierarchy.append_child(&mut registry, earth, moon).unwrap();
    hierarchy.append_child(&mut registry, mars, phobos).unwrap();

    println!("initial tree:");
    print_tree(&registry, &hierarchy);

    println!("the moon defects to mars:");
    hierarchy.append_child(&mut registry, mars, moon).unwrap();
    print_tree(&registry, &hierarchy);

    // Appending an ancestor under its descendant would close a loop.
    if let Err(error) = hierarchy.append_child(&mut registry, moon, sun) {
        println!("refused: {error}");
    }

    println!("mars is destroyed; both moons go with it:");
    registry.destroy_entity(mars);
    print_tree(&registry, &hierarchy);

    println!("{} entities left", registry.alive_count());
}

fn named(registry: &mut Registry, name: &'static str) -> Entity {
    let entity = registry.create_entity();
    registry.emplace_component(entity, Name(name));
    entity
}

fn print_tree(registry: &Registry, hierarchy: &HierarchySystem) {
    for root in hierarchy.roots(registry) {
        print_node(registry, hierarchy, root, 1);
    }
}

fn print_node(registry: &Registry, hierarchy: &HierarchySystem, entity: Entity, depth: usize) {
    let name = registry.get_component::<Name>(entity);
    println!("{:indent$}{} ({entity})", "", name.0, indent = depth * 2);
    for child in hierarchy.children(registry, entity) {
        print_node(registry, hierarchy, child, depth + 1);
    }
}
