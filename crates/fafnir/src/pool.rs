//! # Pool — Sparse/Dense Component Storage
//!
//! One [`Pool<T>`] exists per component type, created lazily by the registry
//! on first use. A pool is a sparse set: a growable sparse array maps an
//! entity's index to a slot in two parallel dense arrays, one holding the
//! owning entities and one holding the component values.
//!
//! ```text
//!                 sparse (by entity index)        dense
//!   entity 0 ──▶ [ 2 ]                    ┌─▶ 0: (entity 4, T)
//!   entity 1     [ ABSENT ]               │   1: (entity 7, T)
//!   entity 2     [ ABSENT ]               │   2: (entity 0, T) ◀─┐
//!   entity 3     [ ABSENT ]               │                      │
//!   entity 4 ──▶ [ 0 ] ────────────────────┘                      │
//!   ...                                                          │
//!   entity 7 ──▶ [ 1 ] ──────────────────────────────────────────┘
//! ```
//!
//! Membership checks compare the stored entity against the queried handle in
//! full, so a stale handle whose slot was recycled never matches even though
//! it carries the right index.
//!
//! ## Removal
//!
//! Removal swaps the last dense element into the vacated slot and rewrites
//! the moved entity's sparse entry. O(1), but dense order is not preserved —
//! iteration order over a pool is unspecified and changes across removals.
//!
//! ## Type erasure
//!
//! The registry stores pools as `Box<dyn ErasedPool>` in a vector indexed by
//! [`type_sequence`], a process-wide counter handing out a small dense index
//! per component type. Unlike a `TypeId`-keyed hash map, the sequence index
//! doubles as the stable tag that `visit` exposes to serialization code.
//!
//! ## Comparison
//!
//! - **EnTT (C++)**: the same sparse-set design, down to the swap-and-pop
//!   removal and per-pool construction/destruction signals.
//! - **hecs / bevy_ecs**: archetype tables instead of per-type sparse sets;
//!   faster multi-component iteration, costlier add/remove migrations.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Mutex, OnceLock, PoisonError};

use crate::entity::Entity;
use crate::registry::Registry;
use crate::signal::Signal;

/// Sparse entry for an entity index with no component in this pool.
const ABSENT: usize = usize::MAX;

static SEQUENCES: OnceLock<Mutex<HashMap<TypeId, usize>>> = OnceLock::new();

/// The process-wide sequence index for component type `T`.
///
/// Indices are handed out in first-use order, starting at zero, and stay
/// fixed for the lifetime of the process. [`Registry::visit`] reports
/// components under this index, and serialization code keys its dispatch
/// tables by it.
pub fn type_sequence<T: 'static>() -> usize {
    let sequences = SEQUENCES.get_or_init(|| Mutex::new(HashMap::new()));
    let mut sequences = sequences.lock().unwrap_or_else(PoisonError::into_inner);
    let next = sequences.len();
    *sequences.entry(TypeId::of::<T>()).or_insert(next)
}

/// Typed sparse-set storage for one component type.
///
/// Pools only store; every operation with observable side effects (signals,
/// replace semantics, validity checks) is driven by the [`Registry`], which
/// needs to pass itself to subscribers. Views borrow pools out of the
/// registry while they run, which is why the read accessors are public
/// while structural mutation is not.
pub struct Pool<T: 'static> {
    sparse: Vec<usize>,
    entities: Vec<Entity>,
    components: Vec<T>,
    /// Fired by the registry after a component is inserted.
    pub(crate) constructed: Signal<Registry, Entity>,
    /// Fired by the registry before a component is removed.
    pub(crate) destroyed: Signal<Registry, Entity>,
}

impl<T: 'static> Pool<T> {
    pub(crate) fn new() -> Self {
        Pool {
            sparse: Vec::new(),
            entities: Vec::new(),
            components: Vec::new(),
            constructed: Signal::new(),
            destroyed: Signal::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// The entities currently stored, in dense order.
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn contains(&self, entity: Entity) -> bool {
        self.dense_index(entity).is_some()
    }

    pub fn get(&self, entity: Entity) -> Option<&T> {
        self.dense_index(entity).map(|slot| &self.components[slot])
    }

    pub fn get_mut(&mut self, entity: Entity) -> Option<&mut T> {
        self.dense_index(entity)
            .map(|slot| &mut self.components[slot])
    }

    /// Store `value` for `entity`. The entity must not already be present;
    /// replace-on-existing is handled a level up where the signals live.
    pub(crate) fn insert(&mut self, entity: Entity, value: T) {
        debug_assert!(
            !self.contains(entity),
            "Pool for `{}` already contains {:?}",
            std::any::type_name::<T>(),
            entity
        );
        let index = entity.index() as usize;
        if index >= self.sparse.len() {
            self.sparse.resize(index + 1, ABSENT);
        }
        self.sparse[index] = self.entities.len();
        self.entities.push(entity);
        self.components.push(value);
    }

    /// Remove and return `entity`'s component, swapping the last dense
    /// element into the vacated slot.
    pub(crate) fn remove(&mut self, entity: Entity) -> Option<T> {
        let slot = self.dense_index(entity)?;
        self.entities.swap_remove(slot);
        let value = self.components.swap_remove(slot);
        self.sparse[entity.index() as usize] = ABSENT;
        if slot < self.entities.len() {
            let moved = self.entities[slot];
            self.sparse[moved.index() as usize] = slot;
        }
        Some(value)
    }

    fn dense_index(&self, entity: Entity) -> Option<usize> {
        let slot = *self.sparse.get(entity.index() as usize)?;
        if slot == ABSENT {
            return None;
        }
        (self.entities[slot] == entity).then_some(slot)
    }
}

/// Type-erased face of a [`Pool<T>`], stored by the registry in its
/// sequence-indexed pool vector.
pub(crate) trait ErasedPool {
    fn contains(&self, entity: Entity) -> bool;
    /// Remove without firing anything; the caller has already dispatched the
    /// destruction signal.
    fn remove_now(&mut self, entity: Entity);
    fn try_get_opaque(&self, entity: Entity) -> Option<&dyn Any>;
    fn destroyed_signal(&self) -> Signal<Registry, Entity>;
    fn type_name(&self) -> &'static str;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

impl<T: 'static> ErasedPool for Pool<T> {
    fn contains(&self, entity: Entity) -> bool {
        Pool::contains(self, entity)
    }

    fn remove_now(&mut self, entity: Entity) {
        self.remove(entity);
    }

    fn try_get_opaque(&self, entity: Entity) -> Option<&dyn Any> {
        self.get(entity).map(|component| component as &dyn Any)
    }

    fn destroyed_signal(&self) -> Signal<Registry, Entity> {
        self.destroyed.clone()
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}
