//! # Registry — Entities, Pools, and Lifecycle
//!
//! The [`Registry`] is the central container: it owns the entity table and
//! one lazily-created [`Pool`] per component type, and it drives every
//! operation with observable side effects so that signal subscribers always
//! receive a usable `&mut Registry`.
//!
//! ## The entity table
//!
//! ```text
//!  index   slot value        meaning
//!    0     Entity(0v1)       live (slot holds exactly itself)
//!    1     Entity(3vT)    ─┐ free, next free slot is 3
//!    2     Entity(2v0)     │ live
//!    3     Entity(~0vT)   ◀┘ free, end of list (null index)
//!    4     Entity(4v2)       live
//!
//!  free_head ──▶ 1           (tombstone-versioned cursor)
//! ```
//!
//! A slot is live iff it stores an entity whose index equals the slot's own
//! position; that same comparison is the whole validity check. Destroying an
//! entity overwrites its slot with the next free index and a bumped version,
//! so the free list costs no extra memory and every recycled identifier is
//! born with a version no stale handle carries.
//!
//! ## Signal ordering
//!
//! Construction signals fire after the component is inserted, destruction
//! signals before it is removed, so subscribers can always read the
//! component they are being told about. The signal handle is cloned out of
//! the pool before dispatch, which is what lets callbacks receive
//! `&mut Registry` and mutate freely mid-operation.
//!
//! ## Comparison
//!
//! - **EnTT (C++)**: `entt::registry` — same table encoding, same
//!   `on_construct`/`on_destroy` surface.
//! - **hecs**: `World` with archetypes; no built-in signals.
//! - **bevy_ecs**: `World` plus component hooks/observers layered through a
//!   scheduler.

use std::any::Any;

use log::{debug, trace};

use crate::entity::Entity;
use crate::pool::{ErasedPool, Pool, type_sequence};
use crate::signal::Sink;
use crate::view::{View, ViewParam};

/// Owns all entities and component pools.
///
/// Identifier lifecycle, component CRUD, intersection views, and the
/// type-erased [`visit`](Registry::visit) traversal all go through here.
pub struct Registry {
    /// Entity table; doubles as the free-list backing store.
    entities: Vec<Entity>,
    /// Next free table slot, tombstone-versioned. Null index when empty.
    free_head: Entity,
    /// Pools indexed by [`type_sequence`].
    pools: Vec<Option<Box<dyn ErasedPool>>>,
    alive: usize,
}

const FREE_LIST_END: Entity = Entity::combine(Entity::NULL, Entity::TOMBSTONE);

impl Registry {
    pub fn new() -> Self {
        Registry {
            entities: Vec::new(),
            free_head: FREE_LIST_END,
            pools: Vec::new(),
            alive: 0,
        }
    }

    // ── Entity lifecycle ─────────────────────────────────────────────

    /// Allocate a new entity, recycling the most recently destroyed slot if
    /// one is free.
    ///
    /// # Panics
    ///
    /// Panics if the index space of the entity layout is exhausted.
    pub fn create_entity(&mut self) -> Entity {
        let entity = if self.free_head.is_null() {
            let index = self.entities.len();
            assert!(
                index < Entity::NULL.index() as usize,
                "Entity table exhausted at {} slots",
                index
            );
            let entity = Entity::construct(index as u32, 0);
            self.entities.push(entity);
            entity
        } else {
            let slot = self.free_head.index() as usize;
            let stored = self.entities[slot];
            self.free_head = Entity::combine(stored, Entity::TOMBSTONE);
            let entity = Entity::construct(slot as u32, stored.version());
            self.entities[slot] = entity;
            entity
        };
        self.alive += 1;
        trace!("created {entity:?}");
        entity
    }

    /// Destroy `entity`: every attached component is erased (firing its
    /// pool's destruction signal first), then the slot is recycled.
    ///
    /// Destruction listeners may mutate the registry, including attaching
    /// further components to `entity` — those are erased in the same call.
    /// If a listener destroys `entity` itself, that inner destruction wins
    /// and the outer call backs off.
    ///
    /// # Panics
    ///
    /// Panics if `entity` is not valid.
    pub fn destroy_entity(&mut self, entity: Entity) {
        self.assert_valid(entity);
        trace!("destroying {entity:?}");
        loop {
            let mut erased_any = false;
            for sequence in 0..self.pools.len() {
                let Some(signal) = self.pools[sequence]
                    .as_ref()
                    .filter(|pool| pool.contains(entity))
                    .map(|pool| pool.destroyed_signal())
                else {
                    continue;
                };
                signal.emit(self, &entity);
                if !self.is_valid(entity) {
                    return;
                }
                if let Some(pool) = self.pools[sequence].as_mut() {
                    pool.remove_now(entity);
                }
                erased_any = true;
            }
            if !erased_any {
                break;
            }
        }
        let slot = entity.index() as usize;
        self.entities[slot] = Entity::construct(self.free_head.index(), entity.bumped_version());
        self.free_head = Entity::combine(entity, Entity::TOMBSTONE);
        self.alive -= 1;
    }

    /// Whether `entity` currently identifies a live slot. Stale handles from
    /// before a destroy/recycle round return `false`.
    #[must_use]
    pub fn is_valid(&self, entity: Entity) -> bool {
        self.entities.get(entity.index() as usize) == Some(&entity)
    }

    /// Number of live entities.
    #[must_use]
    pub fn alive_count(&self) -> usize {
        self.alive
    }

    /// Call `f` for every live entity, most recently allocated table slots
    /// first. The registry cannot be mutated during the walk; collect first
    /// when destruction or insertion is needed.
    pub fn each_entity(&self, mut f: impl FnMut(Entity)) {
        for index in (0..self.entities.len()).rev() {
            let entity = self.entities[index];
            if entity.index() as usize == index {
                f(entity);
            }
        }
    }

    /// Destroy every live entity, firing the usual destruction signals.
    pub fn clear(&mut self) {
        debug!("clearing registry ({} live entities)", self.alive);
        for index in (0..self.entities.len()).rev() {
            let entity = self.entities[index];
            if entity.index() as usize == index {
                self.destroy_entity(entity);
            }
        }
    }

    // ── Component CRUD ───────────────────────────────────────────────

    /// Attach `component` to `entity`, creating the pool on first use.
    ///
    /// Returns the stored component and `true` if the entity did not have a
    /// `T` before the call. If it did, the old value is replaced: the pool's
    /// destruction signal fires for the outgoing component, then the
    /// construction signal for the incoming one, and `false` is returned.
    ///
    /// # Panics
    ///
    /// Panics if `entity` is not valid, or if a listener destroys `entity`
    /// or removes the freshly inserted component mid-call.
    pub fn emplace_component<T: 'static>(
        &mut self,
        entity: Entity,
        component: T,
    ) -> (&mut T, bool) {
        self.assert_valid(entity);
        let replaced = self.ensure_pool::<T>().contains(entity);
        if replaced {
            let destroyed = self.ensure_pool::<T>().destroyed.clone();
            destroyed.emit(self, &entity);
            self.assert_valid(entity);
        }
        let pool = self.ensure_pool::<T>();
        if let Some(slot) = pool.get_mut(entity) {
            *slot = component;
        } else {
            pool.insert(entity, component);
        }
        let constructed = pool.constructed.clone();
        constructed.emit(self, &entity);
        let slot = self
            .ensure_pool::<T>()
            .get_mut(entity)
            .unwrap_or_else(|| {
                panic!(
                    "Construction listener removed `{}` from {:?} during emplace",
                    std::any::type_name::<T>(),
                    entity
                )
            });
        (slot, !replaced)
    }

    /// Get a shared reference to `entity`'s `T`.
    ///
    /// # Panics
    ///
    /// Panics if `entity` is not valid or does not have a `T`.
    pub fn get_component<T: 'static>(&self, entity: Entity) -> &T {
        self.assert_valid(entity);
        self.pool::<T>()
            .and_then(|pool| pool.get(entity))
            .unwrap_or_else(|| missing::<T>(entity))
    }

    /// Get a mutable reference to `entity`'s `T`.
    ///
    /// # Panics
    ///
    /// Panics if `entity` is not valid or does not have a `T`.
    pub fn get_component_mut<T: 'static>(&mut self, entity: Entity) -> &mut T {
        self.assert_valid(entity);
        self.pool_mut::<T>()
            .and_then(|pool| pool.get_mut(entity))
            .unwrap_or_else(|| missing::<T>(entity))
    }

    /// Get a shared reference to `entity`'s `T`, or `None` if the component
    /// is not attached. Absence of data is expected here; absence of
    /// identity is not.
    ///
    /// # Panics
    ///
    /// Panics if `entity` is not valid.
    pub fn try_get_component<T: 'static>(&self, entity: Entity) -> Option<&T> {
        self.assert_valid(entity);
        self.pool::<T>().and_then(|pool| pool.get(entity))
    }

    /// Mutable variant of [`try_get_component`](Registry::try_get_component).
    ///
    /// # Panics
    ///
    /// Panics if `entity` is not valid.
    pub fn try_get_component_mut<T: 'static>(&mut self, entity: Entity) -> Option<&mut T> {
        self.assert_valid(entity);
        self.pool_mut::<T>().and_then(|pool| pool.get_mut(entity))
    }

    /// Whether `entity` has a `T` attached.
    ///
    /// # Panics
    ///
    /// Panics if `entity` is not valid.
    #[must_use]
    pub fn has_component<T: 'static>(&self, entity: Entity) -> bool {
        self.assert_valid(entity);
        self.pool::<T>().is_some_and(|pool| pool.contains(entity))
    }

    /// Remove `entity`'s `T` if attached, firing the destruction signal
    /// first. Returns whether anything was removed. Does not create the
    /// pool.
    ///
    /// # Panics
    ///
    /// Panics if `entity` is not valid.
    pub fn remove_component<T: 'static>(&mut self, entity: Entity) -> bool {
        self.assert_valid(entity);
        let Some(pool) = self.pool::<T>() else {
            return false;
        };
        if !pool.contains(entity) {
            return false;
        }
        let destroyed = pool.destroyed.clone();
        destroyed.emit(self, &entity);
        if let Some(pool) = self.pool_mut::<T>() {
            pool.remove(entity);
        }
        true
    }

    /// Remove several component types at once, e.g.
    /// `registry.remove_components::<(Position, Velocity)>(e)`. Returns one
    /// `bool` per type in the same order, each independent of whether that
    /// type's pool even exists.
    ///
    /// # Panics
    ///
    /// Panics if `entity` is not valid.
    pub fn remove_components<S: RemoveSet>(&mut self, entity: Entity) -> S::Removed {
        self.assert_valid(entity);
        S::remove(self, entity)
    }

    /// Remove every `T` in the registry, firing the destruction signal for
    /// each in unspecified order. Entities keep their other components. Does
    /// not create the pool.
    pub fn clear_components<T: 'static>(&mut self) {
        let Some(pool) = self.pool::<T>() else {
            return;
        };
        let owners: Vec<Entity> = pool.entities().to_vec();
        debug!(
            "clearing {} `{}` components",
            owners.len(),
            std::any::type_name::<T>()
        );
        for entity in owners {
            // A destruction listener may have destroyed the owner already.
            if self.is_valid(entity) {
                self.remove_component::<T>(entity);
            }
        }
    }

    // ── Views and traversal ──────────────────────────────────────────

    /// Build an intersection view over the component types in `Q`, creating
    /// any missing pools. See [`View`].
    pub fn view<Q: ViewParam>(&mut self) -> View<'_, Q> {
        View::new(self)
    }

    /// Call `f` once per component attached to `entity`, as a
    /// [`type_sequence`] index plus an untyped borrow. This is the
    /// type-erasure escape hatch serialization and inspection code builds
    /// on; the borrow is only valid for the duration of the callback.
    ///
    /// # Panics
    ///
    /// Panics if `entity` is not valid.
    pub fn visit(&self, entity: Entity, mut f: impl FnMut(usize, &dyn Any)) {
        self.assert_valid(entity);
        for (sequence, pool) in self.pools.iter().enumerate() {
            if let Some(pool) = pool {
                if let Some(component) = pool.try_get_opaque(entity) {
                    f(sequence, component);
                }
            }
        }
    }

    // ── Signals ──────────────────────────────────────────────────────

    /// Subscribe-side handle for "a `T` was attached". Fires after
    /// insertion, so the component is readable from the callback. Creates
    /// the pool if needed.
    pub fn on_construct<T: 'static>(&mut self) -> Sink<Registry, Entity> {
        self.ensure_pool::<T>().constructed.sink()
    }

    /// Subscribe-side handle for "a `T` is about to be detached". Fires
    /// before removal, so the component is still readable from the
    /// callback. Creates the pool if needed.
    pub fn on_destroy<T: 'static>(&mut self) -> Sink<Registry, Entity> {
        self.ensure_pool::<T>().destroyed.sink()
    }

    // ── Pool plumbing ────────────────────────────────────────────────

    fn assert_valid(&self, entity: Entity) {
        assert!(
            self.is_valid(entity),
            "Entity {:?} is not valid in this registry",
            entity
        );
    }

    fn pool<T: 'static>(&self) -> Option<&Pool<T>> {
        self.pools
            .get(type_sequence::<T>())?
            .as_ref()?
            .as_any()
            .downcast_ref::<Pool<T>>()
    }

    fn pool_mut<T: 'static>(&mut self) -> Option<&mut Pool<T>> {
        self.pools
            .get_mut(type_sequence::<T>())?
            .as_mut()?
            .as_any_mut()
            .downcast_mut::<Pool<T>>()
    }

    pub(crate) fn ensure_pool<T: 'static>(&mut self) -> &mut Pool<T> {
        let sequence = type_sequence::<T>();
        if sequence >= self.pools.len() {
            self.pools.resize_with(sequence + 1, || None);
        }
        let slot = &mut self.pools[sequence];
        if slot.is_none() {
            trace!(
                "creating pool {} for `{}`",
                sequence,
                std::any::type_name::<T>()
            );
            *slot = Some(Box::new(Pool::<T>::new()));
        }
        match slot
            .as_mut()
            .and_then(|pool| pool.as_any_mut().downcast_mut::<Pool<T>>())
        {
            Some(pool) => pool,
            None => panic!(
                "Type sequence {} does not map to `{}`",
                sequence,
                std::any::type_name::<T>()
            ),
        }
    }

    /// Take `T`'s pool out of the registry for the extract/restore iteration
    /// pattern. The caller must put it back with
    /// [`restore_pool`](Registry::restore_pool).
    pub(crate) fn extract_pool<T: 'static>(&mut self) -> Box<Pool<T>> {
        let sequence = type_sequence::<T>();
        let taken = self.pools.get_mut(sequence).and_then(Option::take);
        match taken.map(|pool| pool.into_any().downcast::<Pool<T>>()) {
            Some(Ok(pool)) => pool,
            _ => panic!(
                "View extract: pool for `{}` is not available (is the type repeated in the view?)",
                std::any::type_name::<T>()
            ),
        }
    }

    pub(crate) fn restore_pool<T: 'static>(&mut self, pool: Box<Pool<T>>) {
        let sequence = type_sequence::<T>();
        self.pools[sequence] = Some(pool as Box<dyn ErasedPool>);
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

fn missing<T: 'static>(entity: Entity) -> ! {
    panic!(
        "Entity {:?} does not have component `{}`",
        entity,
        std::any::type_name::<T>()
    )
}

// ── Multi-type removal ───────────────────────────────────────────────────

/// Tuples of component types accepted by
/// [`Registry::remove_components`]. Implemented for tuples up to 8 elements.
pub trait RemoveSet {
    /// One `bool` per component type, `true` where a component was removed.
    type Removed;
    fn remove(registry: &mut Registry, entity: Entity) -> Self::Removed;
}

macro_rules! bool_per_type {
    ($T:ident) => {
        bool
    };
}

macro_rules! impl_remove_set {
    ($($T:ident),+) => {
        impl<$($T: 'static),+> RemoveSet for ($($T,)+) {
            type Removed = ($(bool_per_type!($T),)+);

            fn remove(registry: &mut Registry, entity: Entity) -> Self::Removed {
                ($(registry.remove_component::<$T>(entity),)+)
            }
        }
    };
}

impl_remove_set!(A);
impl_remove_set!(A, B);
impl_remove_set!(A, B, C);
impl_remove_set!(A, B, C, D);
impl_remove_set!(A, B, C, D, E);
impl_remove_set!(A, B, C, D, E, F);
impl_remove_set!(A, B, C, D, E, F, G);
impl_remove_set!(A, B, C, D, E, F, G, H);
