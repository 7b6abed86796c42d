//! # Views — Multi-Pool Intersection Iteration
//!
//! A [`View`] walks every live entity that owns **all** of the component
//! types named in its parameter tuple. Each pool keeps its own dense
//! array, so an intersection is computed by scanning one pool and probing
//! the others:
//!
//! ```text
//!   view::<(&Position, &mut Velocity)>()
//!
//!   Position pool (5 entities)        Velocity pool (2 entities)
//!   ┌────┬────┬────┬────┬────┐        ┌────┬────┐
//!   │ e0 │ e3 │ e7 │ e1 │ e9 │        │ e3 │ e9 │   ◀── driver
//!   └────┴────┴────┴────┴────┘        └────┴────┘
//!
//!   scan the smallest pool, probe the rest:  e3 ✓   e9 ✓
//! ```
//!
//! The driving pool is always the one with the fewest elements, so the
//! cost of a scan is `O(min(len))` probes rather than `O(max(len))`.
//!
//! ## Extract / Restore
//!
//! Iterating one pool while fetching from another would require two
//! simultaneous borrows of the registry's pool table. Instead, each
//! parameter *extracts* its pool out of the registry (moving the `Box`,
//! not the data), the scan runs against the extracted sources, and the
//! pools are *restored* afterwards. A consequence worth knowing: naming
//! the same component type twice in one view finds its pool already
//! extracted and panics, for `&T`/`&mut T` aliasing would be unsound.
//!
//! The view holds `&mut Registry` for its whole lifetime, so callbacks
//! running inside [`View::each`] cannot reach back into the registry to
//! create or destroy anything. Structural changes have to wait until the
//! scan finishes.
//!
//! ## Comparison
//!
//! - **EnTT**: `registry.view<A, B>().each(...)` with the same
//!   smallest-pool-drives rule. This module is that design in Rust,
//!   with the borrow checker standing in for EnTT's "don't mutate the
//!   pools mid-iteration" footnote.
//! - **hecs / bevy_ecs**: queries walk archetypes, so an intersection
//!   is a table lookup rather than a probe. Sparse sets pay the probe
//!   and in exchange keep per-pool insert/remove at a strict O(1).

use crate::entity::Entity;
use crate::pool::Pool;
use crate::registry::Registry;
use std::marker::PhantomData;

// ── View parameters ──────────────────────────────────────────────────────────

/// A type that can appear in a [`View`]: `&T`, `&mut T`, or a tuple of
/// those (up to eight elements).
///
/// Implementations extract their pool from the registry, answer probes
/// for single entities, and put the pool back when the scan is over.
/// Tuples delegate element-wise; their `entities` slice is the dense
/// array of the smallest member pool, which is what makes it the driver.
pub trait ViewParam {
    /// What the closure receives per matched entity.
    type Item<'a>;
    /// The pool storage held while the view is running.
    type Source;

    /// Create the backing pool(s) if they do not exist yet, so that a
    /// view over a never-touched type is empty rather than an error.
    fn ensure(registry: &mut Registry);

    /// Move the backing pool(s) out of the registry.
    ///
    /// # Panics
    ///
    /// Panics if a pool is already extracted, which happens when the
    /// same component type is named twice in one view.
    fn extract(registry: &mut Registry) -> Self::Source;

    /// Move the backing pool(s) back into the registry.
    fn restore(source: Self::Source, registry: &mut Registry);

    /// Number of entities the driving candidate holds.
    fn len(source: &Self::Source) -> usize;

    /// Dense entity array of the driving candidate.
    fn entities(source: &Self::Source) -> &[Entity];

    /// Fetch this parameter's item for one entity, or `None` if the
    /// entity is missing from any member pool.
    fn fetch(source: &mut Self::Source, entity: Entity) -> Option<Self::Item<'_>>;
}

impl<T: 'static> ViewParam for &T {
    type Item<'a> = &'a T;
    type Source = Box<Pool<T>>;

    fn ensure(registry: &mut Registry) {
        registry.ensure_pool::<T>();
    }

    fn extract(registry: &mut Registry) -> Self::Source {
        registry.extract_pool::<T>()
    }

    fn restore(source: Self::Source, registry: &mut Registry) {
        registry.restore_pool(source);
    }

    fn len(source: &Self::Source) -> usize {
        source.len()
    }

    fn entities(source: &Self::Source) -> &[Entity] {
        source.entities()
    }

    fn fetch(source: &mut Self::Source, entity: Entity) -> Option<Self::Item<'_>> {
        source.get(entity)
    }
}

impl<T: 'static> ViewParam for &mut T {
    type Item<'a> = &'a mut T;
    type Source = Box<Pool<T>>;

    fn ensure(registry: &mut Registry) {
        registry.ensure_pool::<T>();
    }

    fn extract(registry: &mut Registry) -> Self::Source {
        registry.extract_pool::<T>()
    }

    fn restore(source: Self::Source, registry: &mut Registry) {
        registry.restore_pool(source);
    }

    fn len(source: &Self::Source) -> usize {
        source.len()
    }

    fn entities(source: &Self::Source) -> &[Entity] {
        source.entities()
    }

    fn fetch(source: &mut Self::Source, entity: Entity) -> Option<Self::Item<'_>> {
        source.get_mut(entity)
    }
}

macro_rules! impl_view_param_tuple {
    ($($param:ident),+) => {
        impl<$($param: ViewParam),+> ViewParam for ($($param,)+) {
            type Item<'a> = ($($param::Item<'a>,)+);
            type Source = ($($param::Source,)+);

            fn ensure(registry: &mut Registry) {
                $($param::ensure(registry);)+
            }

            fn extract(registry: &mut Registry) -> Self::Source {
                ($($param::extract(registry),)+)
            }

            #[allow(non_snake_case)]
            fn restore(source: Self::Source, registry: &mut Registry) {
                let ($($param,)+) = source;
                $($param::restore($param, registry);)+
            }

            #[allow(non_snake_case)]
            fn len(source: &Self::Source) -> usize {
                let ($($param,)+) = source;
                let mut smallest = usize::MAX;
                $(smallest = smallest.min($param::len($param));)+
                smallest
            }

            #[allow(non_snake_case)]
            fn entities(source: &Self::Source) -> &[Entity] {
                let ($($param,)+) = source;
                let mut driver: &[Entity] = &[];
                let mut smallest = usize::MAX;
                $(
                    if $param::len($param) < smallest {
                        smallest = $param::len($param);
                        driver = $param::entities($param);
                    }
                )+
                driver
            }

            #[allow(non_snake_case)]
            fn fetch(source: &mut Self::Source, entity: Entity) -> Option<Self::Item<'_>> {
                let ($($param,)+) = source;
                Some(($($param::fetch($param, entity)?,)+))
            }
        }
    };
}

impl_view_param_tuple!(A);
impl_view_param_tuple!(A, B);
impl_view_param_tuple!(A, B, C);
impl_view_param_tuple!(A, B, C, D);
impl_view_param_tuple!(A, B, C, D, E);
impl_view_param_tuple!(A, B, C, D, E, F);
impl_view_param_tuple!(A, B, C, D, E, F, G);
impl_view_param_tuple!(A, B, C, D, E, F, G, H);

// ── View ─────────────────────────────────────────────────────────────────────

/// An iterable intersection over the pools named by `Q`.
///
/// Created by [`Registry::view`]. Constructing the view creates any
/// missing pools up front; the actual scan happens in [`View::each`].
pub struct View<'r, Q: ViewParam> {
    registry: &'r mut Registry,
    _param: PhantomData<Q>,
}

impl<'r, Q: ViewParam> View<'r, Q> {
    pub(crate) fn new(registry: &'r mut Registry) -> Self {
        Q::ensure(registry);
        View {
            registry,
            _param: PhantomData,
        }
    }

    /// Call `f` once per entity that owns every component in `Q`, in the
    /// dense order of the smallest member pool.
    ///
    /// # Example
    ///
    /// ```
    /// # use fafnir::registry::Registry;
    /// # struct Position { x: f32, y: f32 }
    /// # struct Velocity { dx: f32, dy: f32 }
    /// # let mut registry = Registry::new();
    /// # let entity = registry.create_entity();
    /// # registry.emplace_component(entity, Position { x: 0.0, y: 0.0 });
    /// # registry.emplace_component(entity, Velocity { dx: 1.0, dy: 2.0 });
    /// registry.view::<(&mut Position, &Velocity)>().each(|_entity, (position, velocity)| {
    ///     position.x += velocity.dx;
    ///     position.y += velocity.dy;
    /// });
    /// ```
    pub fn each(self, mut f: impl FnMut(Entity, Q::Item<'_>)) {
        let mut source = Q::extract(self.registry);
        // The driver's dense array moves along with its extracted pool,
        // so the scan list has to be copied out before probing starts.
        let driver: Vec<Entity> = Q::entities(&source).to_vec();
        for entity in driver {
            if let Some(item) = Q::fetch(&mut source, entity) {
                f(entity, item);
            }
        }
        Q::restore(source, self.registry);
    }
}
