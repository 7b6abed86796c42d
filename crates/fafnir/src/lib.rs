//! # Fafnir — Sparse-Set Entity Registry
//!
//! An EnTT-flavored entity-component core: generational entity handles, one
//! sparse/dense pool per component type, reentrancy-safe construction and
//! destruction signals, intersection views, and an intrusive parent/child
//! hierarchy driven entirely by those signals.
//!
//! Start with `use fafnir::prelude::*` and a [`Registry`](registry::Registry).

pub mod entity;
pub mod hierarchy;
pub mod pool;
pub mod prelude;
pub mod registry;
pub mod signal;
pub mod view;
