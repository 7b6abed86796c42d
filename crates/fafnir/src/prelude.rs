//! Convenience re-exports — `use fafnir::prelude::*` for the common items.
//!
//! Types only; the one free function worth knowing,
//! [`type_sequence`](crate::pool::type_sequence), stays behind its module
//! path since only erasure-adjacent code (serializers, inspectors) needs it.

pub use crate::entity::Entity;
pub use crate::hierarchy::{Hierarchy, HierarchyError, HierarchySystem, ParentChanged};
pub use crate::registry::{Registry, RemoveSet};
pub use crate::signal::{Connection, Signal, Sink};
pub use crate::view::{View, ViewParam};
