//! # Entity — Packed Generational Identifiers
//!
//! An [`Entity`] is a single integer with two fields packed into it: an
//! **index** into the registry's entity table, and a **version** (generation)
//! counter that detects stale handles after a slot is recycled.
//!
//! ## Layout
//!
//! ```text
//! default build            ┌─ version (12 bits) ─┬─── index (20 bits) ───┐
//! Entity(u32)              │ 31 .. 20            │ 19 .. 0               │
//!                          └─────────────────────┴───────────────────────┘
//!
//! --features wide-id       ┌─ version (32 bits) ─┬─── index (32 bits) ───┐
//! Entity(u64)              │ 63 .. 32            │ 31 .. 0               │
//!                          └─────────────────────┴───────────────────────┘
//! ```
//!
//! The split is fixed at compile time so every field access is a shift and a
//! mask — no branches, no runtime configuration. 20 index bits give roughly a
//! million live entities with recycling catching up to 4095 stale handles per
//! slot; the `wide-id` build trades memory for effectively unbounded both.
//!
//! ## Why pack instead of two fields?
//!
//! A `{ index: u32, generation: u32 }` pair is easier to read, but the packed
//! form is half the size in the common build, `Copy`-cheap in dense arrays,
//! and lets the registry thread its free list *through the entity table
//! itself*: a destroyed slot stores the next free index in its index bits and
//! the version a future occupant will receive in its version bits.
//!
//! ## Sentinels
//!
//! Two reserved shapes exist, checked by field rather than by full equality:
//!
//! - [`Entity::NULL`] — index field all ones. "No entity" in optional links.
//!   [`Entity::is_null`] is true for *any* value with an all-ones index,
//!   whatever its version.
//! - [`Entity::TOMBSTONE`] — version field all ones. Marks free-list
//!   terminators and in-flight recycling state inside the registry.
//!   [`Entity::is_tombstone`] is true for *any* value with an all-ones
//!   version, whatever its index.
//!
//! Live entities never carry either shape: the registry skips the tombstone
//! version when recycling, and the all-ones index is never allocated.
//!
//! ## Comparison
//!
//! - **hecs**: `u64` split into index + generation, same idea.
//! - **EnTT (C++)**: the direct inspiration — 20/12 packed `uint32_t` with
//!   null/tombstone sentinels and an in-table free list.
//! - **bevy_ecs**: generational indices wrapped in a niche-optimized struct.

use std::fmt;

use serde::{Deserialize, Serialize};

#[cfg(not(feature = "wide-id"))]
mod layout {
    /// Backing integer for [`Entity`](super::Entity).
    pub type Raw = u32;
    pub const INDEX_BITS: u32 = 20;
    pub const VERSION_BITS: u32 = 12;
}

#[cfg(feature = "wide-id")]
mod layout {
    /// Backing integer for [`Entity`](super::Entity).
    pub type Raw = u64;
    pub const INDEX_BITS: u32 = 32;
    pub const VERSION_BITS: u32 = 32;
}

use layout::{INDEX_BITS, Raw, VERSION_BITS};

/// A lightweight handle identifying one row across the registry's component
/// pools.
///
/// Entities are created by [`Registry::create_entity`](crate::Registry::create_entity)
/// and remain valid until destroyed; a handle kept past destruction fails
/// every validity check because the slot's version moves on without it.
///
/// The identifier is plain data: `Copy`, hashable, and serializable as its
/// packed integer.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Entity(Raw);

impl Entity {
    const INDEX_MASK: Raw = (1 << INDEX_BITS) - 1;
    const VERSION_MASK: Raw = (1 << VERSION_BITS) - 1;

    /// The "no entity" sentinel: index field all ones, version zero.
    pub const NULL: Entity = Entity::construct(u32::MAX, 0);

    /// The recycling sentinel: version field all ones, index zero.
    pub const TOMBSTONE: Entity = Entity::construct(0, u32::MAX);

    /// Build an identifier from an index and a version. Both arguments are
    /// truncated to their field widths; this is pure bit arithmetic and
    /// cannot fail.
    #[must_use]
    pub const fn construct(index: u32, version: u32) -> Entity {
        Entity((index as Raw & Self::INDEX_MASK) | ((version as Raw & Self::VERSION_MASK) << INDEX_BITS))
    }

    /// Build an identifier keeping `lhs`'s index and `rhs`'s version.
    #[must_use]
    pub const fn combine(lhs: Entity, rhs: Entity) -> Entity {
        Entity((lhs.0 & Self::INDEX_MASK) | (rhs.0 & !Self::INDEX_MASK))
    }

    /// The slot index this handle addresses.
    #[must_use]
    pub const fn index(self) -> u32 {
        (self.0 & Self::INDEX_MASK) as u32
    }

    /// The generation counter baked into this handle.
    #[must_use]
    pub const fn version(self) -> u32 {
        (self.0 >> INDEX_BITS) as u32
    }

    /// True for any value whose index field is all ones, regardless of
    /// version. [`Entity::NULL`] is the canonical such value.
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 & Self::INDEX_MASK == Self::INDEX_MASK
    }

    /// True for any value whose version field is all ones, regardless of
    /// index. [`Entity::TOMBSTONE`] is the canonical such value.
    #[must_use]
    pub const fn is_tombstone(self) -> bool {
        self.0 & !Self::INDEX_MASK == !Self::INDEX_MASK
    }

    /// The packed integer form, e.g. for logging or serialization by hand.
    #[must_use]
    pub const fn to_raw(self) -> u64 {
        self.0 as u64
    }

    /// Rebuild an identifier from [`Entity::to_raw`] output. Bits beyond the
    /// backing width are truncated.
    #[must_use]
    pub const fn from_raw(raw: u64) -> Entity {
        Entity(raw as Raw)
    }

    /// The version the slot hands out on its next reuse: incremented,
    /// wrapping past the tombstone value so a live handle never carries it.
    pub(crate) const fn bumped_version(self) -> u32 {
        let next = self.version().wrapping_add(1) & Self::VERSION_MASK as u32;
        if next == Self::VERSION_MASK as u32 { 0 } else { next }
    }
}

impl Default for Entity {
    fn default() -> Self {
        Entity::NULL
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            write!(f, "Entity(null)")
        } else {
            write!(f, "Entity({}v{})", self.index(), self.version())
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            write!(f, "null")
        } else {
            write!(f, "{}v{}", self.index(), self.version())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn construct_round_trips_fields() {
        let e = Entity::construct(1234, 56);
        assert_eq!(e.index(), 1234);
        assert_eq!(e.version(), 56);
    }

    #[test]
    fn construct_truncates_to_field_width() {
        // An index wider than the field wraps into it instead of spilling
        // over into the version bits.
        let e = Entity::construct(u32::MAX, 0);
        assert_eq!(e.version(), 0);
        let e = Entity::construct(0, u32::MAX);
        assert_eq!(e.index(), 0);
    }

    #[test]
    fn combine_keeps_lhs_index_rhs_version() {
        let a = Entity::construct(7, 1);
        let b = Entity::construct(9, 3);
        let c = Entity::combine(a, b);
        assert_eq!(c.index(), 7);
        assert_eq!(c.version(), 3);
    }

    #[test]
    fn null_matches_any_version() {
        assert!(Entity::NULL.is_null());
        let stale_null = Entity::combine(Entity::NULL, Entity::construct(0, 17));
        assert!(stale_null.is_null());
        assert!(!Entity::construct(0, 17).is_null());
    }

    #[test]
    fn tombstone_matches_any_index() {
        assert!(Entity::TOMBSTONE.is_tombstone());
        let linked = Entity::combine(Entity::construct(42, 0), Entity::TOMBSTONE);
        assert!(linked.is_tombstone());
        assert_eq!(linked.index(), 42);
        assert!(!Entity::construct(42, 0).is_tombstone());
    }

    #[test]
    fn bumped_version_skips_tombstone() {
        let e = Entity::construct(0, 0);
        assert_eq!(e.bumped_version(), 1);

        // One below the tombstone value wraps straight to zero.
        let last = Entity::construct(0, Entity::VERSION_MASK as u32 - 1);
        assert_eq!(last.bumped_version(), 0);
    }

    #[cfg(not(feature = "wide-id"))]
    #[test]
    fn default_layout_is_20_12() {
        assert_eq!(Entity::INDEX_MASK, 0x000F_FFFF);
        assert_eq!(Entity::VERSION_MASK, 0x0FFF);
        // Version arithmetic is modulo 4096.
        assert_eq!(Entity::construct(0, 4096).version(), 0);
    }

    #[cfg(feature = "wide-id")]
    #[test]
    fn wide_layout_is_32_32() {
        assert_eq!(Entity::INDEX_MASK, 0xFFFF_FFFF);
        assert_eq!(Entity::VERSION_MASK, 0xFFFF_FFFF);
        let e = Entity::construct(u32::MAX - 1, u32::MAX - 1);
        assert_eq!(e.index(), u32::MAX - 1);
        assert_eq!(e.version(), u32::MAX - 1);
    }

    #[test]
    fn raw_round_trip() {
        let e = Entity::construct(99, 5);
        assert_eq!(Entity::from_raw(e.to_raw()), e);
    }

    #[test]
    fn serializes_as_packed_integer() {
        let e = Entity::construct(3, 1);
        let json = serde_json::to_string(&e).unwrap();
        assert_eq!(json, e.to_raw().to_string());
        let back: Entity = serde_json::from_str(&json).unwrap();
        assert_eq!(back, e);
    }

    #[test]
    fn debug_format_shows_index_and_version() {
        let e = Entity::construct(5, 1);
        assert_eq!(format!("{e:?}"), "Entity(5v1)");
        assert_eq!(format!("{}", Entity::NULL), "null");
    }
}
