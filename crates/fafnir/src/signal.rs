//! # Signal — Reentrancy-Safe Observer Lists
//!
//! A [`Signal`] owns an ordered list of callbacks and invokes them with a
//! shared context plus a borrowed event payload. The registry uses signals to
//! announce component construction and destruction; the hierarchy system both
//! subscribes to those and publishes its own re-parenting events.
//!
//! ## Handles
//!
//! ```text
//!   Signal<Ctx, E> ──owns──▶ slot list ◀──weak── Sink<Ctx, E>   (subscribe)
//!                                 ▲
//!                                 └────weak───── Connection      (control)
//! ```
//!
//! [`Signal::sink`] hands out a subscribing view; [`Sink::connect`] appends a
//! slot and returns a [`Connection`], an RAII token that disconnects on drop
//! and can block, unblock, or permanently [`detach`](Connection::detach) its
//! slot. `Connection` is deliberately non-generic so a struct can store
//! connections to signals of different shapes in one field type.
//!
//! ## Dispatch rules
//!
//! Callbacks run in connection order. A callback may freely connect new
//! slots (they first fire on the *next* emission), disconnect any slot
//! including its own, block or unblock slots, and re-emit other signals.
//! Removing a slot mid-dispatch only clears it; the vacancy is compacted
//! once the outermost emission unwinds, so slot order never shifts while a
//! dispatch is walking the list.
//!
//! The one unsupported shape is a callback causing its *own* slot to run
//! again before it returns (emitting the same signal without blocking
//! itself first). That re-entry is detected by `RefCell` and panics rather
//! than aliasing the closure's state. Subscribers that re-emit their own
//! signal block their connection for the duration, as the hierarchy system
//! does during cascading destruction.
//!
//! ## Comparison
//!
//! - **EnTT (C++)**: `sigh` / `sink` / `connection` — the model followed
//!   here, including blocked slots and disconnect-during-dispatch.
//! - **Qt**: signals and slots with queued vs. direct dispatch; this list is
//!   always direct and single-threaded.
//! - **bevy_ecs**: component hooks and observers serve the same role, keyed
//!   through the ECS scheduler instead of owned lists.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

type Callback<Ctx, E> = Rc<RefCell<dyn FnMut(&mut Ctx, &E)>>;

struct Slot<Ctx, E> {
    id: u64,
    blocked: bool,
    // None marks a slot cleared mid-dispatch, compacted later.
    callback: Option<Callback<Ctx, E>>,
}

struct Inner<Ctx, E> {
    slots: Vec<Slot<Ctx, E>>,
    next_id: u64,
    depth: usize,
    dirty: bool,
}

/// An ordered callback list. `Ctx` is the mutable context every callback
/// receives (the registry, for pool signals); `E` is the borrowed event
/// payload.
pub struct Signal<Ctx, E> {
    inner: Rc<RefCell<Inner<Ctx, E>>>,
}

impl<Ctx, E> Signal<Ctx, E> {
    pub fn new() -> Self {
        Signal {
            inner: Rc::new(RefCell::new(Inner {
                slots: Vec::new(),
                next_id: 0,
                depth: 0,
                dirty: false,
            })),
        }
    }

    /// A subscribing handle for this signal. Sinks are weak: they never keep
    /// a dead signal alive, and connecting through a stale sink yields an
    /// already-dead [`Connection`].
    #[must_use]
    pub fn sink(&self) -> Sink<Ctx, E> {
        Sink {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Invoke every connected, unblocked slot in connection order.
    ///
    /// Slots connected while the emission is in flight are fenced off and
    /// first fire on the next emission. Nested emissions of the same signal
    /// are allowed; cleared slots are compacted when the outermost one
    /// unwinds.
    pub fn emit(&self, ctx: &mut Ctx, event: &E) {
        let fence = {
            let mut list = self.inner.borrow_mut();
            list.depth += 1;
            list.slots.len()
        };
        let mut index = 0;
        while index < fence {
            // Clone the callback handle out so no list borrow is held while
            // user code runs; the callback may mutate the list arbitrarily.
            let callback = {
                let list = self.inner.borrow();
                let slot = &list.slots[index];
                if slot.blocked { None } else { slot.callback.clone() }
            };
            if let Some(callback) = callback {
                (&mut *callback.borrow_mut())(ctx, event);
            }
            index += 1;
        }
        let mut list = self.inner.borrow_mut();
        list.depth -= 1;
        if list.depth == 0 && list.dirty {
            list.slots.retain(|slot| slot.callback.is_some());
            list.dirty = false;
        }
    }

    /// Number of live slots, counting blocked ones.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner
            .borrow()
            .slots
            .iter()
            .filter(|slot| slot.callback.is_some())
            .count()
    }
}

impl<Ctx, E> Clone for Signal<Ctx, E> {
    fn clone(&self) -> Self {
        Signal {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<Ctx, E> Default for Signal<Ctx, E> {
    fn default() -> Self {
        Signal::new()
    }
}

/// A subscribing handle obtained from [`Signal::sink`]. Cheap to clone and
/// safe to hold past the signal's death.
pub struct Sink<Ctx, E> {
    inner: Weak<RefCell<Inner<Ctx, E>>>,
}

impl<Ctx: 'static, E: 'static> Sink<Ctx, E> {
    /// Append `callback` to the signal's slot list.
    ///
    /// If the emission that is currently in flight (if any) has not reached
    /// the end of the list, the new slot still waits for the next emission.
    /// Connecting through a sink whose signal has been dropped returns a
    /// dead connection.
    pub fn connect(&self, callback: impl FnMut(&mut Ctx, &E) + 'static) -> Connection {
        let Some(inner) = self.inner.upgrade() else {
            return Connection { slot: None };
        };
        let id = {
            let mut list = inner.borrow_mut();
            let id = list.next_id;
            list.next_id += 1;
            list.slots.push(Slot {
                id,
                blocked: false,
                callback: Some(Rc::new(RefCell::new(callback))),
            });
            id
        };
        let inner: Rc<dyn SlotList> = inner;
        let list: Weak<dyn SlotList> = Rc::downgrade(&inner);
        Connection {
            slot: Some((list, id)),
        }
    }
}

impl<Ctx, E> Clone for Sink<Ctx, E> {
    fn clone(&self) -> Self {
        Sink {
            inner: Weak::clone(&self.inner),
        }
    }
}

// ── Connection ──────────────────────────────────────────────────────────────

/// Type-erased control surface onto one signal's slot list. Lets
/// [`Connection`] stay non-generic over `Ctx` and `E`.
trait SlotList {
    fn disconnect(&self, id: u64);
    fn set_blocked(&self, id: u64, blocked: bool);
    fn is_connected(&self, id: u64) -> bool;
}

impl<Ctx, E> SlotList for RefCell<Inner<Ctx, E>> {
    fn disconnect(&self, id: u64) {
        let removed = {
            let mut list = self.borrow_mut();
            let Some(position) = list.slots.iter().position(|slot| slot.id == id) else {
                return;
            };
            if list.depth == 0 {
                let slot = list.slots.remove(position);
                slot.callback
            } else {
                // A dispatch is walking the list; clear in place and let the
                // outermost emit compact.
                list.dirty = true;
                list.slots[position].callback.take()
            }
        };
        // The callback may own Connections into this same list; it must drop
        // after the borrow ends.
        drop(removed);
    }

    fn set_blocked(&self, id: u64, blocked: bool) {
        let mut list = self.borrow_mut();
        if let Some(slot) = list.slots.iter_mut().find(|slot| slot.id == id) {
            if slot.callback.is_some() {
                slot.blocked = blocked;
            }
        }
    }

    fn is_connected(&self, id: u64) -> bool {
        self.borrow()
            .slots
            .iter()
            .any(|slot| slot.id == id && slot.callback.is_some())
    }
}

/// RAII handle to one connected slot.
///
/// Dropping the connection disconnects the slot; [`detach`](Connection::detach)
/// instead hands the slot to the signal for the rest of the signal's life.
/// Every operation is a no-op once the slot or the whole signal is gone, so
/// keeping a `Connection` past either is harmless.
#[derive(Debug)]
#[must_use = "dropping a Connection disconnects its slot"]
pub struct Connection {
    slot: Option<(Weak<dyn SlotList>, u64)>,
}

impl Connection {
    /// Remove the slot from the signal. Idempotent; a disconnected or dead
    /// connection stays inert.
    pub fn disconnect(&self) {
        if let Some((list, id)) = &self.slot {
            if let Some(list) = list.upgrade() {
                list.disconnect(*id);
            }
        }
    }

    /// Skip the slot during emissions until [`unblock`](Connection::unblock).
    /// The slot keeps its position in the dispatch order.
    pub fn block(&self) {
        self.set_blocked(true);
    }

    /// Re-enable a blocked slot.
    pub fn unblock(&self) {
        self.set_blocked(false);
    }

    /// Whether the slot is still present in a live signal. Blocked slots
    /// count as connected.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        match &self.slot {
            Some((list, id)) => list.upgrade().is_some_and(|list| list.is_connected(*id)),
            None => false,
        }
    }

    /// Consume the handle without disconnecting. The slot then lives exactly
    /// as long as the signal does.
    pub fn detach(mut self) {
        self.slot = None;
    }

    fn set_blocked(&self, blocked: bool) {
        if let Some((list, id)) = &self.slot {
            if let Some(list) = list.upgrade() {
                list.set_blocked(*id, blocked);
            }
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Some((list, id)) = self.slot.take() {
            if let Some(list) = list.upgrade() {
                list.disconnect(id);
            }
        }
    }
}
