//! Fixed-size slab allocator for internal-action records.
//!
//! Subscribe/unsubscribe requests, deferred callbacks and private events
//! are held here until the dispatch loop drains them; the slot index is
//! smuggled through the event queue's opaque `data` pointer field (cast,
//! never dereferenced) so the queue doesn't need a second record type.
//! Interrupt-masked like the event queue, since subscribe requests may
//! originate from interrupt context.

use core::cell::RefCell;
use critical_section::Mutex;

use super::tagged_ptr::TaggedFreeInfo;

/// Capacity of the internal-action slab.
pub const SLAB_CAPACITY: usize = 8;

/// One pending internal-action record.
#[derive(Debug, Clone, Copy)]
pub enum InternalAction {
    Subscribe {
        tid: u32,
        evt_type: u32,
    },
    Unsubscribe {
        tid: u32,
        evt_type: u32,
    },
    DeferredCallback {
        func: fn(*mut u8),
        cookie: *mut u8,
    },
    PrivateEvent {
        evt_type: u32,
        data: *mut u8,
        free_info: TaggedFreeInfo,
        to_tid: u32,
    },
}

pub struct Slab {
    slots: Mutex<RefCell<[Option<InternalAction>; SLAB_CAPACITY]>>,
}

impl Default for Slab {
    fn default() -> Self {
        Self::new()
    }
}

impl Slab {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slots: Mutex::new(RefCell::new([None; SLAB_CAPACITY])),
        }
    }

    /// Allocate a slot and store `action` in it. Returns `None` if the
    /// slab is exhausted.
    pub fn allocate(&self, action: InternalAction) -> Option<usize> {
        critical_section::with(|cs| {
            let mut slots = self.slots.borrow(cs).borrow_mut();
            let free = slots.iter().position(Option::is_none)?;
            slots[free] = Some(action);
            Some(free)
        })
    }

    /// Remove and return the record at `index`, freeing the slot.
    pub fn take(&self, index: usize) -> Option<InternalAction> {
        critical_section::with(|cs| self.slots.borrow(cs).borrow_mut()[index].take())
    }

    /// Encode a slab index as the opaque event-data pointer used to carry
    /// it through the event queue.
    #[must_use]
    pub fn index_to_data(index: usize) -> *mut u8 {
        core::ptr::without_provenance_mut(index)
    }

    /// Decode an opaque event-data pointer back into a slab index.
    #[must_use]
    pub fn data_to_index(data: *mut u8) -> usize {
        data as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_and_take_round_trips() {
        let slab = Slab::new();
        let idx = slab
            .allocate(InternalAction::Subscribe {
                tid: 7,
                evt_type: 99,
            })
            .expect("slab has room");
        match slab.take(idx) {
            Some(InternalAction::Subscribe { tid, evt_type }) => {
                assert_eq!(tid, 7);
                assert_eq!(evt_type, 99);
            }
            other => panic!("unexpected record: {other:?}"),
        }
        assert!(slab.take(idx).is_none());
    }

    #[test]
    fn exhaustion_returns_none() {
        let slab = Slab::new();
        for _ in 0..SLAB_CAPACITY {
            assert!(slab
                .allocate(InternalAction::Unsubscribe {
                    tid: 1,
                    evt_type: 1
                })
                .is_some());
        }
        assert!(slab
            .allocate(InternalAction::Unsubscribe {
                tid: 1,
                evt_type: 1
            })
            .is_none());
    }

    #[test]
    fn freed_slot_is_reused() {
        let slab = Slab::new();
        let idx = slab
            .allocate(InternalAction::Unsubscribe {
                tid: 1,
                evt_type: 1,
            })
            .unwrap();
        slab.take(idx);
        let idx2 = slab
            .allocate(InternalAction::Unsubscribe {
                tid: 2,
                evt_type: 2,
            })
            .unwrap();
        assert_eq!(idx, idx2);
    }

    #[test]
    fn data_pointer_round_trip() {
        for idx in [0usize, 3, SLAB_CAPACITY - 1] {
            let data = Slab::index_to_data(idx);
            assert_eq!(Slab::data_to_index(data), idx);
        }
    }
}
