//! Bounded FIFO event queue with urgent-front bypass and discardable-drop.
//!
//! The only kernel primitive producers may touch from interrupt context.
//! Guarded by a `critical_section::Mutex`, mirroring the teacher crate's
//! interrupt-masked approach to concurrency (see the `events` ring buffer
//! this module's shape is grounded on) rather than atomics, since removal
//! of an arbitrary discardable slot when the queue is full is not
//! expressible as a lock-free ring-buffer operation.

use core::cell::RefCell;
use critical_section::Mutex;
use heapless::Vec as FixedVec;

use super::tagged_ptr::TaggedFreeInfo;

/// Event-type numeric ranges below this value are internal actions
/// (see `kernel::dispatch`), not routed to subscribers.
pub const EVT_NO_FIRST_USER_EVENT: u32 = 4;

/// High bit of a user event type marks it droppable when the queue is full.
pub const EVENT_TYPE_BIT_DISCARDABLE: u32 = 1 << 31;

/// Event queue capacity.
pub const EVENT_QUEUE_CAPACITY: usize = 512;

/// One queued event: a type, an opaque data pointer, and how to free it.
#[derive(Debug, Clone, Copy)]
pub struct Event {
    pub evt_type: u32,
    pub data: *mut u8,
    pub free_info: TaggedFreeInfo,
}

impl Event {
    #[must_use]
    pub fn is_discardable(&self) -> bool {
        self.evt_type & EVENT_TYPE_BIT_DISCARDABLE != 0
    }
}

/// Queue contents plus the boundary between the urgent run at the front
/// and the regular FIFO behind it, so repeated urgent enqueues land in
/// arrival order instead of each jumping ahead of the last.
struct State {
    events: FixedVec<Event, EVENT_QUEUE_CAPACITY>,
    urgent_len: usize,
}

/// Bounded FIFO of capacity [`EVENT_QUEUE_CAPACITY`].
pub struct EventQueue {
    inner: Mutex<RefCell<State>>,
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl EventQueue {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(RefCell::new(State {
                events: FixedVec::new(),
                urgent_len: 0,
            })),
        }
    }

    /// Enqueue an event. Returns `false` if the queue is full and either
    /// the event is not discardable or no discardable slot could be
    /// evicted to make room. `urgent` requests front-of-queue insertion,
    /// behind any already-queued urgent events (FIFO among urgents).
    pub fn enqueue(
        &self,
        evt_type: u32,
        data: *mut u8,
        free_info: TaggedFreeInfo,
        urgent: bool,
    ) -> bool {
        critical_section::with(|cs| {
            let mut state = self.inner.borrow(cs).borrow_mut();
            if state.events.len() == EVENT_QUEUE_CAPACITY {
                if evt_type & EVENT_TYPE_BIT_DISCARDABLE == 0 {
                    return false;
                }
                match state.events.iter().position(Event::is_discardable) {
                    Some(idx) => {
                        state.events.remove(idx);
                        if idx < state.urgent_len {
                            state.urgent_len -= 1;
                        }
                    }
                    None => return false,
                }
            }
            let event = Event {
                evt_type,
                data,
                free_info,
            };
            let inserted = if urgent {
                let idx = state.urgent_len;
                let result = state.events.insert(idx, event);
                if result.is_ok() {
                    state.urgent_len += 1;
                }
                result
            } else {
                state.events.push(event)
            };
            inserted.is_ok()
        })
    }

    /// Dequeue the oldest event. If `blocking` and the queue is
    /// momentarily empty, spins until a producer deposits one. A real
    /// embedded target should swap the spin for a WFI/WFE wait.
    pub fn dequeue(&self, blocking: bool) -> Option<Event> {
        loop {
            let popped = critical_section::with(|cs| {
                let mut state = self.inner.borrow(cs).borrow_mut();
                if state.events.is_empty() {
                    None
                } else {
                    let event = state.events.remove(0);
                    if state.urgent_len > 0 {
                        state.urgent_len -= 1;
                    }
                    Some(event)
                }
            });
            if popped.is_some() || !blocking {
                return popped;
            }
            core::hint::spin_loop();
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        critical_section::with(|cs| self.inner.borrow(cs).borrow().events.len())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn free_info() -> TaggedFreeInfo {
        TaggedFreeInfo::NONE
    }

    #[test]
    fn fifo_order_for_non_urgent_enqueues() {
        let q = EventQueue::new();
        assert!(q.enqueue(10, core::ptr::null_mut(), free_info(), false));
        assert!(q.enqueue(11, core::ptr::null_mut(), free_info(), false));
        assert_eq!(q.dequeue(false).unwrap().evt_type, 10);
        assert_eq!(q.dequeue(false).unwrap().evt_type, 11);
    }

    #[test]
    fn urgent_jumps_to_front_but_not_ahead_of_other_urgent() {
        let q = EventQueue::new();
        assert!(q.enqueue(1, core::ptr::null_mut(), free_info(), false));
        assert!(q.enqueue(2, core::ptr::null_mut(), free_info(), true));
        assert!(q.enqueue(3, core::ptr::null_mut(), free_info(), true));
        // 3 is urgent and enqueued after 2 (also urgent), so 3 lands in
        // front of 1 but behind 2.
        assert_eq!(q.dequeue(false).unwrap().evt_type, 2);
        assert_eq!(q.dequeue(false).unwrap().evt_type, 3);
        assert_eq!(q.dequeue(false).unwrap().evt_type, 1);
    }

    #[test]
    fn discardable_drop_when_full() {
        let q = EventQueue::new();
        for _ in 0..EVENT_QUEUE_CAPACITY {
            assert!(q.enqueue(1, core::ptr::null_mut(), free_info(), false));
        }
        // No discardable slot to evict: non-discardable enqueue fails.
        assert!(!q.enqueue(2, core::ptr::null_mut(), free_info(), false));

        // Replace the oldest entry with a discardable one, then fill again.
        assert_eq!(q.dequeue(false).unwrap().evt_type, 1);
        let discardable_type = 5 | EVENT_TYPE_BIT_DISCARDABLE;
        assert!(q.enqueue(discardable_type, core::ptr::null_mut(), free_info(), false));

        // Queue is full again, but now contains one discardable entry:
        // enqueuing a discardable event succeeds by evicting it.
        let another_discardable = 6 | EVENT_TYPE_BIT_DISCARDABLE;
        assert!(q.enqueue(another_discardable, core::ptr::null_mut(), free_info(), false));

        // A non-discardable enqueue still fails: only discardable events
        // may evict.
        assert!(!q.enqueue(7, core::ptr::null_mut(), free_info(), false));
    }

    #[test]
    fn empty_dequeue_returns_none_when_not_blocking() {
        let q = EventQueue::new();
        assert!(q.dequeue(false).is_none());
    }
}
