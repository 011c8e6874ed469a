//! Per-task ordered, duplicate-free list of subscribed event types.
//!
//! Backed initially by a fixed embedded array of capacity
//! `MAX_EMBEDDED_EVT_SUBS`. When a subscribe would exceed that capacity, a
//! heap buffer of size `ceil((old*3+1)/2)` is allocated and the existing
//! entries copied in; the same `ceil((old*3+1)/2)` rule is reapplied every
//! time a later subscribe would exceed the heap buffer's own capacity. The
//! embedded array is never freed; the heap buffer is dropped on
//! shrink-to-empty or task stop.

use heapless::Vec as EmbeddedVec;

/// Capacity of the embedded, non-heap subscription array.
pub const MAX_EMBEDDED_EVT_SUBS: usize = 4;

/// A task's subscribed event types.
#[derive(Debug, Clone)]
pub enum SubscriptionList {
    Embedded(EmbeddedVec<u32, MAX_EMBEDDED_EVT_SUBS>),
    Heap(Vec<u32>),
}

impl Default for SubscriptionList {
    fn default() -> Self {
        Self::Embedded(EmbeddedVec::new())
    }
}

impl SubscriptionList {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Embedded(v) => v.len(),
            Self::Heap(v) => v.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn as_slice(&self) -> &[u32] {
        match self {
            Self::Embedded(v) => v.as_slice(),
            Self::Heap(v) => v.as_slice(),
        }
    }

    #[must_use]
    pub fn contains(&self, evt_type: u32) -> bool {
        self.as_slice().contains(&evt_type)
    }

    /// Subscribe to `evt_type`. No-op if already present.
    pub fn subscribe(&mut self, evt_type: u32) {
        if self.contains(evt_type) {
            return;
        }
        match self {
            Self::Embedded(v) => {
                if v.push(evt_type).is_err() {
                    self.grow_and_push(evt_type);
                }
            }
            Self::Heap(v) => {
                if v.len() == v.capacity() {
                    let new_cap = (v.len() * 3 + 1).div_ceil(2);
                    v.reserve_exact(new_cap.max(v.len() + 1) - v.len());
                }
                v.push(evt_type);
            }
        }
    }

    /// Unsubscribe from `evt_type` via swap-with-last. Order not preserved.
    pub fn unsubscribe(&mut self, evt_type: u32) {
        match self {
            Self::Embedded(v) => {
                if let Some(pos) = v.iter().position(|&t| t == evt_type) {
                    v.swap_remove(pos);
                }
            }
            Self::Heap(v) => {
                if let Some(pos) = v.iter().position(|&t| t == evt_type) {
                    v.swap_remove(pos);
                }
            }
        }
    }

    /// Move the embedded array onto a heap buffer of size
    /// `ceil((old*3+1)/2)` and push `evt_type` onto it. Only called when
    /// `self` is the `Embedded` variant and it is already full. Later
    /// growth on the resulting `Heap` variant reapplies the same formula
    /// in `subscribe` directly.
    fn grow_and_push(&mut self, evt_type: u32) {
        let Self::Embedded(embedded) = self else {
            unreachable!("grow_and_push only called on a full Embedded list");
        };
        let old_len = embedded.len();
        let new_cap = (old_len * 3 + 1).div_ceil(2);
        let mut heap = Vec::with_capacity(new_cap.max(old_len + 1));
        heap.extend_from_slice(embedded.as_slice());
        heap.push(evt_type);
        *self = Self::Heap(heap);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribe_is_idempotent() {
        let mut subs = SubscriptionList::new();
        subs.subscribe(7);
        subs.subscribe(7);
        assert_eq!(subs.as_slice(), &[7]);
    }

    #[test]
    fn unsubscribe_swap_removes() {
        let mut subs = SubscriptionList::new();
        subs.subscribe(1);
        subs.subscribe(2);
        subs.subscribe(3);
        subs.unsubscribe(1);
        assert_eq!(subs.len(), 2);
        assert!(!subs.contains(1));
        assert!(subs.contains(2));
        assert!(subs.contains(3));
    }

    #[test]
    fn grows_past_embedded_capacity() {
        let mut subs = SubscriptionList::new();
        for t in 0..(MAX_EMBEDDED_EVT_SUBS as u32 + 3) {
            subs.subscribe(t);
        }
        assert!(matches!(subs, SubscriptionList::Heap(_)));
        assert_eq!(subs.len(), MAX_EMBEDDED_EVT_SUBS + 3);
        for t in 0..(MAX_EMBEDDED_EVT_SUBS as u32 + 3) {
            assert!(subs.contains(t));
        }
    }

    #[test]
    fn no_duplicates_survive_arbitrary_subscribe_unsubscribe() {
        let mut subs = SubscriptionList::new();
        let ops = [
            (true, 1),
            (true, 2),
            (true, 1),
            (false, 2),
            (true, 3),
            (true, 4),
            (true, 5),
            (false, 1),
            (true, 1),
        ];
        for (subscribe, evt) in ops {
            if subscribe {
                subs.subscribe(evt);
            } else {
                subs.unsubscribe(evt);
            }
        }
        let slice = subs.as_slice();
        let mut seen = std::collections::HashSet::new();
        for &t in slice {
            assert!(seen.insert(t), "duplicate event type {t}");
        }
        assert_eq!(slice.iter().collect::<std::collections::HashSet<_>>().len(), slice.len());
        assert!(subs.contains(1));
        assert!(!subs.contains(2));
        assert!(subs.contains(3));
        assert!(subs.contains(4));
        assert!(subs.contains(5));
    }
}
