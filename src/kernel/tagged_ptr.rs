//! One machine word encoding either a free-callback or an owner task id.
//!
//! Every enqueued event carries a `TaggedFreeInfo` describing how to
//! release its `data` once delivery is complete: either call a free
//! function directly, or deliver an `APP_FREE_EVT_DATA` event to the task
//! that owns the data. A low-order tag bit distinguishes the two variants;
//! zero in either form means "no free action". The tid variant packs the
//! tid above the tag bit, so encoding is lossless as long as the tid fits
//! in `usize::BITS - 1` bits — true for any tid drawn from
//! `FIRST_VALID_TID..=LAST_VALID_TID` (at most `0x7FFF_FFFF`) on a 32-bit
//! target and trivially true on 64-bit.

use core::fmt;

/// A free function taking ownership of an event's opaque data pointer.
pub type FreeFn = fn(*mut u8);

const TAG_BIT: usize = 0b1;

/// Tagged free-info: a free function, an owner tid, or "no free action".
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct TaggedFreeInfo(usize);

impl TaggedFreeInfo {
    /// No free action is associated with the event.
    pub const NONE: Self = Self(0);

    /// Build from a free-function pointer. The function's address must be
    /// at least 2-byte aligned, which holds for any `fn` item on every
    /// target this crate supports.
    #[must_use]
    pub fn from_free_fn(f: FreeFn) -> Self {
        let addr = f as usize;
        debug_assert_eq!(addr & TAG_BIT, 0, "function pointer must be word-aligned");
        Self(addr)
    }

    /// Build from an owner task id. `tid` must be non-zero and must fit in
    /// `usize::BITS - 1` bits (guaranteed by the configured tid range).
    #[must_use]
    pub fn from_tid(tid: u32) -> Self {
        Self(((tid as usize) << 1) | TAG_BIT)
    }

    /// True if this carries no free action: either variant decodes to a
    /// zero address / zero tid.
    #[must_use]
    pub fn is_none(self) -> bool {
        if self.0 & TAG_BIT == 0 {
            self.0 == 0
        } else {
            self.0 >> 1 == 0
        }
    }

    /// The free function, if this is the function-pointer variant and its
    /// address is non-zero.
    #[must_use]
    pub fn as_free_fn(self) -> Option<FreeFn> {
        if self.0 != 0 && self.0 & TAG_BIT == 0 {
            // SAFETY: only ever constructed from a real `FreeFn` in
            // `from_free_fn`, and the tag bit distinguishes this variant
            // from the tid encoding.
            Some(unsafe { core::mem::transmute::<usize, FreeFn>(self.0) })
        } else {
            None
        }
    }

    /// The owner tid, if this is the tid variant and the tid is non-zero.
    #[must_use]
    pub fn as_tid(self) -> Option<u32> {
        if self.0 & TAG_BIT != 0 && self.0 >> 1 != 0 {
            Some((self.0 >> 1) as u32)
        } else {
            None
        }
    }
}

impl fmt::Debug for TaggedFreeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            write!(f, "TaggedFreeInfo::NONE")
        } else if let Some(tid) = self.as_tid() {
            write!(f, "TaggedFreeInfo::Tid({tid})")
        } else {
            write!(f, "TaggedFreeInfo::FreeFn({:#x})", self.0)
        }
    }
}
