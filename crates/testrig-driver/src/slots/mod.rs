// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Capability slot allocator.
//!
//! The driver starts with a range of empty handle slots and hands them out
//! sequentially. Context setup takes a mark before allocating; teardown
//! rolls the allocator back to that mark after the context's handles have
//! been revoked, so the slot range never shrinks across the run.

use testrig_abi::CapSlot;

/// A rollback point taken before context setup.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[must_use]
pub struct SlotMark(u64);

/// Allocator for capability slots in the driver's handle space.
pub struct SlotAllocator {
    /// Next slot to allocate.
    next: u64,
    /// One past the last valid slot.
    end: u64,
}

impl SlotAllocator {
    /// Creates a new slot allocator for the given range.
    ///
    /// # Arguments
    ///
    /// * `start` - First available slot
    /// * `end` - One past the last available slot
    #[must_use]
    pub const fn new(start: CapSlot, end: CapSlot) -> Self {
        Self {
            next: start.as_u64(),
            end: end.as_u64(),
        }
    }

    /// Creates a slot allocator from seL4 bootinfo.
    #[cfg(feature = "sel4")]
    #[must_use]
    pub fn from_bootinfo(bootinfo: &sel4::BootInfoPtr) -> Self {
        let empty = bootinfo.empty();
        Self::new(
            CapSlot::new(empty.start() as u64),
            CapSlot::new(empty.end() as u64),
        )
    }

    /// Allocates a single capability slot.
    ///
    /// # Returns
    ///
    /// The slot, or `None` if no slots remain.
    pub const fn alloc(&mut self) -> Option<CapSlot> {
        if self.next < self.end {
            let slot = self.next;
            self.next += 1;
            Some(CapSlot::new(slot))
        } else {
            None
        }
    }

    /// Allocates a contiguous range of capability slots.
    ///
    /// # Arguments
    ///
    /// * `count` - Number of slots to allocate
    ///
    /// # Returns
    ///
    /// The first slot of the range, or `None` if not enough slots remain.
    pub fn alloc_range(&mut self, count: u64) -> Option<CapSlot> {
        if count == 0 {
            return Some(CapSlot::new(self.next));
        }
        let start = self.next;
        let new_next = start.checked_add(count)?;
        if new_next <= self.end {
            self.next = new_next;
            Some(CapSlot::new(start))
        } else {
            None
        }
    }

    /// Takes a rollback mark at the current allocation position.
    pub const fn mark(&self) -> SlotMark {
        SlotMark(self.next)
    }

    /// Rolls the allocator back to a previously taken mark.
    ///
    /// Slots allocated after the mark must have been revoked by the caller;
    /// they will be handed out again for the next context. A mark ahead of
    /// the current position is ignored.
    pub const fn reset_to(&mut self, mark: SlotMark) {
        if mark.0 <= self.next {
            self.next = mark.0;
        }
    }

    /// Returns the number of remaining slots.
    #[must_use]
    pub const fn remaining(&self) -> u64 {
        self.end.saturating_sub(self.next)
    }

    /// Returns true if no slots remain.
    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        self.next >= self.end
    }
}

#[cfg(test)]
mod slots_test;
