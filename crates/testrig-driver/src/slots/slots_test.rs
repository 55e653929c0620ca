// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Tests for the slot allocator.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::*;

fn slot(n: u64) -> CapSlot {
    CapSlot::new(n)
}

#[test]
fn new_allocator() {
    let alloc = SlotAllocator::new(slot(100), slot(200));
    assert_eq!(alloc.remaining(), 100);
    assert!(!alloc.is_exhausted());
}

#[test]
fn alloc_single() {
    let mut alloc = SlotAllocator::new(slot(10), slot(13));

    assert_eq!(alloc.alloc(), Some(slot(10)));
    assert_eq!(alloc.alloc(), Some(slot(11)));
    assert_eq!(alloc.alloc(), Some(slot(12)));
    assert_eq!(alloc.alloc(), None);
    assert!(alloc.is_exhausted());
}

#[test]
fn alloc_range() {
    let mut alloc = SlotAllocator::new(slot(0), slot(10));

    assert_eq!(alloc.alloc_range(3), Some(slot(0)));
    assert_eq!(alloc.remaining(), 7);

    assert_eq!(alloc.alloc_range(5), Some(slot(3)));
    assert_eq!(alloc.remaining(), 2);

    assert_eq!(alloc.alloc_range(3), None); // Not enough
    assert_eq!(alloc.remaining(), 2);

    assert_eq!(alloc.alloc_range(2), Some(slot(8)));
    assert!(alloc.is_exhausted());
}

#[test]
fn alloc_range_zero() {
    let mut alloc = SlotAllocator::new(slot(5), slot(10));
    assert_eq!(alloc.alloc_range(0), Some(slot(5)));
    assert_eq!(alloc.remaining(), 5); // No change
}

#[test]
fn empty_allocator() {
    let mut alloc = SlotAllocator::new(slot(0), slot(0));
    assert!(alloc.is_exhausted());
    assert_eq!(alloc.remaining(), 0);
    assert_eq!(alloc.alloc(), None);
}

#[test]
fn mark_and_reset() {
    let mut alloc = SlotAllocator::new(slot(0), slot(10));
    let _ = alloc.alloc();

    let mark = alloc.mark();
    assert_eq!(alloc.alloc(), Some(slot(1)));
    assert_eq!(alloc.alloc_range(4), Some(slot(2)));
    assert_eq!(alloc.remaining(), 4);

    alloc.reset_to(mark);
    assert_eq!(alloc.remaining(), 9);
    // Slots handed out after the mark come back in the same order
    assert_eq!(alloc.alloc(), Some(slot(1)));
}

#[test]
fn reset_to_stale_mark_is_ignored() {
    let mut alloc = SlotAllocator::new(slot(0), slot(10));
    let _ = alloc.alloc_range(5);
    let mark = alloc.mark();

    alloc.reset_to(SlotMark(8));
    assert_eq!(alloc.mark(), mark); // Position unchanged

    // A mark equal to the current position is a no-op as well
    alloc.reset_to(mark);
    assert_eq!(alloc.remaining(), 5);
}

#[test]
fn repeated_setup_teardown_cycles_are_stable() {
    let mut alloc = SlotAllocator::new(slot(0), slot(16));
    let mark = alloc.mark();

    for _ in 0..100 {
        // Each "test" leases a handful of slots and gives them back
        assert_eq!(alloc.alloc(), Some(slot(0)));
        assert_eq!(alloc.alloc_range(6), Some(slot(1)));
        alloc.reset_to(mark);
    }
    assert_eq!(alloc.remaining(), 16);
}
