// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Tests for the resource pool.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::*;
use proptest::prelude::*;
use std::vec::Vec;

fn small_pool() -> ResourcePool {
    let mut pool = ResourcePool::new(CapSlot::new(500), CapSlot::new(600));
    pool.add(CapSlot::new(10), 0x10000, 14).unwrap();
    pool.add(CapSlot::new(11), 0x20000, 12).unwrap();
    pool.add(CapSlot::new(12), 0x30000, 20).unwrap();
    pool.sort_by_size();
    pool
}

#[test]
fn block_desc_size() {
    let desc = BlockDesc {
        slot: CapSlot::new(1),
        paddr: 0,
        size_bits: 12,
        leased: false,
    };
    assert_eq!(desc.size(), 4096);
}

#[test]
fn add_and_sort() {
    let pool = small_pool();
    let bits: Vec<u8> = pool.blocks().map(|b| b.size_bits).collect();
    assert_eq!(bits, [20, 14, 12]); // Largest first
    assert_eq!(pool.block_count(), 3);
    assert_eq!(pool.total_size(), (1 << 20) + (1 << 14) + (1 << 12));
}

#[test]
fn add_overflow() {
    let mut pool = ResourcePool::new(CapSlot::NULL, CapSlot::NULL);
    for i in 0..testrig_abi::control::MAX_POOL_BLOCKS {
        pool.add(CapSlot::new(i as u64), 0, 12).unwrap();
    }
    assert_eq!(pool.add(CapSlot::new(999), 0, 12), Err(PoolError::Full));
}

#[test]
fn lease_marks_every_block() {
    let mut pool = small_pool();
    assert!(!pool.is_leased());

    let lease = pool.lease_all().unwrap();
    assert_eq!(lease.block_count(), 3);
    assert!(pool.is_leased());
    assert!(pool.blocks().all(|b| b.leased));

    pool.reclaim(lease);
    assert!(!pool.is_leased());
    assert!(pool.blocks().all(|b| !b.leased));
}

#[test]
fn double_lease_is_rejected() {
    let mut pool = small_pool();
    let lease = pool.lease_all().unwrap();
    assert_eq!(pool.lease_all().unwrap_err(), PoolError::LeaseActive);
    pool.reclaim(lease);
    // After reclaim a fresh lease is fine again
    let lease = pool.lease_all().unwrap();
    pool.reclaim(lease);
}

#[test]
fn add_during_lease_is_rejected() {
    let mut pool = small_pool();
    let lease = pool.lease_all().unwrap();
    assert_eq!(
        pool.add(CapSlot::new(99), 0, 12),
        Err(PoolError::LeaseActive)
    );
    pool.reclaim(lease);
}

#[test]
fn reclaim_restores_pre_lease_state() {
    let mut pool = small_pool();
    let before = pool.snapshot();

    let lease = pool.lease_all().unwrap();
    pool.reclaim(lease);

    assert_eq!(pool.snapshot(), before);
}

#[test]
fn slot_range_is_preserved() {
    let pool = small_pool();
    assert_eq!(pool.slot_range(), (CapSlot::new(500), CapSlot::new(600)));
}

proptest! {
    /// The lease/reclaim cycle is idempotent for any inventory: after any
    /// number of cycles the descriptor table is exactly the populated one.
    #[test]
    fn lease_reclaim_cycle_is_idempotent(
        specs in prop::collection::vec((0u64..1 << 40, 12u8..30), 0..testrig_abi::control::MAX_POOL_BLOCKS),
        cycles in 1usize..8,
    ) {
        let mut pool = ResourcePool::new(CapSlot::new(100), CapSlot::new(200));
        for (i, (paddr, size_bits)) in specs.iter().enumerate() {
            pool.add(CapSlot::new(i as u64), *paddr, *size_bits).unwrap();
        }
        pool.sort_by_size();
        let before = pool.snapshot();

        for _ in 0..cycles {
            let lease = pool.lease_all().unwrap();
            prop_assert_eq!(lease.block_count(), specs.len());
            pool.reclaim(lease);
        }

        prop_assert_eq!(pool.snapshot(), before);
    }

    /// Sorting is stable in the sense that the result is always
    /// non-increasing by size class, whatever the insertion order.
    #[test]
    fn sort_is_largest_first(
        specs in prop::collection::vec(12u8..30, 0..testrig_abi::control::MAX_POOL_BLOCKS),
    ) {
        let mut pool = ResourcePool::new(CapSlot::NULL, CapSlot::NULL);
        for (i, size_bits) in specs.iter().enumerate() {
            pool.add(CapSlot::new(i as u64), 0, *size_bits).unwrap();
        }
        pool.sort_by_size();

        let bits: Vec<u8> = pool.blocks().map(|b| b.size_bits).collect();
        for pair in bits.windows(2) {
            prop_assert!(pair[0] >= pair[1]);
        }
    }
}
