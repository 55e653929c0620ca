// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Leasable resource pool.
//!
//! A fixed inventory of memory blocks (by size class) plus a capability-slot
//! range, populated once at startup. Blocks are leased out whole to exactly
//! one execution context at a time and reclaimed (revoked, never freed)
//! before the next context is created, so every test observes the same
//! pristine inventory.

use testrig_abi::CapSlot;
use testrig_abi::control::MAX_POOL_BLOCKS;

/// Descriptor for a single leasable memory block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockDesc {
    /// Driver-side capability slot holding the block.
    pub slot: CapSlot,
    /// Physical address of the block.
    pub paddr: u64,
    /// Size of the block in bits (size = 1 << `size_bits`).
    pub size_bits: u8,
    /// Whether the block is currently leased to a context.
    pub leased: bool,
}

impl BlockDesc {
    /// Returns the total size of this block.
    #[must_use]
    pub const fn size(&self) -> u64 {
        1 << self.size_bits
    }
}

/// Error from pool operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PoolError {
    /// The fixed descriptor table is full.
    Full,
    /// A lease is already outstanding.
    LeaseActive,
}

/// Proof that the pool's blocks are leased out.
///
/// Returned by [`ResourcePool::lease_all`] and consumed by
/// [`ResourcePool::reclaim`]; holding it is the only way to end the lease,
/// which keeps the lease/reclaim cycle scoped to exactly one test.
#[derive(Debug)]
#[must_use]
pub struct PoolLease {
    block_count: usize,
}

impl PoolLease {
    /// Number of blocks covered by this lease.
    #[must_use]
    pub const fn block_count(&self) -> usize {
        self.block_count
    }
}

/// The fixed-size inventory of leasable blocks.
pub struct ResourcePool {
    /// Block descriptors, sorted by size (largest first).
    blocks: [Option<BlockDesc>; MAX_POOL_BLOCKS],
    /// Number of valid entries.
    count: usize,
    /// Capability-slot range `[start, end)` reserved for contexts.
    slot_start: CapSlot,
    slot_end: CapSlot,
    /// Whether a lease is outstanding.
    lease_active: bool,
}

impl ResourcePool {
    /// Creates a new empty pool owning the given context slot range.
    #[must_use]
    pub const fn new(slot_start: CapSlot, slot_end: CapSlot) -> Self {
        Self {
            blocks: [None; MAX_POOL_BLOCKS],
            count: 0,
            slot_start,
            slot_end,
            lease_active: false,
        }
    }

    /// Adds a block to the inventory.
    ///
    /// Only valid during startup population, before the first lease.
    ///
    /// # Errors
    ///
    /// Returns `PoolError::Full` if the descriptor table is full, or
    /// `PoolError::LeaseActive` if blocks are currently leased out.
    pub const fn add(&mut self, slot: CapSlot, paddr: u64, size_bits: u8) -> Result<(), PoolError> {
        if self.lease_active {
            return Err(PoolError::LeaseActive);
        }
        if self.count >= MAX_POOL_BLOCKS {
            return Err(PoolError::Full);
        }
        self.blocks[self.count] = Some(BlockDesc {
            slot,
            paddr,
            size_bits,
            leased: false,
        });
        self.count += 1;
        Ok(())
    }

    /// Creates a pool from seL4 bootinfo untypeds.
    ///
    /// Device untypeds are skipped; they belong to the RPC inventory, not
    /// the leasable pool. The first `reserve` non-device untypeds are also
    /// skipped - those feed the driver's own kernel-object creation.
    #[cfg(feature = "sel4")]
    #[must_use]
    pub fn from_bootinfo(
        bootinfo: &sel4::BootInfoPtr,
        slot_start: CapSlot,
        slot_end: CapSlot,
        reserve: usize,
    ) -> Self {
        let mut pool = Self::new(slot_start, slot_end);
        let mut reserved = 0;

        for (i, desc) in bootinfo.untyped_list().iter().enumerate() {
            if desc.is_device() {
                continue;
            }
            if reserved < reserve {
                reserved += 1;
                continue;
            }
            let slot = CapSlot::new((bootinfo.untyped().start() + i) as u64);
            if pool.add(slot, desc.paddr() as u64, desc.size_bits() as u8).is_err() {
                break; // Full
            }
        }

        pool.sort_by_size();
        pool
    }

    /// Sorts blocks by size (largest first).
    ///
    /// Called once after population so contexts always see the inventory in
    /// the same order.
    pub fn sort_by_size(&mut self) {
        // Simple insertion sort - MAX_POOL_BLOCKS is small
        for i in 1..self.count {
            let mut j = i;
            while j > 0 {
                let curr_bits = self.blocks[j].map_or(0, |b| b.size_bits);
                let prev_bits = self.blocks[j - 1].map_or(0, |b| b.size_bits);
                if curr_bits > prev_bits {
                    self.blocks.swap(j, j - 1);
                    j -= 1;
                } else {
                    break;
                }
            }
        }
    }

    /// Leases every block to the next execution context.
    ///
    /// # Errors
    ///
    /// Returns `PoolError::LeaseActive` if a lease is already outstanding -
    /// at most one context exists at a time, so this is a driver bug.
    pub fn lease_all(&mut self) -> Result<PoolLease, PoolError> {
        if self.lease_active {
            return Err(PoolError::LeaseActive);
        }
        for block in self.blocks[..self.count].iter_mut().flatten() {
            block.leased = true;
        }
        self.lease_active = true;
        Ok(PoolLease {
            block_count: self.count,
        })
    }

    /// Reclaims all leased blocks.
    ///
    /// Unconditional: runs whether the test passed, failed, faulted, or
    /// aborted. The caller revokes the handles; this resets the ownership
    /// flags so the inventory is identical to its pre-lease state.
    pub fn reclaim(&mut self, lease: PoolLease) {
        let _ = lease;
        for block in self.blocks[..self.count].iter_mut().flatten() {
            block.leased = false;
        }
        self.lease_active = false;
    }

    /// Returns the block descriptors in inventory order.
    pub fn blocks(&self) -> impl Iterator<Item = &BlockDesc> {
        self.blocks[..self.count].iter().flatten()
    }

    /// Number of blocks in the inventory.
    #[must_use]
    pub const fn block_count(&self) -> usize {
        self.count
    }

    /// Returns the context capability-slot range `(start, end)`.
    #[must_use]
    pub const fn slot_range(&self) -> (CapSlot, CapSlot) {
        (self.slot_start, self.slot_end)
    }

    /// Returns true if a lease is outstanding.
    #[must_use]
    pub const fn is_leased(&self) -> bool {
        self.lease_active
    }

    /// Snapshot of the descriptor table, for invariant checks.
    #[must_use]
    pub const fn snapshot(&self) -> [Option<BlockDesc>; MAX_POOL_BLOCKS] {
        self.blocks
    }

    /// Returns the total size of all blocks in the inventory.
    #[must_use]
    pub fn total_size(&self) -> u64 {
        let mut total = 0u64;
        for block in self.blocks[..self.count].iter().flatten() {
            total = total.saturating_add(block.size());
        }
        total
    }
}

#[cfg(test)]
mod pool_test;
