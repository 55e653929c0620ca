// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Shared control-data page layout.
//!
//! The driver maps one page into both its own and the test context's address
//! space. Before spawning the context's initial thread it writes everything
//! the context needs to operate: the test's name and priority, the fixed
//! handle assignments, and the leased memory-block inventory. The context
//! treats the page as read-mostly; nothing it writes back can extend its own
//! privileges because the driver never reads handle slots from it.

use crate::types::CapSlot;

/// Page size shared by driver and contexts.
pub const PAGE_SIZE: u64 = 4096;

/// Maximum test name length in bytes.
pub const MAX_TEST_NAME_LEN: usize = 64;

/// Maximum number of leasable memory blocks in the resource pool.
pub const MAX_POOL_BLOCKS: usize = 32;

/// Metadata for one leased memory block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(C)]
pub struct BlockInfo {
    /// Handle slot (in the context's handle space) holding the block.
    pub slot: u64,
    /// Size of the block in bits (size = 1 << `size_bits`).
    pub size_bits: u64,
}

impl BlockInfo {
    /// An empty table entry.
    pub const EMPTY: Self = Self {
        slot: 0,
        size_bits: 0,
    };
}

/// The shared control-data page.
///
/// `repr(C)` so the layout is identical on both sides of the boundary. The
/// whole structure must fit in one page (asserted below).
#[derive(Clone, Copy)]
#[repr(C)]
pub struct ControlBlock {
    name: [u8; MAX_TEST_NAME_LEN],
    name_len: u64,
    /// Priority the context's initial thread runs at.
    pub priority: u64,
    /// Size of the context's handle space in bits.
    pub cspace_size_bits: u64,
    /// First slot the context's private allocator may hand out.
    pub first_free_slot: u64,
    /// Slot of the endpoint back to the driver.
    pub supervisor_endpoint: u64,
    /// Slot of the timing-service endpoint.
    pub timer_endpoint: u64,
    /// Number of valid entries in `blocks`.
    pub block_count: u64,
    /// Leased memory-block inventory, slot-ascending.
    pub blocks: [BlockInfo; MAX_POOL_BLOCKS],
}

const _: () = assert!(core::mem::size_of::<ControlBlock>() <= PAGE_SIZE as usize);

/// Error writing into the control block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlError {
    /// Test name exceeds `MAX_TEST_NAME_LEN`.
    NameTooLong,
    /// Block table is full.
    TooManyBlocks,
}

impl ControlBlock {
    /// Creates an empty control block with the fixed slot assignments.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            name: [0; MAX_TEST_NAME_LEN],
            name_len: 0,
            priority: 0,
            cspace_size_bits: 0,
            first_free_slot: CapSlot::FIRST_FREE.as_u64(),
            supervisor_endpoint: CapSlot::SUPERVISOR_ENDPOINT.as_u64(),
            timer_endpoint: CapSlot::TIMER_ENDPOINT.as_u64(),
            block_count: 0,
            blocks: [BlockInfo::EMPTY; MAX_POOL_BLOCKS],
        }
    }

    /// Writes the current test's name.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::NameTooLong` if the name does not fit the
    /// fixed buffer.
    pub const fn set_name(&mut self, name: &str) -> Result<(), ControlError> {
        let bytes = name.as_bytes();
        if bytes.len() > MAX_TEST_NAME_LEN {
            return Err(ControlError::NameTooLong);
        }
        // Clear the previous name so stale bytes never leak between tests.
        self.name = [0; MAX_TEST_NAME_LEN];
        let mut i = 0;
        while i < bytes.len() {
            self.name[i] = bytes[i];
            i += 1;
        }
        self.name_len = bytes.len() as u64;
        Ok(())
    }

    /// Returns the current test's name.
    #[must_use]
    pub fn name(&self) -> &str {
        let len = (self.name_len as usize).min(MAX_TEST_NAME_LEN);
        core::str::from_utf8(&self.name[..len]).unwrap_or("")
    }

    /// Appends a leased block to the inventory table.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::TooManyBlocks` if the table is full.
    pub const fn push_block(&mut self, slot: CapSlot, size_bits: u8) -> Result<(), ControlError> {
        let count = self.block_count as usize;
        if count >= MAX_POOL_BLOCKS {
            return Err(ControlError::TooManyBlocks);
        }
        self.blocks[count] = BlockInfo {
            slot: slot.as_u64(),
            size_bits: size_bits as u64,
        };
        self.block_count += 1;
        Ok(())
    }

    /// Clears the block inventory table.
    pub const fn clear_blocks(&mut self) {
        self.block_count = 0;
        self.blocks = [BlockInfo::EMPTY; MAX_POOL_BLOCKS];
    }
}

impl Default for ControlBlock {
    fn default() -> Self {
        Self::new()
    }
}
