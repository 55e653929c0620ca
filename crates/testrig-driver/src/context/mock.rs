// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Mock kernel-object operations for host tests.

use super::{ContextError, ContextHandles, ContextOps};
use crate::slots::SlotAllocator;
use std::vec::Vec;
use testrig_abi::CapSlot;
use testrig_abi::control::ControlBlock;

/// One recorded kernel operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MockOp {
    CreateAddressSpace(CapSlot),
    CreateHandleSpace(CapSlot, u8),
    CreateThread(CapSlot),
    CreateEndpoint(CapSlot),
    InstallHandle {
        handle_space: CapSlot,
        src: CapSlot,
        dest: CapSlot,
    },
    MapControlPage {
        frame: CapSlot,
        vaddr: u64,
    },
    UnmapControlPage(CapSlot),
    Spawn {
        thread: CapSlot,
        endpoint_slot: CapSlot,
        control_vaddr: u64,
        priority: u8,
    },
    Destroy,
}

/// Which operation the mock should fail at.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MockFailure {
    AddressSpace,
    HandleSpace,
    Thread,
    Endpoint,
    Install,
    Map,
    Unmap,
    Spawn,
    Destroy,
}

/// Records every operation; optionally fails one of them.
pub struct MockOps {
    /// Every operation performed, in order.
    pub log: Vec<MockOp>,
    /// The operation kind to fail, if any.
    pub fail: Option<MockFailure>,
    /// The control block captured by the last `map_control_page`.
    pub last_control: Option<ControlBlock>,
}

impl MockOps {
    /// Creates a mock that succeeds at everything.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            log: Vec::new(),
            fail: None,
            last_control: None,
        }
    }

    /// Creates a mock that fails the given operation kind.
    #[must_use]
    pub const fn failing(fail: MockFailure) -> Self {
        Self {
            log: Vec::new(),
            fail: Some(fail),
            last_control: None,
        }
    }

    fn should_fail(&self, kind: MockFailure) -> bool {
        self.fail == Some(kind)
    }
}

impl Default for MockOps {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextOps for MockOps {
    fn create_address_space(&mut self, slots: &mut SlotAllocator) -> Result<CapSlot, ContextError> {
        if self.should_fail(MockFailure::AddressSpace) {
            return Err(ContextError::ObjectCreation);
        }
        let slot = slots.alloc().ok_or(ContextError::OutOfSlots)?;
        self.log.push(MockOp::CreateAddressSpace(slot));
        Ok(slot)
    }

    fn create_handle_space(
        &mut self,
        slots: &mut SlotAllocator,
        size_bits: u8,
    ) -> Result<CapSlot, ContextError> {
        if self.should_fail(MockFailure::HandleSpace) {
            return Err(ContextError::ObjectCreation);
        }
        let slot = slots.alloc().ok_or(ContextError::OutOfSlots)?;
        self.log.push(MockOp::CreateHandleSpace(slot, size_bits));
        Ok(slot)
    }

    fn create_thread(&mut self, slots: &mut SlotAllocator) -> Result<CapSlot, ContextError> {
        if self.should_fail(MockFailure::Thread) {
            return Err(ContextError::ObjectCreation);
        }
        let slot = slots.alloc().ok_or(ContextError::OutOfSlots)?;
        self.log.push(MockOp::CreateThread(slot));
        Ok(slot)
    }

    fn create_endpoint(&mut self, slots: &mut SlotAllocator) -> Result<CapSlot, ContextError> {
        if self.should_fail(MockFailure::Endpoint) {
            return Err(ContextError::ObjectCreation);
        }
        let slot = slots.alloc().ok_or(ContextError::OutOfSlots)?;
        self.log.push(MockOp::CreateEndpoint(slot));
        Ok(slot)
    }

    fn install_handle(
        &mut self,
        handle_space: CapSlot,
        src: CapSlot,
        dest: CapSlot,
    ) -> Result<(), ContextError> {
        if self.should_fail(MockFailure::Install) {
            return Err(ContextError::InstallFailed);
        }
        self.log.push(MockOp::InstallHandle {
            handle_space,
            src,
            dest,
        });
        Ok(())
    }

    fn map_control_page(
        &mut self,
        slots: &mut SlotAllocator,
        _address_space: CapSlot,
        control: &ControlBlock,
        vaddr: u64,
    ) -> Result<CapSlot, ContextError> {
        if self.should_fail(MockFailure::Map) {
            return Err(ContextError::MappingFailed);
        }
        let frame = slots.alloc().ok_or(ContextError::OutOfSlots)?;
        self.last_control = Some(*control);
        self.log.push(MockOp::MapControlPage { frame, vaddr });
        Ok(frame)
    }

    fn unmap_control_page(&mut self, frame: CapSlot) -> Result<(), ContextError> {
        if self.should_fail(MockFailure::Unmap) {
            return Err(ContextError::MappingFailed);
        }
        self.log.push(MockOp::UnmapControlPage(frame));
        Ok(())
    }

    fn spawn(
        &mut self,
        handles: &ContextHandles,
        endpoint_slot: CapSlot,
        control_vaddr: u64,
        priority: u8,
    ) -> Result<(), ContextError> {
        if self.should_fail(MockFailure::Spawn) {
            return Err(ContextError::SpawnFailed);
        }
        self.log.push(MockOp::Spawn {
            thread: handles.thread,
            endpoint_slot,
            control_vaddr,
            priority,
        });
        Ok(())
    }

    fn destroy(&mut self, handles: &ContextHandles) -> Result<(), ContextError> {
        let _ = handles;
        if self.should_fail(MockFailure::Destroy) {
            return Err(ContextError::TeardownFailed);
        }
        self.log.push(MockOp::Destroy);
        Ok(())
    }
}
