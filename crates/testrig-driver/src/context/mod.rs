// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Execution-context lifecycle.
//!
//! Each isolated test runs in its own execution context: a fresh address
//! space, a fresh handle space with a fixed layout, one thread, and one
//! endpoint back to the driver. Setup builds the context and leases the
//! whole resource pool to it; teardown revokes everything and rolls the
//! driver's allocators back, unconditionally, so the next test starts from
//! an identical world.
//!
//! Kernel-object operations go through the [`ContextOps`] seam so the
//! lifecycle logic itself runs in host tests against [`MockOps`].

use crate::pool::{PoolLease, ResourcePool};
use crate::slots::{SlotAllocator, SlotMark};
use testrig_abi::control::{ControlBlock, ControlError};
use testrig_abi::{CapSlot, ContextId};

#[cfg(feature = "sel4")]
mod sel4_impl;

#[cfg(feature = "sel4")]
pub use sel4_impl::Sel4Ops;

/// Virtual address the control page is mapped at inside every context.
pub const CONTROL_PAGE_VADDR: u64 = 0x0000_7FFF_F000;

/// Error during context lifecycle operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContextError {
    /// A context already exists; at most one is allowed at a time.
    AlreadyActive,
    /// Out of capability slots.
    OutOfSlots,
    /// Kernel object creation failed.
    ObjectCreation,
    /// Mapping the control page failed.
    MappingFailed,
    /// Handle installation failed.
    InstallFailed,
    /// Handle installs are frozen once the context is started.
    HandlesFrozen,
    /// The destination slot belongs to the context's private allocator.
    ReservedSlot,
    /// The test name does not fit the control page.
    NameTooLong,
    /// The resource pool is still leased out.
    PoolUnavailable,
    /// Starting the context's initial thread failed.
    SpawnFailed,
    /// Revoking or destroying a kernel object failed.
    TeardownFailed,
}

impl From<ControlError> for ContextError {
    fn from(err: ControlError) -> Self {
        match err {
            ControlError::NameTooLong => Self::NameTooLong,
            // Pool and block table share MAX_POOL_BLOCKS, so this cannot
            // happen for blocks coming from the pool.
            ControlError::TooManyBlocks => Self::InstallFailed,
        }
    }
}

impl core::fmt::Display for ContextError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let text = match self {
            Self::AlreadyActive => "context already active",
            Self::OutOfSlots => "out of capability slots",
            Self::ObjectCreation => "kernel object creation failed",
            Self::MappingFailed => "control page mapping failed",
            Self::InstallFailed => "handle installation failed",
            Self::HandlesFrozen => "handle installs are frozen",
            Self::ReservedSlot => "slot reserved for context allocator",
            Self::NameTooLong => "test name too long",
            Self::PoolUnavailable => "resource pool unavailable",
            Self::SpawnFailed => "spawn failed",
            Self::TeardownFailed => "teardown failed",
        };
        write!(f, "{text}")
    }
}

/// Driver-side capability slots of one context's kernel objects.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ContextHandles {
    /// The context's address space root.
    pub address_space: CapSlot,
    /// The context's handle space root.
    pub handle_space: CapSlot,
    /// The context's initial thread.
    pub thread: CapSlot,
    /// The endpoint the context talks to the driver on.
    pub endpoint: CapSlot,
    /// The frame backing the shared control page.
    pub control_frame: CapSlot,
}

/// Kernel-object operations needed by the context lifecycle.
///
/// All slots are driver-side. `install_handle` copies a driver-side
/// capability into the context's handle space at a fixed destination.
pub trait ContextOps {
    /// Creates an address space root.
    ///
    /// # Errors
    ///
    /// Returns an error if allocation or object creation fails.
    fn create_address_space(&mut self, slots: &mut SlotAllocator) -> Result<CapSlot, ContextError>;

    /// Creates a handle space root of the given size.
    ///
    /// # Errors
    ///
    /// Returns an error if allocation or object creation fails.
    fn create_handle_space(
        &mut self,
        slots: &mut SlotAllocator,
        size_bits: u8,
    ) -> Result<CapSlot, ContextError>;

    /// Creates the context's initial thread object.
    ///
    /// # Errors
    ///
    /// Returns an error if allocation or object creation fails.
    fn create_thread(&mut self, slots: &mut SlotAllocator) -> Result<CapSlot, ContextError>;

    /// Creates the context's endpoint to the driver.
    ///
    /// # Errors
    ///
    /// Returns an error if allocation or object creation fails.
    fn create_endpoint(&mut self, slots: &mut SlotAllocator) -> Result<CapSlot, ContextError>;

    /// Copies a driver-side capability into the context's handle space.
    ///
    /// # Errors
    ///
    /// Returns an error if the copy fails.
    fn install_handle(
        &mut self,
        handle_space: CapSlot,
        src: CapSlot,
        dest: CapSlot,
    ) -> Result<(), ContextError>;

    /// Allocates the control-page frame, writes the control block into it,
    /// and maps it into the context's address space.
    ///
    /// Returns the driver-side frame slot.
    ///
    /// # Errors
    ///
    /// Returns an error if allocation or mapping fails.
    fn map_control_page(
        &mut self,
        slots: &mut SlotAllocator,
        address_space: CapSlot,
        control: &ControlBlock,
        vaddr: u64,
    ) -> Result<CapSlot, ContextError>;

    /// Unmaps the control page from the context's address space.
    ///
    /// # Errors
    ///
    /// Returns an error if the unmap fails.
    fn unmap_control_page(&mut self, frame: CapSlot) -> Result<(), ContextError>;

    /// Configures and resumes the context's initial thread.
    ///
    /// The thread starts with the endpoint slot and the control-page
    /// address as its two arguments.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration or resume fails.
    fn spawn(
        &mut self,
        handles: &ContextHandles,
        endpoint_slot: CapSlot,
        control_vaddr: u64,
        priority: u8,
    ) -> Result<(), ContextError>;

    /// Revokes every capability derived from the context's objects and
    /// deletes the objects themselves.
    ///
    /// # Errors
    ///
    /// Returns an error if any revoke or delete fails.
    fn destroy(&mut self, handles: &ContextHandles) -> Result<(), ContextError>;
}

/// One live execution context.
///
/// Consumed by [`ContextManager::teardown`]; there is no other way to get
/// rid of it, which keeps setup and teardown paired.
#[must_use]
pub struct ExecutionContext {
    /// Context identifier, unique within the run.
    pub id: ContextId,
    /// Driver-side slots of the context's kernel objects.
    pub handles: ContextHandles,
    /// The control block as written to the shared page.
    pub control: ControlBlock,
    lease: PoolLease,
    mark: SlotMark,
    frozen: bool,
}

impl ExecutionContext {
    /// Whether handle installs are still allowed.
    #[must_use]
    pub const fn is_frozen(&self) -> bool {
        self.frozen
    }
}

impl core::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("id", &self.id)
            .field("handles", &self.handles)
            .field("frozen", &self.frozen)
            .finish_non_exhaustive()
    }
}

/// Creates and destroys execution contexts, one at a time.
pub struct ContextManager<O: ContextOps> {
    ops: O,
    /// Handle space size for new contexts, in bits.
    cspace_size_bits: u8,
    next_id: ContextId,
    active: bool,
}

impl<O: ContextOps> ContextManager<O> {
    /// Creates a context manager.
    #[must_use]
    pub const fn new(ops: O, cspace_size_bits: u8) -> Self {
        Self {
            ops,
            cspace_size_bits,
            next_id: ContextId::FIRST,
            active: false,
        }
    }

    /// Whether a context currently exists.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }

    /// Builds a fresh execution context for one test.
    ///
    /// Takes a slot mark first so a failed setup can always be rolled
    /// back, then creates the kernel objects, leases the whole pool,
    /// installs the fixed handle layout plus the block inventory, and maps
    /// the filled control page. The context is not running afterwards;
    /// [`Self::start`] does that.
    ///
    /// # Errors
    ///
    /// Returns `ContextError::AlreadyActive` if a context exists, or the
    /// first failing step's error. On error every side effect is undone.
    pub fn setup(
        &mut self,
        slots: &mut SlotAllocator,
        pool: &mut ResourcePool,
        test_name: &str,
        priority: u8,
    ) -> Result<ExecutionContext, ContextError> {
        if self.active {
            return Err(ContextError::AlreadyActive);
        }

        let mark = slots.mark();
        match self.build(slots, pool, test_name, priority, mark) {
            Ok(ctx) => {
                self.active = true;
                self.next_id = self.next_id.next();
                Ok(ctx)
            }
            Err(err) => {
                // Slots handed out during the failed attempt are dead; the
                // pool lease (if taken) was already reclaimed by build.
                slots.reset_to(mark);
                Err(err)
            }
        }
    }

    fn build(
        &mut self,
        slots: &mut SlotAllocator,
        pool: &mut ResourcePool,
        test_name: &str,
        priority: u8,
        mark: SlotMark,
    ) -> Result<ExecutionContext, ContextError> {
        let address_space = self.ops.create_address_space(slots)?;
        let handle_space = self.ops.create_handle_space(slots, self.cspace_size_bits)?;
        let thread = self.ops.create_thread(slots)?;
        let endpoint = self.ops.create_endpoint(slots)?;

        let mut control = ControlBlock::new();
        control.set_name(test_name)?;
        control.priority = u64::from(priority);
        control.cspace_size_bits = u64::from(self.cspace_size_bits);

        let lease = pool
            .lease_all()
            .map_err(|_| ContextError::PoolUnavailable)?;

        let result = self.install_fixed_handles(
            handle_space,
            &ContextHandles {
                address_space,
                handle_space,
                thread,
                endpoint,
                control_frame: CapSlot::NULL,
            },
            pool,
            &mut control,
        );
        if let Err(err) = result {
            pool.reclaim(lease);
            return Err(err);
        }

        let control_frame =
            match self
                .ops
                .map_control_page(slots, address_space, &control, CONTROL_PAGE_VADDR)
            {
                Ok(frame) => frame,
                Err(err) => {
                    pool.reclaim(lease);
                    return Err(err);
                }
            };

        Ok(ExecutionContext {
            id: self.next_id,
            handles: ContextHandles {
                address_space,
                handle_space,
                thread,
                endpoint,
                control_frame,
            },
            control,
            lease,
            mark,
            frozen: false,
        })
    }

    /// Installs the fixed handle layout and the leased block inventory.
    fn install_fixed_handles(
        &mut self,
        handle_space: CapSlot,
        handles: &ContextHandles,
        pool: &ResourcePool,
        control: &mut ControlBlock,
    ) -> Result<(), ContextError> {
        self.ops
            .install_handle(handle_space, handles.handle_space, CapSlot::CSPACE)?;
        self.ops
            .install_handle(handle_space, handles.address_space, CapSlot::VSPACE)?;
        self.ops
            .install_handle(handle_space, handles.thread, CapSlot::TCB_SELF)?;
        self.ops
            .install_handle(handle_space, handles.endpoint, CapSlot::SUPERVISOR_ENDPOINT)?;
        // Timer requests travel on the same channel, under a distinct slot
        self.ops
            .install_handle(handle_space, handles.endpoint, CapSlot::TIMER_ENDPOINT)?;

        for (i, block) in pool.blocks().enumerate() {
            let dest = CapSlot::BLOCKS_BASE.offset(i as u64);
            self.ops.install_handle(handle_space, block.slot, dest)?;
            control.push_block(dest, block.size_bits)?;
        }

        Ok(())
    }

    /// Installs an extra handle into a not-yet-started context.
    ///
    /// # Errors
    ///
    /// Returns `ContextError::HandlesFrozen` once the context is started,
    /// or `ContextError::ReservedSlot` for destinations at or above the
    /// context allocator's first free slot.
    pub fn install_handle(
        &mut self,
        ctx: &ExecutionContext,
        src: CapSlot,
        dest: CapSlot,
    ) -> Result<(), ContextError> {
        if ctx.frozen {
            return Err(ContextError::HandlesFrozen);
        }
        if dest.as_u64() >= CapSlot::FIRST_FREE.as_u64() {
            return Err(ContextError::ReservedSlot);
        }
        self.ops.install_handle(ctx.handles.handle_space, src, dest)
    }

    /// Starts the context's initial thread.
    ///
    /// Freezes handle installs first: from here on, slots at and above the
    /// first free slot belong to the context's private allocator and the
    /// driver never writes into the handle space again.
    ///
    /// # Errors
    ///
    /// Returns `ContextError::SpawnFailed` if the thread cannot be started.
    pub fn start(&mut self, ctx: &mut ExecutionContext) -> Result<(), ContextError> {
        ctx.frozen = true;
        self.ops.spawn(
            &ctx.handles,
            CapSlot::SUPERVISOR_ENDPOINT,
            CONTROL_PAGE_VADDR,
            ctx.control.priority as u8,
        )
    }

    /// Destroys a context and returns every resource to the driver.
    ///
    /// Unconditional: runs the same way whether the test passed, failed,
    /// faulted, or never started. The pool is reclaimed and the slot
    /// allocator rolled back even when a kernel operation fails; only the
    /// first such failure is reported.
    ///
    /// # Errors
    ///
    /// Returns the first failing kernel operation's error. Bookkeeping is
    /// restored regardless.
    pub fn teardown(
        &mut self,
        ctx: ExecutionContext,
        slots: &mut SlotAllocator,
        pool: &mut ResourcePool,
    ) -> Result<(), ContextError> {
        let mut first_err = None;

        if let Err(err) = self.ops.unmap_control_page(ctx.handles.control_frame) {
            first_err = first_err.or(Some(err));
        }
        if let Err(err) = self.ops.destroy(&ctx.handles) {
            first_err = first_err.or(Some(err));
        }

        pool.reclaim(ctx.lease);
        slots.reset_to(ctx.mark);
        self.active = false;

        match first_err {
            None => Ok(()),
            Some(_) => Err(ContextError::TeardownFailed),
        }
    }
}

#[cfg(any(test, feature = "std"))]
mod mock;

#[cfg(any(test, feature = "std"))]
pub use mock::{MockFailure, MockOp, MockOps};
