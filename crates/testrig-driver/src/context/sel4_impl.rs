// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! seL4 implementation of the context kernel-object operations.

use super::{ContextError, ContextHandles, ContextOps};
use crate::slots::SlotAllocator;
use sel4::cap_type::{CNode, Endpoint, Granule, Tcb, Untyped, VSpace};
use sel4::{Cap, CapRights, ObjectBlueprint, VmAttributes};
use testrig_abi::CapSlot;
use testrig_abi::control::{ControlBlock, PAGE_SIZE};

/// Depth of the driver's own root CNode.
const ROOT_CNODE_DEPTH: usize = 64;

/// Maximum number of untypeds reserved for driver-side object creation.
const MAX_DRIVER_UNTYPEDS: usize = 16;

/// Scratch address where frames are mapped while the driver writes them.
const TEMP_MAP_VADDR: u64 = 0x0000_7FFE_0000;

/// Kernel-object operations backed by seL4 system calls.
///
/// Object memory comes from a small set of untypeds reserved for the
/// driver at startup; the leasable pool is never consumed for the
/// driver's own objects. The kernel tracks each untyped's watermark, so
/// retypes are tried against the reserved untypeds in order until one
/// has room.
pub struct Sel4Ops {
    untypeds: [Option<CapSlot>; MAX_DRIVER_UNTYPEDS],
    untyped_count: usize,
    /// Entry point of the test image mapped into every context.
    entry_point: u64,
    /// Initial stack pointer for the context's thread.
    stack_top: u64,
    /// The driver's control endpoint; contexts get copies of it.
    shared_endpoint: Option<CapSlot>,
}

impl Sel4Ops {
    /// Creates the operations backend.
    #[must_use]
    pub const fn new(entry_point: u64, stack_top: u64) -> Self {
        Self {
            untypeds: [None; MAX_DRIVER_UNTYPEDS],
            untyped_count: 0,
            entry_point,
            stack_top,
            shared_endpoint: None,
        }
    }

    /// Sets the endpoint every context's control channel is derived from.
    pub const fn set_shared_endpoint(&mut self, slot: CapSlot) {
        self.shared_endpoint = Some(slot);
    }

    /// Reserves an untyped for driver-side object creation.
    ///
    /// # Errors
    ///
    /// Returns `ContextError::ObjectCreation` if the reservation table is
    /// full.
    pub const fn add_untyped(&mut self, slot: CapSlot) -> Result<(), ContextError> {
        if self.untyped_count >= MAX_DRIVER_UNTYPEDS {
            return Err(ContextError::ObjectCreation);
        }
        self.untypeds[self.untyped_count] = Some(slot);
        self.untyped_count += 1;
        Ok(())
    }

    /// Creates one kernel object from the reserved untypeds.
    ///
    /// Used at startup to mint the driver's own endpoint, reply and
    /// notification objects.
    ///
    /// # Errors
    ///
    /// Returns `ContextError::OutOfSlots` or `ContextError::ObjectCreation`
    /// when no slot or no untyped with room is left.
    pub fn create_object(
        &mut self,
        slots: &mut SlotAllocator,
        blueprint: &ObjectBlueprint,
    ) -> Result<CapSlot, ContextError> {
        self.retype(slots, blueprint)
    }

    /// Retypes one object into a fresh driver slot.
    fn retype(
        &mut self,
        slots: &mut SlotAllocator,
        blueprint: &ObjectBlueprint,
    ) -> Result<CapSlot, ContextError> {
        let dest = slots.alloc().ok_or(ContextError::OutOfSlots)?;
        let cnode = sel4::init_thread::slot::CNODE.cap();

        for entry in self.untypeds.iter().flatten() {
            let untyped: Cap<Untyped> = Cap::from_bits(entry.as_u64());
            if untyped
                .untyped_retype(
                    blueprint,
                    &cnode.absolute_cptr_for_self(),
                    dest.as_usize(),
                    1,
                )
                .is_ok()
            {
                return Ok(dest);
            }
        }

        sel4::debug_println!("Context: no reserved untyped can hold {:?}", blueprint);
        Err(ContextError::ObjectCreation)
    }
}

impl ContextOps for Sel4Ops {
    fn create_address_space(&mut self, slots: &mut SlotAllocator) -> Result<CapSlot, ContextError> {
        #[cfg(target_arch = "aarch64")]
        let blueprint = ObjectBlueprint::Arch(sel4::ObjectBlueprintArch::SeL4Arch(
            sel4::ObjectBlueprintAArch64::VSpace,
        ));
        #[cfg(target_arch = "x86_64")]
        let blueprint = ObjectBlueprint::Arch(sel4::ObjectBlueprintArch::SeL4Arch(
            sel4::ObjectBlueprintX64::PML4,
        ));

        let slot = self.retype(slots, &blueprint)?;

        let vspace: Cap<VSpace> = Cap::from_bits(slot.as_u64());
        let asid_pool = sel4::init_thread::slot::ASID_POOL.cap();
        asid_pool.asid_pool_assign(vspace).map_err(|e| {
            sel4::debug_println!("Context: ASID assignment failed: {:?}", e);
            ContextError::ObjectCreation
        })?;

        Ok(slot)
    }

    fn create_handle_space(
        &mut self,
        slots: &mut SlotAllocator,
        size_bits: u8,
    ) -> Result<CapSlot, ContextError> {
        let blueprint = ObjectBlueprint::CNode {
            size_bits: size_bits as usize,
        };
        self.retype(slots, &blueprint)
    }

    fn create_thread(&mut self, slots: &mut SlotAllocator) -> Result<CapSlot, ContextError> {
        self.retype(slots, &ObjectBlueprint::Tcb)
    }

    fn create_endpoint(&mut self, slots: &mut SlotAllocator) -> Result<CapSlot, ContextError> {
        // Contexts talk to the driver over a copy of the driver's own
        // endpoint, so one receive loop hears every context. Interrupt
        // notifications carry a non-zero badge; IPC from the context
        // arrives unbadged.
        let shared = self.shared_endpoint.ok_or(ContextError::ObjectCreation)?;
        let dest = slots.alloc().ok_or(ContextError::OutOfSlots)?;
        let cnode = sel4::init_thread::slot::CNODE.cap();
        let src = cnode.absolute_cptr_from_bits_with_depth(shared.as_u64(), ROOT_CNODE_DEPTH);
        let dst = cnode.absolute_cptr_from_bits_with_depth(dest.as_u64(), ROOT_CNODE_DEPTH);
        dst.copy(&src, CapRights::all()).map_err(|e| {
            sel4::debug_println!("Context: endpoint copy failed: {:?}", e);
            ContextError::ObjectCreation
        })?;
        Ok(dest)
    }

    fn install_handle(
        &mut self,
        handle_space: CapSlot,
        src: CapSlot,
        dest: CapSlot,
    ) -> Result<(), ContextError> {
        let src = sel4::init_thread::slot::CNODE
            .cap()
            .absolute_cptr_from_bits_with_depth(src.as_u64(), ROOT_CNODE_DEPTH);
        let child_cnode: Cap<CNode> = Cap::from_bits(handle_space.as_u64());
        // The context's handle space is a single-level CNode, so the slot
        // is addressed at the CNode's own depth.
        let child_dst = child_cnode.absolute_cptr_from_bits_with_depth(
            dest.as_u64(),
            crate::driver::CONTEXT_CSPACE_SIZE_BITS as usize,
        );
        child_dst.copy(&src, CapRights::all()).map_err(|e| {
            sel4::debug_println!("Context: handle copy to slot {} failed: {:?}", dest, e);
            ContextError::InstallFailed
        })
    }

    fn map_control_page(
        &mut self,
        slots: &mut SlotAllocator,
        address_space: CapSlot,
        control: &ControlBlock,
        vaddr: u64,
    ) -> Result<CapSlot, ContextError> {
        #[cfg(target_arch = "aarch64")]
        let frame_blueprint = ObjectBlueprint::Arch(sel4::ObjectBlueprintArch::SmallPage);
        #[cfg(target_arch = "x86_64")]
        let frame_blueprint = ObjectBlueprint::Arch(sel4::ObjectBlueprintArch::_4k);

        let frame_slot = self.retype(slots, &frame_blueprint)?;
        let frame: Cap<Granule> = Cap::from_bits(frame_slot.as_u64());

        // Write the control block through a temporary mapping in the
        // driver's own address space.
        let root_vspace = sel4::init_thread::slot::VSPACE.cap();
        frame
            .frame_map(
                root_vspace,
                TEMP_MAP_VADDR as usize,
                CapRights::read_write(),
                VmAttributes::default(),
            )
            .map_err(|e| {
                sel4::debug_println!("Context: temp control page map failed: {:?}", e);
                ContextError::MappingFailed
            })?;

        // SAFETY: The frame was just mapped read-write at TEMP_MAP_VADDR
        // and ControlBlock is repr(C) and smaller than one page.
        unsafe {
            let dst = TEMP_MAP_VADDR as *mut ControlBlock;
            core::ptr::write_bytes(TEMP_MAP_VADDR as *mut u8, 0, PAGE_SIZE as usize);
            dst.write(*control);
        }

        frame.frame_unmap().map_err(|e| {
            sel4::debug_println!("Context: temp control page unmap failed: {:?}", e);
            ContextError::MappingFailed
        })?;

        // Map read-only into the context; a page table for the address
        // is created on demand.
        let vspace: Cap<VSpace> = Cap::from_bits(address_space.as_u64());
        let map = || {
            frame.frame_map(
                vspace,
                vaddr as usize,
                CapRights::read_only(),
                VmAttributes::default(),
            )
        };
        if map().is_err() {
            let table_slot = self.retype(slots, &ObjectBlueprint::Arch(sel4::ObjectBlueprintArch::PT))?;
            let table: Cap<sel4::cap_type::PT> = Cap::from_bits(table_slot.as_u64());
            table
                .pt_map(vspace, vaddr as usize, VmAttributes::default())
                .map_err(|e| {
                    sel4::debug_println!("Context: page table map failed: {:?}", e);
                    ContextError::MappingFailed
                })?;
            map().map_err(|e| {
                sel4::debug_println!("Context: control page map failed: {:?}", e);
                ContextError::MappingFailed
            })?;
        }

        Ok(frame_slot)
    }

    fn unmap_control_page(&mut self, frame: CapSlot) -> Result<(), ContextError> {
        let frame: Cap<Granule> = Cap::from_bits(frame.as_u64());
        frame.frame_unmap().map_err(|e| {
            sel4::debug_println!("Context: control page unmap failed: {:?}", e);
            ContextError::MappingFailed
        })
    }

    fn spawn(
        &mut self,
        handles: &ContextHandles,
        endpoint_slot: CapSlot,
        control_vaddr: u64,
        priority: u8,
    ) -> Result<(), ContextError> {
        let tcb: Cap<Tcb> = Cap::from_bits(handles.thread.as_u64());
        let cspace: Cap<CNode> = Cap::from_bits(handles.handle_space.as_u64());
        let vspace: Cap<VSpace> = Cap::from_bits(handles.address_space.as_u64());
        let fault_ep: Cap<Endpoint> = Cap::from_bits(handles.endpoint.as_u64());

        tcb.tcb_configure(
            cspace,
            sel4::CNodeCapData::new(
                0,
                64 - crate::driver::CONTEXT_CSPACE_SIZE_BITS as usize,
            ),
            vspace,
            0, // no IPC buffer; the control channel uses message registers only
            Cap::from_bits(0),
        )
        .map_err(|e| {
            sel4::debug_println!("Context: TCB configure failed: {:?}", e);
            ContextError::SpawnFailed
        })?;

        tcb.tcb_set_sched_params(
            sel4::init_thread::slot::TCB.cap(),
            u64::from(priority),
            u64::from(priority),
            sel4::init_thread::slot::SCHED_CONTEXT.cap(),
            fault_ep,
        )
        .map_err(|e| {
            sel4::debug_println!("Context: TCB sched params failed: {:?}", e);
            ContextError::SpawnFailed
        })?;

        let mut regs = sel4::UserContext::default();
        #[cfg(target_arch = "aarch64")]
        {
            *regs.pc_mut() = self.entry_point;
            *regs.sp_mut() = self.stack_top;
            *regs.gpr_mut(0) = endpoint_slot.as_u64();
            *regs.gpr_mut(1) = control_vaddr;
        }
        #[cfg(target_arch = "x86_64")]
        {
            *regs.pc_mut() = self.entry_point;
            *regs.sp_mut() = self.stack_top;
            *regs.c_param_mut(0) = endpoint_slot.as_u64();
            *regs.c_param_mut(1) = control_vaddr;
        }
        tcb.tcb_write_all_registers(false, &mut regs).map_err(|e| {
            sel4::debug_println!("Context: TCB write registers failed: {:?}", e);
            ContextError::SpawnFailed
        })?;

        tcb.tcb_resume().map_err(|e| {
            sel4::debug_println!("Context: TCB resume failed: {:?}", e);
            ContextError::SpawnFailed
        })
    }

    fn destroy(&mut self, handles: &ContextHandles) -> Result<(), ContextError> {
        let cnode = sel4::init_thread::slot::CNODE.cap();
        let mut failed = false;

        for slot in [
            handles.thread,
            handles.endpoint,
            handles.handle_space,
            handles.address_space,
            handles.control_frame,
        ] {
            let cptr =
                cnode.absolute_cptr_from_bits_with_depth(slot.as_u64(), ROOT_CNODE_DEPTH);
            // Revoke kills every derived copy (including everything the
            // test minted for itself), then the object itself is deleted.
            if cptr.revoke().is_err() || cptr.delete().is_err() {
                sel4::debug_println!("Context: revoke/delete of slot {} failed", slot);
                failed = true;
            }
        }

        if failed {
            return Err(ContextError::TeardownFailed);
        }
        Ok(())
    }
}
