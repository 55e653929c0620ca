// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Root task entry point.
//!
//! Assembles every driver service from bootinfo, routes the platform timer
//! interrupt onto the control endpoint, and runs the shipped catalog. The
//! suite image doubles as the context image: every isolated test thread
//! starts at [`context_entry`].

#![no_std]
#![no_main]

use core::cell::UnsafeCell;
use core::fmt;
use sel4::cap_type::{Endpoint, IrqHandler, Notification, Reply};
use sel4::{Cap, CapRights, ObjectBlueprint};
use sel4_root_task::root_task;
use testrig_abi::CapSlot;
use testrig_abi::control::ControlBlock;
use testrig_abi::message::ResourceKind;
use testrig_abi::types::TestOutcome;
use testrig_driver::context::{ContextError, ContextManager, Sel4Ops};
use testrig_driver::dispatch::EndpointChannel;
use testrig_driver::driver::{CONTEXT_CSPACE_SIZE_BITS, Driver, DriverError, RunConfig};
use testrig_driver::pool::ResourcePool;
use testrig_driver::registry::TestEnv;
use testrig_driver::report::{Reporter, RunVerdict};
use testrig_driver::rpc::RpcService;
use testrig_driver::slots::SlotAllocator;
use testrig_driver::timer::{HardwareClock, TimerSubsystem};
use testrig_suite::{catalog, client};

/// Non-device untypeds reserved for the driver's own kernel objects.
const DRIVER_UNTYPEDS: usize = 4;

/// Capability slots set aside for execution contexts.
const CONTEXT_SLOT_WINDOW: u64 = 256;

/// Badge carried by the timer interrupt notification; badge bit `n` maps
/// to timer interrupt source `n`.
const TIMER_BADGE: u64 = 1;

/// Interrupt line of the platform timer.
#[cfg(target_arch = "aarch64")]
const TIMER_IRQ: u64 = 27;
#[cfg(target_arch = "x86_64")]
const TIMER_IRQ: u64 = 2;

/// Depth of the root CNode.
const ROOT_CNODE_DEPTH: usize = 64;

const CONTEXT_STACK_SIZE: usize = 64 * 1024;

#[repr(C, align(16))]
struct ContextStack(UnsafeCell<[u8; CONTEXT_STACK_SIZE]>);

// SAFETY: at most one context thread exists at a time, and the driver
// itself never touches this memory.
unsafe impl Sync for ContextStack {}

/// Stack for context threads.
static CONTEXT_STACK: ContextStack = ContextStack(UnsafeCell::new([0; CONTEXT_STACK_SIZE]));

/// Report sink writing through the kernel's debug console.
struct DebugSink;

impl fmt::Write for DebugSink {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        sel4::debug_print!("{}", s);
        Ok(())
    }
}

#[root_task]
fn main(bootinfo: &sel4::BootInfoPtr) -> ! {
    sel4::debug_println!("testrig {} starting", testrig_driver::VERSION);

    match run(bootinfo) {
        Ok(verdict) => sel4::debug_println!("testrig finished: {}", verdict.line()),
        Err(err) => sel4::debug_println!("testrig failed: {}", err),
    }

    loop {
        sel4::init_thread::suspend_self();
    }
}

fn run(bootinfo: &sel4::BootInfoPtr) -> Result<RunVerdict, DriverError> {
    let mut slots = SlotAllocator::from_bootinfo(bootinfo);

    // Slot window handed to contexts through the resource pool
    let ctx_start = slots
        .alloc_range(CONTEXT_SLOT_WINDOW)
        .ok_or(DriverError::Context(ContextError::OutOfSlots))?;
    let ctx_end = CapSlot::new(ctx_start.as_u64() + CONTEXT_SLOT_WINDOW);

    let entry = context_entry as extern "C" fn(u64, u64) -> ! as *const () as u64;
    let stack_top = CONTEXT_STACK.0.get().cast::<u8>() as u64 + CONTEXT_STACK_SIZE as u64;
    let mut ops = Sel4Ops::new(entry, stack_top);

    let mut reserved = 0;
    for (i, desc) in bootinfo.untyped_list().iter().enumerate() {
        if reserved == DRIVER_UNTYPEDS {
            break;
        }
        if desc.is_device() {
            continue;
        }
        ops.add_untyped(CapSlot::new((bootinfo.untyped().start() + i) as u64))?;
        reserved += 1;
    }

    let pool = ResourcePool::from_bootinfo(bootinfo, ctx_start, ctx_end, DRIVER_UNTYPEDS);

    // The driver's endpoint, its reply object, and the wake notification
    let endpoint_slot = ops.create_object(&mut slots, &ObjectBlueprint::Endpoint)?;
    let reply_slot = ops.create_object(&mut slots, &ObjectBlueprint::Reply)?;
    let ntfn_slot = ops.create_object(&mut slots, &ObjectBlueprint::Notification)?;
    let wake_slot = ops.create_object(&mut slots, &ObjectBlueprint::Notification)?;
    ops.set_shared_endpoint(endpoint_slot);

    let endpoint: Cap<Endpoint> = Cap::from_bits(endpoint_slot.as_u64());
    let reply: Cap<Reply> = Cap::from_bits(reply_slot.as_u64());
    let ntfn: Cap<Notification> = Cap::from_bits(ntfn_slot.as_u64());

    // Timer interrupts arrive on the endpoint wait with a non-zero badge
    let irq_handler = setup_timer_irq(&mut slots, ntfn_slot)?;
    sel4::init_thread::slot::TCB
        .cap()
        .tcb_bind_notification(ntfn)
        .map_err(|e| {
            sel4::debug_println!("notification bind failed: {:?}", e);
            DriverError::Context(ContextError::ObjectCreation)
        })?;

    let mut timers = TimerSubsystem::new(HardwareClock::new());
    if timers
        .register_irq(0, ack_timer_irq, irq_handler.as_u64())
        .is_err()
    {
        return Err(DriverError::Context(ContextError::ObjectCreation));
    }

    // Device untypeds make up the issue-once resource inventory
    let mut rpc = RpcService::new();
    for (i, desc) in bootinfo.untyped_list().iter().enumerate() {
        if !desc.is_device() {
            continue;
        }
        let slot = CapSlot::new((bootinfo.untyped().start() + i) as u64);
        if rpc
            .add_resource(ResourceKind::Frame, desc.paddr() as u64, slot)
            .is_err()
        {
            break; // Inventory full
        }
    }

    let contexts = ContextManager::new(ops, CONTEXT_CSPACE_SIZE_BITS);
    let channel = EndpointChannel::new(endpoint, reply);
    let config = RunConfig::default();

    let mut sink = DebugSink;
    let mut driver = Driver::new(
        config,
        slots,
        pool,
        timers,
        rpc,
        contexts,
        channel,
        Reporter::new(&mut sink, config.format),
        wake_context,
        wake_slot.as_u64(),
    );
    driver.run(&catalog::CATALOGS)
}

/// Routes the platform timer interrupt to a copy of the driver's
/// notification badged with [`TIMER_BADGE`]; returns the handler slot.
fn setup_timer_irq(
    slots: &mut SlotAllocator,
    ntfn_slot: CapSlot,
) -> Result<CapSlot, DriverError> {
    let cnode = sel4::init_thread::slot::CNODE.cap();

    let handler_slot = slots
        .alloc()
        .ok_or(DriverError::Context(ContextError::OutOfSlots))?;
    let handler_cptr =
        cnode.absolute_cptr_from_bits_with_depth(handler_slot.as_u64(), ROOT_CNODE_DEPTH);
    sel4::init_thread::slot::IRQ_CONTROL
        .cap()
        .irq_control_get(TIMER_IRQ, &handler_cptr)
        .map_err(|e| {
            sel4::debug_println!("timer irq claim failed: {:?}", e);
            DriverError::Context(ContextError::ObjectCreation)
        })?;

    let badged_slot = slots
        .alloc()
        .ok_or(DriverError::Context(ContextError::OutOfSlots))?;
    let src = cnode.absolute_cptr_from_bits_with_depth(ntfn_slot.as_u64(), ROOT_CNODE_DEPTH);
    let dst = cnode.absolute_cptr_from_bits_with_depth(badged_slot.as_u64(), ROOT_CNODE_DEPTH);
    dst.mint(&src, CapRights::all(), TIMER_BADGE).map_err(|e| {
        sel4::debug_println!("notification mint failed: {:?}", e);
        DriverError::Context(ContextError::ObjectCreation)
    })?;

    let handler: Cap<IrqHandler> = Cap::from_bits(handler_slot.as_u64());
    let badged: Cap<Notification> = Cap::from_bits(badged_slot.as_u64());
    handler.irq_handler_set_notification(badged).map_err(|e| {
        sel4::debug_println!("timer irq routing failed: {:?}", e);
        DriverError::Context(ContextError::ObjectCreation)
    })?;
    handler.irq_handler_ack().map_err(|e| {
        sel4::debug_println!("timer irq ack failed: {:?}", e);
        DriverError::Context(ContextError::ObjectCreation)
    })?;

    Ok(handler_slot)
}

/// Timer interrupt source callback: acknowledges the line so the next
/// tick can fire. The token carries the handler's slot.
fn ack_timer_irq(token: u64) {
    let handler: Cap<IrqHandler> = Cap::from_bits(token);
    if handler.irq_handler_ack().is_err() {
        sel4::debug_println!("timer irq ack failed");
    }
}

/// Wakes a test waiting out a timeout. The token carries the wake
/// notification's slot.
fn wake_context(token: u64) {
    let ntfn: Cap<Notification> = Cap::from_bits(token);
    ntfn.signal();
}

/// Initial function of every context thread.
///
/// The driver passes the supervisor endpoint slot and the control-page
/// address in the first two argument registers. The thread looks its test
/// up by the name the driver wrote, runs it, and reports the outcome.
extern "C" fn context_entry(endpoint_slot: u64, control_vaddr: u64) -> ! {
    // The fixed slot from the control page is authoritative
    let _ = endpoint_slot;

    // SAFETY: the driver wrote the control block and mapped it read-only
    // at this address before resuming the thread.
    let control: &'static ControlBlock = unsafe { &*(control_vaddr as *const ControlBlock) };

    let outcome = match catalog::find(control.name()) {
        Some(test) => {
            let env = TestEnv {
                name: control.name(),
                start_ns: client::timestamp().unwrap_or(0),
                pool_blocks: control.block_count as usize,
                free_slots: (1u64 << control.cspace_size_bits)
                    .saturating_sub(control.first_free_slot),
            };
            (test.entry)(&env)
        }
        None => TestOutcome::Abort,
    };
    client::report_completion(outcome)
}
