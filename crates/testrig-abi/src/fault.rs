// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Fault report structures.
//!
//! When an isolated test context faults (invalid memory access, bad handle
//! operation, unknown syscall, CPU exception), the kernel delivers the fault
//! via IPC to the driver's control channel. The driver maps every fault to a
//! test FAILURE and prints the register dump carried here.

use core::fmt;

// =============================================================================
// Fault Label Constants
// =============================================================================

/// Fault label for capability faults (invalid handle operation).
pub const FAULT_CAP: u64 = 1;

/// Fault label for unknown syscalls.
pub const FAULT_UNKNOWN_SYSCALL: u64 = 2;

/// Fault label for user exceptions (divide by zero, alignment, ...).
pub const FAULT_USER_EXCEPTION: u64 = 3;

/// Fault label for VM faults (access to unmapped memory).
///
/// VM fault message format:
/// - MR0: Instruction pointer (where the fault occurred)
/// - MR1: Fault address (the unmapped address accessed)
/// - MR2: Prefetch fault flag (1 = instruction fetch, 0 = data access)
/// - MR3: Fault status register (architecture-specific)
pub const FAULT_VM: u64 = 5;

/// Checks whether a message label identifies a fault delivery.
#[inline]
#[must_use]
pub const fn is_fault_label(label: u64) -> bool {
    matches!(
        label,
        FAULT_CAP | FAULT_UNKNOWN_SYSCALL | FAULT_USER_EXCEPTION | FAULT_VM
    )
}

// =============================================================================
// Fault Report
// =============================================================================

/// A fault delivered by the kernel on behalf of a faulted test context.
///
/// The first two message registers are the instruction pointer and the
/// fault-specific address for every fault kind we handle; the remaining two
/// are kept raw for the register dump.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FaultReport {
    /// Kernel fault label (see the constants in this module).
    pub label: u64,
    /// Faulting instruction pointer.
    pub ip: u64,
    /// Fault-specific address (faulting address, bad handle, syscall number).
    pub addr: u64,
    /// Remaining raw fault registers, architecture-specific.
    pub extra: [u64; 2],
}

impl FaultReport {
    /// Parse a fault from its message label and registers.
    #[inline]
    #[must_use]
    pub const fn from_mrs(label: u64, mrs: [u64; 4]) -> Self {
        Self {
            label,
            ip: mrs[0],
            addr: mrs[1],
            extra: [mrs[2], mrs[3]],
        }
    }

    /// Returns a human-readable name for the fault kind.
    #[inline]
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self.label {
            FAULT_CAP => "capability fault",
            FAULT_UNKNOWN_SYSCALL => "unknown syscall",
            FAULT_USER_EXCEPTION => "user exception",
            FAULT_VM => "vm fault",
            _ => "unknown fault",
        }
    }
}

impl fmt::Display for FaultReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (ip=0x{:x}, addr=0x{:x}, extra=[0x{:x}, 0x{:x}])",
            self.name(),
            self.ip,
            self.addr,
            self.extra[0],
            self.extra[1]
        )
    }
}
