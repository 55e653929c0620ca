// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! seL4 implementation of the timer clock.

use super::Clock;

/// Clock backed by the architectural cycle counter.
///
/// Reads the counter directly on every query, so no interrupt handler has
/// to keep a software tick count. On aarch64 the virtual counter and its
/// frequency register are readable from user level; on x86_64 the TSC is
/// read and converted with an assumed invariant-TSC frequency.
pub struct HardwareClock {
    freq_hz: u64,
}

/// Assumed TSC frequency where no frequency register exists.
#[cfg(target_arch = "x86_64")]
const TSC_FREQ_HZ: u64 = 1_000_000_000;

#[cfg(target_arch = "aarch64")]
fn read_ticks() -> u64 {
    let value: u64;
    // SAFETY: CNTVCT_EL0 is a read-only counter register; seL4 grants
    // user-level access to it.
    unsafe {
        core::arch::asm!("mrs {}, cntvct_el0", out(reg) value, options(nomem, nostack));
    }
    value
}

#[cfg(target_arch = "aarch64")]
fn read_freq_hz() -> u64 {
    let value: u64;
    // SAFETY: CNTFRQ_EL0 is a read-only frequency register.
    unsafe {
        core::arch::asm!("mrs {}, cntfrq_el0", out(reg) value, options(nomem, nostack));
    }
    value
}

#[cfg(target_arch = "x86_64")]
fn read_ticks() -> u64 {
    // SAFETY: RDTSC has no side effects and seL4 leaves it enabled for
    // user level.
    unsafe { core::arch::x86_64::_rdtsc() }
}

#[cfg(target_arch = "x86_64")]
const fn read_freq_hz() -> u64 {
    TSC_FREQ_HZ
}

impl HardwareClock {
    /// Creates a clock calibrated from the platform's counter frequency.
    #[must_use]
    pub fn new() -> Self {
        Self {
            freq_hz: read_freq_hz().max(1),
        }
    }
}

impl Default for HardwareClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for HardwareClock {
    fn now_ns(&mut self) -> u64 {
        let ticks = u128::from(read_ticks());
        let ns = ticks * 1_000_000_000 / u128::from(self.freq_hz);
        ns as u64
    }
}
