// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Timer subsystem.
//!
//! Wraps a hardware clock behind the [`Clock`] trait and keeps two tables:
//! per-interrupt-source callbacks (one per hardware timer IRQ bit) and a
//! logical deadline table of armed registrations. The dispatch loop feeds
//! coalesced interrupt bitmasks in; this module invokes source callbacks,
//! completes due one-shots, and rearms due periodics.
//!
//! Everything here runs on the driver's single logical thread - callbacks
//! never race each other.

use testrig_abi::TimerId;

#[cfg(feature = "sel4")]
mod sel4_impl;

#[cfg(feature = "sel4")]
pub use sel4_impl::HardwareClock;

/// Maximum number of hardware timer interrupt sources (bitmask width).
pub const MAX_TIMER_IRQS: usize = 4;

/// Maximum number of concurrently armed registrations.
pub const MAX_TIMER_REGISTRATIONS: usize = 16;

/// Callback invoked when a timer source or registration fires.
///
/// The opaque token is the one supplied when arming.
pub type TimerCallback = fn(token: u64);

/// Monotonic clock seam.
///
/// The on-target implementation reads the hardware timer; host tests use
/// [`MockClock`].
pub trait Clock {
    /// Current time in nanoseconds. Never decreases.
    fn now_ns(&mut self) -> u64;
}

/// A deterministic clock for host tests.
#[cfg(any(test, feature = "std"))]
pub struct MockClock {
    now: u64,
}

#[cfg(any(test, feature = "std"))]
impl MockClock {
    /// Creates a mock clock starting at the given time.
    #[must_use]
    pub const fn new(start_ns: u64) -> Self {
        Self { now: start_ns }
    }

    /// Advances the clock.
    pub const fn advance(&mut self, ns: u64) {
        self.now += ns;
    }
}

#[cfg(any(test, feature = "std"))]
impl Clock for MockClock {
    fn now_ns(&mut self) -> u64 {
        self.now
    }
}

/// Registered callback for one hardware interrupt source.
#[derive(Clone, Copy)]
struct IrqSource {
    callback: TimerCallback,
    token: u64,
}

/// Kind of a timer registration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimerKind {
    /// Fires once, then the registration is removed.
    OneShot,
    /// Rearms itself after each expiry until reset.
    Periodic,
}

/// One armed entry in the logical deadline table.
#[derive(Clone, Copy)]
pub struct TimerRegistration {
    /// Registration identifier.
    pub id: TimerId,
    /// One-shot or periodic.
    pub kind: TimerKind,
    /// Absolute deadline in nanoseconds.
    pub deadline_ns: u64,
    /// Rearm interval for periodic registrations (0 for one-shots).
    pub period_ns: u64,
    callback: TimerCallback,
    token: u64,
}

/// Error from timer operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimerError {
    /// The interrupt bit index is outside the supported range.
    BadIrqIndex,
    /// The deadline table is full.
    TableFull,
    /// Periodic registrations need a non-zero period.
    ZeroPeriod,
}

/// Result of arming a one-shot timeout.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArmOutcome {
    /// Registered; will fire on a later interrupt.
    Armed(TimerId),
    /// The deadline had already passed; the callback ran inline, once.
    FiredInline,
}

/// The logical timer subsystem.
pub struct TimerSubsystem<C: Clock> {
    clock: C,
    sources: [Option<IrqSource>; MAX_TIMER_IRQS],
    registrations: [Option<TimerRegistration>; MAX_TIMER_REGISTRATIONS],
    next_id: u64,
    /// Set when a one-shot timeout fires; cleared by `reset`.
    pending_timeout: bool,
    last_timestamp: u64,
}

impl<C: Clock> TimerSubsystem<C> {
    /// Creates a timer subsystem over the given clock.
    #[must_use]
    pub const fn new(clock: C) -> Self {
        Self {
            clock,
            sources: [None; MAX_TIMER_IRQS],
            registrations: [None; MAX_TIMER_REGISTRATIONS],
            next_id: 1,
            pending_timeout: false,
            last_timestamp: 0,
        }
    }

    /// Registers the callback for one hardware interrupt bit.
    ///
    /// # Errors
    ///
    /// Returns `TimerError::BadIrqIndex` for bits outside the bitmask.
    pub const fn register_irq(
        &mut self,
        bit: usize,
        callback: TimerCallback,
        token: u64,
    ) -> Result<(), TimerError> {
        if bit >= MAX_TIMER_IRQS {
            return Err(TimerError::BadIrqIndex);
        }
        self.sources[bit] = Some(IrqSource { callback, token });
        Ok(())
    }

    /// Returns a strictly monotonic timestamp in nanoseconds.
    ///
    /// Two consecutive calls never return the same value, even if the
    /// underlying clock has not advanced.
    pub fn timestamp(&mut self) -> u64 {
        let now = self.clock.now_ns();
        let ts = if now > self.last_timestamp {
            now
        } else {
            self.last_timestamp + 1
        };
        self.last_timestamp = ts;
        ts
    }

    /// Arms a one-shot timeout at an absolute deadline.
    ///
    /// A deadline at or before the current time invokes the callback
    /// exactly once, inline, before returning - it is never silently
    /// dropped and never stored.
    ///
    /// # Errors
    ///
    /// Returns `TimerError::TableFull` if the deadline table is full.
    pub fn arm_oneshot(
        &mut self,
        deadline_ns: u64,
        callback: TimerCallback,
        token: u64,
    ) -> Result<ArmOutcome, TimerError> {
        let now = self.clock.now_ns();
        if deadline_ns <= now {
            callback(token);
            self.pending_timeout = true;
            return Ok(ArmOutcome::FiredInline);
        }
        let id = self.insert(TimerKind::OneShot, deadline_ns, 0, callback, token)?;
        Ok(ArmOutcome::Armed(id))
    }

    /// Arms a one-shot timeout relative to the current time.
    ///
    /// # Errors
    ///
    /// Returns `TimerError::TableFull` if the deadline table is full.
    pub fn arm_after(
        &mut self,
        ns: u64,
        callback: TimerCallback,
        token: u64,
    ) -> Result<ArmOutcome, TimerError> {
        let now = self.clock.now_ns();
        self.arm_oneshot(now.saturating_add(ns), callback, token)
    }

    /// Arms a periodic registration with the given interval.
    ///
    /// # Errors
    ///
    /// Returns `TimerError::ZeroPeriod` for a zero interval, or
    /// `TimerError::TableFull` if the deadline table is full.
    pub fn arm_periodic(
        &mut self,
        period_ns: u64,
        callback: TimerCallback,
        token: u64,
    ) -> Result<TimerId, TimerError> {
        if period_ns == 0 {
            return Err(TimerError::ZeroPeriod);
        }
        let deadline = self.clock.now_ns().saturating_add(period_ns);
        self.insert(TimerKind::Periodic, deadline, period_ns, callback, token)
    }

    /// Cancels a registration.
    ///
    /// Idempotent: unknown or already-completed IDs are a no-op. The null
    /// ID removes every registration. In all cases the pending-timeout
    /// flag is cleared, so stale timeout state never causes a spurious
    /// wakeup for the next test.
    pub const fn reset(&mut self, id: TimerId) {
        if id.is_null() {
            self.registrations = [None; MAX_TIMER_REGISTRATIONS];
        } else {
            let mut i = 0;
            while i < MAX_TIMER_REGISTRATIONS {
                if let Some(reg) = &self.registrations[i] {
                    if reg.id.as_u64() == id.as_u64() {
                        self.registrations[i] = None;
                        break;
                    }
                }
                i += 1;
            }
        }
        self.pending_timeout = false;
    }

    /// Consumes the pending-timeout flag.
    pub const fn take_pending(&mut self) -> bool {
        let pending = self.pending_timeout;
        self.pending_timeout = false;
        pending
    }

    /// Handles a coalesced hardware interrupt bitmask.
    ///
    /// For every set bit the registered source callback runs, then the
    /// deadline table is brought up to date: due one-shots fire and are
    /// removed (setting the pending flag), due periodics fire and rearm.
    /// All bits accumulated between wakeups are serviced before returning.
    ///
    /// Returns the number of callbacks invoked.
    pub fn handle_interrupt(&mut self, bits: u64) -> u32 {
        let mut fired = 0u32;

        for bit in 0..MAX_TIMER_IRQS {
            if bits & (1 << bit) != 0 {
                if let Some(source) = &self.sources[bit] {
                    (source.callback)(source.token);
                    fired += 1;
                }
            }
        }

        fired + self.process_deadlines()
    }

    /// Completes or rearms every registration whose deadline has passed.
    fn process_deadlines(&mut self) -> u32 {
        let now = self.clock.now_ns();
        let mut fired = 0u32;

        for entry in &mut self.registrations {
            let Some(reg) = entry else { continue };
            if reg.deadline_ns > now {
                continue;
            }
            (reg.callback)(reg.token);
            fired += 1;
            match reg.kind {
                TimerKind::OneShot => {
                    self.pending_timeout = true;
                    *entry = None;
                }
                TimerKind::Periodic => {
                    // Rearm relative to the missed deadline; if we fell
                    // more than one period behind, skip to the future.
                    let mut next = reg.deadline_ns.saturating_add(reg.period_ns);
                    if next <= now {
                        next = now.saturating_add(reg.period_ns);
                    }
                    reg.deadline_ns = next;
                }
            }
        }

        fired
    }

    /// Mutable access to the underlying clock.
    pub const fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }

    /// Number of armed registrations.
    #[must_use]
    pub fn armed_count(&self) -> usize {
        self.registrations.iter().flatten().count()
    }

    /// Looks up an armed registration by ID.
    #[must_use]
    pub fn registration(&self, id: TimerId) -> Option<&TimerRegistration> {
        self.registrations
            .iter()
            .flatten()
            .find(|reg| reg.id == id)
    }

    fn insert(
        &mut self,
        kind: TimerKind,
        deadline_ns: u64,
        period_ns: u64,
        callback: TimerCallback,
        token: u64,
    ) -> Result<TimerId, TimerError> {
        let slot = self
            .registrations
            .iter()
            .position(Option::is_none)
            .ok_or(TimerError::TableFull)?;
        let id = TimerId::new(self.next_id);
        self.next_id += 1;
        self.registrations[slot] = Some(TimerRegistration {
            id,
            kind,
            deadline_ns,
            period_ns,
            callback,
            token,
        });
        Ok(id)
    }
}

#[cfg(test)]
mod timer_test;
