// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Core type definitions for capability slots, contexts, and timers.
//!
//! These newtypes prevent accidentally mixing different ID types at compile
//! time.

use core::fmt;

/// Capability slot index in a resource-handle space.
///
/// Handles are stored in slots within a handle space. This type represents a
/// slot index. A freshly created execution context receives a small set of
/// handles at fixed assignments (see constants below); every slot from
/// `FIRST_FREE` upward belongs to the context's own allocator, which is why
/// the driver must never install a handle after context setup is frozen.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct CapSlot(u64);

impl CapSlot {
    // Fixed slot assignments for all execution contexts

    /// Null capability slot (always empty).
    pub const NULL: Self = Self(0);

    /// Root of the context's own resource-handle space.
    pub const CSPACE: Self = Self(1);

    /// Root of the context's own address space.
    pub const VSPACE: Self = Self(2);

    /// Thread-control handle for the context's initial thread.
    pub const TCB_SELF: Self = Self(3);

    /// Endpoint back to the driver (completion reports and RPC requests).
    pub const SUPERVISOR_ENDPOINT: Self = Self(4);

    /// Endpoint for timing-service requests.
    pub const TIMER_ENDPOINT: Self = Self(5);

    /// First slot of the leased memory-block inventory.
    pub const BLOCKS_BASE: Self = Self(8);

    /// First slot available to the context's private allocator.
    ///
    /// Nothing may be installed at or above this slot by the driver.
    pub const FIRST_FREE: Self = Self(64);

    /// Creates a new capability slot index.
    #[inline]
    #[must_use]
    pub const fn new(slot: u64) -> Self {
        Self(slot)
    }

    /// Returns the raw slot index.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns the slot index as usize (for array indexing).
    #[inline]
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }

    /// Checks if this is the null slot.
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Returns the slot `offset` entries after this one.
    #[inline]
    #[must_use]
    pub const fn offset(self, offset: u64) -> Self {
        Self(self.0 + offset)
    }
}

impl fmt::Debug for CapSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CapSlot({})", self.0)
    }
}

impl fmt::Display for CapSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slot:{}", self.0)
    }
}

/// Unique identifier for an isolated execution context.
///
/// At most one execution context exists at any time; the identifier is
/// still unique across the run so log lines stay attributable.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct ContextId(u64);

impl ContextId {
    /// The invalid/null context ID.
    pub const NULL: Self = Self(0);

    /// The first context ID handed out.
    pub const FIRST: Self = Self(1);

    /// Creates a new context ID.
    #[inline]
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Checks if this is the null/invalid context ID.
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Returns the next context ID.
    #[inline]
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Debug for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContextId({})", self.0)
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "context:{}", self.0)
    }
}

/// Unique identifier for a timer registration.
///
/// Allocated sequentially by the timer subsystem. ID 0 is reserved; a
/// `ResetTimer` request carrying the null ID clears all pending timeout
/// state instead of a single registration.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct TimerId(u64);

impl TimerId {
    /// The invalid/null timer ID.
    pub const NULL: Self = Self(0);

    /// Creates a new timer ID.
    #[inline]
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Checks if this is the null/invalid timer ID.
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Debug for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TimerId({})", self.0)
    }
}

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer:{}", self.0)
    }
}

/// Outcome reported by a test body.
///
/// A hardware fault in the execution context is not an outcome a test can
/// report; the driver maps faults to `Failure` itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u64)]
pub enum TestOutcome {
    /// The test's assertions all held.
    Success = 0,
    /// An assertion failed; the run continues unless configured otherwise.
    Failure = 1,
    /// A fatal assertion failed; the whole suite must stop.
    Abort = 2,
}

impl TestOutcome {
    /// Try to convert from a raw u64 value.
    #[must_use]
    pub const fn from_u64(value: u64) -> Option<Self> {
        match value {
            0 => Some(Self::Success),
            1 => Some(Self::Failure),
            2 => Some(Self::Abort),
            _ => None,
        }
    }

    /// Returns the raw wire value.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self as u64
    }

    /// Returns a human-readable name for this outcome.
    #[inline]
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Failure => "FAILURE",
            Self::Abort => "ABORT",
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn cap_slot_constants() {
        assert!(CapSlot::NULL.is_null());
        assert!(!CapSlot::CSPACE.is_null());
        assert!(CapSlot::BLOCKS_BASE.as_u64() > CapSlot::TIMER_ENDPOINT.as_u64());
        assert!(CapSlot::FIRST_FREE.as_u64() >= 64);
    }

    #[test]
    fn cap_slot_offset() {
        let base = CapSlot::BLOCKS_BASE;
        assert_eq!(base.offset(0), base);
        assert_eq!(base.offset(3).as_u64(), base.as_u64() + 3);
    }

    #[test]
    fn context_id_sequence() {
        assert!(ContextId::NULL.is_null());
        assert_eq!(ContextId::FIRST.as_u64(), 1);
        assert_eq!(ContextId::FIRST.next().as_u64(), 2);
    }

    #[test]
    fn outcome_round_trip() {
        for outcome in [TestOutcome::Success, TestOutcome::Failure, TestOutcome::Abort] {
            assert_eq!(TestOutcome::from_u64(outcome.as_u64()), Some(outcome));
        }
        assert_eq!(TestOutcome::from_u64(99), None);
    }
}
