// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Tests for the timer subsystem.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::*;
use std::sync::atomic::{AtomicU64, Ordering};

/// Shared fire log: callbacks bump the counter indexed by their token.
/// Tests run concurrently, so every test uses its own token.
static FIRE_COUNTS: [AtomicU64; 16] = [const { AtomicU64::new(0) }; 16];

fn record_fire(token: u64) {
    FIRE_COUNTS[token as usize].fetch_add(1, Ordering::SeqCst);
}

/// Takes the fire count for a token and resets it.
fn fires(token: u64) -> u64 {
    FIRE_COUNTS[token as usize].swap(0, Ordering::SeqCst)
}

fn subsystem(start_ns: u64) -> TimerSubsystem<MockClock> {
    TimerSubsystem::new(MockClock::new(start_ns))
}

#[test]
fn register_irq_bad_index() {
    let mut timers = subsystem(0);
    assert_eq!(
        timers.register_irq(MAX_TIMER_IRQS, record_fire, 12),
        Err(TimerError::BadIrqIndex)
    );
    assert_eq!(timers.register_irq(0, record_fire, 12), Ok(()));
}

#[test]
fn irq_bits_invoke_sources() {
    let token_a = 0;
    let token_b = 1;
    let mut timers = subsystem(0);
    timers.register_irq(0, record_fire, token_a).unwrap();
    timers.register_irq(2, record_fire, token_b).unwrap();

    // Bits 0 and 2 set, bit 1 has no source
    let n = timers.handle_interrupt(0b101);
    assert_eq!(n, 2);
    assert_eq!(fires(token_a), 1);
    assert_eq!(fires(token_b), 1);

    // A bit with no registered source is ignored
    assert_eq!(timers.handle_interrupt(0b010), 0);
}

#[test]
fn oneshot_fires_once_and_is_removed() {
    let token = 2;
    let mut timers = subsystem(1_000);

    let outcome = timers.arm_oneshot(2_000, record_fire, token).unwrap();
    let ArmOutcome::Armed(id) = outcome else {
        panic!("deadline in the future must not fire inline");
    };
    assert_eq!(timers.armed_count(), 1);
    assert_eq!(timers.registration(id).unwrap().kind, TimerKind::OneShot);

    // Not due yet
    timers.handle_interrupt(0);
    assert_eq!(fires(token), 0);
    assert!(!timers.take_pending());

    timers.clock.advance(1_500);
    timers.handle_interrupt(0);
    assert_eq!(fires(token), 1);
    assert!(timers.take_pending());
    assert_eq!(timers.armed_count(), 0);

    // Further interrupts do not fire it again
    timers.clock.advance(10_000);
    timers.handle_interrupt(0);
    assert_eq!(fires(token), 0);
}

#[test]
fn expired_deadline_fires_inline_exactly_once() {
    let token = 3;
    let mut timers = subsystem(5_000);

    let outcome = timers.arm_oneshot(5_000, record_fire, token).unwrap();
    assert_eq!(outcome, ArmOutcome::FiredInline);
    assert_eq!(fires(token), 1);
    assert!(timers.take_pending());
    // Nothing was stored
    assert_eq!(timers.armed_count(), 0);

    timers.clock.advance(1);
    timers.handle_interrupt(0);
    assert_eq!(fires(token), 0);
}

#[test]
fn arm_after_is_relative() {
    let token = 4;
    let mut timers = subsystem(100);

    let ArmOutcome::Armed(id) = timers.arm_after(50, record_fire, token).unwrap() else {
        panic!("positive delay must arm");
    };
    assert_eq!(timers.registration(id).unwrap().deadline_ns, 150);

    // Zero delay fires inline
    assert_eq!(
        timers.arm_after(0, record_fire, token).unwrap(),
        ArmOutcome::FiredInline
    );
    assert_eq!(fires(token), 1);
}

#[test]
fn periodic_rearms_until_reset() {
    let token = 5;
    let mut timers = subsystem(0);

    let id = timers.arm_periodic(100, record_fire, token).unwrap();

    timers.clock.advance(100);
    timers.handle_interrupt(0);
    assert_eq!(fires(token), 1);
    // Periodic expiry is not a one-shot timeout
    assert!(!timers.take_pending());
    assert_eq!(timers.armed_count(), 1);

    timers.clock.advance(100);
    timers.handle_interrupt(0);
    assert_eq!(fires(token), 1);

    timers.reset(id);
    timers.clock.advance(100);
    timers.handle_interrupt(0);
    assert_eq!(fires(token), 0);
    assert_eq!(timers.armed_count(), 0);
}

#[test]
fn periodic_catches_up_after_missed_periods() {
    let token = 6;
    let mut timers = subsystem(0);
    let id = timers.arm_periodic(100, record_fire, token).unwrap();

    // Miss several periods in one sleep
    timers.clock.advance(550);
    timers.handle_interrupt(0);
    assert_eq!(fires(token), 1);

    // Next deadline is in the future, not in the backlog
    let deadline = timers.registration(id).unwrap().deadline_ns;
    assert!(deadline > 550);
}

#[test]
fn zero_period_is_rejected() {
    let mut timers = subsystem(0);
    assert_eq!(
        timers.arm_periodic(0, record_fire, 9),
        Err(TimerError::ZeroPeriod)
    );
}

#[test]
fn table_full() {
    let mut timers = subsystem(0);
    for _ in 0..MAX_TIMER_REGISTRATIONS {
        timers.arm_periodic(100, record_fire, 10).unwrap();
    }
    assert_eq!(
        timers.arm_periodic(100, record_fire, 10),
        Err(TimerError::TableFull)
    );
    // Clearing makes room again
    timers.reset(TimerId::NULL);
    assert!(timers.arm_periodic(100, record_fire, 10).is_ok());
}

#[test]
fn reset_is_idempotent_and_clears_pending() {
    let token = 7;
    let mut timers = subsystem(0);

    let ArmOutcome::Armed(id) = timers.arm_oneshot(100, record_fire, token).unwrap() else {
        panic!("must arm");
    };

    timers.reset(id);
    assert_eq!(timers.armed_count(), 0);
    // Second reset of the same ID is a no-op
    timers.reset(id);
    // Unknown IDs are a no-op as well
    timers.reset(TimerId::new(9_999));

    // Pending state from an inline fire is cleared by any reset
    let _ = timers.arm_oneshot(0, record_fire, token).unwrap();
    let _ = fires(token);
    timers.reset(TimerId::NULL);
    assert!(!timers.take_pending());
}

#[test]
fn null_reset_clears_all_registrations() {
    let mut timers = subsystem(0);
    let _ = timers.arm_periodic(10, record_fire, 11).unwrap();
    let _ = timers.arm_periodic(20, record_fire, 11).unwrap();
    let _ = timers.arm_oneshot(30, record_fire, 11).unwrap();
    assert_eq!(timers.armed_count(), 3);

    timers.reset(TimerId::NULL);
    assert_eq!(timers.armed_count(), 0);

    timers.clock.advance(1_000);
    assert_eq!(timers.handle_interrupt(0), 0);
}

#[test]
fn timestamps_are_strictly_monotonic() {
    let mut timers = subsystem(42);

    let a = timers.timestamp();
    let b = timers.timestamp();
    let c = timers.timestamp();
    // The clock did not move, the timestamps still did
    assert!(a < b && b < c);
    assert_eq!(a, 42);

    timers.clock.advance(1_000);
    let d = timers.timestamp();
    assert!(d > c);
    assert_eq!(d, 1_042);
}

#[test]
fn take_pending_consumes_the_flag() {
    let token = 8;
    let mut timers = subsystem(0);
    assert!(!timers.take_pending());

    let _ = timers.arm_oneshot(0, record_fire, token).unwrap();
    let _ = fires(token);
    assert!(timers.take_pending());
    assert!(!timers.take_pending());
}
