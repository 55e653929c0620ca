// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! End-to-end tests for the driver, with every seam mocked.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::*;
use crate::context::MockOps;
use crate::dispatch::{ControlEvent, MockChannel};
use crate::registry::TestFn;
use crate::timer::MockClock;
use std::string::String;
use testrig_abi::CapSlot;
use testrig_abi::fault::{FAULT_CAP, FaultReport};

fn no_wake(_token: u64) {}

fn boot_ok(_env: &TestEnv) -> TestOutcome {
    TestOutcome::Success
}

fn boot_fail(_env: &TestEnv) -> TestOutcome {
    TestOutcome::Failure
}

fn boot_abort(_env: &TestEnv) -> TestOutcome {
    TestOutcome::Abort
}

fn boot_env_check(env: &TestEnv) -> TestOutcome {
    if env.pool_blocks == 2 && env.free_slots > 0 && !env.name.is_empty() {
        TestOutcome::Success
    } else {
        TestOutcome::Failure
    }
}

fn never_runs(_env: &TestEnv) -> TestOutcome {
    // Isolated entries execute in their own context, not in the driver
    TestOutcome::Abort
}

const fn boot(name: &'static str, entry: TestFn) -> TestDescriptor {
    TestDescriptor {
        name,
        description: "",
        ty: TestType::Bootstrap,
        enabled: true,
        entry,
    }
}

const fn isolated(name: &'static str) -> TestDescriptor {
    TestDescriptor {
        name,
        description: "",
        ty: TestType::IsolatedProcess,
        enabled: true,
        entry: never_runs,
    }
}

fn build_driver<'w>(
    reporter: Reporter<'w>,
    config: RunConfig,
    events: &[ControlEvent],
) -> Driver<'w, MockOps, MockClock, MockChannel> {
    let mut pool = ResourcePool::new(CapSlot::new(500), CapSlot::new(600));
    pool.add(CapSlot::new(10), 0x10000, 20).unwrap();
    pool.add(CapSlot::new(11), 0x20000, 14).unwrap();
    pool.sort_by_size();

    Driver::new(
        config,
        SlotAllocator::new(CapSlot::new(100), CapSlot::new(200)),
        pool,
        TimerSubsystem::new(MockClock::new(1_000)),
        RpcService::new(),
        ContextManager::new(MockOps::new(), CONTEXT_CSPACE_SIZE_BITS),
        MockChannel::new(events),
        reporter,
        no_wake,
        0,
    )
}

#[test]
fn full_run_over_both_types() {
    static CATALOG: [TestDescriptor; 4] = [
        isolated("proc_ok"),
        boot("boot_env", boot_env_check),
        boot("boot_ok", boot_ok),
        isolated("proc_fault"),
    ];

    let fault = FaultReport {
        label: FAULT_CAP,
        ip: 0x1000,
        addr: 3,
        extra: [0, 0],
    };
    // Isolated tests run name-sorted: proc_fault first, then proc_ok
    let events = [
        ControlEvent::Fault(fault),
        ControlEvent::Completion(TestOutcome::Success),
    ];

    let mut out = String::new();
    let reporter = Reporter::new(&mut out, OutputFormat::PlainText);
    let mut driver = build_driver(reporter, RunConfig::default(), &events);

    let verdict = driver.run(&[&CATALOG]).unwrap();
    assert_eq!(verdict, RunVerdict::FailuresDetected);

    // The world is pristine after the run
    assert!(!driver.pool.is_leased());
    assert_eq!(driver.slots.remaining(), 100);
    assert!(!driver.contexts.is_active());
    assert!(driver.channel.is_drained());

    assert!(out.contains("[TEST] boot_env (bootstrap) 1/4"));
    assert!(out.contains("[TEST] boot_env ... SUCCESS"));
    assert!(out.contains("[TEST] boot_ok ... SUCCESS"));
    assert!(out.contains("[TEST] proc_fault (isolated) 3/4"));
    assert!(out.contains("[FAULT] proc_fault: capability fault"));
    assert!(out.contains("[TEST] proc_fault ... FAILURE"));
    assert!(out.contains("[TEST] proc_ok (isolated) 4/4"));
    assert!(out.contains("[TEST] proc_ok ... SUCCESS"));
    assert!(out.contains("Results: 4 run, 3 passed, 1 failed, 0 skipped"));
    assert!(out.contains("=== VERDICT: FAILURES DETECTED ==="));
}

#[test]
fn all_passing_run() {
    static CATALOG: [TestDescriptor; 2] = [boot("boot_a", boot_ok), boot("boot_b", boot_ok)];

    let mut out = String::new();
    let reporter = Reporter::new(&mut out, OutputFormat::PlainText);
    let mut driver = build_driver(reporter, RunConfig::default(), &[]);

    let verdict = driver.run(&[&CATALOG]).unwrap();
    assert_eq!(verdict, RunVerdict::AllPassed);
    assert!(out.contains("=== VERDICT: All is well in the universe ==="));
}

#[test]
fn empty_selection_is_a_failing_check() {
    static CATALOG: [TestDescriptor; 1] = [boot("boot_a", boot_ok)];

    let mut out = String::new();
    let reporter = Reporter::new(&mut out, OutputFormat::PlainText);
    let config = RunConfig {
        pattern: "no_such_test",
        ..RunConfig::default()
    };
    let mut driver = build_driver(reporter, config, &[]);

    let verdict = driver.run(&[&CATALOG]).unwrap();
    assert_eq!(verdict, RunVerdict::FailuresDetected);
    assert!(out.contains("[TEST] suite_has_tests"));
    assert!(out.contains("=== VERDICT: FAILURES DETECTED ==="));
}

#[test]
fn abort_stops_the_run() {
    static CATALOG: [TestDescriptor; 3] = [
        boot("boot_a", boot_ok),
        boot("boot_b", boot_abort),
        boot("boot_c", boot_ok),
    ];

    let mut out = String::new();
    let reporter = Reporter::new(&mut out, OutputFormat::PlainText);
    let mut driver = build_driver(reporter, RunConfig::default(), &[]);

    let verdict = driver.run(&[&CATALOG]).unwrap();
    assert_eq!(verdict, RunVerdict::NotAllRun);
    assert!(out.contains("[TEST] boot_b ... ABORT"));
    // boot_c never ran
    assert!(!out.contains("boot_c ..."));
    assert!(out.contains("Results: 2 run, 1 passed, 1 failed, 0 skipped"));
    assert!(out.contains("=== VERDICT: ALL tests not run ==="));
}

#[test]
fn abort_on_the_last_test_still_counts_as_complete() {
    static CATALOG: [TestDescriptor; 2] = [boot("boot_a", boot_ok), boot("boot_b", boot_abort)];

    let mut out = String::new();
    let reporter = Reporter::new(&mut out, OutputFormat::PlainText);
    let mut driver = build_driver(reporter, RunConfig::default(), &[]);

    // Every selected test ran, so the verdict reflects the failure rather
    // than an incomplete run
    let verdict = driver.run(&[&CATALOG]).unwrap();
    assert_eq!(verdict, RunVerdict::FailuresDetected);
}

#[test]
fn halt_on_failure_stops_early() {
    static CATALOG: [TestDescriptor; 3] = [
        boot("boot_a", boot_fail),
        boot("boot_b", boot_ok),
        boot("boot_c", boot_ok),
    ];

    let mut out = String::new();
    let reporter = Reporter::new(&mut out, OutputFormat::PlainText);
    let config = RunConfig {
        halt_on_failure: true,
        ..RunConfig::default()
    };
    let mut driver = build_driver(reporter, config, &[]);

    let verdict = driver.run(&[&CATALOG]).unwrap();
    assert_eq!(verdict, RunVerdict::NotAllRun);
    assert!(out.contains("Results: 1 run, 0 passed, 1 failed, 0 skipped"));
}

#[test]
fn without_halt_on_failure_the_run_continues() {
    static CATALOG: [TestDescriptor; 2] = [boot("boot_a", boot_fail), boot("boot_b", boot_ok)];

    let mut out = String::new();
    let reporter = Reporter::new(&mut out, OutputFormat::PlainText);
    let mut driver = build_driver(reporter, RunConfig::default(), &[]);

    let verdict = driver.run(&[&CATALOG]).unwrap();
    assert_eq!(verdict, RunVerdict::FailuresDetected);
    assert!(out.contains("Results: 2 run, 1 passed, 1 failed, 0 skipped"));
}

#[test]
fn duplicate_names_are_fatal() {
    static CATALOG: [TestDescriptor; 2] = [boot("boot_a", boot_ok), boot("boot_a", boot_ok)];

    let mut out = String::new();
    let reporter = Reporter::new(&mut out, OutputFormat::PlainText);
    let mut driver = build_driver(reporter, RunConfig::default(), &[]);

    assert_eq!(
        driver.run(&[&CATALOG]).unwrap_err(),
        DriverError::Registry(RegistryError::DuplicateName)
    );
}

#[test]
fn per_test_state_is_cleared_between_tests() {
    static CATALOG: [TestDescriptor; 1] = [isolated("proc_timer")];

    // The test arms a timeout and completes without resetting it
    let events = [
        ControlEvent::Rpc(
            testrig_abi::message::RpcRequest::ArmTimeout {
                ns: 1_000_000,
                periodic: false,
            }
            .to_mrs(),
        ),
        ControlEvent::Completion(TestOutcome::Success),
    ];

    let mut out = String::new();
    let reporter = Reporter::new(&mut out, OutputFormat::PlainText);
    let mut driver = build_driver(reporter, RunConfig::default(), &events);

    let verdict = driver.run(&[&CATALOG]).unwrap();
    assert_eq!(verdict, RunVerdict::AllPassed);

    // The stale registration was cleared with the test
    assert_eq!(driver.timers.armed_count(), 0);
    assert!(!driver.timers.take_pending());
}

#[test]
fn skipped_tests_are_reported() {
    static CATALOG: [TestDescriptor; 2] = [
        boot("boot_a", boot_ok),
        TestDescriptor {
            name: "boot_disabled",
            description: "",
            ty: TestType::Bootstrap,
            enabled: false,
            entry: boot_ok,
        },
    ];

    let mut out = String::new();
    let reporter = Reporter::new(&mut out, OutputFormat::PlainText);
    let mut driver = build_driver(reporter, RunConfig::default(), &[]);

    let verdict = driver.run(&[&CATALOG]).unwrap();
    assert_eq!(verdict, RunVerdict::AllPassed);
    assert!(out.contains("Selected 1 tests (1 skipped)"));
    assert!(out.contains("Results: 1 run, 1 passed, 0 failed, 1 skipped"));
}

#[test]
fn tagged_output_end_to_end() {
    static CATALOG: [TestDescriptor; 1] = [boot("boot_a", boot_ok)];

    let mut out = String::new();
    let reporter = Reporter::new(&mut out, OutputFormat::Tagged);
    let config = RunConfig {
        format: OutputFormat::Tagged,
        ..RunConfig::default()
    };
    let mut driver = build_driver(reporter, config, &[]);

    let verdict = driver.run(&[&CATALOG]).unwrap();
    assert_eq!(verdict, RunVerdict::AllPassed);
    assert!(out.starts_with("<testsuite name=\"testrig\" tests=\"1\" skipped=\"0\">"));
    assert!(out.contains("<testcase name=\"boot_a\" result=\"SUCCESS\""));
    assert!(out.ends_with("</testsuite>\nAll is well in the universe\n"));
}
