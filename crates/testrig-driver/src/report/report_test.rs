// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Tests for run bookkeeping and report output.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::*;
use std::string::String;
use testrig_abi::fault::{FAULT_VM, FaultReport};

#[test]
fn verdict_all_passed() {
    let mut state = RunState::new(2, 0);
    state.record(TestOutcome::Success);
    state.record(TestOutcome::Success);
    assert_eq!(state.verdict(), RunVerdict::AllPassed);
    assert_eq!(state.passed(), 2);
}

#[test]
fn verdict_failures_detected() {
    let mut state = RunState::new(2, 0);
    state.record(TestOutcome::Success);
    state.record(TestOutcome::Failure);
    assert_eq!(state.verdict(), RunVerdict::FailuresDetected);
    assert_eq!(state.passed(), 1);
    assert_eq!(state.failed, 1);
}

#[test]
fn verdict_abort_counts_as_failure() {
    let mut state = RunState::new(1, 0);
    state.record(TestOutcome::Abort);
    assert_eq!(state.verdict(), RunVerdict::FailuresDetected);
}

#[test]
fn incomplete_run_dominates_the_verdict() {
    let mut state = RunState::new(3, 0);
    state.record(TestOutcome::Success);
    // Two tests never ran
    assert_eq!(state.verdict(), RunVerdict::NotAllRun);

    // A halt is reported even when all counted tests passed
    let mut state = RunState::new(1, 0);
    state.record(TestOutcome::Success);
    state.halted = true;
    assert_eq!(state.verdict(), RunVerdict::NotAllRun);
}

#[test]
fn empty_selection_passes_vacuously() {
    let state = RunState::new(0, 0);
    assert_eq!(state.verdict(), RunVerdict::AllPassed);
}

#[test]
fn verdict_lines() {
    assert_eq!(RunVerdict::AllPassed.line(), "All is well in the universe");
    assert_eq!(RunVerdict::NotAllRun.line(), "ALL tests not run");
    assert_eq!(RunVerdict::FailuresDetected.line(), "FAILURES DETECTED");
}

#[test]
fn plain_text_run() {
    let mut out = String::new();
    let mut reporter = Reporter::new(&mut out, OutputFormat::PlainText);

    let mut state = RunState::new(2, 1);
    reporter.suite_started("testrig", &state).unwrap();
    reporter.test_started("boot_info", "bootstrap", 1, 2).unwrap();
    state.record(TestOutcome::Success);
    reporter
        .test_finished("boot_info", TestOutcome::Success, 12_000)
        .unwrap();
    reporter.test_started("proc_spawn", "isolated", 2, 2).unwrap();
    state.record(TestOutcome::Failure);
    reporter
        .test_finished("proc_spawn", TestOutcome::Failure, 7_500)
        .unwrap();
    reporter.summary(&state).unwrap();

    let expected = "\
=== testrig TEST RUN ===
Selected 2 tests (1 skipped)
[TEST] boot_info (bootstrap) 1/2
[TEST] boot_info ... SUCCESS (12 us)
[TEST] proc_spawn (isolated) 2/2
[TEST] proc_spawn ... FAILURE (7 us)
Results: 2 run, 1 passed, 1 failed, 1 skipped
=== VERDICT: FAILURES DETECTED ===
";
    assert_eq!(out, expected);
}

#[test]
fn tagged_run() {
    let mut out = String::new();
    let mut reporter = Reporter::new(&mut out, OutputFormat::Tagged);

    let mut state = RunState::new(1, 0);
    reporter.suite_started("testrig", &state).unwrap();
    reporter.test_started("boot_info", "bootstrap", 1, 1).unwrap();
    state.record(TestOutcome::Success);
    reporter
        .test_finished("boot_info", TestOutcome::Success, 12_000)
        .unwrap();
    reporter.summary(&state).unwrap();

    let expected = "\
<testsuite name=\"testrig\" tests=\"1\" skipped=\"0\">
  <testcase name=\"boot_info\" result=\"SUCCESS\" time_ns=\"12000\"/>
  <summary run=\"1\" passed=\"1\" failed=\"0\" skipped=\"0\"/>
</testsuite>
All is well in the universe
";
    assert_eq!(out, expected);
}

#[test]
fn fault_dump_formats() {
    let fault = FaultReport {
        label: FAULT_VM,
        ip: 0x4000_1000,
        addr: 0xdead_0000,
        extra: [0, 0],
    };

    let mut out = String::new();
    Reporter::new(&mut out, OutputFormat::PlainText)
        .fault_dump("proc_spawn", &fault)
        .unwrap();
    assert!(out.starts_with("[FAULT] proc_spawn:"));
    assert!(out.contains("0x40001000"));

    let mut out = String::new();
    Reporter::new(&mut out, OutputFormat::Tagged)
        .fault_dump("proc_spawn", &fault)
        .unwrap();
    assert_eq!(
        out,
        "  <fault testcase=\"proc_spawn\" kind=\"vm fault\" ip=\"0x40001000\" addr=\"0xdead0000\"/>\n"
    );
}
