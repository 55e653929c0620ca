// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Tests for the shipped catalog.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::*;
use std::vec::Vec;
use testrig_abi::control::MAX_TEST_NAME_LEN;
use testrig_driver::registry::collect_tests;

fn host_env(name: &'static str) -> TestEnv {
    TestEnv {
        name,
        start_ns: 0,
        pool_blocks: 2,
        free_slots: 100,
    }
}

#[test]
fn catalog_resolves_into_a_plan() {
    let plan = collect_tests(&CATALOGS, "*").unwrap();

    // 4 bootstrap checks plus 4 enabled isolated tests
    assert_eq!(plan.len(), 8);
    assert_eq!(plan.skipped(), 1);

    let bootstrap: Vec<_> = plan.tests_of(TestType::Bootstrap).map(|t| t.name).collect();
    let isolated: Vec<_> = plan
        .tests_of(TestType::IsolatedProcess)
        .map(|t| t.name)
        .collect();
    assert_eq!(bootstrap.len(), 4);
    assert_eq!(isolated.len(), 4);
    assert!(bootstrap.windows(2).all(|pair| pair[0] < pair[1]));
    assert!(isolated.windows(2).all(|pair| pair[0] < pair[1]));
}

#[test]
fn bootstrap_checks_pass_on_a_healthy_env() {
    for test in &BOOTSTRAP {
        let env = host_env(test.name);
        assert_eq!(
            (test.entry)(&env),
            TestOutcome::Success,
            "{} failed",
            test.name
        );
    }
}

#[test]
fn bootstrap_checks_catch_a_broken_env() {
    let starved = TestEnv {
        name: "boot_pool_populated",
        start_ns: 0,
        pool_blocks: 0,
        free_slots: 3,
    };
    let pool_check = find("boot_pool_populated").unwrap();
    assert_eq!((pool_check.entry)(&starved), TestOutcome::Failure);

    let slot_check = find("boot_slots_available").unwrap();
    assert_eq!((slot_check.entry)(&starved), TestOutcome::Failure);
}

#[test]
fn isolated_entries_pass_in_a_faithful_context() {
    for test in ISOLATED.iter().filter(|t| t.enabled) {
        let env = host_env(test.name);
        assert_eq!(
            (test.entry)(&env),
            TestOutcome::Success,
            "{} failed",
            test.name
        );
    }
}

#[test]
fn control_page_mismatch_is_detected() {
    let test = find("proc_control_page").unwrap();
    let env = host_env("some_other_test");
    assert_eq!((test.entry)(&env), TestOutcome::Failure);
}

#[test]
fn find_locates_every_registered_test() {
    for catalog in &CATALOGS {
        for test in *catalog {
            let found = find(test.name).unwrap();
            assert_eq!(found.name, test.name);
        }
    }
    assert!(find("no_such_test").is_none());
}

#[test]
fn names_fit_the_control_block() {
    for catalog in &CATALOGS {
        for test in *catalog {
            assert!(!test.name.is_empty());
            assert!(test.name.len() <= MAX_TEST_NAME_LEN);
        }
    }
}
