// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! # testrig driver
//!
//! Test-orchestration engine for running many small, isolated test cases
//! against a privileged, resource-constrained environment. The driver:
//! - collects test descriptors into a deterministic run order
//! - creates a fresh isolated execution context per test and tears it down
//! - leases resource-pool blocks into the context and reclaims them after
//! - multiplexes timer interrupts, RPC requests, and completion/fault
//!   reports through one non-preemptible dispatch loop
//! - accumulates results and emits the run report
//!
//! All platform operations go through traits with mock implementations, so
//! the whole engine is host-testable; the `sel4` feature provides the
//! on-target implementations.

#![cfg_attr(not(any(test, feature = "std")), no_std)]

#[cfg(any(test, feature = "std"))]
extern crate std;

pub mod context;
pub mod dispatch;
pub mod driver;
pub mod pool;
pub mod registry;
pub mod report;
pub mod rpc;
pub mod slots;
pub mod timer;

/// Crate version.
pub const VERSION: &str = match option_env!("TESTRIG_VERSION") {
    Some(v) => v,
    None => "unknown",
};
