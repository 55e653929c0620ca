// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! # testrig suite
//!
//! The test catalog shipped with the rig, plus the in-context client for
//! the control protocol. The `testrig-root-task` binary assembles the
//! driver from bootinfo and runs this catalog on target.

#![cfg_attr(not(any(test, feature = "std")), no_std)]

pub mod catalog;

#[cfg(feature = "sel4")]
pub mod client;
