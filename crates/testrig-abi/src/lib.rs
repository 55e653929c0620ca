// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! # testrig ABI
//!
//! Shared definitions between the testrig driver and the isolated test
//! contexts it spawns. Everything that crosses the context boundary lives
//! here:
//! - message tags and register encodings for the control channel
//! - fault report parsing
//! - the shared control-data page layout
//! - newtype identifiers
//!
//! This crate has no dependencies and no platform code, so every definition
//! is host-testable.

#![no_std]

#[cfg(test)]
extern crate std;

pub mod control;
pub mod fault;
pub mod message;
pub mod types;

pub use types::{CapSlot, ContextId, TestOutcome, TimerId};
