// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! In-context client for the control protocol.
//!
//! Used by code running inside an isolated execution context. The driver's
//! endpoint handle sits at a fixed slot in every context, so requests need
//! no per-test wiring. Contexts run without an IPC buffer, so everything
//! goes through the register-backed message-register syscalls.

use testrig_abi::message::{CompletionReport, MessageTag, RpcRequest, RpcResponse};
use testrig_abi::types::{CapSlot, TestOutcome, TimerId};

/// Sends one request to the driver and decodes the reply.
#[must_use]
pub fn call(request: RpcRequest) -> Option<RpcResponse> {
    let mrs = request.to_mrs();
    let mut mr0 = mrs[0];
    let mut mr1 = mrs[1];
    let mut mr2 = mrs[2];
    let mut mr3 = mrs[3];
    let info = sel4::sys::seL4_MessageInfo::new(0, 0, 0, MessageTag::REQUEST_LEN as u64);
    let _ = sel4::sys::seL4_CallWithMRs(
        CapSlot::SUPERVISOR_ENDPOINT.as_u64(),
        info,
        Some(&mut mr0),
        Some(&mut mr1),
        Some(&mut mr2),
        Some(&mut mr3),
    );
    RpcResponse::from_mrs([mr0, mr1, mr2])
}

/// Fetches the driver's monotonic timestamp.
#[must_use]
pub fn timestamp() -> Option<u64> {
    match call(RpcRequest::GetTimestamp) {
        Some(RpcResponse::Timestamp(ns)) => Some(ns),
        _ => None,
    }
}

/// Arms a timeout `ns` nanoseconds from now.
///
/// A null registration ID means the deadline had already passed and the
/// wakeup fired before the reply.
#[must_use]
pub fn arm_timeout(ns: u64, periodic: bool) -> Option<TimerId> {
    match call(RpcRequest::ArmTimeout { ns, periodic }) {
        Some(RpcResponse::TimerArmed(id)) => Some(id),
        _ => None,
    }
}

/// Cancels a registration; the null ID clears all pending timeout state.
#[must_use]
pub fn reset_timer(id: TimerId) -> bool {
    matches!(call(RpcRequest::ResetTimer { id }), Some(RpcResponse::Success))
}

/// Requests the handle for a privileged resource.
#[must_use]
pub fn get_resource(kind: testrig_abi::message::ResourceKind, paddr: u64) -> Option<CapSlot> {
    match call(RpcRequest::GetResource { kind, paddr }) {
        Some(RpcResponse::ResourceHandle(slot)) => Some(slot),
        _ => None,
    }
}

/// Sends the final report and parks the thread until teardown.
pub fn report_completion(outcome: TestOutcome) -> ! {
    let mrs = CompletionReport::new(outcome).to_mrs();
    let mut mr0 = mrs[0];
    let mut mr1 = mrs[1];
    let mut mr2 = mrs[2];
    let mut mr3 = mrs[3];
    let info = sel4::sys::seL4_MessageInfo::new(0, 0, 0, MessageTag::REQUEST_LEN as u64);
    sel4::sys::seL4_SendWithMRs(
        CapSlot::SUPERVISOR_ENDPOINT.as_u64(),
        info,
        Some(&mut mr0),
        Some(&mut mr1),
        Some(&mut mr2),
        Some(&mut mr3),
    );
    loop {
        sel4::sys::seL4_Yield();
    }
}
