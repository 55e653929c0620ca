// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Control-channel event dispatch.
//!
//! While an isolated test runs, the driver sits in one loop on one channel
//! and multiplexes everything that can happen: timer interrupts, RPC
//! requests from the test, the test's completion report, and faults the
//! kernel delivers on the test's behalf. The loop ends with exactly one
//! [`TestVerdict`] per test.
//!
//! Events arrive as a typed [`ControlEvent`], produced by the channel
//! implementation; the dispatcher never looks at raw badges or labels.

use crate::report::Reporter;
use crate::rpc::RpcService;
use crate::timer::{ArmOutcome, Clock, TimerCallback, TimerSubsystem};
use core::fmt;
use testrig_abi::TimerId;
use testrig_abi::fault::FaultReport;
use testrig_abi::message::{RpcRequest, RpcResponse};
use testrig_abi::types::TestOutcome;

#[cfg(feature = "sel4")]
mod sel4_impl;

#[cfg(feature = "sel4")]
pub use sel4_impl::EndpointChannel;

/// One event received on the control channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlEvent {
    /// Coalesced hardware timer interrupt bits.
    Interrupt(u64),
    /// An RPC request's raw message registers.
    Rpc([u64; 4]),
    /// The running test's completion report.
    Completion(TestOutcome),
    /// A fault the kernel delivered on the test's behalf.
    Fault(FaultReport),
}

/// The control channel seam.
///
/// On target this is the driver's endpoint; host tests use
/// [`MockChannel`] with a scripted event sequence.
pub trait ControlChannel {
    /// Blocks until the next event.
    fn recv(&mut self) -> ControlEvent;

    /// Replies to the RPC request received last.
    ///
    /// Only valid directly after a [`ControlEvent::Rpc`]; interrupts,
    /// completions and faults are never replied to.
    fn reply(&mut self, mrs: [u64; 3]);
}

/// How one test's dispatch loop ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TestVerdict {
    /// The outcome counted for the test.
    pub outcome: TestOutcome,
    /// The fault that ended the test, if one did.
    pub fault: Option<FaultReport>,
}

/// Runs the dispatch loop for one test at a time.
pub struct Dispatcher<'a, C: Clock, Ch: ControlChannel> {
    channel: &'a mut Ch,
    timers: &'a mut TimerSubsystem<C>,
    rpc: &'a mut RpcService,
    /// Invoked when a timeout armed by the running test expires.
    wake: TimerCallback,
    wake_token: u64,
}

impl<'a, C: Clock, Ch: ControlChannel> Dispatcher<'a, C, Ch> {
    /// Creates a dispatcher over the channel and the driver services.
    ///
    /// `wake` runs whenever a timeout armed through this dispatcher
    /// expires; on target it signals the blocked test context.
    pub fn new(
        channel: &'a mut Ch,
        timers: &'a mut TimerSubsystem<C>,
        rpc: &'a mut RpcService,
        wake: TimerCallback,
        wake_token: u64,
    ) -> Self {
        Self {
            channel,
            timers,
            rpc,
            wake,
            wake_token,
        }
    }

    /// Dispatches events until the running test completes or faults.
    ///
    /// Interrupts update the timer subsystem, RPC requests are serviced
    /// and replied to in arrival order, and the first completion report
    /// or fault ends the loop. A fault is dumped through the reporter and
    /// counted as a FAILURE.
    ///
    /// # Errors
    ///
    /// Propagates reporter sink write failures.
    pub fn run_test(
        &mut self,
        name: &str,
        reporter: &mut Reporter<'_>,
    ) -> Result<TestVerdict, fmt::Error> {
        loop {
            match self.channel.recv() {
                ControlEvent::Interrupt(bits) => {
                    self.timers.handle_interrupt(bits);
                }
                ControlEvent::Rpc(mrs) => {
                    let response = self.handle_rpc(mrs);
                    self.channel.reply(response.to_mrs());
                }
                ControlEvent::Completion(outcome) => {
                    return Ok(TestVerdict {
                        outcome,
                        fault: None,
                    });
                }
                ControlEvent::Fault(fault) => {
                    reporter.fault_dump(name, &fault)?;
                    return Ok(TestVerdict {
                        outcome: TestOutcome::Failure,
                        fault: Some(fault),
                    });
                }
            }
        }
    }

    /// Services one RPC request.
    ///
    /// Undecodable requests are counted and answered with a protocol
    /// error instead of being dropped, so a confused test blocks on a
    /// reply it actually gets.
    fn handle_rpc(&mut self, mrs: [u64; 4]) -> RpcResponse {
        let Some(request) = RpcRequest::from_mrs(mrs) else {
            self.rpc.note_protocol_error();
            return RpcResponse::ErrorProtocol;
        };

        match request {
            RpcRequest::ArmTimeout { ns, periodic } => self.arm_timeout(ns, periodic),
            RpcRequest::GetTimestamp => RpcResponse::Timestamp(self.timers.timestamp()),
            RpcRequest::ResetTimer { id } => {
                self.timers.reset(id);
                RpcResponse::Success
            }
            RpcRequest::GetResource { kind, paddr } => {
                self.rpc.handle_get_resource(kind, paddr)
            }
        }
    }

    fn arm_timeout(&mut self, ns: u64, periodic: bool) -> RpcResponse {
        if periodic {
            return match self.timers.arm_periodic(ns, self.wake, self.wake_token) {
                Ok(id) => RpcResponse::TimerArmed(id),
                Err(_) => RpcResponse::ErrorProtocol,
            };
        }
        match self.timers.arm_after(ns, self.wake, self.wake_token) {
            Ok(ArmOutcome::Armed(id)) => RpcResponse::TimerArmed(id),
            // Already expired: the callback ran inline, the null ID tells
            // the test not to wait for a wakeup.
            Ok(ArmOutcome::FiredInline) => RpcResponse::TimerArmed(TimerId::NULL),
            Err(_) => RpcResponse::ErrorProtocol,
        }
    }
}

#[cfg(any(test, feature = "std"))]
mod mock;

#[cfg(any(test, feature = "std"))]
pub use mock::MockChannel;
