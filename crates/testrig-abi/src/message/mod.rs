// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Message types for context ↔ driver communication.
//!
//! This module defines the protocol on the single control channel between an
//! isolated test context and the driver. Messages use the kernel's message
//! registers (MR0-MR3 for the fast path), with MR0 always carrying the tag.
//!
//! # Message Register Layout
//!
//! ## Requests (context → driver):
//!
//! | Request | MR0 | MR1 | MR2 | MR3 |
//! |---------|-----|-----|-----|-----|
//! | `ArmTimeout` | tag | nanoseconds | periodic (0/1) | 0 |
//! | `GetTimestamp` | tag | 0 | 0 | 0 |
//! | `ResetTimer` | tag | timer id (0 = all) | 0 | 0 |
//! | `GetResource` | tag | resource kind | physical address | 0 |
//! | `Completion` | tag | outcome | 0 | 0 |
//!
//! ## Responses (driver → context):
//!
//! | Response | MR0 | MR1 | MR2 |
//! |----------|-----|-----|-----|
//! | `Success` | tag | 0 | 0 |
//! | `Timestamp` | tag | nanoseconds | 0 |
//! | `TimerArmed` | tag | timer id | 0 |
//! | `ResourceHandle` | tag | slot | 0 |
//! | errors | tag | 0 | 0 |

use crate::types::{CapSlot, TestOutcome, TimerId};
use core::fmt;


// =============================================================================
// Message Tags
// =============================================================================

/// Control-channel message tag identifying the request or response type.
///
/// Tags 1-127 are requests (context → driver).
/// Tags 128-255 are responses (driver → context).
#[derive(Clone, Copy, PartialEq, Eq)]
#[repr(u64)]
pub enum MessageTag {
    // Requests (context → driver)
    /// Arm a timeout against the driver's timer subsystem.
    ArmTimeout = 1,
    /// Fetch a monotonic timestamp.
    GetTimestamp = 2,
    /// Cancel a timer registration and clear pending timeout state.
    ResetTimer = 3,
    /// Request the handle for a privileged resource.
    GetResource = 4,
    /// The test's final completion report.
    Completion = 5,

    // Responses (driver → context)
    /// Request carried out, no payload.
    Success = 128,
    /// Timestamp payload in MR1.
    Timestamp = 129,
    /// Timeout armed, registration ID in MR1.
    TimerArmed = 130,
    /// Resource handle slot in MR1.
    ResourceHandle = 131,
    /// The requested resource is not in the driver's inventory.
    ErrorNoResource = 132,
    /// The request was malformed (default-handler reply).
    ErrorProtocol = 133,
}

impl MessageTag {
    /// Number of message registers used by requests.
    pub const REQUEST_LEN: usize = 4;

    /// Number of message registers used by responses.
    pub const RESPONSE_LEN: usize = 3;

    /// Try to convert from a raw u64 value.
    #[must_use]
    pub const fn from_u64(value: u64) -> Option<Self> {
        match value {
            1 => Some(Self::ArmTimeout),
            2 => Some(Self::GetTimestamp),
            3 => Some(Self::ResetTimer),
            4 => Some(Self::GetResource),
            5 => Some(Self::Completion),
            128 => Some(Self::Success),
            129 => Some(Self::Timestamp),
            130 => Some(Self::TimerArmed),
            131 => Some(Self::ResourceHandle),
            132 => Some(Self::ErrorNoResource),
            133 => Some(Self::ErrorProtocol),
            _ => None,
        }
    }

    /// Returns true if this is a request tag (context → driver).
    #[inline]
    #[must_use]
    pub const fn is_request(self) -> bool {
        (self as u64) < 128
    }

    /// Returns true if this is a response tag (driver → context).
    #[inline]
    #[must_use]
    pub const fn is_response(self) -> bool {
        (self as u64) >= 128
    }

    /// Returns true if this is a timing-service request.
    #[inline]
    #[must_use]
    pub const fn is_timer_request(self) -> bool {
        matches!(self, Self::ArmTimeout | Self::GetTimestamp | Self::ResetTimer)
    }

    /// Returns true if this is an error response.
    #[inline]
    #[must_use]
    pub const fn is_error(self) -> bool {
        matches!(self, Self::ErrorNoResource | Self::ErrorProtocol)
    }
}

impl fmt::Debug for MessageTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ArmTimeout => "ArmTimeout",
            Self::GetTimestamp => "GetTimestamp",
            Self::ResetTimer => "ResetTimer",
            Self::GetResource => "GetResource",
            Self::Completion => "Completion",
            Self::Success => "Success",
            Self::Timestamp => "Timestamp",
            Self::TimerArmed => "TimerArmed",
            Self::ResourceHandle => "ResourceHandle",
            Self::ErrorNoResource => "ErrorNoResource",
            Self::ErrorProtocol => "ErrorProtocol",
        };
        f.write_str(name)
    }
}

// =============================================================================
// Resource Kinds
// =============================================================================

/// Kind of privileged resource a context may request from the driver.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u64)]
pub enum ResourceKind {
    /// A device memory frame, identified by physical address.
    Frame = 1,
    /// An I/O port range, identified by its base port.
    IoPort = 2,
    /// An interrupt line, identified by its IRQ number.
    Interrupt = 3,
}

impl ResourceKind {
    /// Try to convert from a raw u64 value.
    #[must_use]
    pub const fn from_u64(value: u64) -> Option<Self> {
        match value {
            1 => Some(Self::Frame),
            2 => Some(Self::IoPort),
            3 => Some(Self::Interrupt),
            _ => None,
        }
    }
}

// =============================================================================
// Requests
// =============================================================================

/// A decoded RPC request from a test context.
///
/// `from_mrs` returns `None` for anything it cannot decode; the driver's
/// default handler answers those with [`RpcResponse::ErrorProtocol`] instead
/// of silently dropping them.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RpcRequest {
    /// Arm a timeout `ns` nanoseconds from now.
    ArmTimeout {
        /// Relative deadline in nanoseconds.
        ns: u64,
        /// Rearm automatically after each expiry.
        periodic: bool,
    },
    /// Fetch a monotonic timestamp.
    GetTimestamp,
    /// Cancel a registration (null ID clears all pending timeout state).
    ResetTimer {
        /// Registration to cancel.
        id: TimerId,
    },
    /// Request the handle for a privileged resource.
    GetResource {
        /// Resource kind.
        kind: ResourceKind,
        /// Physical address (or port/IRQ number) identifying the resource.
        paddr: u64,
    },
}

impl RpcRequest {
    /// Encode this request into message register values.
    #[must_use]
    pub const fn to_mrs(self) -> [u64; 4] {
        match self {
            Self::ArmTimeout { ns, periodic } => {
                [MessageTag::ArmTimeout as u64, ns, periodic as u64, 0]
            }
            Self::GetTimestamp => [MessageTag::GetTimestamp as u64, 0, 0, 0],
            Self::ResetTimer { id } => [MessageTag::ResetTimer as u64, id.as_u64(), 0, 0],
            Self::GetResource { kind, paddr } => {
                [MessageTag::GetResource as u64, kind as u64, paddr, 0]
            }
        }
    }

    /// Decode a request from message register values.
    ///
    /// Returns `None` if the tag is unknown, is not a request, or the
    /// payload is malformed for its tag.
    #[must_use]
    pub const fn from_mrs(mrs: [u64; 4]) -> Option<Self> {
        let Some(tag) = MessageTag::from_u64(mrs[0]) else {
            return None;
        };
        match tag {
            MessageTag::ArmTimeout => {
                if mrs[2] > 1 {
                    return None;
                }
                Some(Self::ArmTimeout {
                    ns: mrs[1],
                    periodic: mrs[2] == 1,
                })
            }
            MessageTag::GetTimestamp => Some(Self::GetTimestamp),
            MessageTag::ResetTimer => Some(Self::ResetTimer {
                id: TimerId::new(mrs[1]),
            }),
            MessageTag::GetResource => {
                let Some(kind) = ResourceKind::from_u64(mrs[1]) else {
                    return None;
                };
                Some(Self::GetResource { kind, paddr: mrs[2] })
            }
            _ => None,
        }
    }

    /// Returns true if this request must be serviced by the timer subsystem.
    #[inline]
    #[must_use]
    pub const fn is_timer_request(self) -> bool {
        matches!(
            self,
            Self::ArmTimeout { .. } | Self::GetTimestamp | Self::ResetTimer { .. }
        )
    }
}

// =============================================================================
// Responses
// =============================================================================

/// A reply from the driver to a test context.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RpcResponse {
    /// Request carried out, no payload.
    Success,
    /// Monotonic timestamp in nanoseconds.
    Timestamp(u64),
    /// Timeout armed under this registration ID.
    TimerArmed(TimerId),
    /// Handle slot for the requested resource.
    ResourceHandle(CapSlot),
    /// The requested resource is not in the driver's inventory.
    ErrorNoResource,
    /// The request could not be decoded.
    ErrorProtocol,
}

impl RpcResponse {
    /// Encode this response into message register values.
    #[must_use]
    pub const fn to_mrs(self) -> [u64; 3] {
        match self {
            Self::Success => [MessageTag::Success as u64, 0, 0],
            Self::Timestamp(ns) => [MessageTag::Timestamp as u64, ns, 0],
            Self::TimerArmed(id) => [MessageTag::TimerArmed as u64, id.as_u64(), 0],
            Self::ResourceHandle(slot) => [MessageTag::ResourceHandle as u64, slot.as_u64(), 0],
            Self::ErrorNoResource => [MessageTag::ErrorNoResource as u64, 0, 0],
            Self::ErrorProtocol => [MessageTag::ErrorProtocol as u64, 0, 0],
        }
    }

    /// Decode a response from message register values.
    ///
    /// Returns `None` if the tag is invalid or not a response.
    #[must_use]
    pub const fn from_mrs(mrs: [u64; 3]) -> Option<Self> {
        let Some(tag) = MessageTag::from_u64(mrs[0]) else {
            return None;
        };
        match tag {
            MessageTag::Success => Some(Self::Success),
            MessageTag::Timestamp => Some(Self::Timestamp(mrs[1])),
            MessageTag::TimerArmed => Some(Self::TimerArmed(TimerId::new(mrs[1]))),
            MessageTag::ResourceHandle => Some(Self::ResourceHandle(CapSlot::new(mrs[1]))),
            MessageTag::ErrorNoResource => Some(Self::ErrorNoResource),
            MessageTag::ErrorProtocol => Some(Self::ErrorProtocol),
            _ => None,
        }
    }

    /// Returns true if this is an error reply.
    #[inline]
    #[must_use]
    pub const fn is_error(self) -> bool {
        matches!(self, Self::ErrorNoResource | Self::ErrorProtocol)
    }
}

// =============================================================================
// Completion Report
// =============================================================================

/// The test's final report on the control channel.
///
/// Distinguished from RPC requests by its own tag, so the driver never has
/// to disambiguate a completion from a pending timer request by convention.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CompletionReport {
    /// The outcome the test body reported.
    pub outcome: TestOutcome,
}

impl CompletionReport {
    /// Create a new completion report.
    #[inline]
    #[must_use]
    pub const fn new(outcome: TestOutcome) -> Self {
        Self { outcome }
    }

    /// Encode this report into message register values.
    #[must_use]
    pub const fn to_mrs(self) -> [u64; 4] {
        [MessageTag::Completion as u64, self.outcome.as_u64(), 0, 0]
    }

    /// Decode a report from message register values.
    ///
    /// Returns `None` if the tag or outcome is invalid.
    #[must_use]
    pub const fn from_mrs(mrs: [u64; 4]) -> Option<Self> {
        let Some(tag) = MessageTag::from_u64(mrs[0]) else {
            return None;
        };
        if !matches!(tag, MessageTag::Completion) {
            return None;
        }
        let Some(outcome) = TestOutcome::from_u64(mrs[1]) else {
            return None;
        };
        Some(Self { outcome })
    }
}
