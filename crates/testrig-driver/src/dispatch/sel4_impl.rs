// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! seL4 implementation of the control channel.

use super::{ControlChannel, ControlEvent};
use sel4::Cap;
use sel4::cap_type::{Endpoint, Reply};
use testrig_abi::fault::{FaultReport, is_fault_label};
use testrig_abi::message::{CompletionReport, MessageTag};

/// Control channel backed by the driver's endpoint.
///
/// Timer interrupt notifications are bound to the same endpoint with a
/// non-zero badge; everything else arrives as IPC and is classified by its
/// message label. Replies are deferred and sent with the next receive, so
/// the kernel's reply-and-wait fast path is used for the RPC case.
pub struct EndpointChannel {
    endpoint: Cap<Endpoint>,
    reply: Cap<Reply>,
    pending_reply: Option<[u64; 3]>,
}

impl EndpointChannel {
    /// Creates a channel over the given endpoint and reply capability.
    #[must_use]
    pub const fn new(endpoint: Cap<Endpoint>, reply: Cap<Reply>) -> Self {
        Self {
            endpoint,
            reply,
            pending_reply: None,
        }
    }
}

impl ControlChannel for EndpointChannel {
    fn recv(&mut self) -> ControlEvent {
        let (msg_info, badge) = match self.pending_reply.take() {
            Some(mrs) => {
                sel4::with_ipc_buffer_mut(|buf| {
                    buf.msg_regs_mut()[0] = mrs[0];
                    buf.msg_regs_mut()[1] = mrs[1];
                    buf.msg_regs_mut()[2] = mrs[2];
                });
                let reply_info = sel4::MessageInfoBuilder::default()
                    .length(MessageTag::RESPONSE_LEN)
                    .build();
                self.endpoint.reply_recv(reply_info, self.reply)
            }
            None => self.endpoint.recv(self.reply),
        };

        if badge != 0 {
            return ControlEvent::Interrupt(badge);
        }

        let label = msg_info.label() as u64;
        let mrs = sel4::with_ipc_buffer(|buf| {
            [
                buf.msg_regs()[0],
                buf.msg_regs()[1],
                buf.msg_regs()[2],
                buf.msg_regs()[3],
            ]
        });

        if is_fault_label(label) {
            return ControlEvent::Fault(FaultReport::from_mrs(label, mrs));
        }

        if let Some(report) = CompletionReport::from_mrs(mrs) {
            return ControlEvent::Completion(report.outcome);
        }

        // Anything else is an RPC request; undecodable ones get their
        // protocol-error reply from the dispatcher.
        ControlEvent::Rpc(mrs)
    }

    fn reply(&mut self, mrs: [u64; 3]) {
        self.pending_reply = Some(mrs);
    }
}
