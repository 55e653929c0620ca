// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Mock control channel for host tests.

use super::{ControlChannel, ControlEvent};
use std::collections::VecDeque;
use std::vec::Vec;

/// Replays a scripted event sequence and records every reply.
pub struct MockChannel {
    script: VecDeque<ControlEvent>,
    /// Replies sent by the dispatcher, in order.
    pub replies: Vec<[u64; 3]>,
}

impl MockChannel {
    /// Creates a channel that will deliver the given events in order.
    #[must_use]
    pub fn new(events: &[ControlEvent]) -> Self {
        Self {
            script: events.iter().copied().collect(),
            replies: Vec::new(),
        }
    }

    /// Returns true if every scripted event was consumed.
    #[must_use]
    pub fn is_drained(&self) -> bool {
        self.script.is_empty()
    }
}

impl ControlChannel for MockChannel {
    fn recv(&mut self) -> ControlEvent {
        self.script
            .pop_front()
            .expect("mock channel script exhausted while the dispatcher still expects events")
    }

    fn reply(&mut self, mrs: [u64; 3]) {
        self.replies.push(mrs);
    }
}
