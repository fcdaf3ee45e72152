// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Wind River Systems, Inc.

//! Events emitted toward the orchestrator adapter (C5), spec §4.4.5 plus
//! the host-level and link-level events §2's data-flow table describes
//! ("C3/C4/C2 emit events → C5 → orchestrator").

use crate::host::{HostName, PulseNetwork};
use crate::instance::{InstanceUuid, NotificationType, VoteResult};
use crate::link::LinkRole;

/// Everything C5 (the orchestrator adapter) can observe from the three
/// protocol engines.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    // --- Heartbeat Engine (C3), host-level ---
    /// Miss threshold crossed on one network (spec §4.3.2 step 3).
    HeartbeatLoss { host: HostName, network: PulseNetwork },
    /// Explicit clear issued by the registry layer (spec §4.3.2: "only an
    /// explicit clear... returns the host to a responsive state").
    HeartbeatCleared { host: HostName, network: PulseNetwork },

    // --- Guest Channel Engine (C4), instance-level (spec §4.4.5) ---
    HeartbeatRunning { host: HostName, instance: InstanceUuid },
    HeartbeatStopped { host: HostName, instance: InstanceUuid },
    HeartbeatLossInstance { host: HostName, instance: InstanceUuid },
    InstanceIllHealth { host: HostName, instance: InstanceUuid, corrective_action: String },
    VoteResult {
        host: HostName,
        instance: InstanceUuid,
        notification_type: NotificationType,
        event_type: crate::instance::EventType,
        vote_result: VoteResult,
        reason: Option<String>,
    },

    // --- Link Monitor (C2) ---
    LinkStateChanged { role: LinkRole, name: String, up: bool, last_change_us: u64 },
}

impl Event {
    /// Short event name for structured logging (mirrors the teacher's
    /// `Effect::name()` pattern).
    pub fn name(&self) -> &'static str {
        match self {
            Event::HeartbeatLoss { .. } => "heartbeat_loss",
            Event::HeartbeatCleared { .. } => "heartbeat_cleared",
            Event::HeartbeatRunning { .. } => "heartbeat_running",
            Event::HeartbeatStopped { .. } => "heartbeat_stopped",
            Event::HeartbeatLossInstance { .. } => "heartbeat_loss_instance",
            Event::InstanceIllHealth { .. } => "instance_ill_health",
            Event::VoteResult { .. } => "vote_result",
            Event::LinkStateChanged { .. } => "link_state_changed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_names_are_stable() {
        let e = Event::HeartbeatLoss { host: HostName::from("worker-1"), network: PulseNetwork::Management };
        assert_eq!(e.name(), "heartbeat_loss");
    }
}
