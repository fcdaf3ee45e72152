// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Wind River Systems, Inc.

//! Timer identifiers for tracking scheduled per-instance timeouts.
//!
//! The scheduling primitive itself (a timer wheel or `tokio::time`-based
//! queue) lives in each engine crate; this type only gives every scheduled
//! timer a stable identity so `HostRegistry`/instance removal can assert
//! invariant 3 from spec §3 ("no timer entry exists without a live owner:
//! cancellation precedes destruction").

use std::fmt;

use crate::instance::InstanceUuid;

/// Identifies one outstanding timer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TimerId {
    /// Guest-channel connect backoff (spec §4.4.1).
    Connect(InstanceUuid),
    /// Heartbeat-axis challenge/interval timer (spec §4.4.3).
    Challenge(InstanceUuid),
    /// Vote timer started on notify (spec §4.4.3).
    Vote(InstanceUuid),
    /// Delayed return of `hb_state` to `waiting_init` after a grace period
    /// (spec §4.4.3, e.g. pause/reboot/migrate_begin/suspend).
    HbGrace(InstanceUuid),
    /// Link-monitor audit timer (spec §4.2), not owned by any single host.
    LinkAudit,
    /// Orchestrator-adapter token refresh timer (spec §9).
    TokenRefresh,
    /// Heartbeat-client ready-event retry timer (spec §4.3.3).
    ReadyEvent,
}

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimerId::Connect(id) => write!(f, "connect:{id}"),
            TimerId::Challenge(id) => write!(f, "challenge:{id}"),
            TimerId::Vote(id) => write!(f, "vote:{id}"),
            TimerId::HbGrace(id) => write!(f, "hb-grace:{id}"),
            TimerId::LinkAudit => write!(f, "link-audit"),
            TimerId::TokenRefresh => write!(f, "token-refresh"),
            TimerId::ReadyEvent => write!(f, "ready-event"),
        }
    }
}

impl TimerId {
    /// The instance this timer belongs to, if any.
    pub fn instance(&self) -> Option<&InstanceUuid> {
        match self {
            TimerId::Connect(id) | TimerId::Challenge(id) | TimerId::Vote(id) | TimerId::HbGrace(id) => Some(id),
            TimerId::LinkAudit | TimerId::TokenRefresh | TimerId::ReadyEvent => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_instance_uuid() {
        let id = TimerId::Vote(InstanceUuid::from("abc-123"));
        assert_eq!(id.to_string(), "vote:abc-123");
    }

    #[test]
    fn global_timers_have_no_instance() {
        assert!(TimerId::LinkAudit.instance().is_none());
        assert!(TimerId::Vote(InstanceUuid::from("x")).instance().is_some());
    }
}
