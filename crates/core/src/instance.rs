// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Wind River Systems, Inc.

//! Instance (guest VM) identity and state (spec §3 "Instance", §4.4.3).

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::host::HostName;

/// Unique instance UUID, as assigned by the orchestrator's inventory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstanceUuid(pub String);

impl InstanceUuid {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstanceUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for InstanceUuid {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for InstanceUuid {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::borrow::Borrow<str> for InstanceUuid {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Channel connection bookkeeping (spec §3, §4.4.1).
#[derive(Debug, Clone)]
pub struct ChannelState {
    pub chan_ok: bool,
    pub connected: bool,
    pub connecting: bool,
    pub connect_backoff: Duration,
}

impl ChannelState {
    pub fn new(initial_backoff: Duration) -> Self {
        Self { chan_ok: false, connected: false, connecting: false, connect_backoff: initial_backoff }
    }

    /// Cap applied after each failed connect attempt (spec §4.4.1: doubles,
    /// capped at 60s).
    pub const MAX_BACKOFF: Duration = Duration::from_secs(60);

    pub fn double_backoff(&mut self) {
        let doubled = self.connect_backoff.saturating_mul(2);
        self.connect_backoff = doubled.min(Self::MAX_BACKOFF);
    }
}

/// Heartbeat axis state (spec §4.4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HbState {
    WaitingInit,
    WaitingResponse,
    WaitingChallenge,
}

/// Voting axis state (spec §4.4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VnState {
    WaitingInit,
    WaitingShutdownResponse,
}

/// Lifecycle event a notify/vote negotiation is about (spec §4.4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Stop,
    Reboot,
    Pause,
    Unpause,
    Suspend,
    Resume,
    LiveMigrateBegin,
    LiveMigrateEnd,
    ColdMigrateBegin,
    ColdMigrateEnd,
}

/// Whether the guest may reject a notify (spec §4.4.3, GLOSSARY).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    Revocable,
    Irrevocable,
}

/// Outcome of a vote/notify round (spec §4.4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteResult {
    Accept,
    Complete,
    Reject,
    Timeout,
    Unknown,
    Error,
}

/// Guest-reported health (spec §3, §4.4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Health {
    Healthy,
    Unhealthy,
}

/// Per-instance negotiation timeouts, set at init time (spec §3, §4.4.3).
#[derive(Debug, Clone, Copy)]
pub struct NegotiationTimeouts {
    pub vote_secs: u64,
    pub shutdown_notice_secs: u64,
    pub suspend_notice_secs: u64,
    pub resume_notice_secs: u64,
    pub restart_notice_secs: u64,
}

impl Default for NegotiationTimeouts {
    fn default() -> Self {
        Self { vote_secs: 10, shutdown_notice_secs: 30, suspend_notice_secs: 30, resume_notice_secs: 30, restart_notice_secs: 30 }
    }
}

/// Negotiation (voting-axis) state carried alongside `VnState` (spec §3).
#[derive(Debug, Clone, Default)]
pub struct NegotiationState {
    pub invocation_id: u32,
    pub event_type: Option<EventType>,
    pub notification_type: Option<NotificationType>,
}

/// One guest VM running on a host (spec §3 "Instance").
#[derive(Debug, Clone)]
pub struct Instance {
    pub uuid: InstanceUuid,
    pub name: String,
    pub hostname: HostName,
    pub channel_path: PathBuf,

    pub channel: ChannelState,

    pub heartbeat_interval: Duration,
    pub last_challenge_nonce: Option<u32>,
    pub waiting_response: bool,
    pub consecutive_misses: u32,
    pub mismatch_count: u32,
    pub failed: bool,
    pub heartbeating: bool,

    pub hb_state: HbState,
    pub vn_state: VnState,
    pub negotiation: NegotiationState,
    pub timeouts: NegotiationTimeouts,

    pub last_health: Option<Health>,
    pub corrective_action: Option<String>,

    pub reporting_enabled: bool,
}

impl Instance {
    pub fn new(uuid: InstanceUuid, name: String, hostname: HostName, channel_path: PathBuf, initial_backoff: Duration) -> Self {
        Self {
            uuid,
            name,
            hostname,
            channel_path,
            channel: ChannelState::new(initial_backoff),
            heartbeat_interval: Duration::from_secs(1),
            last_challenge_nonce: None,
            waiting_response: false,
            consecutive_misses: 0,
            mismatch_count: 0,
            failed: false,
            heartbeating: false,
            hb_state: HbState::WaitingInit,
            vn_state: VnState::WaitingInit,
            negotiation: NegotiationState::default(),
            timeouts: NegotiationTimeouts::default(),
            last_health: None,
            corrective_action: None,
            reporting_enabled: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps_at_60s() {
        let mut c = ChannelState::new(Duration::from_secs(1));
        for expected in [2, 4, 8, 16, 32, 60, 60, 60] {
            c.double_backoff();
            assert_eq!(c.connect_backoff, Duration::from_secs(expected));
        }
    }

    #[test]
    fn new_instance_starts_in_waiting_init() {
        let inst = Instance::new(
            InstanceUuid::from("8d80875b-fa73-4ccb-bce3-1cd4df10449d"),
            "vm1".into(),
            HostName::from("worker-1"),
            PathBuf::from("/var/lib/qemu/channels/cgcs.heartbeat.8d80875b.sock"),
            Duration::from_secs(1),
        );
        assert_eq!(inst.hb_state, HbState::WaitingInit);
        assert_eq!(inst.vn_state, VnState::WaitingInit);
        assert!(!inst.heartbeating);
    }
}
