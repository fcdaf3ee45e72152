// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Wind River Systems, Inc.

//! Line-delimited JSON guest-channel protocol (§4.4.2). Each line on the
//! `AF_UNIX` stream is one JSON object tagged on `msg_type`.

use serde::{Deserialize, Serialize};

use maintd_core::instance::{EventType, Health, NotificationType, VoteResult};

/// Messages the guest agent sends toward the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "msg_type", rename_all = "snake_case")]
pub enum GuestMessage {
    Init {
        version: u32,
        revision: u32,
        sequence: u32,
        invocation_id: u32,
        name: String,
        corrective_action: String,
        heartbeat_interval_ms: u32,
        vote_secs: u64,
        shutdown_notice_secs: u64,
        suspend_notice_secs: u64,
        resume_notice_secs: u64,
        restart_secs: u64,
    },
    ChallengeResponse {
        version: u32,
        revision: u32,
        sequence: u32,
        heartbeat_response: u32,
        heartbeat_health: Health,
        corrective_action: Option<String>,
        log_msg: Option<String>,
    },
    ActionResponse {
        version: u32,
        revision: u32,
        sequence: u32,
        invocation_id: u32,
        vote_result: VoteResult,
        reason: Option<String>,
    },
    Exit {
        version: u32,
        revision: u32,
        sequence: u32,
    },
}

impl GuestMessage {
    pub fn sequence(&self) -> u32 {
        match self {
            GuestMessage::Init { sequence, .. }
            | GuestMessage::ChallengeResponse { sequence, .. }
            | GuestMessage::ActionResponse { sequence, .. }
            | GuestMessage::Exit { sequence, .. } => *sequence,
        }
    }
}

/// Messages the engine sends toward the guest agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "msg_type", rename_all = "snake_case")]
pub enum EngineMessage {
    InitAck { version: u32, revision: u32, sequence: u32 },
    Challenge { version: u32, revision: u32, sequence: u32 },
    Notify {
        version: u32,
        revision: u32,
        sequence: u32,
        invocation_id: u32,
        event_type: EventType,
        notification_type: NotificationType,
    },
    Nack { version: u32, revision: u32, sequence: u32, reason: String },
}
