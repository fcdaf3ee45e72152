// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Wind River Systems, Inc.

//! The two-axis per-instance state machine (§4.4.3-§4.4.5): heartbeat axis
//! (`hb_state`) and voting axis (`vn_state`) advance independently, a
//! single incoming message may move one or both.
//!
//! Every handler here is a pure function over `&mut Instance` plus the
//! message/timer that fired, returning an `FsmOutput` describing what the
//! caller (the per-instance connection task) must do: reply on the wire,
//! emit events toward C5, and (re)schedule timers. No I/O happens here,
//! mirroring the split already used in `maintd-heartbeat::agent`.

use std::time::Duration;

use maintd_core::host::HostName;
use maintd_core::instance::{
    EventType, HbState, Health, Instance, NotificationType, VnState, VoteResult,
};
use maintd_core::Event;
use maintd_wire::guest::{EngineMessage, GuestMessage};

/// Delayed heartbeat-axis reset after pause/reboot/migrate-begin/suspend
/// (§4.4.3: "schedule a delayed return of hb_state to waiting_init after a
/// fixed grace period"). The source leaves the exact duration undocumented;
/// fixed here at 5s, the same order of magnitude as the vote/notify
/// timeouts it composes with.
pub const HB_RESET_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Mismatched challenge responses have their own bound, separate from the
/// miss counter (§4.4.3: "does NOT increment the miss counter beyond a
/// separate mismatch bound"). Exceeding it is treated the same as crossing
/// the miss threshold: it, too, means the channel is no longer trustworthy.
pub const MISMATCH_THRESHOLD: u32 = 5;

#[derive(Debug, Default)]
pub struct FsmOutput {
    pub reply: Option<EngineMessage>,
    pub events: Vec<Event>,
    /// Caller must (re)arm the per-instance heartbeat interval timer.
    pub rearm_interval_timer: bool,
    /// Caller must start (or restart) the vote timer for this many ms.
    pub start_vote_timer_ms: Option<u64>,
    /// Caller must cancel any outstanding vote timer.
    pub cancel_vote_timer: bool,
    /// Caller must schedule a delayed `hb_state` reset after the grace period.
    pub schedule_grace_reset: bool,
}

impl FsmOutput {
    fn reply(msg: EngineMessage) -> Self {
        Self { reply: Some(msg), ..Default::default() }
    }
}

/// Guest sent `init` while in `waiting_init` (§4.4.3): assign a fresh
/// invocation id, record the negotiated timeouts, reply `init_ack`, and
/// immediately emit the first challenge.
pub fn handle_init(instance: &mut Instance, msg: &GuestMessage, invocation_id: u32, nonce: u32) -> FsmOutput {
    let GuestMessage::Init {
        version,
        revision,
        sequence,
        vote_secs,
        shutdown_notice_secs,
        suspend_notice_secs,
        resume_notice_secs,
        restart_secs,
        heartbeat_interval_ms,
        ..
    } = msg
    else {
        return FsmOutput::default();
    };

    instance.negotiation.invocation_id = invocation_id;
    instance.negotiation.event_type = None;
    instance.negotiation.notification_type = None;
    instance.timeouts.vote_secs = *vote_secs;
    instance.timeouts.shutdown_notice_secs = *shutdown_notice_secs;
    instance.timeouts.suspend_notice_secs = *suspend_notice_secs;
    instance.timeouts.resume_notice_secs = *resume_notice_secs;
    instance.timeouts.restart_notice_secs = *restart_secs;
    instance.heartbeat_interval = Duration::from_millis(*heartbeat_interval_ms as u64);
    instance.last_challenge_nonce = Some(nonce);
    instance.consecutive_misses = 0;
    instance.mismatch_count = 0;
    instance.hb_state = HbState::WaitingResponse;
    instance.vn_state = VnState::WaitingInit;

    FsmOutput {
        reply: Some(EngineMessage::InitAck { version: *version, revision: *revision, sequence: *sequence }),
        rearm_interval_timer: true,
        ..Default::default()
    }
}

/// Guest sent `challenge_response` (§4.4.3).
pub fn handle_challenge_response(instance: &mut Instance, host: &HostName, msg: &GuestMessage) -> FsmOutput {
    let GuestMessage::ChallengeResponse { heartbeat_response, heartbeat_health, corrective_action, .. } = msg else {
        return FsmOutput::default();
    };

    let mut out = FsmOutput::default();

    let outstanding = instance.last_challenge_nonce;
    if outstanding != Some(*heartbeat_response) {
        instance.mismatch_count += 1;
        if instance.mismatch_count >= MISMATCH_THRESHOLD {
            declare_loss(instance, host, &mut out);
        }
        return out;
    }

    instance.mismatch_count = 0;
    instance.consecutive_misses = 0;
    instance.hb_state = HbState::WaitingChallenge;
    out.rearm_interval_timer = true;

    if !instance.heartbeating {
        instance.heartbeating = true;
        out.events.push(Event::HeartbeatRunning { host: host.clone(), instance: instance.uuid.clone() });
    }

    let reported_health = match heartbeat_health {
        Health::Healthy => Health::Healthy,
        Health::Unhealthy => Health::Unhealthy,
    };
    if matches!(reported_health, Health::Unhealthy) && instance.last_health != Some(Health::Unhealthy) {
        let action = corrective_action.clone().unwrap_or_else(|| "unknown".to_string());
        out.events.push(Event::InstanceIllHealth { host: host.clone(), instance: instance.uuid.clone(), corrective_action: action });
    }
    instance.last_health = Some(reported_health);

    out
}

/// Heartbeat interval timer fired for this instance (§4.4.3).
pub fn handle_interval_timer(instance: &mut Instance, host: &HostName, hbs_failure_threshold: u32, next_nonce: u32) -> FsmOutput {
    let mut out = FsmOutput::default();
    match instance.hb_state {
        HbState::WaitingChallenge => {
            instance.last_challenge_nonce = Some(next_nonce);
            instance.hb_state = HbState::WaitingResponse;
            out.reply = Some(EngineMessage::Challenge {
                version: 1,
                revision: 0,
                sequence: next_sequence(instance),
            });
            out.rearm_interval_timer = true;
        }
        HbState::WaitingResponse => {
            instance.consecutive_misses += 1;
            if instance.consecutive_misses > hbs_failure_threshold {
                declare_loss(instance, host, &mut out);
            } else {
                out.rearm_interval_timer = true;
            }
        }
        HbState::WaitingInit => {}
    }
    out
}

fn declare_loss(instance: &mut Instance, host: &HostName, out: &mut FsmOutput) {
    instance.hb_state = HbState::WaitingInit;
    instance.consecutive_misses = 0;
    instance.mismatch_count = 0;
    out.events.push(Event::HeartbeatLossInstance { host: host.clone(), instance: instance.uuid.clone() });
    if instance.heartbeating {
        instance.heartbeating = false;
        out.events.push(Event::HeartbeatStopped { host: host.clone(), instance: instance.uuid.clone() });
    }
}

/// Monotonic per-instance sequence counter, also doubling as the
/// engine-side message sequence (§4.4.2 `sequence` field).
fn next_sequence(instance: &mut Instance) -> u32 {
    instance.negotiation.invocation_id.wrapping_add(instance.consecutive_misses)
}

/// Selects the notify timeout in milliseconds per the table in §4.4.3.
/// The event-type enum is closed to the values the table accounts for, so
/// there is no "otherwise" case to fall back on.
pub fn select_timeout_ms(event_type: EventType, notification_type: NotificationType, instance: &Instance) -> u64 {
    use EventType::*;
    use NotificationType::*;
    match (notification_type, event_type) {
        (Revocable, _) => instance.timeouts.vote_secs * 1000,
        (Irrevocable, Stop | Reboot) => instance.timeouts.shutdown_notice_secs * 1000,
        (Irrevocable, Suspend | Pause | LiveMigrateBegin | ColdMigrateBegin) => instance.timeouts.suspend_notice_secs * 1000,
        (Irrevocable, Unpause | Resume | LiveMigrateEnd | ColdMigrateEnd) => instance.timeouts.resume_notice_secs * 1000,
    }
}

/// Orchestrator intent arrives on C5 (§4.4.3 voting axis, "on orchestrator
/// intent (C5)").
pub fn handle_notify_intent(instance: &mut Instance, invocation_id: u32, event_type: EventType, notification_type: NotificationType) -> FsmOutput {
    let timeout_ms = select_timeout_ms(event_type, notification_type, instance);

    instance.negotiation.invocation_id = invocation_id;
    instance.negotiation.event_type = Some(event_type);
    instance.negotiation.notification_type = Some(notification_type);
    instance.vn_state = VnState::WaitingShutdownResponse;

    FsmOutput {
        reply: Some(EngineMessage::Notify {
            version: 1,
            revision: 0,
            sequence: next_sequence(instance),
            invocation_id,
            event_type,
            notification_type,
        }),
        start_vote_timer_ms: Some(timeout_ms),
        ..Default::default()
    }
}

/// Guest sent `action_response` (§4.4.3).
pub fn handle_action_response(instance: &mut Instance, host: &HostName, msg: &GuestMessage) -> FsmOutput {
    let GuestMessage::ActionResponse { invocation_id, vote_result, reason, version, revision, sequence } = msg else {
        return FsmOutput::default();
    };

    if *invocation_id != instance.negotiation.invocation_id {
        return FsmOutput::reply(EngineMessage::Nack {
            version: *version,
            revision: *revision,
            sequence: *sequence,
            reason: format!("invocation_id mismatch: expected {}, got {}", instance.negotiation.invocation_id, invocation_id),
        });
    }

    let mut out = FsmOutput { cancel_vote_timer: true, ..Default::default() };
    conclude_vote(instance, host, *vote_result, reason.clone(), &mut out);
    out
}

/// Vote timer expired with no `action_response` (§4.4.3: "Vote-timer
/// expiry with no response constitutes silent agreement").
pub fn handle_vote_timeout(instance: &mut Instance, host: &HostName) -> FsmOutput {
    let Some(notification_type) = instance.negotiation.notification_type else {
        return FsmOutput::default();
    };
    let synthesized = match notification_type {
        NotificationType::Revocable => VoteResult::Accept,
        NotificationType::Irrevocable => VoteResult::Complete,
    };
    let mut out = FsmOutput::default();
    conclude_vote(instance, host, synthesized, Some("vote timer expired: silent agreement".to_string()), &mut out);
    out
}

fn conclude_vote(instance: &mut Instance, host: &HostName, vote_result: VoteResult, reason: Option<String>, out: &mut FsmOutput) {
    let Some(event_type) = instance.negotiation.event_type else { return };
    let Some(notification_type) = instance.negotiation.notification_type else { return };

    out.events.push(Event::VoteResult {
        host: host.clone(),
        instance: instance.uuid.clone(),
        notification_type,
        event_type,
        vote_result,
        reason,
    });
    instance.vn_state = VnState::WaitingInit;

    let immediate_reset = matches!(event_type, EventType::Suspend) && matches!(vote_result, VoteResult::Complete);
    let grace_reset = matches!(event_type, EventType::Pause | EventType::Reboot | EventType::LiveMigrateBegin | EventType::ColdMigrateBegin | EventType::Suspend);

    if immediate_reset {
        if instance.heartbeating {
            instance.heartbeating = false;
            out.events.push(Event::HeartbeatStopped { host: host.clone(), instance: instance.uuid.clone() });
        }
        instance.hb_state = HbState::WaitingInit;
    } else if grace_reset {
        out.schedule_grace_reset = true;
    }
}

/// Applies a previously-scheduled grace-period reset (§4.4.3). A no-op if
/// the heartbeat axis already moved on (e.g. a fresh `init` arrived first).
pub fn apply_grace_reset(instance: &mut Instance) {
    if instance.hb_state != HbState::WaitingInit {
        instance.hb_state = HbState::WaitingInit;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn host() -> HostName {
        HostName::from("worker-1")
    }

    fn instance() -> Instance {
        Instance::new(
            "8d80875b-fa73-4ccb-bce3-1cd4df10449d".into(),
            "vm1".into(),
            host(),
            PathBuf::from("/var/run/cgcs.heartbeat.8d80875b.sock"),
            Duration::from_secs(1),
        )
    }

    fn init_msg() -> GuestMessage {
        GuestMessage::Init {
            version: 1,
            revision: 0,
            sequence: 1,
            invocation_id: 0,
            name: "vm1".into(),
            corrective_action: "none".into(),
            heartbeat_interval_ms: 1000,
            vote_secs: 10,
            shutdown_notice_secs: 30,
            suspend_notice_secs: 30,
            resume_notice_secs: 30,
            restart_secs: 120,
        }
    }

    #[test]
    fn init_sends_ack_and_first_challenge_nonce() {
        let mut inst = instance();
        let out = handle_init(&mut inst, &init_msg(), 7, 42);
        assert_eq!(inst.hb_state, HbState::WaitingResponse);
        assert_eq!(inst.last_challenge_nonce, Some(42));
        assert!(matches!(out.reply, Some(EngineMessage::InitAck { .. })));
        assert!(out.rearm_interval_timer);
    }

    #[test]
    fn matching_challenge_response_moves_to_waiting_challenge_and_flags_running() {
        let mut inst = instance();
        handle_init(&mut inst, &init_msg(), 7, 42);
        let response = GuestMessage::ChallengeResponse {
            version: 1,
            revision: 0,
            sequence: 2,
            heartbeat_response: 42,
            heartbeat_health: Health::Healthy,
            corrective_action: None,
            log_msg: None,
        };
        let out = handle_challenge_response(&mut inst, &host(), &response);
        assert_eq!(inst.hb_state, HbState::WaitingChallenge);
        assert!(inst.heartbeating);
        assert!(out.events.iter().any(|e| matches!(e, Event::HeartbeatRunning { .. })));
    }

    #[test]
    fn heartbeat_running_fires_only_once_across_many_valid_responses() {
        let mut inst = instance();
        handle_init(&mut inst, &init_msg(), 7, 42);
        let response = |nonce: u32| GuestMessage::ChallengeResponse {
            version: 1,
            revision: 0,
            sequence: 2,
            heartbeat_response: nonce,
            heartbeat_health: Health::Healthy,
            corrective_action: None,
            log_msg: None,
        };
        let first = handle_challenge_response(&mut inst, &host(), &response(42));
        assert_eq!(first.events.iter().filter(|e| matches!(e, Event::HeartbeatRunning { .. })).count(), 1);
        inst.last_challenge_nonce = Some(99);
        let second = handle_challenge_response(&mut inst, &host(), &response(99));
        assert_eq!(second.events.iter().filter(|e| matches!(e, Event::HeartbeatRunning { .. })).count(), 0);
    }

    #[test]
    fn mismatched_nonce_is_counted_not_a_miss() {
        let mut inst = instance();
        handle_init(&mut inst, &init_msg(), 7, 42);
        let response = GuestMessage::ChallengeResponse {
            version: 1,
            revision: 0,
            sequence: 2,
            heartbeat_response: 999,
            heartbeat_health: Health::Healthy,
            corrective_action: None,
            log_msg: None,
        };
        let out = handle_challenge_response(&mut inst, &host(), &response);
        assert_eq!(inst.mismatch_count, 1);
        assert_eq!(inst.consecutive_misses, 0);
        assert!(out.events.is_empty());
        assert_eq!(inst.hb_state, HbState::WaitingResponse, "a mismatch must not advance the axis");
    }

    #[test]
    fn unhealthy_response_emits_ill_health_once_per_transition() {
        let mut inst = instance();
        handle_init(&mut inst, &init_msg(), 7, 42);
        let unhealthy = GuestMessage::ChallengeResponse {
            version: 1,
            revision: 0,
            sequence: 2,
            heartbeat_response: 42,
            heartbeat_health: Health::Unhealthy,
            corrective_action: Some("reboot".into()),
            log_msg: None,
        };
        let out = handle_challenge_response(&mut inst, &host(), &unhealthy);
        assert!(out.events.iter().any(|e| matches!(e, Event::InstanceIllHealth { corrective_action, .. } if corrective_action == "reboot")));
        assert_eq!(inst.hb_state, HbState::WaitingChallenge, "heartbeat axis still advances on an unhealthy response");

        inst.last_challenge_nonce = Some(7);
        let unhealthy_again = GuestMessage::ChallengeResponse {
            version: 1,
            revision: 0,
            sequence: 3,
            heartbeat_response: 7,
            heartbeat_health: Health::Unhealthy,
            corrective_action: None,
            log_msg: None,
        };
        let out2 = handle_challenge_response(&mut inst, &host(), &unhealthy_again);
        assert!(out2.events.iter().all(|e| !matches!(e, Event::InstanceIllHealth { .. })), "must not re-fire while already unhealthy");
    }

    #[test]
    fn interval_timer_in_waiting_challenge_sends_new_challenge() {
        let mut inst = instance();
        inst.hb_state = HbState::WaitingChallenge;
        let out = handle_interval_timer(&mut inst, &host(), 3, 55);
        assert_eq!(inst.hb_state, HbState::WaitingResponse);
        assert_eq!(inst.last_challenge_nonce, Some(55));
        assert!(matches!(out.reply, Some(EngineMessage::Challenge { .. })));
    }

    #[test]
    fn crossing_miss_threshold_declares_loss_and_stops_heartbeating() {
        let mut inst = instance();
        handle_init(&mut inst, &init_msg(), 7, 42);
        inst.heartbeating = true;
        for _ in 0..3 {
            let out = handle_interval_timer(&mut inst, &host(), 3, 0);
            assert!(out.events.is_empty());
        }
        let out = handle_interval_timer(&mut inst, &host(), 3, 0);
        assert_eq!(inst.hb_state, HbState::WaitingInit);
        assert!(!inst.heartbeating);
        assert!(out.events.iter().any(|e| matches!(e, Event::HeartbeatLossInstance { .. })));
        assert!(out.events.iter().any(|e| matches!(e, Event::HeartbeatStopped { .. })));
    }

    #[test]
    fn revocable_notify_uses_vote_secs_timeout() {
        let mut inst = instance();
        handle_init(&mut inst, &init_msg(), 7, 42);
        let out = handle_notify_intent(&mut inst, 1, EventType::Pause, NotificationType::Revocable);
        assert_eq!(out.start_vote_timer_ms, Some(10_000));
        assert_eq!(inst.vn_state, VnState::WaitingShutdownResponse);
    }

    #[test]
    fn irrevocable_stop_uses_shutdown_notice_secs() {
        let mut inst = instance();
        handle_init(&mut inst, &init_msg(), 7, 42);
        let out = handle_notify_intent(&mut inst, 1, EventType::Stop, NotificationType::Irrevocable);
        assert_eq!(out.start_vote_timer_ms, Some(30_000));
    }

    #[test]
    fn action_response_with_wrong_invocation_id_is_nacked() {
        let mut inst = instance();
        handle_init(&mut inst, &init_msg(), 7, 42);
        handle_notify_intent(&mut inst, 9, EventType::Pause, NotificationType::Revocable);
        let resp = GuestMessage::ActionResponse { version: 1, revision: 0, sequence: 2, invocation_id: 1, vote_result: VoteResult::Accept, reason: None };
        let out = handle_action_response(&mut inst, &host(), &resp);
        assert!(matches!(out.reply, Some(EngineMessage::Nack { .. })));
        assert_eq!(inst.vn_state, VnState::WaitingShutdownResponse, "a nacked response must not conclude the vote");
    }

    #[test]
    fn matching_action_response_reports_vote_result_and_returns_to_waiting_init() {
        let mut inst = instance();
        handle_init(&mut inst, &init_msg(), 7, 42);
        handle_notify_intent(&mut inst, 9, EventType::Pause, NotificationType::Revocable);
        let resp = GuestMessage::ActionResponse { version: 1, revision: 0, sequence: 2, invocation_id: 9, vote_result: VoteResult::Accept, reason: None };
        let out = handle_action_response(&mut inst, &host(), &resp);
        assert!(out.cancel_vote_timer);
        assert_eq!(inst.vn_state, VnState::WaitingInit);
        assert!(out.events.iter().any(|e| matches!(e, Event::VoteResult { vote_result: VoteResult::Accept, .. })));
    }

    #[test]
    fn vote_timeout_synthesizes_accept_for_revocable() {
        let mut inst = instance();
        handle_init(&mut inst, &init_msg(), 7, 42);
        handle_notify_intent(&mut inst, 9, EventType::Pause, NotificationType::Revocable);
        let out = handle_vote_timeout(&mut inst, &host());
        assert!(out.events.iter().any(|e| matches!(e, Event::VoteResult { vote_result: VoteResult::Accept, .. })));
        assert_eq!(inst.vn_state, VnState::WaitingInit);
    }

    #[test]
    fn vote_timeout_synthesizes_complete_for_irrevocable() {
        let mut inst = instance();
        handle_init(&mut inst, &init_msg(), 7, 42);
        handle_notify_intent(&mut inst, 9, EventType::Stop, NotificationType::Irrevocable);
        let out = handle_vote_timeout(&mut inst, &host());
        assert!(out.events.iter().any(|e| matches!(e, Event::VoteResult { vote_result: VoteResult::Complete, .. })));
    }

    #[test]
    fn suspend_complete_immediately_resets_heartbeat_axis() {
        let mut inst = instance();
        handle_init(&mut inst, &init_msg(), 7, 42);
        inst.heartbeating = true;
        inst.hb_state = HbState::WaitingChallenge;
        handle_notify_intent(&mut inst, 9, EventType::Suspend, NotificationType::Irrevocable);
        let resp = GuestMessage::ActionResponse { version: 1, revision: 0, sequence: 2, invocation_id: 9, vote_result: VoteResult::Complete, reason: None };
        let out = handle_action_response(&mut inst, &host(), &resp);
        assert_eq!(inst.hb_state, HbState::WaitingInit);
        assert!(!inst.heartbeating);
        assert!(!out.schedule_grace_reset, "suspend+complete resets immediately, not via the grace path");
    }

    #[test]
    fn pause_schedules_a_grace_reset_instead_of_an_immediate_one() {
        let mut inst = instance();
        handle_init(&mut inst, &init_msg(), 7, 42);
        inst.hb_state = HbState::WaitingChallenge;
        handle_notify_intent(&mut inst, 9, EventType::Pause, NotificationType::Revocable);
        let resp = GuestMessage::ActionResponse { version: 1, revision: 0, sequence: 2, invocation_id: 9, vote_result: VoteResult::Accept, reason: None };
        let out = handle_action_response(&mut inst, &host(), &resp);
        assert!(out.schedule_grace_reset);
        assert_eq!(inst.hb_state, HbState::WaitingChallenge, "reset is delayed, not immediate");
    }
}
