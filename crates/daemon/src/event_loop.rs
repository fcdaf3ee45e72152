// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Wind River Systems, Inc.

//! Drains the protocol engines' `Event` stream and reports each one
//! southbound through the orchestrator's FM-shaped alarm/service/action
//! envelope (§4.5, §9). One task, so reporting order matches emission
//! order; a slow or failing report only delays later events, it never
//! drops the channel.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::warn;

use maintd_core::Event;
use maintd_orchestrator::outbound::{EventPayload, OutboundClient};

pub async fn run(mut events: mpsc::UnboundedReceiver<Event>, outbound: Arc<OutboundClient>) {
    while let Some(event) = events.recv().await {
        let name = event.name();
        let (subject, payload) = translate(event);
        if let Err(e) = outbound.report(&subject, &payload).await {
            warn!(event = name, subject, error = %e, "failed to report event southbound");
        }
    }
}

/// Maps one protocol-engine event onto the southbound subject (the
/// instance or host uuid slotted into `events_endpoint`'s `{uuid}`) and
/// its FM-shaped payload.
fn translate(event: Event) -> (String, EventPayload) {
    match event {
        Event::HeartbeatLoss { host, network } => (
            host.to_string(),
            EventPayload::Alarm {
                alarm_id: "heartbeat_loss".into(),
                reason_text: format!("heartbeat lost on {network:?} network"),
                severity: "major".into(),
            },
        ),
        Event::HeartbeatCleared { host, network } => (
            host.to_string(),
            EventPayload::Alarm {
                alarm_id: "heartbeat_loss".into(),
                reason_text: format!("heartbeat cleared on {network:?} network"),
                severity: "clear".into(),
            },
        ),
        Event::HeartbeatRunning { instance, .. } => {
            (instance.to_string(), EventPayload::Service { service: "heartbeat".into(), state: "enabled".into() })
        }
        Event::HeartbeatStopped { instance, .. } => {
            (instance.to_string(), EventPayload::Service { service: "heartbeat".into(), state: "disabled".into() })
        }
        Event::HeartbeatLossInstance { host, instance } => (
            instance.to_string(),
            EventPayload::Alarm {
                alarm_id: "instance_heartbeat_loss".into(),
                reason_text: format!("instance heartbeat lost on {host}"),
                severity: "major".into(),
            },
        ),
        Event::InstanceIllHealth { instance, corrective_action, .. } => (
            instance.to_string(),
            EventPayload::Alarm {
                alarm_id: "instance_ill_health".into(),
                reason_text: format!("guest reported unhealthy, corrective action: {corrective_action}"),
                severity: "critical".into(),
            },
        ),
        Event::VoteResult { instance, event_type, vote_result, reason, .. } => (
            instance.to_string(),
            EventPayload::Action { action: format!("{event_type:?}"), result: format!("{vote_result:?}"), reason },
        ),
        Event::LinkStateChanged { role, name, up, .. } => (
            name.clone(),
            EventPayload::Alarm {
                alarm_id: "link_state_changed".into(),
                reason_text: format!("{role:?} interface {name} is {}", if up { "up" } else { "down" }),
                severity: if up { "clear".into() } else { "major".into() },
            },
        ),
    }
}
