// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Wind River Systems, Inc.

//! Watches the hypervisor channel-socket directory (§4.4.1) and connects
//! to each instance's channel as it appears, running the two-axis FSM
//! (§4.4.3) against the shared registry until the channel is torn down.

use std::path::PathBuf;
use std::sync::Arc;

use futures_util::StreamExt;
use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use maintd_core::clock::SystemClock;
use maintd_core::instance::InstanceUuid;
use maintd_core::registry::HostRegistry;
use maintd_core::Event;
use maintd_guestchan::channel::{on_connect_failure, on_connect_success, on_teardown, try_connect, ConnectOutcome};
use maintd_guestchan::discovery::{extract_uuid, ChannelWatcher, DiscoveryEvent};
use maintd_guestchan::framing::{drain_lines, FailureStreak, ParsedLine};
use maintd_guestchan::fsm;
use maintd_wire::guest::{EngineMessage, GuestMessage};

use crate::error::DaemonError;
use crate::registry_port::RegistryPort;

/// Watches `channel_dir` and spawns one connection task per discovered
/// instance socket.
pub async fn run_discovery(
    channel_dir: PathBuf,
    registry: Arc<Mutex<HostRegistry<SystemClock>>>,
    port: Arc<RegistryPort>,
    events: mpsc::UnboundedSender<Event>,
    hbs_failure_threshold: u32,
) -> Result<(), DaemonError> {
    let mut watcher = ChannelWatcher::new(&channel_dir).map_err(maintd_guestchan::GuestChanError::Watch)?;
    info!(dir = %channel_dir.display(), "watching guest channel directory");

    while let Some(event) = watcher.next().await {
        match event {
            DiscoveryEvent::Added(uuid, path) | DiscoveryEvent::Modified(uuid, path) => {
                if registry.lock().get_instance(&uuid).is_none() {
                    debug_unknown_instance(&uuid);
                    continue;
                }
                let registry = Arc::clone(&registry);
                let port = Arc::clone(&port);
                let events = events.clone();
                tokio::spawn(async move {
                    if let Err(e) = run_connection(uuid.clone(), path, registry, port, events, hbs_failure_threshold).await {
                        warn!(%uuid, error = %e, "guest channel connection task ended");
                    }
                });
            }
            DiscoveryEvent::Removed(name) => {
                if let Some(uuid) = extract_uuid(&name) {
                    port.detach_outbox(&InstanceUuid::from(uuid));
                }
            }
        }
    }
    Ok(())
}

fn debug_unknown_instance(uuid: &str) {
    tracing::debug!(uuid, "channel socket appeared for an instance not yet in inventory");
}

async fn run_connection(
    uuid: String,
    path: PathBuf,
    registry: Arc<Mutex<HostRegistry<SystemClock>>>,
    port: Arc<RegistryPort>,
    events: mpsc::UnboundedSender<Event>,
    hbs_failure_threshold: u32,
) -> Result<(), DaemonError> {
    let iid = InstanceUuid::from(uuid.as_str());

    let mut stream = loop {
        let outcome = try_connect(&path);
        let mut backoff = std::time::Duration::from_secs(1);
        let mut gone = false;
        {
            let mut reg = registry.lock();
            let Some(instance) = reg.get_instance_mut(&uuid) else { return Ok(()) };
            match &outcome {
                ConnectOutcome::Connected(_) => on_connect_success(&mut instance.channel),
                ConnectOutcome::Retry(_) => {
                    on_connect_failure(&mut instance.channel);
                    backoff = instance.channel.connect_backoff;
                }
                ConnectOutcome::InstanceGone => gone = true,
            }
        }
        if gone {
            return Ok(());
        }
        match outcome {
            ConnectOutcome::Connected(s) => break s,
            ConnectOutcome::InstanceGone => return Ok(()),
            ConnectOutcome::Retry(_) => tokio::time::sleep(backoff).await,
        }
    };

    let (outbox_tx, mut outbox_rx) = mpsc::unbounded_channel::<EngineMessage>();
    port.attach_outbox(iid.clone(), outbox_tx.clone());

    let heartbeat_interval = {
        let reg = registry.lock();
        reg.get_instance(&uuid).map(|i| i.heartbeat_interval).unwrap_or(std::time::Duration::from_secs(1))
    };
    let mut interval_timer = tokio::time::interval(heartbeat_interval);
    interval_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut buf = Vec::new();
    let mut read_buf = [0u8; 4096];
    let mut streak = FailureStreak::default();

    loop {
        tokio::select! {
            outgoing = outbox_rx.recv() => {
                let Some(msg) = outgoing else { break };
                let line = serde_json::to_vec(&msg)
                    .map_err(|e| DaemonError::GuestChan(maintd_guestchan::GuestChanError::Framing(e.to_string())))?;
                if stream.write_all(&line).await.is_err() || stream.write_all(b"\n").await.is_err() {
                    break;
                }
            }
            _ = interval_timer.tick() => {
                let closed = tick_interval(&registry, &events, &uuid, hbs_failure_threshold, &outbox_tx);
                if closed {
                    break;
                }
            }
            n = stream.read(&mut read_buf) => {
                match n {
                    Ok(0) => break,
                    Ok(n) => {
                        buf.extend_from_slice(&read_buf[..n]);
                        let mut torn_down = false;
                        for parsed in drain_lines(&mut buf) {
                            match parsed {
                                ParsedLine::Message(msg) => {
                                    streak.record_success();
                                    if handle_message(&registry, &events, &uuid, msg, &outbox_tx) {
                                        torn_down = true;
                                        break;
                                    }
                                }
                                ParsedLine::Malformed(_) => {
                                    if streak.record_failure() {
                                        warn!(%uuid, "too many consecutive malformed lines, tearing down channel");
                                        torn_down = true;
                                        break;
                                    }
                                }
                            }
                        }
                        if torn_down {
                            break;
                        }
                    }
                    Err(_) => break,
                }
            }
        }
    }

    port.detach_outbox(&iid);
    if let Some(instance) = registry.lock().get_instance_mut(&uuid) {
        on_teardown(&mut instance.channel);
    }
    Ok(())
}

/// Drives the heartbeat interval timer for one instance (§4.4.3): resends
/// the challenge or counts a miss, depending on which half of the axis the
/// instance is currently waiting on.
fn tick_interval(
    registry: &Arc<Mutex<HostRegistry<SystemClock>>>,
    events: &mpsc::UnboundedSender<Event>,
    uuid: &str,
    hbs_failure_threshold: u32,
    outbox_tx: &mpsc::UnboundedSender<EngineMessage>,
) -> bool {
    let mut reg = registry.lock();
    let Some(instance) = reg.get_instance_mut(uuid) else { return true };
    let host = instance.hostname.clone();
    let nonce = maintd_guestchan::random_u32();
    let output = fsm::handle_interval_timer(instance, &host, hbs_failure_threshold, nonce);
    drop(reg);

    for e in output.events {
        let _ = events.send(e);
    }
    if let Some(reply) = output.reply {
        let _ = outbox_tx.send(reply);
    }
    false
}

/// Dispatches one parsed guest message through the FSM. Returns `true` if
/// the channel should be torn down (an `exit` announcement).
fn handle_message(
    registry: &Arc<Mutex<HostRegistry<SystemClock>>>,
    events: &mpsc::UnboundedSender<Event>,
    uuid: &str,
    msg: GuestMessage,
    outbox_tx: &mpsc::UnboundedSender<EngineMessage>,
) -> bool {
    if matches!(msg, GuestMessage::Exit { .. }) {
        info!(uuid, "guest agent announced exit");
        return true;
    }

    let mut reg = registry.lock();
    let Some(instance) = reg.get_instance_mut(uuid) else { return false };
    let host = instance.hostname.clone();
    let invocation_id = maintd_guestchan::random_u32();
    let nonce = maintd_guestchan::random_u32();

    let output = match &msg {
        GuestMessage::Init { .. } => fsm::handle_init(instance, &msg, invocation_id, nonce),
        GuestMessage::ChallengeResponse { .. } => fsm::handle_challenge_response(instance, &host, &msg),
        GuestMessage::ActionResponse { .. } => fsm::handle_action_response(instance, &host, &msg),
        GuestMessage::Exit { .. } => unreachable!("handled above"),
    };
    drop(reg);

    for e in output.events {
        let _ = events.send(e);
    }
    if let Some(reply) = output.reply {
        let _ = outbox_tx.send(reply);
    }
    false
}
