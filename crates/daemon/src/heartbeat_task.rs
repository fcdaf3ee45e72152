// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Wind River Systems, Inc.

//! Drives the Agent role (C3, §4.3.2) live: binds the multicast rx/tx
//! sockets for one pulse network and runs the periodic request/response
//! loop against the shared registry, using the pure step functions in
//! `maintd_heartbeat::agent` for every state transition.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use maintd_core::clock::SystemClock;
use maintd_core::host::{HostUuid, LivenessFlags, NetworkLiveness, PulseNetwork};
use maintd_core::registry::HostRegistry;
use maintd_core::Event;
use maintd_heartbeat::agent::{accept_response, bind_multicast_rx, bind_tx, encode_request, on_period_tick, on_response, warn_short_read};
use maintd_heartbeat::throttle::Throttle;
use maintd_heartbeat::AgentConfig;
use maintd_wire::pulse::{PulseDirection, PulseMessage, WIRE_LEN};

use crate::config::PulseAddress;
use crate::error::DaemonError;

/// Runs until the socket errors out. Callers spawn one of these per
/// configured, addressed network.
pub async fn run_agent_network(
    registry: Arc<Mutex<HostRegistry<SystemClock>>>,
    events: mpsc::UnboundedSender<Event>,
    network: PulseNetwork,
    addr: PulseAddress,
    config: AgentConfig,
) -> Result<(), DaemonError> {
    let rx_socket = bind_multicast_rx(addr.bind_addr, addr.multicast_group, addr.iface)?;
    let tx_socket = bind_tx(addr.bind_addr)?;
    let dest = std::net::SocketAddr::new(std::net::IpAddr::V4(addr.multicast_group), addr.dest_port);

    let mut outstanding: HashMap<HostUuid, u32> = HashMap::new();
    let mut sequence: u32 = 0;
    let mut interval = tokio::time::interval(config.period());
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut buf = [0u8; 1500];
    let mut recv_err_throttle = Throttle::new(std::time::Duration::from_secs(10));
    loop {
        tokio::select! {
            _ = interval.tick() => {
                sequence = sequence.wrapping_add(1);
                tick(&registry, &events, network, &config, &tx_socket, dest, &mut outstanding, sequence).await;
            }
            recv = rx_socket.recv_from(&mut buf) => {
                match recv {
                    Ok((len, _peer)) => handle_datagram(&registry, &buf[..len], network, &outstanding, config.tolerance),
                    Err(e) => {
                        if let Some(suppressed) = recv_err_throttle.allow(std::time::Instant::now()) {
                            warn!(error = %e, suppressed, "pulse socket recv error");
                        }
                    }
                }
            }
        }
    }
}

async fn tick(
    registry: &Arc<Mutex<HostRegistry<SystemClock>>>,
    events: &mpsc::UnboundedSender<Event>,
    network: PulseNetwork,
    config: &AgentConfig,
    tx_socket: &tokio::net::UdpSocket,
    dest: std::net::SocketAddr,
    outstanding: &mut HashMap<HostUuid, u32>,
    sequence: u32,
) {
    let hosts: Vec<(HostUuid, maintd_core::host::HostName)> = {
        let mut snapshot = Vec::new();
        registry.lock().for_each(|h| snapshot.push((h.uuid.clone(), h.hostname.clone())));
        snapshot
    };

    for (uuid, hostname) in hosts {
        match encode_request(&hostname, sequence, 0, 0, 1) {
            Ok(bytes) => {
                if let Err(e) = tx_socket.send_to(&bytes, dest).await {
                    warn!(%hostname, error = %e, "pulse send failed");
                }
            }
            Err(e) => warn!(%hostname, error = %e, "pulse request encode failed"),
        }

        let emitted = {
            let mut reg = registry.lock();
            reg.get_mut(maintd_core::registry::HostKey::Uuid(uuid.as_str())).and_then(|host| {
                let liveness = host.liveness.entry(network).or_insert_with(NetworkLiveness::default);
                on_period_tick(liveness, config.miss_threshold, hostname.clone(), network)
            })
        };
        if let Some(e) = emitted {
            let _ = events.send(e);
        }
        outstanding.insert(uuid, sequence);
    }
}

fn handle_datagram(registry: &Arc<Mutex<HostRegistry<SystemClock>>>, bytes: &[u8], network: PulseNetwork, outstanding: &HashMap<HostUuid, u32>, tolerance: u32) {
    if bytes.len() < WIRE_LEN {
        warn_short_read(bytes.len());
        return;
    }
    let msg = match PulseMessage::decode(bytes) {
        Ok(m) => m,
        Err(e) => {
            debug!(error = %e, "dropping unparsable pulse datagram");
            return;
        }
    };
    if msg.direction != PulseDirection::Response {
        return;
    }

    let mut reg = registry.lock();
    let Some(host) = reg.get_mut(maintd_core::registry::HostKey::Hostname(msg.hostname.as_str())) else { return };
    let Some(&last_sent) = outstanding.get(&host.uuid) else { return };
    if !accept_response(last_sent, msg.sequence, tolerance) {
        return;
    }
    let liveness = host.liveness.entry(network).or_insert_with(NetworkLiveness::default);
    let now = std::time::Instant::now();
    on_response(liveness, now, msg.sequence, msg.clue, LivenessFlags::default(), last_sent, tolerance);
}
