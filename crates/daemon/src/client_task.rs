// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Wind River Systems, Inc.

//! Drives the Client role (§4.3.3) live: answers Agent pulse requests on
//! one network, and re-sends the one-shot Ready Event to a loopback
//! endpoint until it's acknowledged.

use std::time::Duration;

use tracing::{debug, warn};

use maintd_core::host::{HostName, PulseNetwork};
use maintd_heartbeat::agent::{bind_multicast_rx, bind_tx, warn_short_read};
use maintd_heartbeat::client::{handle_request, ClientNetworkState, ReadyEventState};
use maintd_heartbeat::throttle::Throttle;
use maintd_heartbeat::ClientConfig;
use maintd_wire::pulse::WIRE_LEN;

use crate::config::PulseAddress;
use crate::error::DaemonError;

/// Runs until the socket errors out. Callers spawn one of these per
/// configured, addressed client network.
pub async fn run_client_network(
    hostname: HostName,
    _network: PulseNetwork,
    addr: PulseAddress,
    config: ClientConfig,
    ready_event_url: String,
) -> Result<(), DaemonError> {
    let rx_socket = bind_multicast_rx(addr.bind_addr, addr.multicast_group, addr.iface)?;
    let tx_socket = bind_tx(addr.bind_addr)?;

    let mut state = ClientNetworkState::default();
    let mut ready = ReadyEventState::default();
    let http = reqwest::Client::new();

    let retry = config.ready_event_retry();
    let mut ready_timer = tokio::time::interval(retry);
    let mut buf = [0u8; 1500];
    let mut recv_err_throttle = Throttle::new(Duration::from_secs(10));

    loop {
        tokio::select! {
            _ = ready_timer.tick() => {
                send_ready_event(&http, &ready_event_url, &mut ready, retry).await;
            }
            recv = rx_socket.recv_from(&mut buf) => {
                match recv {
                    Ok((len, peer)) => {
                        if len < WIRE_LEN {
                            warn_short_read(len);
                            continue;
                        }
                        match handle_request(&buf[..len], &hostname, &mut state, 1) {
                            Ok(Some(response)) => match response.encode() {
                                Ok(bytes) => {
                                    if let Err(e) = tx_socket.send_to(&bytes, peer).await {
                                        warn!(%peer, error = %e, "pulse response send failed");
                                    }
                                }
                                Err(e) => warn!(error = %e, "pulse response encode failed"),
                            },
                            Ok(None) => {}
                            Err(e) => debug!(error = %e, "dropping unparsable pulse request"),
                        }
                    }
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

async fn send_ready_event(http: &reqwest::Client, url: &str, ready: &mut ReadyEventState, retry: Duration) {
    let now = std::time::Instant::now();
    if !ready.should_send(now, retry) {
        return;
    }
    match http.post(url).send().await {
        Ok(resp) if resp.status().is_success() => ready.ack(),
        Ok(resp) => warn!(status = %resp.status(), "ready event endpoint rejected the notification"),
        Err(e) => warn!(error = %e, "ready event send failed, will retry"),
    }
    ready.mark_sent(now);
}
