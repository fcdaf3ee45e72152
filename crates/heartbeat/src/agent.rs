// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Wind River Systems, Inc.

//! Agent role (§4.3.2): the controller side of the pulse protocol. Sends a
//! pulse request per configured network on a fixed period and tracks
//! per-host response state.
//!
//! The miss/reset/fail bookkeeping is split out as pure functions
//! (`on_response`, `on_period_tick`) so the state machine can be tested
//! without a socket, the same separation the wire codec uses.

use std::net::SocketAddr;
use std::time::Instant;

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tracing::warn;

use maintd_core::host::{HostName, LivenessFlags, NetworkLiveness, PulseNetwork};
use maintd_core::Event;
use maintd_wire::pulse::{PulseDirection, PulseMessage, WIRE_LEN};

use crate::error::HeartbeatError;

/// Builds a non-blocking UDP socket joined to `group` on `iface_addr`,
/// `SO_REUSEADDR` set (§4.3.4).
pub fn bind_multicast_rx(bind_addr: SocketAddr, group: std::net::Ipv4Addr, iface: std::net::Ipv4Addr) -> Result<UdpSocket, HeartbeatError> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&bind_addr.into())?;
    socket.join_multicast_v4(&group, &iface)?;
    UdpSocket::from_std(socket.into()).map_err(HeartbeatError::Socket)
}

/// Builds the transmit socket, marked priority-class for the interface
/// where the platform supports `SO_PRIORITY` (Linux only; a no-op
/// elsewhere, matching §4.3.4's "marked priority-class" wording, which
/// the original only applies on Linux targets).
pub fn bind_tx(bind_addr: SocketAddr) -> Result<UdpSocket, HeartbeatError> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_nonblocking(true)?;
    socket.bind(&bind_addr.into())?;
    #[cfg(target_os = "linux")]
    {
        let _ = socket.set_tos(0xb8); // expedited-forwarding equivalent priority
    }
    UdpSocket::from_std(socket.into()).map_err(HeartbeatError::Socket)
}

pub fn encode_request(hostname: &HostName, sequence: u32, clue: u32, flags: u32, version: u32) -> Result<[u8; WIRE_LEN], HeartbeatError> {
    let msg = PulseMessage {
        direction: PulseDirection::Request,
        hostname: hostname.clone(),
        sequence,
        clue,
        flags,
        version,
    };
    Ok(msg.encode()?)
}

/// True if `response_seq` is within `[outstanding - tolerance, outstanding]`
/// (mod 2^32), implementing §4.3.2's tolerance window over a wrapping
/// sequence space.
pub fn accept_response(outstanding: u32, response_seq: u32, tolerance: u32) -> bool {
    let delta = outstanding.wrapping_sub(response_seq);
    delta <= tolerance
}

/// Applies one accepted response to a host/network's liveness state
/// (§4.3.2 steps 1-2). Does not un-fail a host that's already FAILED
/// (§4.3.2 "do not self-reset").
pub fn on_response(
    liveness: &mut NetworkLiveness,
    now: Instant,
    response_seq: u32,
    clue: u32,
    flags: LivenessFlags,
    outstanding: u32,
    tolerance: u32,
) -> bool {
    if !accept_response(outstanding, response_seq, tolerance) {
        return false;
    }
    liveness.last_seen_sequence = response_seq;
    liveness.last_seen_time = Some(now);
    liveness.flags = flags;
    if clue != 0 {
        liveness.rri = clue;
    }
    liveness.miss_count = 0;
    true
}

/// Called once per period for a host/network that did not produce an
/// accepted response this period. Returns `Some(Event::HeartbeatLoss)` the
/// first time the miss threshold is crossed; `None` otherwise, including
/// on every subsequent miss once already failed (§4.3.2 step 3).
pub fn on_period_tick(
    liveness: &mut NetworkLiveness,
    miss_threshold: u32,
    host: HostName,
    network: PulseNetwork,
) -> Option<Event> {
    if liveness.failed {
        liveness.miss_count = liveness.miss_count.saturating_add(1);
        return None;
    }
    liveness.miss_count = liveness.miss_count.saturating_add(1);
    if liveness.miss_count > miss_threshold {
        liveness.failed = true;
        return Some(Event::HeartbeatLoss { host, network });
    }
    None
}

/// Explicit clear, the only path that returns a FAILED host to responsive
/// (§4.3.2 step 3). Callers gate this on registry-level confirmation, not
/// on receiving a pulse response.
pub fn clear(liveness: &mut NetworkLiveness, host: HostName, network: PulseNetwork) -> Option<Event> {
    if !liveness.failed {
        return None;
    }
    liveness.failed = false;
    liveness.miss_count = 0;
    Some(Event::HeartbeatCleared { host, network })
}

pub fn warn_short_read(got: usize) {
    warn!(got, need = WIRE_LEN, "short read on pulse socket");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host() -> HostName {
        HostName::from("worker-1")
    }

    #[test]
    fn in_order_response_resets_miss_count() {
        let mut liveness = NetworkLiveness { miss_count: 2, ..Default::default() };
        let now = Instant::now();
        assert!(on_response(&mut liveness, now, 10, 0, LivenessFlags::empty(), 10, 0));
        assert_eq!(liveness.miss_count, 0);
        assert_eq!(liveness.last_seen_sequence, 10);
    }

    #[test]
    fn late_response_within_tolerance_still_resets() {
        let mut liveness = NetworkLiveness { miss_count: 1, ..Default::default() };
        assert!(on_response(&mut liveness, Instant::now(), 8, 0, LivenessFlags::empty(), 10, 2));
        assert_eq!(liveness.miss_count, 0);
    }

    #[test]
    fn response_outside_tolerance_is_rejected() {
        let mut liveness = NetworkLiveness { miss_count: 1, ..Default::default() };
        assert!(!on_response(&mut liveness, Instant::now(), 5, 0, LivenessFlags::empty(), 10, 2));
        assert_eq!(liveness.miss_count, 1, "rejected response must not touch state");
    }

    #[test]
    fn clue_zero_does_not_overwrite_cached_rri() {
        let mut liveness = NetworkLiveness { rri: 99, ..Default::default() };
        on_response(&mut liveness, Instant::now(), 1, 0, LivenessFlags::empty(), 1, 0);
        assert_eq!(liveness.rri, 99);
        on_response(&mut liveness, Instant::now(), 2, 42, LivenessFlags::empty(), 2, 0);
        assert_eq!(liveness.rri, 42);
    }

    #[test]
    fn crossing_miss_threshold_emits_heartbeat_loss_once() {
        let mut liveness = NetworkLiveness::default();
        for _ in 0..3 {
            assert!(on_period_tick(&mut liveness, 3, host(), PulseNetwork::Management).is_none());
        }
        let event = on_period_tick(&mut liveness, 3, host(), PulseNetwork::Management);
        assert!(matches!(event, Some(Event::HeartbeatLoss { .. })));
        // further misses must not re-emit
        assert!(on_period_tick(&mut liveness, 3, host(), PulseNetwork::Management).is_none());
    }

    #[test]
    fn response_after_fail_does_not_self_clear() {
        let mut liveness = NetworkLiveness { failed: true, miss_count: 10, ..Default::default() };
        let accepted = on_response(&mut liveness, Instant::now(), 1, 0, LivenessFlags::empty(), 1, 0);
        assert!(accepted);
        assert!(liveness.failed, "only an explicit clear may un-fail a host");
    }

    #[test]
    fn explicit_clear_resets_failed_state() {
        let mut liveness = NetworkLiveness { failed: true, miss_count: 10, ..Default::default() };
        let event = clear(&mut liveness, host(), PulseNetwork::Management);
        assert!(matches!(event, Some(Event::HeartbeatCleared { .. })));
        assert!(!liveness.failed);
        assert_eq!(liveness.miss_count, 0);
    }

    #[test]
    fn clear_on_healthy_host_is_a_no_op() {
        let mut liveness = NetworkLiveness::default();
        assert!(clear(&mut liveness, host(), PulseNetwork::Management).is_none());
    }

    #[test]
    fn sequence_wraparound_is_tolerated() {
        // outstanding wrapped to a small number, response carries the
        // pre-wrap value: delta computed mod 2^32 must still be tiny.
        assert!(accept_response(2, u32::MAX - 1, 5));
    }
}
