// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Wind River Systems, Inc.

//! Guest channel connection lifecycle (§4.4.1): connect with exponential
//! backoff capped at 60s, `ENOENT` ends the retry loop since it means the
//! instance is gone, not that the guest hasn't opened its socket yet.

use std::io;
use std::path::Path;

use socket2::{Domain, SockAddr, Socket, Type};
use tokio::net::UnixStream;

use maintd_core::instance::ChannelState;

/// Outcome of one connect attempt, distinguishing "instance gone" from an
/// ordinary transient failure so the caller knows whether to keep retrying.
#[derive(Debug)]
pub enum ConnectOutcome {
    Connected(UnixStream),
    Retry(io::Error),
    InstanceGone,
}

/// Attempts one non-blocking connect to the channel socket with
/// `SO_LINGER=0` so a torn-down channel doesn't linger in TIME_WAIT-like
/// state on the unix socket (§4.4.1, §5 "sockets are owned by the
/// component that created them and closed exactly once on teardown").
pub fn try_connect(path: &Path) -> ConnectOutcome {
    let socket = match Socket::new(Domain::UNIX, Type::STREAM, None) {
        Ok(s) => s,
        Err(e) => return ConnectOutcome::Retry(e),
    };
    if let Err(e) = socket.set_nonblocking(true) {
        return ConnectOutcome::Retry(e);
    }
    let _ = socket.set_linger(Some(std::time::Duration::ZERO));

    let addr = match SockAddr::unix(path) {
        Ok(a) => a,
        Err(e) => return ConnectOutcome::Retry(e),
    };

    match socket.connect(&addr) {
        Ok(()) => {}
        Err(e) if e.raw_os_error() == Some(libc::EINPROGRESS) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => return ConnectOutcome::InstanceGone,
        Err(e) => return ConnectOutcome::Retry(e),
    }

    let std_stream: std::os::unix::net::UnixStream = socket.into();
    match UnixStream::from_std(std_stream) {
        Ok(stream) => ConnectOutcome::Connected(stream),
        Err(e) => ConnectOutcome::Retry(e),
    }
}

/// Applies one failed connect attempt's outcome to the channel's backoff
/// state (§4.4.1: doubles, capped at 60s).
pub fn on_connect_failure(state: &mut ChannelState) {
    state.connecting = false;
    state.connected = false;
    state.chan_ok = false;
    state.double_backoff();
}

pub fn on_connect_success(state: &mut ChannelState) {
    state.connecting = false;
    state.connected = true;
    state.chan_ok = true;
}

/// Torn-down channel resets to disconnected but keeps its current backoff
/// (a torn-down channel is presumed to have just failed, so the next
/// attempt should still wait).
pub fn on_teardown(state: &mut ChannelState) {
    state.connected = false;
    state.chan_ok = false;
    state.connecting = false;
}
