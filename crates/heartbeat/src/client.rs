// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Wind River Systems, Inc.

//! Client role (§4.3.3): the node side of the pulse protocol, answering
//! requests from the Agent and sending the one-shot Ready Event.

use std::time::Instant;

use maintd_core::host::{HostName, LivenessFlags};
use maintd_wire::pulse::{PulseCodecError, PulseDirection, PulseMessage};

/// Per-network cached state the Client keeps between requests (§4.3.3
/// step 2: "cache the clue if ... the clue differs from the cached one").
#[derive(Debug, Clone, Default)]
pub struct ClientNetworkState {
    pub cached_rri: u32,
    pub local_flags: LivenessFlags,
}

/// Validates an incoming datagram and, if it's a well-formed request,
/// builds the response the Client should send back (§4.3.3 steps 1-3).
/// Returns `Err` only for a magic/decode failure (caller logs it
/// throttled and drops the datagram, per §4.3.5).
pub fn handle_request(
    bytes: &[u8],
    our_hostname: &HostName,
    state: &mut ClientNetworkState,
    version: u32,
) -> Result<Option<PulseMessage>, PulseCodecError> {
    let request = PulseMessage::decode(bytes)?;
    if request.direction != PulseDirection::Request {
        return Ok(None);
    }

    if &request.hostname == our_hostname && request.clue != state.cached_rri {
        state.cached_rri = request.clue;
    }

    Ok(Some(PulseMessage {
        direction: PulseDirection::Response,
        hostname: our_hostname.clone(),
        sequence: request.sequence,
        clue: state.cached_rri,
        flags: state.local_flags.0,
        version,
    }))
}

/// One-shot "I'm up" message re-sent on a slow periodic until acked
/// (§4.3.3 "Ready Event"), regenerated whenever sockets are rebuilt.
#[derive(Debug, Clone, Copy)]
pub struct ReadyEventState {
    pub acked: bool,
    pub last_sent: Option<Instant>,
}

impl Default for ReadyEventState {
    fn default() -> Self {
        Self { acked: false, last_sent: None }
    }
}

impl ReadyEventState {
    /// Resets on socket rebuild: a fresh Ready Event must be sent again
    /// (§4.3.3 "regenerated after any reconfiguration that reopens
    /// sockets").
    pub fn reset_for_rebuild(&mut self) {
        self.acked = false;
        self.last_sent = None;
    }

    pub fn should_send(&self, now: Instant, retry: std::time::Duration) -> bool {
        if self.acked {
            return false;
        }
        match self.last_sent {
            None => true,
            Some(last) => now.duration_since(last) >= retry,
        }
    }

    pub fn mark_sent(&mut self, now: Instant) {
        self.last_sent = Some(now);
    }

    pub fn ack(&mut self) {
        self.acked = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn hostname() -> HostName {
        HostName::from("worker-1")
    }

    #[test]
    fn request_for_us_caches_new_clue() {
        let mut state = ClientNetworkState::default();
        let req = PulseMessage {
            direction: PulseDirection::Request,
            hostname: hostname(),
            sequence: 1,
            clue: 7,
            flags: 0,
            version: 1,
        };
        let bytes = req.encode().unwrap();
        let response = handle_request(&bytes, &hostname(), &mut state, 1).unwrap().unwrap();
        assert_eq!(state.cached_rri, 7);
        assert_eq!(response.clue, 7);
        assert_eq!(response.sequence, 1);
        assert_eq!(response.direction, PulseDirection::Response);
    }

    #[test]
    fn response_datagrams_are_ignored_not_answered() {
        let mut state = ClientNetworkState::default();
        let rsp = PulseMessage {
            direction: PulseDirection::Response,
            hostname: hostname(),
            sequence: 1,
            clue: 0,
            flags: 0,
            version: 1,
        };
        let bytes = rsp.encode().unwrap();
        assert!(handle_request(&bytes, &hostname(), &mut state, 1).unwrap().is_none());
    }

    #[test]
    fn ready_event_resends_until_acked() {
        let mut ready = ReadyEventState::default();
        let retry = Duration::from_secs(5);
        let t0 = Instant::now();
        assert!(ready.should_send(t0, retry));
        ready.mark_sent(t0);
        assert!(!ready.should_send(t0, retry), "must not resend before the retry interval");
        assert!(ready.should_send(t0 + retry, retry));
        ready.ack();
        assert!(!ready.should_send(t0 + retry, retry));
    }

    #[test]
    fn rebuild_forces_a_fresh_ready_event() {
        let mut ready = ReadyEventState::default();
        ready.mark_sent(Instant::now());
        ready.ack();
        ready.reset_for_rebuild();
        assert!(ready.should_send(Instant::now(), Duration::from_secs(5)));
    }
}
