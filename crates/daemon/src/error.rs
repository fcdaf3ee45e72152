// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Wind River Systems, Inc.

//! Daemon-fatal error taxonomy (§7 "Fatal"): socket creation failure at
//! startup, unparseable configuration, or a PID/state directory the daemon
//! cannot write to all abort the process after a diagnostic dump, rather
//! than retrying or degrading.

use thiserror::Error;

use crate::config::ConfigError;

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to bind {what} at {addr}: {source}")]
    Bind { what: &'static str, addr: String, source: std::io::Error },

    #[error("state directory {path} is not writable: {source}")]
    StateDir { path: String, source: std::io::Error },

    #[error("heartbeat engine: {0}")]
    Heartbeat(#[from] maintd_heartbeat::HeartbeatError),

    #[error("link monitor: {0}")]
    Linkmon(#[from] maintd_linkmon::LinkmonError),

    #[error("guest channel: {0}")]
    GuestChan(#[from] maintd_guestchan::GuestChanError),

    #[error("orchestrator adapter: {0}")]
    Orchestrator(#[from] maintd_orchestrator::OrchestratorError),
}
