// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Wind River Systems, Inc.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HeartbeatError {
    #[error("socket setup failed: {0}")]
    Socket(#[from] std::io::Error),
    #[error("wire codec error: {0}")]
    Codec(#[from] maintd_wire::PulseCodecError),
    #[error("config error: {0}")]
    Config(String),
}
