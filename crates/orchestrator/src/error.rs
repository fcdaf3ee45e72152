// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Wind River Systems, Inc.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("token request failed: {0}")]
    Token(String),
    #[error("outbound request failed after retries: {0}")]
    OutboundExhausted(String),
    #[error("config: {0}")]
    Config(String),
    #[error(transparent)]
    Core(#[from] maintd_core::CoreError),
}
