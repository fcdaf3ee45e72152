// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Wind River Systems, Inc.

//! Error taxonomy shared across protocol engines (spec §7).
//!
//! Each engine crate defines its own `thiserror` enum for local detail, but
//! every error that can cross a component boundary converts into one of
//! these kinds so the orchestrator adapter can report a uniform surface
//! northbound and southbound.

use thiserror::Error;

/// Error kinds, not concrete types: every local error maps onto one of
/// these before it leaves its owning component.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("parse error: {0}")]
    Parse(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad state: {0}")]
    BadState(String),

    #[error("transient I/O error: {0}")]
    TransientIo(String),

    #[error("timeout")]
    Timeout,

    #[error("auth failure")]
    AuthFailure,

    #[error("fatal: {0}")]
    Fatal(String),
}

/// The closed set of REST failure reasons from spec §6.
///
/// Every HTTP error body is `{"status":"fail","reason":"<reason>"}` with
/// `reason` drawn from this set — never a freeform message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiReason {
    CommandParseError,
    NoBuffer,
    EntityNotFound,
    InvalidData,
    BadState,
    UnsupportedHttpCommand,
}

impl ApiReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApiReason::CommandParseError => "command parse error",
            ApiReason::NoBuffer => "no buffer",
            ApiReason::EntityNotFound => "entity not found",
            ApiReason::InvalidData => "invalid data",
            ApiReason::BadState => "bad state",
            ApiReason::UnsupportedHttpCommand => "unsupported http command",
        }
    }
}

impl From<&CoreError> for ApiReason {
    fn from(e: &CoreError) -> Self {
        match e {
            CoreError::Parse(_) => ApiReason::CommandParseError,
            CoreError::NotFound(_) => ApiReason::EntityNotFound,
            CoreError::BadState(_) => ApiReason::BadState,
            CoreError::TransientIo(_) => ApiReason::NoBuffer,
            CoreError::Timeout => ApiReason::BadState,
            CoreError::AuthFailure => ApiReason::InvalidData,
            CoreError::Fatal(_) => ApiReason::InvalidData,
        }
    }
}
