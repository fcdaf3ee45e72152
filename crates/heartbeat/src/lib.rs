// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Wind River Systems, Inc.

//! Pulse heartbeat protocol engine (C3, §4.3): the Agent role (controller
//! side, tracks per-host liveness) and the Client role (node side, answers
//! pulse requests).

pub mod agent;
pub mod client;
pub mod config;
pub mod error;
pub mod throttle;

pub use config::{AgentConfig, ClientConfig};
pub use error::HeartbeatError;
