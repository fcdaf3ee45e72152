// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Wind River Systems, Inc.

//! Orchestrator Adapter (C5, §4.5): the only component that speaks HTTP
//! to the outside world. Northbound, it exposes the inventory/vote/notify
//! REST surface the orchestrator drives; southbound, it reports alarm,
//! service, and action events back, authenticated against a
//! Keystone-style identity endpoint.

pub mod error;
pub mod inbound;
pub mod outbound;
pub mod port;
pub mod token;

pub use error::OrchestratorError;
pub use inbound::{router, InboundConfig};
pub use outbound::{EventPayload, OutboundClient, OutboundConfig};
pub use port::{HostView, InstanceView, InventoryPort, ServiceSpec, VoteStarted};
pub use token::{TokenConfig, TokenManager, TokenSnapshot};
