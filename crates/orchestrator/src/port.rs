// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Wind River Systems, Inc.

//! The seam between the inbound REST router and whatever owns the
//! registry (the daemon's main loop, §5 "the Registry is owned by the
//! main loop; all accessors run on the same task"). Mirrors the
//! adapter-trait style used for agent backends elsewhere in this
//! codebase's lineage: the router depends only on this trait, never on a
//! concrete registry type, so it can be exercised with a fake in tests.

use async_trait::async_trait;

use maintd_core::host::{HostUuid, Personality};
use maintd_core::instance::{EventType, InstanceUuid, NotificationType, VoteResult};
use maintd_core::CoreError;

#[derive(Debug, Clone)]
pub struct ServiceSpec {
    pub service: String,
    pub enabled: bool,
}

#[derive(Debug, Clone)]
pub struct InstanceView {
    pub uuid: InstanceUuid,
    pub hostname: String,
    pub heartbeating: bool,
    pub reporting_enabled: bool,
}

#[derive(Debug, Clone)]
pub struct HostView {
    pub uuid: HostUuid,
    pub hostname: String,
    pub personality: Personality,
    pub reporting_enabled: bool,
}

#[derive(Debug, Clone)]
pub struct VoteStarted {
    pub invocation_id: u32,
    pub timeout_ms: u64,
}

/// Everything the inbound C5 router needs from the component that owns
/// the registry and the protocol engines.
#[async_trait]
pub trait InventoryPort: Send + Sync + 'static {
    async fn add_instance(&self, uuid: InstanceUuid, hostname: String, services: Vec<ServiceSpec>) -> Result<(), CoreError>;
    async fn modify_instance(&self, uuid: InstanceUuid, services: Vec<ServiceSpec>) -> Result<(), CoreError>;
    async fn remove_instance(&self, uuid: InstanceUuid) -> Result<(), CoreError>;
    async fn get_instance(&self, uuid: InstanceUuid) -> Result<InstanceView, CoreError>;
    async fn begin_vote(&self, uuid: InstanceUuid, event_type: EventType) -> Result<VoteStarted, CoreError>;
    async fn begin_notify(&self, uuid: InstanceUuid, event_type: EventType, notification_type: NotificationType) -> Result<VoteStarted, CoreError>;
    async fn enable_host(&self, uuid: HostUuid) -> Result<(), CoreError>;
    async fn get_host(&self, uuid: HostUuid) -> Result<HostView, CoreError>;
}

/// Re-exported so downstream callers constructing events don't need a
/// second `maintd_core` import just for this.
pub type VoteOutcome = VoteResult;
