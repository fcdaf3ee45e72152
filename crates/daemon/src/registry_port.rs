// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Wind River Systems, Inc.

//! Wires the orchestrator adapter's `InventoryPort` seam to the real
//! in-memory registry (§4.1, §4.5, §5 "the Registry is owned by the main
//! loop"). Owns the per-instance outbox map the guest-channel connection
//! tasks use to pick up `EngineMessage`s produced by a vote/notify call,
//! and forwards protocol-engine `Event`s onward to the event-aggregation
//! loop that feeds the outbound orchestrator client.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use maintd_core::clock::SystemClock;
use maintd_core::host::{HostName, HostUuid};
use maintd_core::instance::{EventType, Instance, InstanceUuid, NotificationType};
use maintd_core::registry::{HostKey, HostRegistry};
use maintd_core::{CoreError, Event};
use maintd_guestchan::fsm;
use maintd_wire::guest::EngineMessage;

use maintd_orchestrator::port::{HostView, InstanceView, InventoryPort, ServiceSpec, VoteStarted};

/// Guest channel filename, matching the pattern the hypervisor's channel
/// directory uses (§4.4.1, mirrored in `maintd_guestchan::discovery`).
fn channel_path_for(channel_dir: &Path, uuid: &str) -> PathBuf {
    channel_dir.join(format!("cgcs.heartbeat.{uuid}.sock"))
}

pub struct RegistryPort {
    registry: Arc<Mutex<HostRegistry<SystemClock>>>,
    outboxes: Arc<Mutex<HashMap<InstanceUuid, mpsc::UnboundedSender<EngineMessage>>>>,
    events: mpsc::UnboundedSender<Event>,
    channel_dir: PathBuf,
    initial_backoff: std::time::Duration,
}

impl RegistryPort {
    pub fn new(
        registry: Arc<Mutex<HostRegistry<SystemClock>>>,
        events: mpsc::UnboundedSender<Event>,
        channel_dir: PathBuf,
        initial_backoff: std::time::Duration,
    ) -> Self {
        Self { registry, outboxes: Arc::new(Mutex::new(HashMap::new())), events, channel_dir, initial_backoff }
    }

    pub fn registry(&self) -> Arc<Mutex<HostRegistry<SystemClock>>> {
        Arc::clone(&self.registry)
    }

    /// Called by a guest-channel connection task once its socket is live,
    /// so `begin_vote`/`begin_notify` replies have somewhere to go.
    pub fn attach_outbox(&self, uuid: InstanceUuid, sender: mpsc::UnboundedSender<EngineMessage>) {
        self.outboxes.lock().insert(uuid, sender);
    }

    pub fn detach_outbox(&self, uuid: &InstanceUuid) {
        self.outboxes.lock().remove(uuid);
    }

    fn emit(&self, events: Vec<Event>) {
        for e in events {
            let _ = self.events.send(e);
        }
    }

    fn deliver(&self, uuid: &InstanceUuid, reply: Option<EngineMessage>) {
        let Some(msg) = reply else { return };
        if let Some(sender) = self.outboxes.lock().get(uuid) {
            let _ = sender.send(msg);
        } else {
            tracing::warn!(%uuid, "no live channel outbox to deliver negotiation reply to");
        }
    }
}

#[async_trait]
impl InventoryPort for RegistryPort {
    async fn add_instance(&self, uuid: InstanceUuid, hostname: String, services: Vec<ServiceSpec>) -> Result<(), CoreError> {
        let mut registry = self.registry.lock();
        if registry.get(HostKey::Hostname(&hostname)).is_none() {
            return Err(CoreError::NotFound(format!("host {hostname}")));
        }
        if registry.get_instance(uuid.as_str()).is_some() {
            return Ok(());
        }
        let reporting_enabled = services.iter().find(|s| s.service == "heartbeat").map(|s| s.enabled).unwrap_or(true);
        let channel_path = channel_path_for(&self.channel_dir, uuid.as_str());
        let mut instance = Instance::new(uuid.clone(), uuid.to_string(), HostName::from(hostname), channel_path, self.initial_backoff);
        instance.reporting_enabled = reporting_enabled;
        registry.add_instance(instance);
        Ok(())
    }

    async fn modify_instance(&self, uuid: InstanceUuid, services: Vec<ServiceSpec>) -> Result<(), CoreError> {
        let mut registry = self.registry.lock();
        let instance = registry.get_instance_mut(uuid.as_str()).ok_or_else(|| CoreError::NotFound(uuid.to_string()))?;
        if let Some(spec) = services.iter().find(|s| s.service == "heartbeat") {
            instance.reporting_enabled = spec.enabled;
        }
        Ok(())
    }

    async fn remove_instance(&self, uuid: InstanceUuid) -> Result<(), CoreError> {
        let removed = self.registry.lock().remove_instance(uuid.as_str());
        self.detach_outbox(&uuid);
        removed.map(|_| ()).ok_or_else(|| CoreError::NotFound(uuid.to_string()))
    }

    async fn get_instance(&self, uuid: InstanceUuid) -> Result<InstanceView, CoreError> {
        let registry = self.registry.lock();
        let instance = registry.get_instance(uuid.as_str()).ok_or_else(|| CoreError::NotFound(uuid.to_string()))?;
        Ok(InstanceView {
            uuid: instance.uuid.clone(),
            hostname: instance.hostname.to_string(),
            heartbeating: instance.heartbeating,
            reporting_enabled: instance.reporting_enabled,
        })
    }

    async fn begin_vote(&self, uuid: InstanceUuid, event_type: EventType) -> Result<VoteStarted, CoreError> {
        let invocation_id = maintd_guestchan::random_u32();
        let (timeout_ms, reply, events, host) = {
            let mut registry = self.registry.lock();
            let instance = registry.get_instance_mut(uuid.as_str()).ok_or_else(|| CoreError::NotFound(uuid.to_string()))?;
            let host = instance.hostname.clone();
            let timeout_ms = fsm::select_timeout_ms(event_type, NotificationType::Revocable, instance);
            let output = fsm::handle_notify_intent(instance, invocation_id, event_type, NotificationType::Revocable);
            (timeout_ms, output.reply, output.events, host)
        };
        let _ = host;
        self.emit(events);
        self.deliver(&uuid, reply);
        Ok(VoteStarted { invocation_id, timeout_ms })
    }

    async fn begin_notify(&self, uuid: InstanceUuid, event_type: EventType, notification_type: NotificationType) -> Result<VoteStarted, CoreError> {
        let invocation_id = maintd_guestchan::random_u32();
        let (timeout_ms, reply, events) = {
            let mut registry = self.registry.lock();
            let instance = registry.get_instance_mut(uuid.as_str()).ok_or_else(|| CoreError::NotFound(uuid.to_string()))?;
            let timeout_ms = fsm::select_timeout_ms(event_type, notification_type, instance);
            let output = fsm::handle_notify_intent(instance, invocation_id, event_type, notification_type);
            (timeout_ms, output.reply, output.events)
        };
        self.emit(events);
        self.deliver(&uuid, reply);
        Ok(VoteStarted { invocation_id, timeout_ms })
    }

    async fn enable_host(&self, uuid: HostUuid) -> Result<(), CoreError> {
        let mut registry = self.registry.lock();
        let host = registry.get_mut(HostKey::Uuid(uuid.as_str())).ok_or_else(|| CoreError::NotFound(uuid.to_string()))?;
        host.hb_failure.reporting_enabled = true;
        Ok(())
    }

    async fn get_host(&self, uuid: HostUuid) -> Result<HostView, CoreError> {
        let registry = self.registry.lock();
        let host = registry.get(HostKey::Uuid(uuid.as_str())).ok_or_else(|| CoreError::NotFound(uuid.to_string()))?;
        Ok(HostView { uuid: host.uuid.clone(), hostname: host.hostname.to_string(), personality: host.personality, reporting_enabled: host.hb_failure.reporting_enabled })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maintd_core::host::Personality;
    use maintd_core::registry::HostInventory;
    use std::time::Duration;

    fn port_with_host() -> (RegistryPort, mpsc::UnboundedReceiver<Event>) {
        let registry = Arc::new(Mutex::new(HostRegistry::new(SystemClock)));
        registry.lock().add(HostInventory {
            hostname: HostName::from("worker-1"),
            uuid: HostUuid::from("h-1"),
            personality: Personality::Worker,
            mgmt_ip: "10.0.0.5".into(),
            cluster_host_ip: None,
            mac: None,
        });
        let (tx, rx) = mpsc::unbounded_channel();
        (RegistryPort::new(registry, tx, PathBuf::from("/var/run/maintd/channels"), Duration::from_secs(1)), rx)
    }

    #[tokio::test]
    async fn add_instance_rejects_unknown_host() {
        let (port, _rx) = port_with_host();
        let result = port.add_instance(InstanceUuid::from("i-1"), "no-such-host".into(), vec![ServiceSpec { service: "heartbeat".into(), enabled: true }]).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn add_then_get_round_trips() {
        let (port, _rx) = port_with_host();
        port.add_instance(InstanceUuid::from("i-1"), "worker-1".into(), vec![ServiceSpec { service: "heartbeat".into(), enabled: true }]).await.unwrap();
        let view = port.get_instance(InstanceUuid::from("i-1")).await.unwrap();
        assert_eq!(view.hostname, "worker-1");
        assert!(!view.heartbeating);
    }

    #[tokio::test]
    async fn add_instance_is_idempotent() {
        let (port, _rx) = port_with_host();
        let specs = || vec![ServiceSpec { service: "heartbeat".into(), enabled: true }];
        port.add_instance(InstanceUuid::from("i-1"), "worker-1".into(), specs()).await.unwrap();
        port.add_instance(InstanceUuid::from("i-1"), "worker-1".into(), specs()).await.unwrap();
        assert_eq!(port.registry.lock().instance_count(), 1);
    }

    #[tokio::test]
    async fn begin_vote_on_unknown_instance_fails() {
        let (port, _rx) = port_with_host();
        let result = port.begin_vote(InstanceUuid::from("ghost"), EventType::Stop).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn begin_vote_emits_a_notify_reply_to_the_attached_outbox() {
        let (port, _rx) = port_with_host();
        port.add_instance(InstanceUuid::from("i-1"), "worker-1".into(), vec![ServiceSpec { service: "heartbeat".into(), enabled: true }]).await.unwrap();
        let (tx, mut outbox_rx) = mpsc::unbounded_channel();
        port.attach_outbox(InstanceUuid::from("i-1"), tx);
        let started = port.begin_vote(InstanceUuid::from("i-1"), EventType::Stop).await.unwrap();
        assert!(started.timeout_ms > 0);
        assert!(outbox_rx.try_recv().is_ok());
    }
}
