// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Wind River Systems, Inc.

//! Host/instance inventory (C1, spec §4.1).
//!
//! The registry is pure in-memory bookkeeping: it does not itself close
//! sockets or cancel timers. `remove`/`remove_instance` return the removed
//! value so the owning engine can perform the actual teardown (channel
//! close, timer cancellation) before the value is dropped — this keeps
//! invariant 2 and 3 from spec §3 enforceable without the registry needing
//! a handle to every engine's I/O resources.

use std::collections::HashMap;

use tracing::warn;

use crate::clock::Clock;
use crate::host::{Host, HostName, HostUuid, Personality};
use crate::instance::{Instance, InstanceUuid};

/// Inventory fields carried by an orchestrator add/modify call (spec §4.1).
#[derive(Debug, Clone)]
pub struct HostInventory {
    pub hostname: HostName,
    pub uuid: HostUuid,
    pub personality: Personality,
    pub mgmt_ip: String,
    pub cluster_host_ip: Option<String>,
    pub mac: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Added,
    AlreadyPresent,
    InvalidName,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModifyOutcome {
    Ok,
    NotFound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    Ok,
    NotFound,
}

/// Lookup key accepted by `HostRegistry::get` (spec §4.1: "by hostname or
/// uuid" must return the same object, invariant 1 of spec §3).
#[derive(Debug, Clone, Copy)]
pub enum HostKey<'a> {
    Hostname(&'a str),
    Uuid(&'a str),
}

/// Keyed store of provisioned hosts, owning per-host and per-instance
/// state (spec §4.1 "Host Registry").
pub struct HostRegistry<C: Clock> {
    by_hostname: HashMap<String, HostUuid>,
    hosts: HashMap<HostUuid, Host>,
    instances: HashMap<InstanceUuid, Instance>,
    clock: C,
}

impl<C: Clock> HostRegistry<C> {
    pub fn new(clock: C) -> Self {
        Self { by_hostname: HashMap::new(), hosts: HashMap::new(), instances: HashMap::new(), clock }
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Add a host from inventory (spec §4.1).
    ///
    /// Rejects the empty string and the reserved sentinel `"none"`.
    /// Re-adding an already-present hostname returns `AlreadyPresent` as a
    /// signal for the caller to convert the call into a `modify`.
    pub fn add(&mut self, inv: HostInventory) -> AddOutcome {
        if !inv.hostname.is_valid() {
            warn!(hostname = %inv.hostname, "host add rejected: invalid hostname");
            return AddOutcome::InvalidName;
        }
        if self.by_hostname.contains_key(inv.hostname.as_str()) || self.hosts.contains_key(&inv.uuid) {
            warn!(hostname = %inv.hostname, uuid = %inv.uuid, "host add rejected: already present");
            return AddOutcome::AlreadyPresent;
        }
        let mut host = Host::new(inv.hostname.clone(), inv.uuid.clone(), inv.personality, inv.mgmt_ip);
        host.cluster_host_ip = inv.cluster_host_ip;
        host.mac = inv.mac;
        self.by_hostname.insert(inv.hostname.0, inv.uuid.clone());
        self.hosts.insert(inv.uuid, host);
        AddOutcome::Added
    }

    /// Update IPs, MAC, and personality for an existing host (spec §4.1).
    pub fn modify(&mut self, inv: HostInventory) -> ModifyOutcome {
        let Some(host) = self.hosts.get_mut(&inv.uuid) else {
            warn!(uuid = %inv.uuid, "host modify rejected: not found");
            return ModifyOutcome::NotFound;
        };
        host.personality = inv.personality;
        host.mgmt_ip = inv.mgmt_ip;
        host.cluster_host_ip = inv.cluster_host_ip;
        host.mac = inv.mac;
        ModifyOutcome::Ok
    }

    /// Remove a host and all of its instances.
    ///
    /// Returns the removed `Host` (and implicitly drains its instances from
    /// the instance map) so the caller can close channels and cancel
    /// timers before the values are dropped. Idempotent: removing an
    /// already-absent hostname returns `NotFound`, never panics.
    pub fn remove(&mut self, hostname: &str) -> (RemoveOutcome, Option<Host>, Vec<Instance>) {
        let Some(uuid) = self.by_hostname.remove(hostname) else {
            return (RemoveOutcome::NotFound, None, Vec::new());
        };
        let Some(host) = self.hosts.remove(&uuid) else {
            return (RemoveOutcome::NotFound, None, Vec::new());
        };
        let removed_instances = host
            .instances
            .iter()
            .filter_map(|iid| self.instances.remove(iid))
            .collect();
        (RemoveOutcome::Ok, Some(host), removed_instances)
    }

    pub fn get(&self, key: HostKey<'_>) -> Option<&Host> {
        match key {
            HostKey::Hostname(h) => self.by_hostname.get(h).and_then(|uuid| self.hosts.get(uuid)),
            HostKey::Uuid(u) => self.hosts.get(u),
        }
    }

    pub fn get_mut(&mut self, key: HostKey<'_>) -> Option<&mut Host> {
        match key {
            HostKey::Hostname(h) => {
                let uuid = self.by_hostname.get(h)?.clone();
                self.hosts.get_mut(&uuid)
            }
            HostKey::Uuid(u) => self.hosts.get_mut(u),
        }
    }

    /// Stable-order iteration, tolerant of the callee removing the current
    /// host (spec §4.1 "safe-erase pattern"): ids are snapshotted up
    /// front, so a host removed mid-iteration is silently skipped rather
    /// than causing a panic or a skipped/duplicated neighbor.
    pub fn for_each(&self, mut f: impl FnMut(&Host)) {
        let ids: Vec<HostUuid> = self.hosts.keys().cloned().collect();
        for id in ids {
            if let Some(host) = self.hosts.get(&id) {
                f(host);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    // --- Instances ---

    /// Add an instance, attaching it to its owning host.
    ///
    /// Returns `false` without creating a duplicate if the instance uuid
    /// already exists (spec §8 concrete scenario 6: duplicate add is a
    /// no-op, not an error).
    pub fn add_instance(&mut self, instance: Instance) -> bool {
        if self.instances.contains_key(&instance.uuid) {
            return false;
        }
        if let Some(host_uuid) = self.by_hostname.get(instance.hostname.as_str()).cloned() {
            if let Some(host) = self.hosts.get_mut(&host_uuid) {
                host.instances.push(instance.uuid.clone());
            }
        }
        self.instances.insert(instance.uuid.clone(), instance);
        true
    }

    pub fn get_instance(&self, uuid: &str) -> Option<&Instance> {
        self.instances.get(uuid)
    }

    pub fn get_instance_mut(&mut self, uuid: &str) -> Option<&mut Instance> {
        self.instances.get_mut(uuid)
    }

    pub fn remove_instance(&mut self, uuid: &str) -> Option<Instance> {
        let instance = self.instances.remove(uuid)?;
        if let Some(host_uuid) = self.by_hostname.get(instance.hostname.as_str()).cloned() {
            if let Some(host) = self.hosts.get_mut(&host_uuid) {
                host.instances.retain(|id| id.as_str() != uuid);
            }
        }
        Some(instance)
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FakeClock;
    use std::path::PathBuf;
    use std::time::Duration;

    fn inv(hostname: &str, uuid: &str) -> HostInventory {
        HostInventory {
            hostname: HostName::from(hostname),
            uuid: HostUuid::from(uuid),
            personality: Personality::Worker,
            mgmt_ip: "10.0.0.5".into(),
            cluster_host_ip: None,
            mac: None,
        }
    }

    #[test]
    fn add_then_lookup_by_either_key() {
        let mut reg = HostRegistry::new(FakeClock::new());
        assert_eq!(reg.add(inv("worker-1", "u-1")), AddOutcome::Added);
        let by_name = reg.get(HostKey::Hostname("worker-1")).unwrap();
        let by_uuid = reg.get(HostKey::Uuid("u-1")).unwrap();
        assert_eq!(by_name.uuid, by_uuid.uuid);
        assert_eq!(by_name.hostname, by_uuid.hostname);
    }

    #[test]
    fn reserved_and_empty_hostnames_are_rejected() {
        let mut reg = HostRegistry::new(FakeClock::new());
        assert_eq!(reg.add(inv("none", "u-1")), AddOutcome::InvalidName);
        assert_eq!(reg.add(inv("", "u-2")), AddOutcome::InvalidName);
    }

    #[test]
    fn re_add_existing_hostname_is_already_present() {
        let mut reg = HostRegistry::new(FakeClock::new());
        assert_eq!(reg.add(inv("worker-1", "u-1")), AddOutcome::Added);
        assert_eq!(reg.add(inv("worker-1", "u-1")), AddOutcome::AlreadyPresent);
    }

    #[test]
    fn remove_is_idempotent_at_the_caller() {
        let mut reg = HostRegistry::new(FakeClock::new());
        reg.add(inv("worker-1", "u-1"));
        let (outcome, host, _) = reg.remove("worker-1");
        assert_eq!(outcome, RemoveOutcome::Ok);
        assert!(host.is_some());
        let (outcome2, host2, _) = reg.remove("worker-1");
        assert_eq!(outcome2, RemoveOutcome::NotFound);
        assert!(host2.is_none());
    }

    #[test]
    fn add_remove_add_matches_single_add() {
        let mut reg = HostRegistry::new(FakeClock::new());
        reg.add(inv("worker-1", "u-1"));
        reg.remove("worker-1");
        reg.add(inv("worker-1", "u-1"));
        assert_eq!(reg.len(), 1);
        assert!(reg.get(HostKey::Hostname("worker-1")).is_some());
    }

    #[test]
    fn removing_host_drains_its_instances() {
        let mut reg = HostRegistry::new(FakeClock::new());
        reg.add(inv("worker-1", "u-1"));
        let inst = Instance::new(
            InstanceUuid::from("i-1"),
            "vm1".into(),
            HostName::from("worker-1"),
            PathBuf::from("/sock"),
            Duration::from_secs(1),
        );
        assert!(reg.add_instance(inst));
        assert_eq!(reg.instance_count(), 1);
        let (_, _, removed) = reg.remove("worker-1");
        assert_eq!(removed.len(), 1);
        assert_eq!(reg.instance_count(), 0);
    }

    #[test]
    fn duplicate_instance_add_is_a_no_op() {
        let mut reg = HostRegistry::new(FakeClock::new());
        reg.add(inv("worker-1", "u-1"));
        let mk = || {
            Instance::new(
                InstanceUuid::from("i-1"),
                "vm1".into(),
                HostName::from("worker-1"),
                PathBuf::from("/sock"),
                Duration::from_secs(1),
            )
        };
        assert!(reg.add_instance(mk()));
        assert!(!reg.add_instance(mk()));
        assert_eq!(reg.instance_count(), 1);
        assert_eq!(reg.get(HostKey::Hostname("worker-1")).unwrap().instances.len(), 1);
    }

    #[test]
    fn for_each_tolerates_reentrant_removal() {
        let mut reg = HostRegistry::new(FakeClock::new());
        reg.add(inv("worker-1", "u-1"));
        reg.add(inv("worker-2", "u-2"));
        let mut seen = Vec::new();
        reg.for_each(|h| seen.push(h.hostname.0.clone()));
        seen.sort();
        assert_eq!(seen, vec!["worker-1".to_string(), "worker-2".to_string()]);
    }
}
