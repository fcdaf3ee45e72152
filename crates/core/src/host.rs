// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Wind River Systems, Inc.

//! Host identity and liveness state (spec §3 "Host").

use std::collections::HashMap;
use std::fmt;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::instance::InstanceUuid;

/// Unique host name. Display/Hash/Eq delegate to the inner string so it can
/// be used directly as a `HashMap` key or borrowed as `&str`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HostName(pub String);

impl HostName {
    /// The reserved sentinel hostname that `HostRegistry::add` rejects.
    pub const RESERVED: &'static str = "none";

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_valid(&self) -> bool {
        !self.0.is_empty() && self.0 != Self::RESERVED
    }
}

impl fmt::Display for HostName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for HostName {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for HostName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::borrow::Borrow<str> for HostName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Unique host UUID, as assigned by the orchestrator's inventory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HostUuid(pub String);

impl HostUuid {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HostUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for HostUuid {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for HostUuid {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::borrow::Borrow<str> for HostUuid {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Host role in the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Personality {
    Controller,
    Worker,
    Storage,
}

/// Networks the heartbeat engine pulses over (spec §4.3.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PulseNetwork {
    Management,
    ClusterHost,
}

/// Minimal bitflags-style macro: the corpus doesn't carry the `bitflags`
/// crate, and a plain `u32` newtype with named `const`s is enough for four
/// bits that are never combined with user-facing parsing.
macro_rules! bitflags_u32 {
    (
        $(#[$meta:meta])*
        pub struct $name:ident {
            $( const $flag:ident = $val:expr ; )+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u32);

        impl $name {
            $( pub const $flag: $name = $name($val); )+

            pub const fn empty() -> Self {
                $name(0)
            }

            pub fn contains(&self, other: $name) -> bool {
                (self.0 & other.0) == other.0
            }

            pub fn set(&mut self, other: $name, on: bool) {
                if on {
                    self.0 |= other.0;
                } else {
                    self.0 &= !other.0;
                }
            }

            pub fn insert(&mut self, other: $name) {
                self.0 |= other.0;
            }
        }

        impl std::ops::BitOr for $name {
            type Output = $name;
            fn bitor(self, rhs: $name) -> $name {
                $name(self.0 | rhs.0)
            }
        }
    };
}

bitflags_u32! {
    /// Remote-side status flags carried in a pulse payload (spec §4.3.1).
    pub struct LivenessFlags {
        const PMOND_ALIVE = 0x1;
        const CLUSTER_HOST_PROVISIONED = 0x2;
        const STALL_WARN = 0x4;
        const STALL_CRIT = 0x8;
    }
}

/// Per-network liveness bookkeeping (spec §3).
#[derive(Debug, Clone, Default)]
pub struct NetworkLiveness {
    pub miss_count: u32,
    pub last_seen_sequence: u32,
    pub last_seen_time: Option<Instant>,
    pub flags: LivenessFlags,
    /// Resource Reference Index cached for this host on this network.
    pub rri: u32,
    /// True once this network has been declared FAILED (spec §4.3.2 step 3).
    /// Only an explicit clear by the registry layer resets this.
    pub failed: bool,
}

/// Host-level heartbeat failure state (spec §3).
#[derive(Debug, Clone, Default)]
pub struct HeartbeatFailureState {
    pub failed: bool,
    pub failures: u32,
    pub reporting_enabled: bool,
}

/// One provisioned node (spec §3 "Host").
#[derive(Debug, Clone)]
pub struct Host {
    pub hostname: HostName,
    pub uuid: HostUuid,
    pub personality: Personality,
    pub mgmt_ip: String,
    pub cluster_host_ip: Option<String>,
    pub mac: Option<String>,

    pub liveness: HashMap<PulseNetwork, NetworkLiveness>,
    pub hb_failure: HeartbeatFailureState,

    pub instances: Vec<InstanceUuid>,

    /// Timer ids currently outstanding for this host (invariant 3, spec §3):
    /// the host cannot be dropped while this is non-empty.
    pub outstanding_timers: Vec<crate::TimerId>,
}

impl Host {
    pub fn new(hostname: HostName, uuid: HostUuid, personality: Personality, mgmt_ip: String) -> Self {
        Self {
            hostname,
            uuid,
            personality,
            mgmt_ip,
            cluster_host_ip: None,
            mac: None,
            liveness: HashMap::new(),
            hb_failure: HeartbeatFailureState::default(),
            instances: Vec::new(),
            outstanding_timers: Vec::new(),
        }
    }

    /// True if at least one network has seen a valid response within
    /// `miss_threshold * interval` (invariant 4, spec §3) — callers track
    /// "within window" themselves via `NetworkLiveness::failed`; here we
    /// just fold across networks.
    pub fn heartbeating(&self) -> bool {
        self.liveness.values().any(|l| !l.failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_sentinel_is_invalid() {
        assert!(!HostName::from("none").is_valid());
        assert!(HostName::from("worker-1").is_valid());
        assert!(!HostName::from("").is_valid());
    }

    #[test]
    fn liveness_flags_roundtrip() {
        let mut f = LivenessFlags::empty();
        assert!(!f.contains(LivenessFlags::PMOND_ALIVE));
        f.insert(LivenessFlags::PMOND_ALIVE);
        assert!(f.contains(LivenessFlags::PMOND_ALIVE));
        assert!(!f.contains(LivenessFlags::CLUSTER_HOST_PROVISIONED));
    }

    #[test]
    fn heartbeating_true_if_any_network_alive() {
        let mut h = Host::new(HostName::from("worker-1"), HostUuid::from("u1"), Personality::Worker, "10.0.0.1".into());
        h.liveness.insert(PulseNetwork::Management, NetworkLiveness { failed: true, ..Default::default() });
        h.liveness.insert(PulseNetwork::ClusterHost, NetworkLiveness { failed: false, ..Default::default() });
        assert!(h.heartbeating());
        h.liveness.get_mut(&PulseNetwork::ClusterHost).unwrap().failed = true;
        assert!(!h.heartbeating());
    }
}
