// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Wind River Systems, Inc.

//! Kernel network interface model (spec §3 "Link", §4.2).

use serde::{Deserialize, Serialize};

/// Platform network role a link is mapped to (spec §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkRole {
    Management,
    ClusterHost,
    Oam,
    Data,
}

impl LinkRole {
    pub fn config_key(&self) -> &'static str {
        match self {
            LinkRole::Management => "management_interface",
            LinkRole::ClusterHost => "cluster_host_interface",
            LinkRole::Oam => "oam_interface",
            LinkRole::Data => "data_network_interface",
        }
    }
}

/// Device kind, resolved from sysfs `uevent`/`iflink` (spec §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkKind {
    Ethernet,
    Vlan,
    Bond,
}

/// A single observed kernel interface (slave of a bond, or a standalone
/// ethernet/vlan link).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkSlave {
    pub name: String,
    pub up: bool,
    pub last_change_us: u64,
}

/// One physical or logical kernel network interface under observation
/// (spec §3 "Link").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Link {
    pub name: String,
    pub role: LinkRole,
    pub kind: LinkKind,
    pub up: bool,
    pub last_change_us: u64,
    /// Populated only when `kind == Bond`.
    pub slaves: Vec<LinkSlave>,
}

impl Link {
    pub fn new(name: String, role: LinkRole, kind: LinkKind, now_us: u64) -> Self {
        Self { name, role, kind, up: false, last_change_us: now_us, slaves: Vec::new() }
    }

    /// Applies the bond escalation policy resolved in DESIGN.md for the
    /// Open Question in spec §9: `up` is false only when *both* slaves are
    /// down; a single slave down is a degraded-but-up condition.
    pub fn bond_up_from_slaves(&self) -> bool {
        match self.kind {
            LinkKind::Bond => self.slaves.iter().any(|s| s.up),
            _ => self.up,
        }
    }

    /// True if exactly one slave of a bond is down (degraded, not failed).
    pub fn bond_degraded(&self) -> bool {
        self.kind == LinkKind::Bond && self.slaves.iter().filter(|s| !s.up).count() == 1
    }

    pub fn set_up(&mut self, up: bool, now_us: u64) {
        if self.up != up {
            self.up = up;
            self.last_change_us = now_us;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bond(slave_a_up: bool, slave_b_up: bool) -> Link {
        let mut l = Link::new("bond0".into(), LinkRole::Management, LinkKind::Bond, 0);
        l.slaves.push(LinkSlave { name: "eth0".into(), up: slave_a_up, last_change_us: 0 });
        l.slaves.push(LinkSlave { name: "eth1".into(), up: slave_b_up, last_change_us: 0 });
        l
    }

    #[test]
    fn bond_up_if_any_slave_up() {
        assert!(bond(true, true).bond_up_from_slaves());
        assert!(bond(true, false).bond_up_from_slaves());
        assert!(!bond(false, false).bond_up_from_slaves());
    }

    #[test]
    fn bond_degraded_only_with_exactly_one_slave_down() {
        assert!(!bond(true, true).bond_degraded());
        assert!(bond(true, false).bond_degraded());
        assert!(!bond(false, false).bond_degraded());
    }

    #[test]
    fn last_change_only_updates_on_actual_transition() {
        let mut l = Link::new("eth0".into(), LinkRole::Oam, LinkKind::Ethernet, 100);
        l.set_up(true, 200);
        assert_eq!(l.last_change_us, 200);
        l.set_up(true, 300);
        assert_eq!(l.last_change_us, 200, "no-op transition must not bump the timestamp");
        l.set_up(false, 400);
        assert_eq!(l.last_change_us, 400);
    }
}
