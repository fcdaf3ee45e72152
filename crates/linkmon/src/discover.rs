// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Wind River Systems, Inc.

//! Sysfs interface learning (§4.2): resolves device kind and bond
//! membership without touching the real filesystem in tests, via the
//! `SysfsReader` trait seam (same injection style as the daemon's adapter
//! traits).

use maintd_core::link::LinkKind;

use crate::error::LinkmonError;

/// Abstraction over `/sys/class/net/<if>/...` reads.
pub trait SysfsReader: Send + Sync {
    fn read(&self, path: &str) -> Result<String, std::io::Error>;
    fn read_dir_names(&self, path: &str) -> Result<Vec<String>, std::io::Error>;
}

/// Real sysfs access.
pub struct RealSysfs;

impl SysfsReader for RealSysfs {
    fn read(&self, path: &str) -> Result<String, std::io::Error> {
        std::fs::read_to_string(path)
    }

    fn read_dir_names(&self, path: &str) -> Result<Vec<String>, std::io::Error> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(path)? {
            names.push(entry?.file_name().to_string_lossy().into_owned());
        }
        Ok(names)
    }
}

/// Determines `LinkKind` from `uevent`'s `DEVTYPE` field and the presence
/// of a `bonding/` subdirectory (spec §4.2).
pub fn learn_kind(sysfs: &dyn SysfsReader, ifname: &str) -> Result<LinkKind, LinkmonError> {
    let bonding_path = format!("/sys/class/net/{ifname}/bonding");
    if sysfs.read_dir_names(&bonding_path).is_ok() {
        return Ok(LinkKind::Bond);
    }

    let uevent_path = format!("/sys/class/net/{ifname}/uevent");
    let uevent = sysfs
        .read(&uevent_path)
        .map_err(|source| LinkmonError::Sysfs { path: uevent_path, source })?;

    for line in uevent.lines() {
        if let Some(devtype) = line.strip_prefix("DEVTYPE=") {
            if devtype.trim() == "vlan" {
                return Ok(LinkKind::Vlan);
            }
        }
    }
    Ok(LinkKind::Ethernet)
}

/// Lists the slave interface names of a bond (spec §4.2).
pub fn learn_bond_slaves(sysfs: &dyn SysfsReader, ifname: &str) -> Result<Vec<String>, LinkmonError> {
    let path = format!("/sys/class/net/{ifname}/bonding/slaves");
    let contents = sysfs.read(&path).map_err(|source| LinkmonError::Sysfs { path, source })?;
    Ok(contents.split_whitespace().map(str::to_string).collect())
}
