// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Wind River Systems, Inc.

//! Platform interface-role configuration (§4.2): maps each `LinkRole` to
//! the kernel interface name carrying it. Loaded from its own, smaller TOML
//! file, separate from the per-daemon `Config` the other crates use.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use maintd_core::link::LinkRole;

use crate::error::LinkmonError;

#[derive(Debug, Clone, Deserialize)]
pub struct LinkmonConfig {
    pub interfaces: HashMap<LinkRole, String>,
    #[serde(default = "default_audit_interval_secs")]
    pub audit_interval_secs: u64,
    #[serde(default = "default_http_bind")]
    pub http_bind: SocketAddr,
}

fn default_audit_interval_secs() -> u64 {
    60
}

fn default_http_bind() -> SocketAddr {
    "127.0.0.1:2122".parse().expect("static address literal")
}

impl LinkmonConfig {
    pub fn audit_interval(&self) -> Duration {
        Duration::from_secs(self.audit_interval_secs)
    }

    pub fn load(path: &Path) -> Result<Self, LinkmonError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| LinkmonError::Config(format!("reading {}: {e}", path.display())))?;
        Self::apply_env_overrides(
            toml::from_str(&text).map_err(|e| LinkmonError::Config(format!("parsing {}: {e}", path.display())))?,
        )
    }

    fn apply_env_overrides(mut cfg: LinkmonConfig) -> Result<Self, LinkmonError> {
        if let Ok(secs) = std::env::var("MAINTD_LINKMON_AUDIT_INTERVAL_SECS") {
            cfg.audit_interval_secs =
                secs.parse().map_err(|_| LinkmonError::Config("MAINTD_LINKMON_AUDIT_INTERVAL_SECS must be an integer".into()))?;
        }
        if let Ok(bind) = std::env::var("MAINTD_LINKMON_HTTP_BIND") {
            cfg.http_bind = bind.parse().map_err(|_| LinkmonError::Config("MAINTD_LINKMON_HTTP_BIND must be a socket address".into()))?;
        }
        Ok(cfg)
    }

    pub fn role_for_interface(&self, name: &str) -> Option<LinkRole> {
        self.interfaces.iter().find(|(_, v)| v.as_str() == name).map(|(k, _)| *k)
    }
}
