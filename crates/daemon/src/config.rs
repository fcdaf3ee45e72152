// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Wind River Systems, Inc.

//! Daemon-wide configuration (§6 "Environment": "platform configuration
//! file provides role-to-interface mapping; daemon configuration provides
//! port numbers, multicast group, intervals, thresholds, and retry
//! counts"). One closed set of options, validated at startup, matching the
//! §9 design note replacing the source's "global singleton daemon config".

use std::net::{Ipv4Addr, SocketAddr};
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use maintd_core::host::PulseNetwork;
use maintd_heartbeat::{AgentConfig, ClientConfig};
use maintd_linkmon::LinkmonConfig;
use maintd_orchestrator::{InboundConfig, OutboundConfig, TokenConfig};

/// Socket parameters for one pulse network (§4.3.1, §4.3.4). `AgentConfig`
/// and `ClientConfig` only name which `PulseNetwork`s are active; the
/// daemon resolves each to concrete addressing here, since the same
/// network role can bind to a different interface per deployment.
#[derive(Debug, Clone, Deserialize)]
pub struct PulseAddress {
    pub bind_addr: SocketAddr,
    pub multicast_group: Ipv4Addr,
    pub iface: Ipv4Addr,
    pub dest_port: u16,
}

#[derive(Debug, Default, Deserialize)]
pub struct PulseAddressing {
    pub management: Option<PulseAddress>,
    pub cluster_host: Option<PulseAddress>,
}

impl PulseAddressing {
    pub fn get(&self, network: PulseNetwork) -> Option<&PulseAddress> {
        match network {
            PulseNetwork::Management => self.management.as_ref(),
            PulseNetwork::ClusterHost => self.cluster_host.as_ref(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading {path}: {source}")]
    Read { path: String, source: std::io::Error },
    #[error("parsing config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Deserialize)]
pub struct GuestChanConfig {
    pub channel_dir: std::path::PathBuf,
    #[serde(default = "default_connect_backoff_ms")]
    pub initial_connect_backoff_ms: u64,
    #[serde(default = "default_hbs_failure_threshold")]
    pub hbs_failure_threshold: u32,
}

fn default_connect_backoff_ms() -> u64 {
    1000
}

fn default_hbs_failure_threshold() -> u32 {
    3
}

#[derive(Debug, Deserialize)]
pub struct NodeSection {
    pub hostname: String,
    #[serde(default = "default_ready_event_url")]
    pub ready_event_url: String,
}

fn default_ready_event_url() -> String {
    "http://127.0.0.1:2112/v1/ready".to_string()
}

#[derive(Debug, Deserialize)]
pub struct InboundSection {
    pub user_agent: String,
    #[serde(default)]
    pub test_mode: bool,
    #[serde(default = "default_inbound_bind")]
    pub bind: SocketAddr,
}

fn default_inbound_bind() -> SocketAddr {
    "127.0.0.1:2123".parse().expect("static address literal")
}

#[derive(Debug, Deserialize)]
pub struct OutboundSection {
    pub events_endpoint: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_max_retries() -> u32 {
    3
}

#[derive(Debug, Deserialize)]
pub struct TokenSection {
    pub auth_url: String,
    pub username: String,
    pub password: String,
    pub project_name: String,
    #[serde(default = "default_domain")]
    pub user_domain_name: String,
    #[serde(default = "default_domain")]
    pub project_domain_name: String,
}

fn default_domain() -> String {
    "Default".to_string()
}

#[derive(Debug, Deserialize)]
pub struct DaemonConfig {
    pub node: NodeSection,
    pub heartbeat_agent: AgentConfig,
    pub heartbeat_client: ClientConfig,
    #[serde(default)]
    pub pulse_addressing: PulseAddressing,
    pub linkmon: LinkmonConfig,
    pub guestchan: GuestChanConfig,
    pub inbound: InboundSection,
    pub outbound: OutboundSection,
    pub token: TokenSection,
}

impl DaemonConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Read { path: path.display().to_string(), source: e })?;
        let mut config: DaemonConfig = toml::from_str(&text)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("MAINTD_ORCHESTRATOR_TEST_MODE") {
            self.inbound.test_mode = v == "1" || v.eq_ignore_ascii_case("true");
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.heartbeat_agent.networks.is_empty() {
            return Err(ConfigError::Invalid("heartbeat_agent.networks must not be empty".into()));
        }
        if self.inbound.user_agent.is_empty() {
            return Err(ConfigError::Invalid("inbound.user_agent must not be empty".into()));
        }
        Ok(())
    }
}

impl From<InboundSection> for InboundConfig {
    fn from(s: InboundSection) -> Self {
        InboundConfig { expected_user_agent: s.user_agent, test_mode: s.test_mode }
    }
}

impl From<OutboundSection> for OutboundConfig {
    fn from(s: OutboundSection) -> Self {
        OutboundConfig { events_endpoint: s.events_endpoint, max_retries: s.max_retries }
    }
}

impl From<TokenSection> for TokenConfig {
    fn from(s: TokenSection) -> Self {
        TokenConfig {
            auth_url: s.auth_url,
            username: s.username,
            password: s.password,
            project_name: s.project_name,
            user_domain_name: s.user_domain_name,
            project_domain_name: s.project_domain_name,
        }
    }
}
