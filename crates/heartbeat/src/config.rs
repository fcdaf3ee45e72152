// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Wind River Systems, Inc.

use std::time::Duration;

use serde::Deserialize;

use maintd_core::host::PulseNetwork;

/// Agent-role configuration (§4.3.2).
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    pub networks: Vec<PulseNetwork>,
    #[serde(default = "default_period_ms")]
    pub period_ms: u64,
    #[serde(default = "default_miss_threshold")]
    pub miss_threshold: u32,
    #[serde(default)]
    pub tolerance: u32,
    /// Realizes the original's build-time "accept self pulses" toggle as a
    /// runtime config flag (§4.3.2).
    #[serde(default)]
    pub accept_self_pulses: bool,
    #[serde(default = "default_select_wait_ms")]
    pub select_wait_ms: u64,
}

fn default_period_ms() -> u64 {
    100
}

fn default_miss_threshold() -> u32 {
    3
}

fn default_select_wait_ms() -> u64 {
    50
}

impl AgentConfig {
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }

    pub fn select_wait(&self) -> Duration {
        Duration::from_millis(self.select_wait_ms)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("MAINTD_HEARTBEAT_PERIOD_MS") {
            if let Ok(ms) = v.parse() {
                self.period_ms = ms;
            }
        }
        if let Ok(v) = std::env::var("MAINTD_HEARTBEAT_MISS_THRESHOLD") {
            if let Ok(n) = v.parse() {
                self.miss_threshold = n;
            }
        }
        if let Ok(v) = std::env::var("MAINTD_HEARTBEAT_ACCEPT_SELF_PULSES") {
            self.accept_self_pulses = v == "1" || v.eq_ignore_ascii_case("true");
        }
    }

    pub fn load(path: &std::path::Path) -> Result<Self, crate::HeartbeatError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| crate::HeartbeatError::Config(format!("reading {}: {e}", path.display())))?;
        let mut cfg: Self =
            toml::from_str(&text).map_err(|e| crate::HeartbeatError::Config(format!("parsing {}: {e}", path.display())))?;
        cfg.apply_env_overrides();
        Ok(cfg)
    }
}

/// Client-role configuration (§4.3.3).
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    pub networks: Vec<PulseNetwork>,
    #[serde(default = "default_ready_retry_secs")]
    pub ready_event_retry_secs: u64,
}

fn default_ready_retry_secs() -> u64 {
    5
}

impl ClientConfig {
    pub fn ready_event_retry(&self) -> Duration {
        Duration::from_secs(self.ready_event_retry_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_config_defaults_match_spec() {
        let toml_text = r#"networks = ["management"]"#;
        let cfg: AgentConfig = toml::from_str(toml_text).unwrap();
        assert_eq!(cfg.period_ms, 100);
        assert_eq!(cfg.miss_threshold, 3);
        assert_eq!(cfg.tolerance, 0);
        assert!(!cfg.accept_self_pulses);
    }
}
