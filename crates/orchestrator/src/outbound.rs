// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Wind River Systems, Inc.

//! Southbound event reporting (§4.5, §6): PATCH to the orchestrator's
//! instance-events endpoint for `alarm`, `service`, `action` payloads.
//! Retries are bounded with a forced token refresh on auth failure (§9:
//! "auth-failure responses trigger a single re-queue after forced
//! refresh, with a bounded retry count to avoid loops").

use std::sync::Arc;

use serde::Serialize;
use tracing::warn;

use crate::error::OrchestratorError;
use crate::token::TokenManager;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event_category", rename_all = "snake_case")]
pub enum EventPayload {
    Alarm { alarm_id: String, reason_text: String, severity: String },
    Service { service: String, state: String },
    Action { action: String, result: String, reason: Option<String> },
}

#[derive(Debug, Clone)]
pub struct OutboundConfig {
    pub events_endpoint: String,
    pub max_retries: u32,
}

impl Default for OutboundConfig {
    fn default() -> Self {
        Self { events_endpoint: String::new(), max_retries: 3 }
    }
}

pub struct OutboundClient {
    client: reqwest::Client,
    tokens: Arc<TokenManager>,
    config: OutboundConfig,
}

impl OutboundClient {
    pub fn new(client: reqwest::Client, tokens: Arc<TokenManager>, config: OutboundConfig) -> Self {
        Self { client, tokens, config }
    }

    /// Sends one event payload for `instance_uuid`, retrying transient
    /// failures up to `max_retries` times and forcing exactly one token
    /// refresh if the orchestrator responds 401.
    pub async fn report(&self, instance_uuid: &str, payload: &EventPayload) -> Result<(), OrchestratorError> {
        let mut refreshed_once = false;
        let mut attempt = 0;
        loop {
            let snapshot = self.tokens.snapshot();
            let url = format!("{}{}", snapshot.platform_admin_url, self.config.events_endpoint.replace("{uuid}", instance_uuid));
            let result = self.client.patch(&url).bearer_auth(&snapshot.token).json(payload).send().await;

            match result {
                Ok(resp) if resp.status().is_success() => return Ok(()),
                Ok(resp) if resp.status().as_u16() == 401 && !refreshed_once => {
                    warn!(instance_uuid, "outbound event rejected for auth, forcing token refresh");
                    refreshed_once = true;
                    self.tokens.refresh().await?;
                    continue;
                }
                Ok(resp) => {
                    attempt += 1;
                    warn!(instance_uuid, status = %resp.status(), attempt, "outbound event report failed");
                }
                Err(e) => {
                    attempt += 1;
                    warn!(instance_uuid, error = %e, attempt, "outbound event report transport error");
                }
            }

            if attempt > self.config.max_retries {
                return Err(OrchestratorError::OutboundExhausted(format!("gave up after {attempt} attempts")));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::TokenConfig;

    fn client() -> OutboundClient {
        let tokens = Arc::new(TokenManager::new(
            reqwest::Client::new(),
            TokenConfig {
                auth_url: "http://keystone.example".into(),
                username: "maintd".into(),
                password: "secret".into(),
                project_name: "services".into(),
                user_domain_name: "Default".into(),
                project_domain_name: "Default".into(),
            },
        ));
        OutboundClient::new(reqwest::Client::new(), tokens, OutboundConfig { events_endpoint: "/v1/instances/{uuid}/events".into(), max_retries: 1 })
    }

    #[tokio::test]
    async fn fails_fast_with_no_cached_token_and_unreachable_host() {
        let c = client();
        let result = c.report("abc", &EventPayload::Service { service: "heartbeat".into(), state: "enabled".into() }).await;
        assert!(result.is_err());
    }
}
