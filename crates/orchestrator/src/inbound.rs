// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Wind River Systems, Inc.

//! Northbound REST surface (§4.5, §6): the orchestrator drives host and
//! instance lifecycle over localhost HTTP with JSON bodies. Grounded on
//! the same axum router style this workspace uses for the link monitor's
//! read-only API, extended with a `User-Agent` gate and test-mode origin
//! relaxation.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, patch, post, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use maintd_core::host::HostUuid;
use maintd_core::instance::{EventType, InstanceUuid, NotificationType};
use maintd_core::{ApiReason, CoreError};

use crate::port::{InventoryPort, ServiceSpec};

#[derive(Debug, Clone)]
pub struct InboundConfig {
    pub expected_user_agent: String,
    /// Test mode relaxes the loopback-origin check (§4.5: "requests from
    /// non-localhost origins are logged and may be served only in test
    /// mode").
    pub test_mode: bool,
}

#[derive(Clone)]
struct AppState {
    port: Arc<dyn InventoryPort>,
    config: InboundConfig,
}

pub fn router(port: Arc<dyn InventoryPort>, config: InboundConfig) -> Router {
    let state = AppState { port, config };
    Router::new()
        .route("/v1/instances/:uuid", post(add_instance).patch(modify_instance).delete(remove_instance).get(get_instance))
        .route("/v1/instances/:uuid/vote", post(begin_vote))
        .route("/v1/instances/:uuid/notify", post(begin_notify))
        .route("/v1/hosts/:uuid/enable", put(enable_host))
        .route("/v1/hosts/:uuid", get(get_host))
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct FailBody {
    status: &'static str,
    reason: &'static str,
}

fn fail(status: StatusCode, reason: ApiReason) -> Response {
    (status, Json(FailBody { status: "fail", reason: reason.as_str() })).into_response()
}

fn core_err_to_response(e: CoreError) -> Response {
    let reason = ApiReason::from(&e);
    let status = match reason {
        ApiReason::EntityNotFound => StatusCode::NOT_FOUND,
        ApiReason::CommandParseError | ApiReason::InvalidData => StatusCode::BAD_REQUEST,
        ApiReason::BadState => StatusCode::BAD_REQUEST,
        ApiReason::NoBuffer => StatusCode::INTERNAL_SERVER_ERROR,
        ApiReason::UnsupportedHttpCommand => StatusCode::METHOD_NOT_ALLOWED,
    };
    fail(status, reason)
}

/// Gate every handler on the configured `User-Agent` header and, outside
/// test mode, on a loopback peer address (§4.5).
fn check_origin(state: &AppState, headers: &HeaderMap, peer: SocketAddr) -> Option<Response> {
    let ua_ok = headers
        .get(axum::http::header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(|v| v == state.config.expected_user_agent)
        .unwrap_or(false);
    if !ua_ok {
        tracing::warn!(%peer, "rejecting request with missing or mismatched User-Agent");
        return Some(fail(StatusCode::BAD_REQUEST, ApiReason::CommandParseError));
    }
    if !peer.ip().is_loopback() && !state.config.test_mode {
        tracing::warn!(%peer, "rejecting request from non-loopback origin");
        return Some(fail(StatusCode::FORBIDDEN, ApiReason::EntityNotFound));
    }
    None
}

#[derive(Debug, Deserialize)]
struct ServiceEntry {
    service: String,
    #[serde(default = "default_enabled")]
    enabled: bool,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct InstanceAddBody {
    hostname: String,
    services: Vec<ServiceEntry>,
}

fn to_service_specs(entries: Vec<ServiceEntry>) -> Vec<ServiceSpec> {
    entries.into_iter().map(|e| ServiceSpec { service: e.service, enabled: e.enabled }).collect()
}

async fn add_instance(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Path(uuid): Path<String>,
    Json(body): Json<InstanceAddBody>,
) -> Response {
    if let Some(r) = check_origin(&state, &headers, peer) {
        return r;
    }
    if !body.services.iter().any(|s| s.service == "heartbeat") {
        return fail(StatusCode::BAD_REQUEST, ApiReason::InvalidData);
    }
    match state.port.add_instance(InstanceUuid::from(uuid.as_str()), body.hostname, to_service_specs(body.services)).await {
        Ok(()) => StatusCode::CREATED.into_response(),
        Err(e) => core_err_to_response(e),
    }
}

#[derive(Debug, Deserialize)]
struct InstanceModifyBody {
    services: Vec<ServiceEntry>,
}

async fn modify_instance(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Path(uuid): Path<String>,
    Json(body): Json<InstanceModifyBody>,
) -> Response {
    if let Some(r) = check_origin(&state, &headers, peer) {
        return r;
    }
    match state.port.modify_instance(InstanceUuid::from(uuid.as_str()), to_service_specs(body.services)).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => core_err_to_response(e),
    }
}

async fn remove_instance(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Path(uuid): Path<String>,
) -> Response {
    if let Some(r) = check_origin(&state, &headers, peer) {
        return r;
    }
    match state.port.remove_instance(InstanceUuid::from(uuid.as_str())).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => core_err_to_response(e),
    }
}

#[derive(Debug, Serialize)]
struct InstanceStateBody {
    uuid: String,
    hostname: String,
    heartbeating: bool,
    reporting_enabled: bool,
}

async fn get_instance(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Path(uuid): Path<String>,
) -> Response {
    if let Some(r) = check_origin(&state, &headers, peer) {
        return r;
    }
    match state.port.get_instance(InstanceUuid::from(uuid.as_str())).await {
        Ok(view) => Json(InstanceStateBody {
            uuid: view.uuid.to_string(),
            hostname: view.hostname,
            heartbeating: view.heartbeating,
            reporting_enabled: view.reporting_enabled,
        })
        .into_response(),
        Err(e) => core_err_to_response(e),
    }
}

#[derive(Debug, Deserialize)]
struct VoteBody {
    action: String,
}

#[derive(Debug, Serialize)]
struct VoteStartedBody {
    invocation_id: u32,
    timeout_ms: u64,
}

fn parse_event_type(action: &str) -> Option<EventType> {
    match action {
        "stop" => Some(EventType::Stop),
        "reboot" => Some(EventType::Reboot),
        "pause" => Some(EventType::Pause),
        "unpause" => Some(EventType::Unpause),
        "suspend" => Some(EventType::Suspend),
        "resume" => Some(EventType::Resume),
        "live_migrate_begin" => Some(EventType::LiveMigrateBegin),
        "live_migrate_end" => Some(EventType::LiveMigrateEnd),
        "cold_migrate_begin" | "resize_begin" => Some(EventType::ColdMigrateBegin),
        "cold_migrate_end" | "resize_end" => Some(EventType::ColdMigrateEnd),
        _ => None,
    }
}

async fn begin_vote(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Path(uuid): Path<String>,
    Json(body): Json<VoteBody>,
) -> Response {
    if let Some(r) = check_origin(&state, &headers, peer) {
        return r;
    }
    let Some(event_type) = parse_event_type(&body.action) else {
        return fail(StatusCode::BAD_REQUEST, ApiReason::InvalidData);
    };
    match state.port.begin_vote(InstanceUuid::from(uuid.as_str()), event_type).await {
        Ok(started) => Json(VoteStartedBody { invocation_id: started.invocation_id, timeout_ms: started.timeout_ms }).into_response(),
        Err(e) => core_err_to_response(e),
    }
}

#[derive(Debug, Deserialize)]
struct NotifyBody {
    action: String,
}

async fn begin_notify(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Path(uuid): Path<String>,
    Json(body): Json<NotifyBody>,
) -> Response {
    if let Some(r) = check_origin(&state, &headers, peer) {
        return r;
    }
    let Some(event_type) = parse_event_type(&body.action) else {
        return fail(StatusCode::BAD_REQUEST, ApiReason::InvalidData);
    };
    match state.port.begin_notify(InstanceUuid::from(uuid.as_str()), event_type, NotificationType::Irrevocable).await {
        Ok(started) => Json(VoteStartedBody { invocation_id: started.invocation_id, timeout_ms: started.timeout_ms }).into_response(),
        Err(e) => core_err_to_response(e),
    }
}

async fn enable_host(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Path(uuid): Path<String>,
) -> Response {
    if let Some(r) = check_origin(&state, &headers, peer) {
        return r;
    }
    match state.port.enable_host(HostUuid::from(uuid.as_str())).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => core_err_to_response(e),
    }
}

#[derive(Debug, Serialize)]
struct HostStateBody {
    uuid: String,
    hostname: String,
    reporting_enabled: bool,
}

async fn get_host(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Path(uuid): Path<String>,
) -> Response {
    if let Some(r) = check_origin(&state, &headers, peer) {
        return r;
    }
    match state.port.get_host(HostUuid::from(uuid.as_str())).await {
        Ok(view) => Json(HostStateBody { uuid: view.uuid.to_string(), hostname: view.hostname, reporting_enabled: view.reporting_enabled }).into_response(),
        Err(e) => core_err_to_response(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use maintd_core::host::Personality;
    use parking_lot::Mutex;
    use tower::ServiceExt;

    #[derive(Default)]
    struct FakePort {
        added: Mutex<Vec<(InstanceUuid, String)>>,
    }

    #[async_trait]
    impl InventoryPort for FakePort {
        async fn add_instance(&self, uuid: InstanceUuid, hostname: String, _services: Vec<ServiceSpec>) -> Result<(), CoreError> {
            self.added.lock().push((uuid, hostname));
            Ok(())
        }
        async fn modify_instance(&self, _uuid: InstanceUuid, _services: Vec<ServiceSpec>) -> Result<(), CoreError> {
            Ok(())
        }
        async fn remove_instance(&self, _uuid: InstanceUuid) -> Result<(), CoreError> {
            Ok(())
        }
        async fn get_instance(&self, uuid: InstanceUuid) -> Result<crate::port::InstanceView, CoreError> {
            if self.added.lock().iter().any(|(u, _)| u == &uuid) {
                Ok(crate::port::InstanceView { uuid, hostname: "worker-1".into(), heartbeating: false, reporting_enabled: true })
            } else {
                Err(CoreError::NotFound(uuid.to_string()))
            }
        }
        async fn begin_vote(&self, _uuid: InstanceUuid, _event_type: EventType) -> Result<crate::port::VoteStarted, CoreError> {
            Ok(crate::port::VoteStarted { invocation_id: 1, timeout_ms: 10_000 })
        }
        async fn begin_notify(&self, _uuid: InstanceUuid, _event_type: EventType, _notification_type: NotificationType) -> Result<crate::port::VoteStarted, CoreError> {
            Ok(crate::port::VoteStarted { invocation_id: 2, timeout_ms: 30_000 })
        }
        async fn enable_host(&self, _uuid: HostUuid) -> Result<(), CoreError> {
            Ok(())
        }
        async fn get_host(&self, uuid: HostUuid) -> Result<crate::port::HostView, CoreError> {
            Ok(crate::port::HostView { uuid, hostname: "worker-1".into(), personality: Personality::Worker, reporting_enabled: true })
        }
    }

    fn test_router() -> Router {
        router(Arc::new(FakePort::default()), InboundConfig { expected_user_agent: "maintd-test-client".into(), test_mode: true })
    }

    fn with_peer(req: axum::http::request::Builder) -> axum::http::request::Builder {
        req.header(axum::http::header::USER_AGENT, "maintd-test-client")
            .extension(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 0))))
    }

    #[tokio::test]
    async fn add_without_heartbeat_service_is_rejected() {
        let app = test_router();
        let body = serde_json::json!({"hostname": "worker-1", "services": [{"service": "other"}]});
        let req = with_peer(Request::builder().method("POST").uri("/v1/instances/abc")).header("content-type", "application/json").body(Body::from(body.to_string())).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn add_then_get_round_trips() {
        let app = test_router();
        let body = serde_json::json!({"hostname": "worker-1", "services": [{"service": "heartbeat"}]});
        let req = with_peer(Request::builder().method("POST").uri("/v1/instances/abc")).header("content-type", "application/json").body(Body::from(body.to_string())).unwrap();
        let resp = app.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);

        let req = with_peer(Request::builder().method("GET").uri("/v1/instances/abc")).body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn missing_user_agent_is_rejected() {
        let app = test_router();
        let req = Request::builder()
            .method("GET")
            .uri("/v1/instances/abc")
            .extension(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 0))))
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_instance_is_404() {
        let app = test_router();
        let req = with_peer(Request::builder().method("GET").uri("/v1/instances/does-not-exist")).body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
