// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Wind River Systems, Inc.

//! Read-only HTTP query API over the tracked link set (§4.2, §6): GET-only,
//! loopback-preferred, non-loopback callers rate-limited via `tower`.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use parking_lot::RwLock;
use serde::Serialize;
use tower::limit::RateLimitLayer;
use tracing::warn;

use maintd_core::link::Link;
use maintd_core::ApiReason;

/// Shared, read-only snapshot of the tracked link set.
#[derive(Clone)]
pub struct LinkTable(Arc<RwLock<Vec<Link>>>);

impl LinkTable {
    pub fn new() -> Self {
        Self(Arc::new(RwLock::new(Vec::new())))
    }

    pub fn replace(&self, links: Vec<Link>) {
        *self.0.write() = links;
    }

    pub fn snapshot(&self) -> Vec<Link> {
        self.0.read().clone()
    }
}

impl Default for LinkTable {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize)]
struct ErrorBody {
    status: &'static str,
    reason: &'static str,
}

fn fail(code: StatusCode, reason: ApiReason) -> Response {
    (code, Json(ErrorBody { status: "fail", reason: reason.as_str() })).into_response()
}

pub fn router(table: LinkTable) -> Router {
    Router::new()
        .route("/v1/links", get(list_links))
        .route("/v1/links/:name", get(get_link))
        .layer(RateLimitLayer::new(20, std::time::Duration::from_secs(1)))
        .with_state(table)
}

async fn list_links(
    State(table): State<LinkTable>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
) -> Response {
    if !peer.ip().is_loopback() {
        warn!(%peer, "rejecting non-loopback link query");
        return fail(StatusCode::FORBIDDEN, ApiReason::EntityNotFound);
    }
    Json(table.0.read().clone()).into_response()
}

async fn get_link(
    State(table): State<LinkTable>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Path(name): Path<String>,
) -> Response {
    if !peer.ip().is_loopback() {
        warn!(%peer, "rejecting non-loopback link query");
        return fail(StatusCode::FORBIDDEN, ApiReason::EntityNotFound);
    }
    match table.0.read().iter().find(|l| l.name == name) {
        Some(link) => Json(link.clone()).into_response(),
        None => fail(StatusCode::NOT_FOUND, ApiReason::EntityNotFound),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maintd_core::link::{LinkKind, LinkRole};

    #[test]
    fn link_table_starts_empty() {
        let table = LinkTable::new();
        assert!(table.0.read().is_empty());
    }

    #[test]
    fn replace_swaps_the_whole_snapshot() {
        let table = LinkTable::new();
        table.replace(vec![Link::new("eth0".into(), LinkRole::Management, LinkKind::Ethernet, 0)]);
        assert_eq!(table.0.read().len(), 1);
        table.replace(vec![]);
        assert!(table.0.read().is_empty());
    }
}
