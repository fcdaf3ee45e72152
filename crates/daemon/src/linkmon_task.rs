// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Wind River Systems, Inc.

//! Wires the link monitor's already-built pieces together (C2, §4.2):
//! learns each configured interface's kind and bond membership at startup,
//! bridges `watch_links`'s netlink stream into the shared `LinkTable`,
//! runs the periodic reconciling audit, and serves the read-only HTTP API.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::mpsc;
use tracing::{error, warn};

use maintd_core::link::{Link, LinkKind};
use maintd_core::Event;
use maintd_linkmon::discover::{learn_bond_slaves, learn_kind, RealSysfs};
use maintd_linkmon::http::{router, LinkTable};
use maintd_linkmon::netlink_watch::{to_domain_event, watch_links};
use maintd_linkmon::LinkmonConfig;

use crate::error::DaemonError;

fn now_us() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_micros() as u64).unwrap_or(0)
}

/// Builds the initial `LinkTable` snapshot from sysfs, matching the
/// role-to-interface map in `config.interfaces` (§4.2).
fn initial_links(config: &LinkmonConfig) -> Vec<Link> {
    let sysfs = RealSysfs;
    let mut links = Vec::new();
    for (&role, ifname) in &config.interfaces {
        let kind = match learn_kind(&sysfs, ifname) {
            Ok(k) => k,
            Err(e) => {
                warn!(ifname, error = %e, "could not learn interface kind at startup");
                continue;
            }
        };
        let mut link = Link::new(ifname.clone(), role, kind, now_us());
        if kind == LinkKind::Bond {
            match learn_bond_slaves(&sysfs, ifname) {
                Ok(slaves) => {
                    for slave in slaves {
                        link.slaves.push(maintd_core::link::LinkSlave { name: slave, up: false, last_change_us: now_us() });
                    }
                }
                Err(e) => warn!(ifname, error = %e, "could not learn bond slaves at startup"),
            }
        }
        links.push(link);
    }
    links
}

/// Runs the link monitor until the process shuts down: spawns the netlink
/// watch, the periodic audit, and the HTTP server, all sharing one
/// `LinkTable`.
pub async fn run(config: LinkmonConfig, events: mpsc::UnboundedSender<Event>) -> Result<(), DaemonError> {
    let table = LinkTable::new();
    table.replace(initial_links(&config));

    let http_bind = config.http_bind;
    let http_table = table.clone();
    tokio::spawn(async move {
        let listener = match tokio::net::TcpListener::bind(http_bind).await {
            Ok(l) => l,
            Err(e) => {
                error!(addr = %http_bind, error = %e, "link monitor http server failed to bind");
                return;
            }
        };
        if let Err(e) = axum::serve(listener, router(http_table).into_make_service_with_connect_info::<std::net::SocketAddr>()).await {
            error!(error = %e, "link monitor http server exited");
        }
    });

    let (raw_tx, mut raw_rx) = mpsc::channel(64);
    let watch_config = config.clone();
    tokio::spawn(async move {
        if let Err(e) = watch_links(raw_tx).await {
            error!(error = %e, "netlink link watch exited");
        }
    });

    let mut audit_interval = tokio::time::interval(config.audit_interval());
    loop {
        tokio::select! {
            raw = raw_rx.recv() => {
                let Some(raw) = raw else { break };
                apply_raw_event(&table, &watch_config, &events, raw);
            }
            _ = audit_interval.tick() => {
                run_audit(&table);
            }
        }
    }
    Ok(())
}

fn apply_raw_event(table: &LinkTable, config: &LinkmonConfig, events: &mpsc::UnboundedSender<Event>, raw: maintd_linkmon::netlink_watch::RawLinkEvent) {
    let role = config.role_for_interface(&raw.ifname);
    let mut links = table.snapshot();
    let mut matched = false;

    for link in links.iter_mut() {
        if link.name == raw.ifname {
            matched = true;
            link.set_up(raw.up, now_us());
            break;
        }
        if let Some(slave) = link.slaves.iter_mut().find(|s| s.name == raw.ifname) {
            matched = true;
            let was_up = link.bond_up_from_slaves();
            slave.up = raw.up;
            slave.last_change_us = now_us();
            let now_up = link.bond_up_from_slaves();
            if was_up != now_up {
                link.set_up(now_up, now_us());
            }
            break;
        }
    }

    if !matched {
        return;
    }
    table.replace(links);

    if let Some(event) = to_domain_event(&raw, role, now_us()) {
        let _ = events.send(event);
    }
}

fn run_audit(table: &LinkTable) {
    let mut links = table.snapshot();
    let mut changed = false;
    for link in links.iter_mut() {
        if link.kind == LinkKind::Bond {
            continue;
        }
        match maintd_linkmon::audit::read_running_flag(&link.name) {
            Ok(audited) => {
                if let Some(corrected) = maintd_linkmon::audit::reconcile(&link.name, link.up, audited) {
                    link.set_up(corrected, now_us());
                    changed = true;
                }
            }
            Err(e) => warn!(ifname = %link.name, error = %e, "link audit read failed"),
        }
    }
    if changed {
        table.replace(links);
    }
}
