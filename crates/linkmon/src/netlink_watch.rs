// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Wind River Systems, Inc.

//! Netlink link-event subscription (§4.2): subscribes to `RTNLGRP_LINK`
//! and turns `RTM_NEWLINK`/`RTM_DELLINK` into `LinkStateChanged` events.
//! Not used by any teacher example; added because no corpus repo touches
//! netlink and this concern is irreducibly OS-specific (documented as an
//! enrichment import in DESIGN.md).

use futures_util::TryStreamExt;
use rtnetlink::packet_route::link::{LinkAttribute, LinkFlags};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use maintd_core::link::LinkRole;
use maintd_core::Event;

use crate::error::LinkmonError;

/// A raw link up/down observation before it's matched against a configured
/// role (the caller filters by interface name -> `LinkRole`).
#[derive(Debug, Clone)]
pub struct RawLinkEvent {
    pub ifname: String,
    pub up: bool,
}

/// Opens a netlink route socket and streams link state changes until the
/// channel is dropped or the connection errors out.
pub async fn watch_links(tx: mpsc::Sender<RawLinkEvent>) -> Result<(), LinkmonError> {
    let (connection, handle, mut messages) =
        rtnetlink::new_connection().map_err(|e| LinkmonError::Netlink(e.to_string()))?;
    tokio::spawn(connection);

    // Prime the channel with the current state of every interface so the
    // caller doesn't have to wait for the next transition to learn it.
    let mut links = handle.link().get().execute();
    while let Some(msg) = links.try_next().await.map_err(|e| LinkmonError::Netlink(e.to_string()))? {
        if let Some(event) = decode_link_message(&msg.attributes, msg.header.flags) {
            if tx.send(event).await.is_err() {
                return Ok(());
            }
        }
    }

    while let Some((msg, _)) = messages.next().await {
        use rtnetlink::packet_core::{NetlinkMessage, NetlinkPayload};
        let NetlinkMessage { payload, .. } = msg;
        if let NetlinkPayload::InnerMessage(inner) = payload {
            if let Some(event) = decode_link_message(&inner.attributes, inner.header.flags) {
                debug!(ifname = %event.ifname, up = event.up, "netlink link event");
                if tx.send(event).await.is_err() {
                    break;
                }
            }
        }
    }

    warn!("netlink link watch stream ended");
    Ok(())
}

fn decode_link_message(attributes: &[LinkAttribute], flags: LinkFlags) -> Option<RawLinkEvent> {
    let ifname = attributes.iter().find_map(|attr| match attr {
        LinkAttribute::IfName(name) => Some(name.clone()),
        _ => None,
    })?;
    let up = flags.contains(LinkFlags::Running);
    Some(RawLinkEvent { ifname, up })
}

/// Turns a raw netlink observation into the domain-level event, or `None`
/// if the interface isn't mapped to any configured role.
pub fn to_domain_event(raw: &RawLinkEvent, role: Option<LinkRole>, now_us: u64) -> Option<Event> {
    let role = role?;
    Some(Event::LinkStateChanged { role, name: raw.ifname.clone(), up: raw.up, last_change_us: now_us })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unmapped_interface_produces_no_event() {
        let raw = RawLinkEvent { ifname: "eth7".into(), up: true };
        assert!(to_domain_event(&raw, None, 0).is_none());
    }

    #[test]
    fn mapped_interface_produces_link_state_changed() {
        let raw = RawLinkEvent { ifname: "eth0".into(), up: false };
        let event = to_domain_event(&raw, Some(LinkRole::Management), 42).unwrap();
        match event {
            Event::LinkStateChanged { role, name, up, last_change_us } => {
                assert_eq!(role, LinkRole::Management);
                assert_eq!(name, "eth0");
                assert!(!up);
                assert_eq!(last_change_us, 42);
            }
            _ => panic!("wrong event variant"),
        }
    }
}
