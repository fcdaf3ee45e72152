// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Wind River Systems, Inc.

//! Channel socket discovery (§4.4.1): merges `notify` filesystem events with
//! a periodic directory audit into one event stream, recognizing both
//! accepted socket naming patterns.

use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::Stream;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryEvent {
    Added(String, PathBuf),
    Removed(String),
    Modified(String, PathBuf),
}

/// Extracts the instance uuid from either accepted socket filename pattern
/// (§4.4.1): `cgcs.heartbeat.<uuid>.sock` or
/// `wrs.heartbeat.agent.0.<uuid>.sock`.
pub fn extract_uuid(filename: &str) -> Option<String> {
    let stem = filename.strip_suffix(".sock")?;
    if let Some(uuid) = stem.strip_prefix("cgcs.heartbeat.") {
        return Some(uuid.to_string());
    }
    if let Some(uuid) = stem.strip_prefix("wrs.heartbeat.agent.0.") {
        return Some(uuid.to_string());
    }
    None
}

/// One full directory scan, used both at startup and by the periodic audit
/// to recover from missed inotify events (§4.4.1).
pub fn scan_directory(dir: &Path) -> std::io::Result<Vec<(String, PathBuf)>> {
    let mut found = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if let Some(uuid) = extract_uuid(&name) {
            found.push((uuid, entry.path()));
        }
    }
    Ok(found)
}

/// A `notify`-backed watcher feeding a channel of raw filesystem events,
/// translated to `DiscoveryEvent` by filename pattern.
pub struct ChannelWatcher {
    _watcher: RecommendedWatcher,
    rx: mpsc::UnboundedReceiver<DiscoveryEvent>,
}

impl ChannelWatcher {
    pub fn new(dir: &Path) -> notify::Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| match res {
            Ok(event) => {
                for path in &event.paths {
                    let Some(name) = path.file_name().and_then(|n| n.to_str()) else { continue };
                    let Some(uuid) = extract_uuid(name) else { continue };
                    let translated = match event.kind {
                        notify::EventKind::Create(_) => Some(DiscoveryEvent::Added(uuid, path.clone())),
                        notify::EventKind::Modify(_) => Some(DiscoveryEvent::Modified(uuid, path.clone())),
                        notify::EventKind::Remove(_) => Some(DiscoveryEvent::Removed(uuid)),
                        _ => None,
                    };
                    if let Some(event) = translated {
                        let _ = tx.send(event);
                    }
                }
            }
            Err(e) => warn!(error = %e, "channel directory watch error"),
        })?;
        watcher.watch(dir, RecursiveMode::NonRecursive)?;
        Ok(Self { _watcher: watcher, rx })
    }
}

impl Stream for ChannelWatcher {
    type Item = DiscoveryEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_cgcs_pattern() {
        assert_eq!(
            extract_uuid("cgcs.heartbeat.8d80875b-fa73-4ccb-bce3-1cd4df10449d.sock"),
            Some("8d80875b-fa73-4ccb-bce3-1cd4df10449d".to_string())
        );
    }

    #[test]
    fn extracts_wrs_pattern() {
        assert_eq!(
            extract_uuid("wrs.heartbeat.agent.0.8d80875b-fa73-4ccb-bce3-1cd4df10449d.sock"),
            Some("8d80875b-fa73-4ccb-bce3-1cd4df10449d".to_string())
        );
    }

    #[test]
    fn unrelated_files_are_ignored() {
        assert_eq!(extract_uuid("console.log"), None);
        assert_eq!(extract_uuid("cgcs.heartbeat.sock"), None);
    }

    #[test]
    fn scan_directory_finds_both_patterns() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("cgcs.heartbeat.uuid-a.sock"), b"").unwrap();
        std::fs::write(dir.path().join("wrs.heartbeat.agent.0.uuid-b.sock"), b"").unwrap();
        std::fs::write(dir.path().join("unrelated.txt"), b"").unwrap();
        let mut found: Vec<String> = scan_directory(dir.path()).unwrap().into_iter().map(|(u, _)| u).collect();
        found.sort();
        assert_eq!(found, vec!["uuid-a".to_string(), "uuid-b".to_string()]);
    }
}
