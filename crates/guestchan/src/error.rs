// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Wind River Systems, Inc.

use std::io;

#[derive(Debug, thiserror::Error)]
pub enum GuestChanError {
    #[error("connect to {path}: {source}")]
    Connect { path: std::path::PathBuf, source: io::Error },
    #[error("channel io: {0}")]
    Io(#[from] io::Error),
    #[error("malformed line: {0}")]
    Framing(String),
    #[error("watch setup failed: {0}")]
    Watch(#[from] notify::Error),
    #[error("config: {0}")]
    Config(String),
}
