// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Wind River Systems, Inc.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LinkmonError {
    #[error("sysfs read failed for {path}: {source}")]
    Sysfs { path: String, #[source] source: std::io::Error },
    #[error("interface {0} not found")]
    NoSuchInterface(String),
    #[error("netlink error: {0}")]
    Netlink(String),
    #[error("ioctl error: {0}")]
    Ioctl(#[from] nix::Error),
    #[error("config error: {0}")]
    Config(String),
}
