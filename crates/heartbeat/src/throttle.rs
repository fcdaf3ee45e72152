// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Wind River Systems, Inc.

//! Token-bucket style log throttle (§4.3.5 "throttled" warnings), shared by
//! the Agent and Client roles so transient socket errors don't flood logs.

use std::time::{Duration, Instant};

pub struct Throttle {
    window: Duration,
    last_emitted: Option<Instant>,
    suppressed: u64,
}

impl Throttle {
    pub fn new(window: Duration) -> Self {
        Self { window, last_emitted: None, suppressed: 0 }
    }

    /// Returns `Some(suppressed_count)` if the caller should log now
    /// (resetting the suppressed counter), or `None` if it should stay
    /// silent this time.
    pub fn allow(&mut self, now: Instant) -> Option<u64> {
        match self.last_emitted {
            Some(last) if now.duration_since(last) < self.window => {
                self.suppressed += 1;
                None
            }
            _ => {
                let suppressed = self.suppressed;
                self.suppressed = 0;
                self.last_emitted = Some(now);
                Some(suppressed)
            }
        }
    }
}
