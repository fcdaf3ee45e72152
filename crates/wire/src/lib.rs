// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Wind River Systems, Inc.

//! Wire formats shared by the protocol engines: the fixed-size UDP pulse
//! datagram (§4.3.1) and the line-delimited JSON guest-channel protocol
//! (§4.4.2).

pub mod guest;
pub mod pulse;

pub use guest::{EngineMessage, GuestMessage};
pub use pulse::{PulseCodecError, PulseDirection, PulseMessage};
