// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Wind River Systems, Inc.

//! Fixed-size UDP pulse datagram, byte-exact with the original wire
//! protocol (§4.3.1):
//!
//! ```text
//! offset  size  field
//! 0       15    magic ("cgts pulse req:" | "cgts pulse rsp:")
//! 15      32    hostname, NUL-padded
//! 47      4     sequence (u32, little-endian)
//! 51      4     clue (u32)
//! 55      4     flags (u32)
//! 59      4     version (u32)
//! total   63    bytes
//! ```
//!
//! Deliberately not a `#[repr(C)] struct` transmuted onto the wire: Rust
//! struct layout isn't guaranteed identical across targets, so encode/decode
//! are hand-written instead.

use thiserror::Error;

use maintd_core::host::HostName;

pub const MAGIC_LEN: usize = 15;
pub const HOSTNAME_LEN: usize = 32;
pub const WIRE_LEN: usize = MAGIC_LEN + HOSTNAME_LEN + 4 + 4 + 4 + 4;

const REQ_MAGIC: &[u8; MAGIC_LEN] = b"cgts pulse req:";
const RSP_MAGIC: &[u8; MAGIC_LEN] = b"cgts pulse rsp:";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PulseDirection {
    Request,
    Response,
}

impl PulseDirection {
    fn magic(self) -> &'static [u8; MAGIC_LEN] {
        match self {
            PulseDirection::Request => REQ_MAGIC,
            PulseDirection::Response => RSP_MAGIC,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PulseCodecError {
    #[error("pulse datagram too short: got {got} bytes, need {WIRE_LEN}")]
    TooShort { got: usize },
    #[error("pulse magic not recognized")]
    BadMagic,
    #[error("hostname field is not valid UTF-8")]
    BadHostname,
    #[error("hostname {0:?} exceeds {HOSTNAME_LEN} bytes")]
    HostnameTooLong(String),
}

/// One decoded pulse request or response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PulseMessage {
    pub direction: PulseDirection,
    pub hostname: HostName,
    pub sequence: u32,
    pub clue: u32,
    pub flags: u32,
    pub version: u32,
}

impl PulseMessage {
    /// Encodes into exactly `WIRE_LEN` bytes.
    pub fn encode(&self) -> Result<[u8; WIRE_LEN], PulseCodecError> {
        let name = self.hostname.as_str().as_bytes();
        if name.len() > HOSTNAME_LEN {
            return Err(PulseCodecError::HostnameTooLong(self.hostname.as_str().to_string()));
        }

        let mut buf = [0u8; WIRE_LEN];
        buf[0..MAGIC_LEN].copy_from_slice(self.direction.magic());
        buf[MAGIC_LEN..MAGIC_LEN + name.len()].copy_from_slice(name);
        // remaining hostname bytes stay zero (NUL padding)

        let mut off = MAGIC_LEN + HOSTNAME_LEN;
        buf[off..off + 4].copy_from_slice(&self.sequence.to_le_bytes());
        off += 4;
        buf[off..off + 4].copy_from_slice(&self.clue.to_le_bytes());
        off += 4;
        buf[off..off + 4].copy_from_slice(&self.flags.to_le_bytes());
        off += 4;
        buf[off..off + 4].copy_from_slice(&self.version.to_le_bytes());

        Ok(buf)
    }

    /// Decodes a datagram, tolerant of trailing bytes beyond `WIRE_LEN`
    /// (the original header defines a max message size, not an exact one).
    pub fn decode(bytes: &[u8]) -> Result<Self, PulseCodecError> {
        if bytes.len() < WIRE_LEN {
            return Err(PulseCodecError::TooShort { got: bytes.len() });
        }

        let direction = if &bytes[0..MAGIC_LEN] == REQ_MAGIC {
            PulseDirection::Request
        } else if &bytes[0..MAGIC_LEN] == RSP_MAGIC {
            PulseDirection::Response
        } else {
            return Err(PulseCodecError::BadMagic);
        };

        let hostname_field = &bytes[MAGIC_LEN..MAGIC_LEN + HOSTNAME_LEN];
        let end = hostname_field.iter().position(|&b| b == 0).unwrap_or(HOSTNAME_LEN);
        let hostname = std::str::from_utf8(&hostname_field[..end])
            .map_err(|_| PulseCodecError::BadHostname)?
            .to_string();

        let mut off = MAGIC_LEN + HOSTNAME_LEN;
        let read_u32 = |bytes: &[u8], off: usize| -> u32 {
            let mut b = [0u8; 4];
            b.copy_from_slice(&bytes[off..off + 4]);
            u32::from_le_bytes(b)
        };

        let sequence = read_u32(bytes, off);
        off += 4;
        let clue = read_u32(bytes, off);
        off += 4;
        let flags = read_u32(bytes, off);
        off += 4;
        let version = read_u32(bytes, off);

        Ok(PulseMessage { direction, hostname: HostName::from(hostname), sequence, clue, flags, version })
    }
}
