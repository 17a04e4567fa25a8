// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Error types for the HDP session core.

use thiserror::Error;

/// Malformed or out-of-bounds frame content. The offending frame is skipped.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// A field lies past the end of the received bytes.
    #[error("frame truncated: {needed} byte(s) at offset {offset}, only {len} received")]
    Truncated {
        offset: usize,
        needed: usize,
        len: usize,
    },

    /// The event-info length points beyond the received bytes.
    #[error("report length {declared} at offset {offset} exceeds {available} received byte(s)")]
    ReportOverrun {
        offset: usize,
        declared: usize,
        available: usize,
    },

    /// An observation is too short for the values its handle promises.
    #[error("object with handle {handle} carries {len} byte(s), need {needed}")]
    ShortObject {
        handle: u16,
        len: usize,
        needed: usize,
    },
}

/// Main error type for HDP sessions.
#[derive(Debug, Error)]
pub enum HdpError {
    /// Read or write failure on the channel.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Frame content could not be decoded.
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Hardware address string is not six colon-separated hex octets.
    #[error("Invalid hardware address: {0}")]
    InvalidAddress(String),

    /// The session's writer is gone.
    #[error("Session closed")]
    SessionClosed,
}

/// Result type alias using HdpError.
pub type Result<T> = std::result::Result<T, HdpError>;
