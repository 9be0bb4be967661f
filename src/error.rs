//! # RFM69 Error Handling
//!
//! This module defines the `Rfm69Error` enum, which represents the different error
//! types that can occur while driving the radio.

use crate::radio::mode::Mode;
use thiserror::Error;

/// Represents the different error types that can occur in the RFM69 crate.
#[derive(Debug, Error)]
pub enum Rfm69Error {
    /// An operation that needs a running session was called before `init()`.
    #[error("Radio not initialized")]
    NotInitialized,

    /// `init()` was called while a session is already running.
    #[error("Radio already initialized")]
    AlreadyInitialized,

    /// The mode-ready flag never came up. The cached mode is stale.
    #[error("Timeout waiting for mode ready ({target:?})")]
    ModeReadyTimeout { target: Mode },

    /// Payload does not fit into a single FIFO frame.
    #[error("Packet too big: {len} bytes (max {max})")]
    PacketTooBig { len: usize, max: usize },

    /// The packet-sent interrupt never arrived.
    #[error("Timeout waiting for transmit-complete interrupt")]
    TxInterruptTimeout,

    /// A forced RSSI measurement never completed.
    #[error("Timeout waiting for RSSI measurement")]
    RssiTimeout,

    /// The underlying byte transport failed.
    #[error("Bus error: {0}")]
    Bus(String),

    /// Invalid configuration value.
    #[error("Configuration error: {0}")]
    Config(String),

    /// AES keys are exactly 16 bytes.
    #[error("Invalid AES key length: {len} (expected 16)")]
    InvalidKey { len: usize },

    /// The session stopped before a queued request was serviced.
    #[error("Radio session stopped")]
    Stopped,

    /// Reading a configuration file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A configuration file could not be parsed.
    #[error("Config parse error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Rfm69Error {
    /// Whether the session should be torn down (`stop()` + `init()`) after this error.
    ///
    /// Only a mode-ready timeout leaves the cached mode out of sync with the chip;
    /// everything else is scoped to the operation that failed.
    pub fn is_session_fatal(&self) -> bool {
        matches!(self, Rfm69Error::ModeReadyTimeout { .. })
    }
}
