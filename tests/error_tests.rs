//! Unit tests for the `Rfm69Error` enum and its `Display` output.

use rfm69_link::radio::PollTimeout;
use rfm69_link::{Mode, Rfm69Error};
use std::time::Duration;

#[test]
fn test_not_initialized_error() {
    assert_eq!(Rfm69Error::NotInitialized.to_string(), "Radio not initialized");
}

#[test]
fn test_already_initialized_error() {
    assert_eq!(Rfm69Error::AlreadyInitialized.to_string(), "Radio already initialized");
}

#[test]
fn test_mode_ready_timeout_error() {
    let err = Rfm69Error::ModeReadyTimeout { target: Mode::Tx };
    assert_eq!(err.to_string(), "Timeout waiting for mode ready (Tx)");
}

#[test]
fn test_packet_too_big_error() {
    let err = Rfm69Error::PacketTooBig { len: 70, max: 62 };
    assert_eq!(err.to_string(), "Packet too big: 70 bytes (max 62)");
}

#[test]
fn test_invalid_key_error() {
    let err = Rfm69Error::InvalidKey { len: 15 };
    assert_eq!(err.to_string(), "Invalid AES key length: 15 (expected 16)");
}

#[test]
fn test_io_error_conversion() {
    let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
    let err: Rfm69Error = io.into();
    assert!(matches!(err, Rfm69Error::Io(_)));
}

/// Only a mode-ready timeout leaves the cached mode out of sync.
#[test]
fn test_session_fatal_classification() {
    assert!(Rfm69Error::ModeReadyTimeout { target: Mode::Rx }.is_session_fatal());

    for err in [
        Rfm69Error::NotInitialized,
        Rfm69Error::AlreadyInitialized,
        Rfm69Error::PacketTooBig { len: 63, max: 62 },
        Rfm69Error::TxInterruptTimeout,
        Rfm69Error::RssiTimeout,
        Rfm69Error::Bus("x".to_string()),
        Rfm69Error::Stopped,
    ] {
        assert!(!err.is_session_fatal(), "{err}");
    }
}

#[test]
fn test_poll_timeout_display() {
    let timeout = PollTimeout(Duration::from_millis(50));
    assert_eq!(timeout.to_string(), "condition not met within 50ms");
}
