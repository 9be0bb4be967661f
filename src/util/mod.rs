//! # Utility Modules
//!
//! Hex encoding/decoding and log rate limiting shared by the radio driver
//! and the CLI.

pub mod hex;
pub mod logging;

// Re-export commonly used types and functions
pub use hex::{decode_hex, encode_hex, format_hex_compact, parse_aes_key, HexError};
pub use logging::{log_frame_hex, LogThrottle};
