//! # Hex Encoding/Decoding Utilities
//!
//! Hex helpers used for frame dumps in the logs and for parsing payloads and
//! AES keys given on the command line or in configuration files.
//!
//! ## Usage
//!
//! ```rust
//! use rfm69_link::util::hex::{decode_hex, format_hex_compact};
//!
//! let data = decode_hex("0a 0b 0c").unwrap();
//! assert_eq!(data, vec![0x0A, 0x0B, 0x0C]);
//! assert_eq!(format_hex_compact(&data), "0a 0b 0c");
//! ```

use thiserror::Error;
use zeroize::Zeroizing;

/// Errors that can occur during hex operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HexError {
    #[error("Odd number of hex characters: {0}")]
    OddLength(usize),

    #[error("Empty hex string")]
    EmptyString,

    #[error("Hex decoding error: {0}")]
    DecodeError(String),

    #[error("Expected {expected} bytes, got {actual}")]
    WrongLength { expected: usize, actual: usize },
}

/// Encode bytes to lowercase hex string
pub fn encode_hex(data: &[u8]) -> String {
    hex::encode(data)
}

/// Decode hex string to bytes
///
/// Accepts both uppercase and lowercase hex characters.
/// Whitespace is automatically stripped.
pub fn decode_hex(hex_str: &str) -> Result<Vec<u8>, HexError> {
    let cleaned: String = hex_str.chars().filter(|c| !c.is_whitespace()).collect();

    if cleaned.is_empty() {
        return Err(HexError::EmptyString);
    }

    if cleaned.len() % 2 != 0 {
        return Err(HexError::OddLength(cleaned.len()));
    }

    hex::decode(&cleaned).map_err(|e| HexError::DecodeError(e.to_string()))
}

/// Parse a 128-bit AES key given as 32 hex characters.
///
/// The decoded key is wiped from memory when dropped.
pub fn parse_aes_key(hex_str: &str) -> Result<Zeroizing<[u8; 16]>, HexError> {
    let bytes = Zeroizing::new(decode_hex(hex_str)?);
    if bytes.len() != 16 {
        return Err(HexError::WrongLength {
            expected: 16,
            actual: bytes.len(),
        });
    }

    let mut key = Zeroizing::new([0u8; 16]);
    key.copy_from_slice(&bytes);
    Ok(key)
}

/// Format hex data for compact display (useful for logs)
///
/// Formats data as "2d 01 05" with spaces between bytes.
pub fn format_hex_compact(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_strips_whitespace() {
        assert_eq!(decode_hex("01 02\t03").unwrap(), vec![1, 2, 3]);
        assert_eq!(decode_hex("ABcd").unwrap(), vec![0xAB, 0xCD]);
    }

    #[test]
    fn test_decode_errors() {
        assert_eq!(decode_hex(""), Err(HexError::EmptyString));
        assert_eq!(decode_hex("abc"), Err(HexError::OddLength(3)));
        assert!(matches!(decode_hex("zz"), Err(HexError::DecodeError(_))));
    }

    #[test]
    fn test_parse_aes_key() {
        let key = parse_aes_key("000102030405060708090a0b0c0d0e0f").unwrap();
        assert_eq!(key[0], 0x00);
        assert_eq!(key[15], 0x0F);

        assert_eq!(
            parse_aes_key("0011").unwrap_err(),
            HexError::WrongLength {
                expected: 16,
                actual: 2
            }
        );
    }

    #[test]
    fn test_format_hex_compact() {
        assert_eq!(format_hex_compact(&[0x2D, 0x01, 0xFF]), "2d 01 ff");
        assert_eq!(format_hex_compact(&[]), "");
    }
}
