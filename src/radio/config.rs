//! Radio configuration
//!
//! The driver supports configuration via JSON:
//! ```json
//! {
//!   "node_id": 2,
//!   "network_id": 100,
//!   "band": "868",
//!   "is_high_power": true
//! }
//! ```
//! Missing fields fall back to their defaults (node 1, network 1, 433 MHz,
//! high-power module).

use crate::error::Rfm69Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// ISM band the module is built for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Band {
    #[serde(rename = "315")]
    Mhz315,
    #[default]
    #[serde(rename = "433")]
    Mhz433,
    #[serde(rename = "868")]
    Mhz868,
    #[serde(rename = "915")]
    Mhz915,
}

impl Band {
    /// Carrier frequency register triplet (FRFMSB, FRFMID, FRFLSB).
    pub const fn frf(self) -> [u8; 3] {
        match self {
            Band::Mhz315 => [0x4E, 0xC0, 0x00],
            Band::Mhz433 => [0x6C, 0x40, 0x00],
            Band::Mhz868 => [0xD9, 0x00, 0x00],
            Band::Mhz915 => [0xE4, 0xC0, 0x00],
        }
    }

    pub const fn mhz(self) -> u16 {
        match self {
            Band::Mhz315 => 315,
            Band::Mhz433 => 433,
            Band::Mhz868 => 868,
            Band::Mhz915 => 915,
        }
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} MHz", self.mhz())
    }
}

impl FromStr for Band {
    type Err = Rfm69Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.trim().trim_end_matches("MHz").trim_end_matches("mhz").trim();
        match digits {
            "315" => Ok(Band::Mhz315),
            "433" => Ok(Band::Mhz433),
            "868" => Ok(Band::Mhz868),
            "915" => Ok(Band::Mhz915),
            other => Err(Rfm69Error::Config(format!("unknown band: {other}"))),
        }
    }
}

/// Session configuration. Immutable once the radio is constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RadioConfig {
    /// Own node address, used for hardware address filtering
    pub node_id: u8,
    /// Network id, sent as the second sync word byte
    pub network_id: u8,
    /// Band the module is built for
    pub band: Band,
    /// RFM69HW/HCW module with the +20 dBm PA stages
    pub is_high_power: bool,
}

impl Default for RadioConfig {
    fn default() -> Self {
        Self {
            node_id: 1,
            network_id: 1,
            band: Band::default(),
            is_high_power: true,
        }
    }
}

impl RadioConfig {
    /// Parse a configuration from a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, Rfm69Error> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, Rfm69Error> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }
}
