//! # rfm69-link - Async Driver for RFM69 Packet Radios
//!
//! The rfm69-link crate drives HopeRF RFM69 (SX1231) sub-GHz FSK transceivers
//! over SPI. It provides addressed packet send/receive with hardware CRC,
//! carrier-sense before transmit, AES, and power/frequency control.
//!
//! ## Features
//!
//! - Serialized send queue with carrier sense and transmit-complete wait
//! - Interrupt-driven receive, fanned out to any number of subscribers
//! - Guarded operating-mode state machine with bounded mode-ready waits
//! - Simulated chip for tests and demos, Raspberry Pi SPI/GPIO transport
//!   behind the `raspberry-pi` feature
//!
//! ## Usage
//!
//! ```rust
//! use rfm69_link::{Radio, RadioConfig, Rfm69Error, SimulatedRfm69};
//!
//! # tokio_test::block_on(async {
//! let chip = SimulatedRfm69::new();
//! let radio = Radio::new(chip.clone(), RadioConfig::default(), chip.interrupt_line());
//! let mut packets = radio.subscribe();
//!
//! radio.init().await?;
//! radio.listen().await?;
//!
//! // A frame from node 5 arrives
//! chip.inject_packet(&[5, 1, 5, 0, 9, 9, 9]);
//! let packet = packets.recv().await.unwrap();
//! assert_eq!(packet.from, 5);
//! assert_eq!(packet.data, vec![9, 9, 9]);
//! # Ok::<(), Rfm69Error>(())
//! # }).unwrap();
//! ```

pub mod error;
pub mod logging;
pub mod radio;
pub mod util;

pub use crate::error::Rfm69Error;
pub use crate::logging::{init_logger, log_info};

pub use radio::{
    Band, InterruptLine, Mode, Radio, RadioConfig, RadioStats, ReceivedPacket, SimulatedRfm69,
    Transport,
};
pub use radio::driver::{SendHandle, SessionState};
