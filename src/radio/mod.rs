//! # RFM69 Radio Protocol Engine
//!
//! The driver is layered leaves-first:
//!
//! - [`bus`]: byte transport and single/burst register access
//! - [`poll`]: bounded poll-until-true
//! - [`mode`]: the Sleep/Standby/Synth/Rx/Tx state machine
//! - [`power`]: PA level, high-power configuration, carrier frequency
//! - [`init`]: bus handshake and the register programming table
//! - [`send`] / [`receive`]: the two pipelines drained by the session loops
//! - [`driver`]: the public [`Radio`] handle owning the session
//!
//! [`sim`] is a register-level model of the chip used by the tests and the
//! CLI demo; [`hal`] holds the hardware transports.

pub mod bus;
pub mod config;
pub mod device;
pub mod driver;
pub mod hal;
pub mod init;
pub mod irq;
pub mod mode;
pub mod poll;
pub mod power;
pub mod receive;
pub mod registers;
pub mod send;
pub mod sim;
pub mod stats;

use std::time::Duration;

/// Budget for the mode-ready flag after a mode write
pub const MODE_READY_TIMEOUT: Duration = Duration::from_millis(50);
pub const MODE_READY_INTERVAL: Duration = Duration::from_millis(2);

/// Carrier sense budget before transmitting anyway
pub const CSMA_TIMEOUT: Duration = Duration::from_millis(500);
pub const CSMA_INTERVAL: Duration = Duration::from_millis(2);

/// Channel counts as clear below this level
pub const CSMA_LIMIT_DBM: i16 = -90;

/// Budget for the packet-sent interrupt after entering Tx
pub const TX_INTERRUPT_TIMEOUT: Duration = Duration::from_millis(50);

/// Budget for a forced RSSI measurement
pub const RSSI_TIMEOUT: Duration = Duration::from_millis(50);
pub const RSSI_INTERVAL: Duration = Duration::from_millis(1);

/// Budget per bus-alive handshake pattern during init
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_millis(50);
pub const HANDSHAKE_INTERVAL: Duration = Duration::from_millis(1);

pub use bus::{RegisterBus, Transport};
pub use config::{Band, RadioConfig};
pub use device::{Device, SharedDevice};
pub use driver::Radio;
pub use irq::{InterruptLine, InterruptListener};
pub use mode::Mode;
pub use poll::{wait_for, PollTimeout};
pub use receive::ReceivedPacket;
pub use sim::SimulatedRfm69;
pub use stats::RadioStats;
