//! # Hardware Transports
//!
//! Platform glue between the protocol engine and real hardware: a
//! [`Transport`](crate::radio::bus::Transport) over the SPI bus and a GPIO
//! callback feeding DIO0 edges into an
//! [`InterruptLine`](crate::radio::irq::InterruptLine).

use thiserror::Error;

/// Errors raised while setting up hardware
#[derive(Debug, Error)]
pub enum HalError {
    #[error("SPI error: {0}")]
    Spi(String),

    #[error("GPIO error: {0}")]
    Gpio(String),
}

impl From<HalError> for crate::error::Rfm69Error {
    fn from(err: HalError) -> Self {
        crate::error::Rfm69Error::Bus(err.to_string())
    }
}

// Platform implementations
#[cfg(feature = "raspberry-pi")]
pub mod raspberry_pi;
