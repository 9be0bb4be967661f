//! # Raspberry Pi Transport
//!
//! RFM69 on the Raspberry Pi SPI0 bus using the rppal crate.
//!
//! ## Wiring (BCM numbering)
//! ```text
//! Pi Pin │ BCM GPIO │ RFM69 Pin │ Function
//! ───────┼──────────┼───────────┼─────────────
//! 19     │ GPIO 10  │ MOSI      │ SPI data out
//! 21     │ GPIO 9   │ MISO      │ SPI data in
//! 23     │ GPIO 11  │ SCK       │ SPI clock
//! 24     │ GPIO 8   │ NSS       │ Chip select (CE0)
//! 16     │ GPIO 23  │ DIO0      │ Interrupt (input)
//! 29     │ GPIO 5   │ RESET     │ Reset (output, active high)
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use rfm69_link::radio::hal::raspberry_pi::{attach_interrupt_pin, pulse_reset, SpiTransport};
//! use rfm69_link::radio::{InterruptLine, Radio, RadioConfig};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! pulse_reset(5).await?;
//! let line = InterruptLine::new();
//! let _dio0 = attach_interrupt_pin(23, line.clone())?;
//!
//! let radio = Radio::new(SpiTransport::new()?, RadioConfig::default(), line);
//! radio.init().await?;
//! # Ok(())
//! # }
//! ```

use crate::error::Rfm69Error;
use crate::radio::bus::Transport;
use crate::radio::hal::HalError;
use crate::radio::irq::InterruptLine;
use crate::radio::registers::SPI_SPEED;
use async_trait::async_trait;
use log::info;
use rppal::gpio::{Gpio, InputPin, Trigger};
use rppal::spi::{BitOrder, Bus, Mode, SlaveSelect, Spi};
use std::time::Duration;
use tokio::time::sleep;

/// Reset pulse width and the settle time after it
const RESET_PULSE: Duration = Duration::from_millis(1);
const RESET_SETTLE: Duration = Duration::from_millis(10);

/// SPI0/CE0 at 1 MHz, mode 0, MSB first.
pub struct SpiTransport {
    spi: Spi,
}

impl SpiTransport {
    pub fn new() -> Result<Self, HalError> {
        Self::with_bus(Bus::Spi0, SlaveSelect::Ss0)
    }

    pub fn with_bus(bus: Bus, slave_select: SlaveSelect) -> Result<Self, HalError> {
        let spi = Spi::new(bus, slave_select, SPI_SPEED, Mode::Mode0)
            .map_err(|e| HalError::Spi(e.to_string()))?;
        spi.set_bit_order(BitOrder::MsbFirst)
            .map_err(|e| HalError::Spi(e.to_string()))?;

        info!("RFM69 SPI initialized: {SPI_SPEED} Hz, Mode 0, MSB first");
        Ok(Self { spi })
    }
}

#[async_trait]
impl Transport for SpiTransport {
    async fn transfer(&mut self, tx: &[u8]) -> Result<Vec<u8>, Rfm69Error> {
        // Register transfers are a few bytes at 1 MHz; blocking here is shorter
        // than a hop to the blocking pool.
        let mut rx = vec![0u8; tx.len()];
        self.spi
            .transfer(&mut rx, tx)
            .map_err(|e| Rfm69Error::Bus(e.to_string()))?;
        Ok(rx)
    }
}

/// Forward rising edges on `pin` into `line`.
///
/// The edges keep flowing for as long as the returned pin is alive.
pub fn attach_interrupt_pin(pin: u8, line: InterruptLine) -> Result<InputPin, HalError> {
    let gpio = Gpio::new().map_err(|e| HalError::Gpio(e.to_string()))?;
    let mut input = gpio
        .get(pin)
        .map_err(|e| HalError::Gpio(format!("GPIO {pin}: {e}")))?
        .into_input_pulldown();

    input
        .set_async_interrupt(Trigger::RisingEdge, move |_level| line.trigger())
        .map_err(|e| HalError::Gpio(format!("GPIO {pin} interrupt: {e}")))?;

    info!("RFM69 DIO0 interrupt on GPIO {pin}");
    Ok(input)
}

/// Pulse the reset line (active high) and wait for the chip to come back.
pub async fn pulse_reset(pin: u8) -> Result<(), HalError> {
    let gpio = Gpio::new().map_err(|e| HalError::Gpio(e.to_string()))?;
    let mut reset = gpio
        .get(pin)
        .map_err(|e| HalError::Gpio(format!("GPIO {pin}: {e}")))?
        .into_output();

    reset.set_high();
    sleep(RESET_PULSE).await;
    reset.set_low();
    sleep(RESET_SETTLE).await;

    info!("RFM69 reset via GPIO {pin}");
    Ok(())
}
