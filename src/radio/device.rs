//! The chip as seen by the protocol engine: register bus plus the state the
//! driver caches about it (operating mode, output power).
//!
//! Both background loops reach the chip through one `SharedDevice`; the mutex
//! serializes every register access and mode change.

use crate::error::Rfm69Error;
use crate::radio::bus::{RegisterBus, Transport};
use crate::radio::config::RadioConfig;
use crate::radio::mode::Mode;
use crate::radio::poll::wait_for;
use crate::radio::registers::*;
use crate::radio::{RSSI_INTERVAL, RSSI_TIMEOUT};
use log::debug;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Device handle shared between the public API and the drain loops.
pub type SharedDevice<T> = Arc<Mutex<Device<T>>>;

pub struct Device<T> {
    pub(crate) bus: RegisterBus<T>,
    pub(crate) config: RadioConfig,
    /// Last confirmed operating mode; `None` until the first confirmed change
    pub(crate) mode: Option<Mode>,
    /// Value last written to the PA output power field
    pub(crate) power_level: u8,
}

impl<T: Transport + 'static> Device<T> {
    pub fn new(transport: T, config: RadioConfig) -> Self {
        Self {
            bus: RegisterBus::new(transport),
            config,
            mode: None,
            power_level: MAX_POWER_LEVEL,
        }
    }

    pub fn into_shared(self) -> SharedDevice<T> {
        Arc::new(Mutex::new(self))
    }

    pub fn config(&self) -> &RadioConfig {
        &self.config
    }

    /// Last confirmed operating mode
    pub fn mode(&self) -> Option<Mode> {
        self.mode
    }

    pub fn power_level(&self) -> u8 {
        self.power_level
    }

    /// Forget the cached mode so the next `set_mode` always reaches the chip.
    pub(crate) fn invalidate_mode(&mut self) {
        self.mode = None;
    }

    pub async fn irq_flags1(&mut self) -> Result<IrqFlags1, Rfm69Error> {
        Ok(IrqFlags1::from_bits_retain(self.bus.read(REG_IRQFLAGS1).await?))
    }

    pub async fn irq_flags2(&mut self) -> Result<IrqFlags2, Rfm69Error> {
        Ok(IrqFlags2::from_bits_retain(self.bus.read(REG_IRQFLAGS2).await?))
    }

    /// Silicon revision (0x24 on production parts)
    pub async fn version(&mut self) -> Result<u8, Rfm69Error> {
        self.bus.read(REG_VERSION).await
    }

    /// Restart the receiver; clears a stuck FIFO/packet engine.
    pub async fn restart_rx(&mut self) -> Result<(), Rfm69Error> {
        self.bus
            .update(REG_PACKETCONFIG2, RF_PACKET2_RXRESTART, RF_PACKET2_RXRESTART)
            .await
    }

    /// Route DIO0 to a signal (`RF_DIOMAPPING1_DIO0_*`).
    pub async fn map_dio0(&mut self, mapping: u8) -> Result<(), Rfm69Error> {
        self.bus.write(REG_DIOMAPPING1, mapping).await
    }

    /// RSSI in dBm.
    ///
    /// Without `force` this reads the last value, which stays current while
    /// DAGC runs continuously in Rx. With `force` a new measurement is
    /// triggered first and awaited.
    pub async fn read_rssi(&mut self, force: bool) -> Result<i16, Rfm69Error> {
        if force {
            self.bus.write(REG_RSSICONFIG, RF_RSSI_START).await?;
            let done = wait_for(
                self,
                |dev| {
                    Box::pin(async move {
                        let status = dev.bus.read(REG_RSSICONFIG).await?;
                        Ok::<_, Rfm69Error>(status & RF_RSSI_DONE != 0)
                    })
                },
                RSSI_TIMEOUT,
                RSSI_INTERVAL,
            )
            .await?;
            done.map_err(|_| Rfm69Error::RssiTimeout)?;
        }

        let raw = self.bus.read(REG_RSSIVALUE).await?;
        Ok(-(raw as i16) / 2)
    }

    /// Load an AES key (or clear encryption) while in standby.
    pub async fn set_encryption(&mut self, key: Option<&[u8; AES_KEY_LEN]>) -> Result<(), Rfm69Error> {
        self.set_mode(Mode::Standby).await?;

        if let Some(key) = key {
            self.bus.write_burst(REG_AESKEY1, key).await?;
        }

        let aes = if key.is_some() { RF_PACKET2_AES_ON } else { RF_PACKET2_AES_OFF };
        self.bus
            .update(REG_PACKETCONFIG2, RF_PACKET2_AES_ON, aes)
            .await?;

        debug!("AES encryption {}", if key.is_some() { "enabled" } else { "disabled" });
        Ok(())
    }
}

/// Highest value of the PA output power field
pub const MAX_POWER_LEVEL: u8 = 31;
