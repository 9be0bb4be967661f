//! Init sequence: bus handshake and register programming.
//!
//! The programming table is plain data. Entries that depend on the session
//! configuration name a [`InitValue`] placeholder and are resolved when the
//! table is written.

use crate::error::Rfm69Error;
use crate::radio::bus::Transport;
use crate::radio::config::RadioConfig;
use crate::radio::device::Device;
use crate::radio::mode::Mode;
use crate::radio::poll::wait_for;
use crate::radio::registers::*;
use crate::radio::{HANDSHAKE_INTERVAL, HANDSHAKE_TIMEOUT};
use log::{debug, info, warn};

/// Patterns written to the sync scratch register to check the bus
const HANDSHAKE_PATTERNS: [u8; 2] = [0xAA, 0x55];

/// RSSI trigger level, -RSSITHRESH/2 dBm (-110 dBm)
const RF_RSSITHRESH_VALUE: u8 = 220;

/// Value column of the programming table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitValue {
    Fixed(u8),
    FrfMsb,
    FrfMid,
    FrfLsb,
    NetworkId,
    NodeId,
}

impl InitValue {
    pub fn resolve(self, config: &RadioConfig) -> u8 {
        let frf = config.band.frf();
        match self {
            InitValue::Fixed(value) => value,
            InitValue::FrfMsb => frf[0],
            InitValue::FrfMid => frf[1],
            InitValue::FrfLsb => frf[2],
            InitValue::NetworkId => config.network_id,
            InitValue::NodeId => config.node_id,
        }
    }
}

/// Register programming table, written in order.
pub const INIT_TABLE: &[(u8, InitValue)] = &[
    (
        REG_OPMODE,
        InitValue::Fixed(RF_OPMODE_SEQUENCER_ON | RF_OPMODE_LISTEN_OFF | RF_OPMODE_STANDBY),
    ),
    (
        REG_DATAMODUL,
        InitValue::Fixed(
            RF_DATAMODUL_DATAMODE_PACKET | RF_DATAMODUL_MODULATIONTYPE_FSK | RF_DATAMODUL_MODULATIONSHAPING_00,
        ),
    ),
    (REG_BITRATEMSB, InitValue::Fixed(RF_BITRATEMSB_55555)),
    (REG_BITRATELSB, InitValue::Fixed(RF_BITRATELSB_55555)),
    (REG_FDEVMSB, InitValue::Fixed(RF_FDEVMSB_50000)),
    (REG_FDEVLSB, InitValue::Fixed(RF_FDEVLSB_50000)),
    (REG_FRFMSB, InitValue::FrfMsb),
    (REG_FRFMID, InitValue::FrfMid),
    (REG_FRFLSB, InitValue::FrfLsb),
    (
        REG_RXBW,
        InitValue::Fixed(RF_RXBW_DCCFREQ_010 | RF_RXBW_MANT_16 | RF_RXBW_EXP_2),
    ),
    // DIO0 = payload ready while receiving
    (REG_DIOMAPPING1, InitValue::Fixed(RF_DIOMAPPING1_DIO0_01)),
    (REG_DIOMAPPING2, InitValue::Fixed(RF_DIOMAPPING2_CLKOUT_OFF)),
    // writing FIFO_OVERRUN clears the FIFO
    (REG_IRQFLAGS2, InitValue::Fixed(IrqFlags2::FIFO_OVERRUN.bits())),
    (REG_RSSITHRESH, InitValue::Fixed(RF_RSSITHRESH_VALUE)),
    (
        REG_SYNCCONFIG,
        InitValue::Fixed(RF_SYNC_ON | RF_SYNC_FIFOFILL_AUTO | RF_SYNC_SIZE_2 | RF_SYNC_TOL_0),
    ),
    (REG_SYNCVALUE1, InitValue::Fixed(SYNC_WORD_LEAD)),
    (REG_SYNCVALUE2, InitValue::NetworkId),
    (
        REG_PACKETCONFIG1,
        InitValue::Fixed(
            RF_PACKET1_FORMAT_VARIABLE
                | RF_PACKET1_DCFREE_OFF
                | RF_PACKET1_CRC_ON
                | RF_PACKET1_CRCAUTOCLEAR_ON
                | RF_PACKET1_ADRSFILTERING_NODE,
        ),
    ),
    (REG_PAYLOADLENGTH, InitValue::Fixed(FIFO_SIZE as u8)),
    (REG_NODEADRS, InitValue::NodeId),
    (
        REG_FIFOTHRESH,
        InitValue::Fixed(RF_FIFOTHRESH_TXSTART_FIFONOTEMPTY | RF_FIFOTHRESH_VALUE),
    ),
    (
        REG_PACKETCONFIG2,
        InitValue::Fixed(RF_PACKET2_RXRESTARTDELAY_2BITS | RF_PACKET2_AUTORXRESTART_ON | RF_PACKET2_AES_OFF),
    ),
    (REG_TESTDAGC, InitValue::Fixed(RF_DAGC_IMPROVED_LOWBETA0)),
];

/// The programming table with placeholders filled in from `config`.
pub fn register_table(config: &RadioConfig) -> Vec<(u8, u8)> {
    INIT_TABLE
        .iter()
        .map(|&(reg, value)| (reg, value.resolve(config)))
        .collect()
}

impl<T: Transport + 'static> Device<T> {
    /// Best-effort check that the chip answers: write each pattern to the
    /// sync scratch register and wait for it to read back.
    ///
    /// A chip that never echoes is logged and otherwise ignored.
    pub async fn handshake(&mut self) -> Result<(), Rfm69Error> {
        for pattern in HANDSHAKE_PATTERNS {
            self.bus.write(REG_SYNCVALUE1, pattern).await?;

            let echoed = wait_for(
                self,
                move |dev| {
                    Box::pin(async move {
                        let value = dev.bus.read(REG_SYNCVALUE1).await?;
                        Ok::<_, Rfm69Error>(value == pattern)
                    })
                },
                HANDSHAKE_TIMEOUT,
                HANDSHAKE_INTERVAL,
            )
            .await?;

            if let Err(timeout) = echoed {
                warn!("Handshake pattern 0x{pattern:02X} not echoed within {:?}, continuing", timeout.0);
            }
        }
        Ok(())
    }

    /// Full init: handshake, programming table, encryption off, PA setup,
    /// then Standby.
    pub async fn initialize(&mut self) -> Result<(), Rfm69Error> {
        self.handshake().await?;

        // Whatever the chip was doing before, the cache knows nothing about it.
        self.invalidate_mode();

        for (reg, value) in register_table(&self.config) {
            self.bus.write(reg, value).await?;
        }
        debug!("Wrote {} init registers", INIT_TABLE.len());

        // AES state survives a module reset
        self.set_encryption(None).await?;
        self.configure_high_power().await?;
        self.set_mode(Mode::Standby).await?;

        info!(
            "RFM69 initialized: node {}, network {}, {}, {} power",
            self.config.node_id,
            self.config.network_id,
            self.config.band,
            if self.config.is_high_power { "high" } else { "standard" }
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::radio::config::Band;
    use crate::radio::sim::SimulatedRfm69;
    use std::time::Instant;

    fn config() -> RadioConfig {
        RadioConfig {
            node_id: 7,
            network_id: 100,
            band: Band::Mhz868,
            is_high_power: true,
        }
    }

    #[test]
    fn test_table_substitutes_session_values() {
        let table = register_table(&config());
        let lookup = |reg: u8| table.iter().find(|(r, _)| *r == reg).map(|(_, v)| *v);

        assert_eq!(lookup(REG_NODEADRS), Some(7));
        assert_eq!(lookup(REG_SYNCVALUE2), Some(100));
        assert_eq!(lookup(REG_SYNCVALUE1), Some(0x2D));
        assert_eq!(lookup(REG_FRFMSB), Some(0xD9));
        assert_eq!(lookup(REG_PACKETCONFIG1), Some(0x92));
        assert_eq!(lookup(REG_PACKETCONFIG2), Some(0x12));
        assert_eq!(lookup(REG_PAYLOADLENGTH), Some(66));
        assert_eq!(table.first(), Some(&(REG_OPMODE, 0x04)));
        assert_eq!(table.last(), Some(&(REG_TESTDAGC, 0x30)));
    }

    #[tokio::test]
    async fn test_initialize_programs_the_chip() {
        let sim = SimulatedRfm69::new();
        sim.set_register(REG_PACKETCONFIG2, RF_PACKET2_AES_ON);
        let mut dev = Device::new(sim.clone(), config());

        dev.initialize().await.unwrap();

        assert_eq!(dev.mode(), Some(Mode::Standby));
        assert_eq!(sim.register(REG_OPMODE) & RF_OPMODE_MASK, RF_OPMODE_STANDBY);
        assert_eq!(sim.register(REG_NODEADRS), 7);
        assert_eq!(sim.register(REG_SYNCVALUE1), 0x2D);
        assert_eq!(sim.register(REG_SYNCVALUE2), 100);
        assert_eq!(sim.register(REG_DIOMAPPING1), RF_DIOMAPPING1_DIO0_01);
        assert_eq!(sim.register(REG_PACKETCONFIG2) & RF_PACKET2_AES_ON, 0);
        assert_eq!(sim.register(REG_OCP), RF_OCP_OFF);
        assert_eq!(
            sim.register(REG_PALEVEL) & !RF_PALEVEL_OUTPUTPOWER_MASK,
            RF_PALEVEL_PA1_ON | RF_PALEVEL_PA2_ON
        );
    }

    #[tokio::test]
    async fn test_handshake_writes_both_patterns() {
        let sim = SimulatedRfm69::new();
        let mut dev = Device::new(sim.clone(), config());

        dev.handshake().await.unwrap();
        assert_eq!(sim.writes_to(REG_SYNCVALUE1), vec![0xAA, 0x55]);
    }

    #[tokio::test]
    async fn test_handshake_timeout_is_swallowed() {
        let sim = SimulatedRfm69::new();
        sim.freeze_register(REG_SYNCVALUE1);
        let mut dev = Device::new(sim.clone(), config());

        let start = Instant::now();
        dev.initialize().await.unwrap();

        assert!(start.elapsed() >= HANDSHAKE_TIMEOUT * 2);
        assert_eq!(dev.mode(), Some(Mode::Standby));
    }
}
