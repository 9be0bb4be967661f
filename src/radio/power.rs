//! Output power and carrier frequency.
//!
//! The power level lives only in driver memory; it is never read back from
//! the chip. High-power modules run the PA stages in a doubled range, so the
//! requested level is halved before it reaches the register.

use crate::error::Rfm69Error;
use crate::radio::bus::Transport;
use crate::radio::device::{Device, MAX_POWER_LEVEL};
use crate::radio::mode::Mode;
use crate::radio::registers::*;
use log::debug;

/// Mask of the PA stage enable bits in REG_PALEVEL
const PA_STAGES_MASK: u8 = !RF_PALEVEL_OUTPUTPOWER_MASK;

/// Largest value the 24-bit frequency register holds
const FRF_MAX: u64 = 0xFF_FFFF;

/// Frequency register value for a carrier in Hz, truncated to the
/// synthesizer step of 32 MHz / 2^19.
///
/// `None` when the carrier is beyond what 24 bits can express (about 1.024 GHz).
pub fn hz_to_frf(hz: u32) -> Option<u32> {
    let frf = ((hz as u64) << FSTEP_SHIFT) / FXOSC_HZ;
    (frf <= FRF_MAX).then_some(frf as u32)
}

/// Carrier frequency in Hz for a frequency register value, rounded to the
/// nearest Hz.
pub fn frf_to_hz(frf: u32) -> u32 {
    let half_step = 1u64 << (FSTEP_SHIFT - 1);
    (((frf as u64) * FXOSC_HZ + half_step) >> FSTEP_SHIFT) as u32
}

/// Level actually programmed for a requested level.
pub fn effective_power_level(requested: i32, is_high_power: bool) -> u8 {
    let level = requested.clamp(0, MAX_POWER_LEVEL as i32) as u8;
    if is_high_power {
        level / 2
    } else {
        level
    }
}

impl<T: Transport + 'static> Device<T> {
    /// Set the output power field, preserving the PA stage bits.
    ///
    /// Returns the level written.
    pub async fn set_power_level(&mut self, requested: i32) -> Result<u8, Rfm69Error> {
        let level = effective_power_level(requested, self.config.is_high_power);
        self.bus
            .update(REG_PALEVEL, RF_PALEVEL_OUTPUTPOWER_MASK, level)
            .await?;
        self.power_level = level;
        debug!("Power level {requested} -> {level}");
        Ok(level)
    }

    /// PA stage setup done once during init.
    pub async fn configure_high_power(&mut self) -> Result<(), Rfm69Error> {
        if self.config.is_high_power {
            self.bus.write(REG_OCP, RF_OCP_OFF).await?;
            self.bus
                .update(REG_PALEVEL, PA_STAGES_MASK, RF_PALEVEL_PA1_ON | RF_PALEVEL_PA2_ON)
                .await
        } else {
            self.bus.write(REG_OCP, RF_OCP_ON).await?;
            self.bus
                .write(REG_PALEVEL, RF_PALEVEL_PA0_ON | self.power_level)
                .await
        }
    }

    /// Current carrier frequency in Hz
    pub async fn frequency(&mut self) -> Result<u32, Rfm69Error> {
        let msb = self.bus.read(REG_FRFMSB).await? as u32;
        let mid = self.bus.read(REG_FRFMID).await? as u32;
        let lsb = self.bus.read(REG_FRFLSB).await? as u32;
        Ok(frf_to_hz((msb << 16) | (mid << 8) | lsb))
    }

    /// Retune the carrier.
    ///
    /// The frequency registers must not change while transmitting, and the
    /// synthesizer only relocks in Rx after a pass through Synth.
    pub async fn set_frequency(&mut self, hz: u32) -> Result<(), Rfm69Error> {
        let frf = hz_to_frf(hz)
            .ok_or_else(|| Rfm69Error::Config(format!("frequency {hz} Hz out of range")))?;

        let previous = self.mode;
        if previous == Some(Mode::Tx) {
            self.set_mode(Mode::Rx).await?;
        }

        self.bus.write(REG_FRFMSB, (frf >> 16) as u8).await?;
        self.bus.write(REG_FRFMID, (frf >> 8) as u8).await?;
        self.bus.write(REG_FRFLSB, frf as u8).await?;
        debug!("Frequency set to {hz} Hz (FRF 0x{frf:06X})");

        if previous == Some(Mode::Rx) {
            self.set_mode(Mode::Synth).await?;
        }
        if let Some(mode) = previous {
            self.set_mode(mode).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::radio::config::RadioConfig;
    use crate::radio::sim::SimulatedRfm69;
    use proptest::prelude::*;

    fn device(sim: &SimulatedRfm69, is_high_power: bool) -> Device<SimulatedRfm69> {
        let config = RadioConfig {
            is_high_power,
            ..RadioConfig::default()
        };
        Device::new(sim.clone(), config)
    }

    #[test]
    fn test_clamp_happens_before_halving() {
        assert_eq!(effective_power_level(-5, true), 0);
        assert_eq!(effective_power_level(-5, false), 0);
        assert_eq!(effective_power_level(100, true), 15);
        assert_eq!(effective_power_level(100, false), 31);
        assert_eq!(effective_power_level(31, true), 15);
        assert_eq!(effective_power_level(7, true), 3);
    }

    #[test]
    fn test_band_triplets_decode_to_band_centres() {
        assert_eq!(frf_to_hz(0x6C4000), 433_000_000);
        assert_eq!(frf_to_hz(0xD90000), 868_000_000);
        assert_eq!(frf_to_hz(0xE4C000), 915_000_000);
        assert_eq!(hz_to_frf(915_000_000), Some(0xE4C000));
    }

    proptest! {
        #[test]
        fn prop_power_level_in_range(requested in any::<i32>(), high in any::<bool>()) {
            let level = effective_power_level(requested, high);
            let max = if high { 15 } else { 31 };
            prop_assert!(level <= max);
        }

        #[test]
        fn prop_frequency_roundtrip_within_one_step(hz in 290_000_000u32..1_020_000_000u32) {
            let back = frf_to_hz(hz_to_frf(hz).unwrap());
            prop_assert!(back <= hz);
            prop_assert!(hz - back <= 61, "{} -> {}", hz, back);
        }
    }

    #[tokio::test]
    async fn test_set_power_level_keeps_pa_bits() {
        let sim = SimulatedRfm69::new();
        sim.set_register(REG_PALEVEL, RF_PALEVEL_PA1_ON | RF_PALEVEL_PA2_ON | 0x1F);
        let mut dev = device(&sim, true);

        assert_eq!(dev.set_power_level(100).await.unwrap(), 15);
        assert_eq!(dev.power_level(), 15);
        assert_eq!(sim.register(REG_PALEVEL), RF_PALEVEL_PA1_ON | RF_PALEVEL_PA2_ON | 15);

        assert_eq!(dev.set_power_level(-5).await.unwrap(), 0);
        assert_eq!(sim.register(REG_PALEVEL), RF_PALEVEL_PA1_ON | RF_PALEVEL_PA2_ON);
    }

    #[tokio::test]
    async fn test_configure_high_power_module() {
        let sim = SimulatedRfm69::new();
        sim.set_register(REG_PALEVEL, RF_PALEVEL_PA0_ON | 0x1F);
        let mut dev = device(&sim, true);

        dev.configure_high_power().await.unwrap();
        assert_eq!(sim.register(REG_OCP), RF_OCP_OFF);
        assert_eq!(sim.register(REG_PALEVEL), RF_PALEVEL_PA1_ON | RF_PALEVEL_PA2_ON | 0x1F);
    }

    #[tokio::test]
    async fn test_configure_standard_module() {
        let sim = SimulatedRfm69::new();
        let mut dev = device(&sim, false);
        dev.set_power_level(20).await.unwrap();

        dev.configure_high_power().await.unwrap();
        assert_eq!(sim.register(REG_OCP), RF_OCP_ON);
        assert_eq!(sim.register(REG_PALEVEL), RF_PALEVEL_PA0_ON | 20);
    }

    #[tokio::test]
    async fn test_set_frequency_roundtrip() {
        let sim = SimulatedRfm69::new();
        let mut dev = device(&sim, false);

        dev.set_frequency(434_123_456).await.unwrap();
        let hz = dev.frequency().await.unwrap();
        assert!(434_123_456 - hz <= 61, "got {hz}");
    }

    #[test]
    fn test_frf_range_limit() {
        assert_eq!(hz_to_frf(1_023_999_939), Some(0xFF_FFFF));
        assert_eq!(hz_to_frf(1_024_000_000), None);
        assert_eq!(hz_to_frf(u32::MAX), None);
    }

    #[tokio::test]
    async fn test_set_frequency_out_of_range_touches_nothing() {
        let sim = SimulatedRfm69::new();
        let mut dev = device(&sim, false);
        dev.set_frequency(433_000_000).await.unwrap();
        dev.set_mode(Mode::Tx).await.unwrap();
        sim.clear_transfers();

        let err = dev.set_frequency(2_000_000_000).await.unwrap_err();
        assert!(matches!(err, Rfm69Error::Config(_)));
        assert_eq!(sim.transfer_count(), 0);
        assert_eq!(dev.mode(), Some(Mode::Tx));
        assert_eq!(dev.frequency().await.unwrap(), 433_000_000);
    }

    #[tokio::test]
    async fn test_set_frequency_in_rx_passes_through_synth() {
        let sim = SimulatedRfm69::new();
        let mut dev = device(&sim, false);
        dev.set_mode(Mode::Rx).await.unwrap();
        sim.clear_transfers();

        dev.set_frequency(868_300_000).await.unwrap();

        let modes: Vec<u8> = sim
            .writes_to(REG_OPMODE)
            .into_iter()
            .map(|v| v & RF_OPMODE_MASK)
            .collect();
        assert_eq!(modes, vec![RF_OPMODE_SYNTHESIZER, RF_OPMODE_RECEIVER]);
        assert_eq!(dev.mode(), Some(Mode::Rx));
    }

    #[tokio::test]
    async fn test_set_frequency_never_writes_in_tx() {
        let sim = SimulatedRfm69::new();
        let mut dev = device(&sim, false);
        dev.set_mode(Mode::Tx).await.unwrap();
        sim.clear_transfers();

        dev.set_frequency(915_000_000).await.unwrap();

        let transfers = sim.transfers();
        let first_frf = transfers
            .iter()
            .position(|tx| tx[0] == REG_FRFMSB | SPI_WRITE)
            .unwrap();
        let rx_entry = transfers
            .iter()
            .position(|tx| tx[0] == REG_OPMODE | SPI_WRITE && tx[1] & RF_OPMODE_MASK == RF_OPMODE_RECEIVER)
            .unwrap();
        assert!(rx_entry < first_frf);
        assert_eq!(dev.mode(), Some(Mode::Tx));
    }

    #[tokio::test]
    async fn test_set_frequency_in_standby_changes_no_mode() {
        let sim = SimulatedRfm69::new();
        let mut dev = device(&sim, false);
        dev.set_mode(Mode::Standby).await.unwrap();
        sim.clear_transfers();

        dev.set_frequency(433_500_000).await.unwrap();
        assert!(sim.writes_to(REG_OPMODE).is_empty());
    }
}
