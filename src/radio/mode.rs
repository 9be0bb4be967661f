//! Operating mode state machine.
//!
//! Every mode change in the driver goes through [`Device::set_mode`]: a masked
//! write of the mode bits, the high-power PA test registers on Tx/Rx entry, and
//! a bounded wait for the mode-ready flag before the new mode is committed.

use crate::error::Rfm69Error;
use crate::radio::bus::Transport;
use crate::radio::device::Device;
use crate::radio::poll::wait_for;
use crate::radio::registers::*;
use crate::radio::{MODE_READY_INTERVAL, MODE_READY_TIMEOUT};
use log::{debug, warn};

/// Operating modes for the RFM69
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Lowest power, oscillator off
    Sleep,
    /// Crystal oscillator running
    Standby,
    /// Frequency synthesizer locked
    Synth,
    /// Receiving
    Rx,
    /// Transmitting
    Tx,
}

impl Mode {
    /// Mode bits for REG_OPMODE
    pub const fn opmode_bits(self) -> u8 {
        match self {
            Mode::Sleep => RF_OPMODE_SLEEP,
            Mode::Standby => RF_OPMODE_STANDBY,
            Mode::Synth => RF_OPMODE_SYNTHESIZER,
            Mode::Rx => RF_OPMODE_RECEIVER,
            Mode::Tx => RF_OPMODE_TRANSMITTER,
        }
    }
}

impl<T: Transport + 'static> Device<T> {
    /// Switch the operating mode.
    ///
    /// No bus traffic at all when `target` is already the confirmed mode. On a
    /// mode-ready timeout the cached mode keeps its old value, which no longer
    /// matches the chip.
    pub async fn set_mode(&mut self, target: Mode) -> Result<(), Rfm69Error> {
        if self.mode == Some(target) {
            return Ok(());
        }

        self.bus
            .update(REG_OPMODE, RF_OPMODE_MASK, target.opmode_bits())
            .await?;

        if self.config.is_high_power {
            match target {
                Mode::Tx => self.set_pa_boost(true).await?,
                Mode::Rx => self.set_pa_boost(false).await?,
                _ => {}
            }
        }

        let ready = wait_for(
            self,
            |dev| {
                Box::pin(async move {
                    let flags = dev.irq_flags1().await?;
                    Ok::<_, Rfm69Error>(flags.contains(IrqFlags1::MODE_READY))
                })
            },
            MODE_READY_TIMEOUT,
            MODE_READY_INTERVAL,
        )
        .await?;

        if ready.is_err() {
            warn!("Mode ready timeout switching {:?} -> {:?}", self.mode, target);
            return Err(Rfm69Error::ModeReadyTimeout { target });
        }

        debug!("RFM69 mode set to: {:?}", target);
        self.mode = Some(target);
        Ok(())
    }

    /// +20 dBm boost on the PA_BOOST pin; only valid on high-power modules.
    async fn set_pa_boost(&mut self, on: bool) -> Result<(), Rfm69Error> {
        let (pa1, pa2) = if on {
            (RF_TESTPA1_20DBM, RF_TESTPA2_20DBM)
        } else {
            (RF_TESTPA1_NORMAL, RF_TESTPA2_NORMAL)
        };
        self.bus.write(REG_TESTPA1, pa1).await?;
        self.bus.write(REG_TESTPA2, pa2).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::radio::config::RadioConfig;
    use crate::radio::sim::SimulatedRfm69;

    fn device(sim: &SimulatedRfm69, is_high_power: bool) -> Device<SimulatedRfm69> {
        let config = RadioConfig {
            is_high_power,
            ..RadioConfig::default()
        };
        Device::new(sim.clone(), config)
    }

    #[tokio::test]
    async fn test_set_mode_commits_after_mode_ready() {
        let sim = SimulatedRfm69::new();
        let mut dev = device(&sim, false);

        dev.set_mode(Mode::Rx).await.unwrap();
        assert_eq!(dev.mode(), Some(Mode::Rx));
        assert_eq!(sim.register(REG_OPMODE) & RF_OPMODE_MASK, RF_OPMODE_RECEIVER);
    }

    #[tokio::test]
    async fn test_set_mode_to_current_is_silent() {
        let sim = SimulatedRfm69::new();
        let mut dev = device(&sim, true);

        dev.set_mode(Mode::Standby).await.unwrap();
        let before = sim.transfer_count();
        dev.set_mode(Mode::Standby).await.unwrap();
        assert_eq!(sim.transfer_count(), before);
    }

    #[tokio::test]
    async fn test_set_mode_preserves_sequencer_and_listen_bits() {
        let sim = SimulatedRfm69::new();
        sim.set_register(REG_OPMODE, 0x44);
        let mut dev = device(&sim, false);

        dev.set_mode(Mode::Tx).await.unwrap();
        assert_eq!(sim.register(REG_OPMODE), 0x40 | RF_OPMODE_TRANSMITTER);
    }

    #[tokio::test]
    async fn test_high_power_boost_toggles_on_tx_and_rx() {
        let sim = SimulatedRfm69::new();
        let mut dev = device(&sim, true);

        dev.set_mode(Mode::Tx).await.unwrap();
        assert_eq!(sim.register(REG_TESTPA1), RF_TESTPA1_20DBM);
        assert_eq!(sim.register(REG_TESTPA2), RF_TESTPA2_20DBM);

        dev.set_mode(Mode::Rx).await.unwrap();
        assert_eq!(sim.register(REG_TESTPA1), RF_TESTPA1_NORMAL);
        assert_eq!(sim.register(REG_TESTPA2), RF_TESTPA2_NORMAL);
    }

    #[tokio::test]
    async fn test_standard_power_leaves_test_registers_alone() {
        let sim = SimulatedRfm69::new();
        let mut dev = device(&sim, false);

        dev.set_mode(Mode::Tx).await.unwrap();
        assert!(sim.writes_to(REG_TESTPA1).is_empty());
        assert!(sim.writes_to(REG_TESTPA2).is_empty());
    }

    #[tokio::test]
    async fn test_mode_ready_timeout_keeps_stale_mode() {
        let sim = SimulatedRfm69::new();
        let mut dev = device(&sim, false);
        dev.set_mode(Mode::Standby).await.unwrap();

        sim.set_mode_ready_stuck(true);
        let err = dev.set_mode(Mode::Rx).await.unwrap_err();

        assert!(matches!(err, Rfm69Error::ModeReadyTimeout { target: Mode::Rx }));
        assert!(err.is_session_fatal());
        assert_eq!(dev.mode(), Some(Mode::Standby));
    }
}
