//! Receive pipeline: one FIFO drain per DIO0 edge.
//!
//! FIFO layout as read back: `[length, target, sender, control, data...]`
//! with `length - 2` data bytes following the 4 header bytes.

use crate::error::Rfm69Error;
use crate::radio::bus::Transport;
use crate::radio::device::{Device, SharedDevice};
use crate::radio::irq::InterruptListener;
use crate::radio::mode::Mode;
use crate::radio::registers::*;
use crate::radio::stats::StatsCounters;
use crate::util::logging::{log_frame_hex, LogThrottle};
use log::{debug, info, warn};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};

const HEADER_LEN: usize = 4;

/// A frame received from another node
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReceivedPacket {
    pub data: Vec<u8>,
    /// Sender node address
    pub from: u8,
    /// Signal strength in dBm, sampled right after the frame
    pub rssi: i16,
}

/// What one interrupt amounted to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RxOutcome {
    /// Not receiving, or no payload waiting
    Ignored,
    /// Declared length too short to hold a header; the receiver was restarted
    Dropped { declared: u8 },
    Packet(ReceivedPacket),
}

impl<T: Transport + 'static> Device<T> {
    /// Enter Rx with DIO0 signalling payload-ready.
    ///
    /// A payload left over from before is discarded by restarting the receiver.
    pub async fn listen(&mut self) -> Result<(), Rfm69Error> {
        if self.irq_flags2().await?.contains(IrqFlags2::PAYLOAD_READY) {
            self.restart_rx().await?;
        }
        self.map_dio0(RF_DIOMAPPING1_DIO0_01).await?;
        self.set_mode(Mode::Rx).await
    }

    /// Drain one frame from the FIFO if the chip has one ready.
    ///
    /// Does no bus traffic at all unless the radio is in Rx.
    pub async fn handle_interrupt(&mut self) -> Result<RxOutcome, Rfm69Error> {
        if self.mode != Some(Mode::Rx) {
            return Ok(RxOutcome::Ignored);
        }
        if !self.irq_flags2().await?.contains(IrqFlags2::PAYLOAD_READY) {
            return Ok(RxOutcome::Ignored);
        }

        self.set_mode(Mode::Standby).await?;

        match self.drain_fifo().await {
            Err(e) if !e.is_session_fatal() && self.mode != Some(Mode::Rx) => {
                // Best effort; the drain error is the one reported
                if let Err(rx_err) = self.set_mode(Mode::Rx).await {
                    warn!("Could not return to Rx after receive failure: {rx_err}");
                }
                Err(e)
            }
            outcome => outcome,
        }
    }

    async fn drain_fifo(&mut self) -> Result<RxOutcome, Rfm69Error> {
        let header = self.bus.read_burst(REG_FIFO, HEADER_LEN).await?;
        let &[declared, target, sender, _control] = header.as_slice() else {
            return Err(Rfm69Error::Bus(format!("short FIFO header: {} bytes", header.len())));
        };
        let length = (declared as usize).min(FIFO_SIZE);

        if length < 3 {
            warn!("Frame with declared length {declared} from node {sender}, restarting receiver");
            self.restart_rx().await?;
            self.bus.read_burst(REG_FIFO, length.saturating_sub(2)).await?;
            self.set_mode(Mode::Rx).await?;
            return Ok(RxOutcome::Dropped { declared });
        }

        let data = self.bus.read_burst(REG_FIFO, length - 2).await?;
        self.set_mode(Mode::Rx).await?;
        let rssi = self.read_rssi(false).await?;

        debug!("Frame for node {target} from node {sender}, {} bytes, {rssi} dBm", data.len());
        log_frame_hex("RX", &data);

        Ok(RxOutcome::Packet(ReceivedPacket {
            data,
            from: sender,
            rssi,
        }))
    }
}

/// Interrupt drain loop: handles edges strictly one after another until stop
/// is signalled.
pub(crate) async fn run_receive_loop<T: Transport + 'static>(
    device: SharedDevice<T>,
    mut interrupts: InterruptListener,
    packets: broadcast::Sender<ReceivedPacket>,
    stats: Arc<StatsCounters>,
    mut stop: watch::Receiver<bool>,
) {
    let mut throttle = LogThrottle::new(1000, 5);

    loop {
        tokio::select! {
            biased;
            _ = stop.changed() => break,
            edge = interrupts.next() => {
                if edge.is_none() {
                    break;
                }
                let outcome = device.lock().await.handle_interrupt().await;
                match outcome {
                    Ok(RxOutcome::Packet(packet)) => {
                        stats.packet_received();
                        throttle.reset();
                        // No subscribers is not an error
                        let _ = packets.send(packet);
                    }
                    Ok(RxOutcome::Dropped { .. }) => stats.frame_dropped(),
                    Ok(RxOutcome::Ignored) => stats.interrupt_ignored(),
                    Err(e) if e.is_session_fatal() => {
                        crate::log_error_throttled!(throttle, "Receive failed, session needs a restart: {e}");
                    }
                    Err(e) => {
                        crate::log_warn_throttled!(throttle, "Receive failed: {e}");
                    }
                }
            }
        }
    }

    info!("Receive loop stopped");
}
