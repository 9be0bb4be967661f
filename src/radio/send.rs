//! Send pipeline.
//!
//! Requests are serviced one at a time in submission order. Each one runs:
//! size check, RX restart, carrier sense, FIFO load in Standby, Tx, wait for
//! the packet-sent interrupt, back to Standby.
//!
//! Frame written to the FIFO: `[payload.len() + 2, to, node_id, payload...]`.

use crate::error::Rfm69Error;
use crate::radio::bus::Transport;
use crate::radio::device::SharedDevice;
use crate::radio::irq::InterruptLine;
use crate::radio::mode::Mode;
use crate::radio::poll::wait_for;
use crate::radio::registers::*;
use crate::radio::stats::StatsCounters;
use crate::radio::{CSMA_INTERVAL, CSMA_LIMIT_DBM, CSMA_TIMEOUT, TX_INTERRUPT_TIMEOUT};
use crate::util::logging::{log_frame_hex, LogThrottle};
use log::{debug, info, warn};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{timeout_at, Instant};

/// A queued send, resolved through `reply` once serviced
#[derive(Debug)]
pub struct OutboundRequest {
    pub to: u8,
    pub payload: Vec<u8>,
    pub reply: oneshot::Sender<Result<(), Rfm69Error>>,
}

impl OutboundRequest {
    pub fn new(to: u8, payload: Vec<u8>) -> (Self, oneshot::Receiver<Result<(), Rfm69Error>>) {
        let (reply, rx) = oneshot::channel();
        (Self { to, payload, reply }, rx)
    }
}

/// FIFO frame for `payload`, or `PacketTooBig`.
pub fn frame(to: u8, from: u8, payload: &[u8]) -> Result<Vec<u8>, Rfm69Error> {
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(Rfm69Error::PacketTooBig {
            len: payload.len(),
            max: MAX_PAYLOAD_LEN,
        });
    }

    let mut frame = Vec::with_capacity(payload.len() + 3);
    frame.push((payload.len() + 2) as u8);
    frame.push(to);
    frame.push(from);
    frame.extend_from_slice(payload);
    Ok(frame)
}

/// Wait for a clear channel, best effort.
///
/// The channel is clear when the radio is receiving and the current RSSI is
/// below `CSMA_LIMIT_DBM`; a clear channel moves the radio to Standby.
/// Returns whether the channel was seen clear.
async fn carrier_sense<T: Transport + 'static>(device: &SharedDevice<T>) -> Result<bool, Rfm69Error> {
    let mut handle = Arc::clone(device);

    let clear = wait_for(
        &mut handle,
        |device| {
            Box::pin(async move {
                let mut dev = device.lock().await;
                if dev.mode() != Some(Mode::Rx) {
                    return Ok::<_, Rfm69Error>(false);
                }
                if dev.read_rssi(false).await? >= CSMA_LIMIT_DBM {
                    return Ok(false);
                }
                dev.set_mode(Mode::Standby).await?;
                Ok(true)
            })
        },
        CSMA_TIMEOUT,
        CSMA_INTERVAL,
    )
    .await?;

    Ok(clear.is_ok())
}

/// Service one send request.
pub(crate) async fn transmit<T: Transport + 'static>(
    device: &SharedDevice<T>,
    irq: &InterruptLine,
    stats: &StatsCounters,
    to: u8,
    payload: &[u8],
) -> Result<(), Rfm69Error> {
    let node_id = device.lock().await.config().node_id;
    let frame = frame(to, node_id, payload)?;

    device.lock().await.restart_rx().await?;

    if !carrier_sense(device).await? {
        warn!("Channel not clear within {CSMA_TIMEOUT:?}, sending anyway");
        stats.carrier_sense_timeout();
    }

    let mut sent = irq.subscribe();
    {
        let mut dev = device.lock().await;
        dev.set_mode(Mode::Standby).await?;
        dev.map_dio0(RF_DIOMAPPING1_DIO0_00).await?;
        dev.bus.write_burst(REG_FIFO, &frame).await?;
    }
    log_frame_hex("TX", &frame);

    let deadline = Instant::now() + TX_INTERRUPT_TIMEOUT;
    device.lock().await.set_mode(Mode::Tx).await?;
    let completed = timeout_at(deadline, sent.next()).await;

    // Leave Tx whether or not the interrupt showed up
    device.lock().await.set_mode(Mode::Standby).await?;

    match completed {
        Ok(Some(())) => {
            debug!("Sent {} bytes to node {to}", payload.len());
            Ok(())
        }
        Ok(None) => Err(Rfm69Error::Stopped),
        Err(_) => Err(Rfm69Error::TxInterruptTimeout),
    }
}

/// Send queue drain loop. On stop, requests still queued resolve `Stopped`.
pub(crate) async fn run_send_loop<T: Transport + 'static>(
    device: SharedDevice<T>,
    irq: InterruptLine,
    mut requests: mpsc::UnboundedReceiver<OutboundRequest>,
    stats: Arc<StatsCounters>,
    mut stop: watch::Receiver<bool>,
) {
    let mut throttle = LogThrottle::new(1000, 5);

    loop {
        tokio::select! {
            biased;
            _ = stop.changed() => break,
            request = requests.recv() => {
                let Some(request) = request else { break };

                let result = transmit(&device, &irq, &stats, request.to, &request.payload).await;
                match &result {
                    Ok(()) => stats.frame_sent(),
                    Err(e) => {
                        stats.send_failed();
                        if e.is_session_fatal() {
                            crate::log_error_throttled!(throttle, "Send to node {} failed, session needs a restart: {e}", request.to);
                        } else {
                            crate::log_warn_throttled!(throttle, "Send to node {} failed: {e}", request.to);
                        }
                    }
                }
                // The caller may have stopped waiting
                let _ = request.reply.send(result);
            }
        }
    }

    requests.close();
    let mut dropped = 0usize;
    while let Ok(request) = requests.try_recv() {
        let _ = request.reply.send(Err(Rfm69Error::Stopped));
        dropped += 1;
    }
    info!("Send loop stopped, {dropped} queued requests dropped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::radio::config::RadioConfig;
    use crate::radio::device::Device;
    use crate::radio::sim::SimulatedRfm69;

    fn setup(sim: &SimulatedRfm69) -> SharedDevice<SimulatedRfm69> {
        Device::new(sim.clone(), RadioConfig::default()).into_shared()
    }

    #[test]
    fn test_frame_layout() {
        assert_eq!(frame(5, 1, &[1, 2, 3]).unwrap(), vec![5, 5, 1, 1, 2, 3]);
        assert_eq!(frame(9, 1, &[]).unwrap(), vec![2, 9, 1]);

        let max = vec![0u8; MAX_PAYLOAD_LEN];
        assert_eq!(frame(2, 1, &max).unwrap()[0], 64);
    }

    #[test]
    fn test_frame_too_big() {
        let err = frame(2, 1, &[0u8; MAX_PAYLOAD_LEN + 1]).unwrap_err();
        assert!(matches!(err, Rfm69Error::PacketTooBig { len: 63, max: 62 }));
    }

    #[tokio::test]
    async fn test_too_big_has_no_bus_traffic() {
        let sim = SimulatedRfm69::new();
        let device = setup(&sim);
        let stats = StatsCounters::default();

        let err = transmit(&device, &sim.interrupt_line(), &stats, 2, &[0u8; 100])
            .await
            .unwrap_err();
        assert!(matches!(err, Rfm69Error::PacketTooBig { .. }));
        assert_eq!(sim.transfer_count(), 0);
    }

    #[tokio::test]
    async fn test_clear_channel_skips_the_wait() {
        let sim = SimulatedRfm69::new();
        let device = setup(&sim);
        device.lock().await.set_mode(Mode::Rx).await.unwrap();
        let stats = StatsCounters::default();

        let start = std::time::Instant::now();
        transmit(&device, &sim.interrupt_line(), &stats, 5, &[1, 2, 3])
            .await
            .unwrap();

        assert!(start.elapsed() < CSMA_TIMEOUT);
        assert_eq!(stats.snapshot().carrier_sense_timeouts, 0);
        assert_eq!(sim.transmitted(), vec![vec![5, 5, 1, 1, 2, 3]]);
        assert_eq!(device.lock().await.mode(), Some(Mode::Standby));
        assert_eq!(sim.register(REG_DIOMAPPING1), RF_DIOMAPPING1_DIO0_00);
    }

    #[tokio::test]
    async fn test_busy_channel_sends_after_timeout() {
        let sim = SimulatedRfm69::new();
        sim.set_rssi_dbm(-40);
        let device = setup(&sim);
        device.lock().await.set_mode(Mode::Rx).await.unwrap();
        let stats = StatsCounters::default();

        let start = std::time::Instant::now();
        transmit(&device, &sim.interrupt_line(), &stats, 5, &[7])
            .await
            .unwrap();

        assert!(start.elapsed() >= CSMA_TIMEOUT);
        assert_eq!(stats.snapshot().carrier_sense_timeouts, 1);
        assert_eq!(sim.transmitted().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_packet_sent_interrupt() {
        let sim = SimulatedRfm69::new();
        sim.set_auto_packet_sent(false);
        let device = setup(&sim);
        device.lock().await.set_mode(Mode::Rx).await.unwrap();
        let stats = StatsCounters::default();

        let err = transmit(&device, &sim.interrupt_line(), &stats, 5, &[1])
            .await
            .unwrap_err();

        assert!(matches!(err, Rfm69Error::TxInterruptTimeout));
        assert!(!err.is_session_fatal());
        assert_eq!(device.lock().await.mode(), Some(Mode::Standby));
    }

    #[tokio::test]
    async fn test_rx_restart_precedes_transmit() {
        let sim = SimulatedRfm69::new();
        let device = setup(&sim);
        device.lock().await.set_mode(Mode::Rx).await.unwrap();
        let stats = StatsCounters::default();

        transmit(&device, &sim.interrupt_line(), &stats, 3, &[0xAA])
            .await
            .unwrap();
        assert_eq!(sim.rx_restarts(), 1);
    }
}
