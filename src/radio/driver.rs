//! # Radio Session
//!
//! [`Radio`] is the public handle. `init()` starts a session: it spawns the
//! send drain loop and the interrupt drain loop, then programs the chip. Every
//! other bus operation needs a running session.
//!
//! ```rust
//! use rfm69_link::radio::{Radio, RadioConfig, SimulatedRfm69};
//!
//! # tokio_test::block_on(async {
//! let chip = SimulatedRfm69::new();
//! let radio = Radio::new(chip.clone(), RadioConfig::default(), chip.interrupt_line());
//!
//! radio.init().await?;
//! radio.listen().await?;
//! radio.send(5, &[1, 2, 3]).await?;
//! radio.stop()?;
//! # Ok::<(), rfm69_link::Rfm69Error>(())
//! # }).unwrap();
//! ```

use crate::error::Rfm69Error;
use crate::radio::bus::Transport;
use crate::radio::config::RadioConfig;
use crate::radio::device::{Device, SharedDevice};
use crate::radio::irq::InterruptLine;
use crate::radio::mode::Mode;
use crate::radio::receive::{run_receive_loop, ReceivedPacket};
use crate::radio::registers::AES_KEY_LEN;
use crate::radio::send::{run_send_loop, OutboundRequest};
use crate::radio::stats::{RadioStats, StatsCounters};
use log::{info, warn};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;

/// Received packets buffered per subscriber
const PACKET_CAPACITY: usize = 32;

/// Session state as seen from outside
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Running,
}

struct RunningSession {
    requests: mpsc::UnboundedSender<OutboundRequest>,
    stop: watch::Sender<bool>,
    _send_task: JoinHandle<()>,
    _receive_task: JoinHandle<()>,
}

enum Session {
    Uninitialized,
    Running(RunningSession),
}

/// Completion of a queued send
#[derive(Debug)]
pub struct SendHandle {
    reply: oneshot::Receiver<Result<(), Rfm69Error>>,
}

impl SendHandle {
    /// Wait until the request has been serviced.
    pub async fn wait(self) -> Result<(), Rfm69Error> {
        self.reply.await.unwrap_or(Err(Rfm69Error::Stopped))
    }
}

/// RFM69 driver handle
pub struct Radio<T> {
    device: SharedDevice<T>,
    irq: InterruptLine,
    packets: broadcast::Sender<ReceivedPacket>,
    stats: Arc<StatsCounters>,
    session: Mutex<Session>,
}

impl<T: Transport + 'static> Radio<T> {
    /// Create a radio on `transport`, with DIO0 edges arriving on `irq`.
    pub fn new(transport: T, config: RadioConfig, irq: InterruptLine) -> Self {
        let (packets, _) = broadcast::channel(PACKET_CAPACITY);
        Self {
            device: Device::new(transport, config).into_shared(),
            irq,
            packets,
            stats: Arc::new(StatsCounters::default()),
            session: Mutex::new(Session::Uninitialized),
        }
    }

    fn session(&self) -> MutexGuard<'_, Session> {
        // The session lock is never held across an await or a panic point
        match self.session.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn ensure_running(&self) -> Result<(), Rfm69Error> {
        match *self.session() {
            Session::Running(_) => Ok(()),
            Session::Uninitialized => Err(Rfm69Error::NotInitialized),
        }
    }

    pub fn state(&self) -> SessionState {
        match *self.session() {
            Session::Running(_) => SessionState::Running,
            Session::Uninitialized => SessionState::Uninitialized,
        }
    }

    pub fn is_running(&self) -> bool {
        self.state() == SessionState::Running
    }

    pub async fn config(&self) -> RadioConfig {
        *self.device.lock().await.config()
    }

    /// The interrupt line this radio listens on
    pub fn interrupt_line(&self) -> InterruptLine {
        self.irq.clone()
    }

    /// Start a session: spawn the drain loops, then program the chip.
    ///
    /// If programming fails the session is stopped again before the error is
    /// returned.
    pub async fn init(&self) -> Result<(), Rfm69Error> {
        {
            let mut session = self.session();
            if let Session::Running(_) = *session {
                return Err(Rfm69Error::AlreadyInitialized);
            }

            let (requests, request_rx) = mpsc::unbounded_channel();
            let (stop, stop_rx) = watch::channel(false);

            let send_task = tokio::spawn(run_send_loop(
                Arc::clone(&self.device),
                self.irq.clone(),
                request_rx,
                Arc::clone(&self.stats),
                stop_rx.clone(),
            ));
            let receive_task = tokio::spawn(run_receive_loop(
                Arc::clone(&self.device),
                self.irq.subscribe(),
                self.packets.clone(),
                Arc::clone(&self.stats),
                stop_rx,
            ));

            *session = Session::Running(RunningSession {
                requests,
                stop,
                _send_task: send_task,
                _receive_task: receive_task,
            });
        }
        info!("Radio session started");

        let result = self.device.lock().await.initialize().await;
        if let Err(e) = &result {
            warn!("Init failed, stopping session: {e}");
            let _ = self.stop();
        }
        result
    }

    /// End the session. Queued sends resolve `Stopped`; an operation already
    /// on the bus finishes within its own timeout.
    pub fn stop(&self) -> Result<(), Rfm69Error> {
        let previous = std::mem::replace(&mut *self.session(), Session::Uninitialized);
        match previous {
            Session::Uninitialized => Err(Rfm69Error::NotInitialized),
            Session::Running(running) => {
                // Loops also exit if the receivers are already gone
                let _ = running.stop.send(true);
                info!("Radio session stopped");
                Ok(())
            }
        }
    }

    /// Queue a send and return without waiting for it.
    pub fn enqueue(&self, to: u8, payload: &[u8]) -> Result<SendHandle, Rfm69Error> {
        let requests = match &*self.session() {
            Session::Running(running) => running.requests.clone(),
            Session::Uninitialized => return Err(Rfm69Error::NotInitialized),
        };

        let (request, reply) = OutboundRequest::new(to, payload.to_vec());
        requests.send(request).map_err(|_| Rfm69Error::Stopped)?;
        Ok(SendHandle { reply })
    }

    /// Send `payload` to node `to` and wait until it is on air.
    pub async fn send(&self, to: u8, payload: &[u8]) -> Result<(), Rfm69Error> {
        self.enqueue(to, payload)?.wait().await
    }

    /// Received packets from now on
    pub fn subscribe(&self) -> broadcast::Receiver<ReceivedPacket> {
        self.packets.subscribe()
    }

    pub fn stats(&self) -> RadioStats {
        self.stats.snapshot()
    }

    /// Load a 16-byte AES key, or turn encryption off with `None`.
    pub async fn encrypt(&self, key: Option<&[u8]>) -> Result<(), Rfm69Error> {
        let key: Option<[u8; AES_KEY_LEN]> = match key {
            Some(bytes) => Some(
                bytes
                    .try_into()
                    .map_err(|_| Rfm69Error::InvalidKey { len: bytes.len() })?,
            ),
            None => None,
        };
        self.ensure_running()?;
        self.device.lock().await.set_encryption(key.as_ref()).await
    }

    /// Set output power; returns the level programmed.
    pub async fn set_power_level(&self, level: i32) -> Result<u8, Rfm69Error> {
        self.ensure_running()?;
        self.device.lock().await.set_power_level(level).await
    }

    pub async fn power_level(&self) -> u8 {
        self.device.lock().await.power_level()
    }

    /// Carrier frequency in Hz
    pub async fn frequency(&self) -> Result<u32, Rfm69Error> {
        self.ensure_running()?;
        self.device.lock().await.frequency().await
    }

    pub async fn set_frequency(&self, hz: u32) -> Result<(), Rfm69Error> {
        self.ensure_running()?;
        self.device.lock().await.set_frequency(hz).await
    }

    pub async fn sleep(&self) -> Result<(), Rfm69Error> {
        self.ensure_running()?;
        self.device.lock().await.set_mode(Mode::Sleep).await
    }

    /// Enter receive mode.
    pub async fn listen(&self) -> Result<(), Rfm69Error> {
        self.ensure_running()?;
        self.device.lock().await.listen().await
    }

    /// RSSI in dBm; `force` triggers a fresh measurement.
    pub async fn rssi(&self, force: bool) -> Result<i16, Rfm69Error> {
        self.ensure_running()?;
        self.device.lock().await.read_rssi(force).await
    }

    /// Silicon revision
    pub async fn version(&self) -> Result<u8, Rfm69Error> {
        self.ensure_running()?;
        self.device.lock().await.version().await
    }

    /// Last confirmed mode
    pub async fn mode(&self) -> Option<Mode> {
        self.device.lock().await.mode()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::radio::sim::SimulatedRfm69;

    fn radio() -> (Radio<SimulatedRfm69>, SimulatedRfm69) {
        let sim = SimulatedRfm69::new();
        let radio = Radio::new(sim.clone(), RadioConfig::default(), sim.interrupt_line());
        (radio, sim)
    }

    #[tokio::test]
    async fn test_session_lifecycle() {
        let (radio, _sim) = radio();
        assert_eq!(radio.state(), SessionState::Uninitialized);

        radio.init().await.unwrap();
        assert!(radio.is_running());
        assert!(matches!(radio.init().await, Err(Rfm69Error::AlreadyInitialized)));

        radio.stop().unwrap();
        assert!(!radio.is_running());
        assert!(matches!(radio.stop(), Err(Rfm69Error::NotInitialized)));

        radio.init().await.unwrap();
        assert!(radio.is_running());
    }

    #[tokio::test]
    async fn test_operations_need_a_session() {
        let (radio, sim) = radio();

        assert!(matches!(radio.send(1, &[1]).await, Err(Rfm69Error::NotInitialized)));
        assert!(matches!(radio.sleep().await, Err(Rfm69Error::NotInitialized)));
        assert!(matches!(radio.frequency().await, Err(Rfm69Error::NotInitialized)));
        assert!(matches!(radio.encrypt(None).await, Err(Rfm69Error::NotInitialized)));
        assert_eq!(sim.transfer_count(), 0);
    }

    #[tokio::test]
    async fn test_encrypt_rejects_wrong_key_length() {
        let (radio, _sim) = radio();
        radio.init().await.unwrap();

        let err = radio.encrypt(Some(&[0u8; 8][..])).await.unwrap_err();
        assert!(matches!(err, Rfm69Error::InvalidKey { len: 8 }));
    }

    #[tokio::test]
    async fn test_sleep_and_listen() {
        let (radio, _sim) = radio();
        radio.init().await.unwrap();
        assert_eq!(radio.mode().await, Some(Mode::Standby));

        radio.listen().await.unwrap();
        assert_eq!(radio.mode().await, Some(Mode::Rx));

        radio.sleep().await.unwrap();
        assert_eq!(radio.mode().await, Some(Mode::Sleep));
    }

    #[tokio::test]
    async fn test_failed_init_leaves_session_stopped() {
        let (radio, sim) = radio();
        sim.set_mode_ready_stuck(true);

        let err = radio.init().await.unwrap_err();
        assert!(err.is_session_fatal());
        assert!(!radio.is_running());
    }
}
