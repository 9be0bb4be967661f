//! # DIO0 Interrupt Signal
//!
//! The chip raises DIO0 for "payload ready" while receiving and "packet sent"
//! while transmitting. The edge itself carries no data; the driver reads the
//! IRQ flag registers to find out what happened.
//!
//! `InterruptLine` is a broadcast of content-less edges. Each consumer gets its
//! own `InterruptListener` and sees only edges raised after it subscribed, so
//! the receive loop and a send waiting for "packet sent" observe the same edge
//! independently. Other application code may subscribe as well.
//!
//! ## Example
//!
//! ```rust
//! use rfm69_link::radio::irq::InterruptLine;
//!
//! # tokio_test::block_on(async {
//! let line = InterruptLine::new();
//! let mut listener = line.subscribe();
//!
//! // A GPIO callback would call this on every rising edge.
//! line.trigger();
//! assert!(listener.next().await.is_some());
//! # });
//! ```

use log::warn;
use tokio::sync::broadcast;

/// Edges buffered per listener before the slowest one starts lagging.
const EDGE_CAPACITY: usize = 64;

/// Broadcast source of interrupt edges.
#[derive(Debug, Clone)]
pub struct InterruptLine {
    tx: broadcast::Sender<()>,
}

impl Default for InterruptLine {
    fn default() -> Self {
        Self::new()
    }
}

impl InterruptLine {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EDGE_CAPACITY);
        Self { tx }
    }

    /// Signal one edge to every current listener.
    pub fn trigger(&self) {
        // No listeners is fine: nobody is waiting for this edge.
        let _ = self.tx.send(());
    }

    /// Listen for edges raised from now on.
    pub fn subscribe(&self) -> InterruptListener {
        InterruptListener {
            rx: self.tx.subscribe(),
        }
    }
}

/// One consumer's view of an [`InterruptLine`].
#[derive(Debug)]
pub struct InterruptListener {
    rx: broadcast::Receiver<()>,
}

impl InterruptListener {
    /// Wait for the next edge. `None` once every `InterruptLine` is dropped.
    ///
    /// Edges dropped because this listener fell behind collapse into one.
    pub async fn next(&mut self) -> Option<()> {
        match self.rx.recv().await {
            Ok(()) => Some(()),
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                warn!("Interrupt listener lagged, {missed} edges collapsed");
                Some(())
            }
            Err(broadcast::error::RecvError::Closed) => None,
        }
    }
}
