//! Session counters, updated by the drain loops.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Snapshot of the session counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RadioStats {
    /// Frames confirmed sent by the packet-sent interrupt
    pub frames_sent: u64,
    /// Send requests that failed
    pub send_failures: u64,
    /// Packets emitted to subscribers
    pub packets_received: u64,
    /// Sends that went out without a clear-channel reading
    pub carrier_sense_timeouts: u64,
    /// Frames discarded for a declared length below 3
    pub dropped_frames: u64,
    /// Interrupts that found nothing to receive
    pub ignored_interrupts: u64,
}

#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    frames_sent: AtomicU64,
    send_failures: AtomicU64,
    packets_received: AtomicU64,
    carrier_sense_timeouts: AtomicU64,
    dropped_frames: AtomicU64,
    ignored_interrupts: AtomicU64,
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

impl StatsCounters {
    pub fn frame_sent(&self) {
        bump(&self.frames_sent);
    }

    pub fn send_failed(&self) {
        bump(&self.send_failures);
    }

    pub fn packet_received(&self) {
        bump(&self.packets_received);
    }

    pub fn carrier_sense_timeout(&self) {
        bump(&self.carrier_sense_timeouts);
    }

    pub fn frame_dropped(&self) {
        bump(&self.dropped_frames);
    }

    pub fn interrupt_ignored(&self) {
        bump(&self.ignored_interrupts);
    }

    pub fn snapshot(&self) -> RadioStats {
        RadioStats {
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            send_failures: self.send_failures.load(Ordering::Relaxed),
            packets_received: self.packets_received.load(Ordering::Relaxed),
            carrier_sense_timeouts: self.carrier_sense_timeouts.load(Ordering::Relaxed),
            dropped_frames: self.dropped_frames.load(Ordering::Relaxed),
            ignored_interrupts: self.ignored_interrupts.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_counters() {
        let counters = StatsCounters::default();
        counters.frame_sent();
        counters.frame_sent();
        counters.frame_dropped();

        let stats = counters.snapshot();
        assert_eq!(stats.frames_sent, 2);
        assert_eq!(stats.dropped_frames, 1);
        assert_eq!(stats.packets_received, 0);
    }

    #[test]
    fn test_snapshot_serializes() {
        let json = serde_json::to_string(&RadioStats::default()).unwrap();
        assert!(json.contains("\"frames_sent\":0"));
    }
}
