//! Simulated RFM69 for testing
//!
//! A register-file model of the chip that implements [`Transport`], so the
//! full driver can run without hardware. It models the parts of the chip the
//! driver relies on: mode-ready after every mode write, the TX FIFO being sent
//! when Tx is entered, PAYLOAD_READY for injected frames, RSSI measurement,
//! RX restart and the AES key block. DIO0 edges are raised on the
//! [`InterruptLine`] handed out by [`SimulatedRfm69::interrupt_line`].
//!
//! Every transfer is recorded so tests can assert exact bus traffic.

use crate::error::Rfm69Error;
use crate::radio::bus::Transport;
use crate::radio::irq::InterruptLine;
use crate::radio::registers::*;
use async_trait::async_trait;
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

const REGISTER_SPACE: usize = 0x80;

struct SimState {
    regs: [u8; REGISTER_SPACE],
    tx_fifo: Vec<u8>,
    rx_fifo: VecDeque<u8>,
    transmitted: Vec<Vec<u8>>,
    transfers: Vec<Vec<u8>>,
    rx_restarts: usize,
    frozen: HashSet<u8>,
    mode_ready_stuck: bool,
    rssi_stuck: bool,
    auto_packet_sent: bool,
    fail_next: bool,
    fail_read_of: Option<u8>,
}

impl SimState {
    fn new() -> Self {
        let mut regs = [0u8; REGISTER_SPACE];
        regs[REG_OPMODE as usize] = RF_OPMODE_SEQUENCER_ON | RF_OPMODE_LISTEN_OFF | RF_OPMODE_STANDBY;
        regs[REG_VERSION as usize] = 0x24;
        regs[REG_PALEVEL as usize] = RF_PALEVEL_PA0_ON | RF_PALEVEL_OUTPUTPOWER_MASK;
        regs[REG_OCP as usize] = RF_OCP_ON;
        regs[REG_IRQFLAGS1 as usize] = IrqFlags1::MODE_READY.bits();
        // -114 dBm: a quiet channel
        regs[REG_RSSIVALUE as usize] = 228;

        Self {
            regs,
            tx_fifo: Vec::new(),
            rx_fifo: VecDeque::new(),
            transmitted: Vec::new(),
            transfers: Vec::new(),
            rx_restarts: 0,
            frozen: HashSet::new(),
            mode_ready_stuck: false,
            rssi_stuck: false,
            auto_packet_sent: true,
            fail_next: false,
            fail_read_of: None,
        }
    }

    fn set_flag2(&mut self, flag: IrqFlags2, on: bool) {
        let mut flags = IrqFlags2::from_bits_retain(self.regs[REG_IRQFLAGS2 as usize]);
        flags.set(flag, on);
        self.regs[REG_IRQFLAGS2 as usize] = flags.bits();
    }

    /// Returns true when DIO0 should fire.
    fn write(&mut self, reg: u8, value: u8) -> bool {
        if self.frozen.contains(&reg) {
            return false;
        }

        match reg {
            REG_FIFO => {
                if self.tx_fifo.len() < FIFO_SIZE {
                    self.tx_fifo.push(value);
                }
                self.set_flag2(IrqFlags2::FIFO_NOT_EMPTY, true);
                false
            }
            REG_OPMODE => {
                let previous = self.regs[REG_OPMODE as usize] & RF_OPMODE_MASK;
                self.regs[REG_OPMODE as usize] = value;
                let mode = value & RF_OPMODE_MASK;

                let mut flags1 = IrqFlags1::from_bits_retain(self.regs[REG_IRQFLAGS1 as usize]);
                flags1.set(IrqFlags1::MODE_READY, !self.mode_ready_stuck);
                self.regs[REG_IRQFLAGS1 as usize] = flags1.bits();

                if previous == RF_OPMODE_TRANSMITTER && mode != RF_OPMODE_TRANSMITTER {
                    self.set_flag2(IrqFlags2::PACKET_SENT, false);
                }

                if mode == RF_OPMODE_TRANSMITTER && !self.tx_fifo.is_empty() {
                    let frame = std::mem::take(&mut self.tx_fifo);
                    self.transmitted.push(frame);
                    self.set_flag2(IrqFlags2::FIFO_NOT_EMPTY, false);
                    if self.auto_packet_sent {
                        self.set_flag2(IrqFlags2::PACKET_SENT, true);
                        return true;
                    }
                }
                false
            }
            REG_IRQFLAGS1 => false,
            REG_IRQFLAGS2 => {
                if value & IrqFlags2::FIFO_OVERRUN.bits() != 0 {
                    self.rx_fifo.clear();
                    self.tx_fifo.clear();
                    self.regs[REG_IRQFLAGS2 as usize] = 0;
                }
                false
            }
            REG_RSSICONFIG => {
                if value & RF_RSSI_START != 0 {
                    self.regs[REG_RSSICONFIG as usize] = if self.rssi_stuck { 0 } else { RF_RSSI_DONE };
                }
                false
            }
            REG_PACKETCONFIG2 => {
                if value & RF_PACKET2_RXRESTART != 0 {
                    self.rx_restarts += 1;
                    self.rx_fifo.clear();
                    self.set_flag2(IrqFlags2::PAYLOAD_READY, false);
                }
                self.regs[REG_PACKETCONFIG2 as usize] = value & !RF_PACKET2_RXRESTART;
                false
            }
            _ => {
                self.regs[reg as usize] = value;
                false
            }
        }
    }

    fn read(&mut self, reg: u8) -> u8 {
        if reg == REG_FIFO {
            let byte = self.rx_fifo.pop_front().unwrap_or(0);
            if self.rx_fifo.is_empty() {
                self.set_flag2(IrqFlags2::PAYLOAD_READY, false);
                self.set_flag2(IrqFlags2::FIFO_NOT_EMPTY, false);
            }
            return byte;
        }
        self.regs[reg as usize % REGISTER_SPACE]
    }
}

/// Simulated chip; cheap to clone, all clones share one register file.
#[derive(Clone)]
pub struct SimulatedRfm69 {
    state: Arc<Mutex<SimState>>,
    irq: InterruptLine,
}

impl Default for SimulatedRfm69 {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedRfm69 {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState::new())),
            irq: InterruptLine::new(),
        }
    }

    fn state(&self) -> MutexGuard<'_, SimState> {
        // A panic while holding the lock only happens inside a failing test.
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// The DIO0 line of this chip
    pub fn interrupt_line(&self) -> InterruptLine {
        self.irq.clone()
    }

    /// Raise DIO0 without changing any flags (a spurious edge).
    pub fn trigger_interrupt(&self) {
        self.irq.trigger();
    }

    /// Raw register contents, bypassing the bus
    pub fn register(&self, reg: u8) -> u8 {
        self.state().regs[reg as usize % REGISTER_SPACE]
    }

    /// Set a register directly, bypassing the bus and its side effects
    pub fn set_register(&self, reg: u8, value: u8) {
        self.state().regs[reg as usize % REGISTER_SPACE] = value;
    }

    /// Make writes to `reg` have no effect (an unresponsive chip).
    pub fn freeze_register(&self, reg: u8) {
        self.state().frozen.insert(reg);
    }

    /// Never report mode-ready after the next mode write.
    pub fn set_mode_ready_stuck(&self, stuck: bool) {
        self.state().mode_ready_stuck = stuck;
    }

    /// Never complete forced RSSI measurements.
    pub fn set_rssi_stuck(&self, stuck: bool) {
        self.state().rssi_stuck = stuck;
    }

    /// Whether entering Tx with a loaded FIFO raises PACKET_SENT and DIO0.
    pub fn set_auto_packet_sent(&self, enabled: bool) {
        self.state().auto_packet_sent = enabled;
    }

    /// Fail the next transfer with a bus error.
    pub fn fail_next_transfer(&self) {
        self.state().fail_next = true;
    }

    /// Fail the next read transfer addressed at `reg` with a bus error.
    pub fn fail_next_read(&self, reg: u8) {
        self.state().fail_read_of = Some(reg);
    }

    /// Set the RSSI value register to the given level in dBm.
    pub fn set_rssi_dbm(&self, dbm: i16) {
        let raw = (-dbm * 2).clamp(0, 255) as u8;
        self.state().regs[REG_RSSIVALUE as usize] = raw;
    }

    /// Load a received frame into the FIFO, flag PAYLOAD_READY and raise DIO0.
    ///
    /// `frame` is the raw FIFO content starting with the length byte.
    pub fn inject_packet(&self, frame: &[u8]) {
        {
            let mut state = self.state();
            state.rx_fifo = frame.iter().copied().collect();
            state.set_flag2(IrqFlags2::PAYLOAD_READY, true);
            state.set_flag2(IrqFlags2::FIFO_NOT_EMPTY, !frame.is_empty());
        }
        self.irq.trigger();
    }

    /// Frames that went on air, FIFO content as written by the driver
    pub fn transmitted(&self) -> Vec<Vec<u8>> {
        self.state().transmitted.clone()
    }

    /// Number of RX restarts requested
    pub fn rx_restarts(&self) -> usize {
        self.state().rx_restarts
    }

    /// Every transfer so far, as sent by the driver
    pub fn transfers(&self) -> Vec<Vec<u8>> {
        self.state().transfers.clone()
    }

    pub fn transfer_count(&self) -> usize {
        self.state().transfers.len()
    }

    pub fn clear_transfers(&self) {
        self.state().transfers.clear();
    }

    /// Values written by transfers addressed at `reg`, in order
    pub fn writes_to(&self, reg: u8) -> Vec<u8> {
        self.state()
            .transfers
            .iter()
            .filter(|tx| tx.len() >= 2 && tx[0] == reg | SPI_WRITE)
            .flat_map(|tx| tx[1..].to_vec())
            .collect()
    }

    /// The AES key block as last written
    pub fn aes_key(&self) -> [u8; AES_KEY_LEN] {
        let state = self.state();
        let start = REG_AESKEY1 as usize;
        let mut key = [0u8; AES_KEY_LEN];
        key.copy_from_slice(&state.regs[start..start + AES_KEY_LEN]);
        key
    }
}

#[async_trait]
impl Transport for SimulatedRfm69 {
    async fn transfer(&mut self, tx: &[u8]) -> Result<Vec<u8>, Rfm69Error> {
        let mut rx = vec![0u8; tx.len()];
        if tx.is_empty() {
            return Ok(rx);
        }

        let fire = {
            let mut state = self.state();
            if state.fail_next {
                state.fail_next = false;
                return Err(Rfm69Error::Bus("simulated transfer failure".to_string()));
            }
            if state.fail_read_of == Some(tx[0]) {
                state.fail_read_of = None;
                return Err(Rfm69Error::Bus(format!("simulated read failure at 0x{:02X}", tx[0])));
            }
            state.transfers.push(tx.to_vec());

            let mut reg = tx[0] & !SPI_WRITE;
            let is_write = tx[0] & SPI_WRITE != 0;
            let mut fire = false;

            for i in 1..tx.len() {
                if is_write {
                    fire |= state.write(reg, tx[i]);
                } else {
                    rx[i] = state.read(reg);
                }
                if reg != REG_FIFO {
                    reg = reg.wrapping_add(1) % REGISTER_SPACE as u8;
                }
            }
            fire
        };

        if fire {
            self.irq.trigger();
        }
        Ok(rx)
    }
}
