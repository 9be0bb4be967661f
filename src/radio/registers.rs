//! # RFM69 Register Definitions and Constants
//!
//! Register addresses, bit fields and fixed values for the HopeRF RFM69
//! (SX1231-based) transceiver, taken from the datasheet.
//!
//! ## Register Map
//!
//! - 0x00-0x0F: FIFO, operating mode, data modulation, bitrate, deviation, carrier
//! - 0x10-0x2F: version, power amplifier, receiver, RSSI, DIO mapping, IRQ flags
//! - 0x30-0x3F: sync word, packet engine, addressing
//! - 0x3E-0x4D: AES key
//! - 0x5A-0x71: test registers (high-power PA, DAGC)

use bitflags::bitflags;

// =============================================================================
// Register Addresses
// =============================================================================

/// FIFO read/write access register
pub const REG_FIFO: u8 = 0x00;

/// Operating mode, sequencer and listen control
pub const REG_OPMODE: u8 = 0x01;

/// Data processing mode and modulation scheme
pub const REG_DATAMODUL: u8 = 0x02;

/// Bit rate setting (MSB)
pub const REG_BITRATEMSB: u8 = 0x03;

/// Bit rate setting (LSB)
pub const REG_BITRATELSB: u8 = 0x04;

/// Frequency deviation setting (MSB)
pub const REG_FDEVMSB: u8 = 0x05;

/// Frequency deviation setting (LSB)
pub const REG_FDEVLSB: u8 = 0x06;

/// RF carrier frequency setting (MSB)
pub const REG_FRFMSB: u8 = 0x07;

/// RF carrier frequency setting (MID)
pub const REG_FRFMID: u8 = 0x08;

/// RF carrier frequency setting (LSB)
pub const REG_FRFLSB: u8 = 0x09;

/// Chip version (read-only)
pub const REG_VERSION: u8 = 0x10;

/// PA selection and output power control
pub const REG_PALEVEL: u8 = 0x11;

/// Over current protection control
pub const REG_OCP: u8 = 0x13;

/// Channel filter bandwidth control
pub const REG_RXBW: u8 = 0x19;

/// RSSI measurement trigger and status
pub const REG_RSSICONFIG: u8 = 0x23;

/// RSSI value, -RSSI/2 dBm
pub const REG_RSSIVALUE: u8 = 0x24;

/// Mapping of pins DIO0 to DIO3
pub const REG_DIOMAPPING1: u8 = 0x25;

/// Mapping of pins DIO4 and DIO5, ClkOut frequency
pub const REG_DIOMAPPING2: u8 = 0x26;

/// Status register: mode ready, PLL lock, RSSI
pub const REG_IRQFLAGS1: u8 = 0x27;

/// Status register: FIFO and packet flags
pub const REG_IRQFLAGS2: u8 = 0x28;

/// RSSI trigger level for RSSI interrupt
pub const REG_RSSITHRESH: u8 = 0x29;

/// Sync word recognition control
pub const REG_SYNCCONFIG: u8 = 0x2E;

/// Sync word byte 1
pub const REG_SYNCVALUE1: u8 = 0x2F;

/// Sync word byte 2
pub const REG_SYNCVALUE2: u8 = 0x30;

/// Packet mode settings
pub const REG_PACKETCONFIG1: u8 = 0x37;

/// Maximum payload length in variable length mode
pub const REG_PAYLOADLENGTH: u8 = 0x38;

/// Node address
pub const REG_NODEADRS: u8 = 0x39;

/// FIFO threshold, TX start condition
pub const REG_FIFOTHRESH: u8 = 0x3C;

/// Packet mode settings: RX restart, AES
pub const REG_PACKETCONFIG2: u8 = 0x3D;

/// First of the 16 AES key registers
pub const REG_AESKEY1: u8 = 0x3E;

/// High-power PA test register 1
pub const REG_TESTPA1: u8 = 0x5A;

/// High-power PA test register 2
pub const REG_TESTPA2: u8 = 0x5C;

/// Fading margin improvement (continuous DAGC)
pub const REG_TESTDAGC: u8 = 0x6F;

// =============================================================================
// Operating Mode
// =============================================================================

/// Mode bits inside REG_OPMODE; sequencer and listen bits are outside the mask
pub const RF_OPMODE_MASK: u8 = 0x1C;

pub const RF_OPMODE_SEQUENCER_ON: u8 = 0x00;
pub const RF_OPMODE_LISTEN_OFF: u8 = 0x00;

pub const RF_OPMODE_SLEEP: u8 = 0x00;
pub const RF_OPMODE_STANDBY: u8 = 0x04;
pub const RF_OPMODE_SYNTHESIZER: u8 = 0x08;
pub const RF_OPMODE_TRANSMITTER: u8 = 0x0C;
pub const RF_OPMODE_RECEIVER: u8 = 0x10;

// =============================================================================
// IRQ Flags
// =============================================================================

bitflags! {
    /// REG_IRQFLAGS1 contents
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct IrqFlags1: u8 {
        const SYNC_ADDRESS_MATCH = 0x01;
        const AUTO_MODE = 0x02;
        const TIMEOUT = 0x04;
        const RSSI = 0x08;
        const PLL_LOCK = 0x10;
        const TX_READY = 0x20;
        const RX_READY = 0x40;
        /// Set once the requested operating mode is reached
        const MODE_READY = 0x80;
    }
}

bitflags! {
    /// REG_IRQFLAGS2 contents
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct IrqFlags2: u8 {
        const CRC_OK = 0x02;
        /// A complete frame waits in the FIFO
        const PAYLOAD_READY = 0x04;
        /// The frame in the FIFO has been transmitted
        const PACKET_SENT = 0x08;
        const FIFO_OVERRUN = 0x10;
        const FIFO_LEVEL = 0x20;
        const FIFO_NOT_EMPTY = 0x40;
        const FIFO_FULL = 0x80;
    }
}

// =============================================================================
// Modulation and RF
// =============================================================================

/// Packet mode, FSK, no shaping
pub const RF_DATAMODUL_DATAMODE_PACKET: u8 = 0x00;
pub const RF_DATAMODUL_MODULATIONTYPE_FSK: u8 = 0x00;
pub const RF_DATAMODUL_MODULATIONSHAPING_00: u8 = 0x00;

/// 55.555 kbps
pub const RF_BITRATEMSB_55555: u8 = 0x02;
pub const RF_BITRATELSB_55555: u8 = 0x40;

/// 50 kHz deviation
pub const RF_FDEVMSB_50000: u8 = 0x03;
pub const RF_FDEVLSB_50000: u8 = 0x33;

/// DCC cutoff 4%, mantissa 16, exponent 2 (125 kHz)
pub const RF_RXBW_DCCFREQ_010: u8 = 0x40;
pub const RF_RXBW_MANT_16: u8 = 0x00;
pub const RF_RXBW_EXP_2: u8 = 0x02;

// =============================================================================
// Power Amplifier
// =============================================================================

pub const RF_PALEVEL_PA0_ON: u8 = 0x80;
pub const RF_PALEVEL_PA1_ON: u8 = 0x40;
pub const RF_PALEVEL_PA2_ON: u8 = 0x20;
/// Output power field (low 5 bits)
pub const RF_PALEVEL_OUTPUTPOWER_MASK: u8 = 0x1F;

/// Over current protection enabled at 95 mA
pub const RF_OCP_ON: u8 = 0x1A;
/// Over current protection disabled (required for +20 dBm)
pub const RF_OCP_OFF: u8 = 0x0F;

/// TESTPA1/TESTPA2 values for +20 dBm boost, and for normal operation
pub const RF_TESTPA1_20DBM: u8 = 0x5D;
pub const RF_TESTPA2_20DBM: u8 = 0x7C;
pub const RF_TESTPA1_NORMAL: u8 = 0x55;
pub const RF_TESTPA2_NORMAL: u8 = 0x70;

// =============================================================================
// RSSI
// =============================================================================

pub const RF_RSSI_START: u8 = 0x01;
pub const RF_RSSI_DONE: u8 = 0x02;

// =============================================================================
// DIO Mapping
// =============================================================================

/// DIO0 = 00: PacketSent in TX
pub const RF_DIOMAPPING1_DIO0_00: u8 = 0x00;
/// DIO0 = 01: PayloadReady in RX
pub const RF_DIOMAPPING1_DIO0_01: u8 = 0x40;
pub const RF_DIOMAPPING2_CLKOUT_OFF: u8 = 0x07;

// =============================================================================
// Sync Word and Packet Engine
// =============================================================================

/// Sync on, FIFO fill on sync address, 2 sync bytes, no tolerance
pub const RF_SYNC_ON: u8 = 0x80;
pub const RF_SYNC_FIFOFILL_AUTO: u8 = 0x00;
pub const RF_SYNC_SIZE_2: u8 = 0x08;
pub const RF_SYNC_TOL_0: u8 = 0x00;

/// Leading sync byte; the second byte is the network id
pub const SYNC_WORD_LEAD: u8 = 0x2D;

pub const RF_PACKET1_FORMAT_VARIABLE: u8 = 0x80;
pub const RF_PACKET1_DCFREE_OFF: u8 = 0x00;
pub const RF_PACKET1_CRC_ON: u8 = 0x10;
pub const RF_PACKET1_CRCAUTOCLEAR_ON: u8 = 0x00;
pub const RF_PACKET1_ADRSFILTERING_NODE: u8 = 0x02;

pub const RF_FIFOTHRESH_TXSTART_FIFONOTEMPTY: u8 = 0x80;
pub const RF_FIFOTHRESH_VALUE: u8 = 0x0F;

pub const RF_PACKET2_RXRESTARTDELAY_2BITS: u8 = 0x10;
pub const RF_PACKET2_RXRESTART: u8 = 0x04;
pub const RF_PACKET2_AUTORXRESTART_ON: u8 = 0x02;
pub const RF_PACKET2_AES_ON: u8 = 0x01;
pub const RF_PACKET2_AES_OFF: u8 = 0x00;

/// Continuous DAGC for low modulation index
pub const RF_DAGC_IMPROVED_LOWBETA0: u8 = 0x30;

// =============================================================================
// Limits and Derived Constants
// =============================================================================

/// Crystal oscillator frequency
pub const FXOSC_HZ: u64 = 32_000_000;

/// FSTEP = FXOSC / 2^19 (61.03515625 Hz)
pub const FSTEP_SHIFT: u32 = 19;

/// Hardware FIFO size in bytes
pub const FIFO_SIZE: usize = 66;

/// Largest payload: FIFO minus length, destination, sender and control bytes
pub const MAX_PAYLOAD_LEN: usize = 62;

/// Length of an AES-128 key
pub const AES_KEY_LEN: usize = 16;

/// SPI address bit marking a write access
pub const SPI_WRITE: u8 = 0x80;

/// Default SPI communication speed
pub const SPI_SPEED: u32 = 1_000_000;

/// Default GPIO pins (BCM numbering)
pub const DEFAULT_RESET_PIN: u8 = 5;
pub const DEFAULT_INTERRUPT_PIN: u8 = 23;
