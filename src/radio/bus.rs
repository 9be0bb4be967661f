//! Register access over the SPI byte transport.
//!
//! Wire format: a write is `address | 0x80` followed by the value byte(s); a
//! read is `address & 0x7F` followed by dummy bytes, and the reply bytes after
//! the first carry the register contents. Reads and writes of `REG_FIFO` do
//! not auto-increment, so burst accesses at address 0 stream the FIFO.

use crate::error::Rfm69Error;
use crate::radio::registers::SPI_WRITE;
use async_trait::async_trait;
use log::trace;

/// Full-duplex byte transport to the chip.
///
/// `transfer` shifts `tx` out and returns the bytes shifted in, same length.
/// The first returned byte is what the chip held before the call. Calls must
/// complete in order; implementations never batch or reorder.
#[async_trait]
pub trait Transport: Send {
    async fn transfer(&mut self, tx: &[u8]) -> Result<Vec<u8>, Rfm69Error>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Box<T> {
    async fn transfer(&mut self, tx: &[u8]) -> Result<Vec<u8>, Rfm69Error> {
        (**self).transfer(tx).await
    }
}

/// Single-register read/write/update helpers on top of a [`Transport`].
pub struct RegisterBus<T> {
    transport: T,
}

impl<T: Transport> RegisterBus<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    async fn exchange(&mut self, tx: &[u8]) -> Result<Vec<u8>, Rfm69Error> {
        let rx = self.transport.transfer(tx).await?;
        if rx.len() != tx.len() {
            return Err(Rfm69Error::Bus(format!(
                "short transfer: sent {} bytes, got {}",
                tx.len(),
                rx.len()
            )));
        }
        Ok(rx)
    }

    /// Read a register value
    pub async fn read(&mut self, reg: u8) -> Result<u8, Rfm69Error> {
        let rx = self.exchange(&[reg & !SPI_WRITE, 0]).await?;
        trace!("read  0x{reg:02X} -> 0x{:02X}", rx[1]);
        Ok(rx[1])
    }

    /// Write a register value
    pub async fn write(&mut self, reg: u8, value: u8) -> Result<(), Rfm69Error> {
        trace!("write 0x{reg:02X} <- 0x{value:02X}");
        self.exchange(&[reg | SPI_WRITE, value]).await?;
        Ok(())
    }

    /// Read-modify-write: bits inside `mask` take the value of `bits`.
    pub async fn update(&mut self, reg: u8, mask: u8, bits: u8) -> Result<(), Rfm69Error> {
        let current = self.read(reg).await?;
        let new_value = (current & !mask) | (bits & mask);
        self.write(reg, new_value).await
    }

    /// Read `len` consecutive bytes starting at `reg` in one transfer.
    pub async fn read_burst(&mut self, reg: u8, len: usize) -> Result<Vec<u8>, Rfm69Error> {
        if len == 0 {
            return Ok(Vec::new());
        }
        let mut tx = vec![0u8; len + 1];
        tx[0] = reg & !SPI_WRITE;
        let mut rx = self.exchange(&tx).await?;
        rx.remove(0);
        Ok(rx)
    }

    /// Write `values` starting at `reg` in one transfer.
    pub async fn write_burst(&mut self, reg: u8, values: &[u8]) -> Result<(), Rfm69Error> {
        let mut tx = Vec::with_capacity(values.len() + 1);
        tx.push(reg | SPI_WRITE);
        tx.extend_from_slice(values);
        self.exchange(&tx).await?;
        Ok(())
    }

    /// Access the wrapped transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Records every transfer and answers reads from a fixed register image.
    #[derive(Clone)]
    struct Recorder {
        log: Arc<Mutex<Vec<Vec<u8>>>>,
        image: Arc<Mutex<[u8; 128]>>,
    }

    impl Default for Recorder {
        fn default() -> Self {
            Self {
                log: Arc::default(),
                image: Arc::new(Mutex::new([0u8; 128])),
            }
        }
    }

    #[async_trait]
    impl Transport for Recorder {
        async fn transfer(&mut self, tx: &[u8]) -> Result<Vec<u8>, Rfm69Error> {
            self.log.lock().unwrap().push(tx.to_vec());
            let mut image = self.image.lock().unwrap();
            let addr = (tx[0] & 0x7F) as usize;
            let mut rx = vec![0u8; tx.len()];
            if tx[0] & 0x80 != 0 {
                for (i, b) in tx[1..].iter().enumerate() {
                    image[addr + i] = *b;
                }
            } else {
                for i in 1..tx.len() {
                    rx[i] = image[addr + i - 1];
                }
            }
            Ok(rx)
        }
    }

    struct Truncating;

    #[async_trait]
    impl Transport for Truncating {
        async fn transfer(&mut self, _tx: &[u8]) -> Result<Vec<u8>, Rfm69Error> {
            Ok(vec![0])
        }
    }

    #[tokio::test]
    async fn test_wire_format() {
        let recorder = Recorder::default();
        let mut bus = RegisterBus::new(recorder.clone());

        bus.write(0x2F, 0xAA).await.unwrap();
        assert_eq!(bus.read(0x2F).await.unwrap(), 0xAA);

        let log = recorder.log.lock().unwrap();
        assert_eq!(log[0], vec![0xAF, 0xAA]);
        assert_eq!(log[1], vec![0x2F, 0x00]);
    }

    #[tokio::test]
    async fn test_update_preserves_unmasked_bits() {
        let recorder = Recorder::default();
        recorder.image.lock().unwrap()[0x01] = 0b1110_0011;
        let mut bus = RegisterBus::new(recorder.clone());

        bus.update(0x01, 0x1C, 0x10).await.unwrap();
        assert_eq!(recorder.image.lock().unwrap()[0x01], 0b1111_0011);
    }

    #[tokio::test]
    async fn test_burst_access() {
        let recorder = Recorder::default();
        let mut bus = RegisterBus::new(recorder.clone());

        bus.write_burst(0x3E, &[1, 2, 3]).await.unwrap();
        assert_eq!(bus.read_burst(0x3E, 3).await.unwrap(), vec![1, 2, 3]);
        assert!(bus.read_burst(0x3E, 0).await.unwrap().is_empty());
        assert_eq!(recorder.log.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_short_transfer_is_bus_error() {
        let mut bus = RegisterBus::new(Truncating);
        assert!(matches!(bus.read(0x10).await, Err(Rfm69Error::Bus(_))));
    }
}
