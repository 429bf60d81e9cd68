//! Hand-rolled fakes for the host tests: a scriptable I2C bus, a delay
//! that only counts, and a capped framebuffer pool.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType as PinErrorType, InputPin};
use embedded_hal::i2c::{self, ErrorKind, I2c, NoAcknowledgeSource, Operation};

use crate::panel::FramePool;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Nack;

impl i2c::Error for Nack {
    fn kind(&self) -> ErrorKind {
        ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address)
    }
}

/// Fake bus: a fixed set of ACKing addresses, a write log, and just
/// enough GT911 behaviour (product-ID register) for handshakes.
pub struct FakeBus {
    pub present: Vec<u8>,
    pub writes: Vec<(u8, Vec<u8>)>,
    register: u16,
}

impl FakeBus {
    pub fn with_devices(addresses: &[u8]) -> Self {
        Self {
            present: addresses.to_vec(),
            writes: Vec::new(),
            register: 0,
        }
    }

    pub fn writes_to(&self, address: u8) -> Vec<Vec<u8>> {
        self.writes
            .iter()
            .filter(|(a, _)| *a == address)
            .map(|(_, bytes)| bytes.clone())
            .collect()
    }
}

impl i2c::ErrorType for FakeBus {
    type Error = Nack;
}

impl I2c for FakeBus {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        if !self.present.contains(&address) {
            return Err(Nack);
        }
        for op in operations {
            match op {
                Operation::Write(bytes) => {
                    if bytes.len() >= 2 {
                        self.register = u16::from_be_bytes([bytes[0], bytes[1]]);
                    }
                    self.writes.push((address, bytes.to_vec()));
                }
                Operation::Read(buffer) => {
                    if self.register == 0x8140 {
                        for (dst, src) in buffer.iter_mut().zip(b"911\0") {
                            *dst = *src;
                        }
                    } else {
                        buffer.fill(0);
                    }
                }
            }
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct CountingDelay {
    pub slept_ms: u32,
}

impl DelayNs for CountingDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.slept_ms += ns / 1_000_000;
    }
}

pub struct IrqIdle;

impl PinErrorType for IrqIdle {
    type Error = core::convert::Infallible;
}

impl InputPin for IrqIdle {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(true)
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(false)
    }
}

/// Pool with a fixed byte capacity, for allocation-failure tests.
pub struct CappedPool {
    pub remaining: usize,
}

impl FramePool for CappedPool {
    fn try_alloc(&mut self, len: usize) -> Option<Box<[u8]>> {
        if len > self.remaining {
            return None;
        }
        self.remaining -= len;
        Some(vec![0u8; len].into_boxed_slice())
    }
}
