use core::fmt::{Display, Formatter};

use bitflags::bitflags;
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::PinState;
use embedded_hal::i2c::I2c;
use num_enum::{IntoPrimitive, TryFromPrimitive};

// The CH422G has no register pointer; each command register is a fixed
// I2C address of its own (datasheet "WR_SET"/"WR_IO"/"RD_IO" cycles).
const WR_SET_ADDRESS: u8 = 0x24;
const WR_IO_ADDRESS: u8 = 0x38;
const RD_IO_ADDRESS: u8 = 0x26;

bitflags! {
    /// System parameter byte written through WR_SET.
    pub struct SysParam: u8 {
        /// Bit 0: IO_OE, enables push-pull output on IO0..IO7
        const IO_OE = 1 << 0;
        /// Bit 2: OD_EN, enables open-drain mode on OC0..OC3
        const OD_EN = 1 << 2;
        /// Bit 3: SLEEP, low-power mode
        const SLEEP = 1 << 3;
    }
}

/// Expander lines as wired on the Waveshare ESP32-S3 Touch LCD 4.3".
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ExIo {
    /// EXIO1: GT911 reset (active low)
    TouchReset = 1,
    /// EXIO2: backlight enable (active high)
    Backlight = 2,
    /// EXIO3: LCD panel reset (active low)
    LcdReset = 3,
    /// EXIO4: SD card chip select
    SdCs = 4,
    /// EXIO5: USB select
    UsbSel = 5,
}

impl ExIo {
    fn mask(self) -> u8 {
        1 << u8::from(self)
    }
}

impl Display for ExIo {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            ExIo::TouchReset => write!(f, "EXIO1/touch-reset"),
            ExIo::Backlight => write!(f, "EXIO2/backlight"),
            ExIo::LcdReset => write!(f, "EXIO3/lcd-reset"),
            ExIo::SdCs => write!(f, "EXIO4/sd-cs"),
            ExIo::UsbSel => write!(f, "EXIO5/usb-sel"),
        }
    }
}

/// Errors that can occur when interacting with the CH422G
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ExpanderError {
    /// The presence handshake got no valid reply
    DeviceNotResponding,
    /// The system parameter / direction write did not complete
    ConfigWriteFailed,
    /// An output level write did not complete
    LineWriteFailed(ExIo),
}

impl Display for ExpanderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            ExpanderError::DeviceNotResponding => write!(f, "expander not responding"),
            ExpanderError::ConfigWriteFailed => write!(f, "expander config write failed"),
            ExpanderError::LineWriteFailed(line) => write!(f, "write to {line} failed"),
        }
    }
}

/// CH422G I/O expander.
///
/// Output levels are shadowed so single-line updates only touch the one
/// output register. The shadow is updated after a write succeeds, never
/// before, so it always reflects the last level the chip acknowledged.
pub struct Ch422g<I2C, DELAY> {
    i2c: I2C,
    delay: DELAY,
    out_shadow: u8,
}

impl<I2C, DELAY> Ch422g<I2C, DELAY>
where
    I2C: I2c,
    DELAY: DelayNs,
{
    /// Power-on output state: both reset lines deasserted, backlight off.
    const INITIAL_OUTPUT: u8 = 1 << 1 | 1 << 3;

    pub fn new(i2c: I2C, delay: DELAY) -> Self {
        Self {
            i2c,
            delay,
            out_shadow: Self::INITIAL_OUTPUT,
        }
    }

    /// Presence handshake: a one-byte input read that the chip must ACK.
    pub fn init(&mut self) -> Result<(), ExpanderError> {
        let mut probe = [0u8; 1];
        self.i2c
            .read(RD_IO_ADDRESS, &mut probe)
            .map_err(|_| ExpanderError::DeviceNotResponding)?;
        Ok(())
    }

    /// Configure every EXIO line as a push-pull output and drive the
    /// shadowed levels so chip and shadow agree.
    pub fn set_all_outputs(&mut self) -> Result<(), ExpanderError> {
        self.i2c
            .write(WR_SET_ADDRESS, &[SysParam::IO_OE.bits()])
            .map_err(|_| ExpanderError::ConfigWriteFailed)?;
        self.i2c
            .write(WR_IO_ADDRESS, &[self.out_shadow])
            .map_err(|_| ExpanderError::ConfigWriteFailed)?;
        Ok(())
    }

    /// Drive a single line. The electrical effect is immediate and not
    /// rolled back on failure; a failed write leaves the line at an
    /// unknown level and the shadow untouched.
    pub fn set_line(&mut self, line: ExIo, level: PinState) -> Result<(), ExpanderError> {
        let next = match level {
            PinState::High => self.out_shadow | line.mask(),
            PinState::Low => self.out_shadow & !line.mask(),
        };
        self.i2c
            .write(WR_IO_ADDRESS, &[next])
            .map_err(|_| ExpanderError::LineWriteFailed(line))?;
        self.out_shadow = next;
        Ok(())
    }

    /// Reset pulse: low, wait `low_ms`, high, wait `settle_ms`.
    ///
    /// A failed write aborts the sequence immediately; the remaining wait
    /// and the second edge are not attempted.
    pub fn pulse_line(
        &mut self,
        line: ExIo,
        low_ms: u32,
        settle_ms: u32,
    ) -> Result<(), ExpanderError> {
        self.set_line(line, PinState::Low)?;
        self.delay.delay_ms(low_ms);
        self.set_line(line, PinState::High)?;
        self.delay.delay_ms(settle_ms);
        Ok(())
    }

    /// Last output byte the chip acknowledged.
    pub fn outputs(&self) -> u8 {
        self.out_shadow
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal::i2c::{self, ErrorKind, NoAcknowledgeSource, Operation};

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Nack;

    impl i2c::Error for Nack {
        fn kind(&self) -> ErrorKind {
            ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address)
        }
    }

    /// Records writes as (address, byte); can be told to NACK from the
    /// n-th write onwards.
    struct FakeBus {
        writes: Vec<(u8, u8)>,
        fail_from: Option<usize>,
        ack_reads: bool,
    }

    impl FakeBus {
        fn new() -> Self {
            Self {
                writes: Vec::new(),
                fail_from: None,
                ack_reads: true,
            }
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
            for op in operations {
                match op {
                    Operation::Write(bytes) => {
                        if self.fail_from.is_some_and(|n| self.writes.len() >= n) {
                            return Err(Nack);
                        }
                        self.writes.push((address, bytes[0]));
                    }
                    Operation::Read(buffer) => {
                        if !self.ack_reads {
                            return Err(Nack);
                        }
                        buffer.fill(0);
                    }
                }
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeDelay {
        slept_ms: Vec<u32>,
    }

    impl DelayNs for FakeDelay {
        fn delay_ns(&mut self, ns: u32) {
            self.slept_ms.push(ns / 1_000_000);
        }
    }

    #[test]
    fn init_fails_when_chip_absent() {
        let mut bus = FakeBus::new();
        bus.ack_reads = false;
        let mut exp = Ch422g::new(bus, FakeDelay::default());
        assert_eq!(exp.init(), Err(ExpanderError::DeviceNotResponding));
    }

    #[test]
    fn set_all_outputs_writes_config_then_levels() {
        let mut exp = Ch422g::new(FakeBus::new(), FakeDelay::default());
        exp.set_all_outputs().unwrap();
        assert_eq!(
            exp.i2c.writes,
            vec![
                (WR_SET_ADDRESS, SysParam::IO_OE.bits()),
                (WR_IO_ADDRESS, Ch422g::<FakeBus, FakeDelay>::INITIAL_OUTPUT),
            ]
        );
    }

    #[test]
    fn set_line_updates_shadow_only_on_success() {
        let mut exp = Ch422g::new(FakeBus::new(), FakeDelay::default());
        let before = exp.outputs();

        exp.set_line(ExIo::Backlight, PinState::High).unwrap();
        assert_eq!(exp.outputs(), before | 1 << 2);

        exp.i2c.fail_from = Some(exp.i2c.writes.len());
        assert_eq!(
            exp.set_line(ExIo::Backlight, PinState::Low),
            Err(ExpanderError::LineWriteFailed(ExIo::Backlight))
        );
        assert_eq!(exp.outputs(), before | 1 << 2);
    }

    #[test]
    fn pulse_is_low_wait_high_wait() {
        let mut exp = Ch422g::new(FakeBus::new(), FakeDelay::default());
        exp.pulse_line(ExIo::TouchReset, 10, 100).unwrap();

        let touch = 1 << 1;
        let lcd = 1 << 3;
        assert_eq!(
            exp.i2c.writes,
            vec![(WR_IO_ADDRESS, lcd), (WR_IO_ADDRESS, touch | lcd)]
        );
        assert_eq!(exp.delay.slept_ms, vec![10, 100]);
        assert_eq!(exp.delay.slept_ms.iter().sum::<u32>(), 110);
    }

    #[test]
    fn pulse_aborts_after_failed_second_edge() {
        let mut exp = Ch422g::new(FakeBus::new(), FakeDelay::default());
        exp.i2c.fail_from = Some(1);

        assert_eq!(
            exp.pulse_line(ExIo::LcdReset, 10, 100),
            Err(ExpanderError::LineWriteFailed(ExIo::LcdReset))
        );
        // First edge went out, the low wait ran, then nothing more.
        assert_eq!(exp.i2c.writes.len(), 1);
        assert_eq!(exp.delay.slept_ms, vec![10]);
    }

    #[test]
    fn line_roundtrip_through_primitive() {
        assert_eq!(ExIo::try_from(2), Ok(ExIo::Backlight));
        assert_eq!(u8::from(ExIo::LcdReset), 3);
        assert!(ExIo::try_from(7).is_err());
    }
}
