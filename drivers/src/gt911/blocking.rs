use super::{
    AxisBounds, Orientation, TouchError, TouchPoint, REG_POINT_BASE, REG_PRODUCT_ID, REG_STATUS,
};
use crate::RegisterDevice;
use embedded_hal::digital::InputPin;
use embedded_hal::i2c::I2c;

const STATUS_BUFFER_READY: u8 = 0x80;
const STATUS_POINT_MASK: u8 = 0x0F;

/// GT911 touch controller.
///
/// The reset line is owned by the I/O expander, not by this driver: the
/// board sequencer must have completed the reset pulse before `begin` is
/// called, because the chip latches its address during reset and cannot
/// report an early handshake.
pub struct Gt911<I2C, PIN> {
    dev: RegisterDevice<I2C>,
    irq: PIN,
    bounds: AxisBounds,
    orientation: Orientation,
}

impl<I2C, PIN> Gt911<I2C, PIN>
where
    I2C: I2c,
    PIN: InputPin,
{
    pub fn new(
        i2c: I2C,
        address: u8,
        irq: PIN,
        bounds: AxisBounds,
        orientation: Orientation,
    ) -> Self {
        Self {
            dev: RegisterDevice::new(i2c, address),
            irq,
            bounds,
            orientation,
        }
    }

    /// Handshake: read the product ID and verify it reads back "911".
    pub fn begin(&mut self) -> Result<(), TouchError> {
        let mut id = [0u8; 4];
        self.dev
            .read_register_buffer(REG_PRODUCT_ID, &mut id)
            .map_err(|_| TouchError::DeviceNotResponding)?;
        if &id[..3] != b"911" {
            return Err(TouchError::DeviceNotResponding);
        }
        Ok(())
    }

    pub fn bounds(&self) -> AxisBounds {
        self.bounds
    }

    /// The interrupt line pulses low while touch data is pending.
    pub fn is_touch_available(&mut self) -> Result<bool, TouchError> {
        self.irq.is_low().map_err(|_| TouchError::PinError)
    }

    /// Read one touch sample, if the controller has a fresh one.
    ///
    /// The buffer-ready flag is cleared on every exit path that saw it
    /// set, otherwise the controller stops reporting.
    pub fn read_touch(&mut self) -> Result<Option<TouchPoint>, TouchError> {
        let mut status = [0u8; 1];
        self.dev.read_register_buffer(REG_STATUS, &mut status)?;

        if status[0] & STATUS_BUFFER_READY == 0 {
            return Ok(None);
        }

        let points = status[0] & STATUS_POINT_MASK;
        if points == 0 {
            // touch released
            self.dev.write_register(REG_STATUS, 0)?;
            return Ok(None);
        }

        // First point only: track id, x, y, size, little-endian words.
        let mut raw = [0u8; 8];
        self.dev.read_register_buffer(REG_POINT_BASE, &mut raw)?;
        self.dev.write_register(REG_STATUS, 0)?;

        let raw_x = u16::from_le_bytes([raw[1], raw[2]]);
        let raw_y = u16::from_le_bytes([raw[3], raw[4]]);
        let size = u16::from_le_bytes([raw[5], raw[6]]);
        let (x, y) = super::map_point(self.bounds, self.orientation, raw_x, raw_y);

        Ok(Some(TouchPoint {
            id: raw[0],
            x,
            y,
            size,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal::digital::ErrorType as PinErrorType;
    use embedded_hal::i2c::{self, ErrorKind, NoAcknowledgeSource, Operation};

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Nack;

    impl i2c::Error for Nack {
        fn kind(&self) -> ErrorKind {
            ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address)
        }
    }

    /// Fake GT911: answers register reads from a tiny register map and
    /// records register writes.
    struct FakeChip {
        present: bool,
        product_id: [u8; 4],
        status: u8,
        point: [u8; 8],
        writes: Vec<(u16, u8)>,
    }

    impl FakeChip {
        fn new() -> Self {
            Self {
                present: true,
                product_id: *b"911\0",
                status: 0,
                point: [0; 8],
                writes: Vec::new(),
            }
        }
    }

    impl i2c::ErrorType for FakeChip {
        type Error = Nack;
    }

    impl I2c for FakeChip {
        fn transaction(
            &mut self,
            _address: u8,
            operations: &mut [Operation<'_>],
        ) -> Result<(), Self::Error> {
            if !self.present {
                return Err(Nack);
            }
            let mut register = 0u16;
            for op in operations {
                match op {
                    Operation::Write(bytes) => {
                        register = u16::from_be_bytes([bytes[0], bytes[1]]);
                        if bytes.len() > 2 {
                            self.writes.push((register, bytes[2]));
                        }
                    }
                    Operation::Read(buffer) => {
                        let source: &[u8] = match register {
                            super::REG_PRODUCT_ID => &self.product_id,
                            super::REG_STATUS => core::slice::from_ref(&self.status),
                            super::REG_POINT_BASE => &self.point,
                            _ => &[],
                        };
                        for (dst, src) in buffer.iter_mut().zip(source) {
                            *dst = *src;
                        }
                    }
                }
            }
            Ok(())
        }
    }

    struct IrqLow;

    impl PinErrorType for IrqLow {
        type Error = core::convert::Infallible;
    }

    impl InputPin for IrqLow {
        fn is_high(&mut self) -> Result<bool, Self::Error> {
            Ok(false)
        }

        fn is_low(&mut self) -> Result<bool, Self::Error> {
            Ok(true)
        }
    }

    const BOUNDS: AxisBounds = AxisBounds {
        max_x: 800,
        max_y: 480,
    };

    fn driver(chip: FakeChip) -> Gt911<FakeChip, IrqLow> {
        Gt911::new(chip, super::super::GT911_ADDRESS, IrqLow, BOUNDS, Orientation::default())
    }

    #[test]
    fn begin_accepts_valid_product_id() {
        let mut touch = driver(FakeChip::new());
        assert!(touch.begin().is_ok());
    }

    #[test]
    fn begin_rejects_malformed_product_id() {
        let mut chip = FakeChip::new();
        chip.product_id = *b"\0\0\0\0";
        let mut touch = driver(chip);
        assert_eq!(touch.begin(), Err(TouchError::DeviceNotResponding));
    }

    #[test]
    fn begin_maps_transport_error_to_not_responding() {
        let mut chip = FakeChip::new();
        chip.present = false;
        let mut touch = driver(chip);
        assert_eq!(touch.begin(), Err(TouchError::DeviceNotResponding));
    }

    #[test]
    fn read_touch_without_ready_flag_is_none() {
        let mut touch = driver(FakeChip::new());
        assert_eq!(touch.read_touch().unwrap(), None);
        // no spurious status clear
        assert!(touch.dev.i2c.writes.is_empty());
    }

    #[test]
    fn read_touch_parses_point_and_clears_status() {
        let mut chip = FakeChip::new();
        chip.status = STATUS_BUFFER_READY | 1;
        chip.point = [3, 0x2C, 0x01, 0xE0, 0x00, 0x10, 0x00, 0];
        let mut touch = driver(chip);

        let point = touch.read_touch().unwrap().unwrap();
        assert_eq!(
            point,
            TouchPoint {
                id: 3,
                x: 300,
                y: 224,
                size: 16,
            }
        );
        assert_eq!(touch.dev.i2c.writes, vec![(REG_STATUS, 0)]);
    }

    #[test]
    fn release_clears_status_and_reports_none() {
        let mut chip = FakeChip::new();
        chip.status = STATUS_BUFFER_READY;
        let mut touch = driver(chip);

        assert_eq!(touch.read_touch().unwrap(), None);
        assert_eq!(touch.dev.i2c.writes, vec![(REG_STATUS, 0)]);
    }
}
