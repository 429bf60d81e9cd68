#![cfg_attr(not(test), no_std)]
//! Peripheral drivers for the Waveshare ESP32-S3 Touch LCD 4.3" board.
//!
//! All drivers are generic over the `embedded-hal` 1.0 traits so they can
//! be exercised on the host against fake buses as well as on the target.

/// CH422G I/O expander driver (touch reset, LCD reset, backlight enable).
pub mod ch422g;

/// GT911 capacitive touch controller driver.
pub mod gt911;

use embedded_hal::i2c::I2c;

/// Register access helper for devices with 16-bit register addresses.
///
/// The register address is sent big-endian, matching the GT911 datasheet.
pub(crate) struct RegisterDevice<I2C> {
    i2c: I2C,
    address: u8,
}

impl<I2C> RegisterDevice<I2C>
where
    I2C: I2c,
{
    pub fn new(i2c: I2C, address: u8) -> Self {
        Self { i2c, address }
    }

    pub fn read_register_buffer(
        &mut self,
        register: u16,
        buffer: &mut [u8],
    ) -> Result<(), I2C::Error> {
        self.i2c
            .write_read(self.address, &register.to_be_bytes(), buffer)
    }

    pub fn write_register(&mut self, register: u16, value: u8) -> Result<(), I2C::Error> {
        let [hi, lo] = register.to_be_bytes();
        self.i2c.write(self.address, &[hi, lo, value])
    }
}
