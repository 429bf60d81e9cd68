//! Touchpad hardware initialization module
//!
//! Binds the GT911 driver to its bus endpoint and interrupt pin. The
//! reset pulse has already happened through the I/O expander; calling
//! this earlier would mis-detect silently, which is why only the
//! bring-up sequencer constructs it.

use bsp::bus::Endpoint;
use drivers::gt911::blocking::Gt911;
use drivers::gt911::TouchError;
use esp_hal::gpio::{Input, InputConfig, Pull};
use esp_hal::i2c::master::I2c;
use esp_hal::peripherals::GPIO4;
use esp_hal::Blocking;
use log::info;

use crate::config;

pub type I2cBus = I2c<'static, Blocking>;

/// Type alias for the GT911 touchpad driver instance.
pub type Touchpad = Gt911<Endpoint<'static, I2cBus>, Input<'static>>;

/// Initializes the GT911 touchpad and verifies its handshake.
pub fn initialize_touchpad(
    endpoint: Endpoint<'static, I2cBus>,
    irq: GPIO4<'static>,
) -> Result<Touchpad, TouchError> {
    // The interrupt line is driven by the controller; no pull needed.
    let irq = Input::new(irq, InputConfig::default().with_pull(Pull::None));

    let mut touchpad = Gt911::new(
        endpoint,
        config::GT911_I2C_ADDR,
        irq,
        config::TOUCH_BOUNDS,
        config::TOUCH_ORIENTATION,
    );
    touchpad.begin()?;
    info!(
        "touch: GT911 online at 0x{:02X}, {}x{} output space",
        config::GT911_I2C_ADDR,
        config::TOUCH_BOUNDS.max_x,
        config::TOUCH_BOUNDS.max_y
    );
    Ok(touchpad)
}
