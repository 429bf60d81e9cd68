//! Waveshare ESP32-S3 Touch LCD 4.3": pin assignments, bus addresses
//! and panel timing. One immutable record per consumer; nothing in here
//! is read at runtime from anywhere else.

use bsp::bus::BusConfig;
use bsp::panel::{PanelConfig, PanelPins, PanelTiming};
use drivers::gt911::{AxisBounds, Orientation, GT911_ADDRESS};

pub const BOARD_WIDTH: u16 = 800;
pub const BOARD_HEIGHT: u16 = 480;

pub const I2C_SDA_GPIO: u8 = 8;
pub const I2C_SCL_GPIO: u8 = 9;
pub const I2C_FREQ_HZ: u32 = 400_000;

/// Default GT911 address; 0x14 if its ADDR strap is pulled high.
pub const GT911_I2C_ADDR: u8 = GT911_ADDRESS;
pub const GT911_IRQ_GPIO: u8 = 4;

/// Conventional CH422G address, the one the bus scan reports.
pub const CH422G_I2C_ADDR: u8 = 0x20;

/// GT911 reset via EXIO1: >=10 ms low, ~100 ms to first valid read.
pub const TOUCH_RESET_LOW_MS: u32 = 10;
pub const TOUCH_RESET_SETTLE_MS: u32 = 100;

/// LCD reset via EXIO3.
pub const LCD_RESET_LOW_MS: u32 = 10;
pub const LCD_RESET_SETTLE_MS: u32 = 120;

pub const BUS_CONFIG: BusConfig = BusConfig {
    sda: I2C_SDA_GPIO,
    scl: I2C_SCL_GPIO,
    frequency_hz: I2C_FREQ_HZ,
    glitch_filter_cycles: 7,
    timeout_ms: 100,
};

/// Timing calibrated for the 4.3" RGB panel (vendor demo values) and
/// the RGB565 data lane order D0..D15 = B3..B7, G2..G7, R0..R4.
pub const PANEL_CONFIG: PanelConfig = PanelConfig {
    width: BOARD_WIDTH,
    height: BOARD_HEIGHT,
    double_buffer: true,
    pins: PanelPins {
        data: [14, 38, 18, 17, 10, 39, 0, 45, 48, 47, 21, 1, 2, 42, 41, 40],
        pclk: 7,
        de: 5,
        hsync: 46,
        vsync: 3,
    },
    timing: PanelTiming {
        pclk_hz: 16_000_000,
        hsync_pulse: 4,
        hsync_back_porch: 8,
        hsync_front_porch: 8,
        vsync_pulse: 4,
        vsync_back_porch: 8,
        vsync_front_porch: 8,
        pclk_active_falling: true,
    },
};

pub const TOUCH_BOUNDS: AxisBounds = AxisBounds {
    max_x: BOARD_WIDTH,
    max_y: BOARD_HEIGHT,
};

pub const TOUCH_ORIENTATION: Orientation = Orientation {
    swap_axes: false,
    mirror_x: false,
    mirror_y: false,
};
