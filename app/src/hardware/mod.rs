//! Hardware initialization modules
//!
//! Stage-level wiring between the board-support core and the real
//! peripherals:
//!
//! - **Display**: 800x480 RGB panel via LCD_CAM DPI with DMA framebuffers
//! - **Touchpad**: GT911 capacitive touch controller via the shared I2C bus

pub mod display;
pub mod touch;

// Re-export commonly used types for convenience
pub use display::{initialize_display, DisplayPort};
pub use touch::{initialize_touchpad, I2cBus, Touchpad};
