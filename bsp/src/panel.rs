use alloc::boxed::Box;
use alloc::vec::Vec;
use core::fmt::{Display, Formatter};

use log::info;

/// RGB565 throughout.
pub const BYTES_PER_PIXEL: usize = 2;

/// The 16 data lines plus the four control lines of the RGB interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PanelPins {
    /// D0..D15, LSB first (B3..B7, G2..G7, R0..R4 on this board).
    pub data: [u8; 16],
    pub pclk: u8,
    pub de: u8,
    pub hsync: u8,
    pub vsync: u8,
}

impl PanelPins {
    fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        self.data
            .iter()
            .copied()
            .chain([self.pclk, self.de, self.hsync, self.vsync])
    }
}

/// Timing block of the panel, straight from the vendor demo values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PanelTiming {
    pub pclk_hz: u32,
    pub hsync_pulse: u16,
    pub hsync_back_porch: u16,
    pub hsync_front_porch: u16,
    pub vsync_pulse: u16,
    pub vsync_back_porch: u16,
    pub vsync_front_porch: u16,
    /// Sample data on the falling PCLK edge.
    pub pclk_active_falling: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PanelConfig {
    pub width: u16,
    pub height: u16,
    pub double_buffer: bool,
    pub pins: PanelPins,
    pub timing: PanelTiming,
}

impl PanelConfig {
    /// Every pin must be distinct and a real GPIO.
    pub fn validate(&self) -> Result<(), PanelError> {
        let mut seen = 0u64;
        for pin in self.pins.iter() {
            if pin > crate::MAX_GPIO {
                return Err(PanelError::PinConflict(pin));
            }
            let mask = 1u64 << pin;
            if seen & mask != 0 {
                return Err(PanelError::PinConflict(pin));
            }
            seen |= mask;
        }
        Ok(())
    }

    /// Size of one frame in bytes.
    pub fn frame_len(&self) -> usize {
        usize::from(self.width) * usize::from(self.height) * BYTES_PER_PIXEL
    }

    pub fn frame_count(&self) -> usize {
        if self.double_buffer {
            2
        } else {
            1
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelError {
    /// A pin is aliased or outside the GPIO range.
    PinConflict(u8),
    /// The pool could not satisfy a frame allocation. This is capacity
    /// exhaustion, not misconfiguration.
    FramebufferAllocationFailed { requested: usize },
}

impl Display for PanelError {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            PanelError::PinConflict(pin) => write!(f, "panel pin conflict on GPIO{pin}"),
            PanelError::FramebufferAllocationFailed { requested } => {
                write!(f, "framebuffer allocation of {requested} bytes failed")
            }
        }
    }
}

/// Where framebuffers come from. The app backs this with the PSRAM
/// heap; tests back it with a capped fake.
pub trait FramePool {
    fn try_alloc(&mut self, len: usize) -> Option<Box<[u8]>>;
}

/// Validated panel configuration plus its allocated framebuffers, ready
/// to hand to the display transport.
pub struct PanelHandle {
    config: PanelConfig,
    framebuffers: Vec<Box<[u8]>>,
}

impl PanelHandle {
    pub fn config(&self) -> &PanelConfig {
        &self.config
    }

    pub fn frame_count(&self) -> usize {
        self.framebuffers.len()
    }

    pub fn into_parts(self) -> (PanelConfig, Vec<Box<[u8]>>) {
        (self.config, self.framebuffers)
    }
}

/// Validate the configuration and allocate the framebuffer(s).
///
/// In double-buffer mode both frames must come through; a partial
/// allocation is a hard failure rather than a silent fallback to a
/// single buffer.
pub fn init(config: PanelConfig, pool: &mut dyn FramePool) -> Result<PanelHandle, PanelError> {
    config.validate()?;

    let requested = config.frame_len();
    let mut framebuffers = Vec::new();
    for _ in 0..config.frame_count() {
        match pool.try_alloc(requested) {
            Some(frame) => framebuffers.push(frame),
            None => return Err(PanelError::FramebufferAllocationFailed { requested }),
        }
    }

    info!(
        "panel: {}x{} RGB565, {} framebuffer(s) of {} bytes",
        config.width,
        config.height,
        framebuffers.len(),
        requested
    );
    Ok(PanelHandle {
        config,
        framebuffers,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::CappedPool;

    const PINS: PanelPins = PanelPins {
        data: [14, 38, 18, 17, 10, 39, 0, 45, 48, 47, 21, 1, 2, 42, 41, 40],
        pclk: 7,
        de: 5,
        hsync: 46,
        vsync: 3,
    };

    const TIMING: PanelTiming = PanelTiming {
        pclk_hz: 16_000_000,
        hsync_pulse: 4,
        hsync_back_porch: 8,
        hsync_front_porch: 8,
        vsync_pulse: 4,
        vsync_back_porch: 8,
        vsync_front_porch: 8,
        pclk_active_falling: true,
    };

    fn config(double_buffer: bool) -> PanelConfig {
        PanelConfig {
            width: 800,
            height: 480,
            double_buffer,
            pins: PINS,
            timing: TIMING,
        }
    }

    #[test]
    fn frame_math() {
        let cfg = config(false);
        assert_eq!(cfg.frame_len(), 800 * 480 * 2);
        assert_eq!(cfg.frame_count(), 1);
        assert_eq!(config(true).frame_count(), 2);
    }

    #[test]
    fn distinct_pins_validate() {
        assert!(config(false).validate().is_ok());
    }

    #[test]
    fn aliased_pin_is_a_conflict() {
        let mut cfg = config(false);
        cfg.pins.vsync = cfg.pins.data[0];
        assert_eq!(cfg.validate(), Err(PanelError::PinConflict(14)));
    }

    #[test]
    fn out_of_range_pin_is_a_conflict() {
        let mut cfg = config(false);
        cfg.pins.data[3] = crate::MAX_GPIO + 1;
        assert_eq!(cfg.validate(), Err(PanelError::PinConflict(49)));
    }

    #[test]
    fn double_buffer_allocates_two_frames() {
        let cfg = config(true);
        let mut pool = CappedPool {
            remaining: cfg.frame_len() * 2,
        };
        let handle = init(cfg, &mut pool).unwrap();
        assert_eq!(handle.frame_count(), 2);
        let (_, frames) = handle.into_parts();
        assert!(frames.iter().all(|f| f.len() == 800 * 480 * 2));
    }

    #[test]
    fn exhausted_pool_is_a_typed_failure() {
        let cfg = config(false);
        let mut pool = CappedPool { remaining: 0 };
        assert_eq!(
            init(cfg, &mut pool).err(),
            Some(PanelError::FramebufferAllocationFailed {
                requested: cfg.frame_len()
            })
        );
    }

    #[test]
    fn partial_double_buffer_allocation_fails_hard() {
        let cfg = config(true);
        // room for one frame only; no silent fallback to single buffering
        let mut pool = CappedPool {
            remaining: cfg.frame_len(),
        };
        assert_eq!(
            init(cfg, &mut pool).err(),
            Some(PanelError::FramebufferAllocationFailed {
                requested: cfg.frame_len()
            })
        );
    }
}
