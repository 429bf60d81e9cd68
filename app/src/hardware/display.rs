//! Display hardware initialization module
//!
//! Maps an allocated panel handle onto the ESP32-S3 LCD_CAM peripheral
//! in DPI (parallel RGB) mode and wraps the framebuffers for DMA.

use alloc::boxed::Box;
use alloc::vec;
use alloc::vec::Vec;

use bsp::panel::{PanelHandle, PanelTiming};
use esp_hal::dma::{DmaDescriptor, DmaTxBuf};
use esp_hal::gpio::Level;
use esp_hal::lcd_cam::lcd::dpi::{Config as DpiConfig, Dpi, Format, FrameTiming};
use esp_hal::lcd_cam::lcd::{ClockMode, Phase, Polarity};
use esp_hal::lcd_cam::LcdCam;
use esp_hal::time::Rate;
use esp_hal::Blocking;
use log::info;

use crate::board::{BoardError, DisplayResources};

/// Largest payload one DMA descriptor can carry.
const DMA_CHUNK: usize = 4092;

/// The running DPI output plus its framebuffers. The last buffer in
/// `frames` is the back buffer the renderer draws into.
pub struct DisplayPort {
    pub dpi: Dpi<'static, Blocking>,
    pub frames: Vec<DmaTxBuf>,
}

/// Bring up the RGB interface with the validated panel configuration.
///
/// The panel itself has already been reset through the I/O expander by
/// the time this runs; all that is left is timing and pin routing.
pub fn initialize_display(
    res: DisplayResources,
    panel: PanelHandle,
) -> Result<DisplayPort, BoardError> {
    let (config, buffers) = panel.into_parts();
    info!(
        "display: LCD_CAM DPI {}x{} @ {} Hz pixel clock",
        config.width, config.height, config.timing.pclk_hz
    );

    let lcd_cam = LcdCam::new(res.lcd_cam);

    let dpi_config = DpiConfig::default()
        .with_clock_mode(ClockMode {
            polarity: Polarity::IdleLow,
            phase: if config.timing.pclk_active_falling {
                Phase::ShiftLow
            } else {
                Phase::ShiftHigh
            },
        })
        .with_frequency(Rate::from_hz(config.timing.pclk_hz))
        .with_format(Format {
            enable_2byte_mode: true,
            ..Default::default()
        })
        .with_timing(frame_timing(config.width, config.height, &config.timing))
        .with_vsync_idle_level(Level::High)
        .with_hsync_idle_level(Level::High)
        .with_de_idle_level(Level::Low)
        .with_disable_black_region(false);

    let dpi = Dpi::new(lcd_cam.lcd, res.dma, dpi_config)
        .map_err(|_| BoardError::DisplayPort("dpi configuration rejected"))?
        .with_vsync(res.vsync)
        .with_hsync(res.hsync)
        .with_de(res.de)
        .with_pclk(res.pclk)
        .with_data0(res.d0)
        .with_data1(res.d1)
        .with_data2(res.d2)
        .with_data3(res.d3)
        .with_data4(res.d4)
        .with_data5(res.d5)
        .with_data6(res.d6)
        .with_data7(res.d7)
        .with_data8(res.d8)
        .with_data9(res.d9)
        .with_data10(res.d10)
        .with_data11(res.d11)
        .with_data12(res.d12)
        .with_data13(res.d13)
        .with_data14(res.d14)
        .with_data15(res.d15);

    let mut frames = Vec::with_capacity(buffers.len());
    for buffer in buffers {
        frames.push(dma_frame(buffer)?);
    }

    Ok(DisplayPort { dpi, frames })
}

fn frame_timing(width: u16, height: u16, timing: &PanelTiming) -> FrameTiming {
    let h_blank =
        usize::from(timing.hsync_pulse + timing.hsync_back_porch + timing.hsync_front_porch);
    let v_blank =
        usize::from(timing.vsync_pulse + timing.vsync_back_porch + timing.vsync_front_porch);
    FrameTiming {
        horizontal_active_width: usize::from(width),
        horizontal_total_width: usize::from(width) + h_blank,
        horizontal_blank_front_porch: usize::from(timing.hsync_front_porch),
        vertical_active_height: usize::from(height),
        vertical_total_height: usize::from(height) + v_blank,
        vertical_blank_front_porch: usize::from(timing.vsync_front_porch),
        hsync_width: usize::from(timing.hsync_pulse),
        vsync_width: usize::from(timing.vsync_pulse),
        hsync_position: 0,
    }
}

/// Wrap one framebuffer for DMA. Buffer and descriptors live for the
/// rest of the process; the panel is refreshed from them until reset.
fn dma_frame(buffer: Box<[u8]>) -> Result<DmaTxBuf, BoardError> {
    let descriptors = vec![DmaDescriptor::EMPTY; buffer.len().div_ceil(DMA_CHUNK)];
    DmaTxBuf::new(Box::leak(descriptors.into_boxed_slice()), Box::leak(buffer))
        .map_err(|_| BoardError::DisplayPort("dma framebuffer setup failed"))
}
