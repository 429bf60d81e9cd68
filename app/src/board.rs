//! Board wiring for the Waveshare ESP32-S3 Touch LCD 4.3".
//!
//! `WaveshareBoard` owns the peripherals each bring-up stage consumes
//! and implements the stage sequence; it is the only place that knows
//! how the components connect. The order itself lives in
//! `bsp::bringup::run`.

use alloc::boxed::Box;
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::fmt::{Display, Formatter};

use bsp::bringup::BoardSequence;
use bsp::bus::{BusError, BusManager};
use bsp::panel::{self, FramePool, PanelError, PanelHandle};
use bsp::scan::{self, ScanReport};
use drivers::ch422g::{Ch422g, ExIo, ExpanderError};
use drivers::gt911::TouchError;
use embedded_hal::digital::PinState;
use esp_hal::delay::Delay;
use esp_hal::i2c::master::{Config as I2cConfig, I2c};
use esp_hal::peripherals::{
    DMA_CH0, GPIO0, GPIO1, GPIO10, GPIO14, GPIO17, GPIO18, GPIO2, GPIO21, GPIO3, GPIO38, GPIO39,
    GPIO4, GPIO40, GPIO41, GPIO42, GPIO45, GPIO46, GPIO47, GPIO48, GPIO5, GPIO7, GPIO8, GPIO9,
    I2C0, LCD_CAM,
};
use esp_hal::time::Rate;
use log::info;
use slint::platform::software_renderer::{MinimalSoftwareWindow, RepaintBufferType};
use slint::PhysicalSize;

use crate::config;
use crate::hardware::display::DisplayPort;
use crate::hardware::{self, I2cBus, Touchpad};
use crate::slint_backend::Backend;

/// I2C bus peripherals.
pub struct BusResources {
    pub i2c0: I2C0<'static>,
    pub sda: GPIO8<'static>,
    pub scl: GPIO9<'static>,
}

/// RGB panel peripherals: LCD_CAM, one DMA channel, the four control
/// lines and D0..D15 in bus order.
pub struct DisplayResources {
    pub lcd_cam: LCD_CAM<'static>,
    pub dma: DMA_CH0<'static>,
    pub pclk: GPIO7<'static>,
    pub de: GPIO5<'static>,
    pub hsync: GPIO46<'static>,
    pub vsync: GPIO3<'static>,
    pub d0: GPIO14<'static>,
    pub d1: GPIO38<'static>,
    pub d2: GPIO18<'static>,
    pub d3: GPIO17<'static>,
    pub d4: GPIO10<'static>,
    pub d5: GPIO39<'static>,
    pub d6: GPIO0<'static>,
    pub d7: GPIO45<'static>,
    pub d8: GPIO48<'static>,
    pub d9: GPIO47<'static>,
    pub d10: GPIO21<'static>,
    pub d11: GPIO1<'static>,
    pub d12: GPIO2<'static>,
    pub d13: GPIO42<'static>,
    pub d14: GPIO41<'static>,
    pub d15: GPIO40<'static>,
}

pub struct TouchResources {
    pub irq: GPIO4<'static>,
}

/// Everything that can go wrong during bring-up, by component.
#[derive(Debug)]
pub enum BoardError {
    Bus(BusError),
    Expander(ExpanderError),
    Panel(PanelError),
    Touch(TouchError),
    DisplayPort(&'static str),
    /// A stage ran twice and found its peripherals already consumed.
    ResourcesConsumed(&'static str),
}

impl Display for BoardError {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            BoardError::Bus(e) => write!(f, "{e}"),
            BoardError::Expander(e) => write!(f, "{e}"),
            BoardError::Panel(e) => write!(f, "{e}"),
            BoardError::Touch(e) => write!(f, "{e}"),
            BoardError::DisplayPort(msg) => write!(f, "display port: {msg}"),
            BoardError::ResourcesConsumed(stage) => {
                write!(f, "{stage} resources already consumed")
            }
        }
    }
}

impl From<BusError> for BoardError {
    fn from(e: BusError) -> Self {
        BoardError::Bus(e)
    }
}

impl From<ExpanderError> for BoardError {
    fn from(e: ExpanderError) -> Self {
        BoardError::Expander(e)
    }
}

impl From<PanelError> for BoardError {
    fn from(e: PanelError) -> Self {
        BoardError::Panel(e)
    }
}

impl From<TouchError> for BoardError {
    fn from(e: TouchError) -> Self {
        BoardError::Touch(e)
    }
}

/// Framebuffers come from the global heap; a 750 KiB frame only fits
/// in the PSRAM region, which is where it belongs anyway.
struct HeapPool;

impl FramePool for HeapPool {
    fn try_alloc(&mut self, len: usize) -> Option<Box<[u8]>> {
        let mut buffer = Vec::new();
        buffer.try_reserve_exact(len).ok()?;
        buffer.resize(len, 0);
        Some(buffer.into_boxed_slice())
    }
}

/// What the firmware keeps running with once bring-up is `Done`.
pub struct RuntimeParts {
    pub window: Rc<MinimalSoftwareWindow>,
    pub display: DisplayPort,
    pub touchpad: Touchpad,
    pub scan_devices: usize,
}

pub struct WaveshareBoard {
    bus: &'static BusManager<I2cBus>,
    bus_res: Option<BusResources>,
    display_res: Option<DisplayResources>,
    touch_res: Option<TouchResources>,
    report: Option<ScanReport>,
    panel: Option<PanelHandle>,
    display: Option<DisplayPort>,
    window: Option<Rc<MinimalSoftwareWindow>>,
    touchpad: Option<Touchpad>,
}

impl WaveshareBoard {
    pub fn new(
        bus: &'static BusManager<I2cBus>,
        bus_res: BusResources,
        display_res: DisplayResources,
        touch_res: TouchResources,
    ) -> Self {
        Self {
            bus,
            bus_res: Some(bus_res),
            display_res: Some(display_res),
            touch_res: Some(touch_res),
            report: None,
            panel: None,
            display: None,
            window: None,
            touchpad: None,
        }
    }

    /// Hand over the handles the tasks run with. Only valid once the
    /// whole sequence has succeeded.
    pub fn into_runtime(self) -> RuntimeParts {
        RuntimeParts {
            window: self.window.expect("bring-up did not complete"),
            display: self.display.expect("bring-up did not complete"),
            touchpad: self.touchpad.expect("bring-up did not complete"),
            scan_devices: self.report.map(|r| r.len()).unwrap_or(0),
        }
    }
}

impl BoardSequence for WaveshareBoard {
    type Error = BoardError;

    fn bus_init(&mut self) -> Result<(), Self::Error> {
        let res = self.bus_res.take().ok_or(BusError::BusUnavailable)?;
        info!(
            "initializing I2C on GPIO{} (SDA), GPIO{} (SCL) @ {} Hz",
            config::I2C_SDA_GPIO,
            config::I2C_SCL_GPIO,
            config::I2C_FREQ_HZ
        );
        let transport = I2c::new(
            res.i2c0,
            I2cConfig::default().with_frequency(Rate::from_hz(config::I2C_FREQ_HZ)),
        )
        .map_err(|_| BusError::BusUnavailable)?
        .with_sda(res.sda)
        .with_scl(res.scl);
        self.bus.create(transport, config::BUS_CONFIG)?;
        Ok(())
    }

    fn scan(&mut self) -> Result<(), Self::Error> {
        self.report = Some(scan::scan(self.bus)?);
        Ok(())
    }

    fn expander_init(&mut self) -> Result<(), Self::Error> {
        let endpoint = self
            .bus
            .add_device(config::CH422G_I2C_ADDR, config::I2C_FREQ_HZ)?;
        let mut expander = Ch422g::new(endpoint, Delay::new());
        expander.init()?;
        expander.set_all_outputs()?;
        expander.pulse_line(
            ExIo::LcdReset,
            config::LCD_RESET_LOW_MS,
            config::LCD_RESET_SETTLE_MS,
        )?;
        expander.pulse_line(
            ExIo::TouchReset,
            config::TOUCH_RESET_LOW_MS,
            config::TOUCH_RESET_SETTLE_MS,
        )?;
        expander.set_line(ExIo::Backlight, PinState::High)?;
        info!("expander: outputs configured, resets pulsed, backlight on");
        Ok(())
    }

    fn panel_init(&mut self) -> Result<(), Self::Error> {
        self.panel = Some(panel::init(config::PANEL_CONFIG, &mut HeapPool)?);
        Ok(())
    }

    fn display_port_init(&mut self) -> Result<(), Self::Error> {
        let res = self
            .display_res
            .take()
            .ok_or(BoardError::ResourcesConsumed("display"))?;
        let panel = self
            .panel
            .take()
            .ok_or(BoardError::DisplayPort("panel was not initialized"))?;
        let double_buffered = panel.config().double_buffer;

        let display = hardware::initialize_display(res, panel)?;

        let window = MinimalSoftwareWindow::new(if double_buffered {
            RepaintBufferType::SwappedBuffers
        } else {
            RepaintBufferType::ReusedBuffer
        });
        window.set_size(PhysicalSize::new(
            config::BOARD_WIDTH.into(),
            config::BOARD_HEIGHT.into(),
        ));
        slint::platform::set_platform(Box::new(Backend::new(window.clone())))
            .map_err(|_| BoardError::DisplayPort("slint platform already set"))?;

        self.display = Some(display);
        self.window = Some(window);
        Ok(())
    }

    fn touch_init(&mut self) -> Result<(), Self::Error> {
        let res = self
            .touch_res
            .take()
            .ok_or(BoardError::ResourcesConsumed("touch"))?;
        let endpoint = self
            .bus
            .add_device(config::GT911_I2C_ADDR, config::I2C_FREQ_HZ)?;
        self.touchpad = Some(hardware::initialize_touchpad(endpoint, res.irq)?);
        Ok(())
    }
}
