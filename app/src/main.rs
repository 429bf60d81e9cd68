#![no_std]
#![no_main]

use bsp::bringup;
use bsp::bus::BusManager;
use embassy_executor::Spawner;
use embassy_time::Timer;
use esp_alloc::psram_allocator;
use esp_backtrace as _;
use esp_hal::clock::CpuClock;
use esp_hal::timer::timg::TimerGroup;
use esp_hal_embassy::main;
use log::{error, info};
use static_cell::StaticCell;

use crate::board::{BusResources, DisplayResources, TouchResources, WaveshareBoard};
use crate::controller::Controller;
use crate::hardware::I2cBus;
use crate::render_task::render_task;

slint::include_modules!();

extern crate alloc;

mod board;
mod config;
mod controller;
mod hardware;
mod render_task;
mod slint_backend;

esp_bootloader_esp_idf::esp_app_desc!();

static I2C_BUS: StaticCell<BusManager<I2cBus>> = StaticCell::new();

#[main]
async fn main(spawner: Spawner) {
    // Initialize peripherals
    let peripherals = esp_hal::init(esp_hal::Config::default().with_cpu_clock(CpuClock::_240MHz));

    esp_alloc::heap_allocator!(size: 96 * 1024);

    // Framebuffers and the Slint heap live in PSRAM
    psram_allocator!(peripherals.PSRAM, esp_hal::psram);

    esp_println::logger::init_logger_from_env();

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_hal_embassy::init(timg0.timer0);
    info!("Embassy initialized!");

    print_boot_info();

    let bus: &'static BusManager<I2cBus> = I2C_BUS.init(BusManager::new());
    let mut waveshare = WaveshareBoard::new(
        bus,
        BusResources {
            i2c0: peripherals.I2C0,
            sda: peripherals.GPIO8,
            scl: peripherals.GPIO9,
        },
        DisplayResources {
            lcd_cam: peripherals.LCD_CAM,
            dma: peripherals.DMA_CH0,
            pclk: peripherals.GPIO7,
            de: peripherals.GPIO5,
            hsync: peripherals.GPIO46,
            vsync: peripherals.GPIO3,
            d0: peripherals.GPIO14,
            d1: peripherals.GPIO38,
            d2: peripherals.GPIO18,
            d3: peripherals.GPIO17,
            d4: peripherals.GPIO10,
            d5: peripherals.GPIO39,
            d6: peripherals.GPIO0,
            d7: peripherals.GPIO45,
            d8: peripherals.GPIO48,
            d9: peripherals.GPIO47,
            d10: peripherals.GPIO21,
            d11: peripherals.GPIO1,
            d12: peripherals.GPIO2,
            d13: peripherals.GPIO42,
            d14: peripherals.GPIO41,
            d15: peripherals.GPIO40,
        },
        TouchResources {
            irq: peripherals.GPIO4,
        },
    );

    // Dependency-ordered bring-up; on failure the board parks without a
    // render surface or any background task.
    if let Err(failure) = bringup::run(&mut waveshare) {
        error!("hardware bring-up aborted: {failure}");
        loop {
            Timer::after_secs(1).await;
        }
    }

    let runtime = waveshare.into_runtime();

    // TASK: keep the panel fed and poll the touch controller
    spawner
        .spawn(render_task(
            runtime.window.clone(),
            runtime.display,
            runtime.touchpad,
        ))
        .ok();

    // Initialize UI
    let app_window = AppWindow::new().expect("UI init failed");
    app_window.show().expect("UI show failed");

    // run the controller event loop
    let mut controller = Controller::new(&app_window, runtime.scan_devices);
    controller.run().await;
}

/// Boot diagnostics, before any hardware is touched.
fn print_boot_info() {
    info!("=== Waveshare ESP32-S3 Touch LCD 4.3\" boot ===");
    info!("SoC: ESP32-S3 (dual core @ 240 MHz)");
    info!(
        "Display: {}x{} RGB LCD (16-bit RGB565)",
        config::BOARD_WIDTH,
        config::BOARD_HEIGHT
    );
    info!(
        "Touch: GT911 (I2C GPIO{}/{}, IRQ GPIO{})",
        config::I2C_SDA_GPIO,
        config::I2C_SCL_GPIO,
        config::GT911_IRQ_GPIO
    );
    info!("Backlight: CH422G IO expander (EXIO2)");
    info!("{}", esp_alloc::HEAP.stats());
}
