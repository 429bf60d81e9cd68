use alloc::rc::Rc;
use alloc::vec::Vec;

use embassy_time::Timer;
use esp_hal::dma::DmaTxBuf;
use log::warn;
use slint::platform::software_renderer::{LineBufferProvider, MinimalSoftwareWindow, Rgb565Pixel};
use slint::platform::{PointerEventButton, WindowEvent};
use slint::LogicalPosition;

use crate::config::BOARD_WIDTH;
use crate::hardware::{DisplayPort, Touchpad};

/// Renders dirty lines into the back framebuffer and keeps the panel
/// fed: an RGB panel has no memory of its own, so every loop iteration
/// pushes a full frame over DPI, dirty or not.
#[embassy_executor::task]
pub async fn render_task(
    window: Rc<MinimalSoftwareWindow>,
    display: DisplayPort,
    mut touchpad: Touchpad,
) {
    let DisplayPort { dpi, frames } = display;
    let mut dpi = Some(dpi);
    let mut frames: Vec<DmaTxBuf> = frames;

    let line_buffer = &mut [Rgb565Pixel(0); BOARD_WIDTH as usize];
    let mut last_touch: Option<LogicalPosition> = None;

    loop {
        // Update timers and animations
        slint::platform::update_timers_and_animations();

        // process touchscreen events
        process_touch(&mut touchpad, &mut last_touch, window.clone());

        // draw into the back buffer (the last frame in the queue)
        let back = frames.last_mut().expect("framebuffer missing");
        window.draw_if_needed(|renderer| {
            renderer.render_by_line(FrameSurface {
                frame: back.as_mut_slice(),
                line_buffer: &mut line_buffer[..],
            });
        });

        // push the frame; wait() blocks until the panel has consumed it,
        // then the buffer rotates to the front of the queue
        let frame = frames.pop().expect("framebuffer missing");
        match dpi.take().expect("dpi missing").send(false, frame) {
            Ok(transfer) => {
                let (result, returned_dpi, returned_frame) = transfer.wait();
                if result.is_err() {
                    warn!("frame transfer ended with a dma error");
                }
                dpi = Some(returned_dpi);
                frames.insert(0, returned_frame);
            }
            Err((_, returned_dpi, returned_frame)) => {
                warn!("frame transfer could not be started");
                dpi = Some(returned_dpi);
                frames.insert(0, returned_frame);
            }
        }

        Timer::after_millis(5).await;
    }
}

/// Line renderer writing RGB565 little-endian into one framebuffer.
struct FrameSurface<'a, 'b> {
    frame: &'a mut [u8],
    line_buffer: &'b mut [Rgb565Pixel],
}

impl LineBufferProvider for FrameSurface<'_, '_> {
    type TargetPixel = Rgb565Pixel;

    fn process_line(
        &mut self,
        line: usize,
        range: core::ops::Range<usize>,
        render_fn: impl FnOnce(&mut [Self::TargetPixel]),
    ) {
        let pixels = &mut self.line_buffer[range.clone()];
        render_fn(pixels);

        let row = line * usize::from(BOARD_WIDTH);
        for (pixel, offset) in pixels.iter().zip(range) {
            let bytes = pixel.0.to_le_bytes();
            let at = (row + offset) * 2;
            self.frame[at] = bytes[0];
            self.frame[at + 1] = bytes[1];
        }
    }
}

fn process_touch(
    touch: &mut Touchpad,
    last_touch: &mut Option<LogicalPosition>,
    window: Rc<MinimalSoftwareWindow>,
) {
    // The IRQ line pulses low while samples are pending; skip the bus
    // round-trip otherwise.
    match touch.is_touch_available() {
        Ok(true) => {}
        Ok(false) => return,
        Err(e) => {
            warn!("touch availability check failed: {e}");
            return;
        }
    }

    let button = PointerEventButton::Left;
    let event = match touch.read_touch() {
        Ok(Some(point)) => {
            let position = LogicalPosition::new(point.x as f32, point.y as f32);
            let event = if last_touch.is_some() {
                WindowEvent::PointerMoved { position }
            } else {
                WindowEvent::PointerPressed { position, button }
            };
            last_touch.replace(position);
            Some(event)
        }
        Ok(None) => last_touch
            .take()
            .map(|position| WindowEvent::PointerReleased { position, button }),
        Err(e) => {
            warn!("touch read error: {e}");
            None
        }
    };

    if let Some(event) = event {
        if let Err(e) = window.try_dispatch_event(event) {
            warn!("touch event dispatch failed: {e}");
        }
    }
}
