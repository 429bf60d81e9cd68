use alloc::format;

use embassy_futures::select::{select, Either};
use embassy_sync::{blocking_mutex::raw::CriticalSectionRawMutex, channel::Channel};
use embassy_time::{Duration, Ticker};
use log::{info, warn};

use crate::AppWindow;

#[derive(Debug, Clone)]
pub enum Action {
    RequestUpdate,
}

type ActionChannelType = Channel<CriticalSectionRawMutex, Action, 2>;

pub static ACTION: ActionChannelType = Channel::new();

/// Owns the UI state: reacts to user actions and refreshes the board
/// stats line periodically. Runs only after bring-up reached `Done`.
pub struct Controller<'a> {
    app_window: &'a AppWindow,
    scan_devices: usize,
}

impl<'a> Controller<'a> {
    pub fn new(app_window: &'a AppWindow, scan_devices: usize) -> Self {
        Self {
            app_window,
            scan_devices,
        }
    }

    pub async fn run(&mut self) {
        self.set_action_event_handlers();
        self.refresh_status();

        let mut ticker = Ticker::every(Duration::from_secs(2));
        loop {
            match select(ACTION.receive(), ticker.next()).await {
                Either::First(action) => {
                    info!("process action {:?}", &action);
                    match action {
                        Action::RequestUpdate => self.refresh_status(),
                    }
                }
                Either::Second(()) => self.refresh_status(),
            }
        }
    }

    fn refresh_status(&self) {
        let text = format!(
            "{} i2c device(s) found | heap: {} B free",
            self.scan_devices,
            esp_alloc::HEAP.free()
        );
        self.app_window.set_status_text(text.into());
    }

    // user initiated action event handlers
    fn set_action_event_handlers(&self) {
        self.app_window
            .on_request_update(|| send_action(Action::RequestUpdate));
    }
}

pub fn send_action(action: Action) {
    // non-blocking send; the UI callbacks run in sync context
    if let Err(action) = ACTION.try_send(action) {
        // the controller is behind; dropping a refresh request is fine
        warn!("user action queue full, could not add: {action:?}");
    }
}
