use alloc::vec::Vec;

use embedded_hal::i2c::I2c;
use log::{info, warn};

use crate::bus::{BusError, BusManager, EndpointError};

/// First probed address.
pub const SCAN_FIRST: u8 = 0x01;
/// Last probed address; the sweep covers the reserved tail as well, the
/// bus manager simply refuses to bind endpoints there.
pub const SCAN_LAST: u8 = 0x7E;
/// Probe speed for transient scan endpoints.
pub const SCAN_SPEED_HZ: u32 = 400_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanEntry {
    pub address: u8,
    pub name: &'static str,
}

/// Devices found by one sweep, in address order. Valid only for the
/// sweep that produced it; an empty report is a result, not an error.
#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    pub entries: Vec<ScanEntry>,
}

impl ScanReport {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Known addresses on this board.
pub fn classify(address: u8) -> Option<&'static str> {
    match address {
        0x5D | 0x14 => Some("GT911 (Touch)"),
        0x20 => Some("CH422G (IO Expander)"),
        _ => None,
    }
}

/// Probe every address on the bus with a one-byte read.
///
/// NACKs and timeouts mean absence, never failure; a single dead address
/// must not stop the sweep. The transient endpoint is released on every
/// path. Only the loss of the bus itself propagates.
pub fn scan<I2C>(bus: &BusManager<I2C>) -> Result<ScanReport, BusError>
where
    I2C: I2c,
{
    info!("i2c scan starting...");
    let mut report = ScanReport::default();

    for address in SCAN_FIRST..=SCAN_LAST {
        let mut endpoint = match bus.add_device(address, SCAN_SPEED_HZ) {
            Ok(endpoint) => endpoint,
            Err(BusError::NotInitialized) => return Err(BusError::NotInitialized),
            // reserved address, nothing can live there
            Err(_) => continue,
        };

        let mut probe = [0u8; 1];
        let present = match endpoint.read(&mut probe) {
            Ok(()) => true,
            Err(EndpointError::Transport(_)) => false,
            Err(EndpointError::Bus(err)) => return Err(err),
        };
        endpoint.release();

        if present {
            let name = classify(address).unwrap_or("Unknown");
            info!("  found device at 0x{address:02X} ({name})");
            report.entries.push(ScanEntry { address, name });
        }
    }

    if report.is_empty() {
        warn!("no i2c devices found, check wiring and pull-ups");
    } else {
        info!("i2c scan complete: {} device(s) found", report.len());
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::BusConfig;
    use crate::testutil::FakeBus;

    const CONFIG: BusConfig = BusConfig {
        sda: 8,
        scl: 9,
        frequency_hz: 400_000,
        glitch_filter_cycles: 7,
        timeout_ms: 100,
    };

    fn manager_with(devices: &[u8]) -> BusManager<FakeBus> {
        let manager = BusManager::new();
        manager.create(FakeBus::with_devices(devices), CONFIG).unwrap();
        manager
    }

    #[test]
    fn all_nack_bus_yields_empty_report_without_error() {
        let manager = manager_with(&[]);
        let report = scan(&manager).unwrap();
        assert_eq!(report.len(), 0);
        assert!(report.is_empty());
    }

    #[test]
    fn found_devices_are_classified_in_address_order() {
        let manager = manager_with(&[0x5D, 0x20]);
        let report = scan(&manager).unwrap();
        assert_eq!(
            report.entries,
            vec![
                ScanEntry {
                    address: 0x20,
                    name: "CH422G (IO Expander)",
                },
                ScanEntry {
                    address: 0x5D,
                    name: "GT911 (Touch)",
                },
            ]
        );
    }

    #[test]
    fn unknown_devices_are_reported_as_unknown() {
        let manager = manager_with(&[0x42]);
        let report = scan(&manager).unwrap();
        assert_eq!(report.entries[0].name, "Unknown");
    }

    #[test]
    fn alternate_touch_address_is_classified() {
        assert_eq!(classify(0x14), Some("GT911 (Touch)"));
    }

    #[test]
    fn scan_without_bus_propagates_not_initialized() {
        let manager: BusManager<FakeBus> = BusManager::new();
        assert_eq!(scan(&manager).err(), Some(BusError::NotInitialized));
    }

    #[test]
    fn reserved_tail_is_swept_but_never_bound() {
        // a device parked on a reserved address never gets an endpoint
        let manager = manager_with(&[0x7C]);
        let report = scan(&manager).unwrap();
        assert!(report.is_empty());
    }
}
