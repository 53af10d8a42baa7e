//! PS Move connection management over hidapi
//!
//! This module finds PS Move controllers among the HID devices known to the
//! host, opens them, and implements the controller API contract on top of
//! raw input/output reports.

use crate::psmove::api::{ApiError, ControllerApi, ControllerHandle};
use crate::psmove::constants::*;
use crate::psmove::report::{led_report, normalize_address, parse_input_report};
use crate::psmove::types::{Sample, Transport, TransportPreference};
use hidapi::{BusType, HidApi, HidDevice};
use log::{debug, info, trace, warn};

/// Controller API backed by the local HID stack
pub struct HidControllerApi {
    api: HidApi,
    preference: TransportPreference,
}

impl HidControllerApi {
    /// Initialise the HID library
    pub fn new() -> Result<Self, ApiError> {
        let api = HidApi::new()?;
        Ok(Self {
            api,
            preference: TransportPreference::LocalOnly,
        })
    }
}

impl ControllerApi for HidControllerApi {
    fn set_transport_preference(&mut self, preference: TransportPreference) -> Result<(), ApiError> {
        self.preference = preference;
        match preference {
            TransportPreference::LocalOnly => Ok(()),
            TransportPreference::RemoteOnly => Err(ApiError::Unsupported(
                "the HID driver cannot reach controllers served by a remote broker".into(),
            )),
        }
    }

    fn claim(&mut self, id: usize) -> Result<Option<Box<dyn ControllerHandle>>, ApiError> {
        if self.preference == TransportPreference::RemoteOnly {
            return Ok(None);
        }

        self.api.refresh_devices()?;

        // Sort by path so ids stay stable between refreshes
        let mut candidates: Vec<_> = self
            .api
            .device_list()
            .filter(|d| d.vendor_id() == SONY_VENDOR_ID && d.product_id() == PSMOVE_PRODUCT_ID)
            .collect();
        candidates.sort_by(|a, b| a.path().cmp(b.path()));

        let Some(info) = candidates.get(id) else {
            trace!("No PS Move at id {}", id);
            return Ok(None);
        };

        let transport = match info.bus_type() {
            BusType::Bluetooth => Transport::Wireless,
            _ => Transport::Wired,
        };
        let serial = info.serial_number().unwrap_or_default();
        let address = normalize_address(serial).unwrap_or_else(|| serial.to_string());

        let device = info.open_device(&self.api)?;
        info!("✓ Opened PS Move #{} ({:?}, address {})", id, transport, address);

        Ok(Some(Box::new(HidController {
            device: Some(device),
            transport,
            address,
            color: (0, 0, 0),
        })))
    }
}

/// One opened PS Move
pub struct HidController {
    device: Option<HidDevice>,
    transport: Transport,
    address: String,
    color: (u8, u8, u8),
}

impl ControllerHandle for HidController {
    fn poll_samples(&mut self) -> Vec<Sample> {
        let Some(device) = self.device.as_ref() else {
            return Vec::new();
        };

        let mut samples = Vec::new();
        let mut buf = [0u8; REPORT_SIZE];
        loop {
            match device.read_timeout(&mut buf, 0) {
                Ok(0) => break,
                Ok(len) => {
                    if let Some(sample) = parse_input_report(&buf[..len]) {
                        samples.push(sample);
                    }
                }
                Err(e) => {
                    debug!("PS Move {} read failed: {}", self.address, e);
                    break;
                }
            }
        }
        samples
    }

    fn transport(&self) -> Transport {
        self.transport
    }

    fn hardware_address(&self) -> String {
        self.address.clone()
    }

    fn has_calibration(&self) -> bool {
        // Calibration blobs are only readable over USB; wireless sessions use raw values
        false
    }

    fn set_indicator_color(&mut self, r: u8, g: u8, b: u8) {
        self.color = (r, g, b);
    }

    fn refresh_indicator(&mut self) -> Result<(), ApiError> {
        let Some(device) = self.device.as_ref() else {
            return Ok(());
        };
        let (r, g, b) = self.color;
        device.write(&led_report(r, g, b, 0))?;
        Ok(())
    }

    fn disconnect(&mut self) {
        if let Some(device) = self.device.take() {
            // Switch the sphere off before letting go
            if let Err(e) = device.write(&led_report(0, 0, 0, 0)) {
                warn!("Failed to switch off LED of {}: {}", self.address, e);
            }
            info!("Released PS Move {}", self.address);
        }
    }

    fn release(&mut self) {
        // Dropping the device closes this handle only; no LED write
        if self.device.take().is_some() {
            debug!("Closed duplicate handle of PS Move {}", self.address);
        }
    }
}

impl Drop for HidController {
    fn drop(&mut self) {
        self.disconnect();
    }
}
