//! Controller API contract
//!
//! The fleet and its sessions only talk to controllers through these two
//! traits, so the HID driver can be swapped for a scripted one in tests.

use crate::psmove::types::{Sample, Transport, TransportPreference};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HID API error: {0}")]
    Hid(#[from] hidapi::HidError),

    #[error("Unsupported: {0}")]
    Unsupported(String),
}

/// One claimed physical controller connection
pub trait ControllerHandle: Send {
    /// Drain every sample currently available. An empty result means
    /// nothing was ready; read failures are reported the same way.
    fn poll_samples(&mut self) -> Vec<Sample>;

    /// How the controller is attached
    fn transport(&self) -> Transport;

    /// Bluetooth address, used for explicit disconnect requests
    fn hardware_address(&self) -> String;

    /// Whether `Sample::calibrated_gyro` is populated
    fn has_calibration(&self) -> bool;

    /// Set the sphere color (sent on the next refresh)
    fn set_indicator_color(&mut self, r: u8, g: u8, b: u8);

    /// Re-send the current sphere color; the controller turns the LED off
    /// if it is not refreshed periodically
    fn refresh_indicator(&mut self) -> Result<(), ApiError>;

    /// Release the connection
    fn disconnect(&mut self);

    /// Close a second handle to a controller another session already
    /// owns, without touching the controller itself
    fn release(&mut self) {
        self.disconnect();
    }
}

/// Global controller discovery
pub trait ControllerApi {
    /// Restrict which connections `claim` considers
    fn set_transport_preference(&mut self, preference: TransportPreference) -> Result<(), ApiError>;

    /// Try to open the controller with the given enumeration id.
    /// `Ok(None)` means no controller is present at that id.
    fn claim(&mut self, id: usize) -> Result<Option<Box<dyn ControllerHandle>>, ApiError>;
}
