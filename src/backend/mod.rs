//! Backend abstraction for virtual input device output
//!
//! This module provides a unified interface for sending pointer, key and
//! wheel events to the operating system.

pub mod mock_device;
#[cfg(target_os = "linux")]
pub mod uinput;

pub use mock_device::MockEventDevice;
#[cfg(target_os = "linux")]
pub use uinput::UinputDevice;

use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Backend operation failed: {0}")]
    Operation(String),

    #[error("Unsupported key: {0}")]
    UnsupportedKey(u16),

    #[error("Platform not supported")]
    PlatformNotSupported,
}

impl From<std::io::Error> for BackendError {
    fn from(e: std::io::Error) -> Self {
        BackendError::Operation(e.to_string())
    }
}

/// Virtual keyboard/mouse/wheel sink.
///
/// Every call must be visible to readers of the device as soon as it returns.
pub trait EventDevice: Send + Sync {
    /// Move the pointer relatively by (dx, dy)
    fn report_move(&self, dx: i32, dy: i32) -> Result<(), BackendError>;

    /// Press or release a key/button by Linux input code
    fn report_key(&self, code: u16, pressed: bool) -> Result<(), BackendError>;

    /// Scroll the wheel by `delta` notches
    fn report_wheel(&self, delta: i32) -> Result<(), BackendError>;
}

impl<T: EventDevice + ?Sized> EventDevice for Box<T> {
    fn report_move(&self, dx: i32, dy: i32) -> Result<(), BackendError> {
        (**self).report_move(dx, dy)
    }

    fn report_key(&self, code: u16, pressed: bool) -> Result<(), BackendError> {
        (**self).report_key(code, pressed)
    }

    fn report_wheel(&self, delta: i32) -> Result<(), BackendError> {
        (**self).report_wheel(delta)
    }
}

impl<T: EventDevice + ?Sized> EventDevice for Arc<T> {
    fn report_move(&self, dx: i32, dy: i32) -> Result<(), BackendError> {
        (**self).report_move(dx, dy)
    }

    fn report_key(&self, code: u16, pressed: bool) -> Result<(), BackendError> {
        (**self).report_key(code, pressed)
    }

    fn report_wheel(&self, delta: i32) -> Result<(), BackendError> {
        (**self).report_wheel(delta)
    }
}

/// Create the virtual device for the current platform
#[cfg(target_os = "linux")]
pub fn create_event_device(name: &str, keys: &[u16]) -> Result<Box<dyn EventDevice>, BackendError> {
    Ok(Box::new(UinputDevice::new(name, keys)?))
}

#[cfg(not(target_os = "linux"))]
pub fn create_event_device(_name: &str, _keys: &[u16]) -> Result<Box<dyn EventDevice>, BackendError> {
    Err(BackendError::PlatformNotSupported)
}
