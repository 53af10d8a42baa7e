//! Mock event device for testing.
//!
//! This backend logs events instead of actually sending them to the OS.
//! Useful for running the daemon and mapping logic without uinput access.

use crate::backend::{BackendError, EventDevice};
use log::info;

/// Mock event device that logs events instead of sending them.
#[derive(Clone, Copy, Debug)]
pub struct MockEventDevice;

impl MockEventDevice {
    /// Create a new mock event device.
    pub fn new() -> Self {
        Self
    }
}

impl Default for MockEventDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl EventDevice for MockEventDevice {
    fn report_move(&self, dx: i32, dy: i32) -> Result<(), BackendError> {
        info!("[MOCK DEVICE] Move relative: dx={}, dy={}", dx, dy);
        Ok(())
    }

    fn report_key(&self, code: u16, pressed: bool) -> Result<(), BackendError> {
        info!("[MOCK DEVICE] Key {}: {}", if pressed { "DOWN" } else { "UP" }, code);
        Ok(())
    }

    fn report_wheel(&self, delta: i32) -> Result<(), BackendError> {
        info!("[MOCK DEVICE] Wheel: {}", delta);
        Ok(())
    }
}
