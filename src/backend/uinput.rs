//! Linux uinput virtual device backend.
//!
//! Creates one virtual device exposing relative X/Y/wheel axes and the key
//! codes used by the key maps. Each report is written as a single batch
//! terminated by SYN_REPORT, so readers see it immediately.

use crate::backend::{BackendError, EventDevice};
use crate::psmove::constants::{PSMOVE_PRODUCT_ID, SONY_VENDOR_ID};
use evdev::uinput::{VirtualDevice, VirtualDeviceBuilder};
use evdev::{AttributeSet, BusType, EventType, InputEvent, InputId, Key, RelativeAxisType};
use log::{debug, info, trace};
use std::collections::HashSet;
use std::sync::Mutex;

pub struct UinputDevice {
    device: Mutex<VirtualDevice>,
    /// Key codes registered as capabilities
    keys: HashSet<u16>,
}

impl UinputDevice {
    /// Create the virtual device, registering `keys` as its key capabilities
    pub fn new(name: &str, keys: &[u16]) -> Result<Self, BackendError> {
        let mut key_set = AttributeSet::<Key>::new();
        for &code in keys {
            key_set.insert(Key::new(code));
        }

        let mut axes = AttributeSet::<RelativeAxisType>::new();
        axes.insert(RelativeAxisType::REL_X);
        axes.insert(RelativeAxisType::REL_Y);
        axes.insert(RelativeAxisType::REL_WHEEL);

        let device = VirtualDeviceBuilder::new()?
            .name(name)
            .input_id(InputId::new(BusType::BUS_BLUETOOTH, SONY_VENDOR_ID, PSMOVE_PRODUCT_ID, 1))
            .with_keys(&key_set)?
            .with_relative_axes(&axes)?
            .build()?;

        info!("✓ Created uinput device '{}' with {} keys", name, keys.len());
        for code in keys {
            debug!("  registered key code {}", code);
        }

        Ok(Self {
            device: Mutex::new(device),
            keys: keys.iter().copied().collect(),
        })
    }

    fn emit(&self, events: &[InputEvent]) -> Result<(), BackendError> {
        let mut device = self
            .device
            .lock()
            .map_err(|_| BackendError::Operation("uinput device lock poisoned".into()))?;
        device.emit(events)?;
        Ok(())
    }
}

impl EventDevice for UinputDevice {
    fn report_move(&self, dx: i32, dy: i32) -> Result<(), BackendError> {
        if dx == 0 && dy == 0 {
            return Ok(());
        }
        let mut events = Vec::with_capacity(2);
        if dx != 0 {
            events.push(InputEvent::new(EventType::RELATIVE, RelativeAxisType::REL_X.0, dx));
        }
        if dy != 0 {
            events.push(InputEvent::new(EventType::RELATIVE, RelativeAxisType::REL_Y.0, dy));
        }
        trace!("uinput move ({}, {})", dx, dy);
        self.emit(&events)
    }

    fn report_key(&self, code: u16, pressed: bool) -> Result<(), BackendError> {
        if !self.keys.contains(&code) {
            return Err(BackendError::UnsupportedKey(code));
        }
        trace!("uinput key {} {}", code, pressed);
        self.emit(&[InputEvent::new(EventType::KEY, code, i32::from(pressed))])
    }

    fn report_wheel(&self, delta: i32) -> Result<(), BackendError> {
        trace!("uinput wheel {}", delta);
        self.emit(&[InputEvent::new(EventType::RELATIVE, RelativeAxisType::REL_WHEEL.0, delta)])
    }
}
