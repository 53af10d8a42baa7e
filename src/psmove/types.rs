//! PS Move type definitions
//!
//! This module defines the basic data types used throughout the psmove module,
//! including sensor samples, transports and controller slots.

use crate::psmove::constants::{FIRST_LED_COLOR, SECOND_LED_COLOR};
use serde::{Deserialize, Serialize};

/// Raw gyroscope reading (sensor units, zero-centred)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gyroscope {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

/// Calibrated gyroscope reading (rad/s)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CalibratedGyroscope {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// One input report worth of controller data
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Sample {
    /// Button bitmask (see `constants::BTN_*`)
    pub buttons: u32,

    /// Raw gyroscope values
    pub gyro: Gyroscope,

    /// Calibrated gyroscope values, present only for calibrated controllers
    pub calibrated_gyro: Option<CalibratedGyroscope>,
}

/// How a controller is attached to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Wireless,
    Wired,
}

/// Which connections the controller API is allowed to look at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportPreference {
    /// Only controllers paired with the local radio
    LocalOnly,

    /// Only controllers served by an external connection broker
    RemoteOnly,
}

/// Logical controller identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControllerSlot {
    /// Pointer controller
    First,

    /// Gesture controller
    Second,
}

impl ControllerSlot {
    pub const ALL: [ControllerSlot; 2] = [ControllerSlot::First, ControllerSlot::Second];

    pub fn index(self) -> usize {
        match self {
            ControllerSlot::First => 0,
            ControllerSlot::Second => 1,
        }
    }

    /// Sphere color shown while a session owns this slot
    pub fn led_color(self) -> (u8, u8, u8) {
        match self {
            ControllerSlot::First => FIRST_LED_COLOR,
            ControllerSlot::Second => SECOND_LED_COLOR,
        }
    }
}
