//! PS Move protocol constants
//!
//! This module contains all the constants needed for PS Move communication:
//! - HID identification
//! - Input/output report layout
//! - Button bits (real buttons and gesture pseudo-buttons)
//! - Indicator colors and gyro scaling

// ============================================================================
// HID Discovery Constants
// ============================================================================

/// Sony Corp. USB/Bluetooth vendor ID
pub const SONY_VENDOR_ID: u16 = 0x054C;

/// PS Move motion controller (CECH-ZCM1) product ID
pub const PSMOVE_PRODUCT_ID: u16 = 0x03D5;

/// Maximum number of simultaneously handled controllers
pub const MAX_CONTROLLERS: usize = 2;

// ============================================================================
// Report Layout
// ============================================================================

/// Size of both input and output reports, report ID included
pub const REPORT_SIZE: usize = 49;

/// Input report ID (buttons + sensors)
pub const INPUT_REPORT_ID: u8 = 0x01;

/// Output report ID for setting the sphere LED and rumble
pub const SET_LEDS_REPORT_ID: u8 = 0x06;

/// Offsets of the four button bytes within the input report
pub const BUTTONS1_OFFSET: usize = 1;
pub const BUTTONS2_OFFSET: usize = 2;
pub const BUTTONS3_OFFSET: usize = 3;
pub const BUTTONS4_OFFSET: usize = 4;

/// Gyroscope frames (X, Y, Z little-endian offset-binary 16-bit each)
pub const GYRO_FRAME1_OFFSET: usize = 25;
pub const GYRO_FRAME2_OFFSET: usize = 31;

// ============================================================================
// Button Bits
// ============================================================================

pub const BTN_TRIANGLE: u32 = 1 << 4;
pub const BTN_CIRCLE: u32 = 1 << 5;
pub const BTN_CROSS: u32 = 1 << 6;
pub const BTN_SQUARE: u32 = 1 << 7;
pub const BTN_SELECT: u32 = 1 << 8;
pub const BTN_START: u32 = 1 << 11;
pub const BTN_PS: u32 = 1 << 16;
pub const BTN_MOVE: u32 = 1 << 19;
pub const BTN_T: u32 = 1 << 20;

/// All bits a physical controller can report
pub const BUTTON_MASK: u32 = BTN_TRIANGLE
    | BTN_CIRCLE
    | BTN_CROSS
    | BTN_SQUARE
    | BTN_SELECT
    | BTN_START
    | BTN_PS
    | BTN_MOVE
    | BTN_T;

// Gesture pseudo-buttons share the bitmask space with real buttons, above
// the highest hardware bit so the two never collide.
pub const GESTURE_UP: u32 = 1 << 24;
pub const GESTURE_DOWN: u32 = 1 << 25;
pub const GESTURE_LEFT: u32 = 1 << 26;
pub const GESTURE_RIGHT: u32 = 1 << 27;

pub const GESTURE_MASK: u32 = GESTURE_UP | GESTURE_DOWN | GESTURE_LEFT | GESTURE_RIGHT;

/// Highest bit the edge detector has to look at
pub const MAX_BUTTON_BIT: u32 = GESTURE_RIGHT;

// ============================================================================
// Indicator & Sensor Constants
// ============================================================================

/// Sphere color of the pointer controller
pub const FIRST_LED_COLOR: (u8, u8, u8) = (33, 119, 47);

/// Sphere color of the gesture controller
pub const SECOND_LED_COLOR: (u8, u8, u8) = (123, 59, 160);

/// Calibrated gyro readings (rad/s) are multiplied by this before truncation
/// to integers so small movements are not lost
pub const CALIBRATED_GYRO_SCALE: f32 = 10.0;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gesture_bits_do_not_collide_with_buttons() {
        assert_eq!(BUTTON_MASK & GESTURE_MASK, 0);
        assert!(MAX_BUTTON_BIT > BTN_T);
        assert_eq!(MAX_BUTTON_BIT & GESTURE_MASK, MAX_BUTTON_BIT);
    }
}
