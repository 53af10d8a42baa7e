//! PS Move HID report encoding and decoding

use crate::psmove::constants::*;
use crate::psmove::types::{Gyroscope, Sample};

/// Decode an offset-binary little-endian 16-bit sensor value
fn decode_16bit(data: &[u8], offset: usize) -> i32 {
    let raw = u16::from_le_bytes([data[offset], data[offset + 1]]);
    i32::from(raw) - 0x8000
}

fn decode_gyro_frame(data: &[u8], offset: usize) -> Gyroscope {
    Gyroscope {
        x: decode_16bit(data, offset),
        y: decode_16bit(data, offset + 2),
        z: decode_16bit(data, offset + 4),
    }
}

/// Decode the button bitmask of an input report
pub fn decode_buttons(data: &[u8]) -> u32 {
    let b1 = u32::from(data[BUTTONS1_OFFSET]);
    let b2 = u32::from(data[BUTTONS2_OFFSET]);
    let b3 = u32::from(data[BUTTONS3_OFFSET]);
    let b4 = u32::from(data[BUTTONS4_OFFSET]);

    b2 | (b1 << 8) | ((b3 & 0x01) << 16) | ((b4 & 0xF0) << 13)
}

/// Parse an input report into a sample.
///
/// Returns `None` for anything that is not a complete input report. The two
/// gyroscope frames carried by each report are averaged.
pub fn parse_input_report(data: &[u8]) -> Option<Sample> {
    if data.len() < GYRO_FRAME2_OFFSET + 6 || data[0] != INPUT_REPORT_ID {
        return None;
    }

    let first = decode_gyro_frame(data, GYRO_FRAME1_OFFSET);
    let second = decode_gyro_frame(data, GYRO_FRAME2_OFFSET);

    Some(Sample {
        buttons: decode_buttons(data),
        gyro: Gyroscope {
            x: (first.x + second.x) / 2,
            y: (first.y + second.y) / 2,
            z: (first.z + second.z) / 2,
        },
        calibrated_gyro: None,
    })
}

/// Build the output report setting the sphere color
pub fn led_report(r: u8, g: u8, b: u8, rumble: u8) -> [u8; REPORT_SIZE] {
    let mut report = [0u8; REPORT_SIZE];
    report[0] = SET_LEDS_REPORT_ID;
    report[2] = r;
    report[3] = g;
    report[4] = b;
    report[6] = rumble;
    report
}

/// Normalise a HID serial number to a colon separated Bluetooth address.
///
/// BlueZ reports the controller address as twelve hex digits, with or
/// without separators.
pub fn normalize_address(serial: &str) -> Option<String> {
    let digits: String = serial
        .chars()
        .filter(|c| c.is_ascii_hexdigit())
        .map(|c| c.to_ascii_lowercase())
        .collect();

    if digits.len() != 12 {
        return None;
    }

    let pairs: Vec<&str> = (0..6).map(|i| &digits[i * 2..i * 2 + 2]).collect();
    Some(pairs.join(":"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report_with(buttons: [u8; 4], gyro1: [i32; 3], gyro2: [i32; 3]) -> Vec<u8> {
        let mut data = vec![0u8; REPORT_SIZE];
        data[0] = INPUT_REPORT_ID;
        data[BUTTONS1_OFFSET..BUTTONS1_OFFSET + 4].copy_from_slice(&buttons);
        for (frame, offset) in [(gyro1, GYRO_FRAME1_OFFSET), (gyro2, GYRO_FRAME2_OFFSET)] {
            for (axis, value) in frame.iter().enumerate() {
                let raw = ((*value + 0x8000) as u16).to_le_bytes();
                data[offset + axis * 2] = raw[0];
                data[offset + axis * 2 + 1] = raw[1];
            }
        }
        data
    }

    #[test]
    fn decodes_face_and_system_buttons() {
        // Triangle + Cross in byte 2, Start in byte 1, PS in byte 3, T in byte 4
        let data = report_with([0x08, 0x50, 0x01, 0x80], [0; 3], [0; 3]);
        let buttons = decode_buttons(&data);

        assert_eq!(buttons, BTN_TRIANGLE | BTN_CROSS | BTN_START | BTN_PS | BTN_T);
    }

    #[test]
    fn decodes_move_button() {
        let data = report_with([0, 0, 0, 0x40], [0; 3], [0; 3]);
        assert_eq!(decode_buttons(&data), BTN_MOVE);
    }

    #[test]
    fn averages_gyro_frames() {
        let data = report_with([0; 4], [100, -200, 30], [110, -220, 10]);
        let sample = parse_input_report(&data).unwrap();

        assert_eq!(sample.gyro, Gyroscope { x: 105, y: -210, z: 20 });
        assert!(sample.calibrated_gyro.is_none());
    }

    #[test]
    fn rejects_short_or_foreign_reports() {
        assert!(parse_input_report(&[INPUT_REPORT_ID; 10]).is_none());

        let mut data = report_with([0; 4], [0; 3], [0; 3]);
        data[0] = 0x10;
        assert!(parse_input_report(&data).is_none());
    }

    #[test]
    fn led_report_layout() {
        let report = led_report(33, 119, 47, 0);
        assert_eq!(report.len(), REPORT_SIZE);
        assert_eq!(&report[..7], &[SET_LEDS_REPORT_ID, 0, 33, 119, 47, 0, 0]);
    }

    #[test]
    fn normalizes_addresses() {
        assert_eq!(normalize_address("00066680A1B2").as_deref(), Some("00:06:66:80:a1:b2"));
        assert_eq!(normalize_address("00:06:66:80:A1:B2").as_deref(), Some("00:06:66:80:a1:b2"));
        assert_eq!(normalize_address("unknown"), None);
    }
}
