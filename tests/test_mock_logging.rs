//! Test to verify the mock device and translator log output correctly

use psmove_input::backend::EventDevice;
use psmove_input::psmove::BTN_START;
use psmove_input::{ControllerSlot, InputSink, InputTranslator, KeyMap, MockEventDevice, TranslatorSettings};

#[test]
fn test_mock_device_logs() {
    // Initialize a simple logger for testing
    let _ = env_logger::builder()
        .is_test(true)
        .filter_level(log::LevelFilter::Info)
        .try_init();

    let device = MockEventDevice::new();

    // These should log at info level (visible with RUST_LOG=info)
    assert!(device.report_move(10, -5).is_ok());
    assert!(device.report_key(28, true).is_ok());
    assert!(device.report_key(28, false).is_ok());
    assert!(device.report_wheel(-1).is_ok());
}

#[test]
fn test_translator_logs_unmapped_input() {
    let _ = env_logger::builder()
        .is_test(true)
        .filter_level(log::LevelFilter::Trace)
        .try_init();

    let translator = InputTranslator::new(
        MockEventDevice::new(),
        KeyMap::default(),
        KeyMap::default(),
        TranslatorSettings::default(),
    );

    // Unmapped buttons are tracked but produce no device events
    translator.on_buttons(BTN_START, ControllerSlot::Second);
    assert_eq!(translator.buttons(ControllerSlot::Second), BTN_START);
    translator.on_gesture(500, -500);
    translator.reset();
}
