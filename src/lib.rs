//! psmove-input: PlayStation Move to Keyboard/Mouse Bridge
//!
//! This library turns up to two PS Move motion controllers into a virtual
//! keyboard/mouse/wheel device: gyroscope motion drives the pointer (first
//! controller) or directional gestures (second controller), and buttons are
//! mapped to key presses through per-controller key maps.

pub mod backend;
pub mod fleet;
pub mod mapping;
pub mod psmove;
pub mod session;

#[cfg(test)]
mod test_support;

// Re-export commonly used items
pub use backend::{EventDevice, MockEventDevice};
pub use fleet::{ControllerFleet, DisconnectRequest, FleetHandle, FleetSettings};
pub use mapping::{Config, InputSink, InputTranslator, KeyMap, KeyTarget, TranslatorSettings};
pub use psmove::{ControllerApi, ControllerHandle, ControllerSlot, HidControllerApi};
pub use session::{ControllerSession, SessionTimeouts};
