//! PS Move controller support
//!
//! This module provides everything needed to talk to PS Move controllers:
//! - Protocol constants and button bits
//! - Input report parsing
//! - The controller API contract used by sessions and the fleet
//! - A hidapi driver implementing that contract

pub mod api;
pub mod constants;
pub mod hid;
pub mod report;
pub mod types;

// Re-export commonly used items
pub use api::{ApiError, ControllerApi, ControllerHandle};
pub use constants::*;
pub use hid::HidControllerApi;
pub use types::*;
