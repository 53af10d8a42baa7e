//! Configuration loader and validator
//!
//! Loads the daemon configuration from a TOML file (default
//! `/etc/psmoveinput.toml`) and turns it into the values the translator,
//! sessions and fleet are built from.

use crate::fleet::FleetSettings;
use crate::mapping::filter::MoveCoefficients;
use crate::mapping::keymap::{KeyMap, KeyTarget, MoveButton};
use crate::mapping::translator::TranslatorSettings;
use crate::psmove::constants::GESTURE_MASK;
use crate::psmove::types::{ControllerSlot, TransportPreference};
use crate::session::SessionTimeouts;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/psmoveinput.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings
    #[serde(default)]
    pub settings: Settings,

    /// Session and fleet timing
    #[serde(default)]
    pub timeouts: Timeouts,

    /// External command used by the disconnect key
    #[serde(default)]
    pub disconnect: DisconnectSettings,

    /// Per-controller key maps
    #[serde(default)]
    pub controllers: ControllerMappings,
}

/// Where controllers are acquired from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpMode {
    /// Controllers paired with the local Bluetooth radio
    #[default]
    Standalone,

    /// Controllers held by an external, always-on connection broker
    Client,
}

impl OpMode {
    pub fn transport_preference(self) -> TransportPreference {
        match self {
            OpMode::Standalone => TransportPreference::LocalOnly,
            OpMode::Client => TransportPreference::RemoteOnly,
        }
    }
}

/// General settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub mode: OpMode,

    /// Default log filter; `RUST_LOG` takes precedence
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Pointer dead zone in pixels
    #[serde(default = "default_move_threshold")]
    pub move_threshold: i32,

    /// Gesture dead zone in pixels
    #[serde(default = "default_gesture_threshold")]
    pub gesture_threshold: i32,

    /// Name of the virtual input device
    #[serde(default = "default_device_name")]
    pub device_name: String,

    #[serde(default)]
    pub move_coefficients: MoveCoefficients,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            mode: OpMode::default(),
            log_level: default_log_level(),
            move_threshold: default_move_threshold(),
            gesture_threshold: default_gesture_threshold(),
            device_name: default_device_name(),
            move_coefficients: MoveCoefficients::default(),
        }
    }
}

fn default_log_level() -> String { "info".to_string() }
fn default_move_threshold() -> i32 { 3 }
fn default_gesture_threshold() -> i32 { 50 }
fn default_device_name() -> String { "PSMove Input Device".to_string() }

/// Timeouts in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timeouts {
    /// Sleep between poll batches
    #[serde(default = "default_poll_ms")]
    pub poll_ms: u64,

    /// Sleep between acquisition attempts
    #[serde(default = "default_connect_ms")]
    pub connect_ms: u64,

    /// Silence after which a session is considered disconnected
    #[serde(default = "default_disconnect_ms")]
    pub disconnect_ms: u64,

    /// LED refresh period
    #[serde(default = "default_led_ms")]
    pub led_ms: u64,

    /// Minimum period between gesture samples
    #[serde(default = "default_gesture_ms")]
    pub gesture_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            poll_ms: default_poll_ms(),
            connect_ms: default_connect_ms(),
            disconnect_ms: default_disconnect_ms(),
            led_ms: default_led_ms(),
            gesture_ms: default_gesture_ms(),
        }
    }
}

fn default_poll_ms() -> u64 { 20 }
fn default_connect_ms() -> u64 { 3000 }
fn default_disconnect_ms() -> u64 { 7000 }
fn default_led_ms() -> u64 { 4000 }
fn default_gesture_ms() -> u64 { 200 }

/// Command run after a disconnect key, with the controller address appended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisconnectSettings {
    #[serde(default = "default_disconnect_command")]
    pub command: Vec<String>,
}

impl Default for DisconnectSettings {
    fn default() -> Self {
        Self {
            command: default_disconnect_command(),
        }
    }
}

fn default_disconnect_command() -> Vec<String> {
    vec!["bluetoothctl".to_string(), "disconnect".to_string()]
}

/// Key maps of both controller slots
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ControllerMappings {
    #[serde(default)]
    pub first: ControllerMapping,

    #[serde(default)]
    pub second: ControllerMapping,
}

/// Button name -> target name
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ControllerMapping {
    #[serde(default)]
    pub buttons: HashMap<MoveButton, String>,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        info!("Loading configuration from: {}", path_ref.display());

        let content = std::fs::read_to_string(path_ref)?;
        let config = Self::from_toml(&content)?;
        info!("✓ Config validation passed");

        Ok(config)
    }

    /// Parse and validate configuration text
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;

        debug!("  - Mode: {:?}", config.settings.mode);
        debug!("  - First controller: {} mapped buttons", config.controllers.first.buttons.len());
        debug!("  - Second controller: {} mapped buttons", config.controllers.second.buttons.len());
        debug!("  - Timeouts: {:?}", config.timeouts);

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let s = &self.settings;
        if s.move_threshold < 0 {
            return Err(ConfigError::Invalid("move_threshold must not be negative".into()));
        }
        if s.gesture_threshold < 0 {
            return Err(ConfigError::Invalid("gesture_threshold must not be negative".into()));
        }
        if !s.move_coefficients.cx.is_finite() || !s.move_coefficients.cy.is_finite() {
            return Err(ConfigError::Invalid("move_coefficients must be finite numbers".into()));
        }

        let t = &self.timeouts;
        for (name, value) in [
            ("poll_ms", t.poll_ms),
            ("connect_ms", t.connect_ms),
            ("disconnect_ms", t.disconnect_ms),
            ("led_ms", t.led_ms),
            ("gesture_ms", t.gesture_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::Invalid(format!("timeouts.{} must be positive", name)));
            }
        }
        if t.poll_ms > t.led_ms || t.poll_ms > t.gesture_ms {
            return Err(ConfigError::Invalid(
                "timeouts.poll_ms must not exceed led_ms or gesture_ms".into(),
            ));
        }

        for slot in ControllerSlot::ALL {
            let map = self.key_map(slot)?;
            self.warn_unused_targets(slot, &map);
        }

        if self.disconnect.command.is_empty() {
            warn!("No disconnect command configured; disconnect keys only stop the sessions");
        }

        Ok(())
    }

    /// Meta-keys that have no effect on the slot they are mapped on
    fn warn_unused_targets(&self, slot: ControllerSlot, map: &KeyMap) {
        let buttons = &self.mapping(slot).buttons;
        match slot {
            ControllerSlot::First => {
                if map.contains(KeyTarget::GestureTrigger) {
                    warn!("gesture_trigger on the first controller has no effect");
                }
                if buttons.keys().any(|b| b.bit() & GESTURE_MASK != 0) {
                    warn!("Gesture buttons on the first controller never fire");
                }
            }
            ControllerSlot::Second => {
                if map.contains(KeyTarget::MoveTrigger) {
                    warn!("move_trigger on the second controller has no effect");
                }
            }
        }
    }

    fn mapping(&self, slot: ControllerSlot) -> &ControllerMapping {
        match slot {
            ControllerSlot::First => &self.controllers.first,
            ControllerSlot::Second => &self.controllers.second,
        }
    }

    /// Key map of one controller slot
    pub fn key_map(&self, slot: ControllerSlot) -> Result<KeyMap, ConfigError> {
        KeyMap::from_names(&self.mapping(slot).buttons)
            .map_err(|e| ConfigError::Invalid(format!("{:?} controller: {}", slot, e)))
    }

    /// Key codes of both key maps, for registering device capabilities
    pub fn output_keys(&self) -> Result<Vec<u16>, ConfigError> {
        let mut keys = Vec::new();
        for slot in ControllerSlot::ALL {
            keys.extend(self.key_map(slot)?.output_keys());
        }
        keys.sort_unstable();
        keys.dedup();
        Ok(keys)
    }

    pub fn translator_settings(&self) -> TranslatorSettings {
        TranslatorSettings {
            coefficients: self.settings.move_coefficients,
            move_threshold: self.settings.move_threshold,
            gesture_threshold: self.settings.gesture_threshold,
        }
    }

    pub fn session_timeouts(&self) -> SessionTimeouts {
        SessionTimeouts {
            poll: Duration::from_millis(self.timeouts.poll_ms),
            disconnect: Duration::from_millis(self.timeouts.disconnect_ms),
            led: Duration::from_millis(self.timeouts.led_ms),
            gesture: Duration::from_millis(self.timeouts.gesture_ms),
        }
    }

    pub fn fleet_settings(&self) -> FleetSettings {
        FleetSettings {
            transport: self.settings.mode.transport_preference(),
            connect_timeout: Duration::from_millis(self.timeouts.connect_ms),
            session_timeouts: self.session_timeouts(),
            disconnect_command: self.disconnect.command.clone(),
        }
    }
}
