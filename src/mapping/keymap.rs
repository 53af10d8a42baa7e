//! Button to key mapping
//!
//! A key map translates controller button bits into output key codes or
//! meta-keys. Key maps are built once from configuration and never change.

use crate::psmove::constants::*;
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use thiserror::Error;

/// Controller buttons (and gesture pseudo-buttons) that can be mapped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MoveButton {
    Triangle,
    Circle,
    Cross,
    Square,
    Select,
    Start,
    Ps,
    Move,
    T,
    GestureUp,
    GestureDown,
    GestureLeft,
    GestureRight,
}

impl MoveButton {
    /// Bit of this button in the bitmask space
    pub fn bit(self) -> u32 {
        match self {
            MoveButton::Triangle => BTN_TRIANGLE,
            MoveButton::Circle => BTN_CIRCLE,
            MoveButton::Cross => BTN_CROSS,
            MoveButton::Square => BTN_SQUARE,
            MoveButton::Select => BTN_SELECT,
            MoveButton::Start => BTN_START,
            MoveButton::Ps => BTN_PS,
            MoveButton::Move => BTN_MOVE,
            MoveButton::T => BTN_T,
            MoveButton::GestureUp => GESTURE_UP,
            MoveButton::GestureDown => GESTURE_DOWN,
            MoveButton::GestureLeft => GESTURE_LEFT,
            MoveButton::GestureRight => GESTURE_RIGHT,
        }
    }
}

/// What a mapped button produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyTarget {
    /// Linux input key/button code, forwarded to the device
    Key(u16),

    /// Drop every session and force the transport to release this controller
    Disconnect,

    /// Pointer movement is only forwarded while held
    MoveTrigger,

    /// Gestures are only recognised while held
    GestureTrigger,

    /// One wheel notch up on press
    WheelUp,

    /// One wheel notch down on press
    WheelDown,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown key name '{0}'")]
pub struct UnknownKey(pub String);

impl FromStr for KeyTarget {
    type Err = UnknownKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        match name {
            "disconnect" => Ok(KeyTarget::Disconnect),
            "move_trigger" => Ok(KeyTarget::MoveTrigger),
            "gesture_trigger" => Ok(KeyTarget::GestureTrigger),
            "wheel_up" => Ok(KeyTarget::WheelUp),
            "wheel_down" => Ok(KeyTarget::WheelDown),
            _ => key_code(name)
                .map(KeyTarget::Key)
                .ok_or_else(|| UnknownKey(name.to_string())),
        }
    }
}

/// Linux input key names accepted in configuration files
const KEY_NAMES: &[(&str, u16)] = &[
    ("KEY_ESC", 1),
    ("KEY_1", 2),
    ("KEY_2", 3),
    ("KEY_3", 4),
    ("KEY_4", 5),
    ("KEY_5", 6),
    ("KEY_6", 7),
    ("KEY_7", 8),
    ("KEY_8", 9),
    ("KEY_9", 10),
    ("KEY_0", 11),
    ("KEY_MINUS", 12),
    ("KEY_EQUAL", 13),
    ("KEY_BACKSPACE", 14),
    ("KEY_TAB", 15),
    ("KEY_Q", 16),
    ("KEY_W", 17),
    ("KEY_E", 18),
    ("KEY_R", 19),
    ("KEY_T", 20),
    ("KEY_Y", 21),
    ("KEY_U", 22),
    ("KEY_I", 23),
    ("KEY_O", 24),
    ("KEY_P", 25),
    ("KEY_LEFTBRACE", 26),
    ("KEY_RIGHTBRACE", 27),
    ("KEY_ENTER", 28),
    ("KEY_LEFTCTRL", 29),
    ("KEY_A", 30),
    ("KEY_S", 31),
    ("KEY_D", 32),
    ("KEY_F", 33),
    ("KEY_G", 34),
    ("KEY_H", 35),
    ("KEY_J", 36),
    ("KEY_K", 37),
    ("KEY_L", 38),
    ("KEY_SEMICOLON", 39),
    ("KEY_APOSTROPHE", 40),
    ("KEY_GRAVE", 41),
    ("KEY_LEFTSHIFT", 42),
    ("KEY_BACKSLASH", 43),
    ("KEY_Z", 44),
    ("KEY_X", 45),
    ("KEY_C", 46),
    ("KEY_V", 47),
    ("KEY_B", 48),
    ("KEY_N", 49),
    ("KEY_M", 50),
    ("KEY_COMMA", 51),
    ("KEY_DOT", 52),
    ("KEY_SLASH", 53),
    ("KEY_RIGHTSHIFT", 54),
    ("KEY_KPASTERISK", 55),
    ("KEY_LEFTALT", 56),
    ("KEY_SPACE", 57),
    ("KEY_CAPSLOCK", 58),
    ("KEY_F1", 59),
    ("KEY_F2", 60),
    ("KEY_F3", 61),
    ("KEY_F4", 62),
    ("KEY_F5", 63),
    ("KEY_F6", 64),
    ("KEY_F7", 65),
    ("KEY_F8", 66),
    ("KEY_F9", 67),
    ("KEY_F10", 68),
    ("KEY_NUMLOCK", 69),
    ("KEY_SCROLLLOCK", 70),
    ("KEY_F11", 87),
    ("KEY_F12", 88),
    ("KEY_RIGHTCTRL", 97),
    ("KEY_SYSRQ", 99),
    ("KEY_RIGHTALT", 100),
    ("KEY_HOME", 102),
    ("KEY_UP", 103),
    ("KEY_PAGEUP", 104),
    ("KEY_LEFT", 105),
    ("KEY_RIGHT", 106),
    ("KEY_END", 107),
    ("KEY_DOWN", 108),
    ("KEY_PAGEDOWN", 109),
    ("KEY_INSERT", 110),
    ("KEY_DELETE", 111),
    ("KEY_MUTE", 113),
    ("KEY_VOLUMEDOWN", 114),
    ("KEY_VOLUMEUP", 115),
    ("KEY_PAUSE", 119),
    ("KEY_LEFTMETA", 125),
    ("KEY_RIGHTMETA", 126),
    ("KEY_STOP", 128),
    ("KEY_BACK", 158),
    ("KEY_FORWARD", 159),
    ("KEY_PLAYPAUSE", 164),
    ("BTN_MOUSE", 0x110),
    ("BTN_LEFT", 0x110),
    ("BTN_RIGHT", 0x111),
    ("BTN_MIDDLE", 0x112),
];

/// Look up a Linux input key code by name (e.g. "KEY_ENTER")
pub fn key_code(name: &str) -> Option<u16> {
    KEY_NAMES
        .iter()
        .find(|(key_name, _)| *key_name == name)
        .map(|(_, code)| *code)
}

/// One source button to target mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyMapEntry {
    /// Button bit
    pub source: u32,
    pub target: KeyTarget,
}

impl KeyMapEntry {
    pub fn new(button: MoveButton, target: KeyTarget) -> Self {
        Self {
            source: button.bit(),
            target,
        }
    }
}

/// Per-controller mapping from button bits to targets
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyMap {
    entries: HashMap<u32, KeyTarget>,
}

impl KeyMap {
    /// Build a key map. Entries are unique by source button; a repeated
    /// source keeps its last target.
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = KeyMapEntry>,
    {
        let mut map = HashMap::new();
        for entry in entries {
            if let Some(previous) = map.insert(entry.source, entry.target) {
                warn!(
                    "Button bit 0x{:x} mapped twice ({:?} replaced by {:?})",
                    entry.source, previous, entry.target
                );
            }
        }
        Self { entries: map }
    }

    /// Build a key map from configuration names (button -> target name)
    pub fn from_names(names: &HashMap<MoveButton, String>) -> Result<Self, UnknownKey> {
        let mut entries = Vec::with_capacity(names.len());
        for (button, target) in names {
            entries.push(KeyMapEntry::new(*button, target.parse()?));
        }
        Ok(Self::from_entries(entries))
    }

    /// Target of a single button bit
    pub fn lookup(&self, bit: u32) -> Option<KeyTarget> {
        self.entries.get(&bit).copied()
    }

    /// Whether any button maps to `target`
    pub fn contains(&self, target: KeyTarget) -> bool {
        self.entries.values().any(|t| *t == target)
    }

    /// Key codes that are forwarded to the device
    pub fn output_keys(&self) -> Vec<u16> {
        let mut keys: Vec<u16> = self
            .entries
            .values()
            .filter_map(|t| match t {
                KeyTarget::Key(code) => Some(*code),
                _ => None,
            })
            .collect();
        keys.sort_unstable();
        keys.dedup();
        keys
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
