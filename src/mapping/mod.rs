//! Mapping module - turns controller samples into keyboard/mouse events

pub mod config;
pub mod filter;
pub mod keymap;
pub mod translator;

pub use config::{Config, ConfigError, OpMode};
pub use filter::{MotionFilter, MoveCoefficients, StreamClock};
pub use keymap::{KeyMap, KeyMapEntry, KeyTarget, MoveButton};
pub use translator::{InputSink, InputTranslator, TranslatorSettings};
