//! Input translator
//!
//! Turns controller samples into virtual device events:
//! - gyro samples of the first controller become pointer movement
//! - gyro samples of the second controller become gesture pseudo-buttons
//! - button bitmasks are diffed per slot into press/release events
//!
//! Meta-keys (disconnect, triggers, wheel) are handled here instead of being
//! forwarded to the device.

use crate::backend::EventDevice;
use crate::fleet::DisconnectRequest;
use crate::mapping::filter::{MotionFilter, MoveCoefficients, StreamClock};
use crate::mapping::keymap::{KeyMap, KeyTarget};
use crate::psmove::constants::*;
use crate::psmove::types::ControllerSlot;
use crossbeam_channel::Sender;
use log::{debug, info, trace, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

/// Receiver of everything a controller session produces
pub trait InputSink: Send + Sync {
    /// Pointer gyro sample from the first controller
    fn on_gyroscope(&self, gx: i32, gy: i32);

    /// Gesture gyro sample from the second controller
    fn on_gesture(&self, gx: i32, gy: i32);

    /// Button bitmask of `slot` changed
    fn on_buttons(&self, buttons: u32, slot: ControllerSlot);

    /// Every session has been torn down; forget all per-controller state
    fn reset(&self);
}

/// Numeric translator parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TranslatorSettings {
    pub coefficients: MoveCoefficients,
    pub move_threshold: i32,
    pub gesture_threshold: i32,
}

impl Default for TranslatorSettings {
    fn default() -> Self {
        Self {
            coefficients: MoveCoefficients::default(),
            move_threshold: 3,
            gesture_threshold: 50,
        }
    }
}

/// Gesture pseudo-button bits for a filtered gesture delta
pub fn gesture_bits(dx: i32, dy: i32) -> u32 {
    let mut bits = 0;
    if dx > 0 {
        bits |= GESTURE_RIGHT;
    } else if dx < 0 {
        bits |= GESTURE_LEFT;
    }
    if dy > 0 {
        bits |= GESTURE_DOWN;
    } else if dy < 0 {
        bits |= GESTURE_UP;
    }
    bits
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct InputTranslator<D: EventDevice> {
    device: D,
    key_maps: [KeyMap; 2],
    pointer_filter: MotionFilter,
    gesture_filter: MotionFilter,
    disconnect_tx: Option<Sender<DisconnectRequest>>,

    /// Per-slot button bitmask. Guards the whole diff-and-emit sequence.
    buttons: Mutex<[u32; 2]>,
    pointer_clock: Mutex<StreamClock>,
    gesture_clock: Mutex<StreamClock>,

    use_move_trigger: bool,
    use_gesture_trigger: bool,
    move_trigger: AtomicBool,
    gesture_trigger: AtomicBool,
}

impl<D: EventDevice> InputTranslator<D> {
    pub fn new(device: D, first: KeyMap, second: KeyMap, settings: TranslatorSettings) -> Self {
        // Pointer motion comes from the first controller, gestures from the second
        let use_move_trigger = first.contains(KeyTarget::MoveTrigger);
        let use_gesture_trigger = second.contains(KeyTarget::GestureTrigger);

        info!(
            "✓ Translator ready ({} + {} mapped buttons, move trigger: {}, gesture trigger: {})",
            first.len(),
            second.len(),
            use_move_trigger,
            use_gesture_trigger
        );

        Self {
            device,
            key_maps: [first, second],
            pointer_filter: MotionFilter::new(settings.coefficients, settings.move_threshold),
            gesture_filter: MotionFilter::new(settings.coefficients, settings.gesture_threshold),
            disconnect_tx: None,
            buttons: Mutex::new([0; 2]),
            pointer_clock: Mutex::new(StreamClock::new()),
            gesture_clock: Mutex::new(StreamClock::new()),
            use_move_trigger,
            use_gesture_trigger,
            move_trigger: AtomicBool::new(false),
            gesture_trigger: AtomicBool::new(false),
        }
    }

    /// Deliver disconnect-key presses to the fleet
    pub fn with_disconnect_sender(mut self, tx: Sender<DisconnectRequest>) -> Self {
        self.disconnect_tx = Some(tx);
        self
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    /// Whether pointer motion is currently forwarded
    pub fn is_move_enabled(&self) -> bool {
        !self.use_move_trigger || self.move_trigger.load(Ordering::SeqCst)
    }

    /// Whether gestures are currently recognised
    pub fn is_gesture_enabled(&self) -> bool {
        !self.use_gesture_trigger || self.gesture_trigger.load(Ordering::SeqCst)
    }

    /// Current bitmask of `slot`, gesture bits included
    pub fn buttons(&self, slot: ControllerSlot) -> u32 {
        lock(&self.buttons)[slot.index()]
    }

    /// Pointer path with an explicit sample time
    pub fn on_gyroscope_at(&self, gx: i32, gy: i32, now: Instant) {
        trace!("gyro ({}, {})", gx, gy);

        // The clock advances even while gated so enabling motion does not jump
        let Some(dt_ms) = lock(&self.pointer_clock).tick(now) else {
            return;
        };
        if !self.is_move_enabled() {
            return;
        }

        let (dx, dy) = self.pointer_filter.apply(gx, gy, dt_ms);
        if dx != 0 || dy != 0 {
            trace!("move ({}, {}) after {}ms", dx, dy, dt_ms);
            if let Err(e) = self.device.report_move(dx, dy) {
                warn!("Failed to report pointer movement: {}", e);
            }
        }
    }

    /// Gesture path with an explicit sample time
    pub fn on_gesture_at(&self, gx: i32, gy: i32, now: Instant) {
        trace!("gesture gyro ({}, {})", gx, gy);

        let Some(dt_ms) = lock(&self.gesture_clock).tick(now) else {
            return;
        };

        // A disabled gesture gate releases whatever direction was held
        let bits = if self.is_gesture_enabled() {
            let (dx, dy) = self.gesture_filter.apply(gx, gy, dt_ms);
            gesture_bits(dx, dy)
        } else {
            0
        };
        self.apply_buttons(bits, GESTURE_MASK, ControllerSlot::Second);
    }

    /// Merge `bits` into the `mask` part of the slot's bitmask and emit edges
    fn apply_buttons(&self, bits: u32, mask: u32, slot: ControllerSlot) {
        let mut state = lock(&self.buttons);
        let old = state[slot.index()];
        let new = (old & !mask) | (bits & mask);
        if new == old {
            return;
        }
        state[slot.index()] = new;

        let pressed = new & !old;
        let released = old & !new;
        debug!(
            "{:?} buttons 0x{:x} -> 0x{:x} (pressed 0x{:x}, released 0x{:x})",
            slot, old, new, pressed, released
        );

        let mut bit = 1u32;
        loop {
            if pressed & bit != 0 {
                self.handle_edge(bit, true, slot);
            } else if released & bit != 0 {
                self.handle_edge(bit, false, slot);
            }
            if bit >= MAX_BUTTON_BIT {
                break;
            }
            bit <<= 1;
        }
    }

    fn handle_edge(&self, bit: u32, pressed: bool, slot: ControllerSlot) {
        let Some(target) = self.key_maps[slot.index()].lookup(bit) else {
            return;
        };

        match target {
            KeyTarget::Key(code) => {
                debug!("{:?} key {} {}", slot, code, if pressed { "down" } else { "up" });
                if let Err(e) = self.device.report_key(code, pressed) {
                    warn!("Failed to report key {}: {}", code, e);
                }
            }
            KeyTarget::Disconnect => {
                if pressed {
                    self.request_disconnect(slot);
                }
            }
            KeyTarget::MoveTrigger => {
                debug!("Move trigger {}", if pressed { "held" } else { "released" });
                self.move_trigger.store(pressed, Ordering::SeqCst);
            }
            KeyTarget::GestureTrigger => {
                debug!("Gesture trigger {}", if pressed { "held" } else { "released" });
                self.gesture_trigger.store(pressed, Ordering::SeqCst);
            }
            KeyTarget::WheelUp => {
                if pressed {
                    self.report_wheel(1);
                }
            }
            KeyTarget::WheelDown => {
                if pressed {
                    self.report_wheel(-1);
                }
            }
        }
    }

    fn report_wheel(&self, delta: i32) {
        debug!("wheel {}", delta);
        if let Err(e) = self.device.report_wheel(delta) {
            warn!("Failed to report wheel: {}", e);
        }
    }

    fn request_disconnect(&self, slot: ControllerSlot) {
        info!("Disconnect key pressed on {:?} controller", slot);
        match &self.disconnect_tx {
            Some(tx) => {
                if tx.send(DisconnectRequest { slot }).is_err() {
                    warn!("Disconnect request for {:?} dropped: fleet is gone", slot);
                }
            }
            None => warn!("Disconnect request for {:?} ignored: no fleet attached", slot),
        }
    }
}

impl<D: EventDevice> InputSink for InputTranslator<D> {
    fn on_gyroscope(&self, gx: i32, gy: i32) {
        self.on_gyroscope_at(gx, gy, Instant::now());
    }

    fn on_gesture(&self, gx: i32, gy: i32) {
        self.on_gesture_at(gx, gy, Instant::now());
    }

    fn on_buttons(&self, buttons: u32, slot: ControllerSlot) {
        self.apply_buttons(buttons, BUTTON_MASK, slot);
    }

    fn reset(&self) {
        *lock(&self.buttons) = [0; 2];
        lock(&self.pointer_clock).reset();
        lock(&self.gesture_clock).reset();
        self.move_trigger.store(false, Ordering::SeqCst);
        self.gesture_trigger.store(false, Ordering::SeqCst);
        info!("Translator state reset");
    }
}
