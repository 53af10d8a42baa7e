//! Controller session
//!
//! One session owns one claimed controller and polls it on its own thread:
//! samples are forwarded to the input sink, the sphere LED is kept alive and
//! the session ends itself when the controller goes silent.

use crate::fleet::FleetHandle;
use crate::mapping::translator::InputSink;
use crate::psmove::api::ControllerHandle;
use crate::psmove::constants::CALIBRATED_GYRO_SCALE;
use crate::psmove::types::{ControllerSlot, Sample};
use log::{debug, info, trace, warn};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Timing of one session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTimeouts {
    /// Sleep between poll batches
    pub poll: Duration,
    /// Silence after which the controller counts as gone
    pub disconnect: Duration,
    /// LED refresh period
    pub led: Duration,
    /// Minimum period between gesture samples
    pub gesture: Duration,
}

impl SessionTimeouts {
    fn ticks(&self, period: Duration) -> u128 {
        period.as_millis() / self.poll.as_millis().max(1)
    }

    /// Poll ticks between LED refreshes
    pub fn led_ticks(&self) -> u128 {
        self.ticks(self.led)
    }

    /// Samples skipped between forwarded gesture samples
    pub fn gesture_ticks(&self) -> u128 {
        self.ticks(self.gesture)
    }
}

impl Default for SessionTimeouts {
    fn default() -> Self {
        Self {
            poll: Duration::from_millis(20),
            disconnect: Duration::from_millis(7000),
            led: Duration::from_millis(4000),
            gesture: Duration::from_millis(200),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Starting,
    Polling,
    Stopping,
}

pub struct ControllerSession {
    slot: ControllerSlot,
    state: Arc<Mutex<SessionState>>,
    thread: Option<JoinHandle<()>>,
    psmove_id: Option<usize>,
    address: String,
}

impl ControllerSession {
    pub fn new(slot: ControllerSlot) -> Self {
        Self {
            slot,
            state: Arc::new(Mutex::new(SessionState::Idle)),
            thread: None,
            psmove_id: None,
            address: String::new(),
        }
    }

    pub fn slot(&self) -> ControllerSlot {
        self.slot
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether a poll loop is alive for this session
    pub fn is_running(&self) -> bool {
        self.state() != SessionState::Idle
    }

    /// Controller API id of the claimed controller
    pub fn psmove_id(&self) -> Option<usize> {
        self.psmove_id
    }

    /// Hardware address of the last claimed controller
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Bind `handle` to this session and start polling it.
    ///
    /// Does nothing (and releases `handle`) if the session is already running.
    pub fn start(
        &mut self,
        psmove_id: usize,
        mut handle: Box<dyn ControllerHandle>,
        sink: Arc<dyn InputSink>,
        fleet: FleetHandle,
        timeouts: SessionTimeouts,
    ) -> std::io::Result<()> {
        if self.is_running() {
            debug!("{:?} session already running, ignoring controller #{}", self.slot, psmove_id);
            return Ok(());
        }
        // Reap a loop that already ended on its own
        self.join();

        set_state(&self.state, SessionState::Starting);
        info!("Starting {:?} session for controller #{}", self.slot, psmove_id);

        self.psmove_id = Some(psmove_id);
        self.address = handle.hardware_address();
        let calibrated = handle.has_calibration();

        let (r, g, b) = self.slot.led_color();
        handle.set_indicator_color(r, g, b);
        if let Err(e) = handle.refresh_indicator() {
            warn!("Failed to set LED of {}: {}", self.address, e);
        }

        let poll_loop = PollLoop {
            slot: self.slot,
            handle,
            sink,
            fleet,
            timeouts,
            calibrated,
            state: Arc::clone(&self.state),
        };

        let name = match self.slot {
            ControllerSlot::First => "session-first",
            ControllerSlot::Second => "session-second",
        };
        let spawned = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || poll_loop.run());

        match spawned {
            Ok(thread) => {
                self.thread = Some(thread);
                Ok(())
            }
            Err(e) => {
                set_state(&self.state, SessionState::Idle);
                Err(e)
            }
        }
    }

    /// Block until the poll loop has exited
    pub fn join(&mut self) {
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("{:?} session thread panicked", self.slot);
                set_state(&self.state, SessionState::Idle);
            }
        }
    }
}

fn set_state(state: &Mutex<SessionState>, value: SessionState) {
    *state.lock().unwrap_or_else(PoisonError::into_inner) = value;
}

struct PollLoop {
    slot: ControllerSlot,
    handle: Box<dyn ControllerHandle>,
    sink: Arc<dyn InputSink>,
    fleet: FleetHandle,
    timeouts: SessionTimeouts,
    calibrated: bool,
    state: Arc<Mutex<SessionState>>,
}

impl PollLoop {
    fn run(mut self) {
        set_state(&self.state, SessionState::Polling);

        let led_ticks = self.timeouts.led_ticks();
        let gesture_ticks = self.timeouts.gesture_ticks();
        let mut led_count: u128 = 0;
        let mut gesture_count: u128 = 0;
        let mut buttons: u32 = 0;
        // Silence only counts once the controller has reported at least once
        let mut last_activity: Option<Instant> = None;

        loop {
            if self.fleet.need_to_stop() {
                debug!("{:?} session asked to stop", self.slot);
                break;
            }

            for sample in self.handle.poll_samples() {
                let (gx, gz) = self.gyro(&sample);
                match self.slot {
                    ControllerSlot::First => self.sink.on_gyroscope(-gz, -gx),
                    ControllerSlot::Second => {
                        gesture_count += 1;
                        if gesture_count > gesture_ticks {
                            gesture_count = 0;
                            self.sink.on_gesture(-gz, gx);
                        }
                    }
                }

                if sample.buttons != buttons {
                    buttons = sample.buttons;
                    self.sink.on_buttons(buttons, self.slot);
                }

                last_activity = Some(Instant::now());
            }

            if last_activity.is_some_and(|t| t.elapsed() > self.timeouts.disconnect) {
                info!("{:?} controller silent for {:?}, dropping it", self.slot, self.timeouts.disconnect);
                break;
            }

            led_count += 1;
            if led_count > led_ticks {
                led_count = 0;
                trace!("{:?} LED refresh", self.slot);
                if let Err(e) = self.handle.refresh_indicator() {
                    warn!("{:?} LED refresh failed: {}", self.slot, e);
                }
            }

            thread::sleep(self.timeouts.poll);
        }

        set_state(&self.state, SessionState::Stopping);
        info!("Stopping {:?} session", self.slot);
        self.handle.disconnect();
        self.fleet.session_ended(self.slot);
        set_state(&self.state, SessionState::Idle);
    }

    /// (x, z) gyro components as integers
    fn gyro(&self, sample: &Sample) -> (i32, i32) {
        match (self.calibrated, sample.calibrated_gyro) {
            (true, Some(c)) => (
                (c.x * CALIBRATED_GYRO_SCALE) as i32,
                (c.z * CALIBRATED_GYRO_SCALE) as i32,
            ),
            _ => (sample.gyro.x, sample.gyro.z),
        }
    }
}
