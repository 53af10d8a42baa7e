//! Scripted controllers and a recording sink shared by the session and
//! fleet tests.

use crate::mapping::translator::InputSink;
use crate::psmove::api::{ApiError, ControllerApi, ControllerHandle};
use crate::psmove::types::{ControllerSlot, Sample, Transport, TransportPreference};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// State shared between a test and the handle it gave to a session
#[derive(Default)]
pub struct FakeState {
    pub samples: Mutex<VecDeque<Sample>>,
    pub colors: Mutex<Vec<(u8, u8, u8)>>,
    pub refreshes: AtomicUsize,
    pub disconnected: AtomicBool,
}

impl FakeState {
    pub fn push(&self, sample: Sample) {
        self.samples.lock().unwrap().push_back(sample);
    }

    pub fn is_disconnected(&self) -> bool {
        self.disconnected.load(Ordering::SeqCst)
    }
}

pub struct FakeHandle {
    pub state: Arc<FakeState>,
    pub transport: Transport,
    pub address: String,
    pub calibrated: bool,
}

impl FakeHandle {
    pub fn new(address: &str) -> (Self, Arc<FakeState>) {
        let state = Arc::new(FakeState::default());
        let handle = Self {
            state: Arc::clone(&state),
            transport: Transport::Wireless,
            address: address.to_string(),
            calibrated: false,
        };
        (handle, state)
    }
}

impl ControllerHandle for FakeHandle {
    fn poll_samples(&mut self) -> Vec<Sample> {
        self.state.samples.lock().unwrap().drain(..).collect()
    }

    fn transport(&self) -> Transport {
        self.transport
    }

    fn hardware_address(&self) -> String {
        self.address.clone()
    }

    fn has_calibration(&self) -> bool {
        self.calibrated
    }

    fn set_indicator_color(&mut self, r: u8, g: u8, b: u8) {
        self.state.colors.lock().unwrap().push((r, g, b));
    }

    fn refresh_indicator(&mut self) -> Result<(), ApiError> {
        self.state.refreshes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn disconnect(&mut self) {
        self.state.disconnected.store(true, Ordering::SeqCst);
    }
}

/// One controller the fake API can hand out, possibly many times
pub struct FakeController {
    pub address: String,
    pub transport: Transport,
    /// State of every handle claimed so far, newest last
    pub claims: Mutex<Vec<Arc<FakeState>>>,
}

impl FakeController {
    pub fn new(address: &str, transport: Transport) -> Arc<Self> {
        Arc::new(Self {
            address: address.to_string(),
            transport,
            claims: Mutex::new(Vec::new()),
        })
    }

    pub fn claim_count(&self) -> usize {
        self.claims.lock().unwrap().len()
    }

    pub fn latest(&self) -> Option<Arc<FakeState>> {
        self.claims.lock().unwrap().last().cloned()
    }

    /// State of the `n`th handle claimed, oldest first
    pub fn claim(&self, n: usize) -> Arc<FakeState> {
        Arc::clone(&self.claims.lock().unwrap()[n])
    }

    pub fn all_claims(&self) -> Vec<Arc<FakeState>> {
        self.claims.lock().unwrap().clone()
    }
}

/// Controller API over a list of fake controllers, indexed by position.
/// Tests may edit the list while a fleet runs to shift the ids.
pub struct FakeApi {
    pub controllers: Arc<Mutex<Vec<Arc<FakeController>>>>,
    pub preference: Arc<Mutex<Option<TransportPreference>>>,
}

impl FakeApi {
    pub fn new(controllers: Vec<Arc<FakeController>>) -> Self {
        Self {
            controllers: Arc::new(Mutex::new(controllers)),
            preference: Arc::new(Mutex::new(None)),
        }
    }
}

impl ControllerApi for FakeApi {
    fn set_transport_preference(&mut self, preference: TransportPreference) -> Result<(), ApiError> {
        *self.preference.lock().unwrap() = Some(preference);
        Ok(())
    }

    fn claim(&mut self, id: usize) -> Result<Option<Box<dyn ControllerHandle>>, ApiError> {
        let Some(controller) = self.controllers.lock().unwrap().get(id).cloned() else {
            return Ok(None);
        };
        let (mut handle, state) = FakeHandle::new(&controller.address);
        handle.transport = controller.transport;
        controller.claims.lock().unwrap().push(state);
        Ok(Some(Box::new(handle)))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SinkEvent {
    Gyro(i32, i32),
    Gesture(i32, i32),
    Buttons(u32, ControllerSlot),
    Reset,
}

#[derive(Default)]
pub struct RecordingSink {
    pub events: Mutex<Vec<SinkEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<SinkEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&SinkEvent) -> bool) -> usize {
        self.events.lock().unwrap().iter().filter(|e| pred(*e)).count()
    }
}

impl InputSink for RecordingSink {
    fn on_gyroscope(&self, gx: i32, gy: i32) {
        self.events.lock().unwrap().push(SinkEvent::Gyro(gx, gy));
    }

    fn on_gesture(&self, gx: i32, gy: i32) {
        self.events.lock().unwrap().push(SinkEvent::Gesture(gx, gy));
    }

    fn on_buttons(&self, buttons: u32, slot: ControllerSlot) {
        self.events.lock().unwrap().push(SinkEvent::Buttons(buttons, slot));
    }

    fn reset(&self) {
        self.events.lock().unwrap().push(SinkEvent::Reset);
    }
}

/// Poll `cond` until it holds or `timeout` passes
pub fn wait_until(timeout: Duration, cond: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    cond()
}
