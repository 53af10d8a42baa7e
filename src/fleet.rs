//! Controller fleet
//!
//! The fleet owns both controller sessions. Its loop claims unclaimed
//! wireless controllers, starts a session per controller and tears every
//! session down together whenever one of them ends, so a reconnecting
//! controller can never inherit the slot (and key map) of another.

use crate::mapping::translator::InputSink;
use crate::psmove::api::{ControllerApi, ControllerHandle};
use crate::psmove::constants::MAX_CONTROLLERS;
use crate::psmove::types::{ControllerSlot, Transport, TransportPreference};
use crate::session::{ControllerSession, SessionTimeouts};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use log::{debug, info, trace, warn};
use std::process::Command;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// A disconnect key was pressed on `slot`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisconnectRequest {
    pub slot: ControllerSlot,
}

#[derive(Debug, Default)]
struct FleetFlags {
    /// The whole fleet has to exit
    stop: AtomicBool,
    /// Every session has to exit; the fleet keeps running
    sessions_stop: AtomicBool,
}

/// Shared stop flags of one fleet
#[derive(Debug, Clone, Default)]
pub struct FleetHandle {
    flags: Arc<FleetFlags>,
}

impl FleetHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the fleet and all its sessions to exit
    pub fn stop(&self) {
        info!("Fleet stop requested");
        self.flags.stop.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.flags.stop.load(Ordering::SeqCst)
    }

    /// Checked by sessions at the top of every poll tick
    pub fn need_to_stop(&self) -> bool {
        self.is_stopped() || self.flags.sessions_stop.load(Ordering::SeqCst)
    }

    /// A session loop exited; all sessions have to go
    pub(crate) fn session_ended(&self, slot: ControllerSlot) {
        debug!("{:?} session ended, stopping all sessions", slot);
        self.flags.sessions_stop.store(true, Ordering::SeqCst);
    }

    fn sessions_stopping(&self) -> bool {
        self.flags.sessions_stop.load(Ordering::SeqCst)
    }

    fn clear_sessions_stop(&self) {
        self.flags.sessions_stop.store(false, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FleetSettings {
    /// Which connections controllers are acquired from
    pub transport: TransportPreference,
    /// Sleep between acquisition attempts
    pub connect_timeout: Duration,
    pub session_timeouts: SessionTimeouts,
    /// Run with the controller address appended after a disconnect key;
    /// empty to only stop the sessions
    pub disconnect_command: Vec<String>,
}

impl Default for FleetSettings {
    fn default() -> Self {
        Self {
            transport: TransportPreference::LocalOnly,
            connect_timeout: Duration::from_millis(3000),
            session_timeouts: SessionTimeouts::default(),
            disconnect_command: vec!["bluetoothctl".to_string(), "disconnect".to_string()],
        }
    }
}

pub struct ControllerFleet<A: ControllerApi> {
    api: A,
    sink: Arc<dyn InputSink>,
    disconnect_rx: Receiver<DisconnectRequest>,
    settings: FleetSettings,
    handle: FleetHandle,
    sessions: [ControllerSession; MAX_CONTROLLERS],
    /// Address to force off the radio once every session has stopped
    pending_disconnect: Option<String>,
}

impl<A: ControllerApi> ControllerFleet<A> {
    pub fn new(
        api: A,
        sink: Arc<dyn InputSink>,
        disconnect_rx: Receiver<DisconnectRequest>,
        settings: FleetSettings,
        handle: FleetHandle,
    ) -> Self {
        Self {
            api,
            sink,
            disconnect_rx,
            settings,
            handle,
            sessions: [
                ControllerSession::new(ControllerSlot::First),
                ControllerSession::new(ControllerSlot::Second),
            ],
            pending_disconnect: None,
        }
    }

    pub fn handle(&self) -> FleetHandle {
        self.handle.clone()
    }

    pub fn session(&self, slot: ControllerSlot) -> &ControllerSession {
        &self.sessions[slot.index()]
    }

    /// Number of sessions with a live poll loop
    pub fn running_sessions(&self) -> usize {
        self.sessions.iter().filter(|s| s.is_running()).count()
    }

    /// Run until `FleetHandle::stop` is called
    pub fn run(&mut self) {
        info!("Controller fleet starting ({:?})", self.settings.transport);
        if let Err(e) = self.api.set_transport_preference(self.settings.transport) {
            warn!("Failed to select {:?} transport: {}", self.settings.transport, e);
        }

        loop {
            if self.handle.is_stopped() || self.handle.sessions_stopping() {
                self.join_sessions();

                if self.handle.is_stopped() {
                    info!("Controller fleet stopped");
                    break;
                }

                self.handle.clear_sessions_stop();
                if let Some(address) = self.pending_disconnect.take() {
                    force_disconnect(&self.settings.disconnect_command, &address);
                }
                info!("All sessions stopped");
                self.sink.reset();
            }

            if self.running_sessions() < MAX_CONTROLLERS {
                self.connect();
            }

            self.wait(self.settings.connect_timeout);
        }
    }

    fn join_sessions(&mut self) {
        for session in self.sessions.iter_mut() {
            session.join();
        }

        // Requests queued during the teardown name slots that are gone now
        for request in self.disconnect_rx.try_iter() {
            debug!("Dropping stale disconnect request for {:?}", request.slot);
        }
    }

    /// Sleep between acquisition attempts, waking early for disconnect keys
    fn wait(&mut self, timeout: Duration) {
        match self.disconnect_rx.recv_timeout(timeout) {
            Ok(request) => self.on_disconnect_key(request.slot),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => thread::sleep(timeout),
        }
    }

    /// Claim the first unclaimed wireless controller, if any.
    ///
    /// Ids shift when controllers come and go, so ownership is decided by
    /// hardware address rather than by id.
    fn connect(&mut self) {
        for id in 0..MAX_CONTROLLERS {
            match self.api.claim(id) {
                Ok(Some(mut handle)) => {
                    if handle.transport() != Transport::Wireless {
                        debug!("Ignoring wired controller #{}", id);
                        handle.disconnect();
                        continue;
                    }
                    let address = handle.hardware_address();
                    if self.owns(&address) {
                        trace!("Controller #{} ({}) already has a session", id, address);
                        handle.release();
                        continue;
                    }
                    info!("✓ Connected to controller #{} ({})", id, address);
                    self.handle_new_device(id, handle);
                    return;
                }
                Ok(None) => trace!("No controller at #{}", id),
                Err(e) => debug!("Claiming controller #{} failed: {}", id, e),
            }
        }
    }

    fn owns(&self, address: &str) -> bool {
        self.sessions
            .iter()
            .any(|s| s.is_running() && s.address() == address)
    }

    fn handle_new_device(&mut self, id: usize, mut handle: Box<dyn ControllerHandle>) {
        let Some(session) = self.sessions.iter_mut().find(|s| !s.is_running()) else {
            warn!("No free slot for controller #{}", id);
            handle.disconnect();
            return;
        };

        let slot = session.slot();
        if let Err(e) = session.start(
            id,
            handle,
            Arc::clone(&self.sink),
            self.handle.clone(),
            self.settings.session_timeouts,
        ) {
            warn!("Failed to start {:?} session: {}", slot, e);
        }
    }

    fn on_disconnect_key(&mut self, slot: ControllerSlot) {
        let session = &self.sessions[slot.index()];
        if !session.is_running() {
            warn!("Disconnect key on {:?}, but no controller is connected there", slot);
            return;
        }

        let address = session.address().to_string();
        info!("Disconnecting {:?} controller {}", slot, address);
        self.handle.session_ended(slot);
        // The command runs once the sessions have let go of the controller
        self.pending_disconnect = Some(address);
    }
}

/// Run the disconnect command for `address`. Returns whether it succeeded.
pub fn force_disconnect(command: &[String], address: &str) -> bool {
    let Some((program, args)) = command.split_first() else {
        return false;
    };

    match Command::new(program).args(args).arg(address).status() {
        Ok(status) if status.success() => {
            info!("✓ Disconnected {}", address);
            true
        }
        Ok(status) => {
            warn!("Disconnect command for {} exited with {}", address, status);
            false
        }
        Err(e) => {
            warn!("Failed to run disconnect command '{}': {}", program, e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::psmove::constants::BTN_CROSS;
    use crate::psmove::types::Sample;
    use crate::test_support::{wait_until, FakeApi, FakeController, RecordingSink, SinkEvent};
    use crossbeam_channel::{unbounded, Sender};

    fn settings() -> FleetSettings {
        FleetSettings {
            transport: TransportPreference::LocalOnly,
            connect_timeout: Duration::from_millis(10),
            session_timeouts: SessionTimeouts {
                poll: Duration::from_millis(5),
                disconnect: Duration::from_secs(5),
                led: Duration::from_millis(50),
                gesture: Duration::from_millis(20),
            },
            disconnect_command: Vec::new(),
        }
    }

    struct Running {
        handle: FleetHandle,
        sink: Arc<RecordingSink>,
        tx: Sender<DisconnectRequest>,
        thread: thread::JoinHandle<()>,
    }

    fn run_fleet(controllers: Vec<Arc<FakeController>>, settings: FleetSettings) -> Running {
        run_fleet_with(FakeApi::new(controllers), settings)
    }

    fn run_fleet_with(api: FakeApi, settings: FleetSettings) -> Running {
        let sink = Arc::new(RecordingSink::default());
        let (tx, rx) = unbounded();
        let handle = FleetHandle::new();

        let fleet_sink: Arc<dyn InputSink> = sink.clone();
        let fleet_handle = handle.clone();
        let thread = thread::spawn(move || {
            let mut fleet = ControllerFleet::new(api, fleet_sink, rx, settings, fleet_handle);
            fleet.run();
        });

        Running {
            handle,
            sink,
            tx,
            thread,
        }
    }

    impl Running {
        fn stop(self) {
            self.handle.stop();
            self.thread.join().unwrap();
        }
    }

    #[test]
    fn test_claims_wireless_controllers() {
        let first = FakeController::new("aa", Transport::Wireless);
        let second = FakeController::new("bb", Transport::Wireless);
        let fleet = run_fleet(vec![first.clone(), second.clone()], settings());

        assert!(wait_until(Duration::from_secs(2), || second.claim_count() == 1));
        let first_state = first.claim(0);
        let second_state = second.claim(0);

        // Samples from each controller arrive tagged with its slot
        first_state.push(Sample { buttons: BTN_CROSS, ..Default::default() });
        second_state.push(Sample { buttons: BTN_CROSS, ..Default::default() });
        let sink = fleet.sink.clone();
        assert!(wait_until(Duration::from_secs(2), || {
            sink.count(|e| matches!(e, SinkEvent::Buttons(..))) == 2
        }));
        assert!(sink.events().contains(&SinkEvent::Buttons(BTN_CROSS, ControllerSlot::First)));
        assert!(sink.events().contains(&SinkEvent::Buttons(BTN_CROSS, ControllerSlot::Second)));

        // The first controller was reopened once on the way to the second
        // and let go again; with both running nothing more is claimed
        thread::sleep(Duration::from_millis(50));
        assert_eq!(first.claim_count(), 2);
        assert!(first.claim(1).is_disconnected());
        assert!(!first_state.is_disconnected());
        assert_eq!(second.claim_count(), 1);

        fleet.stop();
        assert!(first_state.is_disconnected());
        assert!(second_state.is_disconnected());
    }

    #[test]
    fn test_shifted_ids_do_not_open_a_controller_twice() {
        let a = FakeController::new("aa", Transport::Wireless);
        let b = FakeController::new("bb", Transport::Wireless);
        let api = FakeApi::new(vec![a.clone()]);
        let controllers = Arc::clone(&api.controllers);
        let fleet = run_fleet_with(api, settings());

        assert!(wait_until(Duration::from_secs(2), || a.claim_count() >= 1));
        let a_state = a.claim(0);

        // A new controller enumerates ahead of the one already in use
        controllers.lock().unwrap().insert(0, b.clone());

        assert!(wait_until(Duration::from_secs(2), || b.claim_count() == 1));
        thread::sleep(Duration::from_millis(50));
        assert_eq!(b.claim_count(), 1);

        // Only the first handle to A is still open
        let a_claims = a.all_claims();
        assert!(!a_claims[0].is_disconnected());
        assert!(a_claims[1..].iter().all(|s| s.is_disconnected()));

        b.claim(0).push(Sample { buttons: BTN_CROSS, ..Default::default() });
        let sink = fleet.sink.clone();
        assert!(wait_until(Duration::from_secs(2), || {
            sink.events().contains(&SinkEvent::Buttons(BTN_CROSS, ControllerSlot::Second))
        }));

        fleet.stop();
        assert!(a_state.is_disconnected());
    }

    #[test]
    fn test_wired_controllers_are_rejected() {
        let wired = FakeController::new("usb", Transport::Wired);
        let fleet = run_fleet(vec![wired.clone()], settings());

        assert!(wait_until(Duration::from_secs(2), || wired.claim_count() >= 2));
        let sink = fleet.sink.clone();
        fleet.stop();

        assert!(wired.latest().unwrap().is_disconnected());
        assert!(sink.events().is_empty());
    }

    #[test]
    fn test_silent_controller_tears_down_every_session() {
        let quiet = FakeController::new("quiet", Transport::Wireless);
        let busy = FakeController::new("busy", Transport::Wireless);
        let mut settings = settings();
        settings.session_timeouts.disconnect = Duration::from_millis(40);
        let fleet = run_fleet(vec![quiet.clone(), busy.clone()], settings);

        assert!(wait_until(Duration::from_secs(2), || busy.claim_count() == 1));
        let quiet_state = quiet.claim(0);
        let busy_state = busy.claim(0);

        // One report arms the quiet controller's timer, then it goes silent
        quiet_state.push(Sample::default());

        // Keep the other controller talking meanwhile
        let sink = fleet.sink.clone();
        let feeder_state = busy_state.clone();
        let reset_seen = wait_until(Duration::from_secs(3), || {
            feeder_state.push(Sample::default());
            sink.count(|e| *e == SinkEvent::Reset) >= 1
        });
        assert!(reset_seen);
        assert!(quiet_state.is_disconnected());
        assert!(busy_state.is_disconnected());

        // Both controllers are claimed again after the teardown
        assert!(wait_until(Duration::from_secs(2), || {
            quiet.claim_count() >= 3 && busy.claim_count() >= 2
        }));
        fleet.stop();
    }

    #[test]
    fn test_disconnect_key_drops_sessions() {
        let first = FakeController::new("aa", Transport::Wireless);
        let fleet = run_fleet(vec![first.clone()], settings());

        assert!(wait_until(Duration::from_secs(2), || first.claim_count() >= 1));
        let state = first.claim(0);

        fleet.tx.send(DisconnectRequest { slot: ControllerSlot::First }).unwrap();
        let sink = fleet.sink.clone();
        assert!(wait_until(Duration::from_secs(2), || {
            sink.count(|e| *e == SinkEvent::Reset) == 1
        }));
        assert!(state.is_disconnected());

        fleet.stop();
    }

    #[test]
    fn test_disconnect_requests_queued_during_teardown_are_dropped() {
        let first = FakeController::new("aa", Transport::Wireless);
        let fleet = run_fleet(vec![first.clone()], settings());

        assert!(wait_until(Duration::from_secs(2), || first.claim_count() >= 1));
        let request = DisconnectRequest { slot: ControllerSlot::First };
        fleet.tx.send(request).unwrap();
        fleet.tx.send(request).unwrap();

        let sink = fleet.sink.clone();
        assert!(wait_until(Duration::from_secs(2), || {
            sink.count(|e| *e == SinkEvent::Reset) == 1
        }));
        assert!(first.claim(0).is_disconnected());

        // The controller comes back and keeps its new session
        let live = || first.all_claims().iter().filter(|s| !s.is_disconnected()).count();
        assert!(wait_until(Duration::from_secs(2), || live() == 1));
        thread::sleep(Duration::from_millis(100));
        assert_eq!(sink.count(|e| *e == SinkEvent::Reset), 1);
        assert!(wait_until(Duration::from_secs(2), || live() == 1));

        fleet.stop();
    }

    #[test]
    fn test_disconnect_key_on_empty_slot_is_ignored() {
        let fleet = run_fleet(Vec::new(), settings());

        fleet.tx.send(DisconnectRequest { slot: ControllerSlot::Second }).unwrap();
        thread::sleep(Duration::from_millis(50));

        let sink = fleet.sink.clone();
        fleet.stop();
        assert!(sink.events().is_empty());
    }

    #[test]
    fn test_stop_exits_without_controllers() {
        let fleet = run_fleet(Vec::new(), settings());
        thread::sleep(Duration::from_millis(20));
        fleet.stop();
    }

    #[test]
    fn test_force_disconnect_runs_command() {
        let ok = vec!["true".to_string()];
        let fails = vec!["false".to_string()];
        let missing = vec!["/nonexistent/psmove-disconnect".to_string()];

        assert!(force_disconnect(&ok, "00:11:22:33:44:55"));
        assert!(!force_disconnect(&fails, "00:11:22:33:44:55"));
        assert!(!force_disconnect(&missing, "00:11:22:33:44:55"));
        assert!(!force_disconnect(&[], "00:11:22:33:44:55"));
    }
}
