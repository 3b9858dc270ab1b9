use crate::gate::{GateHardware, GateTiming, close_when_clear};
use crate::remote::{RemoteCoordinator, VehicleClass};
use crate::state::{EntryAssignment, GateEvent, GatePhase, GateState};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Supplies the class of the vehicle waiting at the entry gate.
pub trait VehicleClassifier {
    fn classify(&mut self) -> VehicleClass;
}

/// Classifier that always answers with the configured class.
#[derive(Debug, Clone, Copy)]
pub struct FixedClassifier(pub VehicleClass);

impl VehicleClassifier for FixedClassifier {
    fn classify(&mut self) -> VehicleClass {
        self.0
    }
}

pub struct EntryGate {
    state: GateState,
    hardware: GateHardware,
    classifier: Box<dyn VehicleClassifier + Send>,
    timing: GateTiming,
    assignment: Option<EntryAssignment>,
}

impl EntryGate {
    pub fn new(
        mut hardware: GateHardware,
        classifier: Box<dyn VehicleClassifier + Send>,
        timing: GateTiming,
    ) -> Self {
        hardware.close(&timing);
        Self {
            state: GateState::default(),
            hardware,
            classifier,
            timing,
            assignment: None,
        }
    }

    pub fn state(&self) -> &GateState {
        &self.state
    }

    pub fn phase(&self) -> GatePhase {
        self.state.phase()
    }

    /// Slot and passkey handed out for the car currently passing, if any.
    pub fn assignment(&self) -> Option<EntryAssignment> {
        self.assignment
    }

    pub fn last_reading(&self) -> Option<u16> {
        self.hardware.last_reading()
    }

    pub fn check<R>(&mut self, remote: &mut R, now: Instant) -> Vec<GateEvent>
    where
        R: RemoteCoordinator + ?Sized,
    {
        let mut events = Vec::new();
        match self.hardware.sense(self.timing.detection_threshold) {
            Some(true) => {
                let waited = self.state.track_detection(now);
                if !self.state.is_open && waited >= self.timing.gate_wait {
                    events.extend(self.admit(remote));
                }
            }
            Some(false) => {
                if let Some(event) =
                    close_when_clear(&mut self.state, &mut self.hardware, &self.timing, now)
                {
                    self.assignment = None;
                    events.push(event);
                }
            }
            None => {}
        }
        events
    }

    fn admit<R>(&mut self, remote: &mut R) -> Option<GateEvent>
    where
        R: RemoteCoordinator + ?Sized,
    {
        if !remote.is_link_up() {
            debug!("Entry assignment deferred, coordination link down");
            return None;
        }

        let class = self.classifier.classify();
        match remote.request_entry_assignment(class) {
            Ok(assignment) => {
                info!(
                    wheels = class.wheels(),
                    slot = assignment.slot,
                    passkey = assignment.passkey,
                    "Assigned parking slot"
                );
                self.assignment = Some(assignment);
                self.hardware.open(&self.timing);
                self.state.mark_open();
                Some(GateEvent::Opened)
            }
            Err(err) => {
                warn!(
                    wheels = class.wheels(),
                    kind = ?err.kind(),
                    error = %err,
                    "Entry assignment failed, gate stays closed"
                );
                None
            }
        }
    }
}
