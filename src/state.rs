use crate::sensor::SlotId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq)]
pub struct ParkingSlot {
    pub id: SlotId,
    pub is_car_present: bool,
    pub is_car_parked: bool,
    pub car_arrived_time: Option<Instant>,
    pub car_left_time: Option<Instant>,
    pub is_sensor_faulty: bool,
    /// Centimetres. `None` until the first successful reading.
    pub last_valid_distance: Option<f32>,
}

impl ParkingSlot {
    pub fn new(id: SlotId) -> Self {
        Self {
            id,
            is_car_present: false,
            is_car_parked: false,
            car_arrived_time: None,
            car_left_time: None,
            is_sensor_faulty: false,
            last_valid_distance: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotEvent {
    CarArrived(SlotId),
    CarLeft(SlotId),
}

impl SlotEvent {
    pub fn slot(self) -> SlotId {
        match self {
            SlotEvent::CarArrived(slot) | SlotEvent::CarLeft(slot) => slot,
        }
    }

    pub fn wire_type(self) -> &'static str {
        match self {
            SlotEvent::CarArrived(_) => "car-arrived",
            SlotEvent::CarLeft(_) => "car-left",
        }
    }
}

impl fmt::Display for SlotEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (slot {})", self.wire_type(), self.slot())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatePhase {
    Idle,
    Detecting,
    Open,
    Closing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateEvent {
    Opened,
    Closed,
    ExitCodeIssued,
    ApprovalExpired,
}

/// Debounce bookkeeping shared by both gates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GateState {
    pub is_open: bool,
    pub detect_start: Option<Instant>,
    pub no_detection_start: Option<Instant>,
}

impl GateState {
    pub fn phase(&self) -> GatePhase {
        match (self.is_open, self.detect_start, self.no_detection_start) {
            (true, _, Some(_)) => GatePhase::Closing,
            (true, _, None) => GatePhase::Open,
            (false, Some(_), _) => GatePhase::Detecting,
            (false, None, _) => GatePhase::Idle,
        }
    }

    /// Record a presence reading and return how long presence has been continuous.
    pub fn track_detection(&mut self, now: Instant) -> Duration {
        let since = *self.detect_start.get_or_insert(now);
        self.no_detection_start = None;
        now.saturating_duration_since(since)
    }

    /// Record an absence reading. Returns how long the open gate has been clear,
    /// or `None` when the gate is closed.
    pub fn track_clearance(&mut self, now: Instant) -> Option<Duration> {
        self.detect_start = None;
        if !self.is_open {
            return None;
        }
        let since = *self.no_detection_start.get_or_insert(now);
        Some(now.saturating_duration_since(since))
    }

    pub fn mark_open(&mut self) {
        self.is_open = true;
        self.no_detection_start = None;
    }

    pub fn mark_closed(&mut self) {
        self.is_open = false;
        self.no_detection_start = None;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryAssignment {
    pub slot: u32,
    pub passkey: u32,
}
