//! Per-slot occupancy tracking.
//!
//! A slot goes through two layers of state. `is_car_present` follows the
//! ultrasonic threshold directly and drives the slot LED. `is_car_parked`
//! only flips once presence (or absence) has held for the configured dwell,
//! and each flip yields exactly one [`SlotEvent`].

use crate::actuator::Indicator;
use crate::sensor::{DistanceSample, DistanceSensor, SlotId};
use crate::state::{ParkingSlot, SlotEvent};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub const DEFAULT_PARKING_THRESHOLD_CM: f32 = 4.0;
pub const DEFAULT_PARKING_TIME_ENTRY: Duration = Duration::from_millis(10_000);
pub const DEFAULT_PARKING_TIME_EXIT: Duration = Duration::from_millis(10_000);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlotTiming {
    /// Readings strictly below this distance count as a car.
    pub parking_threshold_cm: f32,
    pub parking_time_entry: Duration,
    pub parking_time_exit: Duration,
}

impl Default for SlotTiming {
    fn default() -> Self {
        Self {
            parking_threshold_cm: DEFAULT_PARKING_THRESHOLD_CM,
            parking_time_entry: DEFAULT_PARKING_TIME_ENTRY,
            parking_time_exit: DEFAULT_PARKING_TIME_EXIT,
        }
    }
}

pub struct SlotMonitor {
    slot: ParkingSlot,
    sensor: Box<dyn DistanceSensor + Send>,
    indicator: Box<dyn Indicator + Send>,
    timing: SlotTiming,
}

impl SlotMonitor {
    pub fn new(
        id: SlotId,
        sensor: Box<dyn DistanceSensor + Send>,
        indicator: Box<dyn Indicator + Send>,
        timing: SlotTiming,
    ) -> Self {
        let mut monitor = Self {
            slot: ParkingSlot::new(id),
            sensor,
            indicator,
            timing,
        };
        monitor.set_indicator(false);
        monitor
    }

    pub fn slot(&self) -> &ParkingSlot {
        &self.slot
    }

    pub fn timing(&self) -> &SlotTiming {
        &self.timing
    }

    /// Take a fresh reading from the owned sensor.
    pub fn measure(&mut self) -> DistanceSample {
        self.sensor.measure_cm()
    }

    /// Measure and run a full update.
    pub fn poll(&mut self, now: Instant) -> Option<SlotEvent> {
        let sample = self.measure();
        self.update(sample, now)
    }

    pub fn update(&mut self, sample: DistanceSample, now: Instant) -> Option<SlotEvent> {
        if self.observe(sample, now) {
            self.confirm(now)
        } else {
            None
        }
    }

    /// Apply a sample to the presence layer. Returns `false` for a fault, in
    /// which case nothing but the fault flag changes.
    pub fn observe(&mut self, sample: DistanceSample, now: Instant) -> bool {
        let distance = match sample {
            Ok(distance) => distance,
            Err(fault) => {
                if !self.slot.is_sensor_faulty {
                    warn!(slot = self.slot.id, error = %fault, "Slot sensor fault");
                }
                self.slot.is_sensor_faulty = true;
                return false;
            }
        };

        if self.slot.is_sensor_faulty {
            info!(slot = self.slot.id, distance_cm = distance, "Slot sensor recovered");
        }
        self.slot.is_sensor_faulty = false;
        self.slot.last_valid_distance = Some(distance);

        let occupied = distance < self.timing.parking_threshold_cm;
        if occupied && !self.slot.is_car_present {
            self.slot.is_car_present = true;
            self.slot.car_arrived_time = Some(now);
            debug!(slot = self.slot.id, distance_cm = distance, "Car detected in slot");
            self.set_indicator(true);
        } else if !occupied && self.slot.is_car_present {
            self.slot.is_car_present = false;
            self.slot.car_left_time = Some(now);
            debug!(slot = self.slot.id, distance_cm = distance, "Slot cleared");
            self.set_indicator(false);
        }
        true
    }

    /// Latch the parked state once the dwell since the last presence change has elapsed.
    pub fn confirm(&mut self, now: Instant) -> Option<SlotEvent> {
        let slot = &mut self.slot;
        if slot.is_car_present && !slot.is_car_parked {
            let since = slot.car_arrived_time?;
            if now.saturating_duration_since(since) >= self.timing.parking_time_entry {
                slot.is_car_parked = true;
                info!(slot = slot.id, "Car parked");
                return Some(SlotEvent::CarArrived(slot.id));
            }
        } else if !slot.is_car_present && slot.is_car_parked {
            let since = slot.car_left_time?;
            if now.saturating_duration_since(since) >= self.timing.parking_time_exit {
                slot.is_car_parked = false;
                info!(slot = slot.id, "Car left slot");
                return Some(SlotEvent::CarLeft(slot.id));
            }
        }
        None
    }

    /// Undo the latch behind `event` so the next `confirm` emits it again.
    pub fn retract(&mut self, event: SlotEvent) {
        if event.slot() != self.slot.id {
            return;
        }
        self.slot.is_car_parked = matches!(event, SlotEvent::CarLeft(_));
        debug!(slot = self.slot.id, event = event.wire_type(), "Slot confirmation held back");
    }

    fn set_indicator(&mut self, on: bool) {
        if let Err(err) = self.indicator.set(on) {
            warn!(slot = self.slot.id, on, error = %err, "Failed to drive slot indicator");
        }
    }
}
