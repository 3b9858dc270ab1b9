use crate::gate::entry::EntryGate;
use crate::gate::exit::ExitGate;
use crate::remote::RemoteCoordinator;
use crate::slot::SlotMonitor;
use crate::state::{GateEvent, ParkingSlot, SlotEvent};
use std::fmt::Write as _;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{info, warn};

pub const DIAGNOSTICS_TARGET: &str = "parkflow::diagnostics";

/// Everything that happened during one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub slot_events: Vec<SlotEvent>,
    pub entry_events: Vec<GateEvent>,
    pub exit_events: Vec<GateEvent>,
    pub diagnostics: String,
}

pub struct ControlLoop<R: RemoteCoordinator> {
    slots: Vec<SlotMonitor>,
    entry: EntryGate,
    exit: ExitGate,
    remote: R,
    last_reconnect: Option<Instant>,
}

impl<R: RemoteCoordinator> ControlLoop<R> {
    pub fn new(slots: Vec<SlotMonitor>, entry: EntryGate, exit: ExitGate, remote: R) -> Self {
        Self {
            slots,
            entry,
            exit,
            remote,
            last_reconnect: None,
        }
    }

    pub fn slots(&self) -> &[SlotMonitor] {
        &self.slots
    }

    pub fn entry(&self) -> &EntryGate {
        &self.entry
    }

    pub fn exit(&self) -> &ExitGate {
        &self.exit
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    pub fn remote_mut(&mut self) -> &mut R {
        &mut self.remote
    }

    /// Run one pass: every slot in order, then the entry gate, then the exit gate.
    pub fn tick(&mut self, now: Instant) -> TickReport {
        let mut slot_events = Vec::new();
        for monitor in self.slots.iter_mut() {
            let sample = monitor.measure();
            if !monitor.observe(sample, now) {
                continue;
            }
            // Dwell confirmation is held back while the link is down.
            if !self.remote.is_link_up() {
                continue;
            }
            let Some(event) = monitor.confirm(now) else {
                continue;
            };
            match self.remote.notify_slot_event(event) {
                Ok(status) => {
                    info!(
                        slot = event.slot(),
                        event = event.wire_type(),
                        status,
                        "Slot event reported"
                    );
                }
                Err(err) if err.is_link_loss() => {
                    warn!(
                        slot = event.slot(),
                        event = event.wire_type(),
                        error = %err,
                        "Coordination link lost, slot event held until reconnect"
                    );
                    monitor.retract(event);
                    continue;
                }
                Err(err) => {
                    warn!(
                        slot = event.slot(),
                        event = event.wire_type(),
                        kind = ?err.kind(),
                        error = %err,
                        "Failed to report slot event"
                    );
                }
            }
            slot_events.push(event);
        }

        let entry_events = self.entry.check(&mut self.remote, now);
        let exit_events = self.exit.check(&mut self.remote, now);

        TickReport {
            slot_events,
            entry_events,
            exit_events,
            diagnostics: self.diagnostics_line(),
        }
    }

    /// Attempt a reconnect if the link is down and the retry interval has passed.
    /// Returns whether the link is up afterwards.
    pub fn maintain_link(&mut self, now: Instant, retry_interval: Duration) -> bool {
        if self.remote.is_link_up() {
            self.last_reconnect = None;
            return true;
        }
        let due = self
            .last_reconnect
            .is_none_or(|at| now.saturating_duration_since(at) >= retry_interval);
        if !due {
            return false;
        }
        self.last_reconnect = Some(now);
        warn!("Coordination link down, attempting reconnect");
        self.remote.reconnect()
    }

    /// Tick at a fixed cadence until `stop` is set.
    pub fn run(&mut self, stop: &AtomicBool, tick_interval: Duration, retry_interval: Duration) {
        info!(
            slots = self.slots.len(),
            interval_ms = tick_interval.as_millis(),
            "Control loop started"
        );
        while !stop.load(Ordering::Relaxed) {
            let cycle_start = Instant::now();
            self.maintain_link(cycle_start, retry_interval);

            let report = self.tick(Instant::now());
            info!(target: DIAGNOSTICS_TARGET, "{}", report.diagnostics);

            sleep_with_stop(tick_interval, stop, cycle_start);
        }
        info!("Control loop stopped");
    }

    pub fn diagnostics_line(&self) -> String {
        let mut line = String::new();
        for reading in [self.entry.last_reading(), self.exit.last_reading()] {
            match reading {
                Some(raw) => {
                    let _ = write!(line, "{raw}\t");
                }
                None => line.push_str("ERR\t"),
            }
        }
        for monitor in &self.slots {
            line.push_str(&slot_cell(
                monitor.slot(),
                monitor.timing().parking_threshold_cm,
            ));
            line.push('\t');
        }
        line
    }
}

/// `YES` for an occupied slot, the distance for a free one, `ERR` when the
/// sensor is faulty or has never produced a reading.
pub fn slot_cell(slot: &ParkingSlot, threshold_cm: f32) -> String {
    if slot.is_sensor_faulty {
        return "ERR".to_string();
    }
    match slot.last_valid_distance {
        Some(distance) if distance < threshold_cm => "YES".to_string(),
        Some(distance) => format!("{distance:.1}cm"),
        None => "ERR".to_string(),
    }
}

fn sleep_with_stop(duration: Duration, stop: &AtomicBool, start: Instant) {
    let elapsed = start.elapsed();
    if elapsed >= duration {
        return;
    }
    let remaining = duration - elapsed;
    let step = Duration::from_millis(50).min(remaining);
    let mut slept = Duration::ZERO;

    while slept < remaining {
        if stop.load(Ordering::Relaxed) {
            break;
        }
        std::thread::sleep(step);
        slept += step;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuator::mock::ActuatorLog;
    use crate::gate::entry::FixedClassifier;
    use crate::gate::{GateHardware, GateRole, GateTiming};
    use crate::remote::VehicleClass;
    use crate::remote::mock::{MockReply, ScriptedCoordinator};
    use crate::sensor::mock::{ScriptedDistanceSensor, ScriptedIrSensor};
    use crate::sensor::{DistanceSample, SensorFault};
    use crate::slot::SlotTiming;

    const TICK: Duration = Duration::from_millis(500);
    const EMPTY_LANE: u16 = 3900;

    fn build(
        slot_scripts: Vec<Vec<DistanceSample>>,
        remote: ScriptedCoordinator,
        log: &ActuatorLog,
    ) -> ControlLoop<ScriptedCoordinator> {
        let slots = slot_scripts
            .into_iter()
            .enumerate()
            .map(|(index, script)| {
                let id = (index + 1) as u8;
                SlotMonitor::new(
                    id,
                    Box::new(ScriptedDistanceSensor::new(script)),
                    Box::new(log.indicator(&format!("slot{id}"))),
                    SlotTiming::default(),
                )
            })
            .collect();
        let entry = EntryGate::new(
            GateHardware::new(
                GateRole::Entry,
                Box::new(ScriptedIrSensor::constant(EMPTY_LANE)),
                Box::new(log.servo("entry")),
                Box::new(log.indicator("entry")),
            ),
            Box::new(FixedClassifier(VehicleClass::FourWheeler)),
            GateTiming::default(),
        );
        let exit = ExitGate::new(
            GateHardware::new(
                GateRole::Exit,
                Box::new(ScriptedIrSensor::new(vec![Err(SensorFault::Bus)])),
                Box::new(log.servo("exit")),
                Box::new(log.indicator("exit")),
            ),
            GateTiming::default(),
            None,
        );
        ControlLoop::new(slots, entry, exit, remote)
    }

    #[test]
    fn diagnostics_line_formats_each_column() {
        let log = ActuatorLog::new();
        let mut control = build(
            vec![
                vec![Ok(3.0)],
                vec![Ok(57.3)],
                vec![Err(SensorFault::NoEcho)],
                vec![Ok(4.0)],
            ],
            ScriptedCoordinator::new(),
            &log,
        );

        let report = control.tick(Instant::now());

        assert_eq!(report.diagnostics, "3900\tERR\tYES\t57.3cm\tERR\t4.0cm\t");
    }

    #[test]
    fn slot_cell_before_first_reading_is_err() {
        let slot = ParkingSlot::new(1);
        assert_eq!(slot_cell(&slot, 4.0), "ERR");
    }

    #[test]
    fn slot_events_are_reported_once() {
        let log = ActuatorLog::new();
        let mut control = build(
            vec![vec![Ok(3.0)], vec![Ok(90.0)]],
            ScriptedCoordinator::new(),
            &log,
        );
        let start = Instant::now();

        let mut events = Vec::new();
        for tick in 0..40 {
            events.extend(control.tick(start + TICK * tick).slot_events);
        }

        assert_eq!(events, vec![SlotEvent::CarArrived(1)]);
        assert_eq!(control.remote().notified, vec![SlotEvent::CarArrived(1)]);
    }

    #[test]
    fn failed_notification_still_latches_state() {
        let log = ActuatorLog::new();
        let remote = ScriptedCoordinator::new().with_notify_replies(vec![MockReply::Fail]);
        let mut control = build(vec![vec![Ok(3.0)]], remote, &log);
        let start = Instant::now();

        for tick in 0..30 {
            control.tick(start + TICK * tick);
        }

        assert!(control.slots()[0].slot().is_car_parked);
        assert_eq!(control.remote().notified.len(), 1);
    }

    #[test]
    fn link_loss_defers_slot_confirmation_until_reconnect() {
        let log = ActuatorLog::new();
        let mut control = build(vec![vec![Ok(3.0)]], ScriptedCoordinator::new(), &log);
        control.remote_mut().set_link_up(false);
        control.remote_mut().set_reconnect_succeeds(false);
        let start = Instant::now();

        for tick in 0..30 {
            let now = start + TICK * tick;
            control.maintain_link(now, Duration::from_secs(10));
            assert!(control.tick(now).slot_events.is_empty());
        }
        assert!(control.slots()[0].slot().is_car_present);
        assert!(!control.slots()[0].slot().is_car_parked);
        // One attempt at tick 0, then one every 10 s.
        assert_eq!(control.remote().reconnect_attempts, 2);

        control.remote_mut().set_reconnect_succeeds(true);
        let now = start + TICK * 40;
        assert!(control.maintain_link(now, Duration::from_secs(10)));
        assert_eq!(control.tick(now).slot_events, vec![SlotEvent::CarArrived(1)]);
    }

    #[test]
    fn event_that_discovers_link_loss_is_resent_after_reconnect() {
        let log = ActuatorLog::new();
        let remote = ScriptedCoordinator::new().with_notify_replies(vec![MockReply::LinkLost]);
        let mut control = build(vec![vec![Ok(3.0)]], remote, &log);
        control.remote_mut().set_reconnect_succeeds(false);
        let start = Instant::now();

        for tick in 0..=20 {
            assert!(control.tick(start + TICK * tick).slot_events.is_empty());
        }
        assert!(!control.remote().is_link_up());
        assert!(!control.slots()[0].slot().is_car_parked);

        control.remote_mut().set_reconnect_succeeds(true);
        let now = start + TICK * 21;
        assert!(control.maintain_link(now, Duration::from_secs(10)));
        assert_eq!(control.tick(now).slot_events, vec![SlotEvent::CarArrived(1)]);
        assert!(control.slots()[0].slot().is_car_parked);
        assert_eq!(
            control.remote().notified,
            vec![SlotEvent::CarArrived(1), SlotEvent::CarArrived(1)]
        );
    }

    #[test]
    fn run_returns_once_stop_is_set() {
        let log = ActuatorLog::new();
        let mut control = build(vec![vec![Ok(3.0)]], ScriptedCoordinator::new(), &log);
        let stop = AtomicBool::new(true);

        control.run(&stop, Duration::from_millis(10), Duration::from_secs(1));

        assert!(control.remote().notified.is_empty());
    }
}
