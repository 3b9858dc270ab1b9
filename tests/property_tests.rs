//! Property tests for slot debounce and gate timing.

use parkflow::actuator::mock::ActuatorLog;
use parkflow::gate::entry::{EntryGate, FixedClassifier};
use parkflow::gate::{GateHardware, GateRole, GateTiming};
use parkflow::remote::VehicleClass;
use parkflow::remote::mock::ScriptedCoordinator;
use parkflow::sensor::mock::{ScriptedDistanceSensor, ScriptedIrSensor};
use parkflow::sensor::{DistanceSample, SensorFault};
use parkflow::slot::{SlotMonitor, SlotTiming};
use parkflow::state::{GateEvent, SlotEvent};
use proptest::prelude::*;
use std::time::{Duration, Instant};

const TICK: Duration = Duration::from_millis(500);
const DWELL_TICKS: u32 = 4;
const THRESHOLD_CM: f32 = 4.0;

fn monitor(log: &ActuatorLog) -> SlotMonitor {
    SlotMonitor::new(
        1,
        Box::new(ScriptedDistanceSensor::faulty()),
        Box::new(log.indicator("slot1")),
        SlotTiming {
            parking_threshold_cm: THRESHOLD_CM,
            parking_time_entry: TICK * DWELL_TICKS,
            parking_time_exit: TICK * DWELL_TICKS,
        },
    )
}

fn arb_sample() -> impl Strategy<Value = DistanceSample> {
    prop_oneof![
        3 => (0.0f32..3.99).prop_map(DistanceSample::Ok),
        3 => (4.0f32..300.0).prop_map(DistanceSample::Ok),
        1 => Just(DistanceSample::Err(SensorFault::NoEcho)),
        1 => Just(DistanceSample::Err(SensorFault::EchoStuck)),
    ]
}

/// Runs of repeated samples so dwell windows are actually reached.
fn arb_samples() -> impl Strategy<Value = Vec<DistanceSample>> {
    proptest::collection::vec((arb_sample(), 1usize..12), 0..30).prop_map(|runs| {
        runs.into_iter()
            .flat_map(|(sample, count)| std::iter::repeat_n(sample, count))
            .collect()
    })
}

proptest! {
    /// Parked only flips after an unbroken run of matching valid samples as
    /// long as the dwell, and every flip yields exactly one event.
    #[test]
    fn parked_follows_debounced_presence(samples in arb_samples()) {
        let log = ActuatorLog::new();
        let mut slot = monitor(&log);
        let start = Instant::now();

        let mut present = false;
        let mut parked = false;
        let mut run_start = 0u32;
        let mut arrivals = 0usize;
        let mut departures = 0usize;

        for (tick, sample) in samples.into_iter().enumerate() {
            let tick = tick as u32;
            let event = slot.update(sample, start + TICK * tick);

            if let Ok(distance) = sample {
                let occupied = distance < THRESHOLD_CM;
                if occupied != present {
                    present = occupied;
                    run_start = tick;
                }
                if present != parked && tick - run_start >= DWELL_TICKS {
                    parked = present;
                }
            }

            match event {
                Some(SlotEvent::CarArrived(1)) => {
                    arrivals += 1;
                    prop_assert!(parked);
                }
                Some(SlotEvent::CarLeft(1)) => {
                    departures += 1;
                    prop_assert!(!parked);
                }
                Some(other) => prop_assert!(false, "unexpected event {other:?}"),
                None => {}
            }
            prop_assert_eq!(slot.slot().is_car_present, present);
            prop_assert_eq!(slot.slot().is_car_parked, parked);
            prop_assert!(arrivals == departures || arrivals == departures + 1);
        }
    }

    /// A fault sample only ever touches the fault flag.
    #[test]
    fn faults_leave_state_untouched(
        samples in arb_samples(),
        faults in 1usize..20,
    ) {
        let log = ActuatorLog::new();
        let mut slot = monitor(&log);
        let start = Instant::now();
        let mut tick = 0u32;
        for sample in samples {
            slot.update(sample, start + TICK * tick);
            tick += 1;
        }

        let mut before = slot.slot().clone();
        before.is_sensor_faulty = true;
        for _ in 0..faults {
            let event = slot.update(Err(SensorFault::NoEcho), start + TICK * tick);
            tick += 1;
            prop_assert_eq!(event, None);
            prop_assert_eq!(slot.slot(), &before);
        }
    }

    /// The entry gate only opens after a full detection window and only
    /// closes after a full clear window.
    #[test]
    fn gate_respects_wait_windows(
        readings in proptest::collection::vec(
            (prop_oneof![
                3 => Just(Ok::<u16, SensorFault>(300)),
                3 => Just(Ok::<u16, SensorFault>(3500)),
                1 => Just(Err::<u16, SensorFault>(SensorFault::Bus)),
            ], 1usize..16),
            0..20,
        )
    ) {
        let readings: Vec<Result<u16, SensorFault>> = readings
            .into_iter()
            .flat_map(|(reading, count)| std::iter::repeat_n(reading, count))
            .collect();
        let timing = GateTiming::default();
        let wait_ticks = (timing.gate_wait.as_millis() / TICK.as_millis()) as u32;
        let close_ticks = (timing.gate_close_wait.as_millis() / TICK.as_millis()) as u32;

        let log = ActuatorLog::new();
        let mut gate = EntryGate::new(
            GateHardware::new(
                GateRole::Entry,
                Box::new(ScriptedIrSensor::new(readings.clone())),
                Box::new(log.servo("entry")),
                Box::new(log.indicator("entry")),
            ),
            Box::new(FixedClassifier(VehicleClass::TwoWheeler)),
            timing,
        );
        let mut remote = ScriptedCoordinator::new();
        let start = Instant::now();

        let mut detected_since: Option<u32> = None;
        let mut clear_since: Option<u32> = None;
        for (tick, reading) in readings.iter().enumerate() {
            let tick = tick as u32;
            match reading {
                Ok(raw) if *raw < timing.detection_threshold => {
                    detected_since.get_or_insert(tick);
                    clear_since = None;
                }
                Ok(_) => {
                    detected_since = None;
                    clear_since.get_or_insert(tick);
                }
                Err(_) => {}
            }

            for event in gate.check(&mut remote, start + TICK * tick) {
                match event {
                    GateEvent::Opened => {
                        let since = detected_since.unwrap_or(tick);
                        prop_assert!(tick - since >= wait_ticks);
                        clear_since = None;
                    }
                    GateEvent::Closed => {
                        let since = clear_since.unwrap_or(tick);
                        prop_assert!(tick - since >= close_ticks);
                    }
                    other => prop_assert!(false, "unexpected event {other:?}"),
                }
            }
        }
    }
}
