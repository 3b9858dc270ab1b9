use parkflow::actuator::mock::ActuatorLog;
use parkflow::control::ControlLoop;
use parkflow::gate::entry::{EntryGate, FixedClassifier};
use parkflow::gate::exit::ExitGate;
use parkflow::gate::{GateHardware, GateRole, GateTiming};
use parkflow::remote::VehicleClass;
use parkflow::remote::mock::{MockReply, ScriptedCoordinator};
use parkflow::sensor::mock::{ScriptedDistanceSensor, ScriptedIrSensor};
use parkflow::slot::{SlotMonitor, SlotTiming};
use parkflow::state::{EntryAssignment, GateEvent, GatePhase, SlotEvent};
use std::time::{Duration, Instant};

const TICK: Duration = Duration::from_millis(500);
const CAR: u16 = 400;
const EMPTY: u16 = 3700;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Seen {
    Slot(SlotEvent),
    Entry(GateEvent),
    Exit(GateEvent),
}

fn slot(id: u8, sensor: ScriptedDistanceSensor, log: &ActuatorLog) -> SlotMonitor {
    SlotMonitor::new(
        id,
        Box::new(sensor),
        Box::new(log.indicator(&format!("slot{id}"))),
        SlotTiming::default(),
    )
}

fn entry_gate(ir: ScriptedIrSensor, log: &ActuatorLog) -> EntryGate {
    EntryGate::new(
        GateHardware::new(
            GateRole::Entry,
            Box::new(ir),
            Box::new(log.servo("entry")),
            Box::new(log.indicator("entry")),
        ),
        Box::new(FixedClassifier(VehicleClass::FourWheeler)),
        GateTiming::default(),
    )
}

fn exit_gate(ir: ScriptedIrSensor, log: &ActuatorLog) -> ExitGate {
    ExitGate::new(
        GateHardware::new(
            GateRole::Exit,
            Box::new(ir),
            Box::new(log.servo("exit")),
            Box::new(log.indicator("exit")),
        ),
        GateTiming::default(),
        Some(Duration::from_secs(120)),
    )
}

fn run(
    control: &mut ControlLoop<ScriptedCoordinator>,
    start: Instant,
    ticks: std::ops::Range<u32>,
) -> Vec<(u32, Seen)> {
    let mut seen = Vec::new();
    for tick in ticks {
        let now = start + TICK * tick;
        control.maintain_link(now, Duration::from_secs(10));
        let report = control.tick(now);
        seen.extend(report.slot_events.into_iter().map(|e| (tick, Seen::Slot(e))));
        seen.extend(report.entry_events.into_iter().map(|e| (tick, Seen::Entry(e))));
        seen.extend(report.exit_events.into_iter().map(|e| (tick, Seen::Exit(e))));
    }
    seen
}

#[test]
fn car_enters_parks_leaves_and_exits() {
    let log = ActuatorLog::new();
    let mut samples = vec![Ok(90.0); 30];
    samples.extend(vec![Ok(3.0); 30]);
    samples.push(Ok(90.0));

    let mut exit_readings = vec![Ok(EMPTY); 70];
    exit_readings.extend(vec![Ok(CAR); 12]);
    exit_readings.push(Ok(EMPTY));

    let remote = ScriptedCoordinator::new()
        .with_assignments(vec![MockReply::Ok(EntryAssignment {
            slot: 1,
            passkey: 7311,
        })])
        .with_exit_codes(vec![MockReply::Ok("2718".to_string())])
        .with_approvals(vec![MockReply::Ok(false), MockReply::Ok(true)]);

    let mut control = ControlLoop::new(
        vec![
            slot(1, ScriptedDistanceSensor::new(samples), &log),
            slot(2, ScriptedDistanceSensor::constant(120.0), &log),
        ],
        entry_gate(ScriptedIrSensor::pass(CAR, 11, EMPTY), &log),
        exit_gate(ScriptedIrSensor::new(exit_readings), &log),
        remote,
    );
    let start = Instant::now();

    let seen = run(&mut control, start, 0..100);

    assert_eq!(
        seen,
        vec![
            (10, Seen::Entry(GateEvent::Opened)),
            (17, Seen::Entry(GateEvent::Closed)),
            (50, Seen::Slot(SlotEvent::CarArrived(1))),
            (80, Seen::Slot(SlotEvent::CarLeft(1))),
            (80, Seen::Exit(GateEvent::ExitCodeIssued)),
            (81, Seen::Exit(GateEvent::Opened)),
            (88, Seen::Exit(GateEvent::Closed)),
        ]
    );

    let remote = control.remote();
    assert_eq!(
        remote.notified,
        vec![SlotEvent::CarArrived(1), SlotEvent::CarLeft(1)]
    );
    assert_eq!(remote.entry_requests, vec![VehicleClass::FourWheeler]);
    assert_eq!(remote.exit_code_requests, 1);
    assert_eq!(remote.approval_polls, 2);
    assert_eq!(control.entry().phase(), GatePhase::Idle);
    assert_eq!(control.exit().phase(), GatePhase::Idle);
    assert!(!control.slots()[1].slot().is_car_parked);
}

#[test]
fn slot_parks_at_twenty_first_tick() {
    let log = ActuatorLog::new();
    let mut control = ControlLoop::new(
        vec![slot(1, ScriptedDistanceSensor::new(vec![Ok(3.0); 21]), &log)],
        entry_gate(ScriptedIrSensor::constant(EMPTY), &log),
        exit_gate(ScriptedIrSensor::constant(EMPTY), &log),
        ScriptedCoordinator::new(),
    );
    let start = Instant::now();

    // First tick at t = 0 is tick 1.
    assert!(run(&mut control, start, 0..1).is_empty());
    assert!(control.slots()[0].slot().is_car_present);
    assert!(!control.slots()[0].slot().is_car_parked);

    assert!(run(&mut control, start, 1..20).is_empty());
    let seen = run(&mut control, start, 20..21);

    assert_eq!(seen, vec![(20, Seen::Slot(SlotEvent::CarArrived(1)))]);
    assert!(control.slots()[0].slot().is_car_parked);
    assert!(log.actions().contains(&"led:slot1:on".to_string()));
}

#[test]
fn entry_assignment_called_once_over_eleven_ticks() {
    let log = ActuatorLog::new();
    let mut control = ControlLoop::new(
        vec![slot(1, ScriptedDistanceSensor::constant(90.0), &log)],
        entry_gate(ScriptedIrSensor::constant(CAR), &log),
        exit_gate(ScriptedIrSensor::constant(EMPTY), &log),
        ScriptedCoordinator::new(),
    );

    let seen = run(&mut control, Instant::now(), 0..11);

    assert_eq!(seen, vec![(10, Seen::Entry(GateEvent::Opened))]);
    assert_eq!(control.remote().entry_requests.len(), 1);
}

#[test]
fn entry_gate_stays_closed_when_assignment_fails() {
    let log = ActuatorLog::new();
    let remote = ScriptedCoordinator::new().with_assignments(vec![MockReply::Fail; 20]);
    let mut control = ControlLoop::new(
        vec![slot(1, ScriptedDistanceSensor::constant(90.0), &log)],
        entry_gate(ScriptedIrSensor::constant(CAR), &log),
        exit_gate(ScriptedIrSensor::constant(EMPTY), &log),
        remote,
    );
    log.clear();

    let seen = run(&mut control, Instant::now(), 0..11);

    assert!(seen.is_empty());
    assert_eq!(control.entry().phase(), GatePhase::Detecting);
    assert!(!log.actions().iter().any(|a| a.starts_with("servo:entry")));
}

#[test]
fn exit_opens_on_sixth_poll() {
    let log = ActuatorLog::new();
    let mut approvals = vec![MockReply::Ok(false); 5];
    approvals.push(MockReply::Ok(true));
    let remote = ScriptedCoordinator::new().with_approvals(approvals);
    let mut control = ControlLoop::new(
        vec![slot(1, ScriptedDistanceSensor::constant(90.0), &log)],
        entry_gate(ScriptedIrSensor::constant(EMPTY), &log),
        exit_gate(ScriptedIrSensor::constant(CAR), &log),
        remote,
    );

    let seen = run(&mut control, Instant::now(), 0..20);

    assert_eq!(
        seen,
        vec![
            (10, Seen::Exit(GateEvent::ExitCodeIssued)),
            (15, Seen::Exit(GateEvent::Opened)),
        ]
    );
    assert_eq!(control.remote().exit_code_requests, 1);
    assert_eq!(control.remote().approval_polls, 6);
}

#[test]
fn faulty_slot_sensor_reports_nothing() {
    let log = ActuatorLog::new();
    let mut control = ControlLoop::new(
        vec![slot(1, ScriptedDistanceSensor::faulty(), &log)],
        entry_gate(ScriptedIrSensor::constant(EMPTY), &log),
        exit_gate(ScriptedIrSensor::constant(EMPTY), &log),
        ScriptedCoordinator::new(),
    );

    assert!(run(&mut control, Instant::now(), 0..40).is_empty());
    assert!(control.slots()[0].slot().is_sensor_faulty);
    assert_eq!(control.diagnostics_line(), "3700\t3700\tERR\t");
}
