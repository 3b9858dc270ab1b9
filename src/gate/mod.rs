//! Entry and exit gate controllers.
//!
//! Both gates share the same debounce: the barrier only moves after the IR
//! reading has stayed on one side of the detection threshold for a full
//! window. What happens between "car waited long enough" and "barrier opens"
//! differs per gate and lives in [`entry`] and [`exit`].

use crate::actuator::{Indicator, Servo};
use crate::sensor::IrSensor;
use crate::state::{GateEvent, GateState};
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{info, warn};

pub mod entry;
pub mod exit;

pub const DEFAULT_DETECTION_THRESHOLD: u16 = 1000;
pub const DEFAULT_GATE_WAIT: Duration = Duration::from_millis(5_000);
pub const DEFAULT_GATE_CLOSE_WAIT: Duration = Duration::from_millis(3_000);
pub const DEFAULT_OPEN_ANGLE: u8 = 90;
pub const DEFAULT_CLOSED_ANGLE: u8 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateTiming {
    /// Raw IR readings strictly below this count as a vehicle.
    pub detection_threshold: u16,
    pub gate_wait: Duration,
    pub gate_close_wait: Duration,
    pub open_angle: u8,
    pub closed_angle: u8,
}

impl Default for GateTiming {
    fn default() -> Self {
        Self {
            detection_threshold: DEFAULT_DETECTION_THRESHOLD,
            gate_wait: DEFAULT_GATE_WAIT,
            gate_close_wait: DEFAULT_GATE_CLOSE_WAIT,
            open_angle: DEFAULT_OPEN_ANGLE,
            closed_angle: DEFAULT_CLOSED_ANGLE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateRole {
    Entry,
    Exit,
}

impl fmt::Display for GateRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GateRole::Entry => f.write_str("entry"),
            GateRole::Exit => f.write_str("exit"),
        }
    }
}

/// The IR sensor, barrier servo and LED belonging to one gate.
pub struct GateHardware {
    role: GateRole,
    ir: Box<dyn IrSensor + Send>,
    servo: Box<dyn Servo + Send>,
    led: Box<dyn Indicator + Send>,
    last_reading: Option<u16>,
}

impl GateHardware {
    pub fn new(
        role: GateRole,
        ir: Box<dyn IrSensor + Send>,
        servo: Box<dyn Servo + Send>,
        led: Box<dyn Indicator + Send>,
    ) -> Self {
        Self {
            role,
            ir,
            servo,
            led,
            last_reading: None,
        }
    }

    pub fn role(&self) -> GateRole {
        self.role
    }

    /// Raw reading from the most recent tick, `None` if it faulted.
    pub fn last_reading(&self) -> Option<u16> {
        self.last_reading
    }

    /// Returns whether a vehicle is in front of the gate, or `None` on a sensor fault.
    fn sense(&mut self, threshold: u16) -> Option<bool> {
        match self.ir.read_raw() {
            Ok(raw) => {
                self.last_reading = Some(raw);
                Some(raw < threshold)
            }
            Err(fault) => {
                if self.last_reading.is_some() {
                    warn!(gate = %self.role, error = %fault, "Gate IR sensor fault");
                }
                self.last_reading = None;
                None
            }
        }
    }

    fn drive(&mut self, angle: u8, led_on: bool) {
        if let Err(err) = self.led.set(led_on) {
            warn!(gate = %self.role, error = %err, "Failed to drive gate LED");
        }
        if let Err(err) = self.servo.set_angle(angle) {
            warn!(gate = %self.role, angle, error = %err, "Failed to drive gate servo");
        }
    }

    fn open(&mut self, timing: &GateTiming) {
        info!(gate = %self.role, "Opening gate");
        self.drive(timing.open_angle, true);
    }

    fn close(&mut self, timing: &GateTiming) {
        info!(gate = %self.role, "Closing gate");
        self.drive(timing.closed_angle, false);
    }
}

/// Close an open gate once the lane has been clear for the full close window.
fn close_when_clear(
    state: &mut GateState,
    hardware: &mut GateHardware,
    timing: &GateTiming,
    now: Instant,
) -> Option<GateEvent> {
    let clear_for = state.track_clearance(now)?;
    if clear_for < timing.gate_close_wait {
        return None;
    }
    hardware.close(timing);
    state.mark_closed();
    Some(GateEvent::Closed)
}
