use crate::gate::{
    DEFAULT_CLOSED_ANGLE, DEFAULT_DETECTION_THRESHOLD, DEFAULT_GATE_CLOSE_WAIT, DEFAULT_GATE_WAIT,
    DEFAULT_OPEN_ANGLE, GateTiming,
};
use crate::remote::VehicleClass;
use crate::sensor::mcp3208::CHANNEL_COUNT;
use crate::sensor::{DEFAULT_ECHO_TIMEOUT_US, SlotPins, SlotSensorConfig, build_slot_configs};
use crate::slot::{
    DEFAULT_PARKING_THRESHOLD_CM, DEFAULT_PARKING_TIME_ENTRY, DEFAULT_PARKING_TIME_EXIT,
    SlotTiming,
};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 500;
pub const DEFAULT_RECONNECT_INTERVAL_MS: u64 = 10_000;
pub const DEFAULT_REMOTE_TIMEOUT_MS: u64 = 2_000;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub app: AppSection,
    pub logging: LoggingSection,
    #[serde(default)]
    pub timing: Option<TimingSection>,
    pub slots: SlotsSection,
    pub gates: GatesSection,
    pub remote: RemoteSection,
    #[serde(default)]
    pub vehicle: Option<VehicleSection>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppSection {
    pub name: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingSection {
    pub level: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct TimingSection {
    pub tick_interval_ms: Option<u64>,
    pub parking_time_entry_ms: Option<u64>,
    pub parking_time_exit_ms: Option<u64>,
    pub gate_wait_ms: Option<u64>,
    pub gate_close_wait_ms: Option<u64>,
    /// Upper bound on waiting for exit approval. Absent means wait indefinitely.
    pub approval_timeout_ms: Option<u64>,
    pub reconnect_interval_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SlotsSection {
    pub parking_threshold_cm: Option<f32>,
    pub sensor_timeout_us: Option<u64>,
    /// Pin triples in slot order; slot ids are assigned 1.. from this order.
    pub sensors: Vec<SlotPinsEntry>,
}

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct SlotPinsEntry {
    pub trig: u8,
    pub echo: u8,
    pub led: u8,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GatesSection {
    pub detection_threshold: Option<u16>,
    pub open_angle: Option<u8>,
    pub closed_angle: Option<u8>,
    pub entry: GatePins,
    pub exit: GatePins,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct GatePins {
    /// MCP3208 channel carrying the IR sensor output.
    pub ir_channel: u8,
    pub servo_pin: u8,
    pub led_pin: u8,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RemoteSection {
    pub base_url: String,
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct VehicleSection {
    pub default_class: VehicleClass,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Read(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

pub fn load_default() -> Result<Config, ConfigError> {
    load_from_path(DEFAULT_CONFIG_PATH)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&contents)?;
    config.validate()?;
    Ok(config)
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.slots.sensors.is_empty() {
            return Err(ConfigError::Invalid(
                "[slots].sensors must list at least one slot".to_string(),
            ));
        }
        if self.slots.sensors.len() > usize::from(u8::MAX) {
            return Err(ConfigError::Invalid("too many slots".to_string()));
        }

        let threshold = self.slot_timing().parking_threshold_cm;
        if !threshold.is_finite() || threshold <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "parking_threshold_cm must be positive, got {threshold}"
            )));
        }

        if self.gate_timing().detection_threshold == 0 {
            return Err(ConfigError::Invalid(
                "detection_threshold must be positive".to_string(),
            ));
        }

        if self.tick_interval().is_zero() {
            return Err(ConfigError::Invalid(
                "tick_interval_ms must be positive".to_string(),
            ));
        }

        let (entry, exit) = (self.gates.entry, self.gates.exit);
        for channel in [entry.ir_channel, exit.ir_channel] {
            if channel >= CHANNEL_COUNT {
                return Err(ConfigError::Invalid(format!(
                    "ir_channel {channel} out of range (0-{})",
                    CHANNEL_COUNT - 1
                )));
            }
        }
        if entry.ir_channel == exit.ir_channel {
            return Err(ConfigError::Invalid(
                "entry and exit gates share an IR channel".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        let gate_pins = [entry.servo_pin, entry.led_pin, exit.servo_pin, exit.led_pin];
        let slot_pins = self
            .slots
            .sensors
            .iter()
            .flat_map(|pins| [pins.trig, pins.echo, pins.led]);
        for pin in slot_pins.chain(gate_pins) {
            if !seen.insert(pin) {
                return Err(ConfigError::Invalid(format!("GPIO {pin} assigned twice")));
            }
        }

        Ok(())
    }

    /// Returns the tracing level from `[logging].level` (default: INFO).
    pub fn log_level(&self) -> tracing::Level {
        self.logging
            .level
            .parse()
            .unwrap_or(tracing::Level::INFO)
    }

    fn timing(&self) -> TimingSection {
        self.timing.clone().unwrap_or_default()
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(
            self.timing()
                .tick_interval_ms
                .unwrap_or(DEFAULT_TICK_INTERVAL_MS),
        )
    }

    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(
            self.timing()
                .reconnect_interval_ms
                .unwrap_or(DEFAULT_RECONNECT_INTERVAL_MS),
        )
    }

    pub fn approval_timeout(&self) -> Option<Duration> {
        self.timing()
            .approval_timeout_ms
            .map(Duration::from_millis)
    }

    pub fn slot_timing(&self) -> SlotTiming {
        let timing = self.timing();
        SlotTiming {
            parking_threshold_cm: self
                .slots
                .parking_threshold_cm
                .unwrap_or(DEFAULT_PARKING_THRESHOLD_CM),
            parking_time_entry: timing
                .parking_time_entry_ms
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_PARKING_TIME_ENTRY),
            parking_time_exit: timing
                .parking_time_exit_ms
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_PARKING_TIME_EXIT),
        }
    }

    pub fn gate_timing(&self) -> GateTiming {
        let timing = self.timing();
        GateTiming {
            detection_threshold: self
                .gates
                .detection_threshold
                .unwrap_or(DEFAULT_DETECTION_THRESHOLD),
            gate_wait: timing
                .gate_wait_ms
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_GATE_WAIT),
            gate_close_wait: timing
                .gate_close_wait_ms
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_GATE_CLOSE_WAIT),
            open_angle: self.gates.open_angle.unwrap_or(DEFAULT_OPEN_ANGLE),
            closed_angle: self.gates.closed_angle.unwrap_or(DEFAULT_CLOSED_ANGLE),
        }
    }

    /// Maximum wait for an ultrasonic echo before the reading counts as a fault.
    pub fn sensor_timeout(&self) -> Duration {
        Duration::from_micros(
            self.slots
                .sensor_timeout_us
                .unwrap_or(DEFAULT_ECHO_TIMEOUT_US),
        )
    }

    pub fn slot_configs(&self) -> Vec<SlotSensorConfig> {
        let pins: Vec<SlotPins> = self
            .slots
            .sensors
            .iter()
            .map(|entry| SlotPins {
                trig: entry.trig,
                echo: entry.echo,
                led: entry.led,
            })
            .collect();
        build_slot_configs(&pins)
    }

    pub fn entry_gate(&self) -> GatePins {
        self.gates.entry
    }

    pub fn exit_gate(&self) -> GatePins {
        self.gates.exit
    }

    pub fn remote_base_url(&self) -> &str {
        &self.remote.base_url
    }

    pub fn remote_timeout(&self) -> Duration {
        Duration::from_millis(self.remote.timeout_ms.unwrap_or(DEFAULT_REMOTE_TIMEOUT_MS))
    }

    /// Vehicle class used for entry assignment (default: four-wheeler).
    pub fn vehicle_class(&self) -> VehicleClass {
        self.vehicle
            .as_ref()
            .map(|section| section.default_class)
            .unwrap_or(VehicleClass::FourWheeler)
    }
}
