use thiserror::Error;

pub mod hcsr04;
pub mod mcp3208;
pub mod mock;

pub type SlotId = u8;

/// Speed of sound in centimetres per microsecond at room temperature.
pub const SPEED_OF_SOUND_CM_PER_US: f32 = 0.0343;
pub const DEFAULT_ECHO_TIMEOUT_US: u64 = 20_000;

/// One ultrasonic reading in centimetres, or the reason none was produced.
pub type DistanceSample = Result<f32, SensorFault>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SensorFault {
    #[error("no echo received before timeout")]
    NoEcho,
    #[error("echo line stuck high past timeout")]
    EchoStuck,
    #[error("sensor bus unavailable")]
    Bus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotPins {
    pub trig: u8,
    pub echo: u8,
    pub led: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotSensorConfig {
    pub slot_id: SlotId,
    pub pins: SlotPins,
}

/// Ultrasonic distance source for one parking slot.
pub trait DistanceSensor {
    fn measure_cm(&mut self) -> DistanceSample;
}

/// Raw analog reflectance reading from a gate IR sensor. Lower means closer.
pub trait IrSensor {
    fn read_raw(&mut self) -> Result<u16, SensorFault>;
}

impl<T: DistanceSensor + ?Sized> DistanceSensor for Box<T> {
    fn measure_cm(&mut self) -> DistanceSample {
        (**self).measure_cm()
    }
}

impl<T: IrSensor + ?Sized> IrSensor for Box<T> {
    fn read_raw(&mut self) -> Result<u16, SensorFault> {
        (**self).read_raw()
    }
}

/// Convert an echo pulse width to a one-way distance.
pub fn echo_to_cm(echo_us: u64) -> f32 {
    (echo_us as f32 * SPEED_OF_SOUND_CM_PER_US) / 2.0
}

/// Build deterministic slot configs from an ordered list of pin triples.
pub fn build_slot_configs(pins: &[SlotPins]) -> Vec<SlotSensorConfig> {
    pins.iter()
        .enumerate()
        .map(|(index, pins)| SlotSensorConfig {
            slot_id: (index + 1) as SlotId,
            pins: *pins,
        })
        .collect()
}
