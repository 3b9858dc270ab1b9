use crate::error::AppError;
use crate::sensor::{DistanceSample, DistanceSensor, SensorFault};
use std::time::Duration;

#[cfg(target_os = "linux")]
use crate::sensor::echo_to_cm;
#[cfg(target_os = "linux")]
use rppal::gpio::{Gpio, InputPin, OutputPin};
#[cfg(target_os = "linux")]
use std::time::Instant;

#[cfg(target_os = "linux")]
const TRIGGER_SETTLE: Duration = Duration::from_micros(2);
#[cfg(target_os = "linux")]
const TRIGGER_PULSE: Duration = Duration::from_micros(10);

#[cfg(target_os = "linux")]
pub struct HcSr04 {
    trig: OutputPin,
    echo: InputPin,
    timeout: Duration,
}

#[cfg(target_os = "linux")]
impl HcSr04 {
    pub fn new(trig_pin: u8, echo_pin: u8, timeout: Duration) -> Result<Self, AppError> {
        let gpio = Gpio::new().map_err(|err| AppError::Gpio(err.to_string()))?;
        let trig = gpio
            .get(trig_pin)
            .map_err(|err| AppError::Gpio(err.to_string()))?
            .into_output_low();
        let echo = gpio
            .get(echo_pin)
            .map_err(|err| AppError::Gpio(err.to_string()))?
            .into_input();
        Ok(Self {
            trig,
            echo,
            timeout,
        })
    }

    fn pulse_trigger(&mut self) {
        self.trig.set_low();
        spin_for(TRIGGER_SETTLE);
        self.trig.set_high();
        spin_for(TRIGGER_PULSE);
        self.trig.set_low();
    }
}

#[cfg(target_os = "linux")]
impl DistanceSensor for HcSr04 {
    fn measure_cm(&mut self) -> DistanceSample {
        self.pulse_trigger();

        // Both the wait for the rising edge and the pulse itself share one budget.
        let started = Instant::now();
        while self.echo.is_low() {
            if started.elapsed() >= self.timeout {
                return Err(SensorFault::NoEcho);
            }
        }

        let rising = Instant::now();
        while self.echo.is_high() {
            if started.elapsed() >= self.timeout {
                return Err(SensorFault::EchoStuck);
            }
        }

        let width_us = rising.elapsed().as_micros() as u64;
        Ok(echo_to_cm(width_us))
    }
}

#[cfg(target_os = "linux")]
fn spin_for(duration: Duration) {
    let start = Instant::now();
    while start.elapsed() < duration {
        std::hint::spin_loop();
    }
}

#[cfg(not(target_os = "linux"))]
pub struct HcSr04;

#[cfg(not(target_os = "linux"))]
impl HcSr04 {
    pub fn new(_trig_pin: u8, _echo_pin: u8, _timeout: Duration) -> Result<Self, AppError> {
        Err(AppError::Unsupported("HC-SR04 driver"))
    }
}

#[cfg(not(target_os = "linux"))]
impl DistanceSensor for HcSr04 {
    fn measure_cm(&mut self) -> DistanceSample {
        Err(SensorFault::Bus)
    }
}
