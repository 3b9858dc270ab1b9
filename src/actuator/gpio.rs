use crate::actuator::{Indicator, SERVO_MAX_ANGLE, Servo};
use crate::error::AppError;
use std::time::Duration;

#[cfg(target_os = "linux")]
use rppal::gpio::{Gpio, OutputPin};

pub const SERVO_PERIOD: Duration = Duration::from_millis(20);
pub const SERVO_MIN_PULSE_US: u64 = 500;
pub const SERVO_MAX_PULSE_US: u64 = 2500;

/// Pulse width for a hobby servo at `degrees`, clamped to the mechanical range.
pub fn pulse_width_for(degrees: u8) -> Duration {
    let angle = u64::from(degrees.min(SERVO_MAX_ANGLE));
    let span = SERVO_MAX_PULSE_US - SERVO_MIN_PULSE_US;
    Duration::from_micros(SERVO_MIN_PULSE_US + angle * span / u64::from(SERVO_MAX_ANGLE))
}

#[cfg(target_os = "linux")]
fn output_pin(pin: u8) -> Result<OutputPin, AppError> {
    let gpio = Gpio::new().map_err(|err| AppError::Gpio(err.to_string()))?;
    Ok(gpio
        .get(pin)
        .map_err(|err| AppError::Gpio(err.to_string()))?
        .into_output_low())
}

/// Servo driven by rppal software PWM.
#[cfg(target_os = "linux")]
pub struct PwmServo {
    pin: OutputPin,
}

#[cfg(target_os = "linux")]
impl PwmServo {
    pub fn new(pin: u8) -> Result<Self, AppError> {
        Ok(Self {
            pin: output_pin(pin)?,
        })
    }
}

#[cfg(target_os = "linux")]
impl Servo for PwmServo {
    fn set_angle(&mut self, degrees: u8) -> Result<(), AppError> {
        self.pin
            .set_pwm(SERVO_PERIOD, pulse_width_for(degrees))
            .map_err(|err| AppError::Actuator(err.to_string()))
    }
}

#[cfg(target_os = "linux")]
pub struct LedPin {
    pin: OutputPin,
}

#[cfg(target_os = "linux")]
impl LedPin {
    pub fn new(pin: u8) -> Result<Self, AppError> {
        Ok(Self {
            pin: output_pin(pin)?,
        })
    }
}

#[cfg(target_os = "linux")]
impl Indicator for LedPin {
    fn set(&mut self, on: bool) -> Result<(), AppError> {
        if on {
            self.pin.set_high();
        } else {
            self.pin.set_low();
        }
        Ok(())
    }
}

#[cfg(not(target_os = "linux"))]
pub struct PwmServo;

#[cfg(not(target_os = "linux"))]
impl PwmServo {
    pub fn new(_pin: u8) -> Result<Self, AppError> {
        Err(AppError::Unsupported("PWM servo"))
    }
}

#[cfg(not(target_os = "linux"))]
impl Servo for PwmServo {
    fn set_angle(&mut self, _degrees: u8) -> Result<(), AppError> {
        Err(AppError::Unsupported("PWM servo"))
    }
}

#[cfg(not(target_os = "linux"))]
pub struct LedPin;

#[cfg(not(target_os = "linux"))]
impl LedPin {
    pub fn new(_pin: u8) -> Result<Self, AppError> {
        Err(AppError::Unsupported("GPIO LED"))
    }
}

#[cfg(not(target_os = "linux"))]
impl Indicator for LedPin {
    fn set(&mut self, _on: bool) -> Result<(), AppError> {
        Err(AppError::Unsupported("GPIO LED"))
    }
}
