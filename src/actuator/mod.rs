use crate::error::AppError;

pub mod gpio;
pub mod mock;

pub const SERVO_MAX_ANGLE: u8 = 180;

pub trait Servo {
    fn set_angle(&mut self, degrees: u8) -> Result<(), AppError>;
}

pub trait Indicator {
    fn set(&mut self, on: bool) -> Result<(), AppError>;
}

impl<T: Servo + ?Sized> Servo for Box<T> {
    fn set_angle(&mut self, degrees: u8) -> Result<(), AppError> {
        (**self).set_angle(degrees)
    }
}

impl<T: Indicator + ?Sized> Indicator for Box<T> {
    fn set(&mut self, on: bool) -> Result<(), AppError> {
        (**self).set(on)
    }
}
