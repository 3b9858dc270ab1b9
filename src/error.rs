use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("gpio error: {0}")]
    Gpio(String),
    #[error("spi error: {0}")]
    Spi(String),
    #[error("actuator error: {0}")]
    Actuator(String),
    #[error("adc channel out of range: {0}")]
    InvalidChannel(u8),
    #[error("hardware lock poisoned")]
    HardwareLock,
    #[error("{0} requires Linux/Raspberry Pi")]
    Unsupported(&'static str),
}
