//! MCP3208 12-bit ADC over SPI, used to sample the analog gate IR sensors.
//!
//! Both gates read from the same converter on different channels, so the SPI
//! handle is shared behind a mutex and each gate owns an [`AdcChannel`].

use crate::error::AppError;
use crate::sensor::{IrSensor, SensorFault};

#[cfg(target_os = "linux")]
use rppal::spi::{Bus, Mode, SlaveSelect, Spi};
#[cfg(target_os = "linux")]
use std::sync::{Arc, Mutex};
#[cfg(target_os = "linux")]
use tracing::warn;

pub const CHANNEL_COUNT: u8 = 8;
pub const ADC_MAX: u16 = 4095;
#[cfg(target_os = "linux")]
const SPI_CLOCK_HZ: u32 = 1_000_000;

/// Command bytes for a single-ended conversion on `channel`.
pub fn single_ended_command(channel: u8) -> [u8; 3] {
    [0x06 | (channel >> 2), (channel & 0x03) << 6, 0x00]
}

/// Extract the 12-bit result from the converter's reply.
pub fn decode_reply(reply: &[u8; 3]) -> u16 {
    (u16::from(reply[1] & 0x0F) << 8) | u16::from(reply[2])
}

#[cfg(target_os = "linux")]
#[derive(Clone)]
pub struct Mcp3208 {
    spi: Arc<Mutex<Spi>>,
}

#[cfg(target_os = "linux")]
impl Mcp3208 {
    pub fn new() -> Result<Self, AppError> {
        let spi = Spi::new(Bus::Spi0, SlaveSelect::Ss0, SPI_CLOCK_HZ, Mode::Mode0)
            .map_err(|err| AppError::Spi(err.to_string()))?;
        Ok(Self {
            spi: Arc::new(Mutex::new(spi)),
        })
    }

    pub fn channel(&self, channel: u8) -> Result<AdcChannel, AppError> {
        if channel >= CHANNEL_COUNT {
            return Err(AppError::InvalidChannel(channel));
        }
        Ok(AdcChannel {
            adc: self.clone(),
            channel,
        })
    }

    fn read(&self, channel: u8) -> Result<u16, AppError> {
        let command = single_ended_command(channel);
        let mut reply = [0u8; 3];
        let spi = self.spi.lock().map_err(|_| AppError::HardwareLock)?;
        spi.transfer(&mut reply, &command)
            .map_err(|err| AppError::Spi(err.to_string()))?;
        Ok(decode_reply(&reply))
    }
}

#[cfg(target_os = "linux")]
pub struct AdcChannel {
    adc: Mcp3208,
    channel: u8,
}

#[cfg(target_os = "linux")]
impl IrSensor for AdcChannel {
    fn read_raw(&mut self) -> Result<u16, SensorFault> {
        self.adc.read(self.channel).map_err(|err| {
            warn!(channel = self.channel, error = %err, "ADC read failed");
            SensorFault::Bus
        })
    }
}

#[cfg(not(target_os = "linux"))]
#[derive(Clone)]
pub struct Mcp3208;

#[cfg(not(target_os = "linux"))]
impl Mcp3208 {
    pub fn new() -> Result<Self, AppError> {
        Err(AppError::Unsupported("MCP3208 driver"))
    }

    pub fn channel(&self, channel: u8) -> Result<AdcChannel, AppError> {
        if channel >= CHANNEL_COUNT {
            return Err(AppError::InvalidChannel(channel));
        }
        Ok(AdcChannel)
    }
}

#[cfg(not(target_os = "linux"))]
pub struct AdcChannel;

#[cfg(not(target_os = "linux"))]
impl IrSensor for AdcChannel {
    fn read_raw(&mut self) -> Result<u16, SensorFault> {
        Err(SensorFault::Bus)
    }
}
