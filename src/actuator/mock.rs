use crate::actuator::{Indicator, Servo};
use crate::error::AppError;
use std::sync::{Arc, Mutex};

/// Shared, ordered record of every actuator command, e.g. `"servo:entry:90"`.
#[derive(Debug, Clone, Default)]
pub struct ActuatorLog {
    actions: Arc<Mutex<Vec<String>>>,
}

impl ActuatorLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn servo(&self, name: &str) -> RecordingServo {
        RecordingServo {
            name: name.to_string(),
            log: self.clone(),
        }
    }

    pub fn indicator(&self, name: &str) -> RecordingIndicator {
        RecordingIndicator {
            name: name.to_string(),
            log: self.clone(),
        }
    }

    pub fn actions(&self) -> Vec<String> {
        self.actions
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    pub fn clear(&self) {
        if let Ok(mut guard) = self.actions.lock() {
            guard.clear();
        }
    }

    fn push(&self, action: String) -> Result<(), AppError> {
        let mut guard = self.actions.lock().map_err(|_| AppError::HardwareLock)?;
        guard.push(action);
        Ok(())
    }
}

pub struct RecordingServo {
    name: String,
    log: ActuatorLog,
}

impl Servo for RecordingServo {
    fn set_angle(&mut self, degrees: u8) -> Result<(), AppError> {
        self.log.push(format!("servo:{}:{degrees}", self.name))
    }
}

pub struct RecordingIndicator {
    name: String,
    log: ActuatorLog,
}

impl Indicator for RecordingIndicator {
    fn set(&mut self, on: bool) -> Result<(), AppError> {
        let state = if on { "on" } else { "off" };
        self.log.push(format!("led:{}:{state}", self.name))
    }
}

/// Servo that always fails, for exercising error paths.
pub struct JammedServo;

impl Servo for JammedServo {
    fn set_angle(&mut self, _degrees: u8) -> Result<(), AppError> {
        Err(AppError::Actuator("servo jammed".to_string()))
    }
}
