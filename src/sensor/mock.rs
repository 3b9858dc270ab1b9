use crate::sensor::{DistanceSample, DistanceSensor, IrSensor, SensorFault};
use std::collections::VecDeque;

/// Replays a fixed list of samples, then repeats the last one forever.
pub struct ScriptedDistanceSensor {
    script: VecDeque<DistanceSample>,
    last: DistanceSample,
}

impl ScriptedDistanceSensor {
    pub fn new(samples: Vec<DistanceSample>) -> Self {
        Self {
            script: samples.into(),
            last: Err(SensorFault::NoEcho),
        }
    }

    pub fn constant(distance_cm: f32) -> Self {
        Self::new(vec![Ok(distance_cm)])
    }

    pub fn faulty() -> Self {
        Self::new(vec![Err(SensorFault::NoEcho)])
    }
}

impl DistanceSensor for ScriptedDistanceSensor {
    fn measure_cm(&mut self) -> DistanceSample {
        if let Some(next) = self.script.pop_front() {
            self.last = next;
        }
        self.last
    }
}

/// Gate IR counterpart of [`ScriptedDistanceSensor`].
pub struct ScriptedIrSensor {
    script: VecDeque<Result<u16, SensorFault>>,
    last: Result<u16, SensorFault>,
}

impl ScriptedIrSensor {
    pub fn new(readings: Vec<Result<u16, SensorFault>>) -> Self {
        Self {
            script: readings.into(),
            last: Err(SensorFault::Bus),
        }
    }

    pub fn constant(raw: u16) -> Self {
        Self::new(vec![Ok(raw)])
    }

    /// `ticks` readings of `present`, then `absent` from there on.
    pub fn pass(present: u16, ticks: usize, absent: u16) -> Self {
        let mut readings = vec![Ok(present); ticks];
        readings.push(Ok(absent));
        Self::new(readings)
    }
}

impl IrSensor for ScriptedIrSensor {
    fn read_raw(&mut self) -> Result<u16, SensorFault> {
        if let Some(next) = self.script.pop_front() {
            self.last = next;
        }
        self.last
    }
}
