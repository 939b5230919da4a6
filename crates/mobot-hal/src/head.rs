//! Sensor head: a pan (and optionally tilt) mount carrying the distance
//! sensor and, on camera builds, the face tracker.
//!
//! [`BotHead`] composes independent [`Steering`] joints with the sensor
//! instead of inheriting from a servo class; any joint may be swapped for
//! another backend.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use mobot_types::{MobotError, ScanResult};
use tracing::debug;

use crate::distance::DistanceSensor;
use crate::steering::{MAX_STEERING_ANGLE, Steering, clamp_angle};

/// A rectangular sweep over head headings.  Both axes run inclusively from
/// `start` to `end` in steps of `|inc|` (a zero step samples `start` only).
/// Bounds are clamped to `[-90, 90]` first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanSweep {
    pub start_h: i32,
    pub start_v: i32,
    pub end_h: i32,
    pub end_v: i32,
    pub inc_h: i32,
    pub inc_v: i32,
}

impl ScanSweep {
    /// Horizontal-only sweep at a fixed vertical heading.
    pub fn horizontal(start_h: i32, end_h: i32, inc: i32, vertical: i32) -> Self {
        Self {
            start_h,
            start_v: vertical,
            end_h,
            end_v: vertical,
            inc_h: inc,
            inc_v: inc,
        }
    }

    /// Headings visited, vertical-major.
    pub fn points(&self) -> Vec<(i32, i32)> {
        let hs = axis(self.start_h, self.end_h, self.inc_h);
        let vs = axis(self.start_v, self.end_v, self.inc_v);
        vs.iter()
            .flat_map(|v| hs.iter().map(move |h| (*h, *v)))
            .collect()
    }
}

fn axis(start: i32, end: i32, inc: i32) -> Vec<i32> {
    let start = clamp_angle(start, MAX_STEERING_ANGLE);
    let end = clamp_angle(end, MAX_STEERING_ANGLE);
    // Anything wider than the whole range samples `start` and stops.
    let step = inc.unsigned_abs().min(2 * MAX_STEERING_ANGLE as u32 + 1) as i32;
    if step == 0 || start == end {
        return vec![start];
    }
    let dir = (end - start).signum();
    let mut out = Vec::new();
    let mut a = start;
    while (end - a) * dir >= 0 {
        out.push(a);
        a += step * dir;
    }
    out
}

pub trait Head: Send + Sync {
    /// Pan to `angle`; returns the angle reached.
    fn turn_horizontal(&mut self, angle: i32) -> Result<i32, MobotError>;

    /// Tilt to `angle`; returns the angle reached (always 0 without a tilt
    /// joint).
    fn turn_vertical(&mut self, angle: i32) -> Result<i32, MobotError>;

    /// Center both joints.
    fn look_straight(&mut self) -> Result<(), MobotError>;

    /// Current `(horizontal, vertical)` heading in degrees.
    fn heading(&self) -> (i32, i32);

    /// Visit every heading of `sweep` and sample the head's distance sensor.
    /// Invalid readings are recorded as-is (negative).
    ///
    /// # Errors
    ///
    /// [`MobotError::Unavailable`] if the head carries no distance sensor,
    /// or the first joint error encountered.
    fn scan(&mut self, sweep: &ScanSweep) -> Result<ScanResult, MobotError>;
}

/// Pan/tilt head built from steering joints.
pub struct BotHead {
    horizontal: Box<dyn Steering>,
    vertical: Option<Box<dyn Steering>>,
    sensor: Option<Arc<dyn DistanceSensor>>,
    settle: Duration,
}

impl BotHead {
    pub fn new(horizontal: Box<dyn Steering>) -> Self {
        Self {
            horizontal,
            vertical: None,
            sensor: None,
            settle: Duration::ZERO,
        }
    }

    pub fn with_vertical(mut self, vertical: Box<dyn Steering>) -> Self {
        self.vertical = Some(vertical);
        self
    }

    pub fn with_sensor(mut self, sensor: Arc<dyn DistanceSensor>) -> Self {
        self.sensor = Some(sensor);
        self
    }

    /// Pause after each move during a scan so the servo reaches its target
    /// before the sensor is sampled.  Keep it short: a full sweep blocks the
    /// caller for `settle * points`.
    pub fn with_settle_time(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }
}

impl Head for BotHead {
    fn turn_horizontal(&mut self, angle: i32) -> Result<i32, MobotError> {
        self.horizontal.goto_angle(angle)
    }

    fn turn_vertical(&mut self, angle: i32) -> Result<i32, MobotError> {
        match self.vertical.as_mut() {
            Some(v) => v.goto_angle(angle),
            None => Ok(0),
        }
    }

    fn look_straight(&mut self) -> Result<(), MobotError> {
        self.horizontal.goto_center()?;
        if let Some(v) = self.vertical.as_mut() {
            v.goto_center()?;
        }
        Ok(())
    }

    fn heading(&self) -> (i32, i32) {
        (
            self.horizontal.angle(),
            self.vertical.as_ref().map_or(0, |v| v.angle()),
        )
    }

    fn scan(&mut self, sweep: &ScanSweep) -> Result<ScanResult, MobotError> {
        let sensor = self
            .sensor
            .clone()
            .ok_or_else(|| MobotError::Unavailable("distance sensor on head".into()))?;
        let mut result = ScanResult::default();
        for (h, v) in sweep.points() {
            let h = self.turn_horizontal(h)?;
            let v = self.turn_vertical(v)?;
            if !self.settle.is_zero() {
                thread::sleep(self.settle);
            }
            result.push(sensor.get_distance(), h, v);
        }
        debug!(samples = result.len(), "head scan complete");
        Ok(result)
    }
}
