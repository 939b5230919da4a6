//! In-process simulated hardware for tests and headless runs.
//!
//! Every adapter is a cheap, cloneable handle onto shared state: box one
//! clone into the robot and keep another to inspect what was commanded or
//! to inject readings and faults.
//!
//! ```rust
//! use mobot_hal::Motor;
//! use mobot_hal::sim::SimMotorDriver;
//!
//! let driver = SimMotorDriver::new("motorAB");
//! let motor = Motor::new(Box::new(driver.clone()), 5);
//! motor.run(60);
//! assert_eq!(driver.speed(), 60);
//! ```

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex};

use mobot_types::{Color, FaceId, LinePosition, MobotError, TrackedFace};

use crate::distance::DistanceSensor;
use crate::indicator::Indicator;
use crate::lock;
use crate::motor::MotorDriver;
use crate::steering::{Steering, clamp_angle};
use crate::vision::{FaceTracker, LineSensor};

// ────────────────────────────────────────────────────────────────────────────
// Motor
// ────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct MotorLog {
    commands: Vec<i32>,
    speed: i32,
    halts: usize,
    failing: bool,
    observed: Option<i32>,
}

/// Records every speed command.  Can be told to fail, and to report an
/// encoder reading.
#[derive(Clone)]
pub struct SimMotorDriver {
    id: String,
    log: Arc<Mutex<MotorLog>>,
}

impl SimMotorDriver {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            log: Arc::default(),
        }
    }

    /// Last speed accepted.
    pub fn speed(&self) -> i32 {
        lock(&self.log).speed
    }

    /// Every speed accepted through `apply_speed`, oldest first.
    pub fn commands(&self) -> Vec<i32> {
        lock(&self.log).commands.clone()
    }

    pub fn halt_count(&self) -> usize {
        lock(&self.log).halts
    }

    pub fn set_failing(&self, failing: bool) {
        lock(&self.log).failing = failing;
    }

    pub fn set_observed(&self, observed: Option<i32>) {
        lock(&self.log).observed = observed;
    }
}

impl MotorDriver for SimMotorDriver {
    fn id(&self) -> &str {
        &self.id
    }

    fn apply_speed(&mut self, speed: i32) -> Result<(), MobotError> {
        let mut log = lock(&self.log);
        if log.failing {
            return Err(MobotError::hardware(&self.id, "simulated fault"));
        }
        log.commands.push(speed);
        log.speed = speed;
        Ok(())
    }

    fn halt(&mut self) -> Result<(), MobotError> {
        let mut log = lock(&self.log);
        if log.failing {
            return Err(MobotError::hardware(&self.id, "simulated fault"));
        }
        log.halts += 1;
        log.speed = 0;
        Ok(())
    }

    fn observed_speed(&self) -> Option<i32> {
        lock(&self.log).observed
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Steering
// ────────────────────────────────────────────────────────────────────────────

/// Servo with a symmetric physical limit.
#[derive(Clone)]
pub struct SimSteering {
    id: String,
    limit: i32,
    angle: Arc<AtomicI32>,
}

impl SimSteering {
    pub fn new(id: impl Into<String>, limit: i32) -> Self {
        Self {
            id: id.into(),
            limit,
            angle: Arc::new(AtomicI32::new(0)),
        }
    }
}

impl Steering for SimSteering {
    fn id(&self) -> &str {
        &self.id
    }

    fn goto_angle(&mut self, angle: i32) -> Result<i32, MobotError> {
        let reached = clamp_angle(angle, self.limit);
        self.angle.store(reached, Ordering::SeqCst);
        Ok(reached)
    }

    fn angle(&self) -> i32 {
        self.angle.load(Ordering::SeqCst)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Indicator
// ────────────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct SimIndicator {
    id: String,
    color: Arc<Mutex<Color>>,
}

impl SimIndicator {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            color: Arc::default(),
        }
    }
}

impl Indicator for SimIndicator {
    fn id(&self) -> &str {
        &self.id
    }

    fn set_color(&mut self, color: Color) -> Result<(), MobotError> {
        *lock(&self.color) = color;
        Ok(())
    }

    fn color(&self) -> Color {
        *lock(&self.color)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Distance sensor
// ────────────────────────────────────────────────────────────────────────────

struct RangeState {
    scripted: VecDeque<f32>,
    steady: f32,
    reads: usize,
}

/// Range finder returning scripted readings first, then a steady value.
#[derive(Clone)]
pub struct SimDistanceSensor {
    id: String,
    state: Arc<Mutex<RangeState>>,
}

impl SimDistanceSensor {
    pub fn new(id: impl Into<String>, distance: f32) -> Self {
        Self {
            id: id.into(),
            state: Arc::new(Mutex::new(RangeState {
                scripted: VecDeque::new(),
                steady: distance,
                reads: 0,
            })),
        }
    }

    /// Change the steady reading.
    pub fn set_distance(&self, distance: f32) {
        lock(&self.state).steady = distance;
    }

    /// Queue readings to be returned, in order, before the steady value.
    pub fn push_readings(&self, readings: impl IntoIterator<Item = f32>) {
        lock(&self.state).scripted.extend(readings);
    }

    /// Number of times the sensor has been read.
    pub fn reads(&self) -> usize {
        lock(&self.state).reads
    }
}

impl DistanceSensor for SimDistanceSensor {
    fn id(&self) -> &str {
        &self.id
    }

    fn get_distance(&self) -> f32 {
        let mut state = lock(&self.state);
        state.reads += 1;
        let steady = state.steady;
        state.scripted.pop_front().unwrap_or(steady)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Face tracker
// ────────────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct SimFaceTracker {
    faces: Arc<Mutex<BTreeMap<FaceId, TrackedFace>>>,
    shape: (u32, u32),
}

impl SimFaceTracker {
    /// `shape` is `(height, width)` of the simulated frames.
    pub fn new(shape: (u32, u32)) -> Self {
        Self {
            faces: Arc::default(),
            shape,
        }
    }

    pub fn set_faces(&self, faces: impl IntoIterator<Item = (FaceId, TrackedFace)>) {
        *lock(&self.faces) = faces.into_iter().collect();
    }

    pub fn clear(&self) {
        lock(&self.faces).clear();
    }
}

impl FaceTracker for SimFaceTracker {
    fn tracked_faces(&self) -> Result<BTreeMap<FaceId, TrackedFace>, MobotError> {
        Ok(lock(&self.faces).clone())
    }

    fn image_shape(&self) -> (u32, u32) {
        self.shape
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Line sensor
// ────────────────────────────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct SimLineSensor {
    position: Arc<Mutex<LinePosition>>,
}

impl SimLineSensor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, position: LinePosition) {
        *lock(&self.position) = position;
    }
}

impl LineSensor for SimLineSensor {
    fn status(&self) -> Result<LinePosition, MobotError> {
        Ok(*lock(&self.position))
    }
}
