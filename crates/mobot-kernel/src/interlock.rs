//! [`DistanceInterlock`] – the always-on obstacle safety check.
//!
//! Runs once per cycle from its own background task, independently of the
//! active mode.  While the drive is requested to move forward and the sensor
//! looks straight ahead, the distance to the nearest obstacle decides what
//! happens:
//!
//! | Distance | Action |
//! |---|---|
//! | `< emergencyStopDistance` | [`InterlockAction::EmergencyStop`], bias cleared |
//! | `< stopDistance` | [`InterlockAction::Stop`], bias cleared |
//! | `< slowdownDistance` | [`InterlockAction::Slowdown`]: negative bias proportional to proximity |
//! | otherwise | [`InterlockAction::Release`] if a slowdown bias is still applied |
//!
//! The interlock only ever retards the drive.  It never applies a positive
//! bias and never acts on reverse motion except to drop a stale slowdown.
//!
//! Thresholds are read from configuration at the start of every cycle, so
//! tuning takes effect immediately.  A mode may temporarily replace the stop
//! and slowdown distances through the shared [`InterlockState`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, TryLockError};
use std::time::Duration;

use mobot_hal::{DistanceSensor, Drive, SharedHead, lock};
use mobot_types::InterlockAction;
use tracing::{debug, info, warn};

use crate::config::ConfigProvider;

// ────────────────────────────────────────────────────────────────────────────
// Thresholds
// ────────────────────────────────────────────────────────────────────────────

/// Parameters for one interlock decision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InterlockThresholds {
    pub stop_distance: f32,
    pub slowdown_distance: f32,
    pub emergency_stop_distance: f32,
    /// Largest head deflection, on either axis, still counted as looking
    /// straight ahead.
    pub heading_angle_limit: i32,
    pub min_moving_speed: i32,
    pub max_slowdown_speed: i32,
}

impl Default for InterlockThresholds {
    fn default() -> Self {
        Self {
            stop_distance: 0.2,
            slowdown_distance: 1.0,
            emergency_stop_distance: 0.1,
            heading_angle_limit: 20,
            min_moving_speed: 5,
            max_slowdown_speed: 15,
        }
    }
}

impl InterlockThresholds {
    /// Read the configured thresholds, with the stop and slowdown distances
    /// from the default `distanceChecker.*` keys.
    pub fn from_config(config: &dyn ConfigProvider) -> Self {
        let d = Self::default();
        let (stop, slow) = default_distances(config);
        Self {
            stop_distance: stop,
            slowdown_distance: slow,
            emergency_stop_distance: config.get_or_add_float(
                "distanceChecker.emergencyStopDistance",
                f64::from(d.emergency_stop_distance),
            ) as f32,
            heading_angle_limit: config.get_or_add_int(
                "distanceChecker.headingAngleLimit",
                i64::from(d.heading_angle_limit),
            ) as i32,
            min_moving_speed: config
                .get_or_add_int("motor.minMovingSpeed", i64::from(d.min_moving_speed))
                as i32,
            max_slowdown_speed: config.get_or_add_int(
                "distanceChecker.maxSlowdownSpeed",
                i64::from(d.max_slowdown_speed),
            ) as i32,
        }
    }
}

/// `(stopDistance, slowdownDistance)` from the `distanceChecker.*` keys.
pub fn default_distances(config: &dyn ConfigProvider) -> (f32, f32) {
    (
        config.get_or_add_float("distanceChecker.stopDistance", 0.2) as f32,
        config.get_or_add_float("distanceChecker.slowdownDistance", 1.0) as f32,
    )
}

// ────────────────────────────────────────────────────────────────────────────
// Policy
// ────────────────────────────────────────────────────────────────────────────

/// Decide what the interlock should do.
///
/// `requested_speed` is the drive's requested speed, `current_bias` its
/// obstacle bias, `heading` the sensor's `(horizontal, vertical)` pointing
/// angle.  Returns `None` when nothing needs to change.
///
/// ```
/// use mobot_kernel::interlock::{InterlockThresholds, evaluate};
/// use mobot_types::InterlockAction;
///
/// let t = InterlockThresholds::default();
/// assert_eq!(
///     evaluate(0.6, 60, 0, (0, 0), &t),
///     Some(InterlockAction::Slowdown { bias: -15 })
/// );
/// ```
pub fn evaluate(
    distance: f32,
    requested_speed: i32,
    current_bias: i32,
    heading: (i32, i32),
    t: &InterlockThresholds,
) -> Option<InterlockAction> {
    if requested_speed <= 0 {
        return (current_bias < 0).then_some(InterlockAction::Release);
    }
    let (h, v) = heading;
    if h.abs() >= t.heading_angle_limit || v.abs() >= t.heading_angle_limit {
        return None;
    }
    if distance < t.emergency_stop_distance {
        Some(InterlockAction::EmergencyStop)
    } else if distance < t.stop_distance {
        Some(InterlockAction::Stop)
    } else if distance < t.slowdown_distance {
        // Reached only when stop <= distance < slowdown, so the span is
        // positive.
        let headroom = (requested_speed - t.min_moving_speed).max(0) as f32;
        let proximity = (t.slowdown_distance - distance) / (t.slowdown_distance - t.stop_distance);
        let slowdown = ((headroom * proximity) as i32).min(t.max_slowdown_speed.max(0));
        Some(InterlockAction::Slowdown { bias: -slowdown })
    } else if current_bias < 0 {
        Some(InterlockAction::Release)
    } else {
        None
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Shared state
// ────────────────────────────────────────────────────────────────────────────

/// Interlock switches shared with the mode controller.
#[derive(Debug)]
pub struct InterlockState {
    enabled: AtomicBool,
    distances: Mutex<Option<(f32, f32)>>,
}

impl Default for InterlockState {
    fn default() -> Self {
        Self {
            enabled: AtomicBool::new(true),
            distances: Mutex::new(None),
        }
    }
}

impl InterlockState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    /// Replace the configured stop and slowdown distances until
    /// [`restore_distances`][Self::restore_distances].
    pub fn override_distances(&self, stop: f32, slowdown: f32) {
        *lock(&self.distances) = Some((stop, slowdown));
    }

    pub fn restore_distances(&self) {
        *lock(&self.distances) = None;
    }

    pub fn distance_override(&self) -> Option<(f32, f32)> {
        *lock(&self.distances)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Interlock
// ────────────────────────────────────────────────────────────────────────────

pub struct DistanceInterlock {
    drive: Arc<Drive>,
    sensor: Arc<dyn DistanceSensor>,
    head: Option<SharedHead>,
    config: Arc<dyn ConfigProvider>,
    state: Arc<InterlockState>,
    last: Mutex<Option<InterlockAction>>,
}

impl DistanceInterlock {
    pub fn new(
        drive: Arc<Drive>,
        sensor: Arc<dyn DistanceSensor>,
        config: Arc<dyn ConfigProvider>,
        state: Arc<InterlockState>,
    ) -> Self {
        Self {
            drive,
            sensor,
            head: None,
            config,
            state,
            last: Mutex::new(None),
        }
    }

    /// Take the sensor heading from `head` instead of assuming straight
    /// ahead.
    pub fn with_head(mut self, head: SharedHead) -> Self {
        self.head = Some(head);
        self
    }

    pub fn state(&self) -> &Arc<InterlockState> {
        &self.state
    }

    /// Cycle period from `distanceChecker.scanCycleInSecond`.
    pub fn period(&self) -> Duration {
        let secs = self
            .config
            .get_or_add_float("distanceChecker.scanCycleInSecond", 0.2);
        Duration::try_from_secs_f64(secs)
            .ok()
            .filter(|d| !d.is_zero())
            .unwrap_or(Duration::from_millis(200))
    }

    /// Thresholds for this cycle: configuration plus any mode override.
    pub fn thresholds(&self) -> InterlockThresholds {
        let mut t = InterlockThresholds::from_config(self.config.as_ref());
        if let Some((stop, slow)) = self.state.distance_override() {
            t.stop_distance = stop;
            t.slowdown_distance = slow;
        }
        t
    }

    /// A valid reading, retrying once.
    pub fn read_distance(&self) -> Option<f32> {
        self.sensor.distance().or_else(|| self.sensor.distance())
    }

    /// Run one cycle.  Returns the action taken, with the distance that
    /// triggered it, when it differs from the previous cycle's.
    pub fn cycle(&self) -> Option<(InterlockAction, f32)> {
        let Some(distance) = self.read_distance() else {
            debug!("no valid distance reading, skipping cycle");
            return None;
        };
        let action = self.check(distance);
        let mut last = lock(&self.last);
        let changed = action != *last;
        *last = action;
        if changed { action.map(|a| (a, distance)) } else { None }
    }

    /// Evaluate `distance` against the current drive state and apply the
    /// resulting action.  The motor is held for both steps, so a command
    /// issued meanwhile is never overridden by a decision made before it.
    pub fn check(&self, distance: f32) -> Option<InterlockAction> {
        if !self.state.is_enabled() {
            return None;
        }
        // A busy head is mid-scan and not looking ahead.
        let heading = self.heading()?;
        let thresholds = self.thresholds();
        let mut prior_bias = 0;
        let action = self.drive.motor().regulate(|requested, bias| {
            prior_bias = bias;
            evaluate(distance, requested, bias, heading, &thresholds)
        })?;
        self.log_action(action, prior_bias, distance);
        Some(action)
    }

    fn heading(&self) -> Option<(i32, i32)> {
        let Some(head) = &self.head else {
            return Some((0, 0));
        };
        match head.try_lock() {
            Ok(h) => Some(h.heading()),
            Err(TryLockError::Poisoned(p)) => Some(p.into_inner().heading()),
            Err(TryLockError::WouldBlock) => None,
        }
    }

    fn log_action(&self, action: InterlockAction, prior_bias: i32, distance: f32) {
        match action {
            InterlockAction::EmergencyStop => {
                warn!(motor = %self.drive.motor().id(), distance_m = distance, "interlock emergency stop");
            }
            InterlockAction::Stop => info!(distance_m = distance, "interlock stopping drive"),
            InterlockAction::Slowdown { bias } => {
                if prior_bias != bias {
                    info!(distance_m = distance, bias, "interlock slowing down");
                }
            }
            InterlockAction::Release => debug!(distance_m = distance, "interlock releasing slowdown"),
        }
    }
}
