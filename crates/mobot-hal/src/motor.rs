//! Motor capability and the speed policy layered on top of it.
//!
//! A [`MotorDriver`] is the thin, hardware-specific part: it knows how to put
//! a signed percentage on the wire.  [`Motor`] owns everything else:
//!
//! - requested speed, clamped to `[-100, 100]`
//! - an obstacle bias ([`Motor::extra_speed`]) and a steering-drag bias
//!   ([`Motor::extra_steering_speed`]) added along the direction of travel
//! - the `min_moving_speed` deadband: anything slower is a stop
//! - idempotent application: the driver is only called when the effective
//!   speed actually changes
//! - [`Motor::emergency_stop`], which always reaches the driver
//!
//! All of that state sits behind one mutex so a `run()` from the mode task
//! and an `extra_speed()` from the interlock task can never interleave into
//! an inconsistent effective speed.

use std::sync::Mutex;

use mobot_types::{InterlockAction, MobotError};
use tracing::{info, warn};

use crate::lock;

/// Largest speed magnitude, in percent.
pub const MAX_SPEED: i32 = 100;

/// Clamp a signed speed to `[-100, 100]`.
pub fn clamp_speed(speed: i32) -> i32 {
    speed.clamp(-MAX_SPEED, MAX_SPEED)
}

/// A DC motor, or anything else that runs at a signed percentage.
///
/// Implementations only translate commands for their hardware; the speed
/// policy lives in [`Motor`].
pub trait MotorDriver: Send + Sync {
    /// Stable identifier for this motor, e.g. `"motorAB"`.
    fn id(&self) -> &str;

    /// Run at `speed` percent (`> 0` forward, `< 0` reverse, `0` stop).
    ///
    /// # Errors
    ///
    /// Returns [`MobotError::HardwareFault`] if the command cannot be sent.
    fn apply_speed(&mut self, speed: i32) -> Result<(), MobotError>;

    /// Halt immediately, skipping any ramp the hardware would apply.
    fn halt(&mut self) -> Result<(), MobotError> {
        self.apply_speed(0)
    }

    /// Speed measured by an encoder, when the motor has one.
    fn observed_speed(&self) -> Option<i32> {
        None
    }
}

struct MotorState {
    driver: Box<dyn MotorDriver>,
    requested: i32,
    extra: i32,
    extra_steering: i32,
    applied: i32,
}

/// Speed policy wrapper around a [`MotorDriver`].  Shared between tasks by
/// reference; every method takes `&self`.
pub struct Motor {
    id: String,
    min_moving_speed: i32,
    state: Mutex<MotorState>,
}

impl Motor {
    /// Wrap `driver`.  Speeds with a magnitude below `min_moving_speed` are
    /// treated as a stop.
    pub fn new(driver: Box<dyn MotorDriver>, min_moving_speed: i32) -> Self {
        Self {
            id: driver.id().to_string(),
            min_moving_speed: min_moving_speed.abs(),
            state: Mutex::new(MotorState {
                driver,
                requested: 0,
                extra: 0,
                extra_steering: 0,
                applied: 0,
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn min_moving_speed(&self) -> i32 {
        self.min_moving_speed
    }

    /// Request `speed` percent and return the resulting actual speed.
    pub fn run(&self, speed: i32) -> i32 {
        let mut state = lock(&self.state);
        state.requested = clamp_speed(speed);
        info!(motor = %self.id, requested = state.requested, "run motor");
        self.apply(&mut state);
        self.actual(&state)
    }

    /// Request a stop.  Biases are kept but have no effect while the
    /// requested speed is zero.
    pub fn stop(&self) -> i32 {
        let mut state = lock(&self.state);
        state.requested = 0;
        self.apply(&mut state);
        self.actual(&state)
    }

    /// Stop now.  The driver is always commanded, even if the motor is
    /// believed to be stopped already, and the obstacle bias is dropped.
    /// Only a later [`run`][Self::run] can set the motor moving again.
    pub fn emergency_stop(&self) {
        let mut state = lock(&self.state);
        self.halt(&mut state);
    }

    /// Let `decide` pick an interlock action from `(requested, bias)` and
    /// apply it under the same lock, so a concurrent `run()` lands either
    /// before the decision or after the action, never in between.
    pub fn regulate<F>(&self, decide: F) -> Option<InterlockAction>
    where
        F: FnOnce(i32, i32) -> Option<InterlockAction>,
    {
        let mut state = lock(&self.state);
        let action = decide(state.requested, state.extra)?;
        match action {
            InterlockAction::EmergencyStop => self.halt(&mut state),
            InterlockAction::Stop => {
                state.requested = 0;
                state.extra = 0;
                self.apply(&mut state);
            }
            InterlockAction::Slowdown { bias } => {
                state.extra = bias;
                self.apply(&mut state);
            }
            InterlockAction::Release => {
                state.extra = 0;
                self.apply(&mut state);
            }
        }
        Some(action)
    }

    /// Set the obstacle bias added on top of the requested speed.
    pub fn extra_speed(&self, delta: i32) {
        let mut state = lock(&self.state);
        state.extra = delta;
        self.apply(&mut state);
    }

    /// Set the steering-drag bias added on top of the requested speed.
    pub fn extra_steering_speed(&self, delta: i32) {
        let mut state = lock(&self.state);
        state.extra_steering = delta;
        self.apply(&mut state);
    }

    /// Actual speed: the encoder reading when available, otherwise the last
    /// speed successfully applied.  Anything inside the deadband reads as 0.
    pub fn speed(&self) -> i32 {
        self.actual(&lock(&self.state))
    }

    pub fn requested_speed(&self) -> i32 {
        lock(&self.state).requested
    }

    /// Current obstacle bias.
    pub fn extra(&self) -> i32 {
        lock(&self.state).extra
    }

    /// The speed the driver is (or should be) running at.
    pub fn effective_speed(&self) -> i32 {
        let state = lock(&self.state);
        effective_speed(
            state.requested,
            state.extra + state.extra_steering,
            self.min_moving_speed,
        )
    }

    fn halt(&self, state: &mut MotorState) {
        state.requested = 0;
        state.extra = 0;
        match state.driver.halt() {
            Ok(()) => state.applied = 0,
            Err(e) => warn!(motor = %self.id, error = %e, "emergency stop command failed"),
        }
    }

    fn actual(&self, state: &MotorState) -> i32 {
        let speed = state.driver.observed_speed().unwrap_or(state.applied);
        if speed.abs() < self.min_moving_speed {
            0
        } else {
            speed
        }
    }

    fn apply(&self, state: &mut MotorState) {
        let target = effective_speed(
            state.requested,
            state.extra + state.extra_steering,
            self.min_moving_speed,
        );
        if target == state.applied {
            return;
        }
        match state.driver.apply_speed(target) {
            Ok(()) => state.applied = target,
            // Left unapplied; the next recomputation retries.
            Err(e) => warn!(motor = %self.id, speed = target, error = %e, "motor command failed"),
        }
    }
}

/// Combine a requested speed with its biases.
///
/// Biases act along the direction of travel, so a negative bias always slows
/// the motor and a positive one always adds torque, whichever way it turns.
/// A request inside the deadband stays a stop whatever the biases say, and
/// the result is clamped to `[-100, 100]` and then put through the deadband.
pub fn effective_speed(requested: i32, bias: i32, min_moving_speed: i32) -> i32 {
    if requested == 0 || requested.abs() < min_moving_speed {
        return 0;
    }
    let magnitude = (requested.abs() + bias).clamp(0, MAX_SPEED);
    if magnitude < min_moving_speed {
        0
    } else {
        magnitude * requested.signum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimMotorDriver;

    fn motor() -> (Motor, SimMotorDriver) {
        let driver = SimMotorDriver::new("motorAB");
        (Motor::new(Box::new(driver.clone()), 5), driver)
    }

    #[test]
    fn speeds_inside_deadband_stop_the_motor() {
        let (motor, driver) = motor();
        for s in -4..=4 {
            motor.run(s);
            assert_eq!(motor.speed(), 0, "requested {s}");
            assert_eq!(driver.speed(), 0);
        }
        motor.run(5);
        assert_eq!(motor.speed(), 5);
    }

    #[test]
    fn biases_do_not_revive_a_request_inside_deadband() {
        let (motor, driver) = motor();
        motor.extra_speed(10);
        motor.extra_steering_speed(20);
        for s in -4..=4 {
            motor.run(s);
            assert_eq!(motor.effective_speed(), 0, "requested {s}");
            assert_eq!(motor.speed(), 0);
            assert_eq!(driver.speed(), 0);
        }
        assert_eq!(effective_speed(3, 20, 5), 0);
        assert_eq!(effective_speed(-3, 20, 5), 0);
        assert_eq!(effective_speed(5, 20, 5), 25);
    }

    #[test]
    fn clamp_keeps_sign_and_bounds() {
        for s in [-1000, -101, -100, -1, 1, 99, 100, 250, i32::MAX] {
            let c = clamp_speed(s);
            assert!(c.abs() <= 100);
            assert_eq!(c.signum(), s.signum());
        }
        assert_eq!(clamp_speed(0), 0);
    }

    #[test]
    fn run_clamps_requested_speed() {
        let (motor, driver) = motor();
        motor.run(140);
        assert_eq!(motor.requested_speed(), 100);
        assert_eq!(driver.speed(), 100);
        motor.run(-140);
        assert_eq!(driver.speed(), -100);
    }

    #[test]
    fn biases_add_along_direction_of_travel() {
        let (motor, driver) = motor();
        motor.run(60);
        motor.extra_speed(-15);
        assert_eq!(driver.speed(), 45);
        motor.extra_steering_speed(20);
        assert_eq!(driver.speed(), 65);

        motor.run(-60);
        assert_eq!(driver.speed(), -65);
    }

    #[test]
    fn bias_cannot_push_past_bounds_or_reverse() {
        let (motor, driver) = motor();
        motor.run(95);
        motor.extra_steering_speed(20);
        assert_eq!(driver.speed(), 100);

        motor.extra_steering_speed(0);
        motor.run(10);
        motor.extra_speed(-30);
        assert_eq!(driver.speed(), 0);
    }

    #[test]
    fn unchanged_effective_speed_is_not_reissued() {
        let (motor, driver) = motor();
        motor.run(60);
        motor.run(60);
        motor.extra_speed(0);
        assert_eq!(driver.commands(), vec![60]);
    }

    #[test]
    fn emergency_stop_holds_until_new_run() {
        let (motor, driver) = motor();
        motor.run(60);
        motor.extra_speed(-10);
        motor.emergency_stop();
        assert_eq!(driver.speed(), 0);
        assert_eq!(driver.halt_count(), 1);

        // Repeated interlock cycles must not revive the old request.
        for _ in 0..10 {
            motor.extra_speed(0);
            motor.extra_steering_speed(20);
            motor.emergency_stop();
            assert_eq!(motor.effective_speed(), 0);
            assert_eq!(motor.speed(), 0);
        }
        assert_eq!(driver.speed(), 0);

        motor.run(40);
        assert_eq!(driver.speed(), 60);
    }

    #[test]
    fn regulate_decides_and_applies_in_one_step() {
        let (motor, driver) = motor();
        motor.run(60);
        let seen = std::cell::Cell::new((0, 0));
        let action = motor.regulate(|requested, bias| {
            seen.set((requested, bias));
            Some(InterlockAction::Slowdown { bias: -15 })
        });
        assert_eq!(action, Some(InterlockAction::Slowdown { bias: -15 }));
        assert_eq!(seen.get(), (60, 0));
        assert_eq!(driver.speed(), 45);

        // A reverse request is seen as such by the next decision.
        motor.run(-60);
        let action = motor.regulate(|requested, bias| {
            seen.set((requested, bias));
            (requested > 0).then_some(InterlockAction::Stop)
        });
        assert_eq!(action, None);
        assert_eq!(seen.get(), (-60, -15));

        motor.regulate(|_, _| Some(InterlockAction::Release));
        assert_eq!(motor.extra(), 0);
        assert_eq!(driver.speed(), -60);

        motor.run(60);
        motor.regulate(|_, _| Some(InterlockAction::EmergencyStop));
        assert_eq!(driver.halt_count(), 1);
        assert_eq!(motor.requested_speed(), 0);
        assert_eq!(motor.speed(), 0);
    }

    #[test]
    fn failed_command_is_retried_on_next_recompute() {
        let (motor, driver) = motor();
        driver.set_failing(true);
        motor.run(50);
        assert_eq!(motor.speed(), 0);

        driver.set_failing(false);
        motor.extra_speed(0);
        assert_eq!(motor.speed(), 50);
    }

    #[test]
    fn observed_speed_overrides_estimate() {
        let (motor, driver) = motor();
        motor.run(60);
        driver.set_observed(Some(3));
        assert_eq!(motor.speed(), 0);
        driver.set_observed(Some(42));
        assert_eq!(motor.speed(), 42);
    }
}
