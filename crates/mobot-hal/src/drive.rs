//! Drive: one motor, one steering, and optional left/right turn signals.
//!
//! The drive is shared by the mode task, the interlock task, and external
//! command handlers, so every method takes `&self`.  Motor state is guarded
//! inside [`Motor`]; the steering and the lights each sit behind their own
//! mutex and are never locked together.
//!
//! No drive operation fails: out-of-range input is clamped, and hardware
//! errors are logged and the previous state kept, so the next control cycle
//! can reassert what it wants.

use std::sync::Mutex;

use mobot_types::{Color, MobotError};
use tracing::{info, warn};

use crate::indicator::Indicator;
use crate::lock;
use crate::motor::{MAX_SPEED, Motor};
use crate::steering::{MAX_STEERING_ANGLE, Steering, clamp_angle};

/// Extra torque added while steering, unless configured otherwise.
pub const DEFAULT_STEERING_ASSIST: i32 = 20;

struct Signals {
    left: Option<Box<dyn Indicator>>,
    right: Option<Box<dyn Indicator>>,
    turn_signal: bool,
}

impl Signals {
    fn set(&mut self, left: Color, right: Color) {
        if let Some(led) = self.left.as_mut() {
            log_fault(led.set_color(left), "left indicator");
        }
        if let Some(led) = self.right.as_mut() {
            log_fault(led.set_color(right), "right indicator");
        }
    }
}

pub struct Drive {
    motor: Motor,
    steering: Mutex<Box<dyn Steering>>,
    signals: Mutex<Signals>,
    steering_assist: i32,
}

impl Drive {
    pub fn new(motor: Motor, steering: Box<dyn Steering>) -> Self {
        Self {
            motor,
            steering: Mutex::new(steering),
            signals: Mutex::new(Signals {
                left: None,
                right: None,
                turn_signal: false,
            }),
            steering_assist: DEFAULT_STEERING_ASSIST,
        }
    }

    /// Attach turn-signal lights.  Either side may be absent.
    pub fn with_indicators(
        self,
        left: Option<Box<dyn Indicator>>,
        right: Option<Box<dyn Indicator>>,
    ) -> Self {
        {
            let mut signals = lock(&self.signals);
            signals.left = left;
            signals.right = right;
        }
        self
    }

    /// Extra speed applied while the wheels are turned, to overcome the
    /// added drag.
    pub fn with_steering_assist(mut self, extra: i32) -> Self {
        self.steering_assist = extra;
        self
    }

    pub fn motor(&self) -> &Motor {
        &self.motor
    }

    pub fn stop(&self) {
        self.motor.stop();
    }

    /// Halt with priority over any queued motion.  The motor stays stopped
    /// until a new run command.
    pub fn emergency_stop(&self) {
        warn!(motor = %self.motor.id(), "emergency stop");
        self.motor.emergency_stop();
    }

    /// Point the steering at `steering_angle`, then run at `speed`.  Turn
    /// signals are left alone.
    pub fn run(&self, speed: i32, steering_angle: i32) -> i32 {
        self.goto_angle(clamp_angle(steering_angle, MAX_STEERING_ANGLE));
        self.motor.run(speed)
    }

    /// Run forward at `speed` percent, `[0, 100]`.
    pub fn forward(&self, speed: i32) -> i32 {
        self.motor.run(speed.clamp(0, MAX_SPEED))
    }

    /// Run backward at `speed` percent, `[0, 100]`.
    pub fn backward(&self, speed: i32) -> i32 {
        self.motor.run(-speed.clamp(0, MAX_SPEED))
    }

    /// Set the obstacle bias on the motor.
    pub fn extra_speed(&self, delta: i32) {
        self.motor.extra_speed(delta);
    }

    /// `< 0` turns left, `> 0` right, `0` straightens.  Returns the angle
    /// reached.
    pub fn turn_steering(&self, angle: i32, turn_signal: bool) -> i32 {
        match angle {
            0 => self.turn_straight(),
            a if a < 0 => self.turn_left(a.saturating_neg(), turn_signal),
            a => self.turn_right(a, turn_signal),
        }
    }

    /// Steer left by `angle` degrees (`[0, 90]`).  An angle of zero or less
    /// straightens instead.  Returns the angle reached.
    pub fn turn_left(&self, angle: i32, turn_signal: bool) -> i32 {
        let angle = angle.clamp(0, MAX_STEERING_ANGLE);
        if angle == 0 {
            return self.turn_straight();
        }
        let reached = self.goto_angle(-angle);
        self.motor.extra_steering_speed(self.steering_assist);
        if turn_signal {
            self.signal(Color::Yellow, Color::Off);
        }
        reached
    }

    /// Steer right by `angle` degrees (`[0, 90]`).  An angle of zero or less
    /// straightens instead.  Returns the angle reached.
    pub fn turn_right(&self, angle: i32, turn_signal: bool) -> i32 {
        let angle = angle.clamp(0, MAX_STEERING_ANGLE);
        if angle == 0 {
            return self.turn_straight();
        }
        let reached = self.goto_angle(angle);
        self.motor.extra_steering_speed(self.steering_assist);
        if turn_signal {
            self.signal(Color::Off, Color::Yellow);
        }
        reached
    }

    /// Center the steering, drop the steering assist and cancel any turn
    /// signal.
    pub fn turn_straight(&self) -> i32 {
        let reached = {
            let mut steering = lock(&self.steering);
            match steering.goto_center() {
                Ok(a) => a,
                Err(e) => {
                    warn!(error = %e, "steering center failed");
                    steering.angle()
                }
            }
        };
        self.motor.extra_steering_speed(0);
        let mut signals = lock(&self.signals);
        if signals.turn_signal {
            signals.set(Color::Off, Color::Off);
            signals.turn_signal = false;
        }
        reached
    }

    /// Set both lights directly, e.g. for status feedback.  Does not change
    /// the turn-signal flag.
    pub fn set_leds(&self, left: Color, right: Color) {
        lock(&self.signals).set(left, right);
    }

    /// `(left, right)` colors, `None` for a missing light.
    pub fn leds(&self) -> (Option<Color>, Option<Color>) {
        let signals = lock(&self.signals);
        (
            signals.left.as_ref().map(|l| l.color()),
            signals.right.as_ref().map(|l| l.color()),
        )
    }

    pub fn turn_signal(&self) -> bool {
        lock(&self.signals).turn_signal
    }

    pub fn steering_angle(&self) -> i32 {
        lock(&self.steering).angle()
    }

    fn goto_angle(&self, angle: i32) -> i32 {
        let mut steering = lock(&self.steering);
        match steering.goto_angle(angle) {
            Ok(a) => a,
            Err(e) => {
                warn!(angle, error = %e, "steering command failed");
                steering.angle()
            }
        }
    }

    fn signal(&self, left: Color, right: Color) {
        let mut signals = lock(&self.signals);
        signals.set(left, right);
        signals.turn_signal = true;
        info!(%left, %right, "turn signal on");
    }
}

fn log_fault(result: Result<(), MobotError>, component: &str) {
    if let Err(e) = result {
        warn!(component, error = %e, "indicator command failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimIndicator, SimMotorDriver, SimSteering};

    struct Rig {
        drive: Drive,
        motor: SimMotorDriver,
        steering: SimSteering,
        left: SimIndicator,
        right: SimIndicator,
    }

    fn rig() -> Rig {
        let motor = SimMotorDriver::new("motorAB");
        let steering = SimSteering::new("steering", 45);
        let left = SimIndicator::new("leftLed");
        let right = SimIndicator::new("rightLed");
        let drive = Drive::new(Motor::new(Box::new(motor.clone()), 5), Box::new(steering.clone()))
            .with_indicators(Some(Box::new(left.clone())), Some(Box::new(right.clone())));
        Rig { drive, motor, steering, left, right }
    }

    #[test]
    fn turn_left_then_straight_toggles_signal() {
        let r = rig();
        assert_eq!(r.drive.turn_left(30, true), -30);
        assert!(r.drive.turn_signal());
        assert_eq!(r.left.color(), Color::Yellow);
        assert!(r.right.color().is_off());

        assert_eq!(r.drive.turn_straight(), 0);
        assert!(!r.drive.turn_signal());
        assert!(r.left.color().is_off());
        assert!(r.right.color().is_off());
    }

    #[test]
    fn turn_without_signal_leaves_lights_alone() {
        let r = rig();
        r.drive.turn_right(20, false);
        assert!(!r.drive.turn_signal());
        assert!(r.right.color().is_off());
        assert_eq!(r.steering.angle(), 20);
    }

    #[test]
    fn turn_steering_dispatches_and_clamps() {
        let r = rig();
        assert_eq!(r.drive.turn_steering(-80, true), -45);
        assert_eq!(r.left.color(), Color::Yellow);
        assert_eq!(r.drive.turn_steering(200, true), 45);
        assert_eq!(r.right.color(), Color::Yellow);
        assert!(r.left.color().is_off());
        assert_eq!(r.drive.turn_steering(0, true), 0);
        assert!(r.right.color().is_off());
    }

    #[test]
    fn non_positive_turn_straightens_and_clears_signal() {
        let r = rig();
        r.drive.forward(40);
        r.drive.turn_right(30, true);
        assert!(r.drive.turn_signal());

        for angle in [0, -30] {
            assert_eq!(r.drive.turn_left(angle, true), 0);
            assert!(!r.drive.turn_signal());
            assert!(r.left.color().is_off());
            assert!(r.right.color().is_off());
            assert_eq!(r.steering.angle(), 0);
            assert_eq!(r.motor.speed(), 40);

            assert_eq!(r.drive.turn_right(angle, true), 0);
            assert!(!r.drive.turn_signal());
            assert!(r.right.color().is_off());
            assert_eq!(r.motor.speed(), 40);
        }
    }

    #[test]
    fn steering_assist_applies_while_turned() {
        let r = rig();
        r.drive.forward(40);
        r.drive.turn_left(30, true);
        assert_eq!(r.motor.speed(), 60);
        r.drive.turn_straight();
        assert_eq!(r.motor.speed(), 40);
    }

    #[test]
    fn forward_and_backward_take_magnitudes() {
        let r = rig();
        assert_eq!(r.drive.forward(150), 100);
        assert_eq!(r.drive.backward(30), -30);
        assert_eq!(r.drive.forward(-20), 0);
    }

    #[test]
    fn run_sets_steering_without_signal() {
        let r = rig();
        r.drive.run(50, -30);
        assert_eq!(r.steering.angle(), -30);
        assert_eq!(r.motor.speed(), 50);
        assert!(!r.drive.turn_signal());
        assert!(r.left.color().is_off());
    }

    #[test]
    fn set_leds_reaches_present_lights_only() {
        let motor = SimMotorDriver::new("motorAB");
        let left = SimIndicator::new("leftLed");
        let drive = Drive::new(Motor::new(Box::new(motor), 5), Box::new(SimSteering::new("s", 90)))
            .with_indicators(Some(Box::new(left.clone())), None);
        drive.set_leds(Color::Green, Color::Green);
        assert_eq!(drive.leds(), (Some(Color::Green), None));
        // Turning with a missing light must not panic.
        drive.turn_right(10, true);
        assert!(drive.turn_signal());
    }

    #[test]
    fn emergency_stop_holds_zero() {
        let r = rig();
        r.drive.forward(60);
        r.drive.emergency_stop();
        r.drive.extra_speed(0);
        r.drive.turn_left(10, false);
        assert_eq!(r.motor.speed(), 0);
        assert_eq!(r.drive.motor().requested_speed(), 0);
    }
}
