//! [`SimRig`] – a complete simulated robot for tests and headless runs.
//!
//! The builder assembles a [`Hardware`] bundle from the [`sim`](crate::sim)
//! adapters and hands back the adapter handles alongside it, so a test can
//! drive the robot through the control layer and observe or poke the
//! hardware directly.
//!
//! | Part | Always present | Stub behaviour |
//! |---|---|---|
//! | motor | yes | Records speeds; can fail on demand. |
//! | steering | yes | ±45° servo. |
//! | distance sensor | yes | Steady reading (2 m) plus scripted readings. |
//! | indicators | `with_indicators` | Store the last color. |
//! | head | `with_head` | ±90° pan, ±45° tilt, carries the distance sensor. |
//! | face tracker | `with_face_tracker` | 480×640 frames, faces set by the test. |
//! | line sensor | `with_line_sensor` | Position set by the test. |
//!
//! # Example
//!
//! ```rust
//! use mobot_hal::SimRig;
//!
//! let rig = SimRig::builder().with_indicators().with_head().build();
//! rig.hardware.drive.forward(50);
//! assert_eq!(rig.motor.speed(), 50);
//! ```

use std::sync::Arc;

use crate::drive::{DEFAULT_STEERING_ASSIST, Drive};
use crate::hardware::Hardware;
use crate::head::BotHead;
use crate::indicator::Indicator;
use crate::motor::Motor;
use crate::sim::{
    SimDistanceSensor, SimFaceTracker, SimIndicator, SimLineSensor, SimMotorDriver, SimSteering,
};

/// Handles onto every simulated part, plus the assembled [`Hardware`].
pub struct SimRig {
    pub hardware: Hardware,
    pub motor: SimMotorDriver,
    pub steering: SimSteering,
    pub distance: SimDistanceSensor,
    pub left_led: Option<SimIndicator>,
    pub right_led: Option<SimIndicator>,
    pub head_pan: Option<SimSteering>,
    pub head_tilt: Option<SimSteering>,
    pub faces: Option<SimFaceTracker>,
    pub line: Option<SimLineSensor>,
}

impl SimRig {
    pub fn builder() -> SimRigBuilder {
        SimRigBuilder::default()
    }
}

pub struct SimRigBuilder {
    indicators: bool,
    head: bool,
    face_tracker: bool,
    line_sensor: bool,
    min_moving_speed: i32,
    steering_assist: i32,
    distance: f32,
}

impl Default for SimRigBuilder {
    fn default() -> Self {
        Self {
            indicators: false,
            head: false,
            face_tracker: false,
            line_sensor: false,
            min_moving_speed: 5,
            steering_assist: DEFAULT_STEERING_ASSIST,
            distance: 2.0,
        }
    }
}

impl SimRigBuilder {
    pub fn with_indicators(mut self) -> Self {
        self.indicators = true;
        self
    }

    pub fn with_head(mut self) -> Self {
        self.head = true;
        self
    }

    pub fn with_face_tracker(mut self) -> Self {
        self.face_tracker = true;
        self
    }

    pub fn with_line_sensor(mut self) -> Self {
        self.line_sensor = true;
        self
    }

    /// Everything: indicators, head, face tracker and line sensor.
    pub fn full(self) -> Self {
        self.with_indicators()
            .with_head()
            .with_face_tracker()
            .with_line_sensor()
    }

    pub fn min_moving_speed(mut self, speed: i32) -> Self {
        self.min_moving_speed = speed;
        self
    }

    pub fn steering_assist(mut self, extra: i32) -> Self {
        self.steering_assist = extra;
        self
    }

    /// Initial steady distance reading, meters.
    pub fn distance(mut self, meters: f32) -> Self {
        self.distance = meters;
        self
    }

    pub fn build(self) -> SimRig {
        let motor = SimMotorDriver::new("motorAB");
        let steering = SimSteering::new("steering", 45);
        let distance = SimDistanceSensor::new("distanceSensor", self.distance);

        let (left_led, right_led) = if self.indicators {
            (
                Some(SimIndicator::new("leftLed")),
                Some(SimIndicator::new("rightLed")),
            )
        } else {
            (None, None)
        };

        let drive = Drive::new(
            Motor::new(Box::new(motor.clone()), self.min_moving_speed),
            Box::new(steering.clone()),
        )
        .with_steering_assist(self.steering_assist)
        .with_indicators(
            left_led.clone().map(|l| Box::new(l) as Box<dyn Indicator>),
            right_led.clone().map(|l| Box::new(l) as Box<dyn Indicator>),
        );

        let sensor: Arc<SimDistanceSensor> = Arc::new(distance.clone());
        let mut hardware = Hardware::new(drive).with_distance_sensor(sensor.clone());

        let (head_pan, head_tilt) = if self.head {
            let pan = SimSteering::new("headH", 90);
            let tilt = SimSteering::new("headV", 45);
            let head = BotHead::new(Box::new(pan.clone()))
                .with_vertical(Box::new(tilt.clone()))
                .with_sensor(sensor);
            hardware = hardware.with_head(Box::new(head));
            (Some(pan), Some(tilt))
        } else {
            (None, None)
        };

        let faces = self.face_tracker.then(|| SimFaceTracker::new((480, 640)));
        if let Some(f) = &faces {
            hardware = hardware.with_face_tracker(Arc::new(f.clone()));
        }

        let line = self.line_sensor.then(SimLineSensor::new);
        if let Some(l) = &line {
            hardware = hardware.with_line_sensor(Arc::new(l.clone()));
        }

        SimRig {
            hardware,
            motor,
            steering,
            distance,
            left_led,
            right_led,
            head_pan,
            head_tilt,
            faces,
            line,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Head, ScanSweep, Steering};

    #[test]
    fn bare_rig_has_only_drive_and_distance() {
        let rig = SimRig::builder().build();
        assert!(rig.hardware.distance.is_some());
        assert!(rig.hardware.head.is_none());
        assert!(rig.hardware.face_tracker.is_none());
        assert!(rig.hardware.line_sensor.is_none());
        assert_eq!(rig.hardware.drive.leds(), (None, None));
    }

    #[test]
    fn full_rig_wires_head_to_shared_sensor() {
        let rig = SimRig::builder().full().distance(0.7).build();
        let head = rig.hardware.head.clone().unwrap();
        let mut head = head.lock().unwrap();
        let scan = head
            .scan(&ScanSweep::horizontal(-10, 10, 10, 0))
            .unwrap();
        assert_eq!(scan.distances, vec![0.7, 0.7, 0.7]);
        assert_eq!(rig.distance.reads(), 3);
        assert_eq!(rig.head_pan.as_ref().map(|p| p.angle()), Some(10));
    }

    #[test]
    fn indicators_are_wired_into_drive() {
        let rig = SimRig::builder().with_indicators().build();
        rig.hardware.drive.turn_left(20, true);
        assert_eq!(
            rig.left_led.as_ref().map(|l| l.color()),
            Some(mobot_types::Color::Yellow)
        );
    }
}
