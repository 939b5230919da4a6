//! Two physical motors driven as one.
//!
//! Typical use is a pair of drive motors on a common axle.  When the second
//! motor is mounted mirrored, [`DualMotorDriver::inverted`] flips its sign so
//! both wheels still roll the same way.

use mobot_types::MobotError;

use crate::motor::MotorDriver;

pub struct DualMotorDriver {
    id: String,
    primary: Box<dyn MotorDriver>,
    secondary: Box<dyn MotorDriver>,
    invert_secondary: bool,
}

impl DualMotorDriver {
    pub fn new(
        id: impl Into<String>,
        primary: Box<dyn MotorDriver>,
        secondary: Box<dyn MotorDriver>,
    ) -> Self {
        Self {
            id: id.into(),
            primary,
            secondary,
            invert_secondary: false,
        }
    }

    pub fn inverted(mut self) -> Self {
        self.invert_secondary = true;
        self
    }

    fn secondary_speed(&self, speed: i32) -> i32 {
        if self.invert_secondary { -speed } else { speed }
    }
}

impl MotorDriver for DualMotorDriver {
    fn id(&self) -> &str {
        &self.id
    }

    /// Both motors are always commanded; the first failure is reported.
    fn apply_speed(&mut self, speed: i32) -> Result<(), MobotError> {
        let secondary_speed = self.secondary_speed(speed);
        let a = self.primary.apply_speed(speed);
        let b = self.secondary.apply_speed(secondary_speed);
        a.and(b)
    }

    fn halt(&mut self) -> Result<(), MobotError> {
        let a = self.primary.halt();
        let b = self.secondary.halt();
        a.and(b)
    }

    /// Mean of both encoders, in the primary motor's direction.  Only
    /// available when both motors report.
    fn observed_speed(&self) -> Option<i32> {
        let a = self.primary.observed_speed()?;
        let b = self.secondary_speed(self.secondary.observed_speed()?);
        Some((a + b) / 2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimMotorDriver;

    #[test]
    fn commands_both_motors_with_inversion() {
        let a = SimMotorDriver::new("motorA");
        let b = SimMotorDriver::new("motorB");
        let mut dual = DualMotorDriver::new("motorAB", Box::new(a.clone()), Box::new(b.clone()))
            .inverted();
        dual.apply_speed(40).unwrap();
        assert_eq!(a.speed(), 40);
        assert_eq!(b.speed(), -40);
    }

    #[test]
    fn failure_on_one_side_still_commands_the_other() {
        let a = SimMotorDriver::new("motorA");
        let b = SimMotorDriver::new("motorB");
        a.set_failing(true);
        let mut dual = DualMotorDriver::new("motorAB", Box::new(a.clone()), Box::new(b.clone()));
        assert!(dual.apply_speed(30).is_err());
        assert_eq!(b.speed(), 30);
        assert!(dual.halt().is_err());
        assert_eq!(b.halt_count(), 1);
    }

    #[test]
    fn observed_speed_needs_both_encoders() {
        let a = SimMotorDriver::new("motorA");
        let b = SimMotorDriver::new("motorB");
        let dual = DualMotorDriver::new("motorAB", Box::new(a.clone()), Box::new(b.clone()))
            .inverted();
        a.set_observed(Some(50));
        assert_eq!(dual.observed_speed(), None);
        b.set_observed(Some(-40));
        assert_eq!(dual.observed_speed(), Some(45));
    }
}
