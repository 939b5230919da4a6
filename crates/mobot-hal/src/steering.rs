//! Steering capability: anything that can be pointed at an angle.
//!
//! Used both for the drive's front wheels and for the pan/tilt joints of the
//! sensor head.  Angles are degrees, `< 0` left (or down), `> 0` right (or
//! up), `0` center.

use mobot_types::MobotError;

/// Largest steering angle in either direction, in degrees.
pub const MAX_STEERING_ANGLE: i32 = 90;

/// Clamp an angle to `[-limit, limit]`.
pub fn clamp_angle(angle: i32, limit: i32) -> i32 {
    let limit = limit.abs();
    angle.clamp(-limit, limit)
}

pub trait Steering: Send + Sync {
    fn id(&self) -> &str;

    /// Move to `angle`.  Implementations clamp to their physical range and
    /// return the angle actually reached.
    fn goto_angle(&mut self, angle: i32) -> Result<i32, MobotError>;

    /// Return to center.
    fn goto_center(&mut self) -> Result<i32, MobotError> {
        self.goto_angle(0)
    }

    /// Angle currently held.
    fn angle(&self) -> i32;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimSteering;

    #[test]
    fn clamp_angle_is_symmetric() {
        assert_eq!(clamp_angle(120, 90), 90);
        assert_eq!(clamp_angle(-120, 90), -90);
        assert_eq!(clamp_angle(30, -45), 30);
        assert_eq!(clamp_angle(-60, -45), -45);
    }

    #[test]
    fn goto_center_returns_to_zero() {
        let mut s = SimSteering::new("steering", 45);
        assert_eq!(s.goto_angle(70).unwrap(), 45);
        assert_eq!(s.goto_center().unwrap(), 0);
        assert_eq!(s.angle(), 0);
    }
}
