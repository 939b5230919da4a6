//! Follow behaviors: keep a target at a set distance, or track a line on the
//! floor.

use mobot_types::{Color, MobotError};
use tracing::{info, warn};

use crate::env::Env;

/// Speeds at or below this magnitude count as already stopped when the
/// target is lost.
const LOST_TARGET_SPEED: i32 = 5;

/// One FollowDistance tick.
///
/// The target distance is the stop distance in force, which the mode's enter
/// hook overrides to `follow.followDistance`.  Forward stops are left to the
/// interlock, so reaching the target only stops a robot that was backing
/// away.
pub fn follow_distance(env: &Env) -> Result<(), MobotError> {
    let Some(distance) = env.distance_sensor()?.distance() else {
        return Ok(());
    };
    let drive = env.drive();
    let speed = drive.motor().speed();

    let max_follow = env.float("follow.maxFollowDistance", 2.0) as f32;
    if distance >= max_follow {
        if speed.abs() > LOST_TARGET_SPEED {
            info!(distance_m = distance, "follow: target lost, stopping");
            drive.stop();
        }
        return Ok(());
    }

    let target = env.stop_distance();
    let offset = env.float("follow.distanceOffset", 0.1) as f32;
    if distance > target + offset {
        if speed <= 0 {
            info!(distance_m = distance, "follow: moving forward");
            drive.forward(env.int("auto.forwardSpeed", 60));
            drive.set_leds(Color::Cyan, Color::Cyan);
        }
    } else if distance < target - offset {
        if speed >= 0 {
            info!(distance_m = distance, "follow: moving backward");
            drive.backward(env.int("auto.backwardSpeed", 60));
            drive.set_leds(Color::Pink, Color::Pink);
        }
    } else if speed < 0 {
        info!(distance_m = distance, "follow: target reached, stopping");
        drive.stop();
        drive.set_leds(Color::Green, Color::Green);
    }
    Ok(())
}

/// Line following with a bounded recovery: when the line disappears the
/// robot backs up for at most `followLine.maxLostTicks` ticks, then stops and
/// waits for the line to show up again.
#[derive(Debug, Default)]
pub struct FollowLine {
    lost_ticks: i64,
}

impl FollowLine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.lost_ticks = 0;
    }

    /// Consecutive ticks without a line in sight.
    pub fn lost_ticks(&self) -> i64 {
        self.lost_ticks
    }

    pub fn tick(&mut self, env: &Env) -> Result<(), MobotError> {
        let line = env.line_sensor()?.status()?;
        let drive = env.drive();
        let forward = env.int("auto.forwardSpeed", 60);
        let angle = env.int("followLine.turnAngle", 45);

        if !line.lost() {
            self.lost_ticks = 0;
        }
        if line.middle {
            drive.turn_straight();
            drive.run(forward, 0);
            drive.set_leds(Color::Yellow, Color::Yellow);
        } else if line.left {
            drive.forward(forward);
            drive.turn_left(angle, true);
        } else if line.right {
            drive.forward(forward);
            drive.turn_right(angle, true);
        } else {
            self.lost_ticks += 1;
            let max_lost = i64::from(env.int("followLine.maxLostTicks", 10));
            if self.lost_ticks <= max_lost {
                drive.backward(env.int("auto.backwardSpeed", 60));
                drive.set_leds(Color::Cyan, Color::Cyan);
            } else if self.lost_ticks == max_lost + 1 {
                warn!(ticks = max_lost, "follow line: line lost, holding");
                drive.stop();
                drive.set_leds(Color::Red, Color::Red);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use mobot_hal::SimRig;
    use mobot_kernel::{ConfigStore, InterlockState};
    use mobot_types::LinePosition;

    fn setup() -> (SimRig, Env) {
        let rig = SimRig::builder().with_indicators().with_line_sensor().build();
        let env = Env::new(
            rig.hardware.clone(),
            Arc::new(ConfigStore::new()),
            Arc::new(InterlockState::new()),
        );
        (rig, env)
    }

    fn leds(env: &Env) -> (Option<Color>, Option<Color>) {
        env.drive().leds()
    }

    #[test]
    fn too_far_moves_forward_once() {
        let (rig, env) = setup();
        env.interlock.override_distances(0.5, 1.0);
        rig.distance.set_distance(1.0);

        follow_distance(&env).expect("tick");
        assert_eq!(rig.motor.speed(), 60);
        assert_eq!(leds(&env), (Some(Color::Cyan), Some(Color::Cyan)));

        follow_distance(&env).expect("tick");
        assert_eq!(rig.motor.commands(), vec![60]);
    }

    #[test]
    fn too_close_backs_up_then_stops_at_target() {
        let (rig, env) = setup();
        env.interlock.override_distances(0.5, 1.0);
        rig.distance.set_distance(0.3);

        follow_distance(&env).expect("tick");
        assert_eq!(rig.motor.speed(), -60);
        assert_eq!(leds(&env), (Some(Color::Pink), Some(Color::Pink)));

        rig.distance.set_distance(0.5);
        follow_distance(&env).expect("tick");
        assert_eq!(rig.motor.speed(), 0);
        assert_eq!(leds(&env), (Some(Color::Green), Some(Color::Green)));
    }

    #[test]
    fn within_deadband_keeps_forward_motion() {
        let (rig, env) = setup();
        env.interlock.override_distances(0.5, 1.0);
        env.drive().forward(60);
        rig.distance.set_distance(0.55);

        follow_distance(&env).expect("tick");
        assert_eq!(rig.motor.speed(), 60);
    }

    #[test]
    fn lost_target_stops_a_moving_robot() {
        let (rig, env) = setup();
        env.drive().forward(60);
        rig.distance.set_distance(3.0);

        follow_distance(&env).expect("tick");
        assert_eq!(rig.motor.speed(), 0);
    }

    #[test]
    fn invalid_reading_is_ignored() {
        let (rig, env) = setup();
        rig.distance.set_distance(-1.0);
        follow_distance(&env).expect("tick");
        assert!(rig.motor.commands().is_empty());
    }

    #[test]
    fn line_in_the_middle_drives_straight() {
        let (rig, env) = setup();
        let line = rig.line.clone().expect("line sensor");
        line.set(LinePosition { left: false, middle: true, right: false });

        let mut follow = FollowLine::new();
        follow.tick(&env).expect("tick");
        assert_eq!(rig.motor.speed(), 60);
        assert_eq!(env.drive().steering_angle(), 0);
        assert_eq!(leds(&env), (Some(Color::Yellow), Some(Color::Yellow)));
    }

    #[test]
    fn line_on_the_left_steers_left_with_signal() {
        let (rig, env) = setup();
        let line = rig.line.clone().expect("line sensor");
        line.set(LinePosition { left: true, middle: false, right: false });

        FollowLine::new().tick(&env).expect("tick");
        assert_eq!(env.drive().steering_angle(), -45);
        assert!(env.drive().turn_signal());
        assert_eq!(leds(&env), (Some(Color::Yellow), Some(Color::Off)));
    }

    #[test]
    fn lost_line_backs_off_for_a_bounded_time() {
        let (rig, env) = setup();
        let mut follow = FollowLine::new();

        for _ in 0..10 {
            follow.tick(&env).expect("tick");
        }
        assert_eq!(rig.motor.speed(), -60);
        assert_eq!(leds(&env), (Some(Color::Cyan), Some(Color::Cyan)));

        follow.tick(&env).expect("tick");
        assert_eq!(rig.motor.speed(), 0);
        assert_eq!(leds(&env), (Some(Color::Red), Some(Color::Red)));

        // Holding: no further commands while the line stays lost.
        let sent = rig.motor.commands().len();
        follow.tick(&env).expect("tick");
        assert_eq!(rig.motor.commands().len(), sent);

        rig.line
            .clone()
            .expect("line sensor")
            .set(LinePosition { left: false, middle: true, right: false });
        follow.tick(&env).expect("tick");
        assert_eq!(follow.lost_ticks(), 0);
        assert_eq!(rig.motor.speed(), 60);
    }

    #[test]
    fn missing_line_sensor_is_a_fault() {
        let rig = SimRig::builder().build();
        let env = Env::new(
            rig.hardware.clone(),
            Arc::new(ConfigStore::new()),
            Arc::new(InterlockState::new()),
        );
        assert!(matches!(
            FollowLine::new().tick(&env),
            Err(MobotError::Unavailable(_))
        ));
    }
}
