//! Autonomous wander: drive until blocked, back off, look around, turn
//! toward open space, repeat.
//!
//! ```text
//!   Init ──▶ Moving ──(drive stopped)──▶ Stop ──▶ Back ──▶ Backing
//!    ▲                                              ▲          │ timer
//!    │                                              │ nothing  ▼
//! Turning ◀── Turn ◀──────(open direction)──────── Scan ◀──────┘
//!  timer
//! ```
//!
//! Two counters pace the machine:
//!
//! * the **delay counter** holds the machine for
//!   `wander.stateDelayInSecond` before the body of an untimed state runs
//!   (`Stop`, `Back`, `Scan`, `Turn`, `Init`);
//! * the **stall guard** forces a stop and a fresh `Scan` once the state has
//!   not changed for more than `wander.stateTimeout` worth of ticks.

use mobot_hal::{ScanSweep, lock};
use mobot_types::{MobotError, ScanResult, WanderState};
use tracing::{debug, info, warn};

use crate::env::Env;
use crate::stall_guard::StallGuard;

pub struct WanderMachine {
    state: WanderState,
    delay_counter: i64,
    timer: i64,
    turn_angle: i32,
    guard: StallGuard<WanderState>,
}

impl Default for WanderMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl WanderMachine {
    pub fn new() -> Self {
        Self {
            state: WanderState::Init,
            delay_counter: 0,
            timer: 0,
            turn_angle: 0,
            guard: StallGuard::new(u64::MAX),
        }
    }

    /// Back to `Init` with the pacing delay armed, as on entering the mode.
    pub fn reset(&mut self, env: &Env) {
        self.state = WanderState::Init;
        self.timer = 0;
        self.turn_angle = 0;
        self.delay_counter = Self::state_delay(env);
        self.guard.reset_to(WanderState::Init);
    }

    pub fn state(&self) -> WanderState {
        self.state
    }

    /// Steering angle chosen by the last successful scan.
    pub fn turn_angle(&self) -> i32 {
        self.turn_angle
    }

    /// Run one tick.  Returns `(from, to)` when the state changed.
    ///
    /// A failing state body still counts toward the stall guard, so a state
    /// that keeps failing is eventually abandoned for a fresh scan.
    pub fn tick(&mut self, env: &Env) -> Result<Option<(WanderState, WanderState)>, MobotError> {
        if self.delay_counter > 1 {
            self.delay_counter -= 1;
            return Ok(None);
        }
        self.delay_counter = 0;

        let before = self.state;
        let outcome = self.step(env);

        let limit = env.ticks(env.float("wander.stateTimeout", 10.0)).max(1);
        self.guard.set_limit(limit as u64);
        if self.guard.record(self.state) {
            warn!(state = %self.state, ticks = self.guard.unchanged(), "wander stalled, forcing scan");
            env.drive().stop();
            self.state = WanderState::Scan;
            self.guard.reset_to(WanderState::Scan);
        }

        outcome?;
        Ok((before != self.state).then_some((before, self.state)))
    }

    fn step(&mut self, env: &Env) -> Result<(), MobotError> {
        let drive = env.drive();
        match self.state {
            WanderState::Init => {
                if let Some(head) = &env.hardware.head {
                    lock(head).look_straight()?;
                }
                drive.turn_straight();
                drive.forward(env.int("auto.forwardSpeed", 60));
                self.next(env, WanderState::Moving);
            }
            WanderState::Moving => {
                if drive.motor().speed() == 0 {
                    self.next(env, WanderState::Stop);
                }
            }
            WanderState::Stop => self.next(env, WanderState::Back),
            WanderState::Back => {
                drive.backward(env.int("auto.backwardSpeed", 60));
                self.timer = env.ticks(env.float("wander.backwardTime", 1.0)).max(1);
                self.next(env, WanderState::Backing);
            }
            WanderState::Backing => {
                self.timer -= 1;
                if self.timer <= 0 {
                    drive.stop();
                    self.next(env, WanderState::Scan);
                }
            }
            WanderState::Scan => {
                let scan = self.scan(env)?;
                match scan.most_open(env.stop_distance()) {
                    Some((distance, heading)) => {
                        let angle = env.int("wander.turnAngle", 30);
                        // Reversing: steer away from the open side.
                        self.turn_angle = if heading > 0 { -angle } else { angle };
                        info!(distance_m = distance, heading, turn = self.turn_angle, "wander found open direction");
                        self.next(env, WanderState::Turn);
                    }
                    None => {
                        info!(samples = scan.len(), "wander found no open direction");
                        self.next(env, WanderState::Back);
                    }
                }
            }
            WanderState::Turn => {
                drive.turn_steering(self.turn_angle, true);
                drive.backward(env.int("wander.turnSpeed", 60));
                self.timer = env.ticks(env.float("wander.turningTime", 2.0)).max(1);
                self.next(env, WanderState::Turning);
            }
            WanderState::Turning => {
                self.timer -= 1;
                if self.timer <= 0 {
                    drive.stop();
                    self.next(env, WanderState::Init);
                }
            }
        }
        Ok(())
    }

    fn next(&mut self, env: &Env, state: WanderState) {
        self.delay_counter = if state.is_timed() {
            0
        } else {
            Self::state_delay(env)
        };
        debug!(from = %self.state, to = %state, delay = self.delay_counter, "wander transition");
        self.state = state;
    }

    /// Sweep the head at its current tilt.  Without a head the robot can only
    /// look where it points, so a single straight-ahead sample is taken.
    fn scan(&self, env: &Env) -> Result<ScanResult, MobotError> {
        let Some(head) = &env.hardware.head else {
            let mut result = ScanResult::default();
            let distance = env.distance_sensor()?.get_distance();
            result.push(distance, 0, 0);
            return Ok(result);
        };
        let mut head = lock(head);
        let (_, vertical) = head.heading();
        let sweep = ScanSweep::horizontal(
            env.int("wander.scan.starth", -90),
            env.int("wander.scan.endh", 90),
            env.int("wander.scan.inc", 10),
            vertical,
        );
        let result = head.scan(&sweep)?;
        debug!(distances = ?result.distances, "wander scan");
        Ok(result)
    }

    fn state_delay(env: &Env) -> i64 {
        env.ticks(env.float("wander.stateDelayInSecond", 2.0)).max(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use mobot_hal::{SimRig, SimRigBuilder};
    use mobot_kernel::{ConfigStore, InterlockState};

    fn setup(builder: SimRigBuilder) -> (SimRig, Env, Arc<ConfigStore>) {
        let rig = builder.build();
        let config = Arc::new(ConfigStore::new());
        let env = Env::new(rig.hardware.clone(), config.clone(), Arc::new(InterlockState::new()));
        (rig, env, config)
    }

    fn run(machine: &mut WanderMachine, env: &Env, ticks: usize) {
        for _ in 0..ticks {
            machine.tick(env).expect("wander tick");
        }
    }

    #[test]
    fn entry_delay_holds_init() {
        let (rig, env, _) = setup(SimRig::builder());
        let mut w = WanderMachine::new();
        w.reset(&env);
        run(&mut w, &env, 9);
        assert_eq!(w.state(), WanderState::Init);
        assert_eq!(rig.motor.speed(), 0);

        assert_eq!(
            w.tick(&env).expect("tick"),
            Some((WanderState::Init, WanderState::Moving))
        );
        assert_eq!(rig.motor.speed(), 60);
    }

    #[test]
    fn stall_guard_forces_scan_after_timeout() {
        let (rig, env, _) = setup(SimRig::builder());
        let mut w = WanderMachine::new();
        w.reset(&env);
        run(&mut w, &env, 10);
        assert_eq!(w.state(), WanderState::Moving);

        // 10 s / 0.2 s = 50 unchanged ticks are tolerated.
        run(&mut w, &env, 50);
        assert_eq!(w.state(), WanderState::Moving);
        assert_eq!(rig.motor.speed(), 60);

        assert_eq!(
            w.tick(&env).expect("tick"),
            Some((WanderState::Moving, WanderState::Scan))
        );
        assert_eq!(rig.motor.speed(), 0);
    }

    #[test]
    fn blocked_robot_backs_off_scans_and_turns() {
        let (rig, env, config) = setup(SimRig::builder().with_head());
        config.set("wander.stateDelayInSecond", 0.0);
        let mut w = WanderMachine::new();
        w.reset(&env);

        run(&mut w, &env, 1);
        assert_eq!(w.state(), WanderState::Moving);

        // Something stopped the drive.
        env.drive().stop();
        run(&mut w, &env, 1);
        assert_eq!(w.state(), WanderState::Stop);
        run(&mut w, &env, 1);
        assert_eq!(w.state(), WanderState::Back);
        run(&mut w, &env, 1);
        assert_eq!(w.state(), WanderState::Backing);
        assert_eq!(rig.motor.speed(), -60);

        // backwardTime 1 s = 5 ticks.
        run(&mut w, &env, 4);
        assert_eq!(w.state(), WanderState::Backing);
        run(&mut w, &env, 1);
        assert_eq!(w.state(), WanderState::Scan);
        assert_eq!(rig.motor.speed(), 0);

        // Every direction reads 2.0 m; the first (leftmost) sample wins, so the
        // robot reverses with positive lock.
        run(&mut w, &env, 1);
        assert_eq!(w.state(), WanderState::Turn);
        assert_eq!(w.turn_angle(), 30);

        run(&mut w, &env, 1);
        assert_eq!(w.state(), WanderState::Turning);
        assert_eq!(env.drive().steering_angle(), 30);
        assert_eq!(env.drive().motor().requested_speed(), -60);
        // Steering assist adds torque along the direction of travel.
        assert_eq!(rig.motor.speed(), -80);

        // turningTime 2 s = 10 ticks.
        run(&mut w, &env, 10);
        assert_eq!(w.state(), WanderState::Init);
        assert_eq!(rig.motor.speed(), 0);
    }

    #[test]
    fn scan_without_open_space_backs_off_again() {
        let (rig, env, config) = setup(SimRig::builder().with_head());
        config.set("wander.stateDelayInSecond", 0.0);
        rig.distance.set_distance(0.1);
        let mut w = WanderMachine::new();
        w.reset(&env);
        w.state = WanderState::Scan;
        w.guard.reset_to(WanderState::Scan);

        assert_eq!(
            w.tick(&env).expect("tick"),
            Some((WanderState::Scan, WanderState::Back))
        );
    }

    #[test]
    fn open_space_on_the_right_reverses_to_the_left() {
        let (rig, env, config) = setup(SimRig::builder().with_head());
        config.set("wander.stateDelayInSecond", 0.0);
        config.set("wander.scan.starth", 10_i64);
        config.set("wander.scan.endh", 30_i64);
        rig.distance.set_distance(0.1);
        rig.distance.push_readings([0.5, 1.5, 0.5]);
        let mut w = WanderMachine::new();
        w.reset(&env);
        w.state = WanderState::Scan;

        w.tick(&env).expect("tick");
        assert_eq!(w.state(), WanderState::Turn);
        assert_eq!(w.turn_angle(), -30);
    }

    #[test]
    fn headless_scan_samples_straight_ahead() {
        let (rig, env, config) = setup(SimRig::builder());
        config.set("wander.stateDelayInSecond", 0.0);
        rig.distance.set_distance(1.2);
        let mut w = WanderMachine::new();
        w.reset(&env);
        w.state = WanderState::Scan;

        w.tick(&env).expect("tick");
        assert_eq!(w.state(), WanderState::Turn);
        assert_eq!(w.turn_angle(), 30);
    }

    #[test]
    fn reset_returns_to_init() {
        let (_rig, env, config) = setup(SimRig::builder());
        config.set("wander.stateDelayInSecond", 0.0);
        let mut w = WanderMachine::new();
        w.reset(&env);
        run(&mut w, &env, 1);
        assert_eq!(w.state(), WanderState::Moving);
        w.reset(&env);
        assert_eq!(w.state(), WanderState::Init);
    }
}
