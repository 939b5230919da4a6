//! Operation-mode state machine.
//!
//! Two halves share one atomic mode cell:
//!
//! * [`ModeSelector`] is the write side.  Command handlers call it from any
//!   thread; it validates the request and stores the mode.
//! * [`ModeController`] is the read side.  It is ticked on a fixed period,
//!   notices a new mode, runs the old mode's exit hook and the new mode's
//!   enter hook, then runs one tick of the active behavior.
//!
//! Because the controller samples the cell once per tick, a burst of requests
//! between two ticks collapses into the last one; the hooks of the mode that
//! was active and the mode that is finally selected always run, in that
//! order, before the new behavior's first tick.
//!
//! | Mode | Enter | Exit |
//! |---|---|---|
//! | Manual | stop | – |
//! | FollowDistance | straighten, look ahead, follow distances, interlock on | stop, default distances |
//! | FollowLine | reset lost-line count | stop, straighten |
//! | AutoWander | wander back to `Init`, interlock on | stop |
//! | FaceTracking | forget the tracked face | – |

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use mobot_hal::{Hardware, lock};
use mobot_middleware::EventBus;
use mobot_types::{Event, EventPayload, MobotError, Mode, WanderState};
use tracing::{error, info, warn};

use crate::env::Env;
use crate::face::FaceTracking;
use crate::follow::{FollowLine, follow_distance};
use crate::wander::WanderMachine;

const EVENT_SOURCE: &str = "mobot-runtime::mode";

// ─────────────────────────────────────────────────────────────────────────────
// ModeSelector
// ─────────────────────────────────────────────────────────────────────────────

/// Thread-safe handle for requesting an operation mode.  Clones share the
/// same cell.
#[derive(Debug, Clone)]
pub struct ModeSelector {
    requested: Arc<AtomicU8>,
    has_distance: bool,
    has_line: bool,
    has_faces: bool,
    has_head: bool,
}

impl ModeSelector {
    /// A selector in `Manual` that knows which modes `hardware` can run.
    pub fn new(hardware: &Hardware) -> Self {
        Self {
            requested: Arc::new(AtomicU8::new(Mode::Manual.id())),
            has_distance: hardware.distance.is_some(),
            has_line: hardware.line_sensor.is_some(),
            has_faces: hardware.face_tracker.is_some(),
            has_head: hardware.head.is_some(),
        }
    }

    /// The most recently accepted mode.
    pub fn get(&self) -> Mode {
        Mode::from_id(i64::from(self.requested.load(Ordering::SeqCst))).unwrap_or(Mode::Manual)
    }

    /// Whether the fitted hardware can run `mode`.
    ///
    /// # Errors
    ///
    /// [`MobotError::UnsupportedMode`] naming the first missing part.
    pub fn supports(&self, mode: Mode) -> Result<(), MobotError> {
        let missing = match mode {
            Mode::Manual => None,
            Mode::FollowDistance | Mode::AutoWander => {
                (!self.has_distance).then_some("distance sensor")
            }
            Mode::FollowLine => (!self.has_line).then_some("line sensor"),
            Mode::FaceTracking => {
                if !self.has_faces {
                    Some("face tracker")
                } else if !self.has_head {
                    Some("head")
                } else {
                    None
                }
            }
        };
        match missing {
            Some(missing) => Err(MobotError::UnsupportedMode {
                mode,
                missing: missing.into(),
            }),
            None => Ok(()),
        }
    }

    /// Request `mode`.  Takes effect on the controller's next tick.
    ///
    /// # Errors
    ///
    /// [`MobotError::UnsupportedMode`]; the selected mode is left unchanged.
    pub fn set(&self, mode: Mode) -> Result<Mode, MobotError> {
        if let Err(e) = self.supports(mode) {
            error!(mode = %mode, error = %e, "operation mode rejected");
            return Err(e);
        }
        let previous = self.requested.swap(mode.id(), Ordering::SeqCst);
        if previous != mode.id() {
            info!(mode = %mode, "operation mode requested");
        }
        Ok(mode)
    }

    /// Request a mode by its numeric id, as received from a command channel.
    ///
    /// # Errors
    ///
    /// [`MobotError::InvalidMode`] for ids outside `0..=4`, or
    /// [`MobotError::UnsupportedMode`].  Either way the selected mode is left
    /// unchanged.
    pub fn set_id(&self, id: i64) -> Result<Mode, MobotError> {
        let mode = Mode::from_id(id).inspect_err(|e| error!(error = %e, "operation mode rejected"))?;
        self.set(mode)
    }

    /// Select `mode` without checks.
    pub(crate) fn force(&self, mode: Mode) {
        self.requested.store(mode.id(), Ordering::SeqCst);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ModeController
// ─────────────────────────────────────────────────────────────────────────────

pub struct ModeController {
    env: Env,
    bus: EventBus,
    selector: ModeSelector,
    active: Mode,
    wander: WanderMachine,
    follow_line: FollowLine,
    face: FaceTracking,
}

impl ModeController {
    pub fn new(env: Env, bus: EventBus, selector: ModeSelector) -> Self {
        Self {
            env,
            bus,
            selector,
            active: Mode::Manual,
            wander: WanderMachine::new(),
            follow_line: FollowLine::new(),
            face: FaceTracking::new(),
        }
    }

    /// The mode whose behavior ran on the last tick.
    pub fn active_mode(&self) -> Mode {
        self.active
    }

    pub fn wander_state(&self) -> WanderState {
        self.wander.state()
    }

    pub fn selector(&self) -> &ModeSelector {
        &self.selector
    }

    pub fn env(&self) -> &Env {
        &self.env
    }

    /// Back to `Manual` with every behavior reset, without running hooks.
    /// The drive is left alone.
    pub fn reset(&mut self) {
        self.selector.force(Mode::Manual);
        self.active = Mode::Manual;
        self.wander.reset(&self.env);
        self.follow_line.reset();
        self.face.reset();
        self.env.interlock.restore_distances();
        self.env.interlock.set_enabled(true);
    }

    /// One controller period: apply a pending mode change, then run the
    /// active behavior.  Never fails; behavior faults are logged, published,
    /// and by default stop the drive.
    pub fn tick(&mut self) {
        let requested = self.selector.get();
        if requested != self.active {
            self.transition(requested);
        }
        if let Err(e) = self.dispatch() {
            self.fault(e);
        }
    }

    fn transition(&mut self, to: Mode) {
        let from = self.active;
        self.exit(from);
        self.enter(to);
        self.active = to;
        info!(from = %from, to = %to, "operation mode changed");
        self.bus.publish(Event::new(
            EVENT_SOURCE,
            EventPayload::ModeChanged { from, to },
        ));
    }

    fn enter(&mut self, mode: Mode) {
        let env = &self.env;
        match mode {
            Mode::Manual => {
                env.drive().stop();
            }
            Mode::FollowDistance => {
                self.look_straight();
                env.drive().turn_straight();
                let stop = env.float("follow.followDistance", 0.2) as f32;
                let slow = env.float("follow.slowdownDistance", 1.0) as f32;
                env.interlock.override_distances(stop, slow);
                env.interlock.set_enabled(true);
            }
            Mode::FollowLine => self.follow_line.reset(),
            Mode::AutoWander => {
                self.wander.reset(env);
                env.interlock.set_enabled(true);
            }
            Mode::FaceTracking => self.face.reset(),
        }
    }

    fn exit(&mut self, mode: Mode) {
        let env = &self.env;
        match mode {
            Mode::Manual | Mode::FaceTracking => {}
            Mode::FollowDistance => {
                env.drive().stop();
                env.interlock.restore_distances();
            }
            Mode::FollowLine => {
                env.drive().stop();
                env.drive().turn_straight();
            }
            Mode::AutoWander => {
                env.drive().stop();
            }
        }
    }

    fn dispatch(&mut self) -> Result<(), MobotError> {
        match self.active {
            Mode::Manual => Ok(()),
            Mode::FollowDistance => follow_distance(&self.env),
            Mode::FollowLine => self.follow_line.tick(&self.env),
            Mode::AutoWander => {
                if let Some((from, to)) = self.wander.tick(&self.env)? {
                    info!(from = %from, to = %to, "wander state changed");
                    self.bus.publish(Event::new(
                        EVENT_SOURCE,
                        EventPayload::WanderStateChanged { from, to },
                    ));
                }
                Ok(())
            }
            Mode::FaceTracking => self.face.tick(&self.env),
        }
    }

    fn fault(&self, e: MobotError) {
        let mode = self.active;
        error!(mode = %mode, error = %e, "behavior fault");
        if self.env.config.get_or_add_bool("mode.stopOnFault", true) {
            self.env.drive().stop();
        }
        self.bus.publish(Event::new(
            EVENT_SOURCE,
            EventPayload::BehaviorFault {
                mode,
                message: e.to_string(),
            },
        ));
    }

    fn look_straight(&self) {
        if let Some(head) = &self.env.hardware.head {
            if let Err(e) = lock(head).look_straight() {
                warn!(error = %e, "head failed to center");
            }
        }
    }
}
