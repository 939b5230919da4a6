//! [`MobileBot`] – the robot as command handlers see it.
//!
//! Owns the hardware, the mode selector and controller, the distance
//! interlock and the two background workers that drive them.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use mobot_hal::SimRig;
//! use mobot_kernel::ConfigStore;
//! use mobot_runtime::MobileBot;
//! use mobot_types::Mode;
//!
//! # async fn run() -> Result<(), mobot_types::MobotError> {
//! let rig = SimRig::builder().full().build();
//! let bot = MobileBot::new(rig.hardware.clone(), Arc::new(ConfigStore::new()));
//! bot.start_up()?;
//! bot.set_operation_mode(Mode::AutoWander)?;
//! // ...
//! bot.shut_down().await;
//! # Ok(())
//! # }
//! ```

use std::sync::{Arc, Mutex};

use mobot_hal::{Hardware, SharedHead, lock};
use mobot_kernel::{
    ComponentHealth, ConfigProvider, DistanceInterlock, InterlockState, Watchdog,
};
use mobot_middleware::EventBus;
use mobot_types::{
    Color, Command, Event, EventPayload, InterlockAction, LookDirection, MobotError, Mode,
    WanderState,
};
use tokio::runtime::Handle;
use tracing::{info, warn};

use crate::controller::{ModeController, ModeSelector};
use crate::env::Env;
use crate::worker::Worker;

pub const INTERLOCK_WORKER: &str = "interlock";
pub const MODE_WORKER: &str = "mode";

const INTERLOCK_SOURCE: &str = "mobot-kernel::interlock";

pub struct MobileBot {
    hardware: Hardware,
    config: Arc<dyn ConfigProvider>,
    bus: EventBus,
    selector: ModeSelector,
    controller: Arc<Mutex<ModeController>>,
    interlock: Option<Arc<DistanceInterlock>>,
    interlock_state: Arc<InterlockState>,
    watchdog: Arc<Watchdog>,
    workers: Mutex<Vec<Worker>>,
}

impl MobileBot {
    pub fn new(hardware: Hardware, config: Arc<dyn ConfigProvider>) -> Self {
        Self::with_bus(hardware, config, EventBus::default())
    }

    /// Publish events on an existing bus instead of a private one.
    pub fn with_bus(hardware: Hardware, config: Arc<dyn ConfigProvider>, bus: EventBus) -> Self {
        let interlock_state = Arc::new(InterlockState::new());
        let env = Env::new(hardware.clone(), config.clone(), interlock_state.clone());
        let selector = ModeSelector::new(&hardware);
        let controller = ModeController::new(env, bus.clone(), selector.clone());

        let interlock = hardware.distance.clone().map(|sensor| {
            let interlock = DistanceInterlock::new(
                hardware.drive.clone(),
                sensor,
                config.clone(),
                interlock_state.clone(),
            );
            let interlock = match &hardware.head {
                Some(head) => interlock.with_head(head.clone()),
                None => interlock,
            };
            Arc::new(interlock)
        });

        Self {
            hardware,
            config,
            bus,
            selector,
            controller: Arc::new(Mutex::new(controller)),
            interlock,
            interlock_state,
            watchdog: Arc::new(Watchdog::new()),
            workers: Mutex::new(Vec::new()),
        }
    }

    // ── Lifecycle ───────────────────────────────────────────────────────────

    /// Reset to `Manual`, start the interlock (if
    /// `distanceChecker.enableThread` and a distance sensor is fitted) and
    /// the mode controller on the current tokio runtime, then stop the drive
    /// and show green.  Calling it on a running bot does nothing.
    ///
    /// # Errors
    ///
    /// [`MobotError::Unavailable`] outside a tokio runtime.
    pub fn start_up(&self) -> Result<(), MobotError> {
        let runtime = Handle::try_current()
            .map_err(|e| MobotError::Unavailable(format!("tokio runtime: {e}")))?;
        let mut workers = lock(&self.workers);
        if !workers.is_empty() {
            warn!("start-up requested while running");
            return Ok(());
        }

        self.reset_modes();

        if self.config.get_or_add_bool("distanceChecker.enableThread", true) {
            match &self.interlock {
                Some(interlock) => {
                    let step_interlock = interlock.clone();
                    let bus = self.bus.clone();
                    workers.push(Worker::spawn(
                        &runtime,
                        INTERLOCK_WORKER,
                        interlock.period(),
                        self.watchdog.clone(),
                        move || {
                            interlock_step(&step_interlock, &bus);
                        },
                    ));
                }
                None => warn!("no distance sensor fitted, interlock not started"),
            }
        }

        let controller = self.controller.clone();
        let period = lock(&controller).env().period;
        workers.push(Worker::spawn(
            &runtime,
            MODE_WORKER,
            period,
            self.watchdog.clone(),
            move || lock(&controller).tick(),
        ));
        drop(workers);

        self.stop();
        self.hardware.drive.set_leds(Color::Green, Color::Green);
        info!("mobile bot started");
        Ok(())
    }

    /// Stop both workers, reset to `Manual` and stop the drive.
    pub async fn shut_down(&self) {
        let workers = std::mem::take(&mut *lock(&self.workers));
        for worker in workers {
            worker.stop().await;
        }
        self.reset_modes();
        self.stop();
        info!("mobile bot shut down");
    }

    pub fn is_running(&self) -> bool {
        !lock(&self.workers).is_empty()
    }

    /// Heartbeat status of the running workers.
    pub fn worker_health(&self) -> Vec<(String, ComponentHealth)> {
        self.watchdog.report()
    }

    fn reset_modes(&self) {
        lock(&self.controller).reset();
    }

    // ── Modes ───────────────────────────────────────────────────────────────

    /// Request `mode`; the controller switches on its next tick.
    ///
    /// # Errors
    ///
    /// [`MobotError::UnsupportedMode`] when the hardware cannot run `mode`.
    pub fn set_operation_mode(&self, mode: Mode) -> Result<Mode, MobotError> {
        self.selector.set(mode)
    }

    /// # Errors
    ///
    /// [`MobotError::InvalidMode`] for unknown ids, or
    /// [`MobotError::UnsupportedMode`].
    pub fn set_operation_mode_id(&self, id: i64) -> Result<Mode, MobotError> {
        self.selector.set_id(id)
    }

    /// The requested mode.
    pub fn mode(&self) -> Mode {
        self.selector.get()
    }

    /// The mode the controller is running.  Lags [`mode`][Self::mode] by up
    /// to one tick.
    pub fn active_mode(&self) -> Mode {
        lock(&self.controller).active_mode()
    }

    pub fn wander_state(&self) -> WanderState {
        lock(&self.controller).wander_state()
    }

    // ── Manual control ──────────────────────────────────────────────────────

    pub fn stop(&self) {
        self.hardware.drive.stop();
    }

    pub fn emergency_stop(&self) {
        self.hardware.drive.emergency_stop();
    }

    /// Returns the actual speed.
    pub fn forward(&self, speed: i32) -> i32 {
        self.hardware.drive.forward(speed)
    }

    pub fn backward(&self, speed: i32) -> i32 {
        self.hardware.drive.backward(speed)
    }

    /// Returns the angle reached.
    pub fn turn_left(&self, angle: i32) -> i32 {
        self.hardware.drive.turn_left(angle, true)
    }

    pub fn turn_right(&self, angle: i32) -> i32 {
        self.hardware.drive.turn_right(angle, true)
    }

    pub fn turn_straight(&self) -> i32 {
        self.hardware.drive.turn_straight()
    }

    pub fn look_up(&self, angle: i32) -> Result<i32, MobotError> {
        self.look(LookDirection::Up, angle)
    }

    pub fn look_down(&self, angle: i32) -> Result<i32, MobotError> {
        self.look(LookDirection::Down, angle)
    }

    pub fn look_left(&self, angle: i32) -> Result<i32, MobotError> {
        self.look(LookDirection::Left, angle)
    }

    pub fn look_right(&self, angle: i32) -> Result<i32, MobotError> {
        self.look(LookDirection::Right, angle)
    }

    pub fn look_straight(&self) -> Result<(), MobotError> {
        lock(self.head()?).look_straight()
    }

    pub fn set_leds(&self, left: Color, right: Color) {
        self.hardware.drive.set_leds(left, right);
    }

    /// Run a decoded command.
    ///
    /// # Errors
    ///
    /// Mode rejections, or [`MobotError::Unavailable`] for head commands on a
    /// robot without a head.
    pub fn execute(&self, command: Command) -> Result<(), MobotError> {
        info!(?command, "command");
        match command {
            Command::Stop => self.stop(),
            Command::Forward { speed } => {
                self.forward(speed);
            }
            Command::Backward { speed } => {
                self.backward(speed);
            }
            Command::TurnLeft { angle } => {
                self.turn_left(angle);
            }
            Command::TurnRight { angle } => {
                self.turn_right(angle);
            }
            Command::TurnStraight => {
                self.turn_straight();
            }
            Command::Look { direction, angle } => {
                self.look(direction, angle)?;
            }
            Command::LookStraight => self.look_straight()?,
            Command::SetMode { mode } => {
                self.set_operation_mode(mode)?;
            }
            Command::SetLeds { left, right } => self.set_leds(left, right),
        }
        Ok(())
    }

    fn look(&self, direction: LookDirection, angle: i32) -> Result<i32, MobotError> {
        let mut head = lock(self.head()?);
        match direction {
            LookDirection::Up => head.turn_vertical(angle),
            LookDirection::Down => head.turn_vertical(angle.saturating_neg()),
            LookDirection::Right => head.turn_horizontal(angle),
            LookDirection::Left => head.turn_horizontal(angle.saturating_neg()),
        }
    }

    fn head(&self) -> Result<&SharedHead, MobotError> {
        self.hardware
            .head
            .as_ref()
            .ok_or_else(|| MobotError::Unavailable("head".into()))
    }

    // ── Accessors ───────────────────────────────────────────────────────────

    pub fn hardware(&self) -> &Hardware {
        &self.hardware
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn interlock_state(&self) -> &Arc<InterlockState> {
        &self.interlock_state
    }

    /// Run one controller tick in the caller's thread.  For hosts that drive
    /// the robot from their own loop instead of [`start_up`][Self::start_up].
    pub fn run_mode_tick(&self) {
        lock(&self.controller).tick();
    }

    /// Run one interlock cycle in the caller's thread.  Returns the action
    /// taken when it changed.
    pub fn run_interlock_cycle(&self) -> Option<(InterlockAction, f32)> {
        self.interlock
            .as_ref()
            .and_then(|interlock| interlock_step(interlock, &self.bus))
    }
}

/// One interlock cycle; changed actions go out on the bus.
fn interlock_step(interlock: &DistanceInterlock, bus: &EventBus) -> Option<(InterlockAction, f32)> {
    let (action, distance_m) = interlock.cycle()?;
    bus.publish(Event::new(
        INTERLOCK_SOURCE,
        EventPayload::Interlock { action, distance_m },
    ));
    Some((action, distance_m))
}
