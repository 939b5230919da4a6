//! What every behavior gets to work with.

use std::sync::Arc;
use std::time::Duration;

use mobot_hal::{DistanceSensor, Drive, FaceTracker, Hardware, LineSensor, SharedHead};
use mobot_kernel::interlock::default_distances;
use mobot_kernel::{ConfigProvider, InterlockState};
use mobot_types::MobotError;

/// Mode tick period when `mode.tickInSecond` is missing or unusable.
pub const DEFAULT_TICK: Duration = Duration::from_millis(200);

/// Hardware, configuration and interlock switches shared by the mode
/// controller and the behaviors it runs, plus the fixed tick period that
/// timers are counted in.
#[derive(Clone)]
pub struct Env {
    pub hardware: Hardware,
    pub config: Arc<dyn ConfigProvider>,
    pub interlock: Arc<InterlockState>,
    pub period: Duration,
}

impl Env {
    /// Reads the tick period from `mode.tickInSecond` once; it is fixed for
    /// the lifetime of the environment.
    pub fn new(
        hardware: Hardware,
        config: Arc<dyn ConfigProvider>,
        interlock: Arc<InterlockState>,
    ) -> Self {
        let secs = config.get_or_add_float("mode.tickInSecond", DEFAULT_TICK.as_secs_f64());
        let period = Duration::try_from_secs_f64(secs)
            .ok()
            .filter(|d| !d.is_zero())
            .unwrap_or(DEFAULT_TICK);
        Self {
            hardware,
            config,
            interlock,
            period,
        }
    }

    pub fn drive(&self) -> &Drive {
        &self.hardware.drive
    }

    pub fn int(&self, key: &str, default: i32) -> i32 {
        let v = self.config.get_or_add_int(key, i64::from(default));
        i32::try_from(v).unwrap_or(default)
    }

    pub fn float(&self, key: &str, default: f64) -> f64 {
        self.config.get_or_add_float(key, default)
    }

    /// Number of ticks spanning `seconds`, rounded.
    pub fn ticks(&self, seconds: f64) -> i64 {
        (seconds / self.period.as_secs_f64()).round() as i64
    }

    /// The stop distance currently in force: a mode override if one is set,
    /// otherwise the configured default.
    pub fn stop_distance(&self) -> f32 {
        self.interlock
            .distance_override()
            .map_or_else(|| default_distances(self.config.as_ref()).0, |(stop, _)| stop)
    }

    pub fn distance_sensor(&self) -> Result<&Arc<dyn DistanceSensor>, MobotError> {
        self.hardware
            .distance
            .as_ref()
            .ok_or_else(|| MobotError::Unavailable("distance sensor".into()))
    }

    pub fn line_sensor(&self) -> Result<&Arc<dyn LineSensor>, MobotError> {
        self.hardware
            .line_sensor
            .as_ref()
            .ok_or_else(|| MobotError::Unavailable("line sensor".into()))
    }

    pub fn face_tracker(&self) -> Result<&Arc<dyn FaceTracker>, MobotError> {
        self.hardware
            .face_tracker
            .as_ref()
            .ok_or_else(|| MobotError::Unavailable("face tracker".into()))
    }

    pub fn head(&self) -> Result<&SharedHead, MobotError> {
        self.hardware
            .head
            .as_ref()
            .ok_or_else(|| MobotError::Unavailable("head".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mobot_hal::SimRig;
    use mobot_kernel::ConfigStore;

    #[test]
    fn period_and_ticks_follow_config() {
        let config = Arc::new(ConfigStore::new());
        config.set("mode.tickInSecond", 0.1);
        let env = Env::new(
            SimRig::builder().build().hardware,
            config,
            Arc::new(InterlockState::new()),
        );
        assert_eq!(env.period, Duration::from_millis(100));
        assert_eq!(env.ticks(2.0), 20);
    }

    #[test]
    fn stop_distance_prefers_override() {
        let env = Env::new(
            SimRig::builder().build().hardware,
            Arc::new(ConfigStore::new()),
            Arc::new(InterlockState::new()),
        );
        assert_eq!(env.period, DEFAULT_TICK);
        assert_eq!(env.ticks(10.0), 50);
        assert_eq!(env.stop_distance(), 0.2);
        env.interlock.override_distances(0.35, 1.2);
        assert_eq!(env.stop_distance(), 0.35);
        assert!(matches!(env.line_sensor(), Err(MobotError::Unavailable(_))));
    }
}
