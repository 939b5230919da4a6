//! [`Watchdog`] – liveness monitor for the background loops.
//!
//! The interlock and mode loops call [`Watchdog::heartbeat`] once per cycle.
//! A loop whose last heartbeat is older than its deadline is reported as
//! frozen, which is how a wedged sensor driver or a runaway scan shows up.
//!
//! The watchdog is shared between tasks behind an `Arc`; every method takes
//! `&self`.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use mobot_hal::lock;

// ────────────────────────────────────────────────────────────────────────────
// Public types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentHealth {
    /// Heartbeat seen within the deadline.
    Healthy,
    /// No heartbeat within the deadline.
    TimedOut,
}

struct ComponentEntry {
    last_heartbeat: Instant,
    timeout: Duration,
    beats: u64,
}

impl ComponentEntry {
    fn health(&self) -> ComponentHealth {
        if self.last_heartbeat.elapsed() <= self.timeout {
            ComponentHealth::Healthy
        } else {
            ComponentHealth::TimedOut
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Watchdog
// ────────────────────────────────────────────────────────────────────────────

/// # Example
///
/// ```
/// use std::time::Duration;
/// use mobot_kernel::watchdog::{ComponentHealth, Watchdog};
///
/// let wd = Watchdog::new();
/// wd.register("interlock", Duration::from_secs(1));
/// wd.heartbeat("interlock");
///
/// assert_eq!(wd.health("interlock"), ComponentHealth::Healthy);
/// ```
#[derive(Default)]
pub struct Watchdog {
    components: Mutex<BTreeMap<String, ComponentEntry>>,
}

impl Watchdog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `component` with a heartbeat deadline.  It starts healthy;
    /// re-registering resets it.
    pub fn register(&self, component: &str, timeout: Duration) {
        lock(&self.components).insert(
            component.to_string(),
            ComponentEntry {
                last_heartbeat: Instant::now(),
                timeout,
                beats: 0,
            },
        );
    }

    /// Forget `component`, e.g. after its loop was shut down on purpose.
    pub fn unregister(&self, component: &str) {
        lock(&self.components).remove(component);
    }

    /// No-op for unregistered components.
    pub fn heartbeat(&self, component: &str) {
        if let Some(entry) = lock(&self.components).get_mut(component) {
            entry.last_heartbeat = Instant::now();
            entry.beats += 1;
        }
    }

    /// Unknown components are reported as timed out.
    pub fn health(&self, component: &str) -> ComponentHealth {
        lock(&self.components)
            .get(component)
            .map_or(ComponentHealth::TimedOut, ComponentEntry::health)
    }

    /// Number of heartbeats received since registration.
    pub fn beats(&self, component: &str) -> u64 {
        lock(&self.components).get(component).map_or(0, |e| e.beats)
    }

    /// Components past their deadline, sorted by name.
    pub fn check_all(&self) -> Vec<String> {
        lock(&self.components)
            .iter()
            .filter(|(_, e)| e.health() == ComponentHealth::TimedOut)
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Health of every registered component, sorted by name.
    pub fn report(&self) -> Vec<(String, ComponentHealth)> {
        lock(&self.components)
            .iter()
            .map(|(id, e)| (id.clone(), e.health()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn fresh_component_is_healthy() {
        let wd = Watchdog::new();
        wd.register("mode", Duration::from_secs(5));
        assert_eq!(wd.health("mode"), ComponentHealth::Healthy);
        assert_eq!(wd.beats("mode"), 0);
    }

    #[test]
    fn heartbeat_resets_deadline() {
        let wd = Watchdog::new();
        wd.register("interlock", Duration::from_millis(40));
        thread::sleep(Duration::from_millis(20));
        wd.heartbeat("interlock");
        thread::sleep(Duration::from_millis(20));
        assert_eq!(wd.health("interlock"), ComponentHealth::Healthy);
        assert_eq!(wd.beats("interlock"), 1);
    }

    #[test]
    fn check_all_lists_only_silent_components() {
        let wd = Watchdog::new();
        wd.register("interlock", Duration::from_millis(20));
        wd.register("mode", Duration::from_secs(60));
        thread::sleep(Duration::from_millis(30));
        assert_eq!(wd.check_all(), vec!["interlock".to_string()]);
        assert_eq!(
            wd.report(),
            vec![
                ("interlock".to_string(), ComponentHealth::TimedOut),
                ("mode".to_string(), ComponentHealth::Healthy),
            ]
        );
    }

    #[test]
    fn unknown_and_unregistered_components() {
        let wd = Watchdog::new();
        wd.heartbeat("ghost");
        assert_eq!(wd.health("ghost"), ComponentHealth::TimedOut);

        wd.register("mode", Duration::from_secs(60));
        wd.unregister("mode");
        assert!(wd.report().is_empty());
    }

    #[test]
    fn reregister_resets_timer() {
        let wd = Watchdog::new();
        wd.register("mode", Duration::from_millis(20));
        thread::sleep(Duration::from_millis(30));
        assert_eq!(wd.health("mode"), ComponentHealth::TimedOut);
        wd.register("mode", Duration::from_secs(60));
        assert_eq!(wd.health("mode"), ComponentHealth::Healthy);
    }
}
