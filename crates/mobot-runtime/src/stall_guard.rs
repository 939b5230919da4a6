//! [`StallGuard`] – detects a state machine that stopped making progress.
//!
//! The guard is fed the machine's state once per tick.  Every tick the state
//! is the same as on the previous one counts as unchanged; any change resets
//! the count.  Once the count exceeds the limit the guard reports a stall and
//! the caller forces a recovery.
//!
//! # Example
//!
//! ```rust
//! use mobot_runtime::stall_guard::StallGuard;
//!
//! let mut guard = StallGuard::new(2);
//! guard.reset_to('a');
//!
//! assert!(!guard.record('a')); // 1 unchanged tick
//! assert!(!guard.record('a')); // 2
//! assert!(guard.record('a'));  // 3 > 2 → stalled
//!
//! assert!(!guard.record('b')); // progress resets the count
//! ```

// ─────────────────────────────────────────────────────────────────────────────
// StallGuard
// ─────────────────────────────────────────────────────────────────────────────

pub struct StallGuard<S> {
    limit: u64,
    last: Option<S>,
    unchanged: u64,
}

impl<S: Copy + PartialEq> StallGuard<S> {
    /// A guard that trips after more than `limit` unchanged ticks.
    pub fn new(limit: u64) -> Self {
        Self {
            limit,
            last: None,
            unchanged: 0,
        }
    }

    pub fn set_limit(&mut self, limit: u64) {
        self.limit = limit;
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    /// Record the state after a tick.  Returns `true` when the state has been
    /// unchanged for more than `limit` ticks.
    pub fn record(&mut self, state: S) -> bool {
        if self.last == Some(state) {
            self.unchanged += 1;
        } else {
            self.last = Some(state);
            self.unchanged = 0;
        }
        self.is_stalled()
    }

    pub fn is_stalled(&self) -> bool {
        self.unchanged > self.limit
    }

    pub fn unchanged(&self) -> u64 {
        self.unchanged
    }

    /// Start over with `state` as the last seen state.
    pub fn reset_to(&mut self, state: S) {
        self.last = Some(state);
        self.unchanged = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trips_only_after_limit_is_exceeded() {
        let mut guard = StallGuard::new(50);
        guard.reset_to(1);
        for _ in 0..50 {
            assert!(!guard.record(1));
        }
        assert_eq!(guard.unchanged(), 50);
        assert!(guard.record(1));
    }

    #[test]
    fn first_record_without_reset_is_a_change() {
        let mut guard = StallGuard::new(0);
        assert!(!guard.record("init"));
        assert!(guard.record("init"));
    }

    #[test]
    fn change_resets_count() {
        let mut guard = StallGuard::new(2);
        guard.record('x');
        guard.record('x');
        guard.record('y');
        assert_eq!(guard.unchanged(), 0);
        assert!(!guard.is_stalled());
    }

    #[test]
    fn limit_can_be_retuned() {
        let mut guard = StallGuard::new(10);
        guard.reset_to(0u8);
        guard.record(0);
        guard.record(0);
        guard.set_limit(1);
        assert_eq!(guard.limit(), 1);
        assert!(guard.is_stalled());
    }
}
