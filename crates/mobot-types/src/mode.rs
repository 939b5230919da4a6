//! Operation modes and the wander sub-states.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::MobotError;

/// The top-level behavior currently governing drive commands.
///
/// Exactly one mode is active at a time.  The numeric ids are the ones
/// accepted by the mode-setting operation; anything else is rejected with
/// [`MobotError::InvalidMode`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Mode {
    /// Driven only by explicit commands.
    #[default]
    Manual = 0,
    /// Keep a fixed distance to whatever is in front of the distance sensor.
    FollowDistance = 1,
    /// Follow a line on the ground.
    FollowLine = 2,
    /// Wander around autonomously, backing off and turning at obstacles.
    AutoWander = 3,
    /// Keep the head pointed at a tracked face.
    FaceTracking = 4,
}

impl Mode {
    /// Every mode, in id order.
    pub const ALL: [Mode; 5] = [
        Mode::Manual,
        Mode::FollowDistance,
        Mode::FollowLine,
        Mode::AutoWander,
        Mode::FaceTracking,
    ];

    /// Numeric id of the mode.
    pub fn id(self) -> u8 {
        self as u8
    }

    /// Resolve a numeric mode id.
    ///
    /// # Errors
    ///
    /// Returns [`MobotError::InvalidMode`] for ids outside `0..=4`.
    pub fn from_id(id: i64) -> Result<Self, MobotError> {
        Mode::ALL
            .into_iter()
            .find(|m| i64::from(m.id()) == id)
            .ok_or(MobotError::InvalidMode(id))
    }

    /// Human-readable name used in logs and events.
    pub fn name(self) -> &'static str {
        match self {
            Mode::Manual => "Manual",
            Mode::FollowDistance => "FollowDistance",
            Mode::FollowLine => "FollowLine",
            Mode::AutoWander => "AutoWander",
            Mode::FaceTracking => "FaceTracking",
        }
    }

    /// `true` for every mode other than [`Mode::Manual`].
    pub fn is_auto(self) -> bool {
        self != Mode::Manual
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<i64> for Mode {
    type Error = MobotError;

    fn try_from(id: i64) -> Result<Self, Self::Error> {
        Mode::from_id(id)
    }
}

impl FromStr for Mode {
    type Err = MobotError;

    /// Exact, case-insensitive match on the mode name or its short alias.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "manual" => Ok(Mode::Manual),
            "follow" | "followdistance" => Ok(Mode::FollowDistance),
            "line" | "followline" => Ok(Mode::FollowLine),
            "wander" | "autowander" => Ok(Mode::AutoWander),
            "face" | "facetracking" => Ok(Mode::FaceTracking),
            other => Err(MobotError::InvalidCommand(format!(
                "unknown mode '{other}'"
            ))),
        }
    }
}

/// States of the nested wander state machine.  Only meaningful while
/// [`Mode::AutoWander`] is active.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WanderState {
    /// Start moving forward.
    #[default]
    Init,
    /// Moving forward until something stops the drive.
    Moving,
    /// The drive came to a halt.
    Stop,
    /// Sweep the head and pick the most open direction.
    Scan,
    /// Steer toward the chosen direction and start reversing.
    Turn,
    /// Reversing with lock applied until the turn timer runs out.
    Turning,
    /// Start reversing away from the obstacle.
    Back,
    /// Reversing until the back-off timer runs out.
    Backing,
}

impl WanderState {
    /// States whose progress is governed by motion or a timer rather than the
    /// pacing delay.  Entering one of these does not arm the delay counter.
    pub fn is_timed(self) -> bool {
        matches!(
            self,
            WanderState::Moving | WanderState::Turning | WanderState::Backing
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            WanderState::Init => "Init",
            WanderState::Moving => "Moving",
            WanderState::Stop => "Stop",
            WanderState::Scan => "Scan",
            WanderState::Turn => "Turn",
            WanderState::Turning => "Turning",
            WanderState::Back => "Back",
            WanderState::Backing => "Backing",
        }
    }
}

impl fmt::Display for WanderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_ids_resolve() {
        for mode in Mode::ALL {
            assert_eq!(Mode::from_id(i64::from(mode.id())).unwrap(), mode);
        }
    }

    #[test]
    fn invalid_ids_are_rejected() {
        for id in [-1, 5, 99] {
            assert!(matches!(Mode::from_id(id), Err(MobotError::InvalidMode(x)) if x == id));
        }
    }

    #[test]
    fn names_parse_exactly() {
        assert_eq!("wander".parse::<Mode>().unwrap(), Mode::AutoWander);
        assert_eq!("FollowLine".parse::<Mode>().unwrap(), Mode::FollowLine);
        assert_eq!("follow".parse::<Mode>().unwrap(), Mode::FollowDistance);
        // Substrings of a valid name are not accepted.
        assert!("followlinex".parse::<Mode>().is_err());
        assert!("wand".parse::<Mode>().is_err());
    }

    #[test]
    fn timed_wander_states_skip_delay() {
        assert!(WanderState::Moving.is_timed());
        assert!(WanderState::Backing.is_timed());
        assert!(WanderState::Turning.is_timed());
        assert!(!WanderState::Scan.is_timed());
        assert!(!WanderState::Init.is_timed());
    }
}
