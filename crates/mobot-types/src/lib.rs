//! `mobot-types` – shared vocabulary for every mobot crate.
//!
//! Operation modes, sensor data, structured commands, bus events, and the
//! single error type used across the workspace.

pub mod command;
pub mod mode;
pub mod sensing;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub use command::{Command, LookDirection};
pub use mode::{Mode, WanderState};
pub use sensing::{Color, FaceId, LinePosition, NO_FACE, ScanResult, TrackedFace};

/// What the distance interlock did on a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InterlockAction {
    /// Obstacle inside the emergency distance: drive halted immediately.
    EmergencyStop,
    /// Obstacle inside the stop distance: drive stopped.
    Stop,
    /// Obstacle inside the slow distance: negative speed bias applied.
    Slowdown { bias: i32 },
    /// Path clear again: a previously applied slowdown bias was removed.
    Release,
}

/// Unified event wrapper for the robot event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// e.g., "mobot-runtime::mode"
    pub source: String,
    pub payload: EventPayload,
}

impl Event {
    /// Stamp a payload with a fresh id and the current time.
    pub fn new(source: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source: source.into(),
            payload,
        }
    }
}

/// Variants of data that can be routed over the event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    ModeChanged { from: Mode, to: Mode },
    WanderStateChanged { from: WanderState, to: WanderState },
    Interlock { action: InterlockAction, distance_m: f32 },
    BehaviorFault { mode: Mode, message: String },
}

/// Global error type spanning bad input, hardware faults and missing
/// collaborators.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MobotError {
    #[error("Invalid operation mode: {0}")]
    InvalidMode(i64),

    #[error("Mode {mode} is not supported: no {missing}")]
    UnsupportedMode { mode: Mode, missing: String },

    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    #[error("Hardware Fault on {component}: {details}")]
    HardwareFault { component: String, details: String },

    #[error("Collaborator unavailable: {0}")]
    Unavailable(String),

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("Channel Error: {0}")]
    Channel(String),
}

impl MobotError {
    /// Shorthand for a [`MobotError::HardwareFault`].
    pub fn hardware(component: impl Into<String>, details: impl Into<String>) -> Self {
        MobotError::HardwareFault {
            component: component.into(),
            details: details.into(),
        }
    }
}
