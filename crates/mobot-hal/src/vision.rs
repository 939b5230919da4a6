//! Vision-derived sensing: face tracking and line following.
//!
//! Detection itself happens elsewhere (a camera service, an IR array); these
//! traits only expose the results the behaviors consume.

use std::collections::BTreeMap;

use mobot_types::{FaceId, LinePosition, MobotError, TrackedFace};

pub trait FaceTracker: Send + Sync {
    /// Faces currently being tracked, keyed by tracker-assigned id.
    fn tracked_faces(&self) -> Result<BTreeMap<FaceId, TrackedFace>, MobotError>;

    /// `(height, width)` of the frames the faces are located in.
    fn image_shape(&self) -> (u32, u32);
}

pub trait LineSensor: Send + Sync {
    fn status(&self) -> Result<LinePosition, MobotError>;
}
