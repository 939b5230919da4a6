//! Keep the head pointed at a tracked face.

use mobot_hal::lock;
use mobot_types::{FaceId, MobotError, NO_FACE};
use tracing::debug;

use crate::env::Env;

/// Offsets at or under this many degrees are not worth moving the head for.
const DEADBAND_DEGREES: i32 = 5;

#[derive(Debug)]
pub struct FaceTracking {
    face_id: FaceId,
}

impl Default for FaceTracking {
    fn default() -> Self {
        Self { face_id: NO_FACE }
    }
}

impl FaceTracking {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.face_id = NO_FACE;
    }

    /// Id of the face being followed, [`NO_FACE`] if none yet.
    pub fn face_id(&self) -> FaceId {
        self.face_id
    }

    pub fn tick(&mut self, env: &Env) -> Result<(), MobotError> {
        let tracker = env.face_tracker()?;
        let head = env.head()?;

        let faces = tracker.tracked_faces()?;
        if !faces.contains_key(&self.face_id) {
            match faces.keys().next() {
                Some(&id) => {
                    debug!(face = id, "tracking new face");
                    self.face_id = id;
                }
                None => return Ok(()),
            }
        }
        let Some(face) = faces.get(&self.face_id) else {
            return Ok(());
        };

        let (height, width) = tracker.image_shape();
        if height == 0 || width == 0 {
            return Err(MobotError::hardware("faceTracker", "empty image shape"));
        }
        let (cx, cy) = face.center();
        let (w, h) = (width as f64, height as f64);
        let hfov = env.float("faceTracking.horizontalViewAngle", 54.0);
        let vfov = env.float("faceTracking.verticalViewAngle", 42.0);
        // Image y grows downward, head tilt grows upward.
        let dx = ((f64::from(cx) - w / 2.0) / w * hfov) as i32;
        let dy = ((h / 2.0 - f64::from(cy)) / h * vfov) as i32;

        let mut head = lock(head);
        let (pan, tilt) = head.heading();
        if dx.abs() > DEADBAND_DEGREES {
            head.turn_horizontal(pan + dx)?;
        }
        if dy.abs() > DEADBAND_DEGREES {
            head.turn_vertical(tilt + dy)?;
        }
        Ok(())
    }
}
