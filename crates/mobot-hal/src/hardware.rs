//! The set of collaborators a robot is assembled from.

use std::sync::{Arc, Mutex};

use crate::distance::DistanceSensor;
use crate::drive::Drive;
use crate::head::Head;
use crate::vision::{FaceTracker, LineSensor};

/// A head shared between the interlock (heading reads), the wander scan and
/// face tracking.
pub type SharedHead = Arc<Mutex<Box<dyn Head>>>;

/// Everything the control layer drives or reads.  Only the drive is
/// mandatory; modes that need a missing collaborator are refused.
#[derive(Clone)]
pub struct Hardware {
    pub drive: Arc<Drive>,
    pub distance: Option<Arc<dyn DistanceSensor>>,
    pub head: Option<SharedHead>,
    pub face_tracker: Option<Arc<dyn FaceTracker>>,
    pub line_sensor: Option<Arc<dyn LineSensor>>,
}

impl Hardware {
    pub fn new(drive: Drive) -> Self {
        Self {
            drive: Arc::new(drive),
            distance: None,
            head: None,
            face_tracker: None,
            line_sensor: None,
        }
    }

    pub fn with_distance_sensor(mut self, sensor: Arc<dyn DistanceSensor>) -> Self {
        self.distance = Some(sensor);
        self
    }

    pub fn with_head(mut self, head: Box<dyn Head>) -> Self {
        self.head = Some(Arc::new(Mutex::new(head)));
        self
    }

    pub fn with_face_tracker(mut self, tracker: Arc<dyn FaceTracker>) -> Self {
        self.face_tracker = Some(tracker);
        self
    }

    pub fn with_line_sensor(mut self, sensor: Arc<dyn LineSensor>) -> Self {
        self.line_sensor = Some(sensor);
        self
    }
}
