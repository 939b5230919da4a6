//! Forward distance sensor capability.

/// A range finder that reports the distance to the nearest obstacle.
///
/// Readings are meters.  Hardware that fails to produce a measurement
/// reports a negative value from [`get_distance`][Self::get_distance];
/// callers should normally use [`distance`][Self::distance], which turns
/// that into `None`.
pub trait DistanceSensor: Send + Sync {
    fn id(&self) -> &str;

    /// Raw reading in meters, negative when invalid.
    fn get_distance(&self) -> f32;

    /// Latest valid reading in meters.
    fn distance(&self) -> Option<f32> {
        valid_distance(self.get_distance())
    }
}

/// `Some(d)` for a usable reading; negatives and NaN are rejected.
pub fn valid_distance(d: f32) -> Option<f32> {
    if d.is_finite() && d >= 0.0 { Some(d) } else { None }
}
