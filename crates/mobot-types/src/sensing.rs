//! Plain data produced by sensors and consumed by the behaviors.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::MobotError;

/// Fixed palette understood by every indicator light.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    #[default]
    Off,
    White,
    Red,
    Green,
    Blue,
    Yellow,
    Pink,
    Cyan,
    Purple,
    LightBlue,
    Orange,
}

impl Color {
    /// The `(red, green, blue)` triple for this color.
    pub fn rgb(self) -> (u8, u8, u8) {
        match self {
            Color::Off => (0, 0, 0),
            Color::White => (255, 255, 255),
            Color::Red => (255, 0, 0),
            Color::Green => (0, 255, 0),
            Color::Blue => (0, 0, 255),
            Color::Yellow => (255, 255, 0),
            Color::Pink => (255, 0, 255),
            Color::Cyan => (0, 255, 255),
            Color::Purple => (128, 0, 128),
            Color::LightBlue => (173, 216, 230),
            Color::Orange => (255, 165, 0),
        }
    }

    pub fn is_off(self) -> bool {
        self == Color::Off
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Color::Off => "off",
            Color::White => "white",
            Color::Red => "red",
            Color::Green => "green",
            Color::Blue => "blue",
            Color::Yellow => "yellow",
            Color::Pink => "pink",
            Color::Cyan => "cyan",
            Color::Purple => "purple",
            Color::LightBlue => "lightblue",
            Color::Orange => "orange",
        };
        f.write_str(name)
    }
}

impl FromStr for Color {
    type Err = MobotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" | "black" => Ok(Color::Off),
            "on" | "white" => Ok(Color::White),
            "red" => Ok(Color::Red),
            "green" => Ok(Color::Green),
            "blue" => Ok(Color::Blue),
            "yellow" => Ok(Color::Yellow),
            "pink" => Ok(Color::Pink),
            "cyan" => Ok(Color::Cyan),
            "purple" => Ok(Color::Purple),
            "lightblue" => Ok(Color::LightBlue),
            "orange" => Ok(Color::Orange),
            other => Err(MobotError::InvalidCommand(format!(
                "unknown color '{other}'"
            ))),
        }
    }
}

/// Three-way reading from a line-tracking sensor.  At most one flag is
/// expected to be set; all clear means no line is visible.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinePosition {
    pub left: bool,
    pub middle: bool,
    pub right: bool,
}

impl LinePosition {
    pub fn lost(&self) -> bool {
        !(self.left || self.middle || self.right)
    }
}

/// Identifier assigned to a face by the face tracker.  Valid ids are `>= 0`.
pub type FaceId = i64;

/// Sentinel meaning "no face is being tracked".
pub const NO_FACE: FaceId = -1;

/// Bounding box of a tracked face in image pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedFace {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl TrackedFace {
    /// Pixel coordinates of the center of the bounding box.
    pub fn center(&self) -> (i32, i32) {
        (self.x + self.width / 2, self.y + self.height / 2)
    }
}

/// Distances sampled by a head sweep, with the heading each one was taken
/// at.  The three vectors always have the same length.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    pub distances: Vec<f32>,
    pub horizontal: Vec<i32>,
    pub vertical: Vec<i32>,
}

impl ScanResult {
    pub fn push(&mut self, distance: f32, horizontal: i32, vertical: i32) {
        self.distances.push(distance);
        self.horizontal.push(horizontal);
        self.vertical.push(vertical);
    }

    pub fn len(&self) -> usize {
        self.distances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.distances.is_empty()
    }

    /// The sample with the largest distance that also exceeds
    /// `min_distance`, as `(distance, horizontal_heading)`.  The first sample
    /// wins on ties.
    pub fn most_open(&self, min_distance: f32) -> Option<(f32, i32)> {
        let mut best: Option<(f32, i32)> = None;
        for (d, h) in self.distances.iter().zip(&self.horizontal) {
            if *d > min_distance && best.is_none_or(|(max, _)| *d > max) {
                best = Some((*d, *h));
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_names_round_trip_through_display() {
        for color in [Color::Off, Color::Yellow, Color::LightBlue, Color::Orange] {
            assert_eq!(color.to_string().parse::<Color>().unwrap(), color);
        }
        assert!("yel".parse::<Color>().is_err());
    }

    #[test]
    fn line_lost_only_when_all_clear() {
        assert!(LinePosition::default().lost());
        assert!(!LinePosition { left: true, ..Default::default() }.lost());
    }

    #[test]
    fn face_center() {
        let face = TrackedFace { x: 100, y: 40, width: 50, height: 60 };
        assert_eq!(face.center(), (125, 70));
    }

    #[test]
    fn most_open_ignores_samples_inside_threshold() {
        let mut scan = ScanResult::default();
        scan.push(0.15, -90, 0);
        scan.push(0.8, -10, 0);
        scan.push(1.4, 30, 0);
        scan.push(1.4, 60, 0);
        assert_eq!(scan.most_open(0.2), Some((1.4, 30)));
        assert_eq!(scan.most_open(2.0), None);
    }
}
