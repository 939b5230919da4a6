//! Indicator light capability.
//!
//! An indicator is an RGB LED (or a pair wired together) that takes one of
//! the fixed [`Color`] palette entries.  The drive uses a left and a right
//! indicator as turn signals; behaviors use them for status feedback.

use mobot_types::{Color, MobotError};

pub trait Indicator: Send + Sync {
    fn id(&self) -> &str;

    /// Switch the light to `color`; [`Color::Off`] turns it off.
    fn set_color(&mut self, color: Color) -> Result<(), MobotError>;

    /// Color currently shown.
    fn color(&self) -> Color;

    fn off(&mut self) -> Result<(), MobotError> {
        self.set_color(Color::Off)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimIndicator;

    #[test]
    fn off_resets_color() {
        let mut led = SimIndicator::new("leftLed");
        led.set_color(Color::Cyan).unwrap();
        assert_eq!(led.color(), Color::Cyan);
        led.off().unwrap();
        assert!(led.color().is_off());
    }
}
