//! Structured commands accepted by the robot from the outside world.
//!
//! Command handlers receive a `(path, value)` pair (for example an HTTP path
//! segment and its body, or a REPL line).  [`Command::parse`] resolves the
//! path by exact match and decodes the value; anything it does not recognise
//! is rejected with [`MobotError::InvalidCommand`] before it can reach the
//! drive.
//!
//! ```
//! use mobot_types::{Command, Mode};
//!
//! assert_eq!(Command::parse("forward", "60").unwrap(), Command::Forward { speed: 60 });
//! assert_eq!(
//!     Command::parse("/mode", "wander").unwrap(),
//!     Command::SetMode { mode: Mode::AutoWander }
//! );
//! assert!(Command::parse("forwardx", "60").is_err());
//! ```

use serde::{Deserialize, Serialize};

use crate::{Color, MobotError, Mode};

/// Direction for a relative head movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LookDirection {
    Up,
    Down,
    Left,
    Right,
}

/// Every action an external caller may request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", content = "payload", rename_all = "snake_case")]
pub enum Command {
    Stop,
    Forward { speed: i32 },
    Backward { speed: i32 },
    TurnLeft { angle: i32 },
    TurnRight { angle: i32 },
    TurnStraight,
    Look { direction: LookDirection, angle: i32 },
    LookStraight,
    SetMode { mode: Mode },
    SetLeds { left: Color, right: Color },
}

impl Command {
    /// Decode a `(path, value)` pair.
    ///
    /// The path is matched exactly (case-insensitive, a leading `/` is
    /// ignored).  Commands that take no argument ignore `value`.
    ///
    /// # Errors
    ///
    /// Returns [`MobotError::InvalidCommand`] for unknown paths or values that
    /// do not parse.
    pub fn parse(path: &str, value: &str) -> Result<Self, MobotError> {
        let path = path.trim().trim_start_matches('/').to_ascii_lowercase();
        let cmd = match path.as_str() {
            "stop" => Command::Stop,
            "forward" => Command::Forward { speed: parse_int(&path, value)? },
            "backward" => Command::Backward { speed: parse_int(&path, value)? },
            "left" => Command::TurnLeft { angle: parse_int(&path, value)? },
            "right" => Command::TurnRight { angle: parse_int(&path, value)? },
            "straight" => Command::TurnStraight,
            "lookup" => look(LookDirection::Up, &path, value)?,
            "lookdown" => look(LookDirection::Down, &path, value)?,
            "lookleft" => look(LookDirection::Left, &path, value)?,
            "lookright" => look(LookDirection::Right, &path, value)?,
            "lookstraight" => Command::LookStraight,
            "mode" => Command::SetMode { mode: value.parse()? },
            "leds" => {
                let (left, right) = match value.split_once(',') {
                    Some((l, r)) => (l.parse()?, r.parse()?),
                    None => {
                        let c: Color = value.parse()?;
                        (c, c)
                    }
                };
                Command::SetLeds { left, right }
            }
            other => {
                return Err(MobotError::InvalidCommand(format!(
                    "unknown command path '{other}'"
                )));
            }
        };
        Ok(cmd)
    }
}

fn look(direction: LookDirection, path: &str, value: &str) -> Result<Command, MobotError> {
    Ok(Command::Look {
        direction,
        angle: parse_int(path, value)?,
    })
}

fn parse_int(path: &str, value: &str) -> Result<i32, MobotError> {
    value.trim().parse::<i32>().map_err(|e| {
        MobotError::InvalidCommand(format!("'{path}' expects an integer, got '{value}': {e}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_motion_commands() {
        assert_eq!(Command::parse("STOP", "").unwrap(), Command::Stop);
        assert_eq!(
            Command::parse("backward", " 40 ").unwrap(),
            Command::Backward { speed: 40 }
        );
        assert_eq!(
            Command::parse("left", "30").unwrap(),
            Command::TurnLeft { angle: 30 }
        );
        assert_eq!(
            Command::parse("lookdown", "15").unwrap(),
            Command::Look { direction: LookDirection::Down, angle: 15 }
        );
    }

    #[test]
    fn parses_leds_pair_and_single() {
        assert_eq!(
            Command::parse("leds", "yellow,off").unwrap(),
            Command::SetLeds { left: Color::Yellow, right: Color::Off }
        );
        assert_eq!(
            Command::parse("leds", "green").unwrap(),
            Command::SetLeds { left: Color::Green, right: Color::Green }
        );
    }

    #[test]
    fn rejects_substring_paths_and_bad_values() {
        // The old dispatcher matched "motora" inside "motorab"; exact match
        // must reject anything that is not a known path.
        assert!(Command::parse("leftturn", "30").is_err());
        assert!(Command::parse("forward", "fast").is_err());
        assert!(Command::parse("mode", "speech").is_err());
    }

    #[test]
    fn serializes_as_tagged_union() {
        let json = serde_json::to_string(&Command::Forward { speed: 60 }).unwrap();
        assert_eq!(json, r#"{"action":"forward","payload":{"speed":60}}"#);
        let back: Command = serde_json::from_str(r#"{"action":"stop"}"#).unwrap();
        assert_eq!(back, Command::Stop);
    }
}
