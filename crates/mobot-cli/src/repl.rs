//! REPL – interactive shell for driving the simulated robot.
//!
//! Plain lines are robot commands in `path value` form, the same vocabulary a
//! remote control sends:
//!
//! ```text
//! mobot> forward 60
//! mobot> right 30
//! mobot> leds red,green
//! mobot> mode wander
//! ```
//!
//! Slash-commands inspect the robot and poke the simulated world:
//!   /help                 – show this list
//!   /status               – mode, drive and worker health
//!   /mode <name|id>       – request an operation mode
//!   /distance <meters>    – what the distance sensor reads
//!   /line <left|middle|right|none>
//!   /face <x> <y> | clear – put a face in front of the camera
//!   /get <key>, /set <key> <value>, /config, /save
//!   /estop                – emergency stop
//!   /quit | /exit         – shut down and exit

use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use mobot_hal::SimRig;
use mobot_kernel::{ComponentHealth, ConfigStore, ConfigValue};
use mobot_runtime::MobileBot;
use mobot_types::{Command, LinePosition, Mode, TrackedFace};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use crate::config;

/// Side length of the bounding box `/face` places around the given center.
const FACE_SIZE: i32 = 40;

/// Everything a command may touch.
pub struct Context {
    pub bot: Arc<MobileBot>,
    pub rig: SimRig,
    pub config: Arc<ConfigStore>,
    pub config_path: PathBuf,
}

/// What the loop should do after a line was evaluated.
#[derive(Debug, PartialEq)]
pub enum Outcome {
    /// Print these lines and prompt again.
    Reply(Vec<String>),
    Quit,
}

impl Outcome {
    fn line(text: impl Into<String>) -> Self {
        Outcome::Reply(vec![text.into()])
    }

    fn silent() -> Self {
        Outcome::Reply(Vec::new())
    }
}

/// Entry point for the interactive REPL.
///
/// `shutdown` is polled each iteration; when set the REPL exits cleanly.
pub fn run(ctx: &Context, shutdown: Arc<AtomicBool>) {
    let mut editor = match DefaultEditor::new() {
        Ok(e) => e,
        Err(e) => {
            eprintln!("{}: {}", "Terminal error".red(), e);
            return;
        }
    };
    let prompt = format!("{} ", "mobot>".bold().cyan());

    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }

        let line = match editor.readline(&prompt) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => {
                ctx.bot.emergency_stop();
                println!("{}", "⚠  Interrupted – emergency stop.".yellow().bold());
                break;
            }
            Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("{}: {}", "Read error".red(), e);
                break;
            }
        };

        let cmd = line.trim();
        if cmd.is_empty() {
            continue;
        }
        // History is a convenience; a full history is not worth stopping for.
        let _ = editor.add_history_entry(cmd);

        match eval(cmd, ctx) {
            Ok(Outcome::Reply(lines)) => {
                for l in lines {
                    println!("  {}", l);
                }
            }
            Ok(Outcome::Quit) => {
                println!("{}", "Goodbye.".green());
                shutdown.store(true, Ordering::SeqCst);
                break;
            }
            Err(e) => {
                println!(
                    "{} {}. Type {} for available commands.",
                    "Error:".red(),
                    e.yellow(),
                    "/help".bold()
                );
            }
        }
    }
}

/// Evaluate one trimmed, non-empty input line.
pub fn eval(line: &str, ctx: &Context) -> Result<Outcome, String> {
    let mut words = line.split_whitespace();
    let head = words.next().unwrap_or_default();
    let args: Vec<&str> = words.collect();

    match head {
        "/help" => Ok(Outcome::Reply(help())),
        "/status" => Ok(Outcome::Reply(status(ctx))),
        "/mode" => cmd_mode(ctx, &args),
        "/distance" => cmd_distance(ctx, &args),
        "/line" => cmd_line(ctx, &args),
        "/face" => cmd_face(ctx, &args),
        "/get" => cmd_get(ctx, &args),
        "/set" => cmd_set(ctx, &args),
        "/config" => cmd_config(ctx),
        "/save" => {
            config::save_to(&ctx.config, &ctx.config_path)?;
            Ok(Outcome::line(format!("Config saved to {}", ctx.config_path.display())))
        }
        "/estop" => {
            ctx.bot.emergency_stop();
            Ok(Outcome::line("Emergency stop."))
        }
        "/quit" | "/exit" => Ok(Outcome::Quit),
        path => {
            let command = Command::parse(path, &args.join(" ")).map_err(|e| e.to_string())?;
            ctx.bot.execute(command).map_err(|e| e.to_string())?;
            Ok(Outcome::silent())
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Command handlers
// ─────────────────────────────────────────────────────────────────────────────

fn help() -> Vec<String> {
    [
        "Robot commands: forward|backward <speed>, left|right <angle>, straight, stop,",
        "  lookup|lookdown|lookleft|lookright <angle>, lookstraight, leds <color[,color]>",
        "/status                    – mode, drive and worker health",
        "/mode <name|id>            – manual, follow, line, wander, face (or 0-4)",
        "/distance <meters>         – set the simulated distance reading",
        "/line <left|middle|right|none>",
        "/face <x> <y> | clear      – place or remove a face in the camera image",
        "/get <key>  /set <key> <value>  /config  /save",
        "/estop                     – emergency stop",
        "/quit  /exit               – shut down and exit",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn status(ctx: &Context) -> Vec<String> {
    let hw = ctx.bot.hardware();
    let motor = hw.drive.motor();
    let mut lines = vec![
        format!("mode        : {} (active {})", ctx.bot.mode(), ctx.bot.active_mode()),
        format!(
            "speed       : {} (requested {}, bias {})",
            motor.speed(),
            motor.requested_speed(),
            motor.extra()
        ),
        format!("steering    : {}", hw.drive.steering_angle()),
        format!(
            "interlock   : {}",
            if ctx.bot.interlock_state().is_enabled() { "enabled" } else { "disabled" }
        ),
    ];
    if let Some(sensor) = &hw.distance {
        lines.push(format!("distance    : {:.2} m", sensor.get_distance()));
    }
    if ctx.bot.active_mode() == Mode::AutoWander {
        lines.push(format!("wander      : {}", ctx.bot.wander_state()));
    }
    for (name, health) in ctx.bot.worker_health() {
        let label = match health {
            ComponentHealth::Healthy => "healthy",
            ComponentHealth::TimedOut => "TIMED OUT",
        };
        lines.push(format!("worker {:<5}: {}", name, label));
    }
    lines
}

fn cmd_mode(ctx: &Context, args: &[&str]) -> Result<Outcome, String> {
    let [value] = args else {
        return Err("usage: /mode <name|id>".to_string());
    };
    let mode = match value.parse::<i64>() {
        Ok(id) => ctx.bot.set_operation_mode_id(id),
        Err(_) => value
            .parse::<Mode>()
            .and_then(|m| ctx.bot.set_operation_mode(m)),
    }
    .map_err(|e| e.to_string())?;
    Ok(Outcome::line(format!("Mode requested: {}", mode)))
}

fn cmd_distance(ctx: &Context, args: &[&str]) -> Result<Outcome, String> {
    let meters = match args {
        [v] => v.parse::<f32>().map_err(|_| format!("not a distance: '{}'", v))?,
        _ => return Err("usage: /distance <meters>".to_string()),
    };
    ctx.rig.distance.set_distance(meters);
    Ok(Outcome::silent())
}

fn cmd_line(ctx: &Context, args: &[&str]) -> Result<Outcome, String> {
    let sensor = ctx.rig.line.as_ref().ok_or("no line sensor fitted")?;
    let position = match args {
        ["left"] => LinePosition { left: true, ..Default::default() },
        ["middle"] => LinePosition { middle: true, ..Default::default() },
        ["right"] => LinePosition { right: true, ..Default::default() },
        ["none"] => LinePosition::default(),
        _ => return Err("usage: /line <left|middle|right|none>".to_string()),
    };
    sensor.set(position);
    Ok(Outcome::silent())
}

fn cmd_face(ctx: &Context, args: &[&str]) -> Result<Outcome, String> {
    let tracker = ctx.rig.faces.as_ref().ok_or("no face tracker fitted")?;
    match args {
        ["clear"] => tracker.clear(),
        [x, y] => {
            let parse = |v: &str| v.parse::<i32>().map_err(|_| format!("not a pixel: '{}'", v));
            let (cx, cy) = (parse(x)?, parse(y)?);
            tracker.set_faces([(
                0,
                TrackedFace {
                    x: cx - FACE_SIZE / 2,
                    y: cy - FACE_SIZE / 2,
                    width: FACE_SIZE,
                    height: FACE_SIZE,
                },
            )]);
        }
        _ => return Err("usage: /face <x> <y> | /face clear".to_string()),
    }
    Ok(Outcome::silent())
}

fn cmd_get(ctx: &Context, args: &[&str]) -> Result<Outcome, String> {
    let [key] = args else {
        return Err("usage: /get <key>".to_string());
    };
    match ctx.config.get(key) {
        Some(v) => Ok(Outcome::line(format!("{} = {}", key, v))),
        None => Err(format!("'{}' is not set", key)),
    }
}

fn cmd_set(ctx: &Context, args: &[&str]) -> Result<Outcome, String> {
    let [key, value @ ..] = args else {
        return Err("usage: /set <key> <value>".to_string());
    };
    if value.is_empty() {
        return Err("usage: /set <key> <value>".to_string());
    }
    let value = ConfigValue::parse_loose(&value.join(" "));
    ctx.config.set(key, value.clone());
    Ok(Outcome::line(format!("{} = {}", key, value)))
}

fn cmd_config(ctx: &Context) -> Result<Outcome, String> {
    let lines = ctx
        .config
        .keys()
        .into_iter()
        .filter_map(|k| ctx.config.get(&k).map(|v| format!("{} = {}", k, v)))
        .collect();
    Ok(Outcome::Reply(lines))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mobot_hal::Steering;

    fn context() -> (Context, tempfile::TempDir) {
        let dir = tempfile::tempdir().expect("tmp dir");
        let rig = SimRig::builder().full().build();
        let config = Arc::new(ConfigStore::new());
        let bot = Arc::new(MobileBot::new(rig.hardware.clone(), config.clone()));
        let config_path = dir.path().join("config.toml");
        (
            Context {
                bot,
                rig,
                config,
                config_path,
            },
            dir,
        )
    }

    #[test]
    fn robot_commands_reach_the_drive() {
        let (ctx, _dir) = context();
        assert_eq!(eval("forward 60", &ctx), Ok(Outcome::Reply(vec![])));
        assert_eq!(ctx.rig.motor.speed(), 60);
        eval("/right 30", &ctx).expect("right");
        assert_eq!(ctx.rig.steering.angle(), 30);
        eval("stop", &ctx).expect("stop");
        assert_eq!(ctx.rig.motor.speed(), 0);
    }

    #[test]
    fn bad_robot_command_is_an_error() {
        let (ctx, _dir) = context();
        assert!(eval("forward fast", &ctx).is_err());
        assert!(eval("dance 3", &ctx).is_err());
        assert!(eval("/frobnicate", &ctx).is_err());
    }

    #[test]
    fn mode_by_name_and_id() {
        let (ctx, _dir) = context();
        assert_eq!(
            eval("/mode wander", &ctx),
            Ok(Outcome::line("Mode requested: AutoWander"))
        );
        assert_eq!(ctx.bot.mode(), Mode::AutoWander);
        eval("/mode 0", &ctx).expect("manual");
        assert_eq!(ctx.bot.mode(), Mode::Manual);
        assert!(eval("/mode 99", &ctx).is_err());
        assert!(eval("/mode", &ctx).is_err());
        assert_eq!(ctx.bot.mode(), Mode::Manual);
    }

    #[test]
    fn world_commands_update_the_sim() {
        let (ctx, _dir) = context();
        eval("/distance 0.35", &ctx).expect("distance");
        let sensor = ctx.bot.hardware().distance.clone().expect("sensor");
        assert!((sensor.get_distance() - 0.35).abs() < 1e-6);

        eval("/line left", &ctx).expect("line");
        let line = ctx.bot.hardware().line_sensor.clone().expect("line sensor");
        assert!(line.status().expect("status").left);
        eval("/line none", &ctx).expect("line");
        assert!(line.status().expect("status").lost());
        assert!(eval("/line up", &ctx).is_err());

        eval("/face 320 240", &ctx).expect("face");
        let faces = ctx.bot.hardware().face_tracker.clone().expect("tracker");
        let tracked = faces.tracked_faces().expect("faces");
        assert_eq!(tracked.len(), 1);
        assert_eq!(tracked[&0].center(), (320, 240));
        eval("/face clear", &ctx).expect("clear");
        assert!(faces.tracked_faces().expect("faces").is_empty());
    }

    #[test]
    fn config_get_set_and_save() {
        let (ctx, _dir) = context();
        assert!(eval("/get auto.forwardSpeed", &ctx).is_err());
        assert_eq!(
            eval("/set auto.forwardSpeed 80", &ctx),
            Ok(Outcome::line("auto.forwardSpeed = 80"))
        );
        assert_eq!(ctx.config.get("auto.forwardSpeed"), Some(ConfigValue::Int(80)));
        assert!(eval("/set auto.forwardSpeed", &ctx).is_err());

        eval("/save", &ctx).expect("save");
        let saved = config::load_from(&ctx.config_path)
            .expect("load")
            .expect("present");
        assert_eq!(saved.get("auto.forwardSpeed"), Some(ConfigValue::Int(80)));
        assert!(!ctx.config.is_dirty());
    }

    #[test]
    fn status_reports_mode_and_speed() {
        let (ctx, _dir) = context();
        eval("forward 40", &ctx).expect("forward");
        let Ok(Outcome::Reply(lines)) = eval("/status", &ctx) else {
            panic!("status should reply");
        };
        assert!(lines.iter().any(|l| l.contains("Manual")));
        assert!(lines.iter().any(|l| l.starts_with("speed") && l.contains("40")));
    }

    #[test]
    fn estop_and_quit() {
        let (ctx, _dir) = context();
        eval("forward 60", &ctx).expect("forward");
        eval("/estop", &ctx).expect("estop");
        assert_eq!(ctx.rig.motor.speed(), 0);
        assert_eq!(eval("/quit", &ctx), Ok(Outcome::Quit));
        assert_eq!(eval("/exit", &ctx), Ok(Outcome::Quit));
    }
}
