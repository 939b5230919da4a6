//! `mobot` – interactive console for a simulated mobile robot.
//!
//! This binary is the quickest way to exercise the whole stack without
//! hardware.  It:
//!
//! 1. Loads tunables from `~/.mobot/config.toml` (or `MOBOT_CONFIG`),
//!    falling back to built-in defaults.
//! 2. Assembles a fully fitted simulated robot and starts its interlock and
//!    mode workers.
//! 3. Prints every bus event (mode changes, wander states, interlock
//!    actions, behavior faults) as it happens.
//! 4. Drops the user into a REPL; see [`repl`] for the commands.
//! 5. Intercepts **Ctrl-C** to emergency-stop the drive, then shuts the
//!    workers down and saves any newly added tunables.

mod config;
mod repl;

use colored::Colorize;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

use mobot_hal::SimRig;
use mobot_kernel::ConfigStore;
use mobot_middleware::EventBus;
use mobot_runtime::{LogFormat, MobileBot, telemetry};
use mobot_types::{Event, EventPayload, InterlockAction};

fn main() -> ExitCode {
    print_banner();

    // ── Configuration ─────────────────────────────────────────────────────
    let config_path = config::config_path();
    let store = match config::load_from(&config_path) {
        Ok(Some(store)) => {
            println!(
                "  Config loaded from {}",
                config_path.display().to_string().bold()
            );
            store
        }
        Ok(None) => {
            println!(
                "  No config at {}; using defaults.",
                config_path.display().to_string().dimmed()
            );
            ConfigStore::new()
        }
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            ConfigStore::new()
        }
    };
    let format = config::log_format(&store);
    let config = Arc::new(store);

    // ── Structured logging ────────────────────────────────────────────────
    // RUST_LOG filters (default "info"); the user-facing output below still
    // uses println! so it stays readable with JSON logs.
    let _otel = telemetry::init_tracing_with("mobot", format);

    // ── Runtime and robot ─────────────────────────────────────────────────
    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("mobot-worker")
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("{}: {}", "Failed to start runtime".red(), e);
            return ExitCode::FAILURE;
        }
    };
    let _enter = runtime.enter();

    let rig = SimRig::builder().full().build();
    let bot = Arc::new(MobileBot::with_bus(
        rig.hardware.clone(),
        config.clone(),
        EventBus::default(),
    ));
    runtime.spawn(print_events(bot.bus().clone(), format));

    if let Err(e) = bot.start_up() {
        eprintln!("{}: {}", "Start-up failed".red(), e);
        return ExitCode::FAILURE;
    }
    info!(config = %config_path.display(), "mobot started");

    // ── Ctrl-C handler ────────────────────────────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();
    let bot_ctrlc = bot.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – emergency stop …".yellow().bold());
        bot_ctrlc.emergency_stop();
        shutdown_clone.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; the REPL still stops on Ctrl-C");
    }

    println!();
    println!(
        "  Type {} for a list of commands.\n",
        "/help".bold().cyan()
    );

    // ── Interactive REPL ──────────────────────────────────────────────────
    let ctx = repl::Context {
        bot: bot.clone(),
        rig,
        config: config.clone(),
        config_path: config_path.clone(),
    };
    repl::run(&ctx, shutdown);

    // ── Shutdown ──────────────────────────────────────────────────────────
    runtime.block_on(bot.shut_down());
    if config.is_dirty() {
        match config::save_to(&config, &config_path) {
            Ok(()) => println!(
                "  {} Config saved to {}",
                "✓".green().bold(),
                config_path.display().to_string().bold()
            ),
            Err(e) => {
                println!("{}: {}", "Error saving config".red(), e);
                return ExitCode::FAILURE;
            }
        }
    }
    ExitCode::SUCCESS
}

// ─────────────────────────────────────────────────────────────────────────────
// Event printer
// ─────────────────────────────────────────────────────────────────────────────

async fn print_events(bus: EventBus, format: LogFormat) {
    let mut rx = bus.subscribe_all();
    while let Some(event) = rx.recv().await {
        match format {
            LogFormat::Json => match serde_json::to_string(&event) {
                Ok(line) => println!("{}", line),
                Err(e) => warn!(error = %e, "event not serializable"),
            },
            LogFormat::Compact => println!("  {} {}", "◆".dimmed(), describe(&event)),
        }
    }
}

fn describe(event: &Event) -> String {
    match &event.payload {
        EventPayload::ModeChanged { from, to } => {
            format!("mode {} → {}", from, to.to_string().bold().cyan())
        }
        EventPayload::WanderStateChanged { from, to } => {
            format!("wander {} → {}", from, to).dimmed().to_string()
        }
        EventPayload::Interlock { action, distance_m } => {
            let what = match action {
                InterlockAction::EmergencyStop => "EMERGENCY STOP".red().bold().to_string(),
                InterlockAction::Stop => "stop".red().to_string(),
                InterlockAction::Slowdown { bias } => format!("slow down ({})", bias).yellow().to_string(),
                InterlockAction::Release => "clear".green().to_string(),
            };
            format!("interlock {} at {:.2} m", what, distance_m)
        }
        EventPayload::BehaviorFault { mode, message } => {
            format!("{} in {}: {}", "fault".red().bold(), mode, message)
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#"                 __          __ "#.bold().cyan());
    println!("{}", r#"   ____ ___  ____ / /_  ____  / /_"#.bold().cyan());
    println!("{}", r#"  / __ `__ \/ __ \/ __ \/ __ \/ __/"#.bold().cyan());
    println!("{}", r#" / / / / / / /_/ / /_/ / /_/ / /_  "#.bold().cyan());
    println!("{}", r#"/_/ /_/ /_/\____/_.___/\____/\__/  "#.bold().cyan());
    println!();
    println!(
        "  {}  v{}",
        "Mobile robot control console".bold(),
        env!("CARGO_PKG_VERSION")
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use mobot_types::{Mode, WanderState};

    #[test]
    fn describe_mentions_both_modes() {
        let e = Event::new(
            "test",
            EventPayload::ModeChanged {
                from: Mode::Manual,
                to: Mode::AutoWander,
            },
        );
        let text = describe(&e);
        assert!(text.contains("Manual"));
        assert!(text.contains("AutoWander"));
    }

    #[test]
    fn describe_interlock_distance() {
        let e = Event::new(
            "test",
            EventPayload::Interlock {
                action: InterlockAction::Stop,
                distance_m: 0.15,
            },
        );
        assert!(describe(&e).contains("0.15 m"));
    }

    #[test]
    fn describe_wander_states() {
        let e = Event::new(
            "test",
            EventPayload::WanderStateChanged {
                from: WanderState::Scan,
                to: WanderState::Turn,
            },
        );
        let text = describe(&e);
        assert!(text.contains("Scan"));
        assert!(text.contains("Turn"));
    }
}
