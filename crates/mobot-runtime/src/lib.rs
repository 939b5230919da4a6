//! `mobot-runtime` – Behaviors and the Loops That Run Them
//!
//! Everything that decides what the robot does from one moment to the next.
//!
//! # Modules
//!
//! - [`controller`] – [`ModeSelector`][controller::ModeSelector] and
//!   [`ModeController`][controller::ModeController]: the operation-mode state
//!   machine.  Requests are validated and stored by the selector; the
//!   controller runs exit and enter hooks on a change, then one tick of the
//!   active behavior.
//! - [`wander`] – [`WanderMachine`][wander::WanderMachine]: the nested state
//!   machine behind `AutoWander`.
//! - [`follow`] – FollowDistance and [`FollowLine`][follow::FollowLine].
//! - [`face`] – [`FaceTracking`][face::FaceTracking]: keeps the head on a
//!   tracked face.
//! - [`stall_guard`] – [`StallGuard`][stall_guard::StallGuard]: notices a
//!   state machine that stopped making progress.
//! - [`env`] – [`Env`][env::Env]: hardware, configuration and interlock
//!   switches handed to every behavior.
//! - [`worker`] – [`Worker`][worker::Worker]: named periodic tokio task with
//!   an explicit stop.
//! - [`robot`] – [`MobileBot`][robot::MobileBot]: the facade command handlers
//!   use; starts and stops the interlock and mode workers.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: global
//!   `tracing` subscriber with an optional OTLP span exporter.
//!
//! # Safety
//!
//! Behaviors only ever command the [`Drive`][mobot_hal::Drive].  The
//! [`DistanceInterlock`][mobot_kernel::DistanceInterlock] runs in its own
//! worker against the same drive and can stop or slow it whatever the active
//! behavior asked for.

pub mod controller;
pub mod env;
pub mod face;
pub mod follow;
pub mod robot;
pub mod stall_guard;
pub mod telemetry;
pub mod wander;
pub mod worker;

pub use controller::{ModeController, ModeSelector};
pub use env::Env;
pub use robot::MobileBot;
pub use telemetry::{LogFormat, TracerProviderGuard, init_tracing};
pub use worker::Worker;
