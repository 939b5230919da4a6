//! `mobot-kernel` – Safety & Tuning
//!
//! The layer that keeps the robot out of trouble whatever the active
//! behavior is doing.
//!
//! # Modules
//!
//! - [`config`] – [`ConfigStore`][config::ConfigStore]: the live-tunable,
//!   lazily-defaulted key/value store every threshold and timer is read from,
//!   behind the [`ConfigProvider`][config::ConfigProvider] trait.
//! - [`interlock`] – [`DistanceInterlock`][interlock::DistanceInterlock]:
//!   the distance safety check that emergency-stops, stops, or slows the
//!   drive as obstacles get closer, plus the pure
//!   [`evaluate`][interlock::evaluate] policy it applies.
//! - [`watchdog`] – [`Watchdog`][watchdog::Watchdog]: heartbeat tracking
//!   for the background loops so a frozen loop is reported.

pub mod config;
pub mod interlock;
pub mod watchdog;

pub use config::{ConfigProvider, ConfigStore, ConfigValue};
pub use interlock::{DistanceInterlock, InterlockState, InterlockThresholds, evaluate};
pub use watchdog::{ComponentHealth, Watchdog};
