//! `mobot-middleware` – event routing
//!
//! Carries what the control layer does (mode changes, wander progress,
//! interlock trips, behavior faults) to whoever wants to watch, without the
//! control loops knowing who that is.
//!
//! # Modules
//!
//! - [`bus`] – Headless, topic-based publish/subscribe event bus built on
//!   Tokio broadcast channels.

pub mod bus;

pub use bus::{EventBus, Topic, TopicReceiver};
