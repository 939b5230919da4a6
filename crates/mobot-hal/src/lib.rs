//! `mobot-hal` – Hardware Abstraction Layer
//!
//! Every physical component the robot talks to is a small capability trait.
//! Hardware backends implement the traits; everything above this crate only
//! ever sees the traits, so backends can be swapped without touching the
//! behaviors.
//!
//! # Modules
//!
//! - [`motor`] – [`MotorDriver`] capability and the shared speed policy
//!   [`Motor`] (clamping, deadband, additive biases, emergency stop).
//! - [`dual_motor`] – [`DualMotorDriver`] decorator driving two motors as one.
//! - [`steering`] – [`Steering`] capability.
//! - [`indicator`] – [`Indicator`] RGB light capability.
//! - [`distance`] – [`DistanceSensor`] capability.
//! - [`head`] – [`Head`] capability and the [`BotHead`] composition.
//! - [`vision`] – [`FaceTracker`] and [`LineSensor`] capabilities.
//! - [`drive`] – [`Drive`]: motor + steering + turn-signal lights.
//! - [`hardware`] – [`Hardware`]: the bundle of collaborators a robot owns.
//! - [`sim`] / [`sim_rig`] – in-process simulated backends for tests and
//!   headless runs.

pub mod distance;
pub mod drive;
pub mod dual_motor;
pub mod hardware;
pub mod head;
pub mod indicator;
pub mod motor;
pub mod sim;
pub mod sim_rig;
pub mod steering;
pub mod vision;

use std::sync::{Mutex, MutexGuard, PoisonError};

pub use distance::DistanceSensor;
pub use drive::Drive;
pub use dual_motor::DualMotorDriver;
pub use hardware::{Hardware, SharedHead};
pub use head::{BotHead, Head, ScanSweep};
pub use indicator::Indicator;
pub use motor::{Motor, MotorDriver};
pub use sim_rig::{SimRig, SimRigBuilder};
pub use steering::Steering;
pub use vision::{FaceTracker, LineSensor};

/// Lock `mutex`, recovering the guard if a previous holder panicked.
///
/// A panic in one control task must not leave the drive permanently
/// unreachable for the others.
pub fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
