//! SMART classification: a pure evaluation function plus a bounded,
//! concurrent sweep across a batch of devices.

pub mod classify;
pub mod error;
pub mod monitor;

pub use classify::classify;
pub use error::HealthError;
pub use monitor::{HealthMonitor, HealthReading};
