//! Cron-style firing of probes and periodic discovery/health tasks. Owns
//! job registration only; every action it takes is dispatched through the
//! injected `SchedulerCallbacks` boundary.

pub mod callbacks;
pub mod error;
pub mod scheduler;

pub use callbacks::SchedulerCallbacks;
pub use error::SchedulerError;
pub use scheduler::{validate_cron, Scheduler};
