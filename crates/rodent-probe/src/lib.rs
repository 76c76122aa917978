//! Vendor self-test execution: per-device concurrency guards, a global
//! concurrency cap, a pool-status conflict check, and progress polling
//! against the SMART utility.

pub mod conflict;
pub mod engine;
pub mod error;
pub mod pool_status;

pub use conflict::ConflictChecker;
pub use engine::ProbeEngine;
pub use error::ProbeError;
pub use pool_status::{NoPools, PoolStatus};
