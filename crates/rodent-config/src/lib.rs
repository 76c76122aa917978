//! Validated, YAML-backed configuration for the disk-management core.
//! A missing file on first load is not an error — defaults are written
//! and returned, so `disk-manager.yaml` always exists once the process
//! has started at least once.

pub mod config;
pub mod error;
pub mod loader;
pub mod store;

pub use config::{
    Config, DiscoveryConfig, EventsConfig, HealthConfig, NamingConfig, PerformanceConfig,
    ProbingConfig, RetryPolicyConfig, ToolsConfig, TopologyConfig,
};
pub use error::ConfigError;
pub use store::ConfigStore;
