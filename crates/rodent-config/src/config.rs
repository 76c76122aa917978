use std::collections::HashMap;

use rodent_domain::SmartThresholds;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub enabled: bool,
    /// Full Discovery sweep, standalone of the hotplug reconciliation loop.
    pub cron: String,
    /// Hotplug Reconciliation Loop interval (spec default 30s).
    pub reconcile_interval_seconds: u64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cron: "0 */5 * * * *".to_string(),
            reconcile_interval_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    pub enabled: bool,
    pub cron: String,
    pub concurrency: u32,
    pub thresholds: SmartThresholds,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cron: "0 */10 * * * *".to_string(),
            concurrency: 4,
            thresholds: SmartThresholds::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicyConfig {
    pub max_retries: u32,
    pub backoff_seconds: u64,
}

impl Default for RetryPolicyConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            backoff_seconds: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbingConfig {
    pub quick_cron: String,
    pub extensive_cron: String,
    pub concurrency: u32,
    pub timeout_seconds: u64,
    pub retry_policy: RetryPolicyConfig,
}

impl Default for ProbingConfig {
    fn default() -> Self {
        Self {
            quick_cron: "0 0 3 * * *".to_string(),
            extensive_cron: "0 0 3 * * 0".to_string(),
            concurrency: 4,
            timeout_seconds: 3600,
            retry_policy: RetryPolicyConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamingConfig {
    pub by_id_max_disks: u32,
    pub by_path_max_disks: u32,
    /// Manual `device_id -> preferred path` overrides, honoured ahead of
    /// the disk-count-based rule.
    pub overrides: HashMap<String, String>,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            by_id_max_disks: 11,
            by_path_max_disks: 24,
            overrides: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopologyConfig {
    pub enabled: bool,
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub block_device_tool_path: Option<String>,
    pub smart_tool_path: Option<String>,
    pub udev_tool_path: Option<String>,
    pub scsi_tool_path: Option<String>,
    pub enclosure_tool_path: Option<String>,
    pub privileged_prefix: String,
    pub tool_timeout_seconds: u64,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            block_device_tool_path: None,
            smart_tool_path: None,
            udev_tool_path: None,
            scsi_tool_path: None,
            enclosure_tool_path: None,
            privileged_prefix: "sudo -n".to_string(),
            tool_timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    pub save_delay_seconds: u64,
    pub history_retention: usize,
    pub event_buffer_size: usize,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            save_delay_seconds: 5,
            history_retention: 10,
            event_buffer_size: 256,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    pub enabled: bool,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub version: String,
    pub discovery: DiscoveryConfig,
    pub health: HealthConfig,
    pub probing: ProbingConfig,
    pub naming: NamingConfig,
    pub topology: TopologyConfig,
    pub tools: ToolsConfig,
    pub performance: PerformanceConfig,
    pub events: EventsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1".to_string(),
            discovery: DiscoveryConfig::default(),
            health: HealthConfig::default(),
            probing: ProbingConfig::default(),
            naming: NamingConfig::default(),
            topology: TopologyConfig::default(),
            tools: ToolsConfig::default(),
            performance: PerformanceConfig::default(),
            events: EventsConfig::default(),
        }
    }
}

impl Config {
    /// Checks the range and well-formedness invariants the Config Store
    /// must enforce before accepting a replacement or sub-update.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.discovery.reconcile_interval_seconds == 0 {
            return Err(ConfigError::Validation(
                "discovery.reconcile_interval_seconds must be positive".into(),
            ));
        }
        if self.health.concurrency == 0 {
            return Err(ConfigError::Validation(
                "health.concurrency must be positive".into(),
            ));
        }
        if self.probing.concurrency == 0 {
            return Err(ConfigError::Validation(
                "probing.concurrency must be positive".into(),
            ));
        }
        if self.probing.timeout_seconds == 0 {
            return Err(ConfigError::Validation(
                "probing.timeout_seconds must be positive".into(),
            ));
        }
        if self.naming.by_id_max_disks >= self.naming.by_path_max_disks {
            return Err(ConfigError::Validation(
                "naming.by_id_max_disks must be less than naming.by_path_max_disks".into(),
            ));
        }
        if self.performance.save_delay_seconds == 0 {
            return Err(ConfigError::Validation(
                "performance.save_delay_seconds must be positive".into(),
            ));
        }
        for (name, expr) in [
            ("discovery.cron", &self.discovery.cron),
            ("health.cron", &self.health.cron),
            ("probing.quick_cron", &self.probing.quick_cron),
            ("probing.extensive_cron", &self.probing.extensive_cron),
        ] {
            validate_cron(name, expr)?;
        }
        Ok(())
    }
}

pub(crate) fn validate_cron(field: &str, expr: &str) -> Result<(), ConfigError> {
    expr.parse::<cron::Schedule>()
        .map(|_| ())
        .map_err(|e| ConfigError::Validation(format!("{field}: invalid cron '{expr}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        Config::default().validate().expect("defaults must validate");
    }

    #[test]
    fn zero_concurrency_rejected() {
        let mut c = Config::default();
        c.health.concurrency = 0;
        assert!(c.validate().is_err());
    }

    #[test]
    fn bad_cron_rejected() {
        let mut c = Config::default();
        c.probing.quick_cron = "not a cron".into();
        assert!(c.validate().is_err());
    }

    #[test]
    fn naming_thresholds_must_be_ordered() {
        let mut c = Config::default();
        c.naming.by_id_max_disks = 30;
        c.naming.by_path_max_disks = 24;
        assert!(c.validate().is_err());
    }
}
