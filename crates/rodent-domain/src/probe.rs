use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::enums::{DeviceType, DiskState, Health, Interface, ProbeResult, ProbeStatus, ProbeType};
use crate::ids::{DeviceId, ProbeId, ScheduleId};

/// Predicate over the disk cache. All populated fields are ANDed together;
/// an empty filter matches every disk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiskFilter {
    #[serde(default)]
    pub states: Vec<DiskState>,
    #[serde(default)]
    pub health_classes: Vec<Health>,
    #[serde(default)]
    pub device_types: Vec<DeviceType>,
    #[serde(default)]
    pub interfaces: Vec<Interface>,
    #[serde(default)]
    pub pool_name: Option<String>,
    #[serde(default)]
    pub available_only: Option<bool>,
    #[serde(default)]
    pub min_size_bytes: Option<u64>,
    #[serde(default)]
    pub max_size_bytes: Option<u64>,
    #[serde(default)]
    pub required_tags: std::collections::HashMap<String, String>,
}

impl DiskFilter {
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
            && self.health_classes.is_empty()
            && self.device_types.is_empty()
            && self.interfaces.is_empty()
            && self.pool_name.is_none()
            && self.available_only.is_none()
            && self.min_size_bytes.is_none()
            && self.max_size_bytes.is_none()
            && self.required_tags.is_empty()
    }

    /// All populated fields must match for `disk` to pass.
    pub fn matches(&self, disk: &crate::disk::Disk) -> bool {
        if !self.states.is_empty() && !self.states.contains(&disk.state) {
            return false;
        }
        if !self.health_classes.is_empty() && !self.health_classes.contains(&disk.health) {
            return false;
        }
        if !self.device_types.is_empty() && !self.device_types.contains(&disk.device_type) {
            return false;
        }
        if !self.interfaces.is_empty() && !self.interfaces.contains(&disk.interface) {
            return false;
        }
        if let Some(pool) = &self.pool_name {
            match &disk.pool {
                Some(linkage) if &linkage.pool_name == pool => {}
                _ => return false,
            }
        }
        if let Some(available_only) = self.available_only {
            if available_only && disk.is_in_pool() {
                return false;
            }
        }
        if let Some(min) = self.min_size_bytes {
            if disk.size_bytes < min {
                return false;
            }
        }
        if let Some(max) = self.max_size_bytes {
            if disk.size_bytes > max {
                return false;
            }
        }
        for (key, value) in &self.required_tags {
            if disk.tags.get(key) != Some(value) {
                return false;
            }
        }
        true
    }
}

/// Retry behavior for a failed or timed-out probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_seconds: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 0,
            backoff_seconds: 60,
        }
    }
}

/// A recurring probe definition, registered with the scheduler by cron
/// expression and re-validated whenever it is created or edited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeSchedule {
    pub id: ScheduleId,
    pub name: String,
    pub probe_type: ProbeType,
    pub cron: String,
    pub filter: DiskFilter,
    pub max_concurrency: u32,
    pub timeout_seconds: u64,
    pub retry_policy: RetryPolicy,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// What caused a probe execution to be created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProbeTrigger {
    Manual { requested_by: String },
    Schedule { schedule_id: ScheduleId },
}

/// A single self-test run against one device, scheduled or manually
/// triggered. `device_path` is a snapshot taken at trigger time so the
/// record remains meaningful even if the disk's path later changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeExecution {
    pub id: ProbeId,
    pub device_id: DeviceId,
    pub device_path: String,
    pub probe_type: ProbeType,
    pub status: ProbeStatus,
    pub result: Option<ProbeResult>,
    pub triggered_by: ProbeTrigger,
    pub scheduled_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_seconds: Option<u64>,
    pub percent_complete: Option<u8>,
    pub estimated_remaining_seconds: Option<u64>,
    pub error_message: Option<String>,
    pub conflict_reason: Option<String>,
    pub retry_count: u32,
    pub next_retry_at: Option<DateTime<Utc>>,
}

impl ProbeExecution {
    pub fn new(
        id: ProbeId,
        device_id: DeviceId,
        device_path: String,
        probe_type: ProbeType,
        triggered_by: ProbeTrigger,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            device_id,
            device_path,
            probe_type,
            status: ProbeStatus::Scheduled,
            result: None,
            triggered_by,
            scheduled_at: now,
            started_at: None,
            completed_at: None,
            duration_seconds: None,
            percent_complete: None,
            estimated_remaining_seconds: None,
            error_message: None,
            conflict_reason: None,
            retry_count: 0,
            next_retry_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_filter_matches_everything() {
        assert!(DiskFilter::default().is_empty());
    }

    #[test]
    fn non_default_filter_is_not_empty() {
        let f = DiskFilter {
            pool_name: Some("tank".into()),
            ..Default::default()
        };
        assert!(!f.is_empty());
    }

    #[test]
    fn empty_filter_matches_any_disk() {
        let disk = crate::disk::Disk::new(crate::ids::DeviceId::new("d1"), Utc::now());
        assert!(DiskFilter::default().matches(&disk));
    }

    #[test]
    fn state_filter_excludes_non_matching_disk() {
        let disk = crate::disk::Disk::new(crate::ids::DeviceId::new("d1"), Utc::now());
        let filter = DiskFilter {
            states: vec![crate::enums::DiskState::Available],
            ..Default::default()
        };
        assert!(!filter.matches(&disk));
    }

    #[test]
    fn available_only_excludes_pooled_disk() {
        let mut disk = crate::disk::Disk::new(crate::ids::DeviceId::new("d1"), Utc::now());
        disk.pool = Some(crate::disk::PoolLinkage {
            pool_name: "tank".into(),
            vdev_guid: "g1".into(),
        });
        let filter = DiskFilter {
            available_only: Some(true),
            ..Default::default()
        };
        assert!(!filter.matches(&disk));
    }

    #[test]
    fn required_tag_must_match_value() {
        let mut disk = crate::disk::Disk::new(crate::ids::DeviceId::new("d1"), Utc::now());
        disk.tags.insert("rack".into(), "a1".into());
        let mut required_tags = std::collections::HashMap::new();
        required_tags.insert("rack".to_string(), "a2".to_string());
        let filter = DiskFilter {
            required_tags,
            ..Default::default()
        };
        assert!(!filter.matches(&disk));
    }

    #[test]
    fn new_execution_starts_scheduled() {
        let exec = ProbeExecution::new(
            ProbeId::new(),
            DeviceId::new("d1"),
            "/dev/sda".into(),
            ProbeType::Quick,
            ProbeTrigger::Manual {
                requested_by: "operator".into(),
            },
            Utc::now(),
        );
        assert_eq!(exec.status, ProbeStatus::Scheduled);
        assert!(exec.result.is_none());
        assert_eq!(exec.retry_count, 0);
    }
}
