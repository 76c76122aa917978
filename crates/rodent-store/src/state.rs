use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rodent_domain::{Disk, DeviceId, OperationId, ProbeExecution, ProbeId, ProbeSchedule, ScheduleId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Append-only audit record of a mutating action taken against the disk
/// cache. Adapted from an append-log-of-domain-events shape to the
/// disk-management domain's own set of mutating actions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Operation {
    DiscoveryRun {
        id: Uuid,
        at: DateTime<Utc>,
        added: usize,
        removed: usize,
        changed: usize,
    },
    DiskStateChanged {
        id: Uuid,
        at: DateTime<Utc>,
        device_id: DeviceId,
        from: String,
        to: String,
        reason: String,
    },
    DiskQuarantined {
        id: Uuid,
        at: DateTime<Utc>,
        device_id: DeviceId,
        reason: String,
    },
    ProbeTriggered {
        id: Uuid,
        at: DateTime<Utc>,
        probe_id: ProbeId,
        device_id: DeviceId,
    },
    ProbeCompleted {
        id: Uuid,
        at: DateTime<Utc>,
        probe_id: ProbeId,
        device_id: DeviceId,
        result: String,
    },
    ConfigUpdated {
        id: Uuid,
        at: DateTime<Utc>,
    },
}

impl Operation {
    pub fn id(&self) -> OperationId {
        let uuid = match self {
            Operation::DiscoveryRun { id, .. }
            | Operation::DiskStateChanged { id, .. }
            | Operation::DiskQuarantined { id, .. }
            | Operation::ProbeTriggered { id, .. }
            | Operation::ProbeCompleted { id, .. }
            | Operation::ConfigUpdated { id, .. } => *id,
        };
        OperationId(uuid)
    }

    pub fn at(&self) -> DateTime<Utc> {
        match self {
            Operation::DiscoveryRun { at, .. }
            | Operation::DiskStateChanged { at, .. }
            | Operation::DiskQuarantined { at, .. }
            | Operation::ProbeTriggered { at, .. }
            | Operation::ProbeCompleted { at, .. }
            | Operation::ConfigUpdated { at, .. } => *at,
        }
    }
}

/// Global counters computed on demand from device states and probe
/// executions, never stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub total_disks: usize,
    pub disks_by_state: HashMap<String, usize>,
    pub disks_by_health: HashMap<String, usize>,
    pub active_probes: usize,
    pub probes_completed: usize,
    pub probes_failed: usize,
    pub manager_uptime_seconds: i64,
}

/// Persisted root: the authoritative snapshot of the disk-management
/// world. `device_id`/`probe_id`/`schedule_id` keys are the string form
/// of the corresponding newtype so the structure round-trips through
/// plain JSON without custom (de)serialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiskManagerState {
    pub version: String,
    pub updated_at: DateTime<Utc>,
    pub devices: HashMap<String, Disk>,
    pub probe_executions: HashMap<String, ProbeExecution>,
    pub probe_schedules: HashMap<String, ProbeSchedule>,
    /// Per-device bounded history ring; newest last, truncated to N.
    pub probe_history: HashMap<String, Vec<ProbeExecution>>,
    pub operations: Vec<Operation>,
    pub manager_start_time: Option<DateTime<Utc>>,
}

impl Default for DiskManagerState {
    fn default() -> Self {
        Self {
            version: "1".to_string(),
            updated_at: Utc::now(),
            devices: HashMap::new(),
            probe_executions: HashMap::new(),
            probe_schedules: HashMap::new(),
            probe_history: HashMap::new(),
            operations: Vec::new(),
            manager_start_time: None,
        }
    }
}

impl DiskManagerState {
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Pushes `execution` onto the device's history ring, truncating to
    /// the oldest `retain` entries dropped.
    pub fn push_history(&mut self, device_id: &DeviceId, execution: ProbeExecution, retain: usize) {
        let ring = self.probe_history.entry(device_id.as_str().to_string()).or_default();
        ring.push(execution);
        if ring.len() > retain {
            let overflow = ring.len() - retain;
            ring.drain(0..overflow);
        }
    }

    pub fn statistics(&self) -> Statistics {
        let mut disks_by_state = HashMap::new();
        let mut disks_by_health = HashMap::new();
        for disk in self.devices.values() {
            *disks_by_state.entry(disk.state.to_string()).or_insert(0) += 1;
            *disks_by_health.entry(disk.health.to_string()).or_insert(0) += 1;
        }

        let active_probes = self
            .probe_executions
            .values()
            .filter(|p| p.status.is_active())
            .count();
        let probes_completed = self
            .probe_executions
            .values()
            .filter(|p| p.status == rodent_domain::ProbeStatus::Completed)
            .count();
        let probes_failed = self
            .probe_executions
            .values()
            .filter(|p| p.status == rodent_domain::ProbeStatus::Failed)
            .count();

        let uptime = self
            .manager_start_time
            .map(|start| (Utc::now() - start).num_seconds())
            .unwrap_or(0);

        Statistics {
            total_disks: self.devices.len(),
            disks_by_state,
            disks_by_health,
            active_probes,
            probes_completed,
            probes_failed,
            manager_uptime_seconds: uptime,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_ring_truncates_to_retain() {
        let mut state = DiskManagerState::default();
        let device_id = DeviceId::new("d1");
        for i in 0..15 {
            let exec = ProbeExecution::new(
                ProbeId::new(),
                device_id.clone(),
                "/dev/sda".into(),
                rodent_domain::ProbeType::Quick,
                rodent_domain::ProbeTrigger::Manual {
                    requested_by: format!("run-{i}"),
                },
                Utc::now(),
            );
            state.push_history(&device_id, exec, 10);
        }
        assert_eq!(state.probe_history.get("d1").unwrap().len(), 10);
    }

    #[test]
    fn statistics_reflect_device_cache() {
        let mut state = DiskManagerState::default();
        let mut disk = Disk::new(DeviceId::new("d1"), Utc::now());
        disk.state = rodent_domain::DiskState::Online;
        disk.health = rodent_domain::Health::Healthy;
        state.devices.insert("d1".to_string(), disk);

        let stats = state.statistics();
        assert_eq!(stats.total_disks, 1);
        assert_eq!(stats.disks_by_state.get("online"), Some(&1));
    }
}
