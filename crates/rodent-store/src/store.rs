use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rodent_domain::{Disk, DeviceId, ProbeExecution, ProbeId, ProbeSchedule, ScheduleId};

use crate::error::StoreError;
use crate::state::{Operation, Statistics};

/// The authoritative persistent projection of the disk-management world.
///
/// Adapted from a closure-scoped `WithLock`/`WithRLock` shape to discrete
/// per-entity accessors, one trait method per CRUD operation, mirroring
/// the entity-accessor style of other state stores in this codebase.
/// Implementations are responsible for their own internal locking.
#[async_trait]
pub trait StateStore: Send + Sync + 'static {
    async fn get_disk(&self, id: &DeviceId) -> Result<Option<Disk>, StoreError>;
    async fn list_disks(&self) -> Result<Vec<Disk>, StoreError>;
    async fn upsert_disk(&self, disk: &Disk) -> Result<(), StoreError>;
    async fn delete_disk(&self, id: &DeviceId) -> Result<(), StoreError>;

    async fn get_probe_execution(&self, id: &ProbeId) -> Result<Option<ProbeExecution>, StoreError>;
    async fn list_probe_executions(&self) -> Result<Vec<ProbeExecution>, StoreError>;
    async fn upsert_probe_execution(&self, execution: &ProbeExecution) -> Result<(), StoreError>;
    async fn probe_history(&self, device_id: &DeviceId) -> Result<Vec<ProbeExecution>, StoreError>;

    async fn get_probe_schedule(&self, id: &ScheduleId) -> Result<Option<ProbeSchedule>, StoreError>;
    async fn list_probe_schedules(&self) -> Result<Vec<ProbeSchedule>, StoreError>;
    async fn upsert_probe_schedule(&self, schedule: &ProbeSchedule) -> Result<(), StoreError>;
    async fn delete_probe_schedule(&self, id: &ScheduleId) -> Result<(), StoreError>;

    async fn append_operation(&self, operation: Operation) -> Result<(), StoreError>;
    async fn list_operations(&self, limit: usize) -> Result<Vec<Operation>, StoreError>;

    async fn statistics(&self) -> Result<Statistics, StoreError>;

    /// Prunes completed executions older than `age`; returns the number removed.
    async fn cleanup_old_executions(&self, age: Duration) -> Result<usize, StoreError>;

    async fn set_manager_start_time(&self, at: DateTime<Utc>) -> Result<(), StoreError>;

    /// Force an immediate write of the current snapshot.
    async fn save(&self) -> Result<(), StoreError>;

    /// Schedule a write, coalescing with any already-pending debounce window.
    async fn save_debounced(&self) -> Result<(), StoreError>;

    /// Force an immediate write if one is pending; no-op otherwise.
    async fn flush(&self) -> Result<(), StoreError>;
}
