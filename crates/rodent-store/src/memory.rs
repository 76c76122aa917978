use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rodent_domain::{Disk, DeviceId, ProbeExecution, ProbeId, ProbeSchedule, ScheduleId};
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::state::{DiskManagerState, Operation, Statistics};
use crate::store::StateStore;

/// Non-persistent `StateStore`, for tests and for embedding components that
/// don't need a file on disk. `save`/`save_debounced`/`flush` are no-ops.
#[derive(Default)]
pub struct InMemoryStateStore {
    state: RwLock<DiskManagerState>,
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn get_disk(&self, id: &DeviceId) -> Result<Option<Disk>, StoreError> {
        Ok(self.state.read().await.devices.get(id.as_str()).cloned())
    }

    async fn list_disks(&self) -> Result<Vec<Disk>, StoreError> {
        Ok(self.state.read().await.devices.values().cloned().collect())
    }

    async fn upsert_disk(&self, disk: &Disk) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        state.devices.insert(disk.device_id.as_str().to_string(), disk.clone());
        state.touch();
        Ok(())
    }

    async fn delete_disk(&self, id: &DeviceId) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        state.devices.remove(id.as_str());
        state.touch();
        Ok(())
    }

    async fn get_probe_execution(&self, id: &ProbeId) -> Result<Option<ProbeExecution>, StoreError> {
        Ok(self.state.read().await.probe_executions.get(&id.to_string()).cloned())
    }

    async fn list_probe_executions(&self) -> Result<Vec<ProbeExecution>, StoreError> {
        Ok(self.state.read().await.probe_executions.values().cloned().collect())
    }

    async fn upsert_probe_execution(&self, execution: &ProbeExecution) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        state.probe_executions.insert(execution.id.to_string(), execution.clone());
        if execution.status.is_terminal() {
            let device_id = execution.device_id.clone();
            let execution = execution.clone();
            state.push_history(&device_id, execution, 10);
        }
        state.touch();
        Ok(())
    }

    async fn probe_history(&self, device_id: &DeviceId) -> Result<Vec<ProbeExecution>, StoreError> {
        Ok(self
            .state
            .read()
            .await
            .probe_history
            .get(device_id.as_str())
            .cloned()
            .unwrap_or_default())
    }

    async fn get_probe_schedule(&self, id: &ScheduleId) -> Result<Option<ProbeSchedule>, StoreError> {
        Ok(self.state.read().await.probe_schedules.get(&id.to_string()).cloned())
    }

    async fn list_probe_schedules(&self) -> Result<Vec<ProbeSchedule>, StoreError> {
        Ok(self.state.read().await.probe_schedules.values().cloned().collect())
    }

    async fn upsert_probe_schedule(&self, schedule: &ProbeSchedule) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        state.probe_schedules.insert(schedule.id.to_string(), schedule.clone());
        state.touch();
        Ok(())
    }

    async fn delete_probe_schedule(&self, id: &ScheduleId) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        state.probe_schedules.remove(&id.to_string());
        state.touch();
        Ok(())
    }

    async fn append_operation(&self, operation: Operation) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        state.operations.push(operation);
        state.touch();
        Ok(())
    }

    async fn list_operations(&self, limit: usize) -> Result<Vec<Operation>, StoreError> {
        let state = self.state.read().await;
        let len = state.operations.len();
        let start = len.saturating_sub(limit);
        Ok(state.operations[start..].to_vec())
    }

    async fn statistics(&self) -> Result<Statistics, StoreError> {
        Ok(self.state.read().await.statistics())
    }

    async fn cleanup_old_executions(&self, age: Duration) -> Result<usize, StoreError> {
        let cutoff = Utc::now() - chrono::Duration::from_std(age).unwrap_or(chrono::Duration::zero());
        let mut removed = 0usize;
        let mut state = self.state.write().await;
        for ring in state.probe_history.values_mut() {
            let before = ring.len();
            ring.retain(|e| e.completed_at.map(|t| t >= cutoff).unwrap_or(true));
            removed += before - ring.len();
        }
        state
            .probe_executions
            .retain(|_, e| e.completed_at.map(|t| t >= cutoff).unwrap_or(true) || !e.status.is_terminal());
        state.touch();
        Ok(removed)
    }

    async fn set_manager_start_time(&self, at: DateTime<Utc>) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        state.manager_start_time = Some(at);
        state.touch();
        Ok(())
    }

    async fn save(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn save_debounced(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn flush(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rodent_domain::{ProbeStatus, ProbeTrigger, ProbeType};

    #[tokio::test]
    async fn upserts_and_lists_disks() {
        let store = InMemoryStateStore::default();
        let disk = Disk::new(DeviceId::new("d1"), Utc::now());
        store.upsert_disk(&disk).await.unwrap();
        assert_eq!(store.list_disks().await.unwrap().len(), 1);
        store.delete_disk(&DeviceId::new("d1")).await.unwrap();
        assert!(store.list_disks().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn cleanup_old_executions_prunes_stale_entries() {
        let store = InMemoryStateStore::default();
        let device_id = DeviceId::new("d1");
        let mut exec = ProbeExecution::new(
            ProbeId::new(),
            device_id.clone(),
            "/dev/sda".into(),
            ProbeType::Quick,
            ProbeTrigger::Manual { requested_by: "operator".into() },
            Utc::now(),
        );
        exec.status = ProbeStatus::Completed;
        exec.completed_at = Some(Utc::now() - chrono::Duration::days(30));
        store.upsert_probe_execution(&exec).await.unwrap();

        let removed = store.cleanup_old_executions(Duration::from_secs(60)).await.unwrap();
        assert_eq!(removed, 1);
        assert!(store.probe_history(&device_id).await.unwrap().is_empty());
    }
}
