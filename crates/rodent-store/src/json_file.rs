use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rodent_domain::{Disk, DeviceId, ProbeExecution, ProbeId, ProbeSchedule, ScheduleId};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::state::{DiskManagerState, Operation, Statistics};
use crate::store::StateStore;

struct Inner {
    path: PathBuf,
    keep_backup: bool,
    save_delay: Duration,
    state: RwLock<DiskManagerState>,
    debounce: Mutex<Option<JoinHandle<()>>>,
}

/// Disk-backed `StateStore`. The full state is held in memory and mirrored
/// to `path` as strict JSON; writes go through a sibling `.tmp` file and an
/// atomic rename so no partial file is ever observable at `path`.
#[derive(Clone)]
pub struct JsonFileStore {
    inner: Arc<Inner>,
}

impl JsonFileStore {
    /// Loads `path` if present. A parse failure quarantines the corrupt
    /// file to a timestamp-suffixed `.corrupted.*` sibling and continues
    /// with an empty state; an absent file is likewise an empty state, not
    /// an error.
    pub async fn load(path: impl Into<PathBuf>, save_delay: Duration, keep_backup: bool) -> Result<Self, StoreError> {
        let path = path.into();
        let state = load_state(&path)?;

        let inner = Inner {
            path,
            keep_backup,
            save_delay,
            state: RwLock::new(state),
            debounce: Mutex::new(None),
        };
        Ok(Self { inner: Arc::new(inner) })
    }
}

fn load_state(path: &Path) -> Result<DiskManagerState, StoreError> {
    if !path.exists() {
        info!(path = %path.display(), "state file absent, starting with empty state");
        return Ok(DiskManagerState::default());
    }

    let content = std::fs::read_to_string(path).map_err(|e| StoreError::Io {
        path: path.display().to_string(),
        source: e,
    })?;

    match serde_json::from_str::<DiskManagerState>(&content) {
        Ok(state) => {
            debug!(path = %path.display(), "state loaded");
            Ok(state)
        }
        Err(parse_err) => {
            let quarantine = path.with_extension(format!("corrupted.{}", Utc::now().timestamp()));
            warn!(
                path = %path.display(),
                quarantine = %quarantine.display(),
                error = %parse_err,
                "state file failed to parse, quarantining and starting empty",
            );
            let _ = std::fs::rename(path, &quarantine);
            Ok(DiskManagerState::default())
        }
    }
}

impl Inner {
    async fn save_now(&self) -> Result<(), StoreError> {
        let snapshot = { self.state.read().await.clone() };
        let json = serde_json::to_vec_pretty(&snapshot).map_err(StoreError::JsonSerialize)?;

        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir).map_err(|e| StoreError::Io {
            path: dir.display().to_string(),
            source: e,
        })?;

        if self.keep_backup && self.path.exists() {
            let backup = self.path.with_extension("json.backup");
            if let Err(e) = std::fs::copy(&self.path, &backup) {
                warn!(path = %backup.display(), error = %e, "failed to rotate state backup");
            }
        }

        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| StoreError::Io {
            path: dir.display().to_string(),
            source: e,
        })?;
        tmp.write_all(&json).map_err(|e| StoreError::Io {
            path: self.path.display().to_string(),
            source: e,
        })?;
        tmp.flush().map_err(|e| StoreError::Io {
            path: self.path.display().to_string(),
            source: e,
        })?;
        tmp.persist(&self.path).map_err(|e| StoreError::Io {
            path: self.path.display().to_string(),
            source: e.error,
        })?;
        Ok(())
    }
}

#[async_trait]
impl StateStore for JsonFileStore {
    async fn get_disk(&self, id: &DeviceId) -> Result<Option<Disk>, StoreError> {
        Ok(self.inner.state.read().await.devices.get(id.as_str()).cloned())
    }

    async fn list_disks(&self) -> Result<Vec<Disk>, StoreError> {
        Ok(self.inner.state.read().await.devices.values().cloned().collect())
    }

    async fn upsert_disk(&self, disk: &Disk) -> Result<(), StoreError> {
        {
            let mut state = self.inner.state.write().await;
            state.devices.insert(disk.device_id.as_str().to_string(), disk.clone());
            state.touch();
        }
        self.save_debounced().await
    }

    async fn delete_disk(&self, id: &DeviceId) -> Result<(), StoreError> {
        {
            let mut state = self.inner.state.write().await;
            state.devices.remove(id.as_str());
            state.touch();
        }
        self.save_debounced().await
    }

    async fn get_probe_execution(&self, id: &ProbeId) -> Result<Option<ProbeExecution>, StoreError> {
        Ok(self
            .inner
            .state
            .read()
            .await
            .probe_executions
            .get(&id.to_string())
            .cloned())
    }

    async fn list_probe_executions(&self) -> Result<Vec<ProbeExecution>, StoreError> {
        Ok(self.inner.state.read().await.probe_executions.values().cloned().collect())
    }

    async fn upsert_probe_execution(&self, execution: &ProbeExecution) -> Result<(), StoreError> {
        {
            let mut state = self.inner.state.write().await;
            state
                .probe_executions
                .insert(execution.id.to_string(), execution.clone());
            if execution.status.is_terminal() {
                let device_id = execution.device_id.clone();
                let execution = execution.clone();
                state.push_history(&device_id, execution, 10);
            }
            state.touch();
        }
        self.save_debounced().await
    }

    async fn probe_history(&self, device_id: &DeviceId) -> Result<Vec<ProbeExecution>, StoreError> {
        Ok(self
            .inner
            .state
            .read()
            .await
            .probe_history
            .get(device_id.as_str())
            .cloned()
            .unwrap_or_default())
    }

    async fn get_probe_schedule(&self, id: &ScheduleId) -> Result<Option<ProbeSchedule>, StoreError> {
        Ok(self
            .inner
            .state
            .read()
            .await
            .probe_schedules
            .get(&id.to_string())
            .cloned())
    }

    async fn list_probe_schedules(&self) -> Result<Vec<ProbeSchedule>, StoreError> {
        Ok(self.inner.state.read().await.probe_schedules.values().cloned().collect())
    }

    async fn upsert_probe_schedule(&self, schedule: &ProbeSchedule) -> Result<(), StoreError> {
        {
            let mut state = self.inner.state.write().await;
            state.probe_schedules.insert(schedule.id.to_string(), schedule.clone());
            state.touch();
        }
        self.save_debounced().await
    }

    async fn delete_probe_schedule(&self, id: &ScheduleId) -> Result<(), StoreError> {
        {
            let mut state = self.inner.state.write().await;
            state.probe_schedules.remove(&id.to_string());
            state.touch();
        }
        self.save_debounced().await
    }

    async fn append_operation(&self, operation: Operation) -> Result<(), StoreError> {
        {
            let mut state = self.inner.state.write().await;
            state.operations.push(operation);
            state.touch();
        }
        self.save_debounced().await
    }

    async fn list_operations(&self, limit: usize) -> Result<Vec<Operation>, StoreError> {
        let state = self.inner.state.read().await;
        let len = state.operations.len();
        let start = len.saturating_sub(limit);
        Ok(state.operations[start..].to_vec())
    }

    async fn statistics(&self) -> Result<Statistics, StoreError> {
        Ok(self.inner.state.read().await.statistics())
    }

    async fn cleanup_old_executions(&self, age: Duration) -> Result<usize, StoreError> {
        let cutoff = Utc::now() - chrono::Duration::from_std(age).unwrap_or(chrono::Duration::zero());
        let mut removed = 0usize;
        {
            let mut state = self.inner.state.write().await;
            for ring in state.probe_history.values_mut() {
                let before = ring.len();
                ring.retain(|e| e.completed_at.map(|t| t >= cutoff).unwrap_or(true));
                removed += before - ring.len();
            }
            state.probe_executions.retain(|_, e| {
                e.completed_at.map(|t| t >= cutoff).unwrap_or(true) || !e.status.is_terminal()
            });
            state.touch();
        }
        if removed > 0 {
            self.save_debounced().await?;
        }
        Ok(removed)
    }

    async fn set_manager_start_time(&self, at: chrono::DateTime<Utc>) -> Result<(), StoreError> {
        {
            let mut state = self.inner.state.write().await;
            state.manager_start_time = Some(at);
            state.touch();
        }
        self.save().await
    }

    async fn save(&self) -> Result<(), StoreError> {
        let mut guard = self.inner.debounce.lock().await;
        if let Some(handle) = guard.take() {
            handle.abort();
        }
        drop(guard);
        self.inner.save_now().await
    }

    async fn save_debounced(&self) -> Result<(), StoreError> {
        let mut guard = self.inner.debounce.lock().await;
        if guard.is_some() {
            return Ok(());
        }
        let inner = self.inner.clone();
        let delay = self.inner.save_delay;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = inner.save_now().await {
                warn!(error = %e, "debounced state save failed");
            }
            *inner.debounce.lock().await = None;
        });
        *guard = Some(handle);
        Ok(())
    }

    async fn flush(&self) -> Result<(), StoreError> {
        let mut guard = self.inner.debounce.lock().await;
        let pending = guard.take();
        drop(guard);
        if let Some(handle) = pending {
            handle.abort();
            self.inner.save_now().await
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rodent_domain::{ProbeStatus, ProbeTrigger, ProbeType};

    fn sample_disk(id: &str) -> Disk {
        Disk::new(DeviceId::new(id), Utc::now())
    }

    #[tokio::test]
    async fn round_trips_disks_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        let store = JsonFileStore::load(&path, Duration::from_secs(5), true).await.unwrap();
        store.upsert_disk(&sample_disk("d1")).await.unwrap();
        store.flush().await.unwrap();

        let reloaded = JsonFileStore::load(&path, Duration::from_secs(5), true).await.unwrap();
        let disks = reloaded.list_disks().await.unwrap();
        assert_eq!(disks.len(), 1);
        assert_eq!(disks[0].device_id, DeviceId::new("d1"));
    }

    #[tokio::test]
    async fn missing_file_is_empty_state_not_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");
        let store = JsonFileStore::load(&path, Duration::from_secs(5), true).await.unwrap();
        assert!(store.list_disks().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn corrupt_file_is_quarantined_and_state_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{ not json").unwrap();

        let store = JsonFileStore::load(&path, Duration::from_secs(5), true).await.unwrap();
        assert!(store.list_disks().await.unwrap().is_empty());

        let quarantined: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().to_string())
            .filter(|n| n.contains("corrupted"))
            .collect();
        assert_eq!(quarantined.len(), 1);
    }

    #[tokio::test]
    async fn flush_forces_pending_debounced_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let store = JsonFileStore::load(&path, Duration::from_secs(60), true).await.unwrap();

        store.upsert_disk(&sample_disk("d1")).await.unwrap();
        store.flush().await.unwrap();

        let on_disk = std::fs::read_to_string(&path).unwrap();
        assert!(on_disk.contains("d1"));
    }

    #[tokio::test]
    async fn terminal_execution_is_recorded_in_history() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let store = JsonFileStore::load(&path, Duration::from_secs(5), true).await.unwrap();

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
        exec.completed_at = Some(Utc::now());
        store.upsert_probe_execution(&exec).await.unwrap();

        let history = store.probe_history(&device_id).await.unwrap();
        assert_eq!(history.len(), 1);
    }
}
