use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rodent_config::{Config, ConfigStore};
use rodent_discovery::{Discovery, TopologyMapper, TopologySnapshot};
use rodent_domain::{
    Controller, DeviceId, Disk, DiskFilter, DiskState, Enclosure, ProbeExecution, ProbeId,
    ProbeSchedule, ProbeTrigger, ProbeType, ScheduleId,
};
use rodent_events::{Event, EventPayload, EventSink};
use rodent_health::HealthMonitor;
use rodent_hotplug::{state_machine, Coordinator, EventMonitor, ReconciliationResult, Reconciler};
use rodent_probe::{ConflictChecker, PoolStatus, ProbeEngine};
use rodent_scheduler::Scheduler;
use rodent_store::{Operation, StateStore, Statistics};
use rodent_tools::{ToolExecutor, ToolKind};
use tracing::warn;
use uuid::Uuid;

use crate::cache::DeviceCache;
use crate::error::ManagerError;

const PROBE_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);
const TASK_JOIN_TIMEOUT: Duration = Duration::from_secs(30);
const QUICK_PROBE_SCHEDULE_ID: &str = "builtin-quick-probe";
const EXTENSIVE_PROBE_SCHEDULE_ID: &str = "builtin-extensive-probe";

/// Refreshes `existing`'s hardware-derived fields from a freshly
/// discovered record of the same device, leaving lifecycle state,
/// health, pool linkage, tags, and notes untouched. Discovery never
/// knows a disk's health or pool membership, so folding its output in
/// wholesale would reset both to their zero values on every pass.
fn merge_discovered_fields(existing: &Disk, discovered: &Disk) -> Disk {
    let mut merged = existing.clone();
    merged.model = discovered.model.clone();
    merged.vendor = discovered.vendor.clone();
    merged.serial = discovered.serial.clone();
    merged.wwn = discovered.wwn.clone();
    merged.firmware = discovered.firmware.clone();
    merged.size_bytes = discovered.size_bytes;
    merged.device_type = discovered.device_type;
    merged.interface = discovered.interface;
    merged.paths = discovered.paths.clone();
    merged.topology = discovered.topology.clone();
    merged.last_seen_at = Utc::now();
    merged.touch(Utc::now());
    merged
}

/// Assembles every subordinate component into the disk-management core's
/// single public surface. Holds exactly one `RwLock`-guarded resource of
/// its own, the device cache; everything else below it manages its own
/// locking.
pub struct Manager {
    config: ConfigStore,
    store: Arc<dyn StateStore>,
    executor: Arc<ToolExecutor>,
    discovery: Arc<Discovery>,
    topology: TopologyMapper,
    probe_engine: ProbeEngine,
    scheduler: Scheduler,
    hotplug: Coordinator,
    events: Arc<dyn EventSink>,
    cache: Arc<DeviceCache>,
}

impl Manager {
    /// Loads config and state from disk (On `Start` step 1). Everything
    /// after tool probing and initial discovery happens in `start`.
    pub async fn new(
        config_path: impl Into<PathBuf>,
        state_path: impl Into<PathBuf>,
        events: Arc<dyn EventSink>,
        pool_status: Arc<dyn PoolStatus>,
    ) -> Result<Self, ManagerError> {
        let config = ConfigStore::load(config_path).await?;
        let snapshot = config.current().await;

        let executor = Arc::new(ToolExecutor::new(
            snapshot.tools.privileged_prefix.clone(),
            Duration::from_secs(snapshot.tools.tool_timeout_seconds),
        ));

        let store: Arc<dyn StateStore> = Arc::new(
            rodent_store::JsonFileStore::load(
                state_path,
                Duration::from_secs(snapshot.performance.save_delay_seconds),
                true,
            )
            .await?,
        );

        let discovery = Arc::new(Discovery::new(executor.clone()));
        let topology = TopologyMapper::new(executor.clone());
        let conflict_checker = ConflictChecker::new(pool_status);
        let probe_engine = ProbeEngine::new(
            executor.clone(),
            store.clone(),
            conflict_checker,
            snapshot.probing.concurrency as usize,
            Duration::from_secs(snapshot.probing.timeout_seconds),
        );
        let scheduler = Scheduler::new(snapshot.discovery.cron.clone(), snapshot.health.cron.clone())?;

        Ok(Self {
            config,
            store,
            executor,
            discovery,
            topology,
            probe_engine,
            scheduler,
            hotplug: Coordinator::new(),
            events,
            cache: Arc::new(DeviceCache::default()),
        })
    }

    // ---- Lifecycle -----------------------------------------------------

    pub async fn start(self: &Arc<Self>) -> Result<(), ManagerError> {
        let config = self.config.current().await;

        let required = [ToolKind::BlockDeviceEnumerator, ToolKind::SmartUtility];
        let optional = [ToolKind::UdevQuery, ToolKind::ScsiLister, ToolKind::EnclosureServices];
        self.executor.probe_capabilities(&required, &optional).await?;

        self.trigger_discovery().await?;

        self.scheduler.start(self.clone()).await?;
        self.register_builtin_probe_schedules(&config).await?;
        for schedule in self.store.list_probe_schedules().await? {
            self.scheduler.register_schedule(&schedule).await?;
        }

        let monitor = EventMonitor::start();
        let reconciler = Reconciler::new(
            self.discovery.clone(),
            Duration::from_secs(config.discovery.reconcile_interval_seconds),
        );
        self.hotplug.start(monitor, reconciler, self.cache.clone(), self.clone()).await;

        self.store.set_manager_start_time(Utc::now()).await?;
        Ok(())
    }

    pub async fn stop(&self) -> Result<(), ManagerError> {
        self.scheduler.stop().await?;

        let deadline = tokio::time::Instant::now() + PROBE_DRAIN_TIMEOUT;
        loop {
            let active = self.get_active_probes().await?;
            if active.is_empty() || tokio::time::Instant::now() >= deadline {
                break;
            }
            tokio::time::sleep(Duration::from_millis(500)).await;
        }

        if tokio::time::timeout(TASK_JOIN_TIMEOUT, self.hotplug.stop()).await.is_err() {
            warn!("hotplug coordinator did not shut down within its time bound");
        }

        self.store.flush().await?;
        Ok(())
    }

    /// Registers the fleet-wide quick/extensive probe cadence from
    /// `probing.quick_cron`/`probing.extensive_cron` as ordinary schedules
    /// matching every disk, reusing the same registration path user-created
    /// schedules go through.
    async fn register_builtin_probe_schedules(&self, config: &Config) -> Result<(), ManagerError> {
        let now = Utc::now();
        let quick = ProbeSchedule {
            id: ScheduleId::new(QUICK_PROBE_SCHEDULE_ID),
            name: "fleet quick probe".to_string(),
            probe_type: ProbeType::Quick,
            cron: config.probing.quick_cron.clone(),
            filter: DiskFilter::default(),
            max_concurrency: config.probing.concurrency,
            timeout_seconds: config.probing.timeout_seconds,
            retry_policy: rodent_domain::RetryPolicy {
                max_retries: config.probing.retry_policy.max_retries,
                backoff_seconds: config.probing.retry_policy.backoff_seconds,
            },
            enabled: true,
            created_at: now,
            updated_at: now,
        };
        let mut extensive = quick.clone();
        extensive.id = ScheduleId::new(EXTENSIVE_PROBE_SCHEDULE_ID);
        extensive.name = "fleet extensive probe".to_string();
        extensive.probe_type = ProbeType::Extensive;
        extensive.cron = config.probing.extensive_cron.clone();

        self.scheduler.register_schedule(&quick).await?;
        self.scheduler.register_schedule(&extensive).await?;
        Ok(())
    }

    // ---- Inventory ------------------------------------------------------

    pub async fn get_inventory(&self, filter: Option<&DiskFilter>) -> Vec<Disk> {
        match filter {
            Some(f) => self.cache.list_matching(f).await,
            None => self.cache.list().await,
        }
    }

    pub async fn get_disk(&self, id: &DeviceId) -> Result<Disk, ManagerError> {
        self.cache.get(id).await.ok_or_else(|| ManagerError::NotFound(id.to_string()))
    }

    /// Path a caller should open this disk by, under the naming strategy: a
    /// manual `naming.overrides` entry wins outright, otherwise it scales
    /// with how many disks the node currently manages.
    pub async fn preferred_path(&self, id: &DeviceId) -> Result<String, ManagerError> {
        let disk = self.get_disk(id).await?;
        let config = self.config.current().await;
        let override_path = config.naming.overrides.get(id.as_str()).map(String::as_str);
        let disk_count = self.cache.len().await;
        Ok(disk.preferred_path(disk_count, override_path))
    }

    /// Runs a disk through its one validation step: `Discovered ->
    /// Validating -> Available`. Only a disk that is freshly discovered is
    /// eligible; anything further along has already been validated.
    pub async fn validate_disk(&self, id: &DeviceId) -> Result<(), ManagerError> {
        let disk = self.get_disk(id).await?;
        if disk.state != DiskState::Discovered {
            return Err(ManagerError::Validation(format!(
                "disk {id} is not in a validatable state ({})",
                disk.state
            )));
        }
        self.apply_state_transition(id, DiskState::Validating, "validation requested").await?;
        self.apply_state_transition(id, DiskState::Available, "validation passed").await
    }

    // ---- Control ----------------------------------------------------------

    /// Runs one full discovery pass and folds it into the cache and the
    /// state store. Used both for the mandatory initial pass at `Start`
    /// (fatal on failure) and for manual/periodic re-runs.
    pub async fn trigger_discovery(&self) -> Result<(), ManagerError> {
        let mut disks = self.discovery.enumerate().await?;
        let config = self.config.current().await;
        if config.topology.enabled {
            self.topology.refresh(&mut disks).await?;
        }

        let previous_ids: HashSet<DeviceId> =
            self.cache.list().await.into_iter().map(|d| d.device_id).collect();
        let discovered_ids: HashSet<DeviceId> = disks.iter().map(|d| d.device_id.clone()).collect();

        let mut added = Vec::new();
        let mut changed = Vec::new();
        for disk in disks {
            if previous_ids.contains(&disk.device_id) {
                changed.push(disk);
            } else {
                added.push(disk);
            }
        }
        let removed: Vec<DeviceId> =
            previous_ids.into_iter().filter(|id| !discovered_ids.contains(id)).collect();

        // `added`/`changed` here are folded through the same merge as a
        // hotplug reconciliation pass: an already-known disk keeps its
        // lifecycle state, health, pool linkage, and operator metadata,
        // only its hardware-derived fields are refreshed.
        self.apply_reconciliation_with_source(&ReconciliationResult { added, removed, changed }, "discovery").await
    }

    /// Sweeps SMART data for every cached disk and folds health changes
    /// back into the cache. A per-device read/parse failure is swallowed
    /// inside `HealthMonitor::sweep`; this never aborts partway through.
    pub async fn trigger_health_check(&self) -> Result<(), ManagerError> {
        let config = self.config.current().await;
        let monitor = HealthMonitor::new(
            self.executor.clone(),
            config.health.concurrency as usize,
            config.health.thresholds.clone(),
        );
        let targets: Vec<(DeviceId, String)> =
            self.cache.list().await.into_iter().map(|d| (d.device_id, d.paths.primary)).collect();
        let readings = monitor.sweep(&targets).await?;

        for reading in readings {
            let previous_health = self.cache.get(&reading.device_id).await.map(|d| d.health);
            let snapshot = reading.snapshot.clone();
            let reason = reading.reason.clone();
            let updated = self
                .cache
                .mutate(&reading.device_id, |d| {
                    d.health = reading.health;
                    d.health_reason = reason.clone();
                    d.smart = Some(snapshot.clone());
                    d.touch(Utc::now());
                })
                .await;

            let Some(disk) = updated else { continue };
            self.store.upsert_disk(&disk).await?;

            if let Some(previous) = previous_health {
                if previous != reading.health {
                    let _ = self
                        .events
                        .emit(Event::new(
                            "health",
                            EventPayload::DiskHealthChanged {
                                device_id: reading.device_id.clone(),
                                from: previous,
                                to: reading.health,
                                reason: reading.reason.clone(),
                            },
                        ))
                        .await;
                }
            }
        }

        self.store.save_debounced().await?;
        Ok(())
    }

    pub async fn refresh_topology(&self) -> Result<(), ManagerError> {
        let mut disks = self.cache.list().await;
        self.topology.refresh(&mut disks).await?;
        for disk in disks {
            self.cache.upsert(disk.clone()).await;
            self.store.upsert_disk(&disk).await?;
        }
        self.store.save_debounced().await?;
        Ok(())
    }

    // ---- Probe API ------------------------------------------------------

    pub async fn trigger_probe(
        &self,
        device_id: DeviceId,
        probe_type: ProbeType,
        requested_by: impl Into<String>,
    ) -> Result<ProbeExecution, ManagerError> {
        let disk = self.get_disk(&device_id).await?;
        let execution = self
            .probe_engine
            .trigger(
                device_id.clone(),
                disk.paths.primary.clone(),
                probe_type,
                ProbeTrigger::Manual { requested_by: requested_by.into() },
            )
            .await?;

        self.store
            .append_operation(Operation::ProbeTriggered {
                id: Uuid::new_v4(),
                at: Utc::now(),
                probe_id: execution.id.clone(),
                device_id: device_id.clone(),
            })
            .await?;
        let _ = self
            .events
            .emit(Event::new(
                "probe",
                EventPayload::ProbeStarted { probe_id: execution.id.clone(), device_id },
            ))
            .await;

        Ok(execution)
    }

    pub async fn cancel_probe(&self, probe_id: &ProbeId) -> Result<(), ManagerError> {
        Ok(self.probe_engine.cancel(probe_id).await?)
    }

    pub async fn get_probe_execution(&self, probe_id: &ProbeId) -> Result<ProbeExecution, ManagerError> {
        self.store
            .get_probe_execution(probe_id)
            .await?
            .ok_or_else(|| ManagerError::NotFound(probe_id.to_string()))
    }

    pub async fn get_active_probes(&self) -> Result<Vec<ProbeExecution>, ManagerError> {
        Ok(self.store.list_probe_executions().await?.into_iter().filter(|p| p.status.is_active()).collect())
    }

    pub async fn get_probe_history(&self, device_id: &DeviceId, limit: usize) -> Result<Vec<ProbeExecution>, ManagerError> {
        let mut history = self.store.probe_history(device_id).await?;
        if history.len() > limit {
            let overflow = history.len() - limit;
            history.drain(0..overflow);
        }
        Ok(history)
    }

    // ---- Schedules --------------------------------------------------------

    pub async fn create_probe_schedule(&self, schedule: ProbeSchedule) -> Result<(), ManagerError> {
        rodent_scheduler::validate_cron(&schedule.cron)?;
        self.store.upsert_probe_schedule(&schedule).await?;
        self.scheduler.register_schedule(&schedule).await?;
        self.store.save_debounced().await?;
        Ok(())
    }

    pub async fn get_probe_schedule(&self, id: &ScheduleId) -> Result<ProbeSchedule, ManagerError> {
        self.store.get_probe_schedule(id).await?.ok_or_else(|| ManagerError::NotFound(id.to_string()))
    }

    pub async fn list_probe_schedules(&self) -> Result<Vec<ProbeSchedule>, ManagerError> {
        Ok(self.store.list_probe_schedules().await?)
    }

    pub async fn update_probe_schedule(&self, schedule: ProbeSchedule) -> Result<(), ManagerError> {
        self.create_probe_schedule(schedule).await
    }

    pub async fn delete_probe_schedule(&self, id: &ScheduleId) -> Result<(), ManagerError> {
        self.scheduler.unregister_schedule(id).await?;
        self.store.delete_probe_schedule(id).await?;
        self.store.save_debounced().await?;
        Ok(())
    }

    pub async fn set_probe_schedule_enabled(&self, id: &ScheduleId, enabled: bool) -> Result<(), ManagerError> {
        let mut schedule = self.get_probe_schedule(id).await?;
        schedule.enabled = enabled;
        schedule.updated_at = Utc::now();
        self.store.upsert_probe_schedule(&schedule).await?;
        self.scheduler.register_schedule(&schedule).await?;
        self.store.save_debounced().await?;
        Ok(())
    }

    pub async fn enable_probe_schedule(&self, id: &ScheduleId) -> Result<(), ManagerError> {
        self.set_probe_schedule_enabled(id, true).await
    }

    pub async fn disable_probe_schedule(&self, id: &ScheduleId) -> Result<(), ManagerError> {
        self.set_probe_schedule_enabled(id, false).await
    }

    // ---- State ------------------------------------------------------------

    pub async fn get_state(&self) -> HashMap<DeviceId, DiskState> {
        self.cache.list().await.into_iter().map(|d| (d.device_id, d.state)).collect()
    }

    pub async fn get_device_state(&self, id: &DeviceId) -> Result<DiskState, ManagerError> {
        Ok(self.get_disk(id).await?.state)
    }

    pub async fn set_disk_state(
        &self,
        id: &DeviceId,
        new_state: DiskState,
        reason: impl Into<String>,
    ) -> Result<(), ManagerError> {
        self.apply_state_transition(id, new_state, &reason.into()).await
    }

    pub async fn quarantine_disk(&self, id: &DeviceId, reason: impl Into<String>) -> Result<(), ManagerError> {
        let reason = reason.into();
        self.apply_state_transition(id, DiskState::Quarantined, &reason).await?;
        self.store
            .append_operation(Operation::DiskQuarantined { id: Uuid::new_v4(), at: Utc::now(), device_id: id.clone(), reason })
            .await?;
        self.store.save_debounced().await?;
        Ok(())
    }

    pub(crate) async fn apply_state_transition(
        &self,
        id: &DeviceId,
        new_state: DiskState,
        reason: &str,
    ) -> Result<(), ManagerError> {
        let current = self.get_disk(id).await?;
        let from = current.state;
        state_machine::transition(from, new_state).map_err(|e| ManagerError::Validation(e.to_string()))?;

        let updated = self
            .cache
            .mutate(id, |d| {
                d.state = new_state;
                d.touch(Utc::now());
            })
            .await
            .ok_or_else(|| ManagerError::NotFound(id.to_string()))?;

        self.store.upsert_disk(&updated).await?;
        self.store
            .append_operation(Operation::DiskStateChanged {
                id: Uuid::new_v4(),
                at: Utc::now(),
                device_id: id.clone(),
                from: from.to_string(),
                to: new_state.to_string(),
                reason: reason.to_string(),
            })
            .await?;
        self.store.save_debounced().await?;

        let _ = self
            .events
            .emit(Event::new(
                "manager",
                EventPayload::DiskStateChanged { device_id: id.clone(), from: from.to_string(), to: new_state.to_string() },
            ))
            .await;

        Ok(())
    }

    /// Folds one reconciliation pass into the cache. `Online` has no
    /// direct path to `Offline` in the transition table, so a removed
    /// disk that was online steps through `Removing` first.
    pub(crate) async fn apply_reconciliation(&self, result: &ReconciliationResult) -> Result<(), ManagerError> {
        self.apply_reconciliation_with_source(result, "reconciler").await
    }

    /// Shared by the hotplug reconciliation loop and manual/scheduled
    /// discovery passes. A disk already present in the cache only has its
    /// hardware-derived fields refreshed (`merge_discovered_fields`); its
    /// lifecycle state, health, pool linkage, tags, and notes are never
    /// reset by rediscovery.
    pub(crate) async fn apply_reconciliation_with_source(
        &self,
        result: &ReconciliationResult,
        source: &'static str,
    ) -> Result<(), ManagerError> {
        for disk in &result.added {
            self.cache.upsert(disk.clone()).await;
            self.store.upsert_disk(disk).await?;
            let _ = self
                .events
                .emit(Event::new(source, EventPayload::DiskDiscovered { device_id: disk.device_id.clone() }))
                .await;
        }
        for disk in &result.changed {
            let merged = match self.cache.get(&disk.device_id).await {
                Some(existing) => merge_discovered_fields(&existing, disk),
                None => disk.clone(),
            };
            self.cache.upsert(merged.clone()).await;
            self.store.upsert_disk(&merged).await?;
        }
        for device_id in &result.removed {
            if let Some(current) = self.cache.get(device_id).await {
                let path: &[DiskState] = if current.state == DiskState::Online {
                    &[DiskState::Removing, DiskState::Offline]
                } else {
                    &[DiskState::Offline]
                };
                for step in path {
                    if let Some(latest) = self.cache.get(device_id).await {
                        if state_machine::is_permitted(latest.state, *step) {
                            let _ = self.apply_state_transition(device_id, *step, "reconciliation: device no longer present").await;
                        }
                    }
                }
            }
            let _ = self
                .events
                .emit(Event::new(source, EventPayload::DiskRemoved { device_id: device_id.clone() }))
                .await;
        }

        self.store
            .append_operation(Operation::DiscoveryRun {
                id: Uuid::new_v4(),
                at: Utc::now(),
                added: result.added.len(),
                removed: result.removed.len(),
                changed: result.changed.len(),
            })
            .await?;
        self.store.save_debounced().await?;
        Ok(())
    }

    // ---- Metadata -----------------------------------------------------------

    pub async fn set_tag(&self, id: &DeviceId, key: impl Into<String>, value: impl Into<String>) -> Result<(), ManagerError> {
        let key = key.into();
        let value = value.into();
        let updated = self
            .cache
            .mutate(id, move |d| {
                d.tags.insert(key.clone(), value.clone());
                d.touch(Utc::now());
            })
            .await
            .ok_or_else(|| ManagerError::NotFound(id.to_string()))?;
        self.store.upsert_disk(&updated).await?;
        self.store.save_debounced().await?;
        Ok(())
    }

    pub async fn delete_tag(&self, id: &DeviceId, key: &str) -> Result<(), ManagerError> {
        let updated = self
            .cache
            .mutate(id, |d| {
                d.tags.remove(key);
                d.touch(Utc::now());
            })
            .await
            .ok_or_else(|| ManagerError::NotFound(id.to_string()))?;
        self.store.upsert_disk(&updated).await?;
        self.store.save_debounced().await?;
        Ok(())
    }

    pub async fn set_notes(&self, id: &DeviceId, notes: impl Into<String>) -> Result<(), ManagerError> {
        let notes = notes.into();
        let updated = self
            .cache
            .mutate(id, move |d| {
                d.notes = notes.clone();
                d.touch(Utc::now());
            })
            .await
            .ok_or_else(|| ManagerError::NotFound(id.to_string()))?;
        self.store.upsert_disk(&updated).await?;
        self.store.save_debounced().await?;
        Ok(())
    }

    // ---- Topology -----------------------------------------------------------

    pub async fn get_topology(&self) -> TopologySnapshot {
        self.topology.snapshot().await
    }

    pub async fn get_controllers(&self) -> Vec<Controller> {
        self.topology.snapshot().await.controllers.into_values().collect()
    }

    pub async fn get_enclosures(&self) -> Vec<Enclosure> {
        self.topology.snapshot().await.enclosures.into_values().collect()
    }

    // ---- Statistics -----------------------------------------------------------

    pub async fn statistics(&self) -> Result<Statistics, ManagerError> {
        Ok(self.store.statistics().await?)
    }

    // ---- Config -----------------------------------------------------------

    pub async fn get_config(&self) -> Arc<Config> {
        self.config.current().await
    }

    pub async fn update_config(&self, new_config: Config) -> Result<Arc<Config>, ManagerError> {
        let config = self.config.replace(new_config).await?;
        self.store
            .append_operation(Operation::ConfigUpdated { id: Uuid::new_v4(), at: Utc::now() })
            .await?;
        self.store.save_debounced().await?;
        Ok(config)
    }

    pub async fn reload_config(&self) -> Result<Arc<Config>, ManagerError> {
        Ok(self.config.reload().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rodent_events::NullSink;
    use rodent_probe::NoPools;

    /// Builds a `Manager` against a tempdir-backed config/state pair
    /// without calling `start()`, so no real tools or udev socket are
    /// touched. The config file does not exist yet, so loading it writes
    /// and returns `Config::default()`.
    async fn test_manager() -> (tempfile::TempDir, Manager) {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("config.yaml");
        let state_path = dir.path().join("state.json");
        let manager = Manager::new(config_path, state_path, Arc::new(NullSink), Arc::new(NoPools))
            .await
            .unwrap();
        (dir, manager)
    }

    fn sample_disk(serial: &str, state: DiskState) -> Disk {
        let now = Utc::now();
        let mut disk = Disk::new(DeviceId::new(serial), now);
        disk.serial = serial.to_string();
        disk.paths.primary = format!("/dev/{serial}");
        disk.state = state;
        disk
    }

    #[tokio::test]
    async fn preferred_path_honours_naming_override() {
        let (_dir, manager) = test_manager().await;
        let mut disk = sample_disk("S1", DiskState::Online);
        disk.paths.by_id = Some("/dev/disk/by-id/s1".to_string());
        manager.cache.upsert(disk.clone()).await;

        let path = manager.preferred_path(&disk.device_id).await.unwrap();
        assert_eq!(path, "/dev/disk/by-id/s1");

        manager
            .config
            .update(|c| {
                c.naming.overrides.insert(disk.device_id.as_str().to_string(), "/dev/disk/by-path/custom".to_string());
            })
            .await
            .unwrap();

        let path = manager.preferred_path(&disk.device_id).await.unwrap();
        assert_eq!(path, "/dev/disk/by-path/custom");
    }

    #[tokio::test]
    async fn empty_cache_queries_return_empty_without_error() {
        let (_dir, manager) = test_manager().await;
        assert!(manager.get_inventory(None).await.is_empty());
        assert!(manager.get_state().await.is_empty());
        assert!(manager
            .get_disk(&DeviceId::new("missing"))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn permitted_transition_updates_cache_and_store() {
        let (_dir, manager) = test_manager().await;
        let disk = sample_disk("S1", DiskState::Discovered);
        manager.cache.upsert(disk.clone()).await;
        manager.store.upsert_disk(&disk).await.unwrap();

        manager
            .apply_state_transition(&disk.device_id, DiskState::Validating, "validating")
            .await
            .unwrap();

        let updated = manager.get_disk(&disk.device_id).await.unwrap();
        assert_eq!(updated.state, DiskState::Validating);
    }

    #[tokio::test]
    async fn disallowed_transition_is_rejected_and_state_unchanged() {
        let (_dir, manager) = test_manager().await;
        let disk = sample_disk("S1", DiskState::Online);
        manager.cache.upsert(disk.clone()).await;
        manager.store.upsert_disk(&disk).await.unwrap();

        let result = manager.apply_state_transition(&disk.device_id, DiskState::Offline, "direct").await;
        assert!(result.is_err());

        let unchanged = manager.get_disk(&disk.device_id).await.unwrap();
        assert_eq!(unchanged.state, DiskState::Online);
    }

    /// Scenario: a disk that was Online is no longer reported by
    /// Discovery. Online has no direct edge to Offline, so reconciliation
    /// must route it through Removing first.
    #[tokio::test]
    async fn reconciliation_routes_online_removal_through_removing() {
        let (_dir, manager) = test_manager().await;
        let disk = sample_disk("S1", DiskState::Online);
        manager.cache.upsert(disk.clone()).await;
        manager.store.upsert_disk(&disk).await.unwrap();

        let result = ReconciliationResult { added: vec![], changed: vec![], removed: vec![disk.device_id.clone()] };
        manager.apply_reconciliation(&result).await.unwrap();

        let after = manager.get_disk(&disk.device_id).await.unwrap();
        assert_eq!(after.state, DiskState::Offline);
    }

    #[tokio::test]
    async fn reconciliation_added_disk_appears_in_inventory() {
        let (_dir, manager) = test_manager().await;
        let disk = sample_disk("S2", DiskState::Discovered);

        let result = ReconciliationResult { added: vec![disk.clone()], changed: vec![], removed: vec![] };
        manager.apply_reconciliation(&result).await.unwrap();

        assert_eq!(manager.get_inventory(None).await.len(), 1);
        assert_eq!(manager.get_device_state(&disk.device_id).await.unwrap(), DiskState::Discovered);
    }

    /// A disk rediscovered by a later pass must not lose its lifecycle
    /// state, health, pool linkage, or operator metadata, even though the
    /// freshly discovered record carries none of those.
    #[tokio::test]
    async fn rediscovery_preserves_state_health_pool_and_tags() {
        let (_dir, manager) = test_manager().await;
        let mut disk = sample_disk("S1", DiskState::Online);
        disk.health = rodent_domain::Health::Warning;
        disk.health_reason = "reallocated sectors".to_string();
        disk.pool = Some(rodent_domain::PoolLinkage { pool_name: "tank".to_string(), vdev_guid: "g1".to_string() });
        disk.tags.insert("rack".to_string(), "a1".to_string());
        manager.cache.upsert(disk.clone()).await;
        manager.store.upsert_disk(&disk).await.unwrap();

        let mut rediscovered = Disk::new(disk.device_id.clone(), Utc::now());
        rediscovered.serial = disk.serial.clone();
        rediscovered.paths.primary = disk.paths.primary.clone();
        rediscovered.model = "new-model-string".to_string();

        let result = ReconciliationResult { added: vec![], changed: vec![rediscovered], removed: vec![] };
        manager.apply_reconciliation(&result).await.unwrap();

        let after = manager.get_disk(&disk.device_id).await.unwrap();
        assert_eq!(after.state, DiskState::Online);
        assert_eq!(after.health, rodent_domain::Health::Warning);
        assert_eq!(after.health_reason, "reallocated sectors");
        assert_eq!(after.pool.as_ref().map(|p| p.pool_name.as_str()), Some("tank"));
        assert_eq!(after.tags.get("rack"), Some(&"a1".to_string()));
        assert_eq!(after.model, "new-model-string");
    }


    #[tokio::test]
    async fn tagging_and_quarantine_round_trip() {
        let (_dir, manager) = test_manager().await;
        let disk = sample_disk("S3", DiskState::Available);
        manager.cache.upsert(disk.clone()).await;
        manager.store.upsert_disk(&disk).await.unwrap();

        manager.set_tag(&disk.device_id, "rack", "a1").await.unwrap();
        let tagged = manager.get_disk(&disk.device_id).await.unwrap();
        assert_eq!(tagged.tags.get("rack"), Some(&"a1".to_string()));

        manager.quarantine_disk(&disk.device_id, "smart failure").await.unwrap();
        assert_eq!(manager.get_device_state(&disk.device_id).await.unwrap(), DiskState::Quarantined);
    }

    #[tokio::test]
    async fn statistics_reflect_seeded_disks() {
        let (_dir, manager) = test_manager().await;
        manager.cache.upsert(sample_disk("S4", DiskState::Online)).await;
        manager.cache.upsert(sample_disk("S5", DiskState::Faulted)).await;
        manager.store.upsert_disk(&sample_disk("S4", DiskState::Online)).await.unwrap();
        manager.store.upsert_disk(&sample_disk("S5", DiskState::Faulted)).await.unwrap();

        let stats = manager.statistics().await.unwrap();
        assert_eq!(stats.total_disks, 2);
    }
}
