use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rodent_domain::{DeviceId, ProbeExecution, ProbeId, ProbeResult, ProbeStatus, ProbeTrigger, ProbeType};
use rodent_store::StateStore;
use rodent_tools::{ToolExecutor, ToolKind};
use tokio::sync::{OwnedSemaphorePermit, RwLock, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::conflict::ConflictChecker;
use crate::error::ProbeError;

const POLL_INTERVAL: Duration = Duration::from_secs(30);

struct ActiveProbe {
    execution_id: ProbeId,
    cancel: CancellationToken,
}

/// Executes vendor self-tests with correctness under concurrency: at most
/// one active execution per device, a global concurrency cap, and a
/// conflict check against in-flight pool operations before a probe starts.
pub struct ProbeEngine {
    executor: Arc<ToolExecutor>,
    store: Arc<dyn StateStore>,
    conflict_checker: ConflictChecker,
    semaphore: Arc<Semaphore>,
    active: Arc<RwLock<HashMap<DeviceId, ActiveProbe>>>,
    quick_timeout: Duration,
    extensive_timeout: Duration,
}

impl ProbeEngine {
    pub fn new(
        executor: Arc<ToolExecutor>,
        store: Arc<dyn StateStore>,
        conflict_checker: ConflictChecker,
        max_concurrent: usize,
        quick_timeout: Duration,
    ) -> Self {
        Self {
            executor,
            store,
            conflict_checker,
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            active: Arc::new(RwLock::new(HashMap::new())),
            quick_timeout,
            extensive_timeout: quick_timeout * 3,
        }
    }

    fn timeout_for(&self, probe_type: ProbeType) -> Duration {
        match probe_type {
            ProbeType::Quick => self.quick_timeout,
            ProbeType::Extensive => self.extensive_timeout,
        }
    }

    /// Runs the single-probe algorithm: active-device guard, concurrency
    /// slot, conflict check, then hands execution off to a spawned task and
    /// returns the freshly-created `Running` record.
    ///
    /// The active-device check and its reservation happen under one
    /// write-lock critical section (`Entry::Vacant`), before the conflict
    /// check or semaphore wait run — otherwise two concurrent callers for
    /// the same device could both pass a read-only check and the later
    /// reservation would silently overwrite the earlier one.
    pub async fn trigger(
        &self,
        device_id: DeviceId,
        device_path: String,
        probe_type: ProbeType,
        triggered_by: ProbeTrigger,
    ) -> Result<ProbeExecution, ProbeError> {
        if device_path.is_empty() {
            return Err(ProbeError::DevicePathRequired);
        }

        let execution_id = ProbeId::new();
        let cancel = CancellationToken::new();

        {
            use std::collections::hash_map::Entry;
            let mut active = self.active.write().await;
            match active.entry(device_id.clone()) {
                Entry::Occupied(_) => return Err(ProbeError::AlreadyActive),
                Entry::Vacant(slot) => {
                    slot.insert(ActiveProbe { execution_id: execution_id.clone(), cancel: cancel.clone() });
                }
            }
        }

        let permit = match self.semaphore.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                self.active.write().await.remove(&device_id);
                return Err(ProbeError::ConcurrencyLimit);
            }
        };

        if let Some(reason) = self.conflict_checker.check(&device_path, probe_type).await {
            self.active.write().await.remove(&device_id);
            return Err(ProbeError::Conflict(reason));
        }

        let now = Utc::now();
        let mut execution = ProbeExecution::new(execution_id, device_id.clone(), device_path.clone(), probe_type, triggered_by, now);
        execution.status = ProbeStatus::Running;
        execution.started_at = Some(now);
        if let Err(e) = self.store.upsert_probe_execution(&execution).await {
            self.active.write().await.remove(&device_id);
            return Err(e.into());
        }

        let timeout = self.timeout_for(probe_type);
        tokio::spawn(run_probe(
            execution.clone(),
            device_id,
            self.executor.clone(),
            self.store.clone(),
            self.active.clone(),
            permit,
            cancel,
            timeout,
        ));

        Ok(execution)
    }

    /// Verifies the execution is `Running`, requests an abort from the
    /// SMART utility, and marks it `Cancelled`.
    pub async fn cancel(&self, probe_id: &ProbeId) -> Result<(), ProbeError> {
        let execution = self
            .store
            .get_probe_execution(probe_id)
            .await?
            .ok_or_else(|| ProbeError::NotFound(probe_id.to_string()))?;

        if execution.status != ProbeStatus::Running {
            return Err(ProbeError::NotRunning(probe_id.to_string()));
        }

        let cancel_token = {
            let active = self.active.read().await;
            active.get(&execution.device_id).map(|p| p.cancel.clone())
        };

        if let Some(token) = cancel_token {
            let _ = self
                .executor
                .run(ToolKind::SmartUtility, &["-X", &execution.device_path], None, true)
                .await;
            token.cancel();
        }

        Ok(())
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_probe(
    mut execution: ProbeExecution,
    device_id: DeviceId,
    executor: Arc<ToolExecutor>,
    store: Arc<dyn StateStore>,
    active: Arc<RwLock<HashMap<DeviceId, ActiveProbe>>>,
    _permit: OwnedSemaphorePermit,
    cancel: CancellationToken,
    timeout: Duration,
) {
    let test_flag = match execution.probe_type {
        rodent_domain::ProbeType::Quick => "-t short",
        rodent_domain::ProbeType::Extensive => "-t long",
    };

    let start_result = executor
        .run(ToolKind::SmartUtility, &[test_flag, &execution.device_path], None, true)
        .await;

    if let Err(e) = start_result {
        finish(&mut execution, ProbeStatus::Failed, None, Some(e.to_string()));
        let _ = store.upsert_probe_execution(&execution).await;
        active.write().await.remove(&device_id);
        return;
    }

    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if cancel.is_cancelled() {
            finish(&mut execution, ProbeStatus::Cancelled, None, None);
            let _ = store.upsert_probe_execution(&execution).await;
            break;
        }

        if tokio::time::Instant::now() >= deadline {
            let _ = executor
                .run(ToolKind::SmartUtility, &["-X", &execution.device_path], None, true)
                .await;
            finish(&mut execution, ProbeStatus::Timeout, None, Some("probe exceeded its time bound".to_string()));
            let _ = store.upsert_probe_execution(&execution).await;
            break;
        }

        tokio::select! {
            _ = cancel.cancelled() => continue,
            _ = tokio::time::sleep(POLL_INTERVAL) => {}
        }

        let poll = executor
            .run(ToolKind::SmartUtility, &["-a", "-j", &execution.device_path], None, false)
            .await
            .map_err(ProbeError::from)
            .and_then(|bytes| rodent_tools::parse_smart(&bytes, &execution.device_path).map_err(ProbeError::from));

        match poll {
            Ok(snapshot) => match snapshot.self_test_status_code {
                Some(0) => {
                    finish(&mut execution, ProbeStatus::Completed, Some(ProbeResult::Pass), None);
                    let _ = store.upsert_probe_execution(&execution).await;
                    break;
                }
                Some(code) if (240..=249).contains(&code) => {
                    execution.percent_complete = Some(((code & 0x0F) * 10) as u8);
                    let _ = store.upsert_probe_execution(&execution).await;
                }
                _ => {
                    // unexpected status code: keep polling until timeout.
                }
            },
            Err(e) => {
                warn!(device_path = %execution.device_path, error = %e, "self-test status poll failed");
            }
        }
    }

    active.write().await.remove(&device_id);
    info!(device_path = %execution.device_path, status = ?execution.status, "probe execution finished");
}

fn finish(execution: &mut ProbeExecution, status: ProbeStatus, result: Option<ProbeResult>, error_message: Option<String>) {
    let now = Utc::now();
    execution.status = status;
    execution.result = result;
    execution.completed_at = Some(now);
    execution.error_message = error_message;
    if let Some(started) = execution.started_at {
        execution.duration_seconds = Some((now - started).num_seconds().max(0) as u64);
    }
    if status == ProbeStatus::Completed {
        execution.percent_complete = Some(100);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool_status::NoPools;
    use rodent_store::InMemoryStateStore;
    use std::sync::Arc;

    fn engine() -> ProbeEngine {
        let executor = Arc::new(ToolExecutor::new("sudo -n", Duration::from_secs(5)));
        let store: Arc<dyn StateStore> = Arc::new(InMemoryStateStore::default());
        let conflict_checker = ConflictChecker::new(Arc::new(NoPools));
        ProbeEngine::new(executor, store, conflict_checker, 4, Duration::from_secs(3600))
    }

    #[tokio::test]
    async fn empty_device_path_is_rejected() {
        let engine = engine();
        let result = engine
            .trigger(DeviceId::new("d1"), String::new(), ProbeType::Quick, ProbeTrigger::Manual { requested_by: "op".into() })
            .await;
        assert!(matches!(result, Err(ProbeError::DevicePathRequired)));
    }

    #[tokio::test]
    async fn concurrency_limit_is_enforced() {
        let executor = Arc::new(ToolExecutor::new("sudo -n", Duration::from_secs(5)));
        let store: Arc<dyn StateStore> = Arc::new(InMemoryStateStore::default());
        let conflict_checker = ConflictChecker::new(Arc::new(NoPools));
        let engine = ProbeEngine::new(executor, store, conflict_checker, 0, Duration::from_secs(3600));

        let result = engine
            .trigger(DeviceId::new("d1"), "/dev/sda".into(), ProbeType::Quick, ProbeTrigger::Manual { requested_by: "op".into() })
            .await;
        assert!(matches!(result, Err(ProbeError::ConcurrencyLimit)));
    }

    #[tokio::test]
    async fn cancel_unknown_probe_is_not_found() {
        let engine = engine();
        let result = engine.cancel(&ProbeId::new()).await;
        assert!(matches!(result, Err(ProbeError::NotFound(_))));
    }

    #[tokio::test]
    async fn second_trigger_for_same_device_is_rejected_while_first_is_active() {
        let engine = engine();
        let first = engine
            .trigger(DeviceId::new("d1"), "/dev/sda".into(), ProbeType::Quick, ProbeTrigger::Manual { requested_by: "op".into() })
            .await;
        assert!(first.is_ok());

        let second = engine
            .trigger(DeviceId::new("d1"), "/dev/sda".into(), ProbeType::Quick, ProbeTrigger::Manual { requested_by: "op".into() })
            .await;
        assert!(matches!(second, Err(ProbeError::AlreadyActive)));
    }
}
