use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use rodent_domain::{ProbeSchedule, ScheduleId};
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{info, warn};
use uuid::Uuid;

use crate::callbacks::SchedulerCallbacks;
use crate::error::SchedulerError;

/// Validates a cron expression without registering anything. Used both by
/// the Scheduler itself and by whatever validates a `ProbeSchedule` at
/// creation time, per its cron-expression invariant.
pub fn validate_cron(expression: &str) -> Result<(), SchedulerError> {
    cron::Schedule::from_str(expression)
        .map(|_| ())
        .map_err(|source| SchedulerError::InvalidCron {
            expression: expression.to_string(),
            source,
        })
}

struct Running {
    job_scheduler: JobScheduler,
    callbacks: Arc<dyn SchedulerCallbacks>,
}

/// One `JobScheduler` instance backing periodic discovery, periodic health
/// monitoring, and every enabled `ProbeSchedule`. Enable/disable swaps the
/// registered cron job atomically: the old registration is removed before
/// the new one is added, guarded by the same job-id map lock. Callbacks
/// are supplied at `start`, not construction, so the Manager can build its
/// Scheduler before it has an `Arc<Self>` to hand back as the callback sink.
pub struct Scheduler {
    discovery_cron: String,
    health_cron: String,
    inner: Mutex<Option<Running>>,
    schedule_jobs: Mutex<HashMap<ScheduleId, Uuid>>,
}

impl Scheduler {
    pub fn new(discovery_cron: impl Into<String>, health_cron: impl Into<String>) -> Result<Self, SchedulerError> {
        let discovery_cron = discovery_cron.into();
        let health_cron = health_cron.into();
        validate_cron(&discovery_cron)?;
        validate_cron(&health_cron)?;
        Ok(Self {
            discovery_cron,
            health_cron,
            inner: Mutex::new(None),
            schedule_jobs: Mutex::new(HashMap::new()),
        })
    }

    /// Builds the `JobScheduler`, registers the discovery and health jobs,
    /// and starts it. Does not register any `ProbeSchedule`s; the Manager
    /// calls `register_schedule` for each enabled one after `start`.
    pub async fn start(&self, callbacks: Arc<dyn SchedulerCallbacks>) -> Result<(), SchedulerError> {
        let job_scheduler = JobScheduler::new()
            .await
            .map_err(|e| SchedulerError::Unavailable(e.to_string()))?;

        let discovery_callbacks = callbacks.clone();
        let discovery_job = Job::new_async(self.discovery_cron.as_str(), move |_uuid, _lock| {
            let callbacks = discovery_callbacks.clone();
            Box::pin(async move {
                callbacks.run_discovery().await;
            })
        })
        .map_err(|e| SchedulerError::Unavailable(e.to_string()))?;
        job_scheduler
            .add(discovery_job)
            .await
            .map_err(|e| SchedulerError::Unavailable(e.to_string()))?;

        let health_callbacks = callbacks.clone();
        let health_job = Job::new_async(self.health_cron.as_str(), move |_uuid, _lock| {
            let callbacks = health_callbacks.clone();
            Box::pin(async move {
                callbacks.run_health_check().await;
            })
        })
        .map_err(|e| SchedulerError::Unavailable(e.to_string()))?;
        job_scheduler
            .add(health_job)
            .await
            .map_err(|e| SchedulerError::Unavailable(e.to_string()))?;

        job_scheduler
            .start()
            .await
            .map_err(|e| SchedulerError::Unavailable(e.to_string()))?;

        *self.inner.lock().await = Some(Running { job_scheduler, callbacks });
        info!("scheduler started with discovery and health jobs registered");
        Ok(())
    }

    /// Shuts the underlying `JobScheduler` down, dropping every registered
    /// job including probe schedules.
    pub async fn stop(&self) -> Result<(), SchedulerError> {
        let mut guard = self.inner.lock().await;
        if let Some(mut running) = guard.take() {
            running
                .job_scheduler
                .shutdown()
                .await
                .map_err(|e| SchedulerError::Unavailable(e.to_string()))?;
        }
        self.schedule_jobs.lock().await.clear();
        Ok(())
    }

    /// Registers a `ProbeSchedule`'s cron job if it is enabled. A disabled
    /// schedule is accepted but never registered: it persists in the store
    /// without firing.
    pub async fn register_schedule(&self, schedule: &ProbeSchedule) -> Result<(), SchedulerError> {
        self.unregister_schedule(&schedule.id).await?;

        if !schedule.enabled {
            return Ok(());
        }

        validate_cron(&schedule.cron)?;

        let guard = self.inner.lock().await;
        let running = guard
            .as_ref()
            .ok_or_else(|| SchedulerError::Unavailable("scheduler not started".to_string()))?;

        let callbacks = running.callbacks.clone();
        let filter = schedule.filter.clone();
        let probe_type = schedule.probe_type;
        let schedule_id = schedule.id.clone();

        let job = Job::new_async(schedule.cron.as_str(), move |_uuid, _lock| {
            let callbacks = callbacks.clone();
            let filter = filter.clone();
            let schedule_id = schedule_id.clone();
            Box::pin(async move {
                let targets = callbacks.devices_matching(&filter).await;
                for (device_id, device_path) in targets {
                    callbacks
                        .trigger_scheduled_probe(device_id, device_path, probe_type, schedule_id.clone())
                        .await;
                }
            })
        })
        .map_err(|e| SchedulerError::Unavailable(e.to_string()))?;

        let job_id = running
            .job_scheduler
            .add(job)
            .await
            .map_err(|e| SchedulerError::Unavailable(e.to_string()))?;

        self.schedule_jobs.lock().await.insert(schedule.id.clone(), job_id);
        Ok(())
    }

    /// Removes a schedule's cron job if one is registered. A no-op for
    /// schedules that were never registered (already disabled, or unknown).
    pub async fn unregister_schedule(&self, id: &ScheduleId) -> Result<(), SchedulerError> {
        let job_id = self.schedule_jobs.lock().await.remove(id);
        let Some(job_id) = job_id else {
            return Ok(());
        };

        let guard = self.inner.lock().await;
        let Some(running) = guard.as_ref() else {
            warn!(schedule_id = %id, "scheduler not running, dropping stale job id");
            return Ok(());
        };

        running
            .job_scheduler
            .remove(&job_id)
            .await
            .map_err(|e| SchedulerError::Unavailable(e.to_string()))
    }

    pub async fn is_registered(&self, id: &ScheduleId) -> bool {
        self.schedule_jobs.lock().await.contains_key(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_cron_accepts_well_formed_expression() {
        assert!(validate_cron("0 0 * * * *").is_ok());
    }

    #[test]
    fn validate_cron_rejects_malformed_expression() {
        assert!(validate_cron("not a cron expression").is_err());
    }

    struct NoOpCallbacks;

    #[async_trait::async_trait]
    impl SchedulerCallbacks for NoOpCallbacks {
        async fn run_discovery(&self) {}
        async fn run_health_check(&self) {}
        async fn devices_matching(
            &self,
            _filter: &rodent_domain::DiskFilter,
        ) -> Vec<(rodent_domain::DeviceId, String)> {
            Vec::new()
        }
        async fn trigger_scheduled_probe(
            &self,
            _device_id: rodent_domain::DeviceId,
            _device_path: String,
            _probe_type: rodent_domain::ProbeType,
            _schedule_id: ScheduleId,
        ) {
        }
    }

    fn sample_schedule(cron: &str, enabled: bool) -> ProbeSchedule {
        let now = chrono::Utc::now();
        ProbeSchedule {
            id: ScheduleId::new("sched-1"),
            name: "nightly".to_string(),
            probe_type: rodent_domain::ProbeType::Quick,
            cron: cron.to_string(),
            filter: rodent_domain::DiskFilter::default(),
            max_concurrency: 1,
            timeout_seconds: 600,
            retry_policy: rodent_domain::RetryPolicy::default(),
            enabled,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn construction_rejects_invalid_configured_cron() {
        let result = Scheduler::new("garbage", "0 0 * * * *");
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn disabled_schedule_is_accepted_but_never_registered() {
        let scheduler = Scheduler::new("0 0 * * * *", "0 30 * * * *").unwrap();
        scheduler.start(Arc::new(NoOpCallbacks)).await.unwrap();

        let schedule = sample_schedule("0/10 * * * * *", false);
        scheduler.register_schedule(&schedule).await.unwrap();
        assert!(!scheduler.is_registered(&schedule.id).await);

        scheduler.stop().await.unwrap();
    }

    #[tokio::test]
    async fn enabled_schedule_is_registered_and_removable() {
        let scheduler = Scheduler::new("0 0 * * * *", "0 30 * * * *").unwrap();
        scheduler.start(Arc::new(NoOpCallbacks)).await.unwrap();

        let schedule = sample_schedule("0/10 * * * * *", true);
        scheduler.register_schedule(&schedule).await.unwrap();
        assert!(scheduler.is_registered(&schedule.id).await);

        scheduler.unregister_schedule(&schedule.id).await.unwrap();
        assert!(!scheduler.is_registered(&schedule.id).await);

        scheduler.stop().await.unwrap();
    }

    #[tokio::test]
    async fn invalid_schedule_cron_is_rejected_at_registration() {
        let scheduler = Scheduler::new("0 0 * * * *", "0 30 * * * *").unwrap();
        scheduler.start(Arc::new(NoOpCallbacks)).await.unwrap();

        let schedule = sample_schedule("not a cron expression", true);
        assert!(scheduler.register_schedule(&schedule).await.is_err());

        scheduler.stop().await.unwrap();
    }
}
