use async_trait::async_trait;
use rodent_domain::{DeviceId, DiskFilter, ProbeType, ScheduleId};

/// Manager-provided actions the scheduler fires on a timer. The scheduler
/// owns cron jobs only; it never mutates device state directly.
#[async_trait]
pub trait SchedulerCallbacks: Send + Sync + 'static {
    /// Run a full discovery/reconciliation pass.
    async fn run_discovery(&self);

    /// Run a health sweep across the current device cache.
    async fn run_health_check(&self);

    /// Resolve the devices a `ProbeSchedule`'s filter currently matches,
    /// as `(device_id, device_path)` pairs.
    async fn devices_matching(&self, filter: &DiskFilter) -> Vec<(DeviceId, String)>;

    /// Fire a single scheduled probe. Conflict, concurrency-limit, and
    /// already-active errors are the callback's responsibility to swallow
    /// at debug level; per spec, scheduled fan-out never aborts on them.
    async fn trigger_scheduled_probe(
        &self,
        device_id: DeviceId,
        device_path: String,
        probe_type: ProbeType,
        schedule_id: ScheduleId,
    );
}
