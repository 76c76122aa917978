use async_trait::async_trait;
use rodent_domain::{DeviceId, DiskFilter, ProbeTrigger, ProbeType, ScheduleId};
use rodent_hotplug::{state_machine, Action, HotplugCallbacks, ReconciliationResult};
use rodent_scheduler::SchedulerCallbacks;
use tracing::{debug, warn};

use crate::manager::Manager;

#[async_trait]
impl HotplugCallbacks for Manager {
    /// Applies a single filtered kernel event: resolves the action's
    /// implied state (if any) and routes it through the same transition
    /// table every other mutation goes through.
    async fn on_event(&self, device_id: DeviceId, action: Action, device_path: &str) {
        let Some(disk) = self.cache.get(&device_id).await else {
            if action == Action::Add {
                debug!(%device_id, "hot-add event for unknown device, deferring to reconciliation");
            }
            return;
        };

        let Some(implied) = state_machine::action_implied_state(action, disk.state) else {
            return;
        };

        if let Err(e) = self.apply_state_transition(&device_id, implied, "hotplug event").await {
            warn!(%device_id, device_path, error = %e, "hotplug-driven state transition rejected");
        }
    }

    /// Folds a reconciliation pass's diff into the cache and persistence
    /// layer: self-correcting by construction, since the next pass repeats
    /// the same diff against whatever the cache ends up holding.
    async fn on_reconciled(&self, result: &ReconciliationResult) {
        if result.added.is_empty() && result.removed.is_empty() && result.changed.is_empty() {
            return;
        }
        if let Err(e) = self.apply_reconciliation(result).await {
            warn!(error = %e, "failed to apply reconciliation result");
        }
    }

    async fn on_monitor_error(&self, message: &str) {
        warn!(error = %message, "hotplug monitor reported an error, reconciliation remains the fallback detector");
    }
}

#[async_trait]
impl SchedulerCallbacks for Manager {
    async fn run_discovery(&self) {
        if let Err(e) = self.trigger_discovery().await {
            warn!(error = %e, "scheduled discovery pass failed");
        }
    }

    async fn run_health_check(&self) {
        if let Err(e) = self.trigger_health_check().await {
            warn!(error = %e, "scheduled health sweep failed");
        }
    }

    async fn devices_matching(&self, filter: &DiskFilter) -> Vec<(DeviceId, String)> {
        self.cache
            .list_matching(filter)
            .await
            .into_iter()
            .map(|d| (d.device_id, d.paths.primary))
            .collect()
    }

    /// Fires one scheduled probe. Per the scheduled-dispatch policy,
    /// `Conflict`, `ConcurrencyLimit`, and already-active outcomes are
    /// expected background noise, not failures: they are logged at debug
    /// and the rest of the schedule's fan-out continues unaffected.
    async fn trigger_scheduled_probe(
        &self,
        device_id: DeviceId,
        device_path: String,
        probe_type: ProbeType,
        schedule_id: ScheduleId,
    ) {
        let trigger = ProbeTrigger::Schedule { schedule_id };
        match self.probe_engine.trigger(device_id.clone(), device_path, probe_type, trigger).await {
            Ok(execution) => {
                if let Err(e) = self.store.append_operation(rodent_store::Operation::ProbeTriggered {
                    id: uuid::Uuid::new_v4(),
                    at: chrono::Utc::now(),
                    probe_id: execution.id,
                    device_id,
                }).await {
                    warn!(error = %e, "failed to record scheduled probe trigger");
                }
            }
            Err(e) => {
                debug!(%device_id, error = %e, "scheduled probe dispatch skipped for this device");
            }
        }
    }
}
