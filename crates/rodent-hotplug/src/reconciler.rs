use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rodent_discovery::Discovery;
use rodent_domain::{Disk, DeviceId};
use tracing::debug;

use crate::error::HotplugError;

/// Read-only view of the Manager's live device cache, so the Reconciler
/// never needs to own it.
#[async_trait]
pub trait DeviceCacheView: Send + Sync {
    async fn snapshot(&self) -> Vec<Disk>;
}

/// Result of one reconciliation pass: the three sets the Event Handler
/// dispatches to the Manager's callbacks.
#[derive(Debug, Clone, Default)]
pub struct ReconciliationResult {
    pub added: Vec<Disk>,
    pub removed: Vec<DeviceId>,
    pub changed: Vec<Disk>,
}

/// Runs Discovery and diffs it against the Manager's cache, so the system
/// stays eventually consistent even when the Event Monitor misses events
/// (channel overflow, not yet started, or unsupported platform).
pub struct Reconciler {
    discovery: Arc<Discovery>,
    pub interval: Duration,
}

impl Reconciler {
    pub fn new(discovery: Arc<Discovery>, interval: Duration) -> Self {
        Self { discovery, interval }
    }

    pub async fn run_once(&self, cache: &dyn DeviceCacheView) -> Result<ReconciliationResult, HotplugError> {
        let discovered = self.discovery.enumerate().await?;
        let cached = cache.snapshot().await;
        Ok(diff(discovered, cached))
    }
}

fn diff(discovered: Vec<Disk>, cached: Vec<Disk>) -> ReconciliationResult {
    let discovered_by_id: HashMap<DeviceId, Disk> =
        discovered.into_iter().map(|d| (d.device_id.clone(), d)).collect();
    let cached_by_id: HashMap<DeviceId, Disk> = cached.into_iter().map(|d| (d.device_id.clone(), d)).collect();

    let mut added = Vec::new();
    let mut changed = Vec::new();
    for (id, disk) in &discovered_by_id {
        match cached_by_id.get(id) {
            None => added.push(disk.clone()),
            Some(prior) => {
                if has_materially_changed(prior, disk) {
                    changed.push(disk.clone());
                }
            }
        }
    }

    let removed: Vec<DeviceId> = cached_by_id
        .keys()
        .filter(|id| !discovered_by_id.contains_key(*id))
        .cloned()
        .collect();

    debug!(
        added = added.len(),
        removed = removed.len(),
        changed = changed.len(),
        "reconciliation pass complete"
    );

    ReconciliationResult { added, removed, changed }
}

fn has_materially_changed(prior: &Disk, current: &Disk) -> bool {
    prior.serial != current.serial
        || prior.model != current.model
        || prior.size_bytes != current.size_bytes
        || prior.paths.primary != current.paths.primary
        || prior.health != current.health
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn disk(id: &str) -> Disk {
        Disk::new(DeviceId::new(id), Utc::now())
    }

    #[test]
    fn new_disk_is_added() {
        let result = diff(vec![disk("a")], vec![]);
        assert_eq!(result.added.len(), 1);
        assert!(result.removed.is_empty());
        assert!(result.changed.is_empty());
    }

    #[test]
    fn missing_disk_is_removed() {
        let result = diff(vec![], vec![disk("a")]);
        assert!(result.added.is_empty());
        assert_eq!(result.removed, vec![DeviceId::new("a")]);
    }

    #[test]
    fn size_change_is_reported_as_changed() {
        let prior = disk("a");
        let mut current = prior.clone();
        current.size_bytes = 1024;
        let result = diff(vec![current], vec![prior]);
        assert_eq!(result.changed.len(), 1);
        assert!(result.added.is_empty());
        assert!(result.removed.is_empty());
    }

    #[test]
    fn identical_disk_produces_no_diff() {
        let d = disk("a");
        let result = diff(vec![d.clone()], vec![d]);
        assert!(result.added.is_empty());
        assert!(result.removed.is_empty());
        assert!(result.changed.is_empty());
    }
}
