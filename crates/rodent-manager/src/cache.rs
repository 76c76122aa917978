use std::collections::HashMap;

use async_trait::async_trait;
use rodent_domain::{DeviceId, Disk, DiskFilter};
use rodent_hotplug::DeviceCacheView;
use tokio::sync::RwLock;

/// The Manager's live device cache: one read/write lock, readers take
/// read, every writer (discovery, hotplug callbacks, health updates,
/// metadata edits) takes write.
#[derive(Default)]
pub struct DeviceCache {
    devices: RwLock<HashMap<DeviceId, Disk>>,
}

impl DeviceCache {
    pub async fn upsert(&self, disk: Disk) {
        self.devices.write().await.insert(disk.device_id.clone(), disk);
    }

    pub async fn remove(&self, id: &DeviceId) -> Option<Disk> {
        self.devices.write().await.remove(id)
    }

    pub async fn get(&self, id: &DeviceId) -> Option<Disk> {
        self.devices.read().await.get(id).cloned()
    }

    pub async fn list(&self) -> Vec<Disk> {
        self.devices.read().await.values().cloned().collect()
    }

    pub async fn list_matching(&self, filter: &DiskFilter) -> Vec<Disk> {
        self.devices
            .read()
            .await
            .values()
            .filter(|d| filter.matches(d))
            .cloned()
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.devices.read().await.len()
    }

    /// Applies `mutate` to the cached disk under the write lock and
    /// returns the updated record, or `None` if the device is absent.
    pub async fn mutate<F>(&self, id: &DeviceId, mutate: F) -> Option<Disk>
    where
        F: FnOnce(&mut Disk),
    {
        let mut guard = self.devices.write().await;
        let disk = guard.get_mut(id)?;
        mutate(disk);
        Some(disk.clone())
    }
}

#[async_trait]
impl DeviceCacheView for DeviceCache {
    async fn snapshot(&self) -> Vec<Disk> {
        self.list().await
    }
}
