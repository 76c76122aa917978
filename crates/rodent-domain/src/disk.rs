use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::enums::{DeviceType, DiskState, Health, Interface};
use crate::ids::{ControllerId, DeviceId, EnclosureId};
use crate::smart::SmartSnapshot;

/// Persistent kernel-path variants for a disk. The preferred path for
/// external consumers is chosen by the naming strategy, not stored here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskPaths {
    /// Primary kernel device path, e.g. `/dev/sda`.
    pub primary: String,
    pub by_id: Option<String>,
    pub by_path: Option<String>,
    pub by_vdev: Option<String>,
}

/// Back-reference into the derived controller/enclosure/slot graph.
/// Populated by the Topology Mapper; absent until the first topology pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyRef {
    pub controller_id: Option<ControllerId>,
    pub pci_address: Option<String>,
    pub enclosure_id: Option<EnclosureId>,
    pub slot: Option<u32>,
    pub port: Option<u32>,
    pub nvme_namespace: Option<u32>,
    /// User-configured grouping for fault-domain analysis; opaque to the core.
    pub power_domain: Option<String>,
}

/// Pool linkage, populated only while the disk is in use by a pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolLinkage {
    pub pool_name: String,
    pub vdev_guid: String,
}

/// Authoritative per-device record.
///
/// `device_id` is assigned once by Discovery (or the hotplug identity
/// extractor, which must agree with it) and never changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Disk {
    pub device_id: DeviceId,

    // Hardware
    pub model: String,
    pub vendor: String,
    pub serial: String,
    pub wwn: Option<String>,
    pub firmware: String,
    pub size_bytes: u64,
    pub device_type: DeviceType,
    pub interface: Interface,

    pub paths: DiskPaths,
    pub topology: TopologyRef,

    pub state: DiskState,
    pub health: Health,
    pub health_reason: String,

    pub smart: Option<SmartSnapshot>,

    pub pool: Option<PoolLinkage>,

    pub discovered_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub removed_at: Option<DateTime<Utc>>,

    pub tags: HashMap<String, String>,
    pub notes: String,

    /// Bumped on every mutation; observability only, not used for concurrency control.
    pub generation: u64,
}

impl Disk {
    pub fn new(device_id: DeviceId, now: DateTime<Utc>) -> Self {
        Self {
            device_id,
            model: String::new(),
            vendor: String::new(),
            serial: String::new(),
            wwn: None,
            firmware: String::new(),
            size_bytes: 0,
            device_type: DeviceType::Unknown,
            interface: Interface::Unknown,
            paths: DiskPaths::default(),
            topology: TopologyRef::default(),
            state: DiskState::Unknown,
            health: Health::Unknown,
            health_reason: String::new(),
            smart: None,
            pool: None,
            discovered_at: now,
            last_seen_at: now,
            updated_at: now,
            removed_at: None,
            tags: HashMap::new(),
            notes: String::new(),
            generation: 0,
        }
    }

    /// Touch `updated_at` and bump `generation`. Called by every mutator.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
        self.generation += 1;
    }

    pub fn is_in_pool(&self) -> bool {
        self.pool.is_some()
    }

    /// Preferred path under the naming strategy, given the current disk
    /// population size and an optional manual override.
    pub fn preferred_path(&self, disk_count: usize, override_path: Option<&str>) -> String {
        if let Some(p) = override_path {
            return p.to_string();
        }
        let candidate = if disk_count <= 11 {
            self.paths.by_id.as_deref()
        } else if disk_count <= 24 {
            self.paths.by_path.as_deref()
        } else {
            self.paths.by_vdev.as_deref()
        };
        candidate.unwrap_or(&self.paths.primary).to_string()
    }
}

/// Derived aggregate: a storage controller and the disks attached to it.
/// Created lazily when a disk first references it; recomputed from the
/// disk cache on every Topology Mapper pass, never mutated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Controller {
    pub id: ControllerId,
    pub pci_address: Option<String>,
    pub kind: String,
    pub model: Option<String>,
    pub ports: u32,
    pub disks: Vec<DeviceId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnclosureStatus {
    Ok,
    Warning,
    Critical,
    Unknown,
}

impl Default for EnclosureStatus {
    fn default() -> Self {
        EnclosureStatus::Unknown
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slot {
    pub slot_number: u32,
    pub disk: Option<DeviceId>,
}

/// Derived aggregate: an enclosure and its slots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enclosure {
    pub id: EnclosureId,
    pub vendor: Option<String>,
    pub model: Option<String>,
    pub serial: Option<String>,
    pub slots: Vec<Slot>,
    pub status: EnclosureStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_disk() -> Disk {
        let mut d = Disk::new(DeviceId::new("WD-1"), Utc::now());
        d.paths = DiskPaths {
            primary: "/dev/sda".into(),
            by_id: Some("/dev/disk/by-id/wd-1".into()),
            by_path: Some("/dev/disk/by-path/pci-0".into()),
            by_vdev: Some("/dev/disk/by-vdev/d1".into()),
        };
        d
    }

    #[test]
    fn touch_bumps_generation_and_timestamp() {
        let mut d = sample_disk();
        let gen0 = d.generation;
        let updated0 = d.updated_at;
        std::thread::sleep(std::time::Duration::from_millis(2));
        d.touch(Utc::now());
        assert_eq!(d.generation, gen0 + 1);
        assert!(d.updated_at >= updated0);
    }

    #[test]
    fn preferred_path_respects_override() {
        let d = sample_disk();
        assert_eq!(d.preferred_path(5, Some("/dev/custom")), "/dev/custom");
    }

    #[test]
    fn preferred_path_scales_with_population() {
        let d = sample_disk();
        assert_eq!(d.preferred_path(5, None), "/dev/disk/by-id/wd-1");
        assert_eq!(d.preferred_path(15, None), "/dev/disk/by-path/pci-0");
        assert_eq!(d.preferred_path(30, None), "/dev/disk/by-vdev/d1");
    }

    #[test]
    fn preferred_path_falls_back_to_primary() {
        let mut d = sample_disk();
        d.paths.by_id = None;
        d.paths.by_path = None;
        d.paths.by_vdev = None;
        assert_eq!(d.preferred_path(3, None), "/dev/sda");
    }

    #[test]
    fn is_in_pool_reflects_linkage() {
        let mut d = sample_disk();
        assert!(!d.is_in_pool());
        d.pool = Some(PoolLinkage {
            pool_name: "tank".into(),
            vdev_guid: "123".into(),
        });
        assert!(d.is_in_pool());
    }
}
