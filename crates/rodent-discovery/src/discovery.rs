use std::sync::Arc;

use chrono::Utc;
use rodent_domain::{device_id_from, Disk, DiskPaths, DiskState};
use rodent_tools::{parse_block_devices, parse_udev_properties, BlockDeviceRecord, ToolExecutor, ToolKind};
use tracing::{debug, warn};

use crate::error::DiscoveryError;

/// Produces the canonical set of physical disks present on the host.
/// Excludes partitions, loop devices, and ZFS zvols. Stateless and
/// concurrency-safe: every call is a fresh enumeration, nothing is cached
/// here (the Manager's device cache is the only stateful layer above it).
pub struct Discovery {
    executor: Arc<ToolExecutor>,
}

impl Discovery {
    pub fn new(executor: Arc<ToolExecutor>) -> Self {
        Self { executor }
    }

    pub async fn enumerate(&self) -> Result<Vec<Disk>, DiscoveryError> {
        let raw = self
            .executor
            .run(ToolKind::BlockDeviceEnumerator, &["-J", "-O", "-b"], None, false)
            .await?;
        let devices = parse_block_devices(&raw)?;

        let mut disks = Vec::new();
        for device in devices.iter().filter(|d| is_physical_disk(d)) {
            match self.build_disk(device).await {
                Ok(disk) => disks.push(disk),
                Err(e) => warn!(device = %device.name, error = %e, "skipping device after discovery error"),
            }
        }
        Ok(disks)
    }

    async fn build_disk(&self, device: &BlockDeviceRecord) -> Result<Disk, DiscoveryError> {
        let primary = device.path.clone().unwrap_or_else(|| format!("/dev/{}", device.name));

        let (by_id, by_path, by_vdev, short_serial) =
            self.resolve_persistent_paths(&primary, device.serial.as_deref()).await;

        let now = Utc::now();
        let device_id = device_id_from(device.serial.as_deref(), device.wwn.as_deref(), short_serial.as_deref(), &primary);
        let mut disk = Disk::new(device_id, now);
        disk.model = device.model.clone().unwrap_or_default();
        disk.vendor = device.vendor.clone().unwrap_or_default();
        disk.serial = device.serial.clone().unwrap_or_default();
        disk.wwn = device.wwn.clone();
        disk.size_bytes = device.size.unwrap_or(0);
        disk.device_type = classify_device_type(device);
        disk.interface = classify_interface(device.tran.as_deref());
        disk.paths = DiskPaths {
            primary,
            by_id,
            by_path,
            by_vdev,
        };
        disk.state = DiskState::Discovered;
        Ok(disk)
    }

    /// Resolves persistent `by-id`/`by-path`/`by-vdev` links and the
    /// device's `ID_SERIAL_SHORT` udev property in one query, since both
    /// come from the same `udevadm info` property dump.
    async fn resolve_persistent_paths(
        &self,
        primary: &str,
        serial: Option<&str>,
    ) -> (Option<String>, Option<String>, Option<String>, Option<String>) {
        if !self.executor.is_available(ToolKind::UdevQuery).await {
            return (None, None, None, None);
        }
        let raw = match self
            .executor
            .run(ToolKind::UdevQuery, &["info", "--query=property", "--name", primary], None, false)
            .await
        {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!(device = %primary, error = %e, "udev query failed, paths left unresolved");
                return (None, None, None, None);
            }
        };
        let properties = match parse_udev_properties(&raw) {
            Ok(p) => p,
            Err(e) => {
                debug!(device = %primary, error = %e, "udev property parse failed");
                return (None, None, None, None);
            }
        };
        let devlinks: Vec<&str> = properties
            .get("DEVLINKS")
            .map(|s| s.split_whitespace().collect())
            .unwrap_or_default();

        let by_id_candidates: Vec<String> = devlinks
            .iter()
            .filter(|l| l.contains("/disk/by-id/"))
            .map(|s| s.to_string())
            .collect();
        let by_path = devlinks
            .iter()
            .find(|l| l.contains("/disk/by-path/") && !is_partition_suffix(l))
            .map(|s| s.to_string());
        let by_vdev = devlinks
            .iter()
            .find(|l| l.contains("/disk/by-vdev/"))
            .map(|s| s.to_string());
        let short_serial = properties.get("ID_SERIAL_SHORT").cloned();

        (select_by_id_entry(&by_id_candidates, serial), by_path, by_vdev, short_serial)
    }
}

/// Excludes partitions, loop devices, and ZFS zvols from the canonical
/// disk set.
fn is_physical_disk(device: &BlockDeviceRecord) -> bool {
    if device.kind != "disk" {
        return false;
    }
    if device.name.starts_with("loop") {
        return false;
    }
    if device.name.starts_with("zd") {
        return false;
    }
    true
}

fn classify_device_type(device: &BlockDeviceRecord) -> rodent_domain::DeviceType {
    if device.tran.as_deref() == Some("nvme") {
        return rodent_domain::DeviceType::Nvme;
    }
    match device.rota {
        Some(true) => rodent_domain::DeviceType::Hdd,
        Some(false) => rodent_domain::DeviceType::Ssd,
        None => rodent_domain::DeviceType::Unknown,
    }
}

fn classify_interface(tran: Option<&str>) -> rodent_domain::Interface {
    match tran {
        Some("sata") => rodent_domain::Interface::Sata,
        Some("sas") => rodent_domain::Interface::Sas,
        Some("nvme") => rodent_domain::Interface::Nvme,
        Some("usb") => rodent_domain::Interface::Usb,
        Some("virtio") => rodent_domain::Interface::VirtIo,
        _ => rodent_domain::Interface::Unknown,
    }
}

/// True when `path`'s final component looks like a partition link
/// (`-partN` or trailing `_N`), per the by-id path-selection rule.
fn is_partition_suffix(path: &str) -> bool {
    let tail = path.rsplit('/').next().unwrap_or(path);
    if let Some(idx) = tail.rfind("-part") {
        return tail[idx + 5..].chars().all(|c| c.is_ascii_digit()) && tail.len() > idx + 5;
    }
    if let Some(idx) = tail.rfind('_') {
        let suffix = &tail[idx + 1..];
        return !suffix.is_empty() && suffix.chars().all(|c| c.is_ascii_digit());
    }
    false
}

/// Picks the `by-id` link to record for a disk: prefer one containing the
/// serial substring that isn't itself a partition link; otherwise the
/// first non-partition entry; otherwise none.
fn select_by_id_entry(candidates: &[String], serial: Option<&str>) -> Option<String> {
    if let Some(serial) = serial.filter(|s| !s.is_empty()) {
        if let Some(found) = candidates
            .iter()
            .find(|c| c.contains(serial) && !is_partition_suffix(c))
        {
            return Some(found.clone());
        }
    }
    candidates.iter().find(|c| !is_partition_suffix(c)).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn excludes_partitions_loops_and_zvols() {
        let disk = BlockDeviceRecord {
            name: "sda".into(),
            path: Some("/dev/sda".into()),
            kind: "disk".into(),
            size: None,
            rota: None,
            tran: None,
            serial: None,
            wwn: None,
            vendor: None,
            model: None,
            children: vec![],
        };
        assert!(is_physical_disk(&disk));

        let mut part = disk.clone();
        part.kind = "part".into();
        assert!(!is_physical_disk(&part));

        let mut loop_dev = disk.clone();
        loop_dev.name = "loop0".into();
        assert!(!is_physical_disk(&loop_dev));

        let mut zvol = disk.clone();
        zvol.name = "zd0".into();
        assert!(!is_physical_disk(&zvol));
    }

    #[test]
    fn partition_suffix_detection() {
        assert!(is_partition_suffix("/dev/disk/by-id/ata-WD-part1"));
        assert!(is_partition_suffix("/dev/disk/by-id/ata-WD_1"));
        assert!(!is_partition_suffix("/dev/disk/by-id/ata-WD-ABC123"));
    }

    #[test]
    fn by_id_selection_prefers_serial_match() {
        let candidates = vec![
            "/dev/disk/by-id/wwn-0x5000-part1".to_string(),
            "/dev/disk/by-id/ata-WD-SERIAL123".to_string(),
            "/dev/disk/by-id/wwn-0x5000".to_string(),
        ];
        let chosen = select_by_id_entry(&candidates, Some("SERIAL123"));
        assert_eq!(chosen.as_deref(), Some("/dev/disk/by-id/ata-WD-SERIAL123"));
    }

    #[test]
    fn by_id_selection_falls_back_to_first_non_partition() {
        let candidates = vec![
            "/dev/disk/by-id/wwn-0x5000-part1".to_string(),
            "/dev/disk/by-id/wwn-0x5000".to_string(),
        ];
        let chosen = select_by_id_entry(&candidates, None);
        assert_eq!(chosen.as_deref(), Some("/dev/disk/by-id/wwn-0x5000"));
    }

    #[test]
    fn by_id_selection_empty_when_only_partitions() {
        let candidates = vec!["/dev/disk/by-id/wwn-0x5000-part1".to_string()];
        assert_eq!(select_by_id_entry(&candidates, None), None);
    }
}
