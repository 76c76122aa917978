use std::collections::HashMap;
use std::sync::Arc;

use rodent_domain::{Controller, ControllerId, Disk, Enclosure, EnclosureId, EnclosureStatus, Slot};
use rodent_tools::{parse_enclosure_status, parse_scsi_listing, ScsiAddress, ToolExecutor, ToolKind};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::TopologyError;

#[derive(Debug, Clone, Default, Serialize)]
pub struct TopologySnapshot {
    pub controllers: HashMap<ControllerId, Controller>,
    pub enclosures: HashMap<EnclosureId, Enclosure>,
}

/// Derives the controller/enclosure/slot graph from SCSI and NVMe
/// namespace paths. The aggregate is rebuilt fresh from the disk list on
/// every pass and swapped in as a whole — callers never see a partially
/// updated snapshot.
pub struct TopologyMapper {
    executor: Arc<ToolExecutor>,
    cache: RwLock<TopologySnapshot>,
}

impl TopologyMapper {
    pub fn new(executor: Arc<ToolExecutor>) -> Self {
        Self {
            executor,
            cache: RwLock::new(TopologySnapshot::default()),
        }
    }

    /// Annotates each disk's `topology` ref in place and rebuilds the
    /// controller aggregate from the result.
    pub async fn refresh(&self, disks: &mut [Disk]) -> Result<(), TopologyError> {
        let scsi_addresses = self.scsi_addresses().await?;

        let mut controllers: HashMap<ControllerId, Controller> = HashMap::new();

        for disk in disks.iter_mut() {
            if let Some((controller_id, namespace)) = parse_nvme_path(&disk.paths.primary) {
                disk.topology.controller_id = Some(controller_id.clone());
                disk.topology.nvme_namespace = Some(namespace);
                upsert_controller(&mut controllers, controller_id, "nvme", disk.device_id.clone());
                continue;
            }

            if let Some(addr) = scsi_addresses
                .iter()
                .find(|a| a.device_path == disk.paths.primary)
            {
                let controller_id = ControllerId::new(format!("scsi-{}", addr.host));
                disk.topology.controller_id = Some(controller_id.clone());
                disk.topology.port = Some(addr.channel);
                disk.topology.slot = Some(addr.target);
                upsert_controller(&mut controllers, controller_id, "scsi", disk.device_id.clone());
            }
        }

        let mut guard = self.cache.write().await;
        guard.controllers = controllers;
        Ok(())
    }

    async fn scsi_addresses(&self) -> Result<Vec<ScsiAddress>, TopologyError> {
        if !self.executor.is_available(ToolKind::ScsiLister).await {
            return Ok(Vec::new());
        }
        let raw = self.executor.run(ToolKind::ScsiLister, &["--json"], None, false).await?;
        Ok(parse_scsi_listing(&raw)?)
    }

    /// Queries the enclosure-services tool for each device path in
    /// `enclosure_device_paths` and rebuilds the enclosure aggregate.
    /// Slot population is correlated by SCSI address when available.
    pub async fn refresh_enclosures(
        &self,
        enclosure_device_paths: &[String],
    ) -> Result<(), TopologyError> {
        if !self.executor.is_available(ToolKind::EnclosureServices).await {
            return Ok(());
        }

        let scsi_addresses = self.scsi_addresses().await?;
        let mut enclosures = HashMap::new();

        for path in enclosure_device_paths {
            let raw = match self
                .executor
                .run(ToolKind::EnclosureServices, &["--page=2", path], None, false)
                .await
            {
                Ok(bytes) => bytes,
                Err(e) => {
                    debug!(enclosure = %path, error = %e, "enclosure query failed, skipping");
                    continue;
                }
            };
            let reading = match parse_enclosure_status(&raw, path) {
                Ok(r) => r,
                Err(e) => {
                    debug!(enclosure = %path, error = %e, "enclosure parse failed, skipping");
                    continue;
                }
            };

            let id = EnclosureId::new(path.clone());
            let slots = scsi_addresses
                .iter()
                .filter(|a| a.device_path.starts_with(path.as_str()))
                .map(|a| Slot {
                    slot_number: a.target,
                    disk: None,
                })
                .collect();

            enclosures.insert(
                id.clone(),
                Enclosure {
                    id,
                    vendor: reading.vendor,
                    model: reading.model,
                    serial: reading.serial,
                    slots,
                    status: parse_enclosure_status_text(&reading.status),
                },
            );
        }

        self.cache.write().await.enclosures = enclosures;
        Ok(())
    }

    pub async fn snapshot(&self) -> TopologySnapshot {
        self.cache.read().await.clone()
    }
}

fn upsert_controller(
    controllers: &mut HashMap<ControllerId, Controller>,
    id: ControllerId,
    kind: &str,
    device_id: rodent_domain::DeviceId,
) {
    controllers
        .entry(id.clone())
        .or_insert_with(|| Controller {
            id,
            pci_address: None,
            kind: kind.to_string(),
            model: None,
            ports: 0,
            disks: Vec::new(),
        })
        .disks
        .push(device_id);
}

/// Parses `/dev/nvmeXnY` into `(nvme-X controller id, Y namespace)`.
fn parse_nvme_path(path: &str) -> Option<(ControllerId, u32)> {
    let tail = path.rsplit('/').next()?;
    let rest = tail.strip_prefix("nvme")?;
    let (ctrl, ns) = rest.split_once('n')?;
    let ctrl: u32 = ctrl.parse().ok()?;
    let ns: u32 = ns.parse().ok()?;
    Some((ControllerId::new(format!("nvme-{ctrl}")), ns))
}

fn parse_enclosure_status_text(status: &str) -> EnclosureStatus {
    match status.to_ascii_lowercase().as_str() {
        "ok" => EnclosureStatus::Ok,
        "warning" => EnclosureStatus::Warning,
        "critical" => EnclosureStatus::Critical,
        _ => EnclosureStatus::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nvme_controller_and_namespace() {
        let (ctrl, ns) = parse_nvme_path("/dev/nvme0n1").unwrap();
        assert_eq!(ctrl.as_str(), "nvme-0");
        assert_eq!(ns, 1);
    }

    #[test]
    fn rejects_non_nvme_paths() {
        assert!(parse_nvme_path("/dev/sda").is_none());
    }

    #[test]
    fn enclosure_status_text_maps_known_values() {
        assert_eq!(parse_enclosure_status_text("OK"), EnclosureStatus::Ok);
        assert_eq!(parse_enclosure_status_text("weird"), EnclosureStatus::Unknown);
    }
}
