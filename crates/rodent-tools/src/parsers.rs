//! Pure transformations from tool output (JSON in every case here) into
//! typed records. None of these functions perform I/O; all tolerate
//! missing optional fields by treating them as absent rather than failing.

use std::collections::HashMap;

use serde::Deserialize;

use crate::error::ParseError;

/// One row of the block-device enumerator's tree (lsblk-shaped JSON).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BlockDeviceRecord {
    pub name: String,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub rota: Option<bool>,
    #[serde(default)]
    pub tran: Option<String>,
    #[serde(default)]
    pub serial: Option<String>,
    #[serde(default)]
    pub wwn: Option<String>,
    #[serde(default)]
    pub vendor: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub children: Vec<BlockDeviceRecord>,
}

#[derive(Debug, Deserialize)]
struct BlockDeviceList {
    #[serde(default)]
    blockdevices: Vec<BlockDeviceRecord>,
}

/// Flattens the block-device tree into a single list (parent then
/// children, depth-first), preserving `kind` so callers can filter out
/// partitions, loop devices, and zvols themselves.
pub fn parse_block_devices(bytes: &[u8]) -> Result<Vec<BlockDeviceRecord>, ParseError> {
    let list: BlockDeviceList =
        serde_json::from_slice(bytes).map_err(|e| ParseError::Malformed {
            kind: "block-device".to_string(),
            device: "<enumeration>".to_string(),
            message: e.to_string(),
        })?;

    let mut flat = Vec::new();
    fn walk(dev: &BlockDeviceRecord, out: &mut Vec<BlockDeviceRecord>) {
        let mut clone = dev.clone();
        let children = std::mem::take(&mut clone.children);
        out.push(clone);
        for child in &children {
            walk(child, out);
        }
    }
    for dev in &list.blockdevices {
        walk(dev, &mut flat);
    }
    Ok(flat)
}

#[derive(Debug, Deserialize)]
struct RawAtaAttribute {
    id: u8,
    name: String,
    value: u8,
    worst: u8,
    thresh: u8,
    raw: RawAtaRaw,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawAtaRaw {
    Value { value: u64 },
    Number(u64),
}

impl RawAtaRaw {
    fn as_u64(&self) -> u64 {
        match self {
            RawAtaRaw::Value { value } => *value,
            RawAtaRaw::Number(n) => *n,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawAtaSmart {
    #[serde(default)]
    passed: bool,
    #[serde(default)]
    table: Vec<RawAtaAttribute>,
}

#[derive(Debug, Deserialize)]
struct RawNvmeSmart {
    #[serde(default)]
    critical_warning: u8,
    #[serde(default)]
    available_spare: u8,
    #[serde(default)]
    available_spare_threshold: u8,
    #[serde(default)]
    percentage_used: u8,
    #[serde(default)]
    media_errors: u64,
    #[serde(default)]
    num_err_log_entries: u32,
}

#[derive(Debug, Deserialize)]
struct RawSmartReport {
    #[serde(default)]
    temperature: Option<RawTemperature>,
    #[serde(default)]
    power_on_time: Option<RawPowerOnTime>,
    #[serde(default)]
    ata_smart_data: Option<RawAtaSmartData>,
    #[serde(default)]
    ata_smart_attributes: Option<RawAtaSmart>,
    #[serde(default)]
    nvme_smart_health_information_log: Option<RawNvmeSmart>,
    #[serde(default)]
    ata_smart_error_log: Option<RawAtaErrorLog>,
    #[serde(default)]
    self_test: Option<RawSelfTest>,
}

#[derive(Debug, Deserialize)]
struct RawTemperature {
    #[serde(default)]
    current: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct RawPowerOnTime {
    #[serde(default)]
    hours: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawAtaSmartData {
    #[serde(default)]
    self_test: Option<RawSelfTest>,
}

#[derive(Debug, Deserialize)]
struct RawSelfTest {
    #[serde(default)]
    status: Option<RawSelfTestStatus>,
}

#[derive(Debug, Deserialize)]
struct RawSelfTestStatus {
    #[serde(default)]
    value: Option<u8>,
}

#[derive(Debug, Deserialize)]
struct RawAtaErrorLog {
    #[serde(default)]
    summary: Option<RawAtaErrorLogSummary>,
}

#[derive(Debug, Deserialize)]
struct RawAtaErrorLogSummary {
    #[serde(default)]
    count: u32,
}

/// Parses `smartctl -A -H -j` (or `nvme smart-log -o json`) output for
/// `device` into the domain `SmartSnapshot`.
pub fn parse_smart(
    bytes: &[u8],
    device: &str,
) -> Result<rodent_domain::SmartSnapshot, ParseError> {
    let raw: RawSmartReport = serde_json::from_slice(bytes).map_err(|e| ParseError::Malformed {
        kind: "smart".to_string(),
        device: device.to_string(),
        message: e.to_string(),
    })?;

    let self_test_status_code = raw
        .self_test
        .as_ref()
        .or(raw.ata_smart_data.as_ref().and_then(|d| d.self_test.as_ref()))
        .and_then(|st| st.status.as_ref())
        .and_then(|s| s.value);

    let body = if let Some(nvme) = raw.nvme_smart_health_information_log {
        rodent_domain::SmartBody::Nvme(rodent_domain::NvmeSmart {
            critical_warning: nvme.critical_warning,
            available_spare: nvme.available_spare,
            available_spare_threshold: nvme.available_spare_threshold,
            percentage_used: nvme.percentage_used,
            media_errors: nvme.media_errors,
            error_log_entries: nvme.num_err_log_entries,
        })
    } else if let Some(ata) = raw.ata_smart_attributes {
        let attributes = ata
            .table
            .into_iter()
            .map(|a| rodent_domain::AtaAttribute {
                id: a.id,
                name: a.name,
                value: a.value,
                worst: a.worst,
                threshold: a.thresh,
                raw: a.raw.as_u64(),
            })
            .collect();
        let error_log_entries = raw
            .ata_smart_error_log
            .and_then(|l| l.summary)
            .map(|s| s.count)
            .unwrap_or(0);
        rodent_domain::SmartBody::Ata(rodent_domain::AtaSmart {
            overall_status_passed: ata.passed,
            attributes,
            error_log_entries,
        })
    } else {
        return Err(ParseError::Malformed {
            kind: "smart".to_string(),
            device: device.to_string(),
            message: "neither ATA nor NVMe SMART block present".to_string(),
        });
    };

    Ok(rodent_domain::SmartSnapshot {
        read_at: chrono::Utc::now(),
        temperature_c: raw.temperature.and_then(|t| t.current),
        power_on_hours: raw.power_on_time.and_then(|p| p.hours),
        self_test_status_code,
        body,
        extra: HashMap::new(),
    })
}

/// Parses `udevadm info --query=property` `KEY=VALUE\n`-per-line output.
pub fn parse_udev_properties(bytes: &[u8]) -> Result<HashMap<String, String>, ParseError> {
    let text = std::str::from_utf8(bytes).map_err(|e| ParseError::Malformed {
        kind: "udev".to_string(),
        device: "<unknown>".to_string(),
        message: e.to_string(),
    })?;

    let mut map = HashMap::new();
    for line in text.lines() {
        if let Some((key, value)) = line.split_once('=') {
            map.insert(key.trim().to_string(), value.trim().to_string());
        }
    }
    Ok(map)
}

/// One `[H:C:T:L]` address from the SCSI lister, plus the device node it
/// was resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScsiAddress {
    pub host: u32,
    pub channel: u32,
    pub target: u32,
    pub lun: u32,
    pub device_path: String,
}

/// Parses SCSI lister JSON rows shaped `{"hctl": "H:C:T:L", "device": path}`.
pub fn parse_scsi_listing(bytes: &[u8]) -> Result<Vec<ScsiAddress>, ParseError> {
    #[derive(Deserialize)]
    struct RawRow {
        hctl: String,
        device: String,
    }

    let rows: Vec<RawRow> = serde_json::from_slice(bytes).map_err(|e| ParseError::Malformed {
        kind: "scsi".to_string(),
        device: "<enumeration>".to_string(),
        message: e.to_string(),
    })?;

    rows.into_iter()
        .map(|row| {
            let parts: Vec<&str> = row.hctl.split(':').collect();
            if parts.len() != 4 {
                return Err(ParseError::Malformed {
                    kind: "scsi".to_string(),
                    device: row.device.clone(),
                    message: format!("malformed hctl '{}'", row.hctl),
                });
            }
            let parse = |s: &str| {
                s.parse::<u32>().map_err(|_| ParseError::Malformed {
                    kind: "scsi".to_string(),
                    device: row.device.clone(),
                    message: format!("non-numeric hctl component in '{}'", row.hctl),
                })
            };
            Ok(ScsiAddress {
                host: parse(parts[0])?,
                channel: parse(parts[1])?,
                target: parse(parts[2])?,
                lun: parse(parts[3])?,
                device_path: row.device,
            })
        })
        .collect()
}

/// Vendor/model/status of one enclosure, as reported by the
/// enclosure-services tool.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EnclosureReading {
    pub vendor: Option<String>,
    pub model: Option<String>,
    pub serial: Option<String>,
    pub status: String,
}

pub fn parse_enclosure_status(
    bytes: &[u8],
    device: &str,
) -> Result<EnclosureReading, ParseError> {
    serde_json::from_slice(bytes).map_err(|e| ParseError::Malformed {
        kind: "enclosure".to_string(),
        device: device.to_string(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_block_device_tree() {
        let json = br#"{
            "blockdevices": [
                {"name": "sda", "path": "/dev/sda", "type": "disk", "size": 1000,
                 "children": [{"name": "sda1", "path": "/dev/sda1", "type": "part"}]}
            ]
        }"#;
        let devices = parse_block_devices(json).unwrap();
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].kind, "disk");
        assert_eq!(devices[1].kind, "part");
    }

    #[test]
    fn tolerates_missing_optional_fields() {
        let json = br#"{"blockdevices": [{"name": "sda", "type": "disk"}]}"#;
        let devices = parse_block_devices(json).unwrap();
        assert_eq!(devices.len(), 1);
        assert!(devices[0].serial.is_none());
        assert!(devices[0].wwn.is_none());
    }

    #[test]
    fn parses_ata_smart_payload() {
        let json = br#"{
            "temperature": {"current": 34},
            "power_on_time": {"hours": 1200},
            "ata_smart_attributes": {
                "passed": true,
                "table": [
                    {"id": 5, "name": "Reallocated_Sector_Ct", "value": 100, "worst": 100, "thresh": 10, "raw": {"value": 0}}
                ]
            }
        }"#;
        let snapshot = parse_smart(json, "/dev/sda").unwrap();
        assert_eq!(snapshot.temperature_c, Some(34));
        assert_eq!(snapshot.power_on_hours, Some(1200));
        match snapshot.body {
            rodent_domain::SmartBody::Ata(ata) => {
                assert!(ata.overall_status_passed);
                assert_eq!(ata.attributes.len(), 1);
            }
            _ => panic!("expected ATA body"),
        }
    }

    #[test]
    fn parses_nvme_smart_payload() {
        let json = br#"{
            "nvme_smart_health_information_log": {
                "critical_warning": 0,
                "available_spare": 100,
                "available_spare_threshold": 10,
                "percentage_used": 5,
                "media_errors": 0,
                "num_err_log_entries": 0
            }
        }"#;
        let snapshot = parse_smart(json, "/dev/nvme0n1").unwrap();
        assert!(matches!(snapshot.body, rodent_domain::SmartBody::Nvme(_)));
    }

    #[test]
    fn smart_error_carries_device_id() {
        let err = parse_smart(b"{}", "/dev/sdz").unwrap_err();
        match err {
            ParseError::Malformed { device, .. } => assert_eq!(device, "/dev/sdz"),
        }
    }

    #[test]
    fn parses_scsi_hctl_tuple() {
        let json = br#"[{"hctl": "2:0:0:0", "device": "/dev/sda"}]"#;
        let rows = parse_scsi_listing(json).unwrap();
        assert_eq!(rows[0].host, 2);
        assert_eq!(rows[0].device_path, "/dev/sda");
    }

    #[test]
    fn rejects_malformed_hctl() {
        let json = br#"[{"hctl": "bad", "device": "/dev/sda"}]"#;
        assert!(parse_scsi_listing(json).is_err());
    }

    #[test]
    fn parses_udev_key_value_lines() {
        let text = b"ID_SERIAL=WD-123\nID_WWN=0x5000c5\n";
        let map = parse_udev_properties(text).unwrap();
        assert_eq!(map.get("ID_SERIAL").unwrap(), "WD-123");
    }
}
