use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// One ATA SMART attribute row (`smartctl -A` analogue).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AtaAttribute {
    pub id: u8,
    pub name: String,
    pub value: u8,
    pub worst: u8,
    pub threshold: u8,
    pub raw: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AtaSmart {
    pub overall_status_passed: bool,
    pub attributes: Vec<AtaAttribute>,
    pub error_log_entries: u32,
}

impl AtaSmart {
    pub fn attribute(&self, id: u8) -> Option<&AtaAttribute> {
        self.attributes.iter().find(|a| a.id == id)
    }
}

/// NVMe health log block (`nvme smart-log` analogue).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NvmeSmart {
    pub critical_warning: u8,
    pub available_spare: u8,
    pub available_spare_threshold: u8,
    pub percentage_used: u8,
    pub media_errors: u64,
    pub error_log_entries: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SmartBody {
    Ata(AtaSmart),
    Nvme(NvmeSmart),
}

/// A point-in-time SMART read, independent of device transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmartSnapshot {
    pub read_at: chrono::DateTime<chrono::Utc>,
    pub temperature_c: Option<i32>,
    pub power_on_hours: Option<u64>,
    pub self_test_status_code: Option<u8>,
    pub body: SmartBody,
    #[serde(default)]
    pub extra: HashMap<String, String>,
}

/// Thresholds that drive Health Monitor classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmartThresholds {
    pub reallocated_sectors_warning: u64,
    pub reallocated_sectors_critical: u64,
    pub pending_sectors_warning: u64,
    pub pending_sectors_critical: u64,
    pub temperature_warning_c: i32,
    pub temperature_critical_c: i32,
    pub power_on_hours_warning: u64,
    pub nvme_percent_used_warning: u8,
    pub nvme_percent_used_critical: u8,
    pub nvme_media_errors_warning: u64,
    pub nvme_media_errors_critical: u64,
}

impl Default for SmartThresholds {
    fn default() -> Self {
        Self {
            reallocated_sectors_warning: 1,
            reallocated_sectors_critical: 20,
            pending_sectors_warning: 1,
            pending_sectors_critical: 10,
            temperature_warning_c: 50,
            temperature_critical_c: 60,
            power_on_hours_warning: 43_800, // 5 years
            nvme_percent_used_warning: 80,
            nvme_percent_used_critical: 95,
            nvme_media_errors_warning: 1,
            nvme_media_errors_critical: 100,
        }
    }
}

/// Attribute id constants referenced directly by the health evaluation rules.
pub mod ata_attr {
    pub const REALLOCATED_SECTORS: u8 = 5;
    pub const PENDING_SECTORS: u8 = 197;
}
