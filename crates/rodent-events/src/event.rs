use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rodent_domain::{DeviceId, Health, ProbeId, ProbeResult};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
    Critical,
}

/// Typed payload carried by an `Event`, tagged by `kind` in serialized form.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum EventPayload {
    DiskDiscovered { device_id: DeviceId },
    DiskRemoved { device_id: DeviceId },
    DiskStateChanged { device_id: DeviceId, from: String, to: String },
    DiskHealthChanged { device_id: DeviceId, from: Health, to: Health, reason: String },
    ProbeStarted { probe_id: ProbeId, device_id: DeviceId },
    ProbeProgress { probe_id: ProbeId, device_id: DeviceId, percent: u8 },
    ProbeCompleted { probe_id: ProbeId, device_id: DeviceId, result: ProbeResult },
    ProbeCancelled { probe_id: ProbeId, device_id: DeviceId },
    ProbeConflicted { probe_id: ProbeId, device_id: DeviceId, reason: String },
}

/// A structured event offered to the external event bus. When no bus is
/// configured, it is logged at debug and dropped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub level: Level,
    pub source: String,
    pub at: DateTime<Utc>,
    pub metadata: HashMap<String, String>,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(source: impl Into<String>, payload: EventPayload) -> Self {
        let level = level_for(&payload);
        Self {
            id: Uuid::new_v4(),
            level,
            source: source.into(),
            at: Utc::now(),
            metadata: HashMap::new(),
            payload,
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Level assignment rules: Faulted/Failed states or health map to Error;
/// Critical health maps to Critical; Warning health and removal map to
/// Warn; everything else defaults to Info.
fn level_for(payload: &EventPayload) -> Level {
    match payload {
        EventPayload::DiskRemoved { .. } => Level::Warn,
        EventPayload::DiskStateChanged { to, .. } if to == "faulted" => Level::Error,
        EventPayload::DiskHealthChanged { to, .. } => match to {
            Health::Failed => Level::Error,
            Health::Critical => Level::Critical,
            Health::Warning => Level::Warn,
            Health::Healthy | Health::Unknown => Level::Info,
        },
        EventPayload::ProbeConflicted { .. } => Level::Warn,
        EventPayload::ProbeCompleted { result, .. } if *result == ProbeResult::Fail => Level::Error,
        _ => Level::Info,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disk_removed_is_warn() {
        let event = Event::new(
            "discovery",
            EventPayload::DiskRemoved {
                device_id: DeviceId::new("d1"),
            },
        );
        assert_eq!(event.level, Level::Warn);
    }

    #[test]
    fn critical_health_change_is_critical_level() {
        let event = Event::new(
            "health",
            EventPayload::DiskHealthChanged {
                device_id: DeviceId::new("d1"),
                from: Health::Healthy,
                to: Health::Critical,
                reason: "temperature".into(),
            },
        );
        assert_eq!(event.level, Level::Critical);
    }

    #[test]
    fn faulted_state_transition_is_error() {
        let event = Event::new(
            "hotplug",
            EventPayload::DiskStateChanged {
                device_id: DeviceId::new("d1"),
                from: "online".into(),
                to: "faulted".into(),
            },
        );
        assert_eq!(event.level, Level::Error);
    }

    #[test]
    fn default_level_is_info() {
        let event = Event::new(
            "discovery",
            EventPayload::DiskDiscovered {
                device_id: DeviceId::new("d1"),
            },
        );
        assert_eq!(event.level, Level::Info);
    }
}
