use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceType {
    Hdd,
    Ssd,
    Nvme,
    Optane,
    Unknown,
}

impl std::fmt::Display for DeviceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DeviceType::Hdd => "hdd",
            DeviceType::Ssd => "ssd",
            DeviceType::Nvme => "nvme",
            DeviceType::Optane => "optane",
            DeviceType::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interface {
    Sata,
    Sas,
    Nvme,
    Usb,
    VirtIo,
    Unknown,
}

impl std::fmt::Display for Interface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Interface::Sata => "sata",
            Interface::Sas => "sas",
            Interface::Nvme => "nvme",
            Interface::Usb => "usb",
            Interface::VirtIo => "virtio",
            Interface::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

/// Disk lifecycle state. See `rodent_hotplug::state_machine` for the
/// authoritative transition table enforced on every change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiskState {
    Unknown,
    Discovered,
    Validating,
    Available,
    Online,
    Degraded,
    Faulted,
    Quarantined,
    Removing,
    Offline,
    Retired,
    Unauthorized,
}

impl Default for DiskState {
    fn default() -> Self {
        DiskState::Unknown
    }
}

impl std::fmt::Display for DiskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DiskState::Unknown => "unknown",
            DiskState::Discovered => "discovered",
            DiskState::Validating => "validating",
            DiskState::Available => "available",
            DiskState::Online => "online",
            DiskState::Degraded => "degraded",
            DiskState::Faulted => "faulted",
            DiskState::Quarantined => "quarantined",
            DiskState::Removing => "removing",
            DiskState::Offline => "offline",
            DiskState::Retired => "retired",
            DiskState::Unauthorized => "unauthorized",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Health {
    Unknown,
    Healthy,
    Warning,
    Critical,
    Failed,
}

impl Default for Health {
    fn default() -> Self {
        Health::Unknown
    }
}

impl std::fmt::Display for Health {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Health::Unknown => "unknown",
            Health::Healthy => "healthy",
            Health::Warning => "warning",
            Health::Critical => "critical",
            Health::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeType {
    Quick,
    Extensive,
}

impl std::fmt::Display for ProbeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProbeType::Quick => write!(f, "quick"),
            ProbeType::Extensive => write!(f, "extensive"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeStatus {
    Scheduled,
    Running,
    Completed,
    Failed,
    Cancelled,
    Conflicted,
    Timeout,
}

impl ProbeStatus {
    /// True for the states counted against the "at most one active
    /// execution per device" rule enforced by the probe engine.
    pub fn is_active(&self) -> bool {
        matches!(self, ProbeStatus::Scheduled | ProbeStatus::Running)
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_active()
    }
}

impl std::fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ProbeStatus::Scheduled => "scheduled",
            ProbeStatus::Running => "running",
            ProbeStatus::Completed => "completed",
            ProbeStatus::Failed => "failed",
            ProbeStatus::Cancelled => "cancelled",
            ProbeStatus::Conflicted => "conflicted",
            ProbeStatus::Timeout => "timeout",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeResult {
    Pass,
    Fail,
    Aborted,
    Unknown,
}

impl std::fmt::Display for ProbeResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ProbeResult::Pass => "pass",
            ProbeResult::Fail => "fail",
            ProbeResult::Aborted => "aborted",
            ProbeResult::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_status_active_vs_terminal() {
        assert!(ProbeStatus::Scheduled.is_active());
        assert!(ProbeStatus::Running.is_active());
        assert!(!ProbeStatus::Scheduled.is_terminal());

        for s in [
            ProbeStatus::Completed,
            ProbeStatus::Failed,
            ProbeStatus::Cancelled,
            ProbeStatus::Conflicted,
            ProbeStatus::Timeout,
        ] {
            assert!(!s.is_active(), "{s} should not be active");
            assert!(s.is_terminal(), "{s} should be terminal");
        }
    }

    #[test]
    fn health_ordering_is_severity_ranked() {
        assert!(Health::Unknown < Health::Healthy);
        assert!(Health::Healthy < Health::Warning);
        assert!(Health::Warning < Health::Critical);
        assert!(Health::Critical < Health::Failed);
    }

    #[test]
    fn disk_state_default_is_unknown() {
        assert_eq!(DiskState::default(), DiskState::Unknown);
    }
}
