//! Pure identity algorithm shared by Discovery and the hotplug identity
//! extractor. Keeping both call sites on this same function is what
//! guarantees a device that disappears and reappears resolves to the same
//! `DeviceId` by either code path.

use crate::ids::DeviceId;

/// Derive a stable device id from the fields udev/lsblk expose for a block
/// device. Priority order: the vendor-assigned serial, then WWN, then an
/// independent short-serial identifier (udev's `ID_SERIAL_SHORT`, consulted
/// only when neither of the first two is present), then the kernel device
/// path tail (e.g. `sda`) as a last resort for devices that expose none of
/// the above (some USB bridges, loopback-like media).
pub fn device_id_from(
    serial: Option<&str>,
    wwn: Option<&str>,
    short_serial: Option<&str>,
    kernel_path: &str,
) -> DeviceId {
    if let Some(s) = non_empty(serial) {
        return DeviceId::new(s.to_string());
    }
    if let Some(w) = non_empty(wwn) {
        return DeviceId::new(normalize_wwn(w));
    }
    if let Some(s) = non_empty(short_serial) {
        return DeviceId::new(s.to_string());
    }
    let tail = kernel_path.rsplit('/').next().unwrap_or(kernel_path);
    DeviceId::new(format!("path-{tail}"))
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

fn normalize_wwn(wwn: &str) -> String {
    wwn.trim_start_matches("0x").to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_serial_over_wwn() {
        let id = device_id_from(Some("WD-ABC123"), Some("0x5000c500abcdef01"), None, "/dev/sda");
        assert_eq!(id.as_str(), "WD-ABC123");
    }

    #[test]
    fn falls_back_to_wwn_when_no_serial() {
        let id = device_id_from(None, Some("0x5000C500ABCDEF01"), None, "/dev/sda");
        assert_eq!(id.as_str(), "5000c500abcdef01");
    }

    #[test]
    fn falls_back_to_short_serial_when_no_serial_or_wwn() {
        let id = device_id_from(None, None, Some("WD-SHORT1"), "/dev/sda");
        assert_eq!(id.as_str(), "WD-SHORT1");
    }

    #[test]
    fn short_serial_is_not_consulted_when_serial_present() {
        let id = device_id_from(Some("WD-FULL123"), None, Some("WD-SHORT1"), "/dev/sda");
        assert_eq!(id.as_str(), "WD-FULL123");
    }

    #[test]
    fn falls_back_to_path_tail_when_nothing_else() {
        let id = device_id_from(None, None, None, "/dev/sda");
        assert_eq!(id.as_str(), "path-sda");
    }

    #[test]
    fn blank_serial_is_treated_as_absent() {
        let id = device_id_from(Some("   "), None, None, "/dev/sdb");
        assert_eq!(id.as_str(), "path-sdb");
    }

    #[test]
    fn blank_short_serial_is_treated_as_absent() {
        let id = device_id_from(None, None, Some("   "), "/dev/sdb");
        assert_eq!(id.as_str(), "path-sdb");
    }
}
