use rodent_domain::smart::ata_attr;
use rodent_domain::{Health, SmartBody, SmartSnapshot, SmartThresholds};

/// Evaluates a SMART snapshot against configured thresholds and returns
/// the worst health class that fires, plus a reason string enumerating
/// every rule that contributed. Pure and side-effect-free: callers own
/// all I/O and concurrency.
pub fn classify(smart: &SmartSnapshot, thresholds: &SmartThresholds) -> (Health, String) {
    let mut class = Health::Healthy;
    let mut reasons: Vec<String> = Vec::new();

    // Rule 1: overall self-reported status.
    if let SmartBody::Ata(ata) = &smart.body {
        if !ata.overall_status_passed {
            class = class.max(Health::Failed);
            reasons.push("overall SMART status FAILED".to_string());
        }
    }

    // Rule 2: ATA attribute thresholds.
    if let SmartBody::Ata(ata) = &smart.body {
        if let Some(attr) = ata.attribute(ata_attr::REALLOCATED_SECTORS) {
            if attr.raw >= thresholds.reallocated_sectors_critical {
                class = class.max(Health::Critical);
                reasons.push(format!("reallocated sectors {} >= critical threshold", attr.raw));
            } else if attr.raw >= thresholds.reallocated_sectors_warning {
                class = class.max(Health::Warning);
                reasons.push(format!("reallocated sectors {} >= warning threshold", attr.raw));
            }
        }
        if let Some(attr) = ata.attribute(ata_attr::PENDING_SECTORS) {
            if attr.raw >= thresholds.pending_sectors_critical {
                class = class.max(Health::Critical);
                reasons.push(format!("pending sectors {} >= critical threshold", attr.raw));
            } else if attr.raw >= thresholds.pending_sectors_warning {
                class = class.max(Health::Warning);
                reasons.push(format!("pending sectors {} >= warning threshold", attr.raw));
            }
        }
        for attr in &ata.attributes {
            if attr.threshold > 0 && attr.value <= attr.threshold {
                class = class.max(Health::Critical);
                reasons.push(format!(
                    "attribute {} ({}) normalized value {} <= threshold {}",
                    attr.id, attr.name, attr.value, attr.threshold
                ));
            }
        }
    }

    // Rule 3: NVMe health log.
    if let SmartBody::Nvme(nvme) = &smart.body {
        if nvme.critical_warning != 0 {
            class = class.max(Health::Critical);
            reasons.push(format!("NVMe critical warning bitmap {:#04x}", nvme.critical_warning));
        }
        if nvme.available_spare < nvme.available_spare_threshold {
            class = class.max(Health::Critical);
            reasons.push(format!(
                "NVMe available spare {} below device threshold {}",
                nvme.available_spare, nvme.available_spare_threshold
            ));
        }
        if nvme.percentage_used >= thresholds.nvme_percent_used_critical {
            class = class.max(Health::Critical);
            reasons.push(format!("NVMe percentage used {} >= critical threshold", nvme.percentage_used));
        } else if nvme.percentage_used >= thresholds.nvme_percent_used_warning {
            class = class.max(Health::Warning);
            reasons.push(format!("NVMe percentage used {} >= warning threshold", nvme.percentage_used));
        }
        if nvme.media_errors >= thresholds.nvme_media_errors_critical {
            class = class.max(Health::Critical);
            reasons.push(format!("NVMe media errors {} >= critical threshold", nvme.media_errors));
        } else if nvme.media_errors >= thresholds.nvme_media_errors_warning {
            class = class.max(Health::Warning);
            reasons.push(format!("NVMe media errors {} >= warning threshold", nvme.media_errors));
        }
    }

    // Rule 4: temperature. Capped at Critical — never escalates to Failed.
    if let Some(temp) = smart.temperature_c {
        if temp >= thresholds.temperature_critical_c {
            class = cap_escalate(class, Health::Critical, Health::Critical);
            reasons.push(format!("temperature {temp}C >= critical threshold"));
        } else if temp >= thresholds.temperature_warning_c {
            class = cap_escalate(class, Health::Warning, Health::Critical);
            reasons.push(format!("temperature {temp}C >= warning threshold"));
        }
    }

    // Rule 5: power-on hours. Capped at Warning.
    if let Some(hours) = smart.power_on_hours {
        if hours >= thresholds.power_on_hours_warning {
            class = cap_escalate(class, Health::Warning, Health::Warning);
            reasons.push(format!("power-on hours {hours} >= warning threshold"));
        }
    }

    // Rule 6: non-empty error log implies at least Warning.
    let error_log_entries = match &smart.body {
        SmartBody::Ata(ata) => ata.error_log_entries,
        SmartBody::Nvme(nvme) => nvme.error_log_entries,
    };
    if error_log_entries > 0 {
        class = class.max(Health::Warning);
        reasons.push(format!("{error_log_entries} error log entries present"));
    }

    if reasons.is_empty() {
        (Health::Healthy, "no SMART conditions fired".to_string())
    } else {
        (class, reasons.join("; "))
    }
}

/// Escalates `class` to `candidate`, but never past `cap` — used for
/// rules that are only allowed to raise severity up to a point (e.g.
/// temperature cannot by itself drive a disk to Failed).
fn cap_escalate(class: Health, candidate: Health, cap: Health) -> Health {
    if class >= cap {
        return class;
    }
    class.max(candidate).min(cap)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rodent_domain::{AtaAttribute, AtaSmart, NvmeSmart};

    fn snapshot(body: SmartBody) -> SmartSnapshot {
        SmartSnapshot {
            read_at: chrono::Utc::now(),
            temperature_c: None,
            power_on_hours: None,
            self_test_status_code: None,
            body,
            extra: Default::default(),
        }
    }

    fn passing_ata() -> AtaSmart {
        AtaSmart {
            overall_status_passed: true,
            ..Default::default()
        }
    }

    #[test]
    fn overall_failed_status_is_failed() {
        let ata = AtaSmart {
            overall_status_passed: false,
            attributes: vec![],
            error_log_entries: 0,
        };
        let (health, reason) = classify(&snapshot(SmartBody::Ata(ata)), &SmartThresholds::default());
        assert_eq!(health, Health::Failed);
        assert!(reason.contains("FAILED"));
    }

    #[test]
    fn reallocated_sectors_warning_then_critical() {
        let thresholds = SmartThresholds::default();
        let warn_attr = AtaAttribute {
            id: ata_attr::REALLOCATED_SECTORS,
            name: "Reallocated_Sector_Ct".into(),
            value: 100,
            worst: 100,
            threshold: 10,
            raw: 1,
        };
        let ata = AtaSmart {
            overall_status_passed: true,
            attributes: vec![warn_attr],
            error_log_entries: 0,
        };
        let (health, _) = classify(&snapshot(SmartBody::Ata(ata.clone())), &thresholds);
        assert_eq!(health, Health::Warning);

        let mut critical_ata = ata;
        critical_ata.attributes[0].raw = 20;
        let (health, _) = classify(&snapshot(SmartBody::Ata(critical_ata)), &thresholds);
        assert_eq!(health, Health::Critical);
    }

    #[test]
    fn twelve_reallocated_sectors_is_warning_under_default_thresholds() {
        let attr = AtaAttribute {
            id: ata_attr::REALLOCATED_SECTORS,
            name: "Reallocated_Sector_Ct".into(),
            value: 100,
            worst: 100,
            threshold: 10,
            raw: 12,
        };
        let ata = AtaSmart {
            overall_status_passed: true,
            attributes: vec![attr],
            error_log_entries: 0,
        };
        let (health, _) = classify(&snapshot(SmartBody::Ata(ata)), &SmartThresholds::default());
        assert_eq!(health, Health::Warning);
    }

    #[test]
    fn normalized_value_below_threshold_is_critical() {
        let attr = AtaAttribute {
            id: 9,
            name: "Power_On_Hours".into(),
            value: 5,
            worst: 5,
            threshold: 10,
            raw: 0,
        };
        let ata = AtaSmart {
            overall_status_passed: true,
            attributes: vec![attr],
            error_log_entries: 0,
        };
        let (health, _) = classify(&snapshot(SmartBody::Ata(ata)), &SmartThresholds::default());
        assert_eq!(health, Health::Critical);
    }

    #[test]
    fn nvme_critical_warning_bitmap_is_critical() {
        let nvme = NvmeSmart {
            critical_warning: 0x01,
            available_spare: 100,
            available_spare_threshold: 10,
            percentage_used: 0,
            media_errors: 0,
            error_log_entries: 0,
        };
        let (health, _) = classify(&snapshot(SmartBody::Nvme(nvme)), &SmartThresholds::default());
        assert_eq!(health, Health::Critical);
    }

    #[test]
    fn temperature_alone_cannot_reach_failed() {
        let mut snap = snapshot(SmartBody::Ata(passing_ata()));
        snap.temperature_c = Some(100);
        let thresholds = SmartThresholds::default();
        let (health, _) = classify(&snap, &thresholds);
        assert_eq!(health, Health::Critical);
        assert_ne!(health, Health::Failed);
    }

    #[test]
    fn power_on_hours_cannot_exceed_warning() {
        let mut snap = snapshot(SmartBody::Ata(passing_ata()));
        snap.power_on_hours = Some(100_000);
        let (health, _) = classify(&snap, &SmartThresholds::default());
        assert_eq!(health, Health::Warning);
    }

    #[test]
    fn power_on_hours_does_not_downgrade_existing_critical() {
        let mut snap = snapshot(SmartBody::Ata(passing_ata()));
        snap.power_on_hours = Some(100_000);
        snap.temperature_c = Some(100);
        let (health, _) = classify(&snap, &SmartThresholds::default());
        assert_eq!(health, Health::Critical);
    }

    #[test]
    fn non_empty_error_log_is_at_least_warning() {
        let ata = AtaSmart {
            overall_status_passed: true,
            attributes: vec![],
            error_log_entries: 3,
        };
        let (health, _) = classify(&snapshot(SmartBody::Ata(ata)), &SmartThresholds::default());
        assert_eq!(health, Health::Warning);
    }

    #[test]
    fn clean_snapshot_is_healthy() {
        let (health, reason) =
            classify(&snapshot(SmartBody::Ata(passing_ata())), &SmartThresholds::default());
        assert_eq!(health, Health::Healthy);
        assert!(reason.contains("no SMART"));
    }
}
