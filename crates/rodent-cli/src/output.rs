use rodent_domain::{Disk, ProbeExecution, ProbeSchedule};
use rodent_store::Statistics;

pub fn render_inventory(disks: &[Disk]) -> String {
    if disks.is_empty() {
        return "No disks.".to_string();
    }
    let mut out = String::new();
    out.push_str(&format!(
        "{:<24} {:<12} {:<10} {:<10} {:<10} {}\n",
        "DEVICE", "STATE", "HEALTH", "TYPE", "SIZE(GB)", "PATH"
    ));
    for disk in disks {
        out.push_str(&format!(
            "{:<24} {:<12} {:<10} {:<10} {:<10} {}\n",
            disk.device_id,
            disk.state,
            disk.health,
            disk.device_type,
            disk.size_bytes / 1_000_000_000,
            disk.paths.primary,
        ));
    }
    out
}

pub fn render_disk(disk: &Disk, preferred_path: &str) -> String {
    let mut out = String::new();
    out.push_str(&format!("device_id:   {}\n", disk.device_id));
    out.push_str(&format!("state:       {}\n", disk.state));
    out.push_str(&format!("health:      {} ({})\n", disk.health, disk.health_reason));
    out.push_str(&format!("model:       {}\n", disk.model));
    out.push_str(&format!("vendor:      {}\n", disk.vendor));
    out.push_str(&format!("serial:      {}\n", disk.serial));
    out.push_str(&format!("size:        {} GB\n", disk.size_bytes / 1_000_000_000));
    out.push_str(&format!("interface:   {}\n", disk.interface));
    out.push_str(&format!("primary:     {}\n", disk.paths.primary));
    out.push_str(&format!("path:        {preferred_path}\n"));
    if let Some(pool) = &disk.pool {
        out.push_str(&format!("pool:        {} (vdev {})\n", pool.pool_name, pool.vdev_guid));
    }
    if !disk.tags.is_empty() {
        out.push_str("tags:\n");
        for (k, v) in &disk.tags {
            out.push_str(&format!("  {k} = {v}\n"));
        }
    }
    if !disk.notes.is_empty() {
        out.push_str(&format!("notes:       {}\n", disk.notes));
    }
    out
}

pub fn render_probe_execution(exec: &ProbeExecution) -> String {
    let mut out = String::new();
    out.push_str(&format!("id:          {}\n", exec.id));
    out.push_str(&format!("device_id:   {}\n", exec.device_id));
    out.push_str(&format!("probe_type:  {}\n", exec.probe_type));
    out.push_str(&format!("status:      {}\n", exec.status));
    if let Some(result) = exec.result {
        out.push_str(&format!("result:      {result}\n"));
    }
    if let Some(percent) = exec.percent_complete {
        out.push_str(&format!("progress:    {percent}%\n"));
    }
    if let Some(msg) = &exec.error_message {
        out.push_str(&format!("error:       {msg}\n"));
    }
    out
}

pub fn render_probe_list(executions: &[ProbeExecution]) -> String {
    if executions.is_empty() {
        return "No probes.".to_string();
    }
    let mut out = String::new();
    out.push_str(&format!(
        "{:<38} {:<24} {:<10} {:<10} {}\n",
        "ID", "DEVICE", "TYPE", "STATUS", "RESULT"
    ));
    for exec in executions {
        out.push_str(&format!(
            "{:<38} {:<24} {:<10} {:<10} {}\n",
            exec.id,
            exec.device_id,
            exec.probe_type,
            exec.status,
            exec.result.map(|r| r.to_string()).unwrap_or_else(|| "-".to_string()),
        ));
    }
    out
}

pub fn render_schedules(schedules: &[ProbeSchedule]) -> String {
    if schedules.is_empty() {
        return "No schedules.".to_string();
    }
    let mut out = String::new();
    out.push_str(&format!(
        "{:<24} {:<20} {:<10} {:<8} {}\n",
        "ID", "CRON", "TYPE", "ENABLED", "NAME"
    ));
    for schedule in schedules {
        out.push_str(&format!(
            "{:<24} {:<20} {:<10} {:<8} {}\n",
            schedule.id,
            schedule.cron,
            schedule.probe_type,
            schedule.enabled,
            schedule.name,
        ));
    }
    out
}

pub fn render_statistics(stats: &Statistics) -> String {
    serde_json::to_string_pretty(stats).unwrap_or_else(|_| format!("{stats:?}"))
}
