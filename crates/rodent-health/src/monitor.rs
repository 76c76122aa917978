use std::sync::Arc;

use rodent_domain::{DeviceId, Health, SmartSnapshot, SmartThresholds};
use rodent_tools::{parse_smart, ToolExecutor, ToolKind};
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::classify::classify;
use crate::error::HealthError;

/// One disk's SMART read outcome, or the error the monitor swallowed on
/// its behalf (a per-device error never aborts the sweep).
pub struct HealthReading {
    pub device_id: DeviceId,
    pub snapshot: SmartSnapshot,
    pub health: Health,
    pub reason: String,
}

/// Reads SMART data for a batch of devices with bounded concurrency
/// (default 4 parallel reads) and classifies each against thresholds.
/// A per-device read or parse failure is logged and that device is
/// skipped; other devices are unaffected.
pub struct HealthMonitor {
    executor: Arc<ToolExecutor>,
    semaphore: Arc<Semaphore>,
    thresholds: SmartThresholds,
}

impl HealthMonitor {
    pub fn new(executor: Arc<ToolExecutor>, concurrency: usize, thresholds: SmartThresholds) -> Self {
        Self {
            executor,
            semaphore: Arc::new(Semaphore::new(concurrency.max(1))),
            thresholds,
        }
    }

    pub async fn sweep(&self, targets: &[(DeviceId, String)]) -> Result<Vec<HealthReading>, HealthError> {
        let mut handles = Vec::with_capacity(targets.len());
        for (device_id, path) in targets {
            let executor = self.executor.clone();
            let semaphore = self.semaphore.clone();
            let thresholds = self.thresholds.clone();
            let device_id = device_id.clone();
            let path = path.clone();

            handles.push(tokio::spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return None,
                };
                match read_one(&executor, &device_id, &path, &thresholds).await {
                    Ok(reading) => Some(reading),
                    Err(e) => {
                        warn!(device = %device_id, error = %e, "SMART read failed, skipping device");
                        None
                    }
                }
            }));
        }

        let mut readings = Vec::new();
        for handle in handles {
            if let Ok(Some(reading)) = handle.await {
                readings.push(reading);
            }
        }
        Ok(readings)
    }
}

async fn read_one(
    executor: &ToolExecutor,
    device_id: &DeviceId,
    path: &str,
    thresholds: &SmartThresholds,
) -> Result<HealthReading, HealthError> {
    let raw = executor
        .run(ToolKind::SmartUtility, &["-a", "-j", path], None, false)
        .await?;
    let snapshot = parse_smart(&raw, path)?;
    let (health, reason) = classify(&snapshot, thresholds);
    debug!(device = %device_id, %health, "SMART classification complete");
    Ok(HealthReading {
        device_id: device_id.clone(),
        snapshot,
        health,
        reason,
    })
}
