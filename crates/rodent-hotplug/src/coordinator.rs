use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rodent_domain::{device_id_from, DeviceId};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use crate::event::{Action, RawEvent};
use crate::monitor::EventMonitor;
use crate::reconciler::{DeviceCacheView, Reconciler};

const EVENT_CALLBACK_TIMEOUT: Duration = Duration::from_secs(30);
const RECONCILE_CALLBACK_TIMEOUT: Duration = Duration::from_secs(120);

/// Manager-provided sink for what the hotplug subsystem observes. The event
/// consumer calls `on_event` per filtered kernel event (device identity
/// resolved the same way Discovery assigns it); the reconciliation
/// consumer calls `on_reconciled` once per pass with the full diff.
#[async_trait]
pub trait HotplugCallbacks: Send + Sync + 'static {
    async fn on_event(&self, device_id: DeviceId, action: Action, device_path: &str);
    async fn on_reconciled(&self, result: &crate::reconciler::ReconciliationResult);
    async fn on_monitor_error(&self, message: &str);
}

/// Joins the Event Monitor, the Reconciliation Loop, and an error channel
/// into three concurrent consumers sharing one cancellation signal.
/// `stop()` blocks until all three have exited.
pub struct Coordinator {
    cancel: CancellationToken,
    tasks: Mutex<Vec<tokio::task::JoinHandle<()>>>,
}

impl Coordinator {
    pub fn new() -> Self {
        Self {
            cancel: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub async fn start<C>(
        &self,
        monitor: EventMonitor,
        reconciler: Reconciler,
        cache: Arc<dyn DeviceCacheView>,
        callbacks: Arc<C>,
    ) where
        C: HotplugCallbacks,
    {
        let (mut events, mut errors, _stats) = monitor.into_parts();
        let mut tasks = self.tasks.lock().await;

        let cancel = self.cancel.clone();
        let cbs = callbacks.clone();
        tasks.push(tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    event = events.recv() => {
                        match event {
                            Some(raw) => dispatch_event(&*cbs, raw).await,
                            None => break,
                        }
                    }
                }
            }
        }));

        let cancel = self.cancel.clone();
        let cbs = callbacks.clone();
        let interval = reconciler.interval;
        tasks.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        match tokio::time::timeout(RECONCILE_CALLBACK_TIMEOUT, reconciler.run_once(&*cache)).await {
                            Ok(Ok(result)) => cbs.on_reconciled(&result).await,
                            Ok(Err(e)) => {
                                error!(error = %e, "reconciliation pass failed");
                                cbs.on_monitor_error(&e.to_string()).await;
                            }
                            Err(_) => {
                                warn!("reconciliation pass exceeded its time bound");
                            }
                        }
                    }
                }
            }
        }));

        let cancel = self.cancel.clone();
        let cbs = callbacks;
        tasks.push(tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    message = errors.recv() => {
                        match message {
                            Some(msg) => {
                                error!(error = %msg, "hotplug event monitor error");
                                cbs.on_monitor_error(&msg).await;
                            }
                            None => break,
                        }
                    }
                }
            }
        }));
    }

    /// Cancels all three consumers and waits for them to exit.
    pub async fn stop(&self) {
        self.cancel.cancel();
        let mut tasks = self.tasks.lock().await;
        for task in tasks.drain(..) {
            let _ = task.await;
        }
    }
}

impl Default for Coordinator {
    fn default() -> Self {
        Self::new()
    }
}

async fn dispatch_event<C: HotplugCallbacks + ?Sized>(callbacks: &C, raw: RawEvent) {
    let serial = raw.property("ID_SERIAL");
    let wwn = raw.property("ID_WWN");
    let short_serial = raw.property("ID_SERIAL_SHORT");
    let device_id = device_id_from(serial, wwn, short_serial, &raw.device_path);

    match tokio::time::timeout(
        EVENT_CALLBACK_TIMEOUT,
        callbacks.on_event(device_id, raw.action, &raw.device_path),
    )
    .await
    {
        Ok(()) => {}
        Err(_) => warn!(device_path = %raw.device_path, "hotplug event callback exceeded its time bound"),
    }
}
