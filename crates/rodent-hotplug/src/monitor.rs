use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::event::{Action, RawEvent};

/// Counters exposed for observability; all monotonic for the monitor's
/// lifetime.
#[derive(Debug, Default)]
pub struct MonitorStats {
    pub received: AtomicU64,
    pub processed: AtomicU64,
    pub filtered: AtomicU64,
    pub dropped: AtomicU64,
    pub duplicates: AtomicU64,
    pub errors: AtomicU64,
    last_event_at: Mutex<Option<DateTime<Utc>>>,
}

impl MonitorStats {
    pub fn last_event_at(&self) -> Option<DateTime<Utc>> {
        *self.last_event_at.lock().unwrap()
    }

    fn record_event(&self) {
        *self.last_event_at.lock().unwrap() = Some(Utc::now());
    }
}

const CORRELATION_WINDOW: Duration = Duration::from_secs(2);
const CHANNEL_CAPACITY: usize = 256;

/// Subscribes to the kernel's device-event channel for `block` devices and
/// forwards filtered, deduplicated events on a bounded channel.
///
/// On platforms without a kernel event channel (no netlink socket), starts
/// as a no-op: `stats()` stays at zero and the Reconciliation Loop becomes
/// the sole detector.
pub struct EventMonitor {
    receiver: mpsc::Receiver<RawEvent>,
    error_receiver: mpsc::Receiver<String>,
    stats: std::sync::Arc<MonitorStats>,
}

impl EventMonitor {
    /// Starts the monitor. Never fails: a socket that can't be opened is
    /// logged, reported on the error channel, and the monitor degrades to
    /// a no-op producer.
    pub fn start() -> Self {
        let stats = std::sync::Arc::new(MonitorStats::default());
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (err_tx, err_rx) = mpsc::channel(16);

        match udev::MonitorBuilder::new().and_then(|b| b.match_subsystem("block")).and_then(|b| b.listen()) {
            Ok(socket) => {
                let stats = stats.clone();
                std::thread::spawn(move || run_socket_loop(socket, tx, err_tx, stats));
            }
            Err(e) => {
                warn!(error = %e, "kernel event channel unavailable, hotplug monitor degraded to no-op");
                stats.errors.fetch_add(1, Ordering::Relaxed);
                let _ = err_tx.try_send(e.to_string());
            }
        }

        Self { receiver: rx, error_receiver: err_rx, stats }
    }

    pub fn stats(&self) -> std::sync::Arc<MonitorStats> {
        self.stats.clone()
    }

    pub async fn recv(&mut self) -> Option<RawEvent> {
        self.receiver.recv().await
    }

    pub async fn recv_error(&mut self) -> Option<String> {
        self.error_receiver.recv().await
    }

    /// Splits the monitor into its independent event and error streams so
    /// each can be driven by its own consumer task.
    pub fn into_parts(self) -> (mpsc::Receiver<RawEvent>, mpsc::Receiver<String>, std::sync::Arc<MonitorStats>) {
        (self.receiver, self.error_receiver, self.stats)
    }
}

fn action_from_event_type(event_type: udev::EventType) -> Option<Action> {
    match event_type {
        udev::EventType::Add => Some(Action::Add),
        udev::EventType::Remove => Some(Action::Remove),
        udev::EventType::Change => Some(Action::Change),
        udev::EventType::Move => Some(Action::Move),
        udev::EventType::Online => Some(Action::Online),
        udev::EventType::Offline => Some(Action::Offline),
        _ => None,
    }
}

fn run_socket_loop(
    socket: udev::MonitorSocket,
    tx: mpsc::Sender<RawEvent>,
    _err_tx: mpsc::Sender<String>,
    stats: std::sync::Arc<MonitorStats>,
) {
    let mut last_seen: HashMap<(String, &'static str), Instant> = HashMap::new();
    let mut last_sweep = Instant::now();

    for event in socket.iter() {
        stats.received.fetch_add(1, Ordering::Relaxed);
        stats.record_event();

        let Some(action) = action_from_event_type(event.event_type()) else {
            stats.filtered.fetch_add(1, Ordering::Relaxed);
            continue;
        };

        let device = event.device();
        let device_path = device.devnode().map(|p| p.display().to_string()).unwrap_or_default();
        let mut properties = HashMap::new();
        for prop in device.properties() {
            properties.insert(
                prop.name().to_string_lossy().to_string(),
                prop.value().to_string_lossy().to_string(),
            );
        }

        let raw = RawEvent {
            action,
            device_path,
            properties,
            received_at: Utc::now(),
        };

        if !raw.passes_filter() {
            stats.filtered.fetch_add(1, Ordering::Relaxed);
            continue;
        }

        let key = (raw.device_path.clone(), action.as_str());
        let now = Instant::now();
        if let Some(seen_at) = last_seen.get(&key) {
            if now.duration_since(*seen_at) < CORRELATION_WINDOW {
                stats.duplicates.fetch_add(1, Ordering::Relaxed);
                continue;
            }
        }
        last_seen.insert(key, now);

        if now.duration_since(last_sweep) > CORRELATION_WINDOW {
            last_seen.retain(|_, seen_at| now.duration_since(*seen_at) < CORRELATION_WINDOW);
            last_sweep = now;
        }

        match tx.try_send(raw) {
            Ok(()) => {
                stats.processed.fetch_add(1, Ordering::Relaxed);
            }
            Err(_) => {
                stats.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    debug!("kernel event socket closed, hotplug monitor thread exiting");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_rejects_empty_device_path() {
        let event = RawEvent {
            action: Action::Add,
            device_path: String::new(),
            properties: HashMap::new(),
            received_at: Utc::now(),
        };
        assert!(!event.passes_filter());
    }

    #[test]
    fn filter_rejects_non_disk_devtype() {
        let mut properties = HashMap::new();
        properties.insert("DEVTYPE".to_string(), "partition".to_string());
        let event = RawEvent {
            action: Action::Add,
            device_path: "/dev/sda1".into(),
            properties,
            received_at: Utc::now(),
        };
        assert!(!event.passes_filter());
    }

    #[test]
    fn filter_rejects_unhandled_action() {
        let event = RawEvent {
            action: Action::Move,
            device_path: "/dev/sda".into(),
            properties: HashMap::new(),
            received_at: Utc::now(),
        };
        assert!(!event.passes_filter());
    }

    #[test]
    fn filter_accepts_well_formed_disk_add() {
        let mut properties = HashMap::new();
        properties.insert("DEVTYPE".to_string(), "disk".to_string());
        let event = RawEvent {
            action: Action::Add,
            device_path: "/dev/sda".into(),
            properties,
            received_at: Utc::now(),
        };
        assert!(event.passes_filter());
    }
}
