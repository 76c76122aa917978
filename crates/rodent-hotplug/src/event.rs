use std::collections::HashMap;

use chrono::{DateTime, Utc};

/// One of the kernel actions the Event Monitor understands. Actions outside
/// this set (`bind`, `unbind`, …) are filtered before they ever reach a
/// `RawEvent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Add,
    Remove,
    Change,
    Move,
    Online,
    Offline,
}

impl Action {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "add" => Some(Action::Add),
            "remove" => Some(Action::Remove),
            "change" => Some(Action::Change),
            "move" => Some(Action::Move),
            "online" => Some(Action::Online),
            "offline" => Some(Action::Offline),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Add => "add",
            Action::Remove => "remove",
            Action::Change => "change",
            Action::Move => "move",
            Action::Online => "online",
            Action::Offline => "offline",
        }
    }
}

/// A single kernel device event, after the raw netlink record has been
/// decoded into its action and property map.
#[derive(Debug, Clone)]
pub struct RawEvent {
    pub action: Action,
    pub device_path: String,
    pub properties: HashMap<String, String>,
    pub received_at: DateTime<Utc>,
}

impl RawEvent {
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn dev_type(&self) -> Option<&str> {
        self.property("DEVTYPE")
    }

    /// Whether this event passes the Event Monitor's pre-dedup filter:
    /// a non-empty device path, a disk dev type, and an action the
    /// Reconciler/Manager act on.
    pub fn passes_filter(&self) -> bool {
        if self.device_path.is_empty() {
            return false;
        }
        if !matches!(self.dev_type(), Some("disk") | None) {
            return false;
        }
        matches!(self.action, Action::Add | Action::Remove | Action::Change)
    }
}
