//! Kernel hotplug detection: an Event Monitor fed from udev, a disk
//! lifecycle State Machine, a periodic Reconciliation Loop, and the
//! Coordinator that joins them into the Manager's device-cache callbacks.

pub mod coordinator;
pub mod error;
pub mod event;
pub mod monitor;
pub mod reconciler;
pub mod state_machine;

pub use coordinator::{Coordinator, HotplugCallbacks};
pub use error::HotplugError;
pub use event::{Action, RawEvent};
pub use monitor::{EventMonitor, MonitorStats};
pub use reconciler::{DeviceCacheView, Reconciler, ReconciliationResult};
pub use state_machine::{action_implied_state, is_permitted, transition, TransitionError};
