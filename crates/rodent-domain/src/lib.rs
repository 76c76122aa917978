//! Core domain types for the disk-management agent: device identity, the
//! disk lifecycle vocabulary, SMART data shapes, and the derived topology
//! aggregates. No I/O lives here — every other crate in the workspace
//! builds on these types.

pub mod disk;
pub mod enums;
pub mod error;
pub mod identity;
pub mod ids;
pub mod probe;
pub mod smart;

pub use disk::{Controller, Disk, DiskPaths, Enclosure, EnclosureStatus, PoolLinkage, Slot, TopologyRef};
pub use enums::{DeviceType, DiskState, Health, Interface, ProbeResult, ProbeStatus, ProbeType};
pub use error::DomainError;
pub use identity::device_id_from;
pub use ids::{ControllerId, DeviceId, EnclosureId, OperationId, ProbeId, ScheduleId};
pub use probe::{DiskFilter, ProbeExecution, ProbeSchedule, ProbeTrigger, RetryPolicy};
pub use smart::{AtaAttribute, AtaSmart, NvmeSmart, SmartBody, SmartSnapshot, SmartThresholds};
