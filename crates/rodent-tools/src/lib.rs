//! Bounded, timeout-guarded invocation of external enumeration/SMART/udev
//! tools, plus the pure parsers that turn their JSON output into typed
//! records. No other crate in the workspace spawns a process directly.

pub mod error;
pub mod executor;
pub mod parsers;

pub use error::{ParseError, ToolError};
pub use executor::{ResolvedTool, ToolExecutor, ToolKind};
pub use parsers::{
    parse_block_devices, parse_enclosure_status, parse_scsi_listing, parse_smart,
    parse_udev_properties, BlockDeviceRecord, EnclosureReading, ScsiAddress,
};
