//! Canonical disk enumeration and the derived controller/enclosure/slot
//! topology graph.

pub mod discovery;
pub mod error;
pub mod topology;

pub use discovery::Discovery;
pub use error::{DiscoveryError, TopologyError};
pub use topology::{TopologyMapper, TopologySnapshot};
