//! Structured event construction plus the injected sink boundary to an
//! external event bus. Core logic never depends on the bus being present.

pub mod error;
pub mod event;
pub mod sink;

pub use error::EventError;
pub use event::{Event, EventPayload, Level};
pub use sink::{EventSink, NullSink};
