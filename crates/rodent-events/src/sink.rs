use async_trait::async_trait;
use tracing::debug;

use crate::event::Event;
use crate::error::EventError;

/// External event bus boundary. The core never depends on a bus being
/// present — constructing a `NullSink` keeps every call site unconditional.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn emit(&self, event: Event) -> Result<(), EventError>;
}

/// Default sink used when no external bus is configured: logs at debug
/// and drops the event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

#[async_trait]
impl EventSink for NullSink {
    async fn emit(&self, event: Event) -> Result<(), EventError> {
        debug!(event_id = %event.id, kind = ?event.payload, "event dropped, no sink configured");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventPayload;
    use rodent_domain::DeviceId;

    #[tokio::test]
    async fn null_sink_never_fails() {
        let sink = NullSink;
        let event = Event::new(
            "test",
            EventPayload::DiskDiscovered {
                device_id: DeviceId::new("d1"),
            },
        );
        assert!(sink.emit(event).await.is_ok());
    }
}
