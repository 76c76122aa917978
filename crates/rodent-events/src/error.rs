use thiserror::Error;

#[derive(Debug, Error)]
pub enum EventError {
    #[error("event bus unavailable: {0}")]
    BusUnavailable(String),
}
