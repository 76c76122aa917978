use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("invalid device id: {0}")]
    InvalidDeviceId(String),

    #[error("invalid state transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("invalid disk filter: {0}")]
    InvalidFilter(String),

    #[error("invalid cron expression: {0}")]
    InvalidCron(String),
}
