use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("device path required")]
    DevicePathRequired,

    #[error("device already has an active probe execution")]
    AlreadyActive,

    #[error("no free probe concurrency slot")]
    ConcurrencyLimit,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("probe execution {0} not found")]
    NotFound(String),

    #[error("probe execution {0} is not running")]
    NotRunning(String),

    #[error(transparent)]
    Tool(#[from] rodent_tools::error::ToolError),

    #[error(transparent)]
    Parse(#[from] rodent_tools::error::ParseError),

    #[error(transparent)]
    Store(#[from] rodent_store::StoreError),
}
