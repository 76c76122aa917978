use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("required tool '{0}' not found on PATH")]
    NotAvailable(String),

    #[error("tool '{tool}' exited with status {status}: {stderr}")]
    NonZeroExit {
        tool: String,
        status: i32,
        stderr: String,
    },

    #[error("tool '{tool}' timed out after {timeout_seconds}s")]
    Timeout { tool: String, timeout_seconds: u64 },

    #[error("failed to spawn tool '{tool}': {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("failed to parse {kind} output for device {device}: {message}")]
    Malformed {
        kind: String,
        device: String,
        message: String,
    },
}
