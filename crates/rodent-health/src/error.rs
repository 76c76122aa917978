use thiserror::Error;

#[derive(Debug, Error)]
pub enum HealthError {
    #[error("tool error: {0}")]
    Tool(#[from] rodent_tools::ToolError),

    #[error("parse error: {0}")]
    Parse(#[from] rodent_tools::ParseError),
}
