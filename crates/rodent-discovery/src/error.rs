use thiserror::Error;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("tool error: {0}")]
    Tool(#[from] rodent_tools::ToolError),

    #[error("parse error: {0}")]
    Parse(#[from] rodent_tools::ParseError),
}

#[derive(Debug, Error)]
pub enum TopologyError {
    #[error("tool error: {0}")]
    Tool(#[from] rodent_tools::ToolError),

    #[error("parse error: {0}")]
    Parse(#[from] rodent_tools::ParseError),
}
