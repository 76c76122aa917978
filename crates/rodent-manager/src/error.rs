use thiserror::Error;

/// Every Manager operation's failure surface. Each subordinate crate's
/// error type is wrapped verbatim rather than flattened, so callers that
/// care can match through to the originating layer.
#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("config error: {0}")]
    Config(#[from] rodent_config::ConfigError),

    #[error("state store error: {0}")]
    Store(#[from] rodent_store::StoreError),

    #[error("discovery error: {0}")]
    Discovery(#[from] rodent_discovery::DiscoveryError),

    #[error("topology error: {0}")]
    Topology(#[from] rodent_discovery::TopologyError),

    #[error("health error: {0}")]
    Health(#[from] rodent_health::HealthError),

    #[error("hotplug error: {0}")]
    Hotplug(#[from] rodent_hotplug::HotplugError),

    #[error("probe error: {0}")]
    Probe(#[from] rodent_probe::ProbeError),

    #[error("scheduler error: {0}")]
    Scheduler(#[from] rodent_scheduler::SchedulerError),

    #[error("tool error: {0}")]
    Tool(#[from] rodent_tools::ToolError),

    #[error("operation timed out: {0}")]
    Timeout(String),
}

impl ManagerError {
    /// Coarse tag matching spec's language-neutral error-kind taxonomy,
    /// for adapters that need a stable string to surface to callers.
    pub fn kind(&self) -> &'static str {
        match self {
            ManagerError::NotFound(_) => "NotFound",
            ManagerError::Validation(_) | ManagerError::Config(_) => "Validation",
            ManagerError::Store(_) => "PersistenceFailure",
            ManagerError::Discovery(_) | ManagerError::Topology(_) | ManagerError::Health(_) => "ToolFailure",
            ManagerError::Hotplug(_) => "ToolFailure",
            ManagerError::Probe(probe_error) => probe_kind(probe_error),
            ManagerError::Scheduler(_) => "Validation",
            ManagerError::Tool(_) => "ToolUnavailable",
            ManagerError::Timeout(_) => "Timeout",
        }
    }
}

fn probe_kind(e: &rodent_probe::ProbeError) -> &'static str {
    use rodent_probe::ProbeError::*;
    match e {
        DevicePathRequired => "Validation",
        AlreadyActive => "Conflict",
        ConcurrencyLimit => "ConcurrencyLimit",
        Conflict(_) => "Conflict",
        NotFound(_) => "NotFound",
        NotRunning(_) => "Validation",
        Tool(_) => "ToolFailure",
        Parse(_) => "ParseFailure",
        Store(_) => "PersistenceFailure",
    }
}
