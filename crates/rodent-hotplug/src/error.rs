use thiserror::Error;

#[derive(Debug, Error)]
pub enum HotplugError {
    #[error("failed to start kernel event monitor: {0}")]
    MonitorUnavailable(String),

    #[error("discovery failed during reconciliation: {0}")]
    Reconcile(#[from] rodent_discovery::DiscoveryError),
}
