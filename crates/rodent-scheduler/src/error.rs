use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("invalid cron expression {expression:?}: {source}")]
    InvalidCron {
        expression: String,
        #[source]
        source: cron::error::Error,
    },

    #[error("job scheduler unavailable: {0}")]
    Unavailable(String),

    #[error("schedule {0} is not registered")]
    NotRegistered(String),
}
