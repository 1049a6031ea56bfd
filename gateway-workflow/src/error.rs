use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("invalid cron expression: {0}")]
    InvalidSchedule(String),

    #[error("definition {0} not found")]
    DefinitionNotFound(String),

    #[error("execution {0} not found")]
    ExecutionNotFound(String),

    #[error("callback signature invalid")]
    SignatureInvalid,

    #[error("callback timestamp outside the replay window")]
    TimestampOutOfWindow,

    #[error("execution exceeded its maximum retry count")]
    MaxRetriesExceeded,

    #[error("upstream workflow service call timed out")]
    Timeout,

    #[error("upstream workflow service error: {0}")]
    DependencyFailure(String),
}
