use thiserror::Error;

#[derive(Debug, Error)]
pub enum FabricError {
    #[error("admission pool at capacity")]
    AdmissionRefused,

    #[error("client outbound buffer exceeded {limit} queued frames")]
    BackpressureExceeded { limit: usize },

    #[error("client {0} not found")]
    ClientNotFound(String),

    #[error("send failed: {0}")]
    SendFailed(String),
}
