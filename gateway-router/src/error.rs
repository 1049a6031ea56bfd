use thiserror::Error;

/// Internal dispatch failures. Per §4.5's failure model, none of these ever
/// reach the router's caller — `Router::chat` always returns a reply
/// string, falling back to a deterministic message on any of these.
#[derive(Debug, Error)]
pub enum RouterError {
    #[error("upstream request timed out")]
    Timeout,

    #[error("upstream returned non-2xx status {status}")]
    UpstreamStatus { status: u16 },

    #[error("upstream transport error: {0}")]
    Transport(String),
}
