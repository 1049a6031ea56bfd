use thiserror::Error;

/// Authentication/authorization failures, mapped by the HTTP surface to the
/// status codes in §7. Authorization failures are intentionally generic —
/// the caller must not learn whether a missing permission or a missing
/// resource caused the denial.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("account locked, retry in {retry_after_secs}s")]
    AccountLocked { retry_after_secs: u64 },

    #[error("password does not meet policy requirements")]
    WeakPassword,

    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden")]
    Forbidden,

    #[error("session not found or expired")]
    SessionExpired,
}
