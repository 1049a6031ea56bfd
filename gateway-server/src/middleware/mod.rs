pub mod audit_wrapper;
pub mod auth;
pub mod body_limit;
pub mod rate_limit;
pub mod response_id;
pub mod security_headers;
pub mod trusted_host;

pub use auth::AuthContext;
pub use rate_limit::RateLimiter;
