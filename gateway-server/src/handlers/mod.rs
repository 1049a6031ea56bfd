pub mod audit;
pub mod auth;
pub mod chat;
pub mod compliance;
pub mod health;
pub mod metrics;
pub mod privacy;
pub mod query;
pub mod workflows;
pub mod ws;

use axum::Json;

use crate::error::GatewayError;

pub type ApiResult<T> = Result<Json<T>, GatewayError>;
