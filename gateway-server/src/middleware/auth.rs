//! Bearer-token authentication extractor (§4.8). Pulled in by handlers that
//! require an authenticated caller rather than layered as a blanket
//! middleware, since a handful of routes (login, health, the workflow
//! callback) are intentionally unauthenticated or use a different scheme
//! (HMAC signature) entirely.

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use gateway_auth::{AuthError, Claims, Role};
use gateway_core::UserId;

use crate::error::GatewayError;
use crate::state::AppState;

pub struct AuthContext {
    pub user_id: UserId,
    pub roles: Vec<Role>,
    pub session_id: String,
    pub claims: Claims,
}

impl AuthContext {
    pub fn has_permission(&self, permission: gateway_auth::Permission) -> bool {
        gateway_auth::get_user_permissions(&self.roles).contains(&permission)
    }
}

fn bearer_token(parts: &Parts) -> Result<&str, GatewayError> {
    parts
        .headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(GatewayError::Auth(AuthError::Unauthorized))
}

impl FromRequestParts<Arc<AppState>> for AuthContext {
    type Rejection = GatewayError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;
        let claims = state.auth.decode_token(token)?;
        let session = state.auth.validate_session(&claims.session_id)?;

        Ok(AuthContext {
            user_id: UserId::from(claims.sub.clone()),
            roles: session.roles.clone(),
            session_id: claims.session_id.clone(),
            claims,
        })
    }
}
