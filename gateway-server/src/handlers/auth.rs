//! `POST /api/v1/auth/{login,logout,refresh}` (§6): credential exchange,
//! session teardown, and refresh-token rotation, each wrapped in its own
//! `auth.*` audit event the way the original service's login route logs
//! both successes and failures.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use gateway_audit::{Actor, EventType, NewEvent, Outcome, Severity};
use serde::{Deserialize, Serialize};

use super::ApiResult;
use crate::error::GatewayError;
use crate::middleware::AuthContext;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    pub session_id: String,
}

pub async fn login(State(state): State<Arc<AppState>>, Json(body): Json<LoginRequest>) -> ApiResult<TokenPair> {
    let Some(record) = state.users.find(&body.username) else {
        state.audit.log_event(
            EventType::AuthLoginFailure,
            format!("login attempt for unknown user '{}'", body.username),
            Outcome::Failure,
            Severity::Medium,
            NewEvent::default(),
        );
        return Err(GatewayError::Auth(gateway_auth::AuthError::InvalidCredentials));
    };

    let outcome = state.auth.login(&record.user_id, &body.username, &body.password, &record.password_hash, &record.roles);

    match outcome {
        Ok(login) => {
            state.audit.log_event(
                EventType::AuthLoginSuccess,
                format!("'{}' logged in", body.username),
                Outcome::Success,
                Severity::Info,
                NewEvent {
                    actor: Actor {
                        user_id: Some(record.user_id.as_str().to_string()),
                        username: Some(body.username.clone()),
                        session_id: Some(login.session.session_id.as_str().to_string()),
                        ..Default::default()
                    },
                    ..Default::default()
                },
            );
            Ok(Json(TokenPair {
                access_token: login.access_token,
                refresh_token: login.refresh_token,
                token_type: "Bearer",
                session_id: login.session.session_id.as_str().to_string(),
            }))
        }
        Err(err) => {
            let severity = if matches!(err, gateway_auth::AuthError::AccountLocked { .. }) { Severity::High } else { Severity::Medium };
            state.audit.log_event(
                EventType::AuthLoginFailure,
                format!("login failed for '{}'", body.username),
                Outcome::Failure,
                severity,
                NewEvent {
                    actor: Actor { user_id: Some(record.user_id.as_str().to_string()), username: Some(body.username), ..Default::default() },
                    ..Default::default()
                },
            );
            Err(GatewayError::Auth(err))
        }
    }
}

#[derive(Serialize)]
pub struct LogoutResponse {
    pub status: &'static str,
}

pub async fn logout(State(state): State<Arc<AppState>>, auth: AuthContext) -> ApiResult<LogoutResponse> {
    state.auth.revoke_token(&auth.claims);
    state.auth.terminate_session(&auth.session_id);

    state.audit.log_event(
        EventType::AuthLogout,
        "session terminated by caller",
        Outcome::Success,
        Severity::Info,
        NewEvent {
            actor: Actor { user_id: Some(auth.user_id.as_str().to_string()), session_id: Some(auth.session_id), ..Default::default() },
            ..Default::default()
        },
    );

    Ok(Json(LogoutResponse { status: "logged_out" }))
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

pub async fn refresh(State(state): State<Arc<AppState>>, Json(body): Json<RefreshRequest>) -> ApiResult<TokenPair> {
    let login = state.auth.refresh(&body.refresh_token)?;

    state.audit.log_event(
        EventType::AuthSessionCreated,
        "access token refreshed",
        Outcome::Success,
        Severity::Info,
        NewEvent {
            actor: Actor {
                user_id: Some(login.session.user_id.as_str().to_string()),
                session_id: Some(login.session.session_id.as_str().to_string()),
                ..Default::default()
            },
            ..Default::default()
        },
    );

    Ok(Json(TokenPair {
        access_token: login.access_token,
        refresh_token: login.refresh_token,
        token_type: "Bearer",
        session_id: login.session.session_id.as_str().to_string(),
    }))
}
