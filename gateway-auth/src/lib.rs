//! Password hashing, JWT issuance/revocation, session store, lockout, and
//! RBAC for the conversational analytics gateway.

pub mod error;
pub mod lockout;
pub mod password;
pub mod rbac;
pub mod session;
pub mod token;

use std::sync::Arc;

use gateway_core::clock::Clock;
use gateway_core::ids::UserId;

pub use error::AuthError;
pub use rbac::{Permission, Role, get_user_permissions, permissions_for_role};
pub use session::Session;
pub use token::{Claims, TokenType};

use lockout::LockoutTracker;
use session::SessionStore;
use token::TokenService;

/// Result of a successful login: the issued token pair plus the session
/// they're bound to.
pub struct LoginOutcome {
    pub access_token: String,
    pub refresh_token: String,
    pub session: Session,
}

/// Ties together password verification, lockout tracking, session
/// management, and token issuance behind a single entry point, the way a
/// caller at the HTTP boundary (C8) would use it.
pub struct AuthService<C: Clock> {
    clock: Arc<C>,
    tokens: TokenService<C>,
    sessions: SessionStore<C>,
    lockout: LockoutTracker<C>,
}

impl<C: Clock> AuthService<C> {
    pub fn new(jwt_secret: &[u8], clock: Arc<C>, session_idle_timeout: chrono::Duration) -> Self {
        Self {
            tokens: TokenService::new(jwt_secret, clock.clone()),
            sessions: SessionStore::new(clock.clone(), session_idle_timeout),
            lockout: LockoutTracker::new(clock.clone()),
            clock,
        }
    }

    /// Verifies credentials against a pre-fetched stored hash, honoring
    /// lockout state, and on success creates a session and issues a token
    /// pair. Failure paths never reveal whether the username or password
    /// was the problem.
    pub fn login(
        &self,
        user_id: &UserId,
        username_key: &str,
        plaintext_password: &str,
        stored_password_hash: &str,
        roles: &[Role],
    ) -> Result<LoginOutcome, AuthError> {
        self.lockout.check_lockout(username_key)?;

        if !password::verify_password(plaintext_password, stored_password_hash) {
            self.lockout.record_failed_attempt(username_key);
            return Err(AuthError::InvalidCredentials);
        }

        self.lockout.clear_failed_attempts(username_key);
        let session = self.sessions.create_session(user_id, roles);
        let (access_token, _) = self.tokens.create_access_token(user_id, roles, &session.session_id)?;
        let (refresh_token, _) = self.tokens.create_refresh_token(user_id, roles, &session.session_id)?;

        Ok(LoginOutcome { access_token, refresh_token, session })
    }

    pub fn decode_token(&self, token: &str) -> Result<Claims, AuthError> {
        self.tokens.decode_token(token)
    }

    /// Exchanges a still-valid refresh token for a fresh access/refresh
    /// pair, without re-checking credentials (§6 `POST .../refresh`). The
    /// old refresh token is revoked so it can't be replayed.
    pub fn refresh(&self, refresh_token: &str) -> Result<LoginOutcome, AuthError> {
        let claims = self.tokens.decode_token(refresh_token)?;
        if claims.token_type != TokenType::Refresh {
            return Err(AuthError::Unauthorized);
        }
        let session = self.sessions.validate_session(&claims.session_id)?;
        self.tokens.revoke_token(&claims);

        let (access_token, _) = self.tokens.create_access_token(&session.user_id, &session.roles, &session.session_id)?;
        let (new_refresh_token, _) =
            self.tokens.create_refresh_token(&session.user_id, &session.roles, &session.session_id)?;

        Ok(LoginOutcome { access_token, refresh_token: new_refresh_token, session })
    }

    pub fn revoke_token(&self, claims: &Claims) {
        self.tokens.revoke_token(claims)
    }

    pub fn validate_session(&self, session_id: &str) -> Result<Session, AuthError> {
        self.sessions.validate_session(session_id)
    }

    pub fn terminate_session(&self, session_id: &str) {
        self.sessions.terminate_session(session_id)
    }

    pub fn terminate_all_sessions(&self, user_id: &UserId) {
        self.sessions.terminate_all_sessions(user_id)
    }

    pub fn sweep_expired_blacklist(&self) {
        self.tokens.sweep_expired_blacklist()
    }

    pub fn clock(&self) -> &Arc<C> {
        &self.clock
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_core::clock::FrozenClock;

    fn service() -> AuthService<FrozenClock> {
        let clock = Arc::new(FrozenClock::at(chrono::DateTime::from_timestamp(0, 0).unwrap()));
        AuthService::new(b"test-secret-key-material", clock, chrono::Duration::minutes(30))
    }

    #[test]
    fn login_with_correct_password_issues_tokens_and_session() {
        let svc = service();
        let user_id = UserId::generate();
        let stored_hash = password::hash_password("Correct-Horse9!").unwrap();

        let outcome = svc
            .login(&user_id, "alice", "Correct-Horse9!", &stored_hash, &[Role::Analyst])
            .unwrap();

        let claims = svc.decode_token(&outcome.access_token).unwrap();
        assert_eq!(claims.sub, user_id.as_str());
        assert!(svc.validate_session(outcome.session.session_id.as_str()).is_ok());
    }

    #[test]
    fn repeated_failures_lock_the_account() {
        let svc = service();
        let user_id = UserId::generate();
        let stored_hash = password::hash_password("Correct-Horse9!").unwrap();

        for _ in 0..5 {
            let result = svc.login(&user_id, "bob", "wrong-password", &stored_hash, &[Role::Viewer]);
            assert!(result.is_err());
        }

        let result = svc.login(&user_id, "bob", "Correct-Horse9!", &stored_hash, &[Role::Viewer]);
        assert!(matches!(result, Err(AuthError::AccountLocked { .. })));
    }

    #[test]
    fn logout_revokes_token_and_terminates_session() {
        let svc = service();
        let user_id = UserId::generate();
        let stored_hash = password::hash_password("Correct-Horse9!").unwrap();
        let outcome = svc
            .login(&user_id, "carol", "Correct-Horse9!", &stored_hash, &[Role::Developer])
            .unwrap();

        let claims = svc.decode_token(&outcome.access_token).unwrap();
        svc.revoke_token(&claims);
        svc.terminate_session(outcome.session.session_id.as_str());

        assert!(svc.decode_token(&outcome.access_token).is_err());
        assert!(svc.validate_session(outcome.session.session_id.as_str()).is_err());
    }

    #[test]
    fn refresh_issues_new_tokens_and_revokes_the_old_refresh_token() {
        let svc = service();
        let user_id = UserId::generate();
        let stored_hash = password::hash_password("Correct-Horse9!").unwrap();
        let outcome = svc
            .login(&user_id, "dave", "Correct-Horse9!", &stored_hash, &[Role::Viewer])
            .unwrap();

        let refreshed = svc.refresh(&outcome.refresh_token).unwrap();
        assert_ne!(refreshed.access_token, outcome.access_token);
        assert!(svc.decode_token(&refreshed.access_token).is_ok());
        assert!(matches!(svc.refresh(&outcome.refresh_token), Err(AuthError::Unauthorized)));
    }

    #[test]
    fn refresh_rejects_an_access_token() {
        let svc = service();
        let user_id = UserId::generate();
        let stored_hash = password::hash_password("Correct-Horse9!").unwrap();
        let outcome = svc
            .login(&user_id, "erin", "Correct-Horse9!", &stored_hash, &[Role::Viewer])
            .unwrap();

        assert!(matches!(svc.refresh(&outcome.access_token), Err(AuthError::Unauthorized)));
    }
}
