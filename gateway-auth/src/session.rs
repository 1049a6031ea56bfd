use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use gateway_core::clock::Clock;
use gateway_core::ids::{SessionId, UserId};

use crate::error::AuthError;
use crate::rbac::Role;

/// A logged-in session: identity plus the idle-timeout bookkeeping needed to
/// expire it without a background sweep on every lookup.
#[derive(Debug, Clone)]
pub struct Session {
    pub session_id: SessionId,
    pub user_id: UserId,
    pub roles: Vec<Role>,
    pub created_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
}

/// Concurrent session store keyed by session id, with a secondary index
/// from user to their session ids so `terminate_all_sessions` doesn't need
/// a full scan. Mirrors the `inmemory.rs` composite-key / `Arc<RwLock<..>>`
/// shape but uses `dashmap` for finer-grained locking, as gateway-auth
/// already depends on it for the token blacklist.
pub struct SessionStore<C: Clock> {
    clock: Arc<C>,
    idle_timeout: chrono::Duration,
    sessions: DashMap<String, Session>,
    by_user: DashMap<String, Vec<String>>,
}

impl<C: Clock> SessionStore<C> {
    pub fn new(clock: Arc<C>, idle_timeout: chrono::Duration) -> Self {
        Self {
            clock,
            idle_timeout,
            sessions: DashMap::new(),
            by_user: DashMap::new(),
        }
    }

    pub fn create_session(&self, user_id: &UserId, roles: &[Role]) -> Session {
        let now = self.clock.now();
        let session = Session {
            session_id: SessionId::generate(),
            user_id: user_id.clone(),
            roles: roles.to_vec(),
            created_at: now,
            last_active_at: now,
        };
        self.sessions.insert(session.session_id.as_str().to_string(), session.clone());
        self.by_user
            .entry(user_id.as_str().to_string())
            .or_default()
            .push(session.session_id.as_str().to_string());
        session
    }

    /// Looks up a session, rejecting it if idle too long, and otherwise
    /// refreshes its last-activity timestamp (the TTL-refresh-on-read
    /// pattern the original service applies to its Redis session keys).
    pub fn validate_session(&self, session_id: &str) -> Result<Session, AuthError> {
        let now = self.clock.now();
        let mut entry = self.sessions.get_mut(session_id).ok_or(AuthError::SessionExpired)?;
        if now - entry.last_active_at > self.idle_timeout {
            drop(entry);
            self.sessions.remove(session_id);
            return Err(AuthError::SessionExpired);
        }
        entry.last_active_at = now;
        Ok(entry.clone())
    }

    pub fn terminate_session(&self, session_id: &str) {
        if let Some((_, session)) = self.sessions.remove(session_id) {
            if let Some(mut ids) = self.by_user.get_mut(session.user_id.as_str()) {
                ids.retain(|id| id != session_id);
            }
        }
    }

    /// Terminates every session belonging to a user, for password resets
    /// or administrative revocation.
    pub fn terminate_all_sessions(&self, user_id: &UserId) {
        if let Some((_, ids)) = self.by_user.remove(user_id.as_str()) {
            for id in ids {
                self.sessions.remove(&id);
            }
        }
    }

    pub fn active_session_count(&self, user_id: &UserId) -> usize {
        self.by_user.get(user_id.as_str()).map(|ids| ids.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_core::clock::FrozenClock;

    fn store() -> (Arc<FrozenClock>, SessionStore<FrozenClock>) {
        let clock = Arc::new(FrozenClock::at(DateTime::from_timestamp(0, 0).unwrap()));
        let store = SessionStore::new(clock.clone(), chrono::Duration::minutes(30));
        (clock, store)
    }

    #[test]
    fn create_then_validate_succeeds() {
        let (_clock, store) = store();
        let user_id = UserId::generate();
        let session = store.create_session(&user_id, &[Role::Analyst]);
        let validated = store.validate_session(session.session_id.as_str()).unwrap();
        assert_eq!(validated.user_id, user_id);
    }

    #[test]
    fn idle_session_expires() {
        let (clock, store) = store();
        let user_id = UserId::generate();
        let session = store.create_session(&user_id, &[Role::Viewer]);
        clock.advance(chrono::Duration::minutes(31));
        assert!(matches!(
            store.validate_session(session.session_id.as_str()),
            Err(AuthError::SessionExpired)
        ));
    }

    #[test]
    fn activity_refreshes_idle_window() {
        let (clock, store) = store();
        let user_id = UserId::generate();
        let session = store.create_session(&user_id, &[Role::Viewer]);
        clock.advance(chrono::Duration::minutes(20));
        store.validate_session(session.session_id.as_str()).unwrap();
        clock.advance(chrono::Duration::minutes(20));
        assert!(store.validate_session(session.session_id.as_str()).is_ok());
    }

    #[test]
    fn terminate_all_sessions_clears_every_session_for_user() {
        let (_clock, store) = store();
        let user_id = UserId::generate();
        let s1 = store.create_session(&user_id, &[Role::Viewer]);
        let s2 = store.create_session(&user_id, &[Role::Viewer]);
        store.terminate_all_sessions(&user_id);
        assert!(store.validate_session(s1.session_id.as_str()).is_err());
        assert!(store.validate_session(s2.session_id.as_str()).is_err());
        assert_eq!(store.active_session_count(&user_id), 0);
    }

    #[test]
    fn terminate_single_session_leaves_others_intact() {
        let (_clock, store) = store();
        let user_id = UserId::generate();
        let s1 = store.create_session(&user_id, &[Role::Viewer]);
        let s2 = store.create_session(&user_id, &[Role::Viewer]);
        store.terminate_session(s1.session_id.as_str());
        assert!(store.validate_session(s1.session_id.as_str()).is_err());
        assert!(store.validate_session(s2.session_id.as_str()).is_ok());
    }
}
