//! In-memory username → identity directory. `gateway-auth` verifies
//! credentials and issues tokens but deliberately owns no notion of "which
//! users exist" (§4.3) — that directory belongs to whatever fronts it.
//! A production deployment would back this with a real user store; the
//! demo account below mirrors the original service's local fallback used
//! when no external identity provider is configured.

use dashmap::DashMap;
use gateway_auth::{Role, password};
use gateway_core::UserId;

pub struct UserRecord {
    pub user_id: UserId,
    pub username: String,
    pub password_hash: String,
    pub roles: Vec<Role>,
}

/// Keyed by username, the same key `AuthService::login` uses for lockout
/// and audit correlation.
pub struct UserDirectory {
    by_username: DashMap<String, UserRecord>,
}

impl UserDirectory {
    pub fn new() -> Self {
        let directory = Self { by_username: DashMap::new() };
        directory.seed_demo_account();
        directory
    }

    /// A single bootstrap administrator, matching the demo credentials the
    /// original service falls back to when no external identity provider
    /// is wired up.
    fn seed_demo_account(&self) {
        let hash = password::hash_password("SecurePassword123!").expect("demo password meets policy");
        self.by_username.insert(
            "admin".to_string(),
            UserRecord { user_id: UserId::generate(), username: "admin".to_string(), password_hash: hash, roles: vec![Role::Admin] },
        );
    }

    pub fn find(&self, username: &str) -> Option<UserRecord> {
        self.by_username.get(username).map(|entry| UserRecord {
            user_id: entry.user_id.clone(),
            username: entry.username.clone(),
            password_hash: entry.password_hash.clone(),
            roles: entry.roles.clone(),
        })
    }
}

impl Default for UserDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_admin_account_is_found_by_username() {
        let directory = UserDirectory::new();
        let record = directory.find("admin").unwrap();
        assert_eq!(record.roles, vec![Role::Admin]);
        assert!(password::verify_password("SecurePassword123!", &record.password_hash));
    }

    #[test]
    fn unknown_username_is_absent() {
        let directory = UserDirectory::new();
        assert!(directory.find("nobody").is_none());
    }
}
