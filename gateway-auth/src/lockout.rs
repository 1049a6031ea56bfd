use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use gateway_core::clock::Clock;

use crate::error::AuthError;

/// Failures are forgotten after this long without a new one (§4.3).
const ATTEMPT_WINDOW_MINUTES: i64 = 30;
/// Attempts within the window before the account locks.
const MAX_FAILED_ATTEMPTS: u32 = 5;
/// How long a lockout lasts once triggered.
const LOCKOUT_DURATION_MINUTES: i64 = 30;

struct AttemptRecord {
    count: u32,
    window_started_at: DateTime<Utc>,
    locked_until: Option<DateTime<Utc>>,
}

/// Tracks failed login attempts per user and enforces a rolling lockout,
/// matching the original service's `MAX_LOGIN_ATTEMPTS`/`LOCKOUT_DURATION_MINUTES`.
pub struct LockoutTracker<C: Clock> {
    clock: Arc<C>,
    attempts: DashMap<String, AttemptRecord>,
}

impl<C: Clock> LockoutTracker<C> {
    pub fn new(clock: Arc<C>) -> Self {
        Self { clock, attempts: DashMap::new() }
    }

    /// Returns an error if the account is currently locked out.
    pub fn check_lockout(&self, user_key: &str) -> Result<(), AuthError> {
        let now = self.clock.now();
        if let Some(record) = self.attempts.get(user_key) {
            if let Some(locked_until) = record.locked_until {
                if now < locked_until {
                    let retry_after_secs = (locked_until - now).num_seconds().max(0) as u64;
                    return Err(AuthError::AccountLocked { retry_after_secs });
                }
            }
        }
        Ok(())
    }

    /// Records a failed attempt, resetting the rolling window if it has
    /// expired, and locks the account once the threshold is reached.
    pub fn record_failed_attempt(&self, user_key: &str) {
        let now = self.clock.now();
        let mut record = self.attempts.entry(user_key.to_string()).or_insert_with(|| AttemptRecord {
            count: 0,
            window_started_at: now,
            locked_until: None,
        });

        if now - record.window_started_at > chrono::Duration::minutes(ATTEMPT_WINDOW_MINUTES) {
            record.count = 0;
            record.window_started_at = now;
            record.locked_until = None;
        }

        record.count += 1;
        if record.count >= MAX_FAILED_ATTEMPTS {
            record.locked_until = Some(now + chrono::Duration::minutes(LOCKOUT_DURATION_MINUTES));
        }
    }

    /// Clears all tracked failures for a user, called on successful login.
    pub fn clear_failed_attempts(&self, user_key: &str) {
        self.attempts.remove(user_key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_core::clock::FrozenClock;

    fn tracker() -> (Arc<FrozenClock>, LockoutTracker<FrozenClock>) {
        let clock = Arc::new(FrozenClock::at(DateTime::from_timestamp(0, 0).unwrap()));
        let tracker = LockoutTracker::new(clock.clone());
        (clock, tracker)
    }

    #[test]
    fn allows_attempts_under_threshold() {
        let (_clock, tracker) = tracker();
        for _ in 0..4 {
            tracker.record_failed_attempt("user-1");
        }
        assert!(tracker.check_lockout("user-1").is_ok());
    }

    #[test]
    fn locks_after_threshold_reached() {
        let (_clock, tracker) = tracker();
        for _ in 0..5 {
            tracker.record_failed_attempt("user-1");
        }
        assert!(matches!(
            tracker.check_lockout("user-1"),
            Err(AuthError::AccountLocked { .. })
        ));
    }

    #[test]
    fn lockout_clears_after_duration_elapses() {
        let (clock, tracker) = tracker();
        for _ in 0..5 {
            tracker.record_failed_attempt("user-1");
        }
        assert!(tracker.check_lockout("user-1").is_err());
        clock.advance(chrono::Duration::minutes(LOCKOUT_DURATION_MINUTES + 1));
        assert!(tracker.check_lockout("user-1").is_ok());
    }

    #[test]
    fn successful_login_clears_attempts() {
        let (_clock, tracker) = tracker();
        for _ in 0..4 {
            tracker.record_failed_attempt("user-1");
        }
        tracker.clear_failed_attempts("user-1");
        assert!(tracker.check_lockout("user-1").is_ok());
    }

    #[test]
    fn stale_window_resets_count() {
        let (clock, tracker) = tracker();
        for _ in 0..4 {
            tracker.record_failed_attempt("user-1");
        }
        clock.advance(chrono::Duration::minutes(ATTEMPT_WINDOW_MINUTES + 1));
        tracker.record_failed_attempt("user-1");
        assert!(tracker.check_lockout("user-1").is_ok());
    }
}
