use std::str::FromStr;

use chrono::{DateTime, Utc};

use crate::error::WorkflowError;

/// A standard five-field cron expression (minute hour day-of-month month
/// day-of-week). The source system's scheduler only ever asserted daily and
/// weekly forms; this implementation accepts the full grammar via the
/// `cron` crate, which parses a leading seconds field, so every expression
/// is normalized to `"0 {expr}"` before being handed to it.
pub struct CronSchedule {
    inner: cron::Schedule,
}

impl CronSchedule {
    pub fn parse(expr: &str) -> Result<Self, WorkflowError> {
        let normalized = format!("0 {}", expr.trim());
        let inner = cron::Schedule::from_str(&normalized).map_err(|e| WorkflowError::InvalidSchedule(e.to_string()))?;
        Ok(Self { inner })
    }

    /// True if an occurrence falls in the one-minute window ending at `now`,
    /// matching a scheduler polled once per minute (§4.7).
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        let window_start = now - chrono::Duration::minutes(1);
        self.inner.after(&window_start).next().is_some_and(|occurrence| occurrence <= now)
    }

    pub fn next_after(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.inner.after(&now).next()
    }
}
