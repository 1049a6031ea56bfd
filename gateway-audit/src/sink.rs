use crate::error::AuditError;
use crate::event::AuditEvent;

/// The optional external destination batches (or immediate-bypass events)
/// are forwarded to — an analogue of the original service's Splunk/ELK/Azure
/// Monitor endpoint. Kept as a trait seam so tests can assert on what would
/// have been sent without a real HTTP egress.
pub trait AuditSink: Send + Sync {
    fn send_batch(&self, events: &[AuditEvent]) -> Result<(), AuditError>;
}

/// No external sink configured: every send is a no-op success, matching the
/// original service's `if not self.external_endpoint: return`.
pub struct NullSink;

impl AuditSink for NullSink {
    fn send_batch(&self, _events: &[AuditEvent]) -> Result<(), AuditError> {
        Ok(())
    }
}

#[cfg(test)]
pub struct RecordingSink {
    pub sent: std::sync::Mutex<Vec<AuditEvent>>,
}

#[cfg(test)]
impl RecordingSink {
    pub fn new() -> Self {
        Self { sent: std::sync::Mutex::new(Vec::new()) }
    }
}

#[cfg(test)]
impl AuditSink for RecordingSink {
    fn send_batch(&self, events: &[AuditEvent]) -> Result<(), AuditError> {
        self.sent.lock().unwrap().extend_from_slice(events);
        Ok(())
    }
}

#[cfg(test)]
pub struct AlwaysFailingSink;

#[cfg(test)]
impl AuditSink for AlwaysFailingSink {
    fn send_batch(&self, _events: &[AuditEvent]) -> Result<(), AuditError> {
        Err(AuditError::SinkUnreachable)
    }
}
