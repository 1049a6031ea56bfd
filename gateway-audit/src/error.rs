use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("audit sink unreachable")]
    SinkUnreachable,

    #[error("integrity check failed at event {event_id}")]
    IntegrityViolation { event_id: String },
}
