use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::FabricError;

/// Counted admission pool (§4.6). New connections beyond capacity are
/// refused immediately rather than queued.
pub struct AdmissionPool {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

/// Held for the lifetime of one accepted connection; releasing it (via
/// `Drop`) returns the permit to the pool.
pub struct AdmissionPermit(#[allow(dead_code)] OwnedSemaphorePermit);

impl AdmissionPool {
    pub fn new(capacity: usize) -> Self {
        Self { semaphore: Arc::new(Semaphore::new(capacity)), capacity }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Non-blocking: returns `AdmissionRefused` rather than waiting for a
    /// permit to free up.
    pub fn admit(&self) -> Result<AdmissionPermit, FabricError> {
        self.semaphore.clone().try_acquire_owned().map(AdmissionPermit).map_err(|_| FabricError::AdmissionRefused)
    }
}
