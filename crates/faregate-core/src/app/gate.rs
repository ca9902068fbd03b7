//! AdmissionGate - 同時実行数の上限を守る permit プール

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::SchedulerError;

/// Counting permit pool bounding how many tasks run at once.
///
/// Backed by `tokio::sync::Semaphore`, whose waiters are served in FIFO
/// order, so a ready task is never starved by later arrivals.
#[derive(Debug, Clone)]
pub struct AdmissionGate {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

/// A held permit. Dropping it is the release, so every exit path from the
/// unit of work (success, error, panic, cancellation) gives the slot back.
#[derive(Debug)]
pub struct AdmissionPermit {
    _permit: OwnedSemaphorePermit,
}

impl AdmissionGate {
    /// Fails with `CapacityConfiguration` when `capacity` is zero or larger
    /// than the semaphore supports.
    pub fn new(capacity: usize) -> Result<Self, SchedulerError> {
        if capacity == 0 || capacity > Semaphore::MAX_PERMITS {
            return Err(SchedulerError::CapacityConfiguration(capacity));
        }
        Ok(Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        })
    }

    /// Wait for a free slot. Fails with `GateClosed` once [`close`] has been
    /// called, including for callers already waiting.
    ///
    /// [`close`]: AdmissionGate::close
    pub async fn acquire(&self) -> Result<AdmissionPermit, SchedulerError> {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| SchedulerError::GateClosed)?;
        Ok(AdmissionPermit { _permit: permit })
    }

    /// Take a slot only if one is free right now.
    pub fn try_acquire(&self) -> Option<AdmissionPermit> {
        Arc::clone(&self.semaphore)
            .try_acquire_owned()
            .ok()
            .map(|permit| AdmissionPermit { _permit: permit })
    }

    /// Refuse every later `acquire`. Permits already held are unaffected.
    pub fn close(&self) {
        self.semaphore.close();
    }

    pub fn is_closed(&self) -> bool {
        self.semaphore.is_closed()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Permits currently held.
    pub fn held(&self) -> usize {
        self.capacity - self.semaphore.available_permits()
    }
}
