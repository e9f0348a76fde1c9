//! Per-submission serialization
//!
//! Requests carrying the same submission id run one at a time, so a
//! duplicate only reaches the replay check after the first request has
//! finished writing its lead.

use leadflow_domain::SubmissionId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type Slot = Arc<AsyncMutex<()>>;

/// Registry of submission ids currently being processed
#[derive(Debug, Default)]
pub(crate) struct InFlightSubmissions {
    slots: Mutex<HashMap<SubmissionId, Slot>>,
}

impl InFlightSubmissions {
    /// Wait until no other request holds `id`, then hold it
    pub(crate) async fn acquire(&self, id: SubmissionId) -> InFlightGuard<'_> {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(slots.entry(id).or_default())
        };

        InFlightGuard {
            registry: self,
            id,
            guard: Some(slot.lock_owned().await),
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// Held while a submission is processed; releases the id on drop
pub(crate) struct InFlightGuard<'a> {
    registry: &'a InFlightSubmissions,
    id: SubmissionId,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        // Release before the count check so a waiter's clone is the only other one
        self.guard.take();

        let mut slots = self.registry.slots.lock().unwrap_or_else(PoisonError::into_inner);
        if slots.get(&self.id).is_some_and(|slot| Arc::strong_count(slot) == 1) {
            slots.remove(&self.id);
        }
    }
}
