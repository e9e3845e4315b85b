//! Per-session serialization and exchange counters.

use log::debug;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Registry of one async mutex per session.
///
/// Operations on the same session queue behind each other while other
/// sessions proceed in parallel.
#[derive(Debug, Default)]
pub(crate) struct SessionLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl SessionLocks {
    /// Wait for exclusive access to a session.
    pub(crate) async fn acquire(&self, session_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock();
            locks
                .entry(session_id.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    /// Drop the registry entry for a session nobody holds or waits on.
    pub(crate) fn release(&self, session_id: &str) {
        let mut locks = self.locks.lock();
        if locks
            .get(session_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(session_id);
            debug!("released session lock (session_id={})", session_id);
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.lock().len()
    }
}

/// Process-local count of exchanges since the last extraction attempt.
#[derive(Debug, Default)]
pub(crate) struct ExchangeCounters {
    counts: Mutex<HashMap<String, usize>>,
}

impl ExchangeCounters {
    /// Count one exchange; returns true (and resets) once `cadence` is reached.
    pub(crate) fn tick(&self, session_id: &str, cadence: usize) -> bool {
        let mut counts = self.counts.lock();
        let count = counts.entry(session_id.to_string()).or_insert(0);
        *count += 1;
        if *count >= cadence.max(1) {
            *count = 0;
            true
        } else {
            debug!(
                "extraction deferred (session_id={}, count={}, cadence={})",
                session_id, count, cadence
            );
            false
        }
    }

    /// Forget a session's counter.
    pub(crate) fn reset(&self, session_id: &str) {
        self.counts.lock().remove(session_id);
    }
}
