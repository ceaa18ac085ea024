//! Per-key async locks serializing cache lookups and writes.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::warn;

/// One async mutex per cache key, created on demand.
///
/// Serializes the lookup → fetch → save sequence for a key within this
/// process. Entries no longer held by anyone are dropped on the next acquire.
#[derive(Debug, Default)]
pub(crate) struct KeyLocks {
    table: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl KeyLocks {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to `key`.
    pub(crate) async fn lock(&self, key: &str) -> OwnedMutexGuard<()> {
        let entry = {
            let mut table = self.table();
            table.retain(|k, lock| k == key || Arc::strong_count(lock) > 1);
            Arc::clone(table.entry(key.to_owned()).or_default())
        };
        entry.lock_owned().await
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.table().len()
    }

    fn table(&self) -> MutexGuard<'_, HashMap<String, Arc<AsyncMutex<()>>>> {
        match self.table.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!(
                    lock_kind = "mutex.lock",
                    result = "poisoned_recovered",
                    "Recovered from poisoned key lock table"
                );
                poisoned.into_inner()
            }
        }
    }
}
