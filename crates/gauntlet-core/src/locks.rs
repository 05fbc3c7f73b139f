use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Prune dead entries once the map grows past this many keys.
const PRUNE_THRESHOLD: usize = 256;

/// One async mutex per challenge ID. Work on different challenges never
/// contends; work on the same challenge runs one unit at a time.
#[derive(Default)]
pub struct ChallengeLocks {
    slots: Mutex<HashMap<String, Weak<AsyncMutex<()>>>>,
}

impl ChallengeLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `challenge_id`. The guard is owned so it
    /// can travel into a blocking task.
    pub async fn acquire(&self, challenge_id: &str) -> OwnedMutexGuard<()> {
        let slot = self.slot(challenge_id);
        slot.lock_owned().await
    }

    fn slot(&self, challenge_id: &str) -> Arc<AsyncMutex<()>> {
        let mut slots = self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(existing) = slots.get(challenge_id).and_then(Weak::upgrade) {
            return existing;
        }

        if slots.len() >= PRUNE_THRESHOLD {
            slots.retain(|_, weak| weak.strong_count() > 0);
        }

        let fresh = Arc::new(AsyncMutex::new(()));
        slots.insert(challenge_id.to_string(), Arc::downgrade(&fresh));
        fresh
    }

    #[cfg(test)]
    fn live(&self) -> usize {
        let slots = self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        slots.values().filter(|weak| weak.strong_count() > 0).count()
    }
}
