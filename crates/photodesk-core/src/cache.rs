//! Process-wide cache of the distinct capture years present in the library.
//!
//! Invalidated synchronously after every successful ingestion and recomputed
//! lazily on the next read. A read already in flight when an invalidation
//! lands may return the older list, but never stores it.

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::StoreResult;
use crate::store::PhotoStore;

#[derive(Debug, Default)]
pub struct YearsCache {
    slot: Mutex<Slot>,
}

#[derive(Debug, Default)]
struct Slot {
    years: Option<Vec<i32>>,
    /// Bumped by every invalidation
    generation: u64,
}

impl YearsCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop the cached list.
    pub fn invalidate(&self) {
        let mut slot = self.lock();
        slot.years = None;
        slot.generation = slot.generation.wrapping_add(1);
        tracing::trace!("Years cache invalidated");
    }

    pub fn is_cached(&self) -> bool {
        self.lock().years.is_some()
    }

    /// Cached years, loading them from `store` on a miss.
    pub async fn get(&self, store: &dyn PhotoStore) -> StoreResult<Vec<i32>> {
        let generation = {
            let slot = self.lock();
            if let Some(years) = &slot.years {
                return Ok(years.clone());
            }
            slot.generation
        };
        let years = store.distinct_years().await?;
        let mut slot = self.lock();
        if slot.generation == generation {
            slot.years = Some(years.clone());
        } else {
            tracing::trace!("Years cache invalidated during load, not storing");
        }
        Ok(years)
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
