use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::errors::StoreError;
use crate::farm::{Farm, FarmStore};

/// In-memory farm store. Faults can be switched on to exercise retry paths.
#[derive(Default)]
pub struct MemoryFarmStore {
    farms: Mutex<BTreeMap<String, Farm>>,
    fail_fetch: AtomicBool,
    fail_persist: Mutex<HashSet<String>>,
    fetch_calls: AtomicUsize,
    persist_calls: AtomicUsize,
}

impl MemoryFarmStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_farms(farms: impl IntoIterator<Item = Farm>) -> Self {
        let store = Self::default();
        {
            let mut map = store.map();
            for farm in farms {
                map.insert(farm.owner.to_ascii_lowercase(), farm);
            }
        }
        store
    }

    fn map(&self) -> MutexGuard<'_, BTreeMap<String, Farm>> {
        self.farms.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Make `fetch_all_farms` fail until switched off.
    pub fn set_fail_fetch(&self, fail: bool) {
        self.fail_fetch.store(fail, Ordering::SeqCst);
    }

    /// Make `persist_farm` fail for `owner` until cleared.
    pub fn fail_persist_for(&self, owner: &str) {
        self.fail_persist
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(owner.to_ascii_lowercase());
    }

    pub fn clear_faults(&self) {
        self.set_fail_fetch(false);
        self.fail_persist
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clear();
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn persist_calls(&self) -> usize {
        self.persist_calls.load(Ordering::SeqCst)
    }

    /// Synchronous peek for assertions.
    pub fn get(&self, owner: &str) -> Option<Farm> {
        self.map().get(&owner.to_ascii_lowercase()).cloned()
    }
}

#[async_trait]
impl FarmStore for MemoryFarmStore {
    async fn fetch_all_farms(&self) -> Result<Vec<Farm>, StoreError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("fetch disabled".into()));
        }
        Ok(self.map().values().cloned().collect())
    }

    async fn fetch_farm(&self, owner: &str) -> Result<Option<Farm>, StoreError> {
        Ok(self.get(owner))
    }

    async fn persist_farm(&self, farm: &Farm) -> Result<(), StoreError> {
        self.persist_calls.fetch_add(1, Ordering::SeqCst);
        let key = farm.owner.to_ascii_lowercase();
        let refused = self
            .fail_persist
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .contains(&key);
        if refused {
            return Err(StoreError::Unavailable(format!("persist disabled for {}", key)));
        }
        self.map().insert(key, farm.clone());
        Ok(())
    }
}
