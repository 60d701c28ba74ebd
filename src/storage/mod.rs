//! # Farm persistence
//!
//! - [`SledFarmStore`] - sled-backed store used by the running server
//! - [`MemoryFarmStore`] - in-process store with fault injection for tests and dry runs
//!
//! Both implement [`FarmStore`](crate::farm::FarmStore).

mod memory;

pub use memory::MemoryFarmStore;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::warn;
use sled::IVec;

use crate::errors::StoreError;
use crate::farm::{Farm, FarmStore};
use crate::metrics;

const TREE_FARMS: &str = "farms";
const FARM_PREFIX: &str = "farms:";

/// Sled-backed persistence for player farms. Records are bincode-encoded [`Farm`]s keyed
/// `farms:<owner>` (owner lowercased).
pub struct SledFarmStore {
    _db: sled::Db,
    farms: sled::Tree,
    path: PathBuf,
}

impl SledFarmStore {
    /// Open (or create) the store rooted at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path_ref = path.as_ref();
        std::fs::create_dir_all(path_ref)?;
        let db = sled::open(path_ref)?;
        let farms = db.open_tree(TREE_FARMS)?;
        Ok(SledFarmStore {
            _db: db,
            farms,
            path: path_ref.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn farm_key(owner: &str) -> Vec<u8> {
        format!("{}{}", FARM_PREFIX, owner.to_ascii_lowercase()).into_bytes()
    }

    fn deserialize(bytes: IVec) -> Result<Farm, StoreError> {
        Ok(bincode::deserialize::<Farm>(&bytes)?)
    }

    pub fn farm_count(&self) -> usize {
        self.farms.scan_prefix(FARM_PREFIX.as_bytes()).count()
    }
}

#[async_trait]
impl FarmStore for SledFarmStore {
    /// Every decodable farm. A corrupt record is logged and skipped so it cannot stall the
    /// growth loop for everyone else.
    async fn fetch_all_farms(&self) -> Result<Vec<Farm>, StoreError> {
        let mut out = Vec::new();
        let mut skipped = 0usize;
        for entry in self.farms.scan_prefix(FARM_PREFIX.as_bytes()) {
            let (key, value) = entry?;
            match Self::deserialize(value) {
                Ok(farm) => out.push(farm),
                Err(e) => {
                    skipped += 1;
                    warn!(
                        "skipping undecodable farm record {}: {}",
                        String::from_utf8_lossy(&key),
                        e
                    );
                }
            }
        }
        if skipped > 0 {
            metrics::add_corrupt_records(skipped as u64);
        }
        Ok(out)
    }

    async fn fetch_farm(&self, owner: &str) -> Result<Option<Farm>, StoreError> {
        match self.farms.get(Self::farm_key(owner))? {
            Some(bytes) => Ok(Some(Self::deserialize(bytes)?)),
            None => Ok(None),
        }
    }

    async fn persist_farm(&self, farm: &Farm) -> Result<(), StoreError> {
        let bytes = bincode::serialize(farm)?;
        self.farms.insert(Self::farm_key(&farm.owner), bytes)?;
        self.farms.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::farm::{Crop, CropStage, GrowthRule};
    use chrono::Utc;
    use tempfile::TempDir;

    #[tokio::test]
    async fn persist_and_reload() {
        let dir = TempDir::new().unwrap();
        let store = SledFarmStore::open(dir.path()).unwrap();
        let mut farm = Farm::new("Alice", 1);
        farm.crops.push(Crop::plant("Wheat", GrowthRule::default(), Utc::now()));
        store.persist_farm(&farm).await.unwrap();

        let loaded = store.fetch_farm("alice").await.unwrap().unwrap();
        assert_eq!(loaded, farm);
        assert_eq!(loaded.crops[0].stage(), CropStage::Planted);
        assert!(store.fetch_farm("bob").await.unwrap().is_none());

        store.persist_farm(&Farm::new("bob", 2)).await.unwrap();
        assert_eq!(store.fetch_all_farms().await.unwrap().len(), 2);
        assert_eq!(store.farm_count(), 2);
    }

    #[tokio::test]
    async fn corrupt_record_does_not_stall_growth() {
        use crate::farm::{AdvancerConfig, GrowthAdvancer};
        use chrono::Duration as ChronoDuration;
        use std::sync::Arc;

        let dir = TempDir::new().unwrap();
        let store = Arc::new(SledFarmStore::open(dir.path()).unwrap());
        let mut farm = Farm::new("alice", 1);
        let planted = Utc::now() - ChronoDuration::hours(3);
        farm.crops.push(Crop::plant("Wheat", GrowthRule::default(), planted));
        store.persist_farm(&farm).await.unwrap();
        store
            .farms
            .insert(SledFarmStore::farm_key("bob"), &b"\x01\x02"[..])
            .unwrap();

        let farms = store.fetch_all_farms().await.unwrap();
        assert_eq!(farms.len(), 1);
        assert_eq!(farms[0].owner, "alice");

        let advancer = GrowthAdvancer::new(store.clone(), AdvancerConfig::default());
        let summary = advancer.run_cycle(Utc::now()).await.unwrap();
        assert_eq!(summary.crops_advanced, 1);
        let alice = store.fetch_farm("alice").await.unwrap().unwrap();
        assert_eq!(alice.crops[0].stage(), CropStage::Growing);
    }
}
