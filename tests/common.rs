//! Test utilities & fixtures shared by the integration tests.

use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use reelbot::config::Config;
use reelbot::farm::{Crop, Farm, GrowthRule};
use reelbot::server::GameServer;
use reelbot::storage::MemoryFarmStore;

/// Default config pointed at a throwaway data dir.
#[allow(dead_code)]
pub fn temp_config() -> (Config, tempfile::TempDir) {
    let tmp = tempfile::tempdir().expect("tempdir");
    let mut config = Config::default();
    config.storage.data_dir = tmp.path().to_string_lossy().to_string();
    config.logging.file = None;
    (config, tmp)
}

/// Server over an in-memory store with fixed dig odds.
#[allow(dead_code)]
pub fn server_with_odds(odds: f64) -> (GameServer, Arc<MemoryFarmStore>) {
    let mut config = Config::default();
    config.logging.file = None;
    config.dig.success_odds = odds;
    let store = Arc::new(MemoryFarmStore::new());
    let server = GameServer::with_store(config, store.clone());
    (server, store)
}

/// Farm for `owner` with one crop per entry, each planted `minutes_ago` before `now`.
#[allow(dead_code)]
pub fn farm_planted(owner: &str, owner_id: u64, crops: &[(&str, i64)], now: DateTime<Utc>) -> Farm {
    let mut farm = Farm::new(owner, owner_id);
    for (kind, minutes_ago) in crops {
        farm.crops.push(Crop::plant(
            *kind,
            GrowthRule::default(),
            now - ChronoDuration::minutes(*minutes_ago),
        ));
    }
    farm
}
