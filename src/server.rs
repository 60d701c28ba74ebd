//! # Game server
//!
//! [`GameServer`] wires the core together for one process:
//!
//! ```text
//! ┌──────────────┐   publish    ┌──────────┐   FishCaught   ┌───────────────────┐
//! │ chat handler │ ───────────▶ │ EventBus │ ─────────────▶ │ CollectionTracker │
//! └──────────────┘              └──────────┘                └───────────────────┘
//!        │ DIG / N / D / Q
//!        ▼
//! ┌──────────────────────────────┐        ┌────────────────┐  every N min  ┌───────────┐
//! │ SessionRegistry<DigSession>  │        │ GrowthAdvancer │ ────────────▶ │ FarmStore │
//! └──────────────────────────────┘        └────────────────┘               └───────────┘
//! ```
//!
//! Chat transport is not part of this crate: callers hand in a session key, the player's
//! id and the raw command text, and get back the reply text to send.
//!
//! Player-facing replies never include infrastructure error detail; those failures are
//! logged and answered with a generic retry message.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use log::{debug, info, warn};

use crate::collection::CollectionTracker;
use crate::config::Config;
use crate::errors::StoreError;
use crate::events::{EventBus, GameEvent, PublishReport, TraitFlags};
use crate::farm::{AdvancerHandle, Crop, CropStage, Farm, FarmLocks, FarmStore, GrowthAdvancer};
use crate::games::{dig_help_text, DigCommand, DigSession};
use crate::logutil::escape_log;
use crate::metrics;
use crate::sessions::{SessionHandle, SessionRegistry};
use crate::storage::SledFarmStore;

/// Metrics slug for dig sessions.
pub const DIG_SLUG: &str = "dig";

const GENERIC_FAILURE: &str = "Something went wrong, try again.";
const HOUSEKEEPING_TICK: Duration = Duration::from_secs(30);

pub struct GameServer {
    config: Config,
    bus: Arc<EventBus>,
    digs: SessionRegistry<String, DigSession>,
    collection: Arc<CollectionTracker>,
    store: Arc<dyn FarmStore>,
    farm_locks: Arc<FarmLocks>,
    advancer: Option<AdvancerHandle>,
}

impl GameServer {
    /// Build a server backed by the sled farm store under `storage.data_dir`.
    pub async fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let path = config.storage.farms_path();
        let store = SledFarmStore::open(&path)?;
        info!("Farm store opened at {}", path.display());
        Ok(Self::with_store(config, Arc::new(store)))
    }

    /// Build a server around an existing farm store.
    pub fn with_store(config: Config, store: Arc<dyn FarmStore>) -> Self {
        let bus = Arc::new(EventBus::new().with_unhandled_logging(config.events.log_unhandled));
        let collection = CollectionTracker::new();
        collection.attach(&bus);
        GameServer {
            config,
            bus,
            digs: SessionRegistry::new(),
            collection,
            store,
            farm_locks: FarmLocks::new(),
            advancer: None,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn collection(&self) -> &Arc<CollectionTracker> {
        &self.collection
    }

    pub fn dig_sessions(&self) -> &SessionRegistry<String, DigSession> {
        &self.digs
    }

    pub fn store(&self) -> &Arc<dyn FarmStore> {
        &self.store
    }

    /// A growth advancer over this server's store that shares its farm write locks.
    pub fn growth_advancer(&self) -> GrowthAdvancer {
        GrowthAdvancer::new(Arc::clone(&self.store), self.config.farm.advancer())
            .with_locks(Arc::clone(&self.farm_locks))
    }

    /// Spawn the growth advancer if it is not already running.
    pub fn start_background(&mut self) {
        if self.advancer.is_some() {
            return;
        }
        self.advancer = Some(self.growth_advancer().spawn());
    }

    pub async fn stop_background(&mut self) {
        if let Some(handle) = self.advancer.take() {
            handle.stop().await;
        }
    }

    /// Apply one dig-site chat command for the session `key` and return the reply text.
    pub async fn handle_dig_command(&self, key: &str, user_id: u64, text: &str) -> String {
        let cmd = DigCommand::parse(text);
        debug!(
            "dig command from user {} session {}: {}",
            user_id,
            escape_log(key),
            escape_log(text)
        );
        let key = key.to_string();
        match (cmd, self.digs.try_get(&key)) {
            (DigCommand::Help, _) => dig_help_text().to_string(),
            (DigCommand::Start, None) => self.start_dig(key, user_id).await,
            (_, None) => "No dig in progress. Send DIG to start.".to_string(),
            (DigCommand::Start | DigCommand::Dig, Some(handle)) => {
                self.dig_once(user_id, &handle).await
            }
            (DigCommand::Move(dir), Some(handle)) => handle.with(|s| {
                s.touch(Utc::now());
                if s.move_dir(dir) {
                    s.status_line()
                } else {
                    format!("Edge of the site. {}", s.status_line())
                }
            }),
            (DigCommand::Look, Some(handle)) => handle.with(|s| {
                s.touch(Utc::now());
                s.status_line()
            }),
            (DigCommand::Stop, Some(handle)) => self.stop_dig(&key, &handle),
            (DigCommand::Unknown, Some(_)) => "Unknown command. Send ? for help.".to_string(),
        }
    }

    async fn start_dig(&self, key: String, user_id: u64) -> String {
        let session = DigSession::new(user_id, self.config.dig.rules());
        match self.digs.add(key.clone(), session) {
            Ok(handle) => {
                metrics::record_game_entry(DIG_SLUG);
                info!("dig session {} started for user {}", escape_log(&key), user_id);
                let status = handle.with(|s| s.status_line());
                format!("Dig site ready. {}. Move N/S/E/W, D to dig, Q to stop.", status)
            }
            // Lost a race with another DIG on this key: act on the winner's session
            Err(e) => match self.digs.try_get(&key) {
                Some(handle) => self.dig_once(user_id, &handle).await,
                None => {
                    warn!("dig session start refused: {}", e);
                    GENERIC_FAILURE.to_string()
                }
            },
        }
    }

    async fn dig_once(&self, user_id: u64, handle: &SessionHandle<DigSession>) -> String {
        let (result, status) = {
            let mut rng = rand::thread_rng();
            handle.with(|s| {
                s.touch(Utc::now());
                let result = s.dig(&mut rng);
                (result, s.status_line())
            })
        };
        match result {
            Ok(outcome) if outcome.found => {
                self.bus
                    .publish(GameEvent::dig_find(user_id, outcome.x, outcome.y))
                    .await;
                format!("You found something! {}", status)
            }
            Ok(_) => format!("Nothing here. {}", status),
            Err(rejection) => format!("{} {}", rejection.message(), status),
        }
    }

    fn stop_dig(&self, key: &str, handle: &SessionHandle<DigSession>) -> String {
        let summary = handle.with(|s| s.stop());
        if self.digs.try_remove(&key.to_string()).is_some() {
            metrics::record_game_exit(DIG_SLUG);
            info!("dig session {} stopped", escape_log(key));
        }
        format!(
            "Digging over: {} find(s) in {} tr{}.",
            summary.finds,
            summary.attempts_used,
            if summary.attempts_used == 1 { "y" } else { "ies" }
        )
    }

    /// Remove dig sessions idle for longer than `dig.idle_timeout_secs`. Returns how many.
    pub fn sweep_idle_sessions(&self, now: DateTime<Utc>) -> usize {
        let timeout = ChronoDuration::seconds(self.config.dig.idle_timeout_secs as i64);
        let mut removed = 0;
        for (key, handle) in self.digs.get_all() {
            if handle.with(|s| s.idle_for(now)) < timeout {
                continue;
            }
            if let Some(gone) = self.digs.try_remove(&key) {
                gone.with(|s| s.stop());
                metrics::record_game_exit(DIG_SLUG);
                removed += 1;
                debug!("dig session {} expired after idling", escape_log(&key));
            }
        }
        if removed > 0 {
            info!("swept {} idle dig session(s)", removed);
        }
        removed
    }

    /// Publish a catch resolved by the fishing feature.
    pub async fn record_catch(
        &self,
        user_id: u64,
        species: &str,
        weight: f64,
        size: f64,
        traits: TraitFlags,
    ) -> PublishReport {
        self.bus
            .publish(GameEvent::fish_caught(user_id, species, weight, size, traits))
            .await
    }

    /// Plant `crop` on `owner`'s farm, creating the farm on first use.
    pub async fn plant(&self, owner: &str, owner_id: u64, crop: &str) -> String {
        match self.try_plant(owner, owner_id, crop).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!("plant for {} failed: {}", escape_log(owner), e);
                GENERIC_FAILURE.to_string()
            }
        }
    }

    async fn try_plant(&self, owner: &str, owner_id: u64, crop: &str) -> Result<String, StoreError> {
        let _guard = self.farm_locks.lock(owner).await;
        let now = Utc::now();
        let mut farm = self
            .store
            .fetch_farm(owner)
            .await?
            .unwrap_or_else(|| Farm::new(owner, owner_id));
        farm.crops
            .push(Crop::plant(crop.trim(), self.config.farm.growth_rule(), now));
        farm.updated_at = now;
        self.store.persist_farm(&farm).await?;
        Ok(format!("Planted {}. {} plot(s) in use.", crop.trim(), farm.crops.len()))
    }

    /// Harvest every ready crop on `owner`'s farm and publish one event per crop kind.
    pub async fn harvest(&self, owner: &str) -> String {
        match self.try_harvest(owner).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!("harvest for {} failed: {}", escape_log(owner), e);
                GENERIC_FAILURE.to_string()
            }
        }
    }

    async fn try_harvest(&self, owner: &str) -> Result<String, StoreError> {
        let guard = self.farm_locks.lock(owner).await;
        let Some(mut farm) = self.store.fetch_farm(owner).await? else {
            return Ok("You have no farm yet. Plant something first.".to_string());
        };
        let now = Utc::now();
        let mut tally: BTreeMap<String, u32> = BTreeMap::new();
        for crop in farm.crops.iter_mut() {
            if crop.harvest(now) {
                *tally.entry(crop.kind.clone()).or_default() += 1;
            }
        }
        if tally.is_empty() {
            return Ok(format!(
                "Nothing is ready yet ({} growing, {} planted).",
                farm.count_in(CropStage::Growing),
                farm.count_in(CropStage::Planted)
            ));
        }
        farm.updated_at = now;
        self.store.persist_farm(&farm).await?;
        drop(guard);

        for (kind, quantity) in &tally {
            self.bus
                .publish(GameEvent::crop_harvested(farm.owner_id, kind.clone(), *quantity))
                .await;
        }
        let parts: Vec<String> = tally.iter().map(|(k, n)| format!("{} {}", n, k)).collect();
        Ok(format!("Harvested {}.", parts.join(", ")))
    }

    /// Run housekeeping until Ctrl-C, then shut down cleanly.
    pub async fn run(&mut self) -> Result<()> {
        info!("Game server running");
        self.start_background();

        let mut housekeeping = tokio::time::interval(HOUSEKEEPING_TICK);
        housekeeping.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = housekeeping.tick() => {
                    self.sweep_idle_sessions(Utc::now());
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Received shutdown signal");
                    break;
                }
            }
        }

        self.shutdown().await;
        Ok(())
    }

    /// Stop background work, drop live sessions and unsubscribe aggregators.
    pub async fn shutdown(&mut self) {
        info!("Shutting down game server...");
        self.stop_background().await;

        for (key, handle) in self.digs.get_all() {
            if self.digs.try_remove(&key).is_some() {
                handle.with(|s| s.stop());
                metrics::record_game_exit(DIG_SLUG);
                debug!("closed dig session {}", escape_log(&key));
            }
        }
        self.collection.detach(&self.bus);

        info!("Game server shutdown complete: {}", metrics::snapshot().summary_line());
    }
}
