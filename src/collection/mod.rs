//! Fish collection ("fishdex") tracker.
//!
//! Subscribes to [`EventKind::FishCaught`] and folds each catch into a per-player,
//! per-species [`DiscoveryRecord`]. Merges are monotonic: the catch count only grows,
//! weight/size only move toward the maximum, traits only gain bits, and first/last seen
//! track the earliest and latest catch times. The result does not depend on arrival order.
//!
//! Records sit in a `DashMap`, so a merge holds only its own shard's lock: concurrent catches
//! of the same species by the same player serialize, unrelated records do not contend.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::errors::HandlerError;
use crate::events::{EventBus, EventHandler, EventKind, EventPayload, FishCaught, GameEvent, TraitFlags};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryRecord {
    pub user_id: u64,
    pub species: String,
    pub times_caught: u64,
    pub max_weight: f64,
    pub max_size: f64,
    pub traits: TraitFlags,
    pub first_caught: DateTime<Utc>,
    pub last_caught: DateTime<Utc>,
}

impl DiscoveryRecord {
    pub fn first(catch: &FishCaught, at: DateTime<Utc>) -> Self {
        DiscoveryRecord {
            user_id: catch.user_id,
            species: catch.species.clone(),
            times_caught: 1,
            max_weight: catch.weight,
            max_size: catch.size,
            traits: catch.traits,
            first_caught: at,
            last_caught: at,
        }
    }

    pub fn merge(&mut self, catch: &FishCaught, at: DateTime<Utc>) {
        self.times_caught = self.times_caught.saturating_add(1);
        self.max_weight = self.max_weight.max(catch.weight);
        self.max_size = self.max_size.max(catch.size);
        self.traits |= catch.traits;
        self.first_caught = self.first_caught.min(at);
        self.last_caught = self.last_caught.max(at);
    }
}

type RecordKey = (u64, String);

#[derive(Default)]
pub struct CollectionTracker {
    records: DashMap<RecordKey, DiscoveryRecord>,
}

impl CollectionTracker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Subscribe this tracker to catch events on `bus`.
    pub fn attach(self: &Arc<Self>, bus: &EventBus) -> bool {
        let handler: Arc<dyn EventHandler> = self.clone();
        bus.subscribe(EventKind::FishCaught, handler)
    }

    pub fn detach(self: &Arc<Self>, bus: &EventBus) -> bool {
        let handler: Arc<dyn EventHandler> = self.clone();
        bus.unsubscribe(EventKind::FishCaught, &handler)
    }

    /// Fold one catch observed at `at` into the matching record.
    pub fn record(&self, catch: &FishCaught, at: DateTime<Utc>) {
        let key = (catch.user_id, catch.species.clone());
        self.records
            .entry(key)
            .and_modify(|rec| rec.merge(catch, at))
            .or_insert_with(|| DiscoveryRecord::first(catch, at));
    }

    pub fn get(&self, user_id: u64, species: &str) -> Option<DiscoveryRecord> {
        self.records
            .get(&(user_id, species.to_string()))
            .map(|r| r.value().clone())
    }

    /// Every record for `user_id`, sorted by species name.
    pub fn for_user(&self, user_id: u64) -> Vec<DiscoveryRecord> {
        let mut out: Vec<DiscoveryRecord> = self
            .records
            .iter()
            .filter(|r| r.key().0 == user_id)
            .map(|r| r.value().clone())
            .collect();
        out.sort_by(|a, b| a.species.cmp(&b.species));
        out
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl EventHandler for CollectionTracker {
    fn name(&self) -> &str {
        "collection"
    }

    async fn handle(&self, event: &GameEvent) -> Result<(), HandlerError> {
        match event.payload() {
            EventPayload::FishCaught(catch) => {
                if catch.species.trim().is_empty() {
                    return Err(HandlerError::failed("catch event without species"));
                }
                self.record(catch, event.created_at());
                debug!("collection: user {} caught {}", catch.user_id, catch.species);
                Ok(())
            }
            _ => Ok(()),
        }
    }
}
