//! # Farms and time-gated crops
//!
//! Crops move `Planted → Growing → Ready` purely as a function of elapsed wall-clock time.
//! Stages only move forward, one step per call to [`Crop::advance`]. Harvesting resets a
//! ready crop and is driven by players, not by the background [`GrowthAdvancer`].
//!
//! Farms live in an external [`FarmStore`]; the advancer only holds a snapshot per scan.

mod advancer;

pub use advancer::{AdvancerConfig, AdvancerHandle, GrowthAdvancer, ScanSummary};

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::errors::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CropStage {
    Planted,
    Growing,
    Ready,
}

impl CropStage {
    pub fn next(self) -> Option<CropStage> {
        match self {
            CropStage::Planted => Some(CropStage::Growing),
            CropStage::Growing => Some(CropStage::Ready),
            CropStage::Ready => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CropStage::Planted => "planted",
            CropStage::Growing => "growing",
            CropStage::Ready => "ready",
        }
    }
}

/// Minutes after planting at which each stage is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrowthRule {
    /// Planted → Growing
    pub grow_minutes: u32,
    /// Planted → Ready (total, not additional)
    pub ready_minutes: u32,
}

impl Default for GrowthRule {
    fn default() -> Self {
        GrowthRule {
            grow_minutes: 30,
            ready_minutes: 120,
        }
    }
}

impl GrowthRule {
    /// Elapsed time since planting required to leave `stage`. `None` for terminal stages.
    pub fn threshold(&self, stage: CropStage) -> Option<ChronoDuration> {
        match stage {
            CropStage::Planted => Some(ChronoDuration::minutes(self.grow_minutes as i64)),
            CropStage::Growing => Some(ChronoDuration::minutes(self.ready_minutes as i64)),
            CropStage::Ready => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Crop {
    pub kind: String,
    stage: CropStage,
    planted_at: DateTime<Utc>,
    stage_since: DateTime<Utc>,
    rule: GrowthRule,
}

impl Crop {
    pub fn plant(kind: impl Into<String>, rule: GrowthRule, now: DateTime<Utc>) -> Self {
        Crop {
            kind: kind.into(),
            stage: CropStage::Planted,
            planted_at: now,
            stage_since: now,
            rule,
        }
    }

    pub fn stage(&self) -> CropStage {
        self.stage
    }
    pub fn planted_at(&self) -> DateTime<Utc> {
        self.planted_at
    }
    pub fn stage_since(&self) -> DateTime<Utc> {
        self.stage_since
    }
    pub fn rule(&self) -> GrowthRule {
        self.rule
    }

    /// True when this stage's threshold has elapsed at `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        match self.rule.threshold(self.stage) {
            Some(threshold) => now.signed_duration_since(self.planted_at) >= threshold,
            None => false,
        }
    }

    /// Move forward at most one stage if this stage's threshold has elapsed at `now`.
    pub fn advance(&mut self, now: DateTime<Utc>) -> bool {
        let Some(next) = self.stage.next() else {
            return false;
        };
        if !self.is_due(now) {
            return false;
        }
        self.stage = next;
        self.stage_since = now;
        true
    }

    /// Reset a ready crop to freshly planted. Returns `false` (no change) if not ready.
    pub fn harvest(&mut self, now: DateTime<Utc>) -> bool {
        if self.stage != CropStage::Ready {
            return false;
        }
        self.stage = CropStage::Planted;
        self.planted_at = now;
        self.stage_since = now;
        true
    }
}

/// All plots owned by one player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Farm {
    pub owner: String,
    pub owner_id: u64,
    pub crops: Vec<Crop>,
    pub updated_at: DateTime<Utc>,
}

impl Farm {
    pub fn new(owner: impl Into<String>, owner_id: u64) -> Self {
        Farm {
            owner: owner.into(),
            owner_id,
            crops: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    /// Advance every crop by at most one stage. Returns how many changed.
    pub fn advance_all(&mut self, now: DateTime<Utc>) -> usize {
        let mut changed = 0;
        for crop in self.crops.iter_mut() {
            if crop.advance(now) {
                changed += 1;
            }
        }
        if changed > 0 {
            self.updated_at = now;
        }
        changed
    }

    /// True when at least one crop would advance at `now`.
    pub fn has_due(&self, now: DateTime<Utc>) -> bool {
        self.crops.iter().any(|c| c.is_due(now))
    }

    pub fn ready_count(&self) -> usize {
        self.count_in(CropStage::Ready)
    }

    pub fn count_in(&self, stage: CropStage) -> usize {
        self.crops.iter().filter(|c| c.stage == stage).count()
    }
}

/// External persistence contract consumed by the advancer and the server.
#[async_trait]
pub trait FarmStore: Send + Sync {
    async fn fetch_all_farms(&self) -> Result<Vec<Farm>, StoreError>;

    async fn fetch_farm(&self, owner: &str) -> Result<Option<Farm>, StoreError>;

    async fn persist_farm(&self, farm: &Farm) -> Result<(), StoreError>;
}

/// Per-owner write locks.
///
/// Everything that read-modify-writes a farm (the advancer, planting, harvesting) holds the
/// owner's lock from fetch to persist, so no writer can save over a newer copy.
#[derive(Default)]
pub struct FarmLocks {
    owners: DashMap<String, Arc<Mutex<()>>>,
}

impl FarmLocks {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn lock(&self, owner: &str) -> OwnedMutexGuard<()> {
        let lock = self
            .owners
            .entry(owner.to_ascii_lowercase())
            .or_default()
            .clone();
        lock.lock_owned().await
    }
}
