//! Background crop growth loop.
//!
//! One long-lived task per process. Each cycle fetches every farm, advances crops whose
//! threshold has elapsed by a single stage, and persists only the farms that changed.
//! A farm that needs work is re-read and written under its owner's [`FarmLocks`] entry, so a
//! harvest or planting that lands mid-scan is never overwritten by the scan's stale copy.
//! Fetch or persist failures shorten the next sleep to `retry_delay`; nothing short of the
//! shutdown signal ends the loop. Shutdown is only observed between cycles, so a cycle that
//! has started always finishes its writes.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::{Farm, FarmLocks, FarmStore};
use crate::errors::StoreError;
use crate::metrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdvancerConfig {
    /// Sleep between successful cycles
    pub interval: Duration,
    /// Sleep after a cycle that hit a store failure
    pub retry_delay: Duration,
}

impl Default for AdvancerConfig {
    fn default() -> Self {
        AdvancerConfig {
            interval: Duration::from_secs(300),
            retry_delay: Duration::from_secs(60),
        }
    }
}

/// Counts from a single scan cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub farms_scanned: usize,
    pub farms_changed: usize,
    pub crops_advanced: usize,
    pub persist_failures: usize,
}

impl ScanSummary {
    pub fn is_clean(&self) -> bool {
        self.persist_failures == 0
    }
}

pub struct GrowthAdvancer {
    store: Arc<dyn FarmStore>,
    locks: Arc<FarmLocks>,
    config: AdvancerConfig,
}

impl GrowthAdvancer {
    pub fn new(store: Arc<dyn FarmStore>, config: AdvancerConfig) -> Self {
        GrowthAdvancer {
            store,
            locks: FarmLocks::new(),
            config,
        }
    }

    /// Share write locks with other farm writers (the game server).
    pub fn with_locks(mut self, locks: Arc<FarmLocks>) -> Self {
        self.locks = locks;
        self
    }

    /// Run one scan at `now`.
    ///
    /// A failed fetch is returned as an error. A failed persist is logged and counted in
    /// the summary; the remaining farms are still written.
    pub async fn run_cycle(&self, now: DateTime<Utc>) -> Result<ScanSummary, StoreError> {
        let farms = self.store.fetch_all_farms().await?;
        let mut summary = ScanSummary {
            farms_scanned: farms.len(),
            ..ScanSummary::default()
        };

        for snapshot in farms {
            if !snapshot.has_due(now) {
                continue;
            }
            match self.advance_locked(&snapshot.owner, now).await {
                Ok(0) => {}
                Ok(advanced) => {
                    summary.farms_changed += 1;
                    summary.crops_advanced += advanced;
                }
                Err(e) => {
                    summary.persist_failures += 1;
                    warn!("growth: failed to update farm {}: {}", snapshot.owner, e);
                }
            }
        }

        metrics::inc_scan_cycles();
        metrics::add_crops_advanced(summary.crops_advanced as u64);
        if summary.crops_advanced > 0 {
            info!(
                "growth: advanced {} crop(s) across {} of {} farm(s)",
                summary.crops_advanced, summary.farms_changed, summary.farms_scanned
            );
        } else {
            debug!("growth: no crops ready to advance ({} farm(s))", summary.farms_scanned);
        }
        Ok(summary)
    }

    // Re-read under the owner's lock; the scan snapshot may already be stale.
    async fn advance_locked(&self, owner: &str, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let _guard = self.locks.lock(owner).await;
        let Some(mut farm): Option<Farm> = self.store.fetch_farm(owner).await? else {
            return Ok(0);
        };
        let advanced = farm.advance_all(now);
        if advanced > 0 {
            self.store.persist_farm(&farm).await?;
        }
        Ok(advanced)
    }

    /// Loop until `shutdown` flips to `true` (or its sender is dropped).
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            "growth advancer started (interval {:?}, retry {:?})",
            self.config.interval, self.config.retry_delay
        );
        loop {
            if *shutdown.borrow() {
                break;
            }
            let delay = match self.run_cycle(Utc::now()).await {
                Ok(summary) if summary.is_clean() => self.config.interval,
                Ok(summary) => {
                    metrics::inc_scan_failures();
                    warn!(
                        "growth: {} persist failure(s); retrying in {:?}",
                        summary.persist_failures, self.config.retry_delay
                    );
                    self.config.retry_delay
                }
                Err(e) => {
                    metrics::inc_scan_failures();
                    warn!(
                        "growth: failed to fetch farms: {}; retrying in {:?}",
                        e, self.config.retry_delay
                    );
                    self.config.retry_delay
                }
            };

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("growth advancer stopped");
    }

    /// Spawn the loop on the Tokio runtime.
    pub fn spawn(self) -> AdvancerHandle {
        let (tx, rx) = watch::channel(false);
        let join = tokio::spawn(self.run(rx));
        AdvancerHandle { shutdown: tx, join }
    }
}

/// Owner side of a spawned advancer.
pub struct AdvancerHandle {
    shutdown: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl AdvancerHandle {
    /// Signal shutdown and wait for the loop to exit.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.join.await {
            warn!("growth advancer task ended abnormally: {}", e);
        }
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}
