//! Process-wide counters for the event bus, growth loop and minigame sessions.
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, OnceLock};

static EVENTS_PUBLISHED: AtomicU64 = AtomicU64::new(0);
static HANDLER_FAILURES: AtomicU64 = AtomicU64::new(0);
static SCAN_CYCLES: AtomicU64 = AtomicU64::new(0);
static SCAN_FAILURES: AtomicU64 = AtomicU64::new(0);
static CROPS_ADVANCED: AtomicU64 = AtomicU64::new(0);
static CORRUPT_RECORDS: AtomicU64 = AtomicU64::new(0);

static GAME_COUNTERS: OnceLock<Mutex<HashMap<String, GameCounter>>> = OnceLock::new();

pub fn inc_events_published() {
    EVENTS_PUBLISHED.fetch_add(1, Ordering::Relaxed);
}
pub fn add_handler_failures(n: u64) {
    HANDLER_FAILURES.fetch_add(n, Ordering::Relaxed);
}
pub fn inc_scan_cycles() {
    SCAN_CYCLES.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_scan_failures() {
    SCAN_FAILURES.fetch_add(1, Ordering::Relaxed);
}
pub fn add_crops_advanced(n: u64) {
    CROPS_ADVANCED.fetch_add(n, Ordering::Relaxed);
}
pub fn add_corrupt_records(n: u64) {
    CORRUPT_RECORDS.fetch_add(n, Ordering::Relaxed);
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct GameCounter {
    pub entries: u64,
    pub exits: u64,
    pub currently_active: u64,
    pub concurrent_peak: u64,
}

fn game_counter_lock() -> MutexGuard<'static, HashMap<String, GameCounter>> {
    GAME_COUNTERS
        .get_or_init(|| Mutex::new(HashMap::new()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub fn record_game_entry(slug: &str) -> GameCounter {
    let mut guard = game_counter_lock();
    let counter = guard.entry(slug.to_string()).or_default();
    counter.entries = counter.entries.saturating_add(1);
    counter.currently_active = counter.currently_active.saturating_add(1);
    if counter.currently_active > counter.concurrent_peak {
        counter.concurrent_peak = counter.currently_active;
    }
    *counter
}

pub fn record_game_exit(slug: &str) -> GameCounter {
    let mut guard = game_counter_lock();
    let counter = guard.entry(slug.to_string()).or_default();
    counter.exits = counter.exits.saturating_add(1);
    counter.currently_active = counter.currently_active.saturating_sub(1);
    *counter
}

pub fn game_counters_snapshot() -> HashMap<String, GameCounter> {
    game_counter_lock().clone()
}

#[derive(Debug, Default, Clone)]
pub struct Snapshot {
    pub events_published: u64,
    pub handler_failures: u64,
    pub scan_cycles: u64,
    pub scan_failures: u64,
    pub crops_advanced: u64,
    pub corrupt_records: u64,
    pub games: HashMap<String, GameCounter>,
}

pub fn snapshot() -> Snapshot {
    Snapshot {
        events_published: EVENTS_PUBLISHED.load(Ordering::Relaxed),
        handler_failures: HANDLER_FAILURES.load(Ordering::Relaxed),
        scan_cycles: SCAN_CYCLES.load(Ordering::Relaxed),
        scan_failures: SCAN_FAILURES.load(Ordering::Relaxed),
        crops_advanced: CROPS_ADVANCED.load(Ordering::Relaxed),
        corrupt_records: CORRUPT_RECORDS.load(Ordering::Relaxed),
        games: game_counters_snapshot(),
    }
}

impl Snapshot {
    /// One-line summary for logs and the `status` command.
    pub fn summary_line(&self) -> String {
        let mut games: Vec<_> = self.games.iter().collect();
        games.sort_by(|a, b| a.0.cmp(b.0));
        let games = games
            .iter()
            .map(|(slug, c)| format!("{}={}/{} peak {}", slug, c.currently_active, c.entries, c.concurrent_peak))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "events={} handler_failures={} scans={} scan_failures={} crops_advanced={} corrupt_records={} games=[{}]",
            self.events_published,
            self.handler_failures,
            self.scan_cycles,
            self.scan_failures,
            self.crops_advanced,
            self.corrupt_records,
            games
        )
    }
}
