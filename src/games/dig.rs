//! Dig site minigame: a bounded, turn-based session driven by move/dig/stop actions.
//!
//! State is a grid position, a finds counter capped at `max_finds`, an attempts budget that
//! only digging consumes, and the set of tiles already dug. Every mutation goes through
//! `DigSession` methods, which re-check their preconditions first.
//!
//! Reaching the find cap or running out of attempts does not end the session; the caller
//! decides when to stop it and drop it from the registry.

use std::collections::HashSet;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Tunables for one dig session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DigRules {
    pub grid_width: usize,
    pub grid_height: usize,
    pub max_attempts: u8,
    pub max_finds: u8,
    /// Probability in `[0, 1]` that a dig at a fresh tile turns something up
    pub success_odds: f64,
}

impl Default for DigRules {
    fn default() -> Self {
        DigRules {
            grid_width: 5,
            grid_height: 5,
            max_attempts: 5,
            max_finds: 3,
            success_odds: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    North,
    South,
    East,
    West,
}

impl Direction {
    /// Parse `N`/`NORTH` style input (case-insensitive).
    pub fn parse(s: &str) -> Option<Direction> {
        match s.trim().to_ascii_uppercase().as_str() {
            "N" | "NORTH" | "UP" => Some(Direction::North),
            "S" | "SOUTH" | "DOWN" => Some(Direction::South),
            "E" | "EAST" | "RIGHT" => Some(Direction::East),
            "W" | "WEST" | "LEFT" => Some(Direction::West),
            _ => None,
        }
    }
}

/// Why a dig was refused. No state changes when one of these is returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigRejection {
    AlreadyDug,
    FindsMaxed,
    NoAttemptsLeft,
    SessionOver,
}

impl DigRejection {
    /// Player-facing explanation.
    pub fn message(&self) -> &'static str {
        match self {
            DigRejection::AlreadyDug => "You already dug here. Move to a fresh spot.",
            DigRejection::FindsMaxed => "Your bag is full. Send Q to wrap up.",
            DigRejection::NoAttemptsLeft => "Your shovel is worn out. Send Q to wrap up.",
            DigRejection::SessionOver => "This dig has ended.",
        }
    }
}

/// Result of an accepted dig.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DigOutcome {
    pub found: bool,
    pub x: usize,
    pub y: usize,
    pub finds: u8,
    pub attempts_left: u8,
}

/// Final tally handed back by [`DigSession::stop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DigSummary {
    pub finds: u8,
    pub attempts_used: u8,
}

#[derive(Debug, Clone)]
pub struct DigSession {
    owner_id: u64,
    rules: DigRules,
    x: usize,
    y: usize,
    finds: u8,
    attempts_left: u8,
    dug: HashSet<(usize, usize)>,
    started_at: DateTime<Utc>,
    last_active: DateTime<Utc>,
    stopped: bool,
}

impl DigSession {
    /// Start a session at the centre of the grid.
    pub fn new(owner_id: u64, rules: DigRules) -> Self {
        let now = Utc::now();
        DigSession {
            owner_id,
            rules,
            x: rules.grid_width / 2,
            y: rules.grid_height / 2,
            finds: 0,
            attempts_left: rules.max_attempts,
            dug: HashSet::new(),
            started_at: now,
            last_active: now,
            stopped: false,
        }
    }

    pub fn owner_id(&self) -> u64 {
        self.owner_id
    }
    pub fn rules(&self) -> &DigRules {
        &self.rules
    }
    pub fn position(&self) -> (usize, usize) {
        (self.x, self.y)
    }
    pub fn finds(&self) -> u8 {
        self.finds
    }
    pub fn attempts_left(&self) -> u8 {
        self.attempts_left
    }
    pub fn is_dug(&self, x: usize, y: usize) -> bool {
        self.dug.contains(&(x, y))
    }
    pub fn dug_count(&self) -> usize {
        self.dug.len()
    }
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }
    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_active = now;
    }

    pub fn idle_for(&self, now: DateTime<Utc>) -> ChronoDuration {
        now.signed_duration_since(self.last_active)
    }

    /// Step one tile. Returns `false` (position unchanged) at a grid edge or after stop.
    pub fn move_dir(&mut self, dir: Direction) -> bool {
        if self.stopped {
            return false;
        }
        let (x, y) = (self.x, self.y);
        let (nx, ny) = match dir {
            Direction::North if y > 0 => (x, y - 1),
            Direction::South if y + 1 < self.rules.grid_height => (x, y + 1),
            Direction::West if x > 0 => (x - 1, y),
            Direction::East if x + 1 < self.rules.grid_width => (x + 1, y),
            _ => return false,
        };
        self.x = nx;
        self.y = ny;
        true
    }

    /// Dig at the current tile, rolling `rng` once against `success_odds`.
    pub fn dig<R: Rng>(&mut self, rng: &mut R) -> Result<DigOutcome, DigRejection> {
        if self.stopped {
            return Err(DigRejection::SessionOver);
        }
        if self.dug.contains(&(self.x, self.y)) {
            return Err(DigRejection::AlreadyDug);
        }
        if self.finds >= self.rules.max_finds {
            return Err(DigRejection::FindsMaxed);
        }
        if self.attempts_left == 0 {
            return Err(DigRejection::NoAttemptsLeft);
        }

        let found = rng.gen_bool(self.rules.success_odds.clamp(0.0, 1.0));
        if found {
            self.finds += 1;
        }
        self.attempts_left -= 1;
        self.dug.insert((self.x, self.y));
        Ok(DigOutcome {
            found,
            x: self.x,
            y: self.y,
            finds: self.finds,
            attempts_left: self.attempts_left,
        })
    }

    /// Mark the session finished. Further moves and digs are refused.
    pub fn stop(&mut self) -> DigSummary {
        self.stopped = true;
        DigSummary {
            finds: self.finds,
            attempts_used: self.rules.max_attempts.saturating_sub(self.attempts_left),
        }
    }

    /// Compact one-line status, e.g. `Pos 2,2 Finds 0/3 Tries 5`.
    pub fn status_line(&self) -> String {
        format!(
            "Pos {},{} Finds {}/{} Tries {}",
            self.x, self.y, self.finds, self.rules.max_finds, self.attempts_left
        )
    }
}
