use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Discriminator used to route a published event to its subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventKind {
    FishCaught,
    CropHarvested,
    DigFind,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::FishCaught => "fish_caught",
            EventKind::CropHarvested => "crop_harvested",
            EventKind::DigFind => "dig_find",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bit set of special traits a caught fish may carry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TraitFlags(u32);

impl TraitFlags {
    pub const NONE: TraitFlags = TraitFlags(0);
    pub const EVASIVE: TraitFlags = TraitFlags(1 << 0);
    pub const GOLDEN: TraitFlags = TraitFlags(1 << 1);
    pub const GIANT: TraitFlags = TraitFlags(1 << 2);
    pub const ALBINO: TraitFlags = TraitFlags(1 << 3);
    pub const ANCIENT: TraitFlags = TraitFlags(1 << 4);

    const NAMED: [(TraitFlags, &'static str); 5] = [
        (TraitFlags::EVASIVE, "Evasive"),
        (TraitFlags::GOLDEN, "Golden"),
        (TraitFlags::GIANT, "Giant"),
        (TraitFlags::ALBINO, "Albino"),
        (TraitFlags::ANCIENT, "Ancient"),
    ];

    pub fn from_bits(bits: u32) -> Self {
        TraitFlags(bits)
    }

    pub fn bits(&self) -> u32 {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn contains(&self, other: TraitFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn union(self, other: TraitFlags) -> TraitFlags {
        TraitFlags(self.0 | other.0)
    }

    /// Display names of the known traits set in this value, in declaration order.
    pub fn names(&self) -> Vec<&'static str> {
        Self::NAMED
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect()
    }

    /// Parse a trait name (case-insensitive).
    pub fn parse_name(name: &str) -> Option<TraitFlags> {
        Self::NAMED
            .iter()
            .find(|(_, n)| n.eq_ignore_ascii_case(name.trim()))
            .map(|(flag, _)| *flag)
    }
}

impl BitOr for TraitFlags {
    type Output = TraitFlags;

    fn bitor(self, rhs: TraitFlags) -> TraitFlags {
        self.union(rhs)
    }
}

impl BitOrAssign for TraitFlags {
    fn bitor_assign(&mut self, rhs: TraitFlags) {
        self.0 |= rhs.0;
    }
}

/// A fish landed by a player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FishCaught {
    pub user_id: u64,
    pub species: String,
    /// Weight in kilograms
    pub weight: f64,
    /// Length in centimetres
    pub size: f64,
    pub traits: TraitFlags,
}

/// Kind-specific payload of a [`GameEvent`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EventPayload {
    FishCaught(FishCaught),
    CropHarvested {
        user_id: u64,
        crop: String,
        quantity: u32,
    },
    DigFind {
        user_id: u64,
        x: usize,
        y: usize,
    },
}

/// Immutable record published through the event bus.
///
/// Fields are only reachable through accessors; once built an event cannot be altered,
/// and the bus shares a single `Arc` of it with every handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameEvent {
    id: Uuid,
    created_at: DateTime<Utc>,
    payload: EventPayload,
}

impl GameEvent {
    pub fn new(payload: EventPayload) -> Self {
        Self::at(payload, Utc::now())
    }

    /// Build an event with an explicit creation time (replays and tests).
    pub fn at(payload: EventPayload, created_at: DateTime<Utc>) -> Self {
        GameEvent {
            id: Uuid::new_v4(),
            created_at,
            payload,
        }
    }

    pub fn fish_caught(
        user_id: u64,
        species: impl Into<String>,
        weight: f64,
        size: f64,
        traits: TraitFlags,
    ) -> Self {
        Self::new(EventPayload::FishCaught(FishCaught {
            user_id,
            species: species.into(),
            weight,
            size,
            traits,
        }))
    }

    pub fn crop_harvested(user_id: u64, crop: impl Into<String>, quantity: u32) -> Self {
        Self::new(EventPayload::CropHarvested {
            user_id,
            crop: crop.into(),
            quantity,
        })
    }

    pub fn dig_find(user_id: u64, x: usize, y: usize) -> Self {
        Self::new(EventPayload::DigFind { user_id, x, y })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn payload(&self) -> &EventPayload {
        &self.payload
    }

    pub fn kind(&self) -> EventKind {
        match self.payload {
            EventPayload::FishCaught(_) => EventKind::FishCaught,
            EventPayload::CropHarvested { .. } => EventKind::CropHarvested,
            EventPayload::DigFind { .. } => EventKind::DigFind,
        }
    }

    pub fn user_id(&self) -> u64 {
        match &self.payload {
            EventPayload::FishCaught(catch) => catch.user_id,
            EventPayload::CropHarvested { user_id, .. } => *user_id,
            EventPayload::DigFind { user_id, .. } => *user_id,
        }
    }
}
