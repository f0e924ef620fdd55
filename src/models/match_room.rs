//! Match room model — the match, its two factions, and their lifecycle state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::Participant;

/// Opaque identifier of a match room, as issued by the host platform.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoomId(String);

impl RoomId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RoomId({})", self.0)
    }
}

impl From<String> for RoomId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RoomId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Lifecycle state of a match.
///
/// The host reports more states than we care about; anything that is not
/// terminal is treated as still running.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchState {
    Ongoing,
    Finished,
    Other(String),
}

impl MatchState {
    /// Parse a host-reported state string (case-insensitive).
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "ONGOING" => MatchState::Ongoing,
            "FINISHED" => MatchState::Finished,
            _ => MatchState::Other(s.to_string()),
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, MatchState::Finished)
    }
}

/// One of the two fixed faction slots in a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FactionSlot {
    Faction1,
    Faction2,
}

impl FactionSlot {
    /// Both slots, in display order.
    pub const BOTH: [FactionSlot; 2] = [FactionSlot::Faction1, FactionSlot::Faction2];

    /// The opposing slot.
    pub fn opponent(self) -> Self {
        match self {
            FactionSlot::Faction1 => FactionSlot::Faction2,
            FactionSlot::Faction2 => FactionSlot::Faction1,
        }
    }

    /// 1-based index as used in the page markup.
    pub fn display_index(self) -> usize {
        match self {
            FactionSlot::Faction1 => 1,
            FactionSlot::Faction2 => 2,
        }
    }

    /// Key used by the host payload for this slot.
    pub fn key(self) -> &'static str {
        match self {
            FactionSlot::Faction1 => "faction1",
            FactionSlot::Faction2 => "faction2",
        }
    }
}

impl fmt::Display for FactionSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// Host-side analytics attached to a faction, when the platform provides them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TeamStats {
    /// Precomputed likelihood (0..=1) that this faction wins.
    pub win_probability: f64,
}

/// One competing side of a match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Faction {
    /// Display name of the side.
    pub name: String,

    /// Ordered roster of members.
    pub roster: Vec<Participant>,

    /// Host analytics, if the match payload carried team statistics.
    pub stats: Option<TeamStats>,
}

/// A match room: two factions competing in a single activity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchRoom {
    /// Room identifier.
    pub id: RoomId,

    /// Lifecycle state.
    pub state: MatchState,

    /// Identifier of the activity/game being played.
    pub game: String,

    /// When the match started, if the host reported it.
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,

    /// First faction slot.
    pub faction1: Faction,

    /// Second faction slot.
    pub faction2: Faction,

    /// Precomputed average rating for faction 1, when the host supplies one.
    pub faction1_rating: Option<i64>,

    /// Precomputed average rating for faction 2, when the host supplies one.
    pub faction2_rating: Option<i64>,
}

impl MatchRoom {
    pub fn faction(&self, slot: FactionSlot) -> &Faction {
        match slot {
            FactionSlot::Faction1 => &self.faction1,
            FactionSlot::Faction2 => &self.faction2,
        }
    }

    /// Precomputed rating figure for a slot, if the host supplied one.
    pub fn premade_rating(&self, slot: FactionSlot) -> Option<i64> {
        match slot {
            FactionSlot::Faction1 => self.faction1_rating,
            FactionSlot::Faction2 => self.faction2_rating,
        }
    }

    /// Team statistics for a slot, if present.
    pub fn stats(&self, slot: FactionSlot) -> Option<&TeamStats> {
        self.faction(slot).stats.as_ref()
    }

    /// All participants across both factions.
    pub fn all_participants(&self) -> impl Iterator<Item = &Participant> {
        self.faction1.roster.iter().chain(self.faction2.roster.iter())
    }
}
