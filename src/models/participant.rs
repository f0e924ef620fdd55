//! Participant model — an individual competitor and their per-game rating.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Page rendering mode. The host serves two generations of match-room markup,
/// and the mode decides which match endpoint, participant id form, and markup
/// patterns apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    /// Older markup generation; participants are addressed by string guid.
    Legacy,
    /// Current markup generation; participants are addressed by UUID.
    Modern,
}

/// Identifier of a participant, in the form the active display mode requires.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantId {
    Legacy(String),
    Modern(Uuid),
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParticipantId::Legacy(guid) => write!(f, "{}", guid),
            ParticipantId::Modern(id) => write!(f, "{}", id),
        }
    }
}

/// Per-game statistics for a participant.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GameStats {
    /// Current skill rating for the game; absent when the participant has
    /// no record for it.
    pub skill_rating: Option<i64>,
}

/// Nickname → participant map derived from a match payload.
pub type NicknameMap = HashMap<String, Participant>;

/// An individual competitor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    /// Display nickname, used to cross-reference markup-derived names.
    pub nickname: String,

    /// Current-form identifier (modern pages).
    pub id: Option<Uuid>,

    /// Legacy-form identifier (older pages).
    pub guid: Option<String>,

    /// Stats per game identifier.
    #[serde(default)]
    pub games: HashMap<String, GameStats>,
}

impl Participant {
    /// The identifier variant required by a display mode, if this
    /// participant record carries it.
    pub fn id_for(&self, mode: DisplayMode) -> Option<ParticipantId> {
        match mode {
            DisplayMode::Legacy => self.guid.clone().map(ParticipantId::Legacy),
            DisplayMode::Modern => self.id.map(ParticipantId::Modern),
        }
    }

    /// Skill rating for a game, if known.
    pub fn rating_for(&self, game: &str) -> Option<i64> {
        self.games.get(game).and_then(|g| g.skill_rating)
    }
}
