//! HTTP implementation of `MatchApi` against the host platform's API.
//!
//! Host payloads are camelCase JSON; DTOs here mirror the wire shape and are
//! mapped into the domain model at the boundary.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;
use url::Url;
use uuid::Uuid;

use super::{ApiError, MatchApi};
use crate::models::{
    Faction, GameStats, MatchRoom, MatchState, Participant, ParticipantId, RoomId, TeamStats,
};

/// Live `MatchApi` implementation over the host's REST API.
pub struct HttpMatchApi {
    client: Client,
    base_url: Url,
}

impl HttpMatchApi {
    /// Create a client against `base_url` with the given request timeout.
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base_url })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidUrl(self.base_url.to_string()))?
            .extend(segments);
        Ok(url)
    }

    /// GET a JSON payload; 404 maps to `None`, other failures to errors.
    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        url: Url,
    ) -> Result<Option<T>, ApiError> {
        debug!("GET {}", url);

        let response = self.client.get(url).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(ApiError::Status { status, message });
        }

        Ok(Some(response.json::<T>().await?))
    }
}

#[async_trait]
impl MatchApi for HttpMatchApi {
    async fn fetch_match(&self, room: &RoomId) -> Result<Option<MatchRoom>, ApiError> {
        let url = self.endpoint(&["matches", room.as_str()])?;
        let dto: Option<MatchDto> = self.get_json(url).await?;
        Ok(dto.map(|d| d.into_match(room.clone())))
    }

    async fn fetch_quick_match(&self, room: &RoomId) -> Result<Option<MatchRoom>, ApiError> {
        let url = self.endpoint(&["quickmatches", room.as_str()])?;
        let dto: Option<MatchDto> = self.get_json(url).await?;
        Ok(dto.map(|d| d.into_match(room.clone())))
    }

    async fn fetch_participant(
        &self,
        id: &ParticipantId,
    ) -> Result<Option<Participant>, ApiError> {
        let id_string = id.to_string();
        let url = self.endpoint(&["users", &id_string])?;
        let dto: Option<PlayerDto> = self.get_json(url).await?;
        Ok(dto.map(PlayerDto::into_participant))
    }

    async fn fetch_current_viewer(&self) -> Result<Participant, ApiError> {
        let url = self.endpoint(&["users", "me"])?;
        let dto: Option<PlayerDto> = self.get_json(url).await?;
        dto.map(PlayerDto::into_participant)
            .ok_or(ApiError::NoViewer)
    }
}

/// Wire format of a match payload.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MatchDto {
    state: String,
    game: String,
    started_at: Option<DateTime<Utc>>,
    teams: TeamsDto,
    faction1_elo: Option<i64>,
    faction2_elo: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TeamsDto {
    faction1: TeamDto,
    faction2: TeamDto,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TeamDto {
    name: String,
    #[serde(default)]
    roster: Vec<PlayerDto>,
    stats: Option<StatsDto>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatsDto {
    win_probability: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlayerDto {
    nickname: String,
    id: Option<Uuid>,
    guid: Option<String>,
    #[serde(default)]
    games: HashMap<String, PlayerGameDto>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlayerGameDto {
    skill_rating: Option<i64>,
}

impl MatchDto {
    fn into_match(self, id: RoomId) -> MatchRoom {
        MatchRoom {
            id,
            state: MatchState::parse(&self.state),
            game: self.game,
            started_at: self.started_at,
            faction1: self.teams.faction1.into_faction(),
            faction2: self.teams.faction2.into_faction(),
            faction1_rating: self.faction1_elo,
            faction2_rating: self.faction2_elo,
        }
    }
}

impl TeamDto {
    fn into_faction(self) -> Faction {
        Faction {
            name: self.name,
            roster: self
                .roster
                .into_iter()
                .map(PlayerDto::into_participant)
                .collect(),
            stats: self.stats.map(|s| TeamStats {
                win_probability: s.win_probability,
            }),
        }
    }
}

impl PlayerDto {
    fn into_participant(self) -> Participant {
        Participant {
            nickname: self.nickname,
            id: self.id,
            guid: self.guid,
            games: self
                .games
                .into_iter()
                .map(|(game, stats)| {
                    (
                        game,
                        GameStats {
                            skill_rating: stats.skill_rating,
                        },
                    )
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FactionSlot;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_match_dto_deserialization() {
        let json = r#"{
            "state": "ONGOING",
            "game": "cs2",
            "teams": {
                "faction1": {
                    "name": "alpha",
                    "roster": [
                        {"nickname": "ace", "id": "00000000-0000-0000-0000-000000000001"}
                    ],
                    "stats": {"winProbability": 0.61}
                },
                "faction2": {
                    "name": "bravo",
                    "roster": []
                }
            },
            "faction2Elo": 1744
        }"#;

        let dto: MatchDto = serde_json::from_str(json).unwrap();
        let room = dto.into_match(RoomId::from("room-9"));

        assert_eq!(room.state, MatchState::Ongoing);
        assert_eq!(room.game, "cs2");
        assert_eq!(room.faction1.roster.len(), 1);
        assert_eq!(
            room.stats(FactionSlot::Faction1).unwrap().win_probability,
            0.61
        );
        assert!(room.stats(FactionSlot::Faction2).is_none());
        assert_eq!(room.premade_rating(FactionSlot::Faction1), None);
        assert_eq!(room.premade_rating(FactionSlot::Faction2), Some(1744));
    }

    #[test]
    fn test_player_dto_deserialization() {
        let json = r#"{
            "nickname": "ace",
            "guid": "abc-legacy",
            "games": {"cs2": {"skillRating": 2011}, "dota2": {}}
        }"#;

        let dto: PlayerDto = serde_json::from_str(json).unwrap();
        let p = dto.into_participant();

        assert_eq!(p.nickname, "ace");
        assert_eq!(p.guid.as_deref(), Some("abc-legacy"));
        assert_eq!(p.rating_for("cs2"), Some(2011));
        assert_eq!(p.rating_for("dota2"), None);
    }

    #[test]
    fn test_endpoint_building() {
        let api = HttpMatchApi::new(
            Url::parse("https://api.example.com/data/v1").unwrap(),
            Duration::from_secs(10),
        )
        .unwrap();

        let url = api.endpoint(&["matches", "room-1"]).unwrap();
        assert_eq!(url.as_str(), "https://api.example.com/data/v1/matches/room-1");
    }
}
