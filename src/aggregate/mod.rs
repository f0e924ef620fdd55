//! Roster aggregation.
//!
//! Resolves a faction's member list to current skill ratings and reduces it
//! to a floored average. All member lookups are issued concurrently and the
//! join waits for every one of them; a member that cannot be resolved is
//! dropped from the average rather than aborting the faction.

use futures::future::join_all;
use tracing::{debug, warn};

use crate::api::MatchApi;
use crate::memo::PipelineCaches;
use crate::models::{DisplayMode, FactionAverage, FactionSlot, MatchRoom, NicknameMap};

/// Build the nickname → participant map from a match payload.
pub fn map_nicknames(room: &MatchRoom) -> NicknameMap {
    room.all_participants()
        .map(|p| (p.nickname.clone(), p.clone()))
        .collect()
}

/// Memoized variant, keyed by room id. One computation per page view.
pub fn map_nicknames_memoized(room: &MatchRoom, caches: &PipelineCaches) -> NicknameMap {
    caches
        .nickname_maps
        .get_or_insert_with(room.id.clone(), || map_nicknames(room))
}

/// Aggregate one faction's average rating.
///
/// Fast path: a premade rating figure on the match short-circuits member
/// resolution entirely. Otherwise each markup-derived member nickname is
/// resolved nickname → participant id → rating, concurrently, and the
/// average is the floor of the mean of whatever resolved. Zero resolved
/// members invalidates the faction (`None`).
pub async fn average_rating(
    room: &MatchRoom,
    slot: FactionSlot,
    member_nicknames: &[String],
    mode: DisplayMode,
    api: &dyn MatchApi,
    caches: &PipelineCaches,
) -> Option<FactionAverage> {
    let name = room.faction(slot).name.clone();

    if let Some(premade) = room.premade_rating(slot) {
        debug!(%slot, premade, "using premade faction rating");
        return Some(FactionAverage {
            slot,
            name,
            average_rating: premade,
        });
    }

    let nicknames_to_players = map_nicknames_memoized(room, caches);

    let lookups = member_nicknames
        .iter()
        .map(|nickname| resolve_member_rating(nickname, &nicknames_to_players, mode, room, api));

    let ratings: Vec<i64> = join_all(lookups).await.into_iter().flatten().collect();

    if ratings.is_empty() {
        warn!(%slot, "no roster member resolved a rating; faction excluded");
        return None;
    }

    let sum: i64 = ratings.iter().sum();
    let average_rating = sum.div_euclid(ratings.len() as i64);

    debug!(%slot, resolved = ratings.len(), average_rating, "aggregated faction");

    Some(FactionAverage {
        slot,
        name,
        average_rating,
    })
}

/// Resolve one member to their rating for the match's game.
///
/// Any gap in the chain (unmapped nickname, missing id variant, failed or
/// empty lookup, no rating for the game) drops the member.
async fn resolve_member_rating(
    nickname: &str,
    nicknames_to_players: &NicknameMap,
    mode: DisplayMode,
    room: &MatchRoom,
    api: &dyn MatchApi,
) -> Option<i64> {
    let player = nicknames_to_players.get(nickname)?;
    let id = player.id_for(mode)?;

    let user = match api.fetch_participant(&id).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            debug!(nickname, "participant lookup returned no record");
            return None;
        }
        Err(err) => {
            warn!(nickname, error = %err, "participant lookup failed");
            return None;
        }
    };

    user.rating_for(&room.game)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;

    use crate::api::{ApiError, Fixture, FixtureApi};
    use crate::models::{Faction, GameStats, MatchState, Participant, ParticipantId, RoomId};

    fn player(nickname: &str, guid: &str, rating: Option<i64>) -> Participant {
        let mut games = HashMap::new();
        games.insert(
            "cs2".to_string(),
            GameStats {
                skill_rating: rating,
            },
        );
        Participant {
            nickname: nickname.to_string(),
            id: None,
            guid: Some(guid.to_string()),
            games,
        }
    }

    fn room_with_roster(roster: Vec<Participant>) -> MatchRoom {
        MatchRoom {
            id: RoomId::from("room-1"),
            state: MatchState::Ongoing,
            game: "cs2".to_string(),
            started_at: None,
            faction1: Faction {
                name: "alpha".to_string(),
                roster,
                stats: None,
            },
            faction2: Faction {
                name: "bravo".to_string(),
                roster: vec![],
                stats: None,
            },
            faction1_rating: None,
            faction2_rating: None,
        }
    }

    fn api_for(room: &MatchRoom) -> FixtureApi {
        let participants = room
            .all_participants()
            .filter_map(|p| p.guid.clone().map(|guid| (guid, p.clone())))
            .collect();
        FixtureApi::new(Fixture {
            match_room: Some(room.clone()),
            participants,
            viewer: None,
        })
    }

    #[tokio::test]
    async fn test_average_is_floored_mean() {
        let room = room_with_roster(vec![
            player("a", "g-a", Some(1000)),
            player("b", "g-b", Some(1001)),
        ]);
        let api = api_for(&room);
        let caches = PipelineCaches::new();

        let avg = average_rating(
            &room,
            FactionSlot::Faction1,
            &["a".to_string(), "b".to_string()],
            DisplayMode::Legacy,
            &api,
            &caches,
        )
        .await
        .unwrap();

        // floor(2001 / 2)
        assert_eq!(avg.average_rating, 1000);
        assert_eq!(avg.name, "alpha");
    }

    #[tokio::test]
    async fn test_partial_failures_are_dropped() {
        let room = room_with_roster(vec![
            player("a", "g-a", Some(1200)),
            player("b", "g-b", None),
            player("c", "g-c", Some(1400)),
        ]);
        let api = api_for(&room);
        let caches = PipelineCaches::new();

        let avg = average_rating(
            &room,
            FactionSlot::Faction1,
            &[
                "a".to_string(),
                "b".to_string(),       // no rating for the game
                "c".to_string(),
                "ghost".to_string(),   // nickname not in the match payload
            ],
            DisplayMode::Legacy,
            &api,
            &caches,
        )
        .await
        .unwrap();

        assert_eq!(avg.average_rating, 1300);
    }

    #[tokio::test]
    async fn test_zero_resolved_members_invalidates_faction() {
        let room = room_with_roster(vec![player("a", "g-a", None)]);
        let api = api_for(&room);
        let caches = PipelineCaches::new();

        let avg = average_rating(
            &room,
            FactionSlot::Faction1,
            &["a".to_string(), "ghost".to_string()],
            DisplayMode::Legacy,
            &api,
            &caches,
        )
        .await;

        assert!(avg.is_none());
    }

    /// Counts participant lookups and fails every one of them.
    struct FailingApi {
        lookups: AtomicU32,
    }

    #[async_trait]
    impl crate::api::MatchApi for FailingApi {
        async fn fetch_match(&self, _room: &RoomId) -> Result<Option<MatchRoom>, ApiError> {
            Ok(None)
        }

        async fn fetch_quick_match(
            &self,
            _room: &RoomId,
        ) -> Result<Option<MatchRoom>, ApiError> {
            Ok(None)
        }

        async fn fetch_participant(
            &self,
            _id: &ParticipantId,
        ) -> Result<Option<Participant>, ApiError> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            Err(ApiError::Status {
                status: 500,
                message: "boom".to_string(),
            })
        }

        async fn fetch_current_viewer(&self) -> Result<Participant, ApiError> {
            Err(ApiError::NoViewer)
        }
    }

    #[tokio::test]
    async fn test_premade_rating_skips_member_resolution() {
        let mut room = room_with_roster(vec![player("a", "g-a", Some(1500))]);
        room.faction1_rating = Some(1777);
        let api = FailingApi {
            lookups: AtomicU32::new(0),
        };
        let caches = PipelineCaches::new();

        let avg = average_rating(
            &room,
            FactionSlot::Faction1,
            &["a".to_string()],
            DisplayMode::Legacy,
            &api,
            &caches,
        )
        .await
        .unwrap();

        assert_eq!(avg.average_rating, 1777);
        assert_eq!(api.lookups.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_lookup_errors_are_tolerated_individually() {
        let room = room_with_roster(vec![player("a", "g-a", Some(1500))]);
        let api = FailingApi {
            lookups: AtomicU32::new(0),
        };
        let caches = PipelineCaches::new();

        let avg = average_rating(
            &room,
            FactionSlot::Faction1,
            &["a".to_string()],
            DisplayMode::Legacy,
            &api,
            &caches,
        )
        .await;

        assert!(avg.is_none());
        assert_eq!(api.lookups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_nickname_map_is_memoized_per_room() {
        let room = room_with_roster(vec![player("a", "g-a", Some(1000))]);
        let caches = PipelineCaches::new();

        let first = map_nicknames_memoized(&room, &caches);
        let second = map_nicknames_memoized(&room, &caches);

        assert_eq!(caches.nickname_maps.computations(), 1);
        assert_eq!(first.len(), second.len());
        assert!(first.contains_key("a"));
    }
}
