//! Roster resolution from match-room markup.
//!
//! Stand-in for the page's DOM query layer: given a snapshot of the
//! match-room markup, detect which markup generation rendered it and pull
//! the ordered member nicknames of both team sections. The host has served
//! two generations of the page; the section pattern that matches decides the
//! `DisplayMode` for everything downstream.

use regex::Regex;
use scraper::{Html, Selector};
use tracing::debug;

use crate::models::{DisplayMode, FactionSlot, MatchRoom, RoomId};

const LEGACY_TEAM: &str = r#"div[class*="match-team"]"#;
const LEGACY_NICKNAME: &str = r#"strong[ng-bind*="nickname"]"#;

const MODERN_TEAM: &str = r#"div[class*="MatchTeam__Holder"]"#;
const MODERN_NICKNAME: &str = r#"div[class*="Nickname__Name"]"#;

/// Ordered member nicknames of one team section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamRoster {
    pub slot: FactionSlot,
    pub nicknames: Vec<String>,
}

/// What the markup layer hands the pipeline: the detected rendering mode and
/// both team sections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterView {
    pub mode: DisplayMode,
    pub teams: [TeamRoster; 2],
}

impl RosterView {
    pub fn nicknames(&self, slot: FactionSlot) -> &[String] {
        &self.teams[slot.display_index() - 1].nicknames
    }

    /// Build a roster view straight from a match payload, for runs that have
    /// no markup snapshot (fixture files, the CLI).
    pub fn from_match(room: &MatchRoom, mode: DisplayMode) -> Self {
        let team = |slot: FactionSlot| TeamRoster {
            slot,
            nicknames: room
                .faction(slot)
                .roster
                .iter()
                .map(|p| p.nickname.clone())
                .collect(),
        };

        Self {
            mode,
            teams: [team(FactionSlot::Faction1), team(FactionSlot::Faction2)],
        }
    }
}

/// Extract the room id from a match-room page URL.
pub fn room_id_from_url(url: &str) -> Option<RoomId> {
    let pattern =
        Regex::new(r"/(?:room|match)/([A-Za-z0-9][A-Za-z0-9-]*)").expect("valid room id pattern");
    pattern
        .captures(url)
        .map(|caps| RoomId::from(caps[1].to_string()))
}

/// Resolve both team sections from a markup snapshot.
///
/// Either zero or two sections exist on a well-formed match-room page;
/// anything else resolves to `None`.
pub fn resolve_roster(html: &str) -> Option<RosterView> {
    let document = Html::parse_document(html);

    if let Some(view) = resolve_mode(&document, DisplayMode::Modern, MODERN_TEAM, MODERN_NICKNAME)
    {
        return Some(view);
    }
    resolve_mode(&document, DisplayMode::Legacy, LEGACY_TEAM, LEGACY_NICKNAME)
}

fn resolve_mode(
    document: &Html,
    mode: DisplayMode,
    team_pattern: &str,
    nickname_pattern: &str,
) -> Option<RosterView> {
    let team_selector = Selector::parse(team_pattern).expect("valid team selector");
    let nickname_selector = Selector::parse(nickname_pattern).expect("valid nickname selector");

    let sections: Vec<_> = document.select(&team_selector).collect();
    if sections.len() != 2 {
        if !sections.is_empty() {
            debug!(?mode, count = sections.len(), "unexpected team section count");
        }
        return None;
    }

    let mut teams = Vec::with_capacity(2);
    for (section, slot) in sections.into_iter().zip(FactionSlot::BOTH) {
        let nicknames = section
            .select(&nickname_selector)
            .map(|node| node.text().collect::<String>().trim().to_string())
            .filter(|name| !name.is_empty())
            .collect();
        teams.push(TeamRoster { slot, nicknames });
    }

    let [faction1, faction2] = <[TeamRoster; 2]>::try_from(teams).ok()?;

    Some(RosterView {
        mode,
        teams: [faction1, faction2],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const MODERN_PAGE: &str = r#"
        <div class="MatchTeam__Holder-abc">
            <div class="Nickname__Name-x1"> ace </div>
            <div class="Nickname__Name-x2">bolt</div>
        </div>
        <div class="MatchTeam__Holder-def">
            <div class="Nickname__Name-y1">crow</div>
        </div>
    "#;

    const LEGACY_PAGE: &str = r#"
        <div class="match-team left">
            <strong ng-bind="member.nickname">ace</strong>
        </div>
        <div class="match-team right">
            <strong ng-bind="member.nickname">crow</strong>
            <strong ng-bind="member.nickname">dusk</strong>
        </div>
    "#;

    #[test]
    fn test_resolve_modern_page() {
        let view = resolve_roster(MODERN_PAGE).unwrap();

        assert_eq!(view.mode, DisplayMode::Modern);
        assert_eq!(
            view.nicknames(FactionSlot::Faction1),
            &["ace".to_string(), "bolt".to_string()]
        );
        assert_eq!(view.nicknames(FactionSlot::Faction2), &["crow".to_string()]);
    }

    #[test]
    fn test_resolve_legacy_page() {
        let view = resolve_roster(LEGACY_PAGE).unwrap();

        assert_eq!(view.mode, DisplayMode::Legacy);
        assert_eq!(view.nicknames(FactionSlot::Faction1), &["ace".to_string()]);
        assert_eq!(
            view.nicknames(FactionSlot::Faction2),
            &["crow".to_string(), "dusk".to_string()]
        );
    }

    #[test]
    fn test_resolve_requires_two_sections() {
        let one_section = r#"<div class="MatchTeam__Holder-a"></div>"#;
        assert!(resolve_roster(one_section).is_none());

        assert!(resolve_roster("<p>nothing here</p>").is_none());
    }

    #[test]
    fn test_room_id_from_url() {
        assert_eq!(
            room_id_from_url("https://host.example/en/cs2/room/1-abc-def/scoreboard"),
            Some(RoomId::from("1-abc-def"))
        );
        assert_eq!(
            room_id_from_url("https://host.example/match/xyz42"),
            Some(RoomId::from("xyz42"))
        );
        assert_eq!(room_id_from_url("https://host.example/profile/ace"), None);
    }

    #[test]
    fn test_roster_view_from_match() {
        use crate::models::{Faction, MatchState, Participant};
        use std::collections::HashMap;

        let member = |nickname: &str| Participant {
            nickname: nickname.to_string(),
            id: None,
            guid: None,
            games: HashMap::new(),
        };

        let room = MatchRoom {
            id: RoomId::from("room-1"),
            state: MatchState::Ongoing,
            game: "cs2".to_string(),
            started_at: None,
            faction1: Faction {
                name: "alpha".to_string(),
                roster: vec![member("ace"), member("bolt")],
                stats: None,
            },
            faction2: Faction {
                name: "bravo".to_string(),
                roster: vec![member("crow")],
                stats: None,
            },
            faction1_rating: None,
            faction2_rating: None,
        };

        let view = RosterView::from_match(&room, DisplayMode::Modern);
        assert_eq!(view.nicknames(FactionSlot::Faction1).len(), 2);
        assert_eq!(view.nicknames(FactionSlot::Faction2), &["crow".to_string()]);
    }
}
