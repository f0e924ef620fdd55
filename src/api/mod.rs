//! Remote data access.
//!
//! The pipeline only ever talks to the host platform through the `MatchApi`
//! and `Preferences` traits. `HttpMatchApi` is the live implementation;
//! `FixtureApi` serves the CLI and tests from a single JSON document.

mod http;

pub use http::HttpMatchApi;

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{MatchRoom, Participant, ParticipantId, RoomId};

/// Errors that can occur while talking to the host platform.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No viewer session")]
    NoViewer,
}

/// Match and participant lookups against the host platform.
#[async_trait]
pub trait MatchApi: Send + Sync {
    /// Fetch a match by room id (modern pages). `None` when unknown.
    async fn fetch_match(&self, room: &RoomId) -> Result<Option<MatchRoom>, ApiError>;

    /// Fetch a match through the quick-match endpoint (legacy pages).
    async fn fetch_quick_match(&self, room: &RoomId) -> Result<Option<MatchRoom>, ApiError>;

    /// Fetch a participant record. `None` when the id resolves to nothing.
    async fn fetch_participant(&self, id: &ParticipantId)
        -> Result<Option<Participant>, ApiError>;

    /// Fetch the participant record of the currently signed-in viewer.
    async fn fetch_current_viewer(&self) -> Result<Participant, ApiError>;
}

/// Viewer preferences relevant to the feature.
#[async_trait]
pub trait Preferences: Send + Sync {
    /// When set and the viewer is in the roster, the feature suppresses
    /// itself entirely.
    async fn focus_mode(&self) -> bool;
}

/// Preferences backed by fixed values.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticPreferences {
    pub focus_mode: bool,
}

#[async_trait]
impl Preferences for StaticPreferences {
    async fn focus_mode(&self) -> bool {
        self.focus_mode
    }
}

/// A self-contained data set: one match plus the participant records its
/// roster resolves to. Doubles as the CLI input format and the test double.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Fixture {
    /// The match payload, if the room is known.
    pub match_room: Option<MatchRoom>,

    /// Participant records, keyed by id string (uuid or legacy guid).
    #[serde(default)]
    pub participants: HashMap<String, Participant>,

    /// The signed-in viewer, if any.
    pub viewer: Option<Participant>,
}

/// File-backed `MatchApi` implementation.
pub struct FixtureApi {
    fixture: Fixture,
}

impl FixtureApi {
    pub fn new(fixture: Fixture) -> Self {
        Self { fixture }
    }

    /// Load a fixture document from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ApiError> {
        let contents = std::fs::read_to_string(path)?;
        let fixture: Fixture = serde_json::from_str(&contents)?;
        Ok(Self::new(fixture))
    }
}

#[async_trait]
impl MatchApi for FixtureApi {
    async fn fetch_match(&self, room: &RoomId) -> Result<Option<MatchRoom>, ApiError> {
        Ok(self
            .fixture
            .match_room
            .clone()
            .filter(|m| &m.id == room))
    }

    async fn fetch_quick_match(&self, room: &RoomId) -> Result<Option<MatchRoom>, ApiError> {
        self.fetch_match(room).await
    }

    async fn fetch_participant(
        &self,
        id: &ParticipantId,
    ) -> Result<Option<Participant>, ApiError> {
        Ok(self.fixture.participants.get(&id.to_string()).cloned())
    }

    async fn fetch_current_viewer(&self) -> Result<Participant, ApiError> {
        self.fixture.viewer.clone().ok_or(ApiError::NoViewer)
    }
}
