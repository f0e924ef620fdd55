//! # Matchroom Elo
//!
//! Live rating-change estimation for competitive match rooms.
//!
//! ## Architecture
//!
//! - **models**: Core data structures (matches, factions, participants, estimates)
//! - **api**: Host platform lookups behind the `MatchApi`/`Preferences` seams
//! - **aggregate**: Concurrent roster resolution into per-faction averages
//! - **predict**: Rating-change curves (win-probability and heuristic)
//! - **memo**: Page-view-scoped memoization
//! - **markup**: Roster resolution from match-room markup snapshots
//! - **page**: Page surface, augmentation idempotency, finalization watcher
//! - **pipeline**: Orchestration of one match-page activation
//! - **config**: Configuration loading and validation

pub mod aggregate;
pub mod api;
pub mod config;
pub mod markup;
pub mod memo;
pub mod models;
pub mod page;
pub mod pipeline;
pub mod predict;

pub use models::*;
