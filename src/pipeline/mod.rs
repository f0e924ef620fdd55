//! Pipeline orchestration.
//!
//! Drives one match-page activation end to end: fetch the match, resolve the
//! roster into per-faction averages, predict the rating change per faction,
//! augment the page, and hand the injected fragments to the finalization
//! watcher. Every precondition miss is a silent no-op; nothing here is fatal
//! to the host page.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::aggregate;
use crate::api::{MatchApi, Preferences};
use crate::markup::RosterView;
use crate::memo::PipelineCaches;
use crate::models::{
    DisplayMode, EstimateSource, FactionAverage, FactionEstimate, FactionSlot, MatchRoom,
    RatingChangeEstimate, RoomId,
};
use crate::page::{
    augment_once, watch_result_indicator, Fragment, FragmentId, PageModel, WatchState,
};
use crate::predict::{estimate_rating_change, predict_from_win_probability, CurveConfig};

/// Why an activation declined to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Match not found or unreachable.
    MatchUnavailable,
    /// Match already reached a terminal state.
    MatchFinished,
    /// Focus mode is on and the viewer is in the roster.
    FocusMode,
    /// Fewer than two factions produced a valid average.
    InvalidFactions,
}

/// Result of one activation.
pub enum PipelineOutcome {
    /// Estimates were produced; fragments are attached to the page, and the
    /// watcher (when an indicator subscription was supplied and both faction
    /// targets were augmented) will clean them up on finalization.
    Estimated {
        estimates: Vec<FactionEstimate>,
        fragments: Vec<FragmentId>,
        watcher: Option<JoinHandle<WatchState>>,
    },

    /// The feature declined to render. Not an error.
    Skipped(SkipReason),
}

impl PipelineOutcome {
    pub fn skip_reason(&self) -> Option<SkipReason> {
        match self {
            PipelineOutcome::Skipped(reason) => Some(*reason),
            PipelineOutcome::Estimated { .. } => None,
        }
    }
}

/// The estimation pipeline for one page view.
///
/// Holds the memoization caches, so repeat activations on the same view skip
/// recomputation.
pub struct EstimationPipeline<A, P> {
    api: A,
    preferences: P,
    curve: CurveConfig,
    caches: PipelineCaches,
}

impl<A: MatchApi, P: Preferences> EstimationPipeline<A, P> {
    pub fn new(api: A, preferences: P, curve: CurveConfig) -> Self {
        Self {
            api,
            preferences,
            curve,
            caches: PipelineCaches::new(),
        }
    }

    pub fn caches(&self) -> &PipelineCaches {
        &self.caches
    }

    /// Run one activation against a page.
    ///
    /// `indicator` is the subscription to the authoritative result
    /// indicator; pass `None` to skip finalization watching (the CLI does).
    pub async fn run(
        &self,
        room_id: &RoomId,
        roster: &RosterView,
        page: Arc<dyn PageModel>,
        indicator: Option<mpsc::Receiver<String>>,
    ) -> PipelineOutcome {
        let Some(room) = self.fetch_room(room_id, roster.mode).await else {
            return PipelineOutcome::Skipped(SkipReason::MatchUnavailable);
        };

        if room.state.is_finished() {
            debug!(%room_id, "match already finished");
            return PipelineOutcome::Skipped(SkipReason::MatchFinished);
        }

        if self.suppressed_by_focus_mode(&room).await {
            info!(%room_id, "viewer is playing and focus mode is on");
            return PipelineOutcome::Skipped(SkipReason::FocusMode);
        }

        let Some(estimates) = self.estimate_factions(&room, roster).await else {
            return PipelineOutcome::Skipped(SkipReason::InvalidFactions);
        };

        // No mid-flight cancellation: the computation always completes, and
        // only a freshly re-read state can stop the render.
        match self.fetch_room(room_id, roster.mode).await {
            Some(fresh) if fresh.state.is_finished() => {
                debug!(%room_id, "match finished during aggregation; not rendering");
                return PipelineOutcome::Skipped(SkipReason::MatchFinished);
            }
            _ => {}
        }

        let (fragments, faction_targets_augmented) =
            self.augment(&estimates, roster.mode, page.as_ref());

        let watcher = match indicator {
            Some(receiver) if faction_targets_augmented == 2 => Some(watch_result_indicator(
                page,
                fragments.clone(),
                receiver,
            )),
            _ => None,
        };

        PipelineOutcome::Estimated {
            estimates,
            fragments,
            watcher,
        }
    }

    async fn fetch_room(&self, room_id: &RoomId, mode: DisplayMode) -> Option<MatchRoom> {
        let fetched = match mode {
            DisplayMode::Legacy => self.api.fetch_quick_match(room_id).await,
            DisplayMode::Modern => self.api.fetch_match(room_id).await,
        };

        match fetched {
            Ok(room) => room,
            Err(err) => {
                warn!(%room_id, error = %err, "match lookup failed");
                None
            }
        }
    }

    async fn suppressed_by_focus_mode(&self, room: &MatchRoom) -> bool {
        if !self.preferences.focus_mode().await {
            return false;
        }

        let nicknames_to_players = aggregate::map_nicknames_memoized(room, &self.caches);

        match self.api.fetch_current_viewer().await {
            Ok(viewer) => nicknames_to_players.contains_key(&viewer.nickname),
            Err(err) => {
                debug!(error = %err, "no viewer session; focus mode not applied");
                false
            }
        }
    }

    /// Aggregate both factions concurrently and predict each side's change
    /// from the opponent's average. `None` unless exactly two factions are
    /// valid.
    async fn estimate_factions(
        &self,
        room: &MatchRoom,
        roster: &RosterView,
    ) -> Option<Vec<FactionEstimate>> {
        let (faction1, faction2) = tokio::join!(
            aggregate::average_rating(
                room,
                FactionSlot::Faction1,
                roster.nicknames(FactionSlot::Faction1),
                roster.mode,
                &self.api,
                &self.caches,
            ),
            aggregate::average_rating(
                room,
                FactionSlot::Faction2,
                roster.nicknames(FactionSlot::Faction2),
                roster.mode,
                &self.api,
                &self.caches,
            ),
        );

        let averages: Vec<FactionAverage> = [faction1, faction2].into_iter().flatten().collect();

        if averages.len() != 2 {
            debug!(valid = averages.len(), "need exactly two valid factions");
            return None;
        }

        let estimates = averages
            .iter()
            .enumerate()
            .map(|(i, own)| {
                let opponent = &averages[1 - i];
                let (estimate, source) = self.estimate_one(room, own, opponent);

                FactionEstimate {
                    average: own.clone(),
                    rating_diff: own.average_rating - opponent.average_rating,
                    estimate,
                    source,
                }
            })
            .collect();

        Some(estimates)
    }

    fn estimate_one(
        &self,
        room: &MatchRoom,
        own: &FactionAverage,
        opponent: &FactionAverage,
    ) -> (RatingChangeEstimate, EstimateSource) {
        if let Some(stats) = room.stats(own.slot) {
            return (
                predict_from_win_probability(stats.win_probability, &self.curve),
                EstimateSource::WinProbability,
            );
        }

        let key = (own.average_rating, opponent.average_rating);
        let estimate = self
            .caches
            .estimates
            .get_or_insert_with(key, || {
                estimate_rating_change(key.0, key.1, &self.curve)
            });

        (estimate, EstimateSource::RatingDifference)
    }

    /// Attach fragments for every estimate. A missing or already-tagged
    /// target declines that element only; the sibling faction is unaffected.
    /// Returns the attached fragments and how many faction-name targets were
    /// augmented.
    fn augment(
        &self,
        estimates: &[FactionEstimate],
        mode: DisplayMode,
        page: &dyn PageModel,
    ) -> (Vec<FragmentId>, usize) {
        let mut fragments = Vec::new();
        let mut faction_targets_augmented = 0;

        for est in estimates {
            let slot = est.average.slot;

            let Some(name_target) = page.faction_name_target(slot, mode) else {
                debug!(%slot, "no faction name target; skipping element");
                continue;
            };

            let summary = Fragment::FactionSummary {
                average_rating: est.average.average_rating,
                diff_label: est.diff_label(),
                gain: est.estimate.gain,
                loss: est.estimate.loss,
            };

            if let Some(fragment) = augment_once(page, &name_target, summary) {
                fragments.push(fragment);
                faction_targets_augmented += 1;
            }

            let Some(score_target) = page.score_target(slot, mode) else {
                continue;
            };

            let leading = page
                .target_text(&score_target)
                .and_then(|text| text.trim().parse::<f64>().ok())
                .map_or(false, |score| score == 1.0);
            let label = if leading {
                format!("+{}", est.estimate.gain)
            } else {
                format!("-{}", est.estimate.loss)
            };

            if let Some(fragment) =
                augment_once(page, &score_target, Fragment::ScorePoints { label })
            {
                fragments.push(fragment);
            }
        }

        (fragments, faction_targets_augmented)
    }
}
