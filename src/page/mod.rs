//! Page model: augmentation targets, the idempotency guard, and the
//! finalization watcher.
//!
//! The real DOM lives outside this crate; the pipeline sees the page through
//! the `PageModel` trait. What this module does own is the behavior the core
//! guarantees to its caller: each target is augmented at most once, and the
//! injected fragments disappear permanently once the authoritative result
//! indicator reports a definitive outcome.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::models::{DisplayMode, FactionSlot};

/// Marker attached to every augmented target.
pub const FEATURE_TAG: &str = "elo-estimation";

/// Opaque address of an augmentable node on the page.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TargetId(pub String);

impl TargetId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

/// Handle to an attached fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FragmentId(u64);

/// A rendered fragment, before layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    /// Average rating, signed diff vs. the opponent, and the estimate,
    /// attached under the faction name.
    FactionSummary {
        average_rating: i64,
        diff_label: String,
        gain: u32,
        loss: u32,
    },

    /// The single signed figure attached under the live score.
    ScorePoints { label: String },
}

impl fmt::Display for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fragment::FactionSummary {
                average_rating,
                diff_label,
                gain,
                loss,
            } => write!(
                f,
                "Avg. Elo: {} / Diff: {} | Est. Gain: +{} / Est. Loss: -{}",
                average_rating, diff_label, gain, loss
            ),
            Fragment::ScorePoints { label } => write!(f, "{}", label),
        }
    }
}

/// The page surface the pipeline augments.
pub trait PageModel: Send + Sync {
    /// Locate the faction-name node for a slot, if the page has one.
    fn faction_name_target(&self, slot: FactionSlot, mode: DisplayMode) -> Option<TargetId>;

    /// Locate the live-score node for a slot, if the page has one.
    fn score_target(&self, slot: FactionSlot, mode: DisplayMode) -> Option<TargetId>;

    /// Current text content of a target.
    fn target_text(&self, target: &TargetId) -> Option<String>;

    /// Whether a target already carries the feature tag.
    fn has_tag(&self, target: &TargetId) -> bool;

    /// Mark a target as augmented.
    fn set_tag(&self, target: &TargetId);

    /// Attach a fragment to a target.
    fn attach(&self, target: &TargetId, fragment: Fragment) -> FragmentId;

    /// Remove a previously attached fragment.
    fn remove(&self, fragment: &FragmentId);

    /// Total attached fragments, across all targets.
    fn fragment_count(&self) -> usize;
}

/// Attach a fragment to a target at most once.
///
/// The has-tag check and the tag set happen in one synchronous section, with
/// no suspension point in between, so repeated activations on the same
/// markup cannot double-augment.
pub fn augment_once(
    page: &dyn PageModel,
    target: &TargetId,
    fragment: Fragment,
) -> Option<FragmentId> {
    if page.has_tag(target) {
        debug!(?target, "target already augmented; skipping");
        return None;
    }
    page.set_tag(target);
    Some(page.attach(target, fragment))
}

/// Finalization state of a watched match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    Watching,
    Finalized,
}

/// Watch the authoritative result indicator until it reports a definitive
/// win/loss symbol, then remove every injected fragment and stop for good.
///
/// The returned handle resolves to `Finalized` when a result arrived, or
/// `Watching` if the indicator stream closed without one. There is no
/// re-entry: once finalized, the subscription is gone.
pub fn watch_result_indicator(
    page: Arc<dyn PageModel>,
    fragments: Vec<FragmentId>,
    mut indicator: mpsc::Receiver<String>,
) -> JoinHandle<WatchState> {
    tokio::spawn(async move {
        while let Some(text) = indicator.recv().await {
            let result = text.trim().to_string();
            if result == "W" || result == "L" {
                for fragment in &fragments {
                    page.remove(fragment);
                }
                info!(%result, "match finalized; removed injected estimates");
                return WatchState::Finalized;
            }
        }
        WatchState::Watching
    })
}

#[derive(Default)]
struct TargetState {
    text: String,
    tagged: bool,
    fragments: Vec<FragmentId>,
}

/// In-memory `PageModel`, used by the CLI and tests.
///
/// Targets are addressed `faction{n}-name` / `faction{n}-score` regardless
/// of display mode.
#[derive(Default)]
pub struct MemoryPage {
    targets: Mutex<HashMap<TargetId, TargetState>>,
    attached: Mutex<HashMap<FragmentId, (TargetId, Fragment)>>,
    next_fragment: AtomicU64,
}

impl MemoryPage {
    pub fn new() -> Self {
        Self::default()
    }

    /// A page with name and score targets for both factions, scores as given.
    pub fn with_standard_targets(score1: &str, score2: &str) -> Self {
        let page = Self::new();
        page.insert_target("faction1-name", "");
        page.insert_target("faction2-name", "");
        page.insert_target("faction1-score", score1);
        page.insert_target("faction2-score", score2);
        page
    }

    /// Add a target node with the given text content.
    pub fn insert_target(&self, id: &str, text: &str) {
        self.targets
            .lock()
            .expect("page mutex poisoned")
            .insert(
                TargetId::new(id),
                TargetState {
                    text: text.to_string(),
                    ..Default::default()
                },
            );
    }

    /// Drop a target node (for simulating missing markup).
    pub fn remove_target(&self, id: &str) {
        self.targets
            .lock()
            .expect("page mutex poisoned")
            .remove(&TargetId::new(id));
    }

    /// Fragments currently attached to one target.
    pub fn fragments_on(&self, id: &str) -> Vec<Fragment> {
        let attached = self.attached.lock().expect("page mutex poisoned");
        let target = TargetId::new(id);
        attached
            .values()
            .filter(|(t, _)| *t == target)
            .map(|(_, f)| f.clone())
            .collect()
    }

    fn lookup(&self, id: String) -> Option<TargetId> {
        let target = TargetId(id);
        self.targets
            .lock()
            .expect("page mutex poisoned")
            .contains_key(&target)
            .then_some(target)
    }
}

impl PageModel for MemoryPage {
    fn faction_name_target(&self, slot: FactionSlot, _mode: DisplayMode) -> Option<TargetId> {
        self.lookup(format!("faction{}-name", slot.display_index()))
    }

    fn score_target(&self, slot: FactionSlot, _mode: DisplayMode) -> Option<TargetId> {
        self.lookup(format!("faction{}-score", slot.display_index()))
    }

    fn target_text(&self, target: &TargetId) -> Option<String> {
        self.targets
            .lock()
            .expect("page mutex poisoned")
            .get(target)
            .map(|t| t.text.clone())
    }

    fn has_tag(&self, target: &TargetId) -> bool {
        self.targets
            .lock()
            .expect("page mutex poisoned")
            .get(target)
            .map(|t| t.tagged)
            .unwrap_or(false)
    }

    fn set_tag(&self, target: &TargetId) {
        if let Some(state) = self
            .targets
            .lock()
            .expect("page mutex poisoned")
            .get_mut(target)
        {
            state.tagged = true;
        }
    }

    fn attach(&self, target: &TargetId, fragment: Fragment) -> FragmentId {
        let id = FragmentId(self.next_fragment.fetch_add(1, Ordering::Relaxed));

        self.attached
            .lock()
            .expect("page mutex poisoned")
            .insert(id, (target.clone(), fragment));

        if let Some(state) = self
            .targets
            .lock()
            .expect("page mutex poisoned")
            .get_mut(target)
        {
            state.fragments.push(id);
        }

        id
    }

    fn remove(&self, fragment: &FragmentId) {
        if let Some((target, _)) = self
            .attached
            .lock()
            .expect("page mutex poisoned")
            .remove(fragment)
        {
            if let Some(state) = self
                .targets
                .lock()
                .expect("page mutex poisoned")
                .get_mut(&target)
            {
                state.fragments.retain(|f| f != fragment);
            }
        }
    }

    fn fragment_count(&self) -> usize {
        self.attached.lock().expect("page mutex poisoned").len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary_fragment() -> Fragment {
        Fragment::FactionSummary {
            average_rating: 1200,
            diff_label: "+100".to_string(),
            gain: 20,
            loss: 30,
        }
    }

    #[test]
    fn test_augment_once_is_idempotent() {
        let page = MemoryPage::with_standard_targets("0", "0");
        let target = TargetId::new("faction1-name");

        let first = augment_once(&page, &target, summary_fragment());
        assert!(first.is_some());

        let second = augment_once(&page, &target, summary_fragment());
        assert!(second.is_none());

        assert_eq!(page.fragments_on("faction1-name").len(), 1);
        assert_eq!(page.fragment_count(), 1);
    }

    #[test]
    fn test_fragment_rendering() {
        let summary = summary_fragment();
        assert_eq!(
            summary.to_string(),
            "Avg. Elo: 1200 / Diff: +100 | Est. Gain: +20 / Est. Loss: -30"
        );

        let points = Fragment::ScorePoints {
            label: "+20".to_string(),
        };
        assert_eq!(points.to_string(), "+20");
    }

    #[test]
    fn test_missing_target_lookup() {
        let page = MemoryPage::with_standard_targets("0", "0");
        page.remove_target("faction2-score");

        assert!(page
            .score_target(FactionSlot::Faction1, DisplayMode::Modern)
            .is_some());
        assert!(page
            .score_target(FactionSlot::Faction2, DisplayMode::Modern)
            .is_none());
    }

    #[tokio::test]
    async fn test_watcher_removes_fragments_on_result() {
        let page = Arc::new(MemoryPage::with_standard_targets("1", "0"));
        let t1 = TargetId::new("faction1-name");
        let t2 = TargetId::new("faction2-name");

        let f1 = augment_once(page.as_ref(), &t1, summary_fragment()).unwrap();
        let f2 = augment_once(page.as_ref(), &t2, summary_fragment()).unwrap();
        assert_eq!(page.fragment_count(), 2);

        let (tx, rx) = mpsc::channel(8);
        let handle =
            watch_result_indicator(page.clone() as Arc<dyn PageModel>, vec![f1, f2], rx);

        // Noise before the definitive symbol is ignored.
        tx.send("  ".to_string()).await.unwrap();
        tx.send("1 - 0".to_string()).await.unwrap();
        assert_eq!(page.fragment_count(), 2);

        tx.send("W".to_string()).await.unwrap();
        let state = handle.await.unwrap();

        assert_eq!(state, WatchState::Finalized);
        assert_eq!(page.fragment_count(), 0);

        // The subscription ended with the transition; later mutations reach
        // nothing and nothing is re-added.
        assert!(tx.send("L".to_string()).await.is_err());
        assert_eq!(page.fragment_count(), 0);
    }

    #[tokio::test]
    async fn test_watcher_stream_closed_without_result() {
        let page = Arc::new(MemoryPage::with_standard_targets("0", "0"));
        let t1 = TargetId::new("faction1-name");
        let f1 = augment_once(page.as_ref(), &t1, summary_fragment()).unwrap();

        let (tx, rx) = mpsc::channel(8);
        let handle = watch_result_indicator(page.clone() as Arc<dyn PageModel>, vec![f1], rx);

        drop(tx);
        let state = handle.await.unwrap();

        assert_eq!(state, WatchState::Watching);
        assert_eq!(page.fragment_count(), 1);
    }
}
