//! Estimate model — aggregated faction averages and predicted rating changes.

use serde::{Deserialize, Serialize};

use super::FactionSlot;

/// Predicted rating change for a faction's members.
///
/// Both figures are non-negative magnitudes: `gain` is added on a win,
/// `loss` is subtracted on a loss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingChangeEstimate {
    pub gain: u32,
    pub loss: u32,
}

/// Which strategy produced an estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimateSource {
    /// Host-supplied win probability (authoritative when available).
    WinProbability,
    /// Heuristic curve over the two faction averages.
    RatingDifference,
}

/// A faction's aggregated average rating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactionAverage {
    /// Which slot this is.
    pub slot: FactionSlot,

    /// Faction display name.
    pub name: String,

    /// Floor of the mean of the resolved member ratings (or the host's
    /// premade figure).
    pub average_rating: i64,
}

/// Complete per-faction output of the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactionEstimate {
    pub average: FactionAverage,

    /// Own average minus the opponent's average.
    pub rating_diff: i64,

    pub estimate: RatingChangeEstimate,

    pub source: EstimateSource,
}

impl FactionEstimate {
    /// Signed diff rendered the way the page shows it (`+25` / `-25` / `0`).
    pub fn diff_label(&self) -> String {
        if self.rating_diff > 0 {
            format!("+{}", self.rating_diff)
        } else {
            self.rating_diff.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diff_label_signs() {
        let mut est = FactionEstimate {
            average: FactionAverage {
                slot: FactionSlot::Faction1,
                name: "team_a".to_string(),
                average_rating: 1200,
            },
            rating_diff: 150,
            estimate: RatingChangeEstimate { gain: 20, loss: 30 },
            source: EstimateSource::RatingDifference,
        };
        assert_eq!(est.diff_label(), "+150");

        est.rating_diff = -150;
        assert_eq!(est.diff_label(), "-150");

        est.rating_diff = 0;
        assert_eq!(est.diff_label(), "0");
    }
}
