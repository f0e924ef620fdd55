//! Rating change prediction.
//!
//! Two mutually exclusive strategies per faction:
//! - `predict_from_win_probability` when the host supplies team statistics
//!   (authoritative when available);
//! - `estimate_rating_change` as a heuristic over the two faction averages.
//!
//! Both share the asymmetric-stakes shape of skill-rating systems: the more
//! likely a side is to win, the less it gains on a win and the more it loses
//! on a loss. The calibration constants approximate the host's non-public
//! formula and are configuration, not load-bearing truth.

use serde::{Deserialize, Serialize};

use crate::models::RatingChangeEstimate;

/// Calibration constants for the estimation curves.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CurveConfig {
    /// Maximum swing of a single match.
    #[serde(default = "default_k_factor")]
    pub k_factor: f64,

    /// Rating-difference scale of the logistic expected-score curve.
    #[serde(default = "default_rating_scale")]
    pub rating_scale: f64,

    /// Base of the logistic expected-score curve.
    #[serde(default = "default_curve_base")]
    pub curve_base: f64,
}

fn default_k_factor() -> f64 {
    50.0
}

fn default_rating_scale() -> f64 {
    400.0
}

fn default_curve_base() -> f64 {
    10.0
}

impl Default for CurveConfig {
    fn default() -> Self {
        Self {
            k_factor: default_k_factor(),
            rating_scale: default_rating_scale(),
            curve_base: default_curve_base(),
        }
    }
}

/// Expected score of the `own` side against `opponent`, in (0, 1).
pub fn expected_score(own: i64, opponent: i64, curve: &CurveConfig) -> f64 {
    let diff = (opponent - own) as f64;
    1.0 / (1.0 + curve.curve_base.powf(diff / curve.rating_scale))
}

/// Estimate {gain, loss} from a host-supplied win probability.
pub fn predict_from_win_probability(
    win_probability: f64,
    curve: &CurveConfig,
) -> RatingChangeEstimate {
    let p = win_probability.clamp(0.0, 1.0);
    RatingChangeEstimate {
        gain: (curve.k_factor * (1.0 - p)).round() as u32,
        loss: (curve.k_factor * p).round() as u32,
    }
}

/// Estimate {gain, loss} from the pair of faction averages.
pub fn estimate_rating_change(
    own_average: i64,
    opponent_average: i64,
    curve: &CurveConfig,
) -> RatingChangeEstimate {
    let expected = expected_score(own_average, opponent_average, curve);
    RatingChangeEstimate {
        gain: (curve.k_factor * (1.0 - expected)).round() as u32,
        loss: (curve.k_factor * expected).round() as u32,
    }
}
