//! Evidence rating: a pluggable scorer over study-quality signals.
//!
//! The default [`WeightedRubric`] scores five factors in `[0, 1]` and maps
//! the weighted sum to 1-5 stars as `1 + round(4 * score)`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Publication venue tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VenueTier {
    High,
    Medium,
    Low,
    #[default]
    Unknown,
}

/// Study-quality signals extracted from a publication.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StudyQuality {
    pub sample_size: Option<u64>,
    pub p_value: Option<f64>,
    pub confidence_interval_reported: bool,
    pub venue_tier: VenueTier,
    pub controlled: bool,
    pub blinded: bool,
    pub independently_validated: bool,
    pub replicated: bool,
    /// The therapy under study carries regulatory approval for this use.
    pub fda_approved: bool,
}

impl StudyQuality {
    /// Parse from a committed `study_quality` value; `None` if malformed.
    pub fn from_value(value: &Value) -> Option<Self> {
        serde_json::from_value(value.clone()).ok()
    }
}

/// Per-factor scores, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatingFactors {
    pub sample_size: f64,
    pub statistical_rigor: f64,
    pub venue: f64,
    pub controls: f64,
    pub reproducibility: f64,
}

impl RatingFactors {
    pub fn from_quality(quality: &StudyQuality) -> Self {
        let sample_size = match quality.sample_size {
            None | Some(0) => 0.0,
            Some(n) if n >= 500 => 1.0,
            Some(n) if n >= 100 => 0.75,
            Some(n) if n >= 50 => 0.5,
            Some(n) if n >= 10 => 0.25,
            Some(_) => 0.1,
        };
        let p_score: f64 = match quality.p_value {
            Some(p) if p < 0.001 => 0.8,
            Some(p) if p < 0.01 => 0.6,
            Some(p) if p < 0.05 => 0.4,
            Some(_) => 0.1,
            None => 0.0,
        };
        let ci_score = if quality.confidence_interval_reported { 0.2 } else { 0.0 };
        let venue = match quality.venue_tier {
            VenueTier::High => 1.0,
            VenueTier::Medium => 0.6,
            VenueTier::Low => 0.3,
            VenueTier::Unknown => 0.0,
        };
        let controls = flag(quality.controlled, 0.6) + flag(quality.blinded, 0.4);
        let reproducibility =
            flag(quality.replicated, 0.5) + flag(quality.independently_validated, 0.5);

        Self {
            sample_size,
            statistical_rigor: (p_score + ci_score).min(1.0),
            venue,
            controls,
            reproducibility,
        }
    }
}

fn flag(set: bool, weight: f64) -> f64 {
    if set {
        weight
    } else {
        0.0
    }
}

/// Scored rating.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    /// 1 to 5.
    pub stars: u8,
    /// Weighted factor sum in `[0, 1]`.
    pub score: f64,
    pub factors: RatingFactors,
}

/// Strategy for turning study quality into a star rating.
pub trait RatingScorer: Send + Sync {
    fn name(&self) -> &str;

    fn rate(&self, quality: &StudyQuality) -> Rating;
}

/// Factor weights; they should sum to 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightedRubric {
    pub sample_size: f64,
    pub statistical_rigor: f64,
    pub venue: f64,
    pub controls: f64,
    pub reproducibility: f64,
}

impl Default for WeightedRubric {
    fn default() -> Self {
        Self {
            sample_size: 0.25,
            statistical_rigor: 0.25,
            venue: 0.15,
            controls: 0.15,
            reproducibility: 0.20,
        }
    }
}

impl RatingScorer for WeightedRubric {
    fn name(&self) -> &str {
        "weighted_rubric"
    }

    fn rate(&self, quality: &StudyQuality) -> Rating {
        let factors = RatingFactors::from_quality(quality);
        let score = (self.sample_size * factors.sample_size
            + self.statistical_rigor * factors.statistical_rigor
            + self.venue * factors.venue
            + self.controls * factors.controls
            + self.reproducibility * factors.reproducibility)
            .clamp(0.0, 1.0);
        let stars = (1.0 + (4.0 * score).round()).clamp(1.0, 5.0) as u8;
        Rating {
            stars,
            score,
            factors,
        }
    }
}
