//! Evidence rating stage over a pluggable [`RatingScorer`].

use std::sync::Arc;

use async_trait::async_trait;
use oncocurate_core::domain::fields::{EVIDENCE_RATING, STUDY_QUALITY};
use oncocurate_core::{
    CommittedFields, Document, RatingScorer, Stage, StageError, StageOutput, StudyQuality,
    WeightedRubric,
};
use serde_json::json;

/// Rates `study_quality` into `evidence_rating` (1-5 stars).
///
/// Confidence grows with how many quality signals were actually reported:
/// a rating built from an empty quality block is committed at 0.5.
#[derive(Clone)]
pub struct EvidenceRatingStage {
    scorer: Arc<dyn RatingScorer>,
}

impl EvidenceRatingStage {
    pub fn new(scorer: Arc<dyn RatingScorer>) -> Self {
        Self { scorer }
    }
}

impl Default for EvidenceRatingStage {
    fn default() -> Self {
        Self::new(Arc::new(WeightedRubric::default()))
    }
}

impl std::fmt::Debug for EvidenceRatingStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvidenceRatingStage")
            .field("scorer", &self.scorer.name())
            .finish()
    }
}

/// Fraction of the rubric's signals present in `quality`.
fn coverage(quality: &StudyQuality) -> f64 {
    let signals = [
        quality.sample_size.is_some(),
        quality.p_value.is_some(),
        quality.venue_tier != oncocurate_core::rating::VenueTier::Unknown,
        quality.controlled || quality.blinded,
        quality.replicated || quality.independently_validated,
    ];
    signals.iter().filter(|s| **s).count() as f64 / signals.len() as f64
}

#[async_trait]
impl Stage for EvidenceRatingStage {
    async fn execute(
        &self,
        _document: &Document,
        committed: &CommittedFields,
    ) -> Result<StageOutput, StageError> {
        let value = committed
            .get(STUDY_QUALITY)
            .ok_or_else(|| StageError::InvalidInput(format!("{STUDY_QUALITY} not committed")))?;
        let quality = StudyQuality::from_value(value).ok_or_else(|| {
            StageError::InvalidInput(format!("{STUDY_QUALITY} is not a study quality object"))
        })?;

        let rating = self.scorer.rate(&quality);
        let confidence = 0.5 + 0.45 * coverage(&quality);
        Ok(StageOutput::new(format!(
            "{} scored {:.2} => {} stars",
            self.scorer.name(),
            rating.score,
            rating.stars
        ))
        .field(EVIDENCE_RATING, json!(rating.stars), confidence))
    }
}
