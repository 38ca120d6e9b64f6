//! Confidence routing.
//!
//! Decides whether an extraction must be reviewed by a person before it may be
//! turned into business records. The decision is advisory: callers choose
//! whether to block on it.

use tenderdesk_core::models::{Confidence, ReviewDecision};

pub const DEFAULT_REVIEW_THRESHOLD: f64 = 0.70;

/// Route an extraction by its confidence.
///
/// Review is mandatory when the overall score is below `threshold` or when no
/// overall score exists. Fields scoring below `threshold` are flagged on their
/// own, whatever the overall score.
pub fn route(confidence: Option<&Confidence>, threshold: f64) -> ReviewDecision {
    let Some(confidence) = confidence else {
        return ReviewDecision {
            requires_review: true,
            overall_below_threshold: false,
            missing_confidence: true,
            flagged_fields: Vec::new(),
            threshold,
        };
    };

    let flagged_fields: Vec<String> = confidence
        .fields
        .iter()
        .filter(|(_, score)| **score < threshold)
        .map(|(name, _)| name.clone())
        .collect();

    let (missing_confidence, overall_below_threshold) = match confidence.overall {
        Some(overall) => (false, overall < threshold),
        None => (true, false),
    };

    ReviewDecision {
        requires_review: missing_confidence || overall_below_threshold,
        overall_below_threshold,
        missing_confidence,
        flagged_fields,
        threshold,
    }
}
