use crate::feature::{ActionableFeedback, FeatureSpeed, FeatureVector};
use crate::scorer::QualityScore;

/// Result of one scoring call.
///
/// Everything the pipeline produced is queryable after the call: the final
/// score, the full feature vector (including per-feature failure statuses),
/// the per-module timings when instrumentation was enabled, and the curated
/// remediation hints.
#[derive(Debug, Clone)]
pub struct Assessment {
    /// Ensemble prediction, rounded and clamped to `0..=100`.
    pub score: QualityScore,
    pub features: FeatureVector,
    /// Per-module wall times; empty unless `measure_speed` was set.
    pub speeds: Vec<FeatureSpeed>,
    pub actionable: Vec<ActionableFeedback>,
}

impl Assessment {
    /// Whether any feature carries a failure status.
    pub fn has_failed_features(&self) -> bool {
        self.features.failed_count() > 0
    }
}
