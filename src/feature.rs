use crate::error::QualityError;
use crate::image::FingerprintImage;
use lazy_static::lazy_static;
use std::collections::HashMap;

/// Value recorded for a feature that could not be computed.
pub const FAILURE_SENTINEL: f64 = 0.0;

/// Stable string keys identifying each extracted metric.
///
/// These are the contract between feature extraction and ensemble scoring
/// and must never be renumbered or renamed; a new metric gets a new key.
pub mod ids {
    pub const ROI_AREA_RATIO: &str = "Roi_AreaRatio";
    pub const ROI_MEAN: &str = "Roi_Mean";
    pub const ROI_STD_DEV: &str = "Roi_StdDev";

    pub const OF_COHERENCE_SUM: &str = "Of_CoherenceSum";
    pub const OF_COHERENCE_REL: &str = "Of_CoherenceRel";
    /// Bucket counts of the orientation deviation histogram, `Of_Bin0`..`Of_Bin9`.
    pub const OF_BINS: [&str; 10] = [
        "Of_Bin0", "Of_Bin1", "Of_Bin2", "Of_Bin3", "Of_Bin4", "Of_Bin5", "Of_Bin6", "Of_Bin7",
        "Of_Bin8", "Of_Bin9",
    ];

    pub const FLOW_HIGH_FLOW_BLOCKS: &str = "Flow_HighFlowBlocks";
    pub const FLOW_LOW_FLOW_BLOCKS: &str = "Flow_LowFlowBlocks";
    pub const FLOW_HIGH_FLOW_RATIO: &str = "Flow_HighFlowRatio";
    pub const FLOW_LOW_FLOW_RATIO: &str = "Flow_LowFlowRatio";
    pub const FLOW_BACKGROUND_RATIO: &str = "Flow_BackgroundRatio";

    pub const MIN_COUNT: &str = "Min_Count";

    /// Key of the minutiae count inside a `w x h` rectangle centered on the
    /// minutiae center of mass.
    pub fn min_count_com_rect(w: u32, h: u32) -> String {
        format!("Min_CountComRect{w}x{h}")
    }
}

/// Identifiers of curated, human-actionable feedback values.
pub mod actionable {
    pub const EMPTY_IMAGE_OR_CONTRAST_TOO_LOW: &str = "EmptyImageOrContrastTooLow";
    pub const UNIFORM_IMAGE: &str = "UniformImage";
    pub const FINGERPRINT_IMAGE_WITH_MINUTIAE: &str = "FingerprintImageWithMinutiae";
    pub const SUFFICIENT_FINGERPRINT_FOREGROUND: &str = "SufficientFingerprintForeground";
}

/// Speed-instrumentation group names, one per analyzer module.
pub mod speed_groups {
    pub const ROI: &str = "Region of interest";
    pub const ORIENTATION: &str = "Orientation field";
    pub const FLOW: &str = "Flow map";
    pub const MINUTIAE: &str = "Minutiae";
}

lazy_static! {
    static ref ALL_FEATURE_IDS: Vec<String> = {
        let mut v: Vec<String> = vec![
            ids::ROI_AREA_RATIO.to_string(),
            ids::ROI_MEAN.to_string(),
            ids::ROI_STD_DEV.to_string(),
            ids::OF_COHERENCE_SUM.to_string(),
            ids::OF_COHERENCE_REL.to_string(),
        ];
        v.extend(ids::OF_BINS.iter().map(|s| s.to_string()));
        v.extend(
            [
                ids::FLOW_HIGH_FLOW_BLOCKS,
                ids::FLOW_LOW_FLOW_BLOCKS,
                ids::FLOW_HIGH_FLOW_RATIO,
                ids::FLOW_LOW_FLOW_RATIO,
                ids::FLOW_BACKGROUND_RATIO,
                ids::MIN_COUNT,
            ]
            .iter()
            .map(|s| s.to_string()),
        );
        v.push(ids::min_count_com_rect(200, 200));
        v
    };
}

/// All feature IDs registered across the analyzer modules, for the default
/// configuration. A static, versioned contract independent of any image.
pub fn all_feature_ids() -> Vec<String> {
    ALL_FEATURE_IDS.clone()
}

/// The curated subset of identifiers intended for remediation hints.
pub fn actionable_feedback_ids() -> Vec<&'static str> {
    vec![
        actionable::EMPTY_IMAGE_OR_CONTRAST_TOO_LOW,
        actionable::UNIFORM_IMAGE,
        actionable::FINGERPRINT_IMAGE_WITH_MINUTIAE,
        actionable::SUFFICIENT_FINGERPRINT_FOREGROUND,
    ]
}

/// All speed-instrumentation groups.
pub fn speed_feature_groups() -> Vec<&'static str> {
    vec![speed_groups::ROI, speed_groups::ORIENTATION, speed_groups::FLOW, speed_groups::MINUTIAE]
}

/// Outcome of computing a single feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureStatus {
    /// The value was computed from the image.
    Computed,
    /// The image was smaller than one analysis block.
    ImageTooSmall,
    /// No fingerprint region was detected, so region-derived metrics are undefined.
    EmptyRoi,
    /// The module failed for another reason.
    ExtractionFailed,
}

impl FeatureStatus {
    pub fn is_failure(&self) -> bool {
        !matches!(self, FeatureStatus::Computed)
    }
}

/// One named scalar quality metric.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureValue {
    pub id: String,
    pub value: f64,
    pub status: FeatureStatus,
}

impl FeatureValue {
    pub fn computed(id: impl Into<String>, value: f64) -> Self {
        Self { id: id.into(), value, status: FeatureStatus::Computed }
    }

    /// A failed feature carrying the sentinel value.
    pub fn failed(id: impl Into<String>, status: FeatureStatus) -> Self {
        Self { id: id.into(), value: FAILURE_SENTINEL, status }
    }
}

/// The aggregated feature vector of one scoring call, keyed by feature ID.
///
/// Keys are unique; iteration order is irrelevant to scoring.
#[derive(Debug, Clone, Default)]
pub struct FeatureVector {
    values: HashMap<String, FeatureValue>,
}

impl FeatureVector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a feature value. IDs across modules are disjoint by
    /// registration convention; a duplicate replaces the previous entry.
    pub fn insert(&mut self, value: FeatureValue) {
        if let Some(previous) = self.values.insert(value.id.clone(), value) {
            tracing::warn!("duplicate feature ID replaced: {}", previous.id);
        }
    }

    pub fn get(&self, id: &str) -> Option<&FeatureValue> {
        self.values.get(id)
    }

    pub fn remove(&mut self, id: &str) -> Option<FeatureValue> {
        self.values.remove(id)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FeatureValue> {
        self.values.values()
    }

    /// Number of entries carrying a failure status.
    pub fn failed_count(&self) -> usize {
        self.values.values().filter(|v| v.status.is_failure()).count()
    }
}

/// Wall time spent inside one analyzer module.
#[derive(Debug, Clone)]
pub struct FeatureSpeed {
    pub group: &'static str,
    pub ids: Vec<String>,
    pub ms: f64,
}

/// One curated remediation hint value.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionableFeedback {
    pub id: &'static str,
    pub value: f64,
}

/// Uniform capability implemented by every analyzer module.
///
/// A module owns whatever inputs it needs beyond the image (the ROI result,
/// the minutiae list) from construction, so that the aggregator can drive
/// all modules through one interface and run them concurrently.
pub trait FeatureModule: Sync {
    /// Human-readable module name, used in logs.
    fn module_name(&self) -> &'static str;

    /// Speed-instrumentation group this module reports under.
    fn speed_group(&self) -> &'static str;

    /// The feature IDs this module emits, in emission order.
    fn feature_ids(&self) -> Vec<String>;

    /// Computes this module's features for `image`.
    ///
    /// Degenerate input (empty ROI, sub-block image) is not an error: the
    /// module returns its features with a failure status and the sentinel
    /// value. `Err` is reserved for unexpected internal failures and is
    /// absorbed by the aggregator.
    fn compute(&self, image: &FingerprintImage) -> Result<Vec<FeatureValue>, QualityError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_ids_are_unique() {
        let ids = all_feature_ids();
        let mut seen = std::collections::HashSet::new();
        for id in &ids {
            assert!(seen.insert(id.clone()), "duplicate feature ID {id}");
        }
        assert_eq!(ids.len(), 22);
    }

    #[test]
    fn registry_covers_default_com_rect() {
        assert!(all_feature_ids().contains(&"Min_CountComRect200x200".to_string()));
    }

    #[test]
    fn vector_keys_are_unique() {
        let mut fv = FeatureVector::new();
        fv.insert(FeatureValue::computed(ids::MIN_COUNT, 1.0));
        fv.insert(FeatureValue::computed(ids::MIN_COUNT, 2.0));
        assert_eq!(fv.len(), 1);
        assert_eq!(fv.get(ids::MIN_COUNT).unwrap().value, 2.0);
    }

    #[test]
    fn failed_features_carry_sentinel() {
        let v = FeatureValue::failed(ids::ROI_MEAN, FeatureStatus::EmptyRoi);
        assert_eq!(v.value, FAILURE_SENTINEL);
        assert!(v.status.is_failure());
    }

    #[test]
    fn discovery_lists_are_stable() {
        assert_eq!(actionable_feedback_ids().len(), 4);
        assert_eq!(speed_feature_groups().len(), 4);
    }
}
