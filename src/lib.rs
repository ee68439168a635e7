#![forbid(unsafe_code)]

//! # ridgescore
//!
//! Fingerprint image quality assessment.
//!
//! This crate computes a single 0-100 quality score for a grayscale
//! fingerprint image in two stages:
//! - a fixed set of named scalar metrics is extracted through block-based
//!   image analysis (region of interest, orientation field, ridge-flow map)
//!   and minutiae statistics;
//! - a pre-trained decision-tree ensemble is evaluated over the aggregated
//!   feature vector.
//!
//! Image decoding and minutiae extraction are external collaborators: the
//! pipeline consumes a decoded [`FingerprintImage`] and an optional list of
//! [`Minutia`] records, and tolerates both an empty region of interest and
//! an empty minutiae list.

// Core data types
pub mod error;
pub mod grid;
pub mod image;

// Analyzer modules
pub mod flow;
pub mod minutiae;
pub mod orientation;
pub mod roi;

// Feature contract and aggregation
pub mod aggregator;
pub mod feature;
pub mod output;

// Ensemble model and scoring
pub mod model;
pub mod model_parse;
pub mod scorer;

// Display implementations
pub mod display;

// Re-export main types for convenience
pub use crate::error::QualityError;
pub use crate::feature::{FeatureStatus, FeatureValue, FeatureVector};
pub use crate::image::FingerprintImage;
pub use crate::minutiae::{Minutia, MinutiaKind, MinutiaeProvider};
pub use crate::model::{Ensemble, ModelInfo};
pub use crate::output::Assessment;
pub use crate::scorer::QualityScore;

use tracing::warn;

/// Configuration for image analysis.
///
/// The numeric thresholds are empirically tuned together with the trained
/// ensemble; they are part of the model's contract, and a model trained
/// against different constants must ship its own configuration.
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    /// Block size of the ROI and flow analyzers, pixels.
    pub block_size: u32,
    /// Block size of the orientation-field analyzer, pixels.
    pub orientation_block_size: u32,
    /// A block is ROI only above this gray-value standard deviation.
    pub roi_stddev_threshold: f64,
    /// A block is ROI only if one of its pixels is darker than this.
    pub black_pixel_cutoff: u8,
    /// Blocks below this gradient-magnitude standard deviation are low-flow.
    pub flow_stddev_threshold: f64,
    /// Widen the flow window by one block on each side.
    pub use_surrounding_window: bool,
    /// Boundaries of the orientation deviation histogram, ascending.
    pub of_hist_limits: [f64; 9],
    /// Rectangle sizes counted around the minutiae center of mass.
    pub com_rect_sizes: Vec<(u32, u32)>,
    /// Run independent analyzer modules concurrently.
    pub parallel_enabled: bool,
    /// Record wall time per analyzer module.
    pub measure_speed: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            block_size: 32,
            orientation_block_size: 16,
            roi_stddev_threshold: 8.0,
            black_pixel_cutoff: 16,
            flow_stddev_threshold: 10.0,
            use_surrounding_window: true,
            of_hist_limits: orientation::OF_HIST_LIMITS,
            com_rect_sizes: vec![(200, 200)],
            parallel_enabled: true,
            measure_speed: false,
        }
    }
}

impl AnalysisConfig {
    fn validate(&self) -> Result<(), QualityError> {
        if self.block_size == 0 || self.orientation_block_size == 0 {
            return Err(QualityError::MissConfiguration(
                "block sizes must be at least one pixel".to_string(),
            ));
        }
        if self.of_hist_limits.windows(2).any(|w| w[0] >= w[1]) {
            return Err(QualityError::MissConfiguration(
                "histogram limits must be strictly ascending".to_string(),
            ));
        }
        if self.com_rect_sizes.iter().any(|&(w, h)| w == 0 || h == 0) {
            return Err(QualityError::MissConfiguration(
                "COM rectangle sizes must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// The scoring engine: feature extraction plus ensemble evaluation.
///
/// `QualityEngine` borrows a loaded [`Ensemble`]; the ensemble is immutable
/// after construction and one instance can back any number of engines and
/// concurrent scoring calls. Each call is synchronous and deterministic.
pub struct QualityEngine<'a> {
    ensemble: &'a Ensemble,
    config: AnalysisConfig,
}

impl<'a> QualityEngine<'a> {
    /// Creates an engine over a loaded ensemble.
    ///
    /// # Errors
    /// Returns `QualityError::MissConfiguration` when `config` is
    /// inconsistent (zero block size, non-ascending histogram limits,
    /// zero-sized COM rectangles).
    pub fn new(ensemble: &'a Ensemble, config: Option<AnalysisConfig>) -> Result<Self, QualityError> {
        let config = config.unwrap_or_default();
        config.validate()?;
        Ok(Self { ensemble, config })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Hash of the ensemble backing this engine.
    pub fn parameter_hash(&self) -> &str {
        self.ensemble.parameter_hash()
    }

    /// Scores `image` with an externally supplied minutiae list.
    ///
    /// # Errors
    /// Only structural input problems surface as errors (the image type
    /// itself enforces buffer consistency). Per-feature failures are
    /// absorbed into the feature vector and the ensemble still produces a
    /// bounded score.
    pub fn assess(
        &self,
        image: &FingerprintImage,
        minutiae: &[Minutia],
    ) -> Result<Assessment, QualityError> {
        let (features, speeds) = aggregator::compute_features(image, minutiae, &self.config)?;
        let actionable = aggregator::actionable_feedback(image, &features);
        let score = self.ensemble.evaluate(&features);
        Ok(Assessment { score, features, speeds, actionable })
    }

    /// Scores `image`, obtaining minutiae from `provider`.
    ///
    /// Extraction failure is treated as zero minutiae, not a fatal error.
    pub fn assess_with_provider(
        &self,
        image: &FingerprintImage,
        provider: &dyn MinutiaeProvider,
    ) -> Result<Assessment, QualityError> {
        let minutiae = match provider.extract(image) {
            Ok(minutiae) => minutiae,
            Err(e) => {
                warn!("minutiae extraction failed, continuing with zero minutiae: {e}");
                Vec::new()
            }
        };
        self.assess(image, &minutiae)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_block_size() {
        let ensemble = Ensemble::load_default().unwrap();
        let config = AnalysisConfig { block_size: 0, ..AnalysisConfig::default() };
        assert!(matches!(
            QualityEngine::new(&ensemble, Some(config)),
            Err(QualityError::MissConfiguration(_))
        ));
    }

    #[test]
    fn rejects_unsorted_histogram_limits() {
        let ensemble = Ensemble::load_default().unwrap();
        let mut config = AnalysisConfig::default();
        config.of_hist_limits[3] = 0.0;
        assert!(QualityEngine::new(&ensemble, Some(config)).is_err());
    }

    #[test]
    fn default_config_is_valid() {
        let ensemble = Ensemble::load_default().unwrap();
        assert!(QualityEngine::new(&ensemble, None).is_ok());
    }
}
