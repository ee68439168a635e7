//! Runs every analyzer module against one image and merges their outputs
//! into a single feature vector.

use crate::error::QualityError;
use crate::feature::{
    actionable, ids, ActionableFeedback, FeatureModule, FeatureSpeed, FeatureStatus, FeatureValue,
    FeatureVector,
};
use crate::flow::FlowFeatures;
use crate::image::FingerprintImage;
use crate::minutiae::{Minutia, MinutiaeFeatures};
use crate::orientation::OrientationFeatures;
use crate::roi::{compute_roi, RoiFeatures};
use crate::AnalysisConfig;
use std::time::Instant;
use tracing::warn;

/// Computes all registered features for `image`.
///
/// The ROI is detected first; the orientation, flow and minutiae modules
/// then run independently (concurrently when `parallel_enabled`). A module
/// failure never aborts the computation: its features are recorded with a
/// failure status and the sentinel value, because the ensemble tolerates
/// missing feature paths through its default branches.
///
/// Wall time per module is recorded when `measure_speed` is set.
pub fn compute_features(
    image: &FingerprintImage,
    minutiae: &[Minutia],
    config: &AnalysisConfig,
) -> Result<(FeatureVector, Vec<FeatureSpeed>), QualityError> {
    let roi_started = Instant::now();
    let roi = compute_roi(
        image,
        config.block_size,
        config.roi_stddev_threshold,
        config.black_pixel_cutoff,
    );
    let roi_elapsed_ms = roi_started.elapsed().as_secs_f64() * 1000.0;

    let roi_module = RoiFeatures::new(&roi);
    let orientation_module =
        OrientationFeatures::new(&roi, config.orientation_block_size, config.of_hist_limits);
    let flow_module =
        FlowFeatures::new(&roi, config.flow_stddev_threshold, config.use_surrounding_window);
    let minutiae_module = MinutiaeFeatures::new(minutiae, &config.com_rect_sizes);

    let modules: [&dyn FeatureModule; 4] =
        [&roi_module, &orientation_module, &flow_module, &minutiae_module];

    let runs: Vec<(Vec<FeatureValue>, f64)> = if config.parallel_enabled {
        crossbeam::scope(|s| {
            let handles: Vec<_> = modules
                .iter()
                .map(|&module| s.spawn(move |_| run_module(module, image)))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        })
        .unwrap()
    } else {
        modules.iter().map(|&module| run_module(module, image)).collect()
    };

    let mut features = FeatureVector::new();
    let mut speeds = Vec::new();
    for (module, (values, mut elapsed_ms)) in modules.iter().zip(runs) {
        if config.measure_speed {
            if module.speed_group() == roi_module.speed_group() {
                elapsed_ms += roi_elapsed_ms;
            }
            speeds.push(FeatureSpeed {
                group: module.speed_group(),
                ids: module.feature_ids(),
                ms: elapsed_ms,
            });
        }
        for value in values {
            features.insert(value);
        }
    }

    Ok((features, speeds))
}

fn run_module(module: &dyn FeatureModule, image: &FingerprintImage) -> (Vec<FeatureValue>, f64) {
    let started = Instant::now();
    let values = match module.compute(image) {
        Ok(values) => values,
        Err(e) => {
            warn!("module {} failed, recording failure status: {e}", module.module_name());
            module
                .feature_ids()
                .into_iter()
                .map(|id| FeatureValue::failed(id, FeatureStatus::ExtractionFailed))
                .collect()
        }
    };
    (values, started.elapsed().as_secs_f64() * 1000.0)
}

/// Derives the curated remediation hint values from a computed feature
/// vector.
pub fn actionable_feedback(
    image: &FingerprintImage,
    features: &FeatureVector,
) -> Vec<ActionableFeedback> {
    let feature_value = |id: &str| features.get(id).map(|v| v.value).unwrap_or(0.0);

    let mut sum = 0.0;
    let mut sum_sq = 0.0;
    for &p in image.pixels() {
        let v = f64::from(p);
        sum += v;
        sum_sq += v * v;
    }
    let n = image.pixel_count() as f64;
    let mean = sum / n;
    let image_stddev = (sum_sq / n - mean * mean).max(0.0).sqrt();

    vec![
        ActionableFeedback {
            id: actionable::EMPTY_IMAGE_OR_CONTRAST_TOO_LOW,
            value: feature_value(ids::ROI_STD_DEV),
        },
        ActionableFeedback { id: actionable::UNIFORM_IMAGE, value: image_stddev },
        ActionableFeedback {
            id: actionable::FINGERPRINT_IMAGE_WITH_MINUTIAE,
            value: feature_value(ids::MIN_COUNT),
        },
        ActionableFeedback {
            id: actionable::SUFFICIENT_FINGERPRINT_FOREGROUND,
            value: feature_value(ids::ROI_AREA_RATIO),
        },
    ]
}
