use ridgescore::feature::{all_feature_ids, ids};
use ridgescore::{
    AnalysisConfig, Ensemble, FeatureStatus, FingerprintImage, Minutia, MinutiaKind,
    MinutiaeProvider, QualityEngine, QualityError,
};

fn white_image(w: u32, h: u32) -> FingerprintImage {
    FingerprintImage::new(vec![255u8; (w * h) as usize], w, h, 500, 0).unwrap()
}

fn striped_image(w: u32, h: u32) -> FingerprintImage {
    let mut pixels = Vec::with_capacity((w * h) as usize);
    for _y in 0..h {
        for x in 0..w {
            pixels.push(if (x / 4) % 2 == 0 { 0 } else { 255 });
        }
    }
    FingerprintImage::new(pixels, w, h, 500, 0).unwrap()
}

#[test]
fn white_image_scores_without_error() {
    let ensemble = Ensemble::load_default().unwrap();
    let engine = QualityEngine::new(&ensemble, None).unwrap();
    let image = white_image(256, 256);

    let assessment = engine.assess(&image, &[]).unwrap();
    assert!(assessment.score <= 100);

    // Every region-derived feature is in its failure state.
    for id in [
        ids::ROI_AREA_RATIO,
        ids::ROI_MEAN,
        ids::ROI_STD_DEV,
        ids::OF_COHERENCE_SUM,
        ids::OF_COHERENCE_REL,
        ids::FLOW_HIGH_FLOW_RATIO,
        ids::FLOW_LOW_FLOW_RATIO,
        ids::FLOW_BACKGROUND_RATIO,
    ] {
        let feature = assessment.features.get(id).unwrap();
        assert!(feature.status.is_failure(), "{id} should carry a failure status");
        assert_eq!(feature.value, 0.0);
    }

    // Minutiae features are defined zeros, not failures.
    let count = assessment.features.get(ids::MIN_COUNT).unwrap();
    assert_eq!(count.status, FeatureStatus::Computed);
    assert_eq!(count.value, 0.0);
}

#[test]
fn scoring_is_deterministic() {
    let ensemble = Ensemble::load_default().unwrap();
    let engine = QualityEngine::new(&ensemble, None).unwrap();
    let image = striped_image(256, 256);

    let first = engine.assess(&image, &[]).unwrap();
    let second = engine.assess(&image, &[]).unwrap();
    assert_eq!(first.score, second.score);
    for id in all_feature_ids() {
        assert_eq!(first.features.get(&id), second.features.get(&id), "feature {id} differs");
    }
}

#[test]
fn ridge_texture_scores_above_blank_margin() {
    let ensemble = Ensemble::load_default().unwrap();
    let engine = QualityEngine::new(&ensemble, None).unwrap();

    let blank = engine.assess(&white_image(256, 256), &[]).unwrap();
    let textured = engine.assess(&striped_image(256, 256), &[]).unwrap();
    assert!(
        textured.score > blank.score,
        "textured {} should beat blank {}",
        textured.score,
        blank.score
    );
}

#[test]
fn sub_block_image_fails_features_without_raising() {
    let ensemble = Ensemble::load_default().unwrap();
    let engine = QualityEngine::new(&ensemble, None).unwrap();
    let image = striped_image(20, 20);

    let assessment = engine.assess(&image, &[]).unwrap();
    assert!(assessment.score <= 100);
    let roi = assessment.features.get(ids::ROI_AREA_RATIO).unwrap();
    assert_eq!(roi.status, FeatureStatus::ImageTooSmall);
}

#[test]
fn invalid_image_is_rejected_before_processing() {
    let err = FingerprintImage::new(vec![0u8; 100], 32, 32, 500, 0).unwrap_err();
    assert!(matches!(err, QualityError::InvalidImage(_)));
}

#[test]
fn missing_feature_still_yields_bounded_score() {
    let ensemble = Ensemble::load_default().unwrap();
    let engine = QualityEngine::new(&ensemble, None).unwrap();
    let image = striped_image(256, 256);

    let assessment = engine.assess(&image, &[]).unwrap();
    let mut features = assessment.features.clone();
    assert!(features.remove(ids::OF_COHERENCE_REL).is_some());

    let score = ensemble.evaluate(&features);
    assert!(score <= 100);
}

#[test]
fn tree_aggregation_is_order_independent() {
    let ensemble = Ensemble::load_default().unwrap();
    let engine = QualityEngine::new(&ensemble, None).unwrap();
    let image = striped_image(256, 256);
    let assessment = engine.assess(&image, &[]).unwrap();

    let contributions = ensemble.tree_contributions(&assessment.features);
    let forward: f64 = contributions.iter().sum();
    let reversed: f64 = contributions.iter().rev().sum();
    assert!((forward - reversed).abs() < 1e-9);

    let mean = forward / contributions.len() as f64;
    assert_eq!(mean.clamp(0.0, 100.0).round() as u8, assessment.score);
}

#[test]
fn minutiae_join_the_feature_vector() {
    let ensemble = Ensemble::load_default().unwrap();
    let engine = QualityEngine::new(&ensemble, None).unwrap();
    let image = striped_image(256, 256);

    let minutiae: Vec<Minutia> = (0u32..30)
        .map(|i| Minutia {
            x: 60 + (i % 6) * 20,
            y: 60 + (i / 6) * 20,
            angle: 0.0,
            quality: 50,
            kind: MinutiaKind::Bifurcation,
        })
        .collect();

    let assessment = engine.assess(&image, &minutiae).unwrap();
    assert_eq!(assessment.features.get(ids::MIN_COUNT).unwrap().value, 30.0);
    let in_rect = assessment.features.get("Min_CountComRect200x200").unwrap();
    assert_eq!(in_rect.value, 30.0);
}

struct FailingProvider;

impl MinutiaeProvider for FailingProvider {
    fn extract(&self, _image: &FingerprintImage) -> Result<Vec<Minutia>, QualityError> {
        Err(QualityError::FeatureCalculation("extractor crashed".to_string()))
    }
}

#[test]
fn provider_failure_means_zero_minutiae() {
    let ensemble = Ensemble::load_default().unwrap();
    let engine = QualityEngine::new(&ensemble, None).unwrap();
    let image = striped_image(256, 256);

    let assessment = engine.assess_with_provider(&image, &FailingProvider).unwrap();
    let count = assessment.features.get(ids::MIN_COUNT).unwrap();
    assert_eq!(count.status, FeatureStatus::Computed);
    assert_eq!(count.value, 0.0);
}

#[test]
fn speed_instrumentation_reports_every_group() {
    let ensemble = Ensemble::load_default().unwrap();
    let engine = QualityEngine::new(
        &ensemble,
        Some(AnalysisConfig { measure_speed: true, ..AnalysisConfig::default() }),
    )
    .unwrap();
    let image = striped_image(256, 256);

    let assessment = engine.assess(&image, &[]).unwrap();
    let groups: Vec<&str> = assessment.speeds.iter().map(|s| s.group).collect();
    for expected in ridgescore::feature::speed_feature_groups() {
        assert!(groups.contains(&expected), "missing speed group {expected}");
    }
}
