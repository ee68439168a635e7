//! Ensemble evaluation over an aggregated feature vector.

use crate::feature::FeatureVector;
use crate::model::{Ensemble, Node, Tree};

/// A quality score in `[0, 100]`.
pub type QualityScore = u8;

impl Tree {
    /// Traverses from the root to a leaf and returns its value.
    ///
    /// A feature that is absent from the vector or carries a failure status
    /// follows the split's default branch instead of raising. Child indices
    /// point strictly forward in the arena, so the walk always terminates.
    pub(crate) fn predict(&self, features: &FeatureVector) -> f64 {
        let mut index = 0usize;
        loop {
            match &self.nodes[index] {
                Node::Leaf { value } => return *value,
                Node::Split { feature, threshold, left, right, default_left } => {
                    let next = match features.get(feature) {
                        Some(fv) if !fv.status.is_failure() => {
                            if fv.value < *threshold {
                                *left
                            } else {
                                *right
                            }
                        }
                        _ => {
                            if *default_left {
                                *left
                            } else {
                                *right
                            }
                        }
                    };
                    index = next as usize;
                }
            }
        }
    }
}

impl Ensemble {
    /// The per-tree contributions for `features`, in tree order.
    ///
    /// Exposed because the aggregation over trees is a plain mean:
    /// commutative, order-independent and therefore trivially
    /// parallelizable by the caller if desired.
    pub fn tree_contributions(&self, features: &FeatureVector) -> Vec<f64> {
        self.trees.iter().map(|tree| tree.predict(features)).collect()
    }

    /// Evaluates the ensemble over `features`.
    ///
    /// The score is the mean of all tree contributions, clamped to
    /// `[0, 100]` and rounded half away from zero. Identical input always
    /// yields the identical score; there is no randomness at inference
    /// time.
    pub fn evaluate(&self, features: &FeatureVector) -> QualityScore {
        let sum: f64 = self.trees.iter().map(|tree| tree.predict(features)).sum();
        // `from_str` guarantees at least one tree.
        let mean = sum / self.trees.len() as f64;
        mean.clamp(0.0, 100.0).round() as QualityScore
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::{FeatureStatus, FeatureValue};

    fn vector(entries: &[(&str, f64)]) -> FeatureVector {
        let mut fv = FeatureVector::new();
        for (id, value) in entries {
            fv.insert(FeatureValue::computed(*id, *value));
        }
        fv
    }

    fn two_leaf_model(threshold: f64, low: f64, high: f64) -> Ensemble {
        format!(
            "[tree:0]\nsplit = 0:Roi_Mean:{threshold}:1:2:L\nleaf = 1:{low}\nleaf = 2:{high}\n"
        )
        .parse()
        .unwrap()
    }

    #[test]
    fn split_compares_value_against_threshold() {
        let model = two_leaf_model(100.0, 10.0, 90.0);
        assert_eq!(model.evaluate(&vector(&[("Roi_Mean", 50.0)])), 10);
        assert_eq!(model.evaluate(&vector(&[("Roi_Mean", 150.0)])), 90);
        // Equal values take the right branch.
        assert_eq!(model.evaluate(&vector(&[("Roi_Mean", 100.0)])), 90);
    }

    #[test]
    fn missing_feature_takes_default_branch() {
        let model = two_leaf_model(100.0, 10.0, 90.0);
        assert_eq!(model.evaluate(&vector(&[])), 10);

        let right_default: Ensemble =
            "[tree:0]\nsplit = 0:Roi_Mean:100.0:1:2:R\nleaf = 1:10.0\nleaf = 2:90.0\n"
                .parse()
                .unwrap();
        assert_eq!(right_default.evaluate(&vector(&[])), 90);
    }

    #[test]
    fn failed_feature_takes_default_branch() {
        let model = two_leaf_model(100.0, 10.0, 90.0);
        let mut fv = FeatureVector::new();
        fv.insert(FeatureValue::failed("Roi_Mean", FeatureStatus::EmptyRoi));
        assert_eq!(model.evaluate(&fv), 10);
    }

    #[test]
    fn unknown_model_feature_is_tolerated() {
        let model: Ensemble =
            "[tree:0]\nsplit = 0:NotARegisteredFeature:1.0:1:2:L\nleaf = 1:30.0\nleaf = 2:70.0\n"
                .parse()
                .unwrap();
        assert_eq!(model.evaluate(&vector(&[("Roi_Mean", 1.0)])), 30);
    }

    #[test]
    fn score_is_mean_of_trees() {
        let model: Ensemble =
            "[tree:0]\nleaf = 0:40.0\n[tree:1]\nleaf = 0:60.0\n[tree:2]\nleaf = 0:80.0\n"
                .parse()
                .unwrap();
        assert_eq!(model.evaluate(&vector(&[])), 60);
        assert_eq!(model.tree_contributions(&vector(&[])), vec![40.0, 60.0, 80.0]);
    }

    #[test]
    fn score_is_clamped_to_bounds() {
        let high: Ensemble = "[tree:0]\nleaf = 0:250.0\n".parse().unwrap();
        assert_eq!(high.evaluate(&vector(&[])), 100);
        let low: Ensemble = "[tree:0]\nleaf = 0:-50.0\n".parse().unwrap();
        assert_eq!(low.evaluate(&vector(&[])), 0);
    }

    #[test]
    fn rounding_is_half_away_from_zero() {
        let model: Ensemble = "[tree:0]\nleaf = 0:49.5\n".parse().unwrap();
        assert_eq!(model.evaluate(&vector(&[])), 50);
        let model: Ensemble = "[tree:0]\nleaf = 0:49.4\n".parse().unwrap();
        assert_eq!(model.evaluate(&vector(&[])), 49);
    }

    #[test]
    fn evaluation_is_deterministic() {
        let model = Ensemble::load_default().unwrap();
        let fv = vector(&[("Roi_Mean", 120.0), ("Of_CoherenceRel", 0.5), ("Min_Count", 30.0)]);
        assert_eq!(model.evaluate(&fv), model.evaluate(&fv));
    }
}
