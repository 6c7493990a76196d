use pcd_core::pointcloud::{
    classification::{ClassificationResult, Label},
    feature::{FeatureIndexSet, FeatureMatrix},
    point::PointCloud,
};
use pcd_core::{PcdError, Result};

/// A pluggable labelling algorithm. Implementations return exactly one label
/// per input point, in input order.
pub trait Classifier: Send + Sync {
    fn classify(
        &self,
        points: PointCloud,
        features: FeatureMatrix,
        selected: &FeatureIndexSet,
    ) -> Result<ClassificationResult>;
}

/// A loaded statistical model.
pub trait Model: Send + Sync {
    fn predict(&self, features: &FeatureMatrix) -> Result<Vec<Label>>;
}

/// Feeds the selected feature columns to a trained model.
///
/// The model only sees column positions. Whether column `i` means the same
/// descriptor it meant at training time cannot be checked here: a model
/// trained on a different schedule or index file silently yields wrong
/// labels.
pub struct TrainedModelClassifier {
    model: Box<dyn Model>,
}

impl TrainedModelClassifier {
    pub fn new(model: Box<dyn Model>) -> Self {
        Self { model }
    }
}

impl Classifier for TrainedModelClassifier {
    fn classify(
        &self,
        points: PointCloud,
        features: FeatureMatrix,
        selected: &FeatureIndexSet,
    ) -> Result<ClassificationResult> {
        let selected_features = features.select(selected)?;
        let labels = self.model.predict(&selected_features)?;
        if labels.len() != points.len() {
            return Err(PcdError::classifier(format!(
                "model returned {} labels for {} points",
                labels.len(),
                points.len()
            )));
        }
        ClassificationResult::new(points, Some(features), labels)
    }
}
