use std::{fs, path::Path};

use rayon::iter::{IntoParallelIterator as _, ParallelIterator as _};
use serde::{Deserialize, Serialize};

use pcd_core::pointcloud::{classification::Label, feature::FeatureMatrix};
use pcd_core::{PcdError, Result};

use crate::backend::Model;

/// Tree-ensemble classifier stored as JSON.
///
/// ```json
/// {
///   "classes": [0, 1, 2],
///   "n_features": 2,
///   "trees": [
///     {"nodes": [
///       {"kind": "split", "feature": 1, "threshold": 0.5, "left": 1, "right": 2},
///       {"kind": "leaf", "probabilities": [1.0, 0.0, 0.0]},
///       {"kind": "leaf", "probabilities": [0.0, 3.0, 1.0]}
///     ]}
///   ]
/// }
/// ```
///
/// A sample goes left when `x[feature] <= threshold`. Leaf probabilities may
/// be raw class counts; each tree's leaf is normalised before averaging.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    pub classes: Vec<Label>,
    pub n_features: usize,
    pub trees: Vec<DecisionTree>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    pub nodes: Vec<Node>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        probabilities: Vec<f64>,
    },
}

impl RandomForest {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            PcdError::classifier(format!("cannot read model {}: {}", path.display(), e))
        })?;
        let forest: RandomForest = serde_json::from_str(&text).map_err(|e| {
            PcdError::classifier(format!("cannot parse model {}: {}", path.display(), e))
        })?;
        forest.validate()?;
        log::debug!(
            "loaded forest with {} trees over {} features from {:?}",
            forest.trees.len(),
            forest.n_features,
            path
        );
        Ok(forest)
    }

    /// Structural checks. Children must come after their parent, which keeps
    /// every traversal finite.
    pub fn validate(&self) -> Result<()> {
        if self.classes.is_empty() {
            return Err(PcdError::classifier("model has no classes"));
        }
        if self.trees.is_empty() {
            return Err(PcdError::classifier("model has no trees"));
        }
        for (t, tree) in self.trees.iter().enumerate() {
            if tree.nodes.is_empty() {
                return Err(PcdError::classifier(format!("tree {} has no nodes", t)));
            }
            for (n, node) in tree.nodes.iter().enumerate() {
                match node {
                    Node::Split {
                        feature,
                        threshold,
                        left,
                        right,
                    } => {
                        if *feature >= self.n_features {
                            return Err(PcdError::classifier(format!(
                                "tree {} node {} splits on feature {} of {}",
                                t, n, feature, self.n_features
                            )));
                        }
                        if threshold.is_nan() {
                            return Err(PcdError::classifier(format!(
                                "tree {} node {} has a NaN threshold",
                                t, n
                            )));
                        }
                        for child in [left, right] {
                            if *child <= n || *child >= tree.nodes.len() {
                                return Err(PcdError::classifier(format!(
                                    "tree {} node {} has invalid child {}",
                                    t, n, child
                                )));
                            }
                        }
                    }
                    Node::Leaf { probabilities } => {
                        if probabilities.len() != self.classes.len() {
                            return Err(PcdError::classifier(format!(
                                "tree {} leaf {} has {} probabilities for {} classes",
                                t,
                                n,
                                probabilities.len(),
                                self.classes.len()
                            )));
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn predict_row(&self, row: &[f64]) -> Label {
        let mut votes = vec![0.0; self.classes.len()];
        for tree in &self.trees {
            let probabilities = tree.leaf(row);
            let total: f64 = probabilities.iter().sum();
            if total > 0.0 {
                for (vote, p) in votes.iter_mut().zip(probabilities) {
                    *vote += p / total;
                }
            }
        }

        let mut best = 0;
        for (index, vote) in votes.iter().enumerate() {
            if *vote > votes[best] {
                best = index;
            }
        }
        self.classes[best]
    }
}

impl DecisionTree {
    fn leaf(&self, row: &[f64]) -> &[f64] {
        let mut index = 0;
        loop {
            match &self.nodes[index] {
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    index = if row[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
                Node::Leaf { probabilities } => return probabilities,
            }
        }
    }
}

impl Model for RandomForest {
    fn predict(&self, features: &FeatureMatrix) -> Result<Vec<Label>> {
        if features.columns() != self.n_features {
            return Err(PcdError::classifier(format!(
                "model expects {} features, got {}",
                self.n_features,
                features.columns()
            )));
        }
        Ok((0..features.rows())
            .into_par_iter()
            .map(|index| self.predict_row(features.row(index)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    const MODEL: &str = r#"{
        "classes": [0, 1, 2],
        "n_features": 2,
        "trees": [
            {"nodes": [
                {"kind": "split", "feature": 1, "threshold": 0.5, "left": 1, "right": 2},
                {"kind": "leaf", "probabilities": [1.0, 0.0, 0.0]},
                {"kind": "split", "feature": 0, "threshold": 10.0, "left": 3, "right": 4},
                {"kind": "leaf", "probabilities": [0.0, 4.0, 1.0]},
                {"kind": "leaf", "probabilities": [0.0, 0.0, 2.0]}
            ]},
            {"nodes": [
                {"kind": "leaf", "probabilities": [0.2, 0.3, 0.5]}
            ]}
        ]
    }"#;

    fn model() -> RandomForest {
        let forest: RandomForest = serde_json::from_str(MODEL).unwrap();
        forest.validate().unwrap();
        forest
    }

    #[test]
    fn averages_tree_votes() {
        let features = FeatureMatrix::from_rows(
            vec![vec![0.0, 0.0], vec![5.0, 1.0], vec![20.0, 1.0]],
            2,
        )
        .unwrap();
        let labels = model().predict(&features).unwrap();
        // row 0: [1.2, 0.3, 0.5]; row 1: [0.2, 1.1, 0.7]; row 2: [0.2, 0.3, 1.5]
        assert_eq!(labels, vec![0, 1, 2]);
    }

    #[test]
    fn threshold_is_inclusive_left() {
        let features = FeatureMatrix::from_rows(vec![vec![0.0, 0.5]], 2).unwrap();
        assert_eq!(model().predict(&features).unwrap(), vec![0]);
    }

    #[test]
    fn wrong_width_is_classifier_error() {
        let features = FeatureMatrix::from_rows(vec![vec![0.0, 0.5, 1.0]], 3).unwrap();
        assert!(matches!(
            model().predict(&features),
            Err(PcdError::Classifier(_))
        ));
    }

    #[test]
    fn rejects_backward_children() {
        let mut forest = model();
        forest.trees[0].nodes[2] = Node::Split {
            feature: 0,
            threshold: 1.0,
            left: 0,
            right: 4,
        };
        assert!(forest.validate().is_err());
    }

    #[test]
    fn rejects_short_leaf() {
        let mut forest = model();
        forest.trees[1].nodes[0] = Node::Leaf {
            probabilities: vec![1.0],
        };
        assert!(forest.validate().is_err());
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(MODEL.as_bytes()).unwrap();
        let forest = RandomForest::load(file.path()).unwrap();
        assert_eq!(forest.trees.len(), 2);
    }

    #[test]
    fn unreadable_artifact_is_classifier_error() {
        let missing = RandomForest::load(Path::new("/nonexistent/model.json"));
        assert!(matches!(missing, Err(PcdError::Classifier(_))));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"not json").unwrap();
        assert!(matches!(
            RandomForest::load(file.path()),
            Err(PcdError::Classifier(_))
        ));
    }
}
