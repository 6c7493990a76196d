pub mod backend;
pub mod feature_index;
pub mod forest;
pub mod separator;

pub use backend::{Classifier, Model, TrainedModelClassifier};
pub use feature_index::load_feature_indices;
pub use forest::RandomForest;
pub use separator::{RuleBasedSeparator, SeparatorParameters};
