pub mod parsers;
pub mod writer;

pub use parsers::{read_points_and_features, ParsedPointCloud};
pub use writer::{write_feature_points, write_labeled_points};
