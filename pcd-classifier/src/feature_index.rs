use std::{fs, path::Path};

use pcd_core::pointcloud::feature::FeatureIndexSet;
use pcd_core::{PcdError, Result};

/// Reads the feature columns a model was trained on: the first line of the
/// file, as whitespace-separated non-negative integers. Later lines are
/// ignored.
pub fn load_feature_indices(path: &Path) -> Result<FeatureIndexSet> {
    let text = fs::read_to_string(path)?;
    let line = text
        .lines()
        .next()
        .filter(|line| !line.trim().is_empty())
        .ok_or_else(|| PcdError::config(path, "no feature indices found"))?;

    let indices = line
        .split_whitespace()
        .map(|token| {
            token.parse::<usize>().map_err(|_| {
                PcdError::config(path, format!("'{}' is not a feature index", token))
            })
        })
        .collect::<Result<Vec<_>>>()?;

    log::debug!("loaded feature indices {:?} from {:?}", indices, path);
    Ok(FeatureIndexSet::new(indices))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn load(contents: &str) -> Result<FeatureIndexSet> {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        load_feature_indices(file.path())
    }

    #[test]
    fn reads_first_line_only() {
        let indices = load("0 2 5\n7 8\n").unwrap();
        assert_eq!(indices.as_slice(), &[0, 2, 5]);
    }

    #[test]
    fn keeps_order_and_tolerates_padding() {
        let indices = load("  14 3  1 \n").unwrap();
        assert_eq!(indices.as_slice(), &[14, 3, 1]);
    }

    #[test]
    fn empty_file_is_config_error() {
        assert!(matches!(load(""), Err(PcdError::Config { .. })));
        assert!(matches!(load("\n1 2\n"), Err(PcdError::Config { .. })));
    }

    #[test]
    fn non_integer_is_config_error() {
        assert!(matches!(load("0 1.5 2"), Err(PcdError::Config { .. })));
        assert!(matches!(load("0 -1"), Err(PcdError::Config { .. })));
    }
}
