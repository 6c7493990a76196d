use std::path::{Path, PathBuf};

use pcd_core::pointcloud::{feature::FeatureMatrix, point::PointCloud};
use pcd_core::{PcdError, Result};

pub mod las;
pub mod text;

use self::{las::LasParserProvider, text::TextParserProvider};

/// Coordinates plus whatever feature columns the source file carried.
/// Binary lidar sources carry none.
#[derive(Debug, Clone)]
pub struct ParsedPointCloud {
    pub cloud: PointCloud,
    pub features: Option<FeatureMatrix>,
}

pub trait ParserProvider {
    fn get_parser(&self) -> Box<dyn Parser>;
}

pub trait Parser {
    fn parse(&self) -> Result<ParsedPointCloud>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extension {
    Las,
    Laz,
    Txt,
}

impl Extension {
    pub fn as_str(&self) -> &'static str {
        match self {
            Extension::Las => "las",
            Extension::Laz => "laz",
            Extension::Txt => "txt",
        }
    }
}

pub fn get_extension(extension: &str) -> Option<Extension> {
    match extension {
        "las" => Some(Extension::Las),
        "laz" => Some(Extension::Laz),
        "txt" => Some(Extension::Txt),
        _ => None,
    }
}

pub fn extension_of(path: &Path) -> Option<Extension> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .and_then(get_extension)
}

pub fn provider_for(path: &Path) -> Result<Box<dyn ParserProvider>> {
    let filename = PathBuf::from(path);
    match extension_of(path) {
        Some(Extension::Las | Extension::Laz) => Ok(Box::new(LasParserProvider { filename })),
        Some(Extension::Txt) => Ok(Box::new(TextParserProvider { filename })),
        None => Err(PcdError::parse(path, 0, "unsupported file extension")),
    }
}

/// Reads a point file, choosing the parser from the file extension.
pub fn read_points_and_features(path: &Path) -> Result<ParsedPointCloud> {
    provider_for(path)?.get_parser().parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_lookup() {
        assert_eq!(extension_of(Path::new("a/b.las")), Some(Extension::Las));
        assert_eq!(extension_of(Path::new("b.laz")), Some(Extension::Laz));
        assert_eq!(extension_of(Path::new("b.txt")), Some(Extension::Txt));
        assert_eq!(extension_of(Path::new("b.csv")), None);
        assert_eq!(extension_of(Path::new("noext")), None);
    }

    #[test]
    fn unsupported_extension_is_parse_error() {
        let err = read_points_and_features(Path::new("cloud.ply")).unwrap_err();
        assert!(matches!(err, PcdError::Parse { .. }));
    }
}
