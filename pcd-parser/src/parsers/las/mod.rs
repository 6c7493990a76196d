use std::path::PathBuf;

use las::Reader;

use pcd_core::pointcloud::point::{Point, PointCloud};
use pcd_core::{PcdError, Result};

use super::{ParsedPointCloud, Parser, ParserProvider};

pub struct LasParserProvider {
    pub filename: PathBuf,
}

impl ParserProvider for LasParserProvider {
    fn get_parser(&self) -> Box<dyn Parser> {
        Box::new(LasParser {
            filename: self.filename.clone(),
        })
    }
}

/// Reads the x, y, z of every record of a LAS or LAZ file. Other point
/// attributes are not used by the classification pipelines.
pub struct LasParser {
    pub filename: PathBuf,
}

impl Parser for LasParser {
    fn parse(&self) -> Result<ParsedPointCloud> {
        let start = std::time::Instant::now();
        let mut reader = Reader::from_path(&self.filename).map_err(|e| self.las_error(0, e))?;

        let mut points = Vec::new();
        for (index, las_point) in reader.points().enumerate() {
            let las_point = las_point.map_err(|e| self.las_error(index + 1, e))?;
            points.push(Point::new(las_point.x, las_point.y, las_point.z));
        }
        log::debug!(
            "read {} points from {:?} in {:?}",
            points.len(),
            self.filename,
            start.elapsed()
        );

        Ok(ParsedPointCloud {
            cloud: PointCloud::new(points),
            features: None,
        })
    }
}

impl LasParser {
    // `record` is the 1-based point record, 0 for header failures
    fn las_error(&self, record: usize, error: las::Error) -> PcdError {
        PcdError::parse(&self.filename, record, error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_error() {
        let parser = LasParserProvider {
            filename: PathBuf::from("/nonexistent/cloud.las"),
        }
        .get_parser();
        assert!(parser.parse().is_err());
    }

    #[test]
    fn reads_coordinates_written_by_las_writer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cloud.las");
        {
            let mut builder = las::Builder::from((1, 4));
            builder.transforms = las::Vector {
                x: las::Transform { scale: 0.001, offset: 0.0 },
                y: las::Transform { scale: 0.001, offset: 0.0 },
                z: las::Transform { scale: 0.001, offset: 0.0 },
            };
            let header = builder.into_header().unwrap();
            let mut writer = las::Writer::from_path(&path, header).unwrap();
            for (x, y, z) in [(1.0, 2.0, 3.0), (4.5, 5.5, 6.5)] {
                writer
                    .write_point(las::Point {
                        x,
                        y,
                        z,
                        ..Default::default()
                    })
                    .unwrap();
            }
            writer.close().unwrap();
        }

        let parsed = LasParser { filename: path }.parse().unwrap();
        assert!(parsed.features.is_none());
        assert_eq!(parsed.cloud.len(), 2);
        let p = parsed.cloud.points[1];
        assert!((p.x - 4.5).abs() < 1e-9);
        assert!((p.y - 5.5).abs() < 1e-9);
        assert!((p.z - 6.5).abs() < 1e-9);
    }
}
