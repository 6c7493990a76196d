use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord};

use pcd_core::pointcloud::{
    feature::FeatureMatrix,
    point::{Point, PointCloud},
};
use pcd_core::{PcdError, Result};

use super::{ParsedPointCloud, Parser, ParserProvider};

/// Token that marks a record as unusable. Such lines are dropped before any
/// numeric parsing takes place.
pub const NAN_TOKEN: &str = "nan";

pub struct TextParserProvider {
    pub filename: PathBuf,
}

impl ParserProvider for TextParserProvider {
    fn get_parser(&self) -> Box<dyn Parser> {
        Box::new(TextParser {
            filename: self.filename.clone(),
        })
    }
}

/// Space-delimited `x y z [feature ...]` records, one point per line.
pub struct TextParser {
    pub filename: PathBuf,
}

impl Parser for TextParser {
    fn parse(&self) -> Result<ParsedPointCloud> {
        let start = std::time::Instant::now();
        let mut reader = ReaderBuilder::new()
            .delimiter(b' ')
            .has_headers(false)
            .flexible(true)
            .from_path(&self.filename)
            .map_err(|e| csv_error(&self.filename, e))?;

        let mut points = Vec::new();
        let mut features = Vec::new();
        let mut width: Option<usize> = None;
        let mut skipped = 0usize;

        let mut record = StringRecord::new();
        loop {
            match reader.read_record(&mut record) {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) => return Err(csv_error(&self.filename, e)),
            }
            let line = record.position().map(|p| p.line() as usize).unwrap_or(0);

            let tokens: Vec<&str> = record
                .iter()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .collect();
            if tokens.is_empty() {
                continue;
            }
            if tokens.contains(&NAN_TOKEN) {
                skipped += 1;
                continue;
            }

            let expected = *width.get_or_insert(tokens.len());
            if tokens.len() < 3 {
                return Err(PcdError::parse(
                    &self.filename,
                    line,
                    format!("expected at least 3 values, found {}", tokens.len()),
                ));
            }
            if tokens.len() != expected {
                return Err(PcdError::parse(
                    &self.filename,
                    line,
                    format!("expected {} values, found {}", expected, tokens.len()),
                ));
            }

            let values = parse_values(&self.filename, line, &tokens)?;
            points.push(Point::new(values[0], values[1], values[2]));
            features.push(values[3..].to_vec());
        }

        let columns = width.map(|w| w - 3).unwrap_or(0);
        let features = FeatureMatrix::from_rows(features, columns)?;
        log::debug!(
            "read {} points ({} feature columns, {} lines skipped) from {:?} in {:?}",
            points.len(),
            columns,
            skipped,
            self.filename,
            start.elapsed()
        );

        Ok(ParsedPointCloud {
            cloud: PointCloud::new(points),
            features: Some(features),
        })
    }
}

fn parse_values(path: &Path, line: usize, tokens: &[&str]) -> Result<Vec<f64>> {
    tokens
        .iter()
        .map(|token| {
            token.parse::<f64>().map_err(|e| {
                PcdError::parse(path, line, format!("invalid number '{}': {}", token, e))
            })
        })
        .collect()
}

fn csv_error(path: &Path, error: csv::Error) -> PcdError {
    let line = error
        .position()
        .map(|p| p.line() as usize)
        .unwrap_or(0);
    match error.into_kind() {
        csv::ErrorKind::Io(e) => PcdError::Io(e),
        kind => PcdError::parse(path, line, format!("{:?}", kind)),
    }
}
