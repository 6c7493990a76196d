use std::io;
use std::path::Path;

use csv::{QuoteStyle, WriterBuilder};

use pcd_core::pointcloud::{
    classification::{ClassificationResult, Label},
    feature::FeatureMatrix,
    point::PointCloud,
};
use pcd_core::{PcdError, Result};

/// Writes `x y z [features ...] label` per row. Every array must have the same
/// row count; a mismatch is rejected before the file is created.
pub fn write_labeled_points(
    coordinates: &PointCloud,
    features: Option<&FeatureMatrix>,
    labels: &[Label],
    path: &Path,
) -> Result<()> {
    let feature_rows = features.map(FeatureMatrix::rows);
    if coordinates.len() != labels.len()
        || feature_rows.is_some_and(|rows| rows != coordinates.len())
    {
        return Err(PcdError::Io(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!(
                "refusing to write {:?}: {} coordinates, {:?} feature rows, {} labels",
                path,
                coordinates.len(),
                feature_rows,
                labels.len()
            ),
        )));
    }

    write_rows(coordinates, features, Some(labels), path)
}

pub fn write_classification(result: &ClassificationResult, path: &Path) -> Result<()> {
    write_labeled_points(
        &result.points,
        result.features.as_ref(),
        &result.labels,
        path,
    )
}

/// Writes `x y z features ...` per row, the layout the classify pipeline reads.
pub fn write_feature_points(
    coordinates: &PointCloud,
    features: &FeatureMatrix,
    path: &Path,
) -> Result<()> {
    if coordinates.len() != features.rows() {
        return Err(PcdError::shape(format!(
            "{} coordinates but {} feature rows",
            coordinates.len(),
            features.rows()
        )));
    }
    write_rows(coordinates, Some(features), None, path)
}

fn write_rows(
    coordinates: &PointCloud,
    features: Option<&FeatureMatrix>,
    labels: Option<&[Label]>,
    path: &Path,
) -> Result<()> {
    let mut writer = WriterBuilder::new()
        .delimiter(b' ')
        .has_headers(false)
        .flexible(true)
        .quote_style(QuoteStyle::Never)
        .from_path(path)
        .map_err(into_pcd_error)?;

    let mut record: Vec<String> = Vec::new();
    for (index, (x, y, z, _)) in coordinates.iter().enumerate() {
        record.clear();
        record.extend([x, y, z].iter().map(f64::to_string));
        if let Some(features) = features {
            record.extend(features.row(index).iter().map(f64::to_string));
        }
        if let Some(labels) = labels {
            record.push(labels[index].to_string());
        }
        writer.write_record(&record).map_err(into_pcd_error)?;
    }
    writer.flush()?;

    Ok(())
}

fn into_pcd_error(error: csv::Error) -> PcdError {
    match error.into_kind() {
        csv::ErrorKind::Io(e) => PcdError::Io(e),
        kind => PcdError::Io(io::Error::other(format!("{:?}", kind))),
    }
}
