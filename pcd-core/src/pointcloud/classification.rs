use crate::error::{PcdError, Result};

use super::{feature::FeatureMatrix, point::PointCloud};

pub type Label = i64;

/// Points, their optional features and one label per point, row-aligned.
#[derive(Debug, Clone)]
pub struct ClassificationResult {
    pub points: PointCloud,
    pub features: Option<FeatureMatrix>,
    pub labels: Vec<Label>,
}

impl ClassificationResult {
    pub fn new(
        points: PointCloud,
        features: Option<FeatureMatrix>,
        labels: Vec<Label>,
    ) -> Result<Self> {
        check_rows(points.len(), features.as_ref(), labels.len())?;
        Ok(Self {
            points,
            features,
            labels,
        })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

pub fn check_rows(points: usize, features: Option<&FeatureMatrix>, labels: usize) -> Result<()> {
    if points != labels {
        return Err(PcdError::shape(format!(
            "{} points but {} labels",
            points, labels
        )));
    }
    if let Some(features) = features {
        if features.rows() != points {
            return Err(PcdError::shape(format!(
                "{} points but {} feature rows",
                points,
                features.rows()
            )));
        }
    }
    Ok(())
}
