use pcd_core::pointcloud::{feature::FeatureMatrix, point::PointCloud};
use pcd_core::{PcdError, Result};

use crate::{provider::DescriptorProvider, schedule::DescriptorSchedule};

/// Offset subtracted from the height above the lowest point.
pub const RELATIVE_HEIGHT_OFFSET: f64 = 1.0;

/// Feature rows and the points they belong to, after invalid rows were dropped
/// from both.
#[derive(Debug, Clone)]
pub struct AssembledFeatures {
    pub cloud: PointCloud,
    pub features: FeatureMatrix,
    pub dropped: usize,
}

/// Builds the multi-scale feature matrix: one provider call per schedule
/// entry, blocks concatenated in schedule order, relative height appended
/// last.
pub struct FeatureAssembler<P> {
    provider: P,
    schedule: DescriptorSchedule,
}

impl<P: DescriptorProvider> FeatureAssembler<P> {
    pub fn new(provider: P, schedule: DescriptorSchedule) -> Self {
        Self { provider, schedule }
    }

    /// Columns of an assembled matrix, relative height included.
    pub fn column_count(&self) -> usize {
        self.schedule.column_count() + 1
    }

    /// Provider blocks stacked in schedule order, before relative height and
    /// before any row is dropped.
    pub fn raw_features(&self, cloud: &PointCloud) -> Result<FeatureMatrix> {
        let positions = cloud.positions();
        let mut features = FeatureMatrix::empty(positions.len());

        for spec in self.schedule.specs() {
            let block = self
                .provider
                .compute(&positions, spec.radius, &spec.descriptors)?;
            if block.rows() != positions.len() || block.columns() != spec.descriptors.len() {
                return Err(PcdError::shape(format!(
                    "descriptor block at radius {} is {}x{}, expected {}x{}",
                    spec.radius,
                    block.rows(),
                    block.columns(),
                    positions.len(),
                    spec.descriptors.len()
                )));
            }
            features = features.hstack(&block)?;
        }

        Ok(features)
    }

    pub fn assemble(&self, cloud: &PointCloud) -> Result<AssembledFeatures> {
        let raw = self.raw_features(cloud)?;
        let features = raw.push_column(&relative_height(cloud))?;

        let mask = features.valid_rows();
        let retained_cloud = cloud.retain_mask(&mask);
        let retained_features = features.retain_mask(&mask);
        if retained_cloud.len() != retained_features.rows() {
            return Err(PcdError::shape(format!(
                "{} points retained but {} feature rows",
                retained_cloud.len(),
                retained_features.rows()
            )));
        }

        let dropped = cloud.len() - retained_cloud.len();
        log::debug!(
            "assembled {} feature columns for {} points ({} dropped)",
            retained_features.columns(),
            retained_cloud.len(),
            dropped
        );

        Ok(AssembledFeatures {
            cloud: retained_cloud,
            features: retained_features,
            dropped,
        })
    }
}

/// `z - min(z) - 1` for every point, the minimum taken over the whole cloud.
pub fn relative_height(cloud: &PointCloud) -> Vec<f64> {
    let min_z = cloud.metadata.bounding_volume.min[2];
    cloud
        .points
        .iter()
        .map(|p| p.z - min_z - RELATIVE_HEIGHT_OFFSET)
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::descriptor::Descriptor;
    use crate::provider::CovarianceDescriptorProvider;
    use pcd_core::pointcloud::point::Point;

    fn cloud(zs: &[f64]) -> PointCloud {
        PointCloud::new(
            zs.iter()
                .enumerate()
                .map(|(i, z)| Point::new(i as f64, 0.0, *z))
                .collect(),
        )
    }

    // Fills each column with `radius * 100 + column`, NaN for points at x == 1.
    fn stub(points: &[[f64; 3]], radius: f64, names: &[Descriptor]) -> Result<FeatureMatrix> {
        let rows = points
            .iter()
            .map(|p| {
                (0..names.len())
                    .map(|c| {
                        if p[0] == 1.0 {
                            f64::NAN
                        } else {
                            radius * 100.0 + c as f64
                        }
                    })
                    .collect()
            })
            .collect();
        FeatureMatrix::from_rows(rows, names.len())
    }

    #[test]
    fn reference_schedule_gives_fifteen_columns() {
        let assembler = FeatureAssembler::new(stub, DescriptorSchedule::reference());
        let input = cloud(&[0.0, 5.0, 2.0]);
        assert_eq!(assembler.raw_features(&input).unwrap().columns(), 14);
        let assembled = assembler.assemble(&input).unwrap();
        assert_eq!(assembled.features.columns(), 15);
        assert_eq!(assembler.column_count(), 15);
    }

    #[test]
    fn blocks_follow_schedule_order() {
        let assembler = FeatureAssembler::new(stub, DescriptorSchedule::reference());
        let raw = assembler.raw_features(&cloud(&[0.0])).unwrap();
        let expected = [
            10.0, 10.0, 11.0, 12.0, 20.0, 20.0, 21.0, 22.0, 40.0, 40.0, 41.0, 42.0, 60.0, 61.0,
        ];
        for (value, want) in raw.row(0).iter().zip(expected) {
            assert!((value - want).abs() < 1e-9);
        }
    }

    #[test]
    fn invalid_rows_dropped_from_points_and_features() {
        let assembler = FeatureAssembler::new(stub, DescriptorSchedule::reference());
        let input = cloud(&[3.0, 1.0, 4.0]);
        let assembled = assembler.assemble(&input).unwrap();

        assert_eq!(assembled.dropped, 1);
        assert_eq!(assembled.cloud.len(), 2);
        assert_eq!(assembled.features.rows(), 2);
        assert_eq!(assembled.cloud.points[0].x, 0.0);
        assert_eq!(assembled.cloud.points[1].x, 2.0);

        // min z comes from the dropped point as well
        let heights = assembled.features.column(14);
        assert_eq!(heights, vec![3.0 - 1.0 - 1.0, 4.0 - 1.0 - 1.0]);
    }

    #[test]
    fn relative_height_formula() {
        let input = cloud(&[10.0, 12.5, 11.0]);
        assert_eq!(relative_height(&input), vec![-1.0, 1.5, 0.0]);
    }

    #[test]
    fn nan_height_drops_row() {
        let provider = |points: &[[f64; 3]], _: f64, names: &[Descriptor]| {
            FeatureMatrix::from_rows(vec![vec![0.5; names.len()]; points.len()], names.len())
        };
        let assembler = FeatureAssembler::new(provider, DescriptorSchedule::reference());
        let mut input = cloud(&[0.0, 2.0]);
        input.points[0].z = f64::NAN;
        let input = PointCloud::new(input.points);
        let assembled = assembler.assemble(&input).unwrap();
        assert_eq!(assembled.cloud.len(), 1);
        assert_eq!(assembled.features.row(0)[14], -1.0);
    }

    #[test]
    fn provider_receives_each_spec() {
        let calls = Mutex::new(Vec::new());
        let provider = |points: &[[f64; 3]], radius: f64, names: &[Descriptor]| {
            calls.lock().unwrap().push((radius, names.to_vec()));
            FeatureMatrix::from_rows(vec![vec![0.0; names.len()]; points.len()], names.len())
        };
        let assembler = FeatureAssembler::new(&provider, DescriptorSchedule::reference());
        assembler.assemble(&cloud(&[0.0, 1.0])).unwrap();
        let calls = calls.into_inner().unwrap();
        assert_eq!(calls.len(), 7);
        assert_eq!(calls[1].0, 0.1);
        assert_eq!(
            calls[1].1,
            vec![
                Descriptor::Pca2,
                Descriptor::SurfaceVariation,
                Descriptor::Verticality
            ]
        );
        assert_eq!(calls[6].1, vec![Descriptor::Anisotropy, Descriptor::Sphericity]);
    }

    #[test]
    fn malformed_block_is_shape_error() {
        let provider = |_: &[[f64; 3]], _: f64, names: &[Descriptor]| {
            FeatureMatrix::from_rows(vec![vec![0.0; names.len()]], names.len())
        };
        let assembler = FeatureAssembler::new(provider, DescriptorSchedule::reference());
        let err = assembler.assemble(&cloud(&[0.0, 1.0])).unwrap_err();
        assert!(matches!(err, PcdError::Shape(_)));
    }

    #[test]
    fn covariance_provider_end_to_end() {
        let mut points = Vec::new();
        for i in 0..12 {
            for j in 0..12 {
                points.push(Point::new(i as f64 * 0.04, j as f64 * 0.04, 0.01 * i as f64));
            }
        }
        // an isolated point has no neighbourhood and is dropped
        points.push(Point::new(50.0, 50.0, 0.0));
        let input = PointCloud::new(points);

        let assembler = FeatureAssembler::new(
            CovarianceDescriptorProvider::default(),
            DescriptorSchedule::reference(),
        );
        let assembled = assembler.assemble(&input).unwrap();
        assert_eq!(assembled.dropped, 1);
        assert_eq!(assembled.cloud.len(), 144);
        assert_eq!(assembled.features.columns(), 15);
        assert!(assembled
            .features
            .iter_rows()
            .all(|row| row.iter().all(|v| v.is_finite())));
    }
}
