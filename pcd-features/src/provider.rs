use kiddo::{ImmutableKdTree, SquaredEuclidean};
use nalgebra::{Matrix3, Vector3};
use rayon::iter::{IntoParallelRefIterator as _, ParallelIterator as _};

use pcd_core::pointcloud::feature::FeatureMatrix;
use pcd_core::Result;

use crate::descriptor::Descriptor;

/// Computes one column per requested descriptor for every point, using the
/// neighbourhood of radius `radius` around each point.
///
/// The returned block must have `points.len()` rows and `names.len()` columns,
/// in the order of `names`. Points whose neighbourhood does not support the
/// computation get NaN values instead of an error.
pub trait DescriptorProvider: Sync {
    fn compute(
        &self,
        points: &[[f64; 3]],
        radius: f64,
        names: &[Descriptor],
    ) -> Result<FeatureMatrix>;
}

impl<F> DescriptorProvider for F
where
    F: Fn(&[[f64; 3]], f64, &[Descriptor]) -> Result<FeatureMatrix> + Sync,
{
    fn compute(
        &self,
        points: &[[f64; 3]],
        radius: f64,
        names: &[Descriptor],
    ) -> Result<FeatureMatrix> {
        self(points, radius, names)
    }
}

/// Structure-tensor descriptors over a fixed-radius neighbourhood. The query
/// point is part of its own neighbourhood.
#[derive(Debug, Clone)]
pub struct CovarianceDescriptorProvider {
    pub min_neighbours: usize,
}

impl Default for CovarianceDescriptorProvider {
    fn default() -> Self {
        Self { min_neighbours: 3 }
    }
}

impl DescriptorProvider for CovarianceDescriptorProvider {
    fn compute(
        &self,
        points: &[[f64; 3]],
        radius: f64,
        names: &[Descriptor],
    ) -> Result<FeatureMatrix> {
        if points.is_empty() {
            return FeatureMatrix::from_rows(Vec::new(), names.len());
        }

        let start = std::time::Instant::now();
        let tree: ImmutableKdTree<f64, 3> = ImmutableKdTree::new_from_slice(points);
        let radius_sq = radius * radius;

        let rows: Vec<Vec<f64>> = points
            .par_iter()
            .map(|query| {
                let neighbours = tree.within::<SquaredEuclidean>(query, radius_sq);
                if neighbours.len() < self.min_neighbours {
                    return vec![f64::NAN; names.len()];
                }
                let positions: Vec<Vector3<f64>> = neighbours
                    .iter()
                    .map(|nn| Vector3::from(points[nn.item as usize]))
                    .collect();

                match StructureTensor::from_neighbourhood(&positions) {
                    Some(tensor) => names.iter().map(|name| tensor.evaluate(*name)).collect(),
                    None => vec![f64::NAN; names.len()],
                }
            })
            .collect();

        log::debug!(
            "computed {:?} at radius {} for {} points in {:?}",
            names,
            radius,
            points.len(),
            start.elapsed()
        );

        FeatureMatrix::from_rows(rows, names.len())
    }
}

/// Sorted, normalised eigen-decomposition of a neighbourhood covariance.
#[derive(Debug, Clone, Copy)]
pub struct StructureTensor {
    pub eigenvalues: [f64; 3],
    pub sum: f64,
    pub normal: [f64; 3],
}

impl StructureTensor {
    /// `None` when the neighbourhood is degenerate (all points coincide).
    pub fn from_neighbourhood(positions: &[Vector3<f64>]) -> Option<Self> {
        if positions.is_empty() {
            return None;
        }
        let centroid = calc_centroid(positions);
        let covariance = calc_covariance_matrix(&centroid, positions);

        let eigen = covariance.symmetric_eigen();
        let mut order = [0usize, 1, 2];
        order.sort_by(|a, b| eigen.eigenvalues[*b].total_cmp(&eigen.eigenvalues[*a]));

        let values = order.map(|i| eigen.eigenvalues[i].max(0.0));
        let sum: f64 = values.iter().sum();
        if !sum.is_finite() || sum <= f64::EPSILON {
            return None;
        }

        let mut normal: Vector3<f64> = eigen.eigenvectors.column(order[2]).into_owned();
        if normal.z < 0.0 {
            normal = -normal;
        }

        Some(Self {
            eigenvalues: values.map(|v| v / sum),
            sum,
            normal: [normal.x, normal.y, normal.z],
        })
    }

    pub fn evaluate(&self, descriptor: Descriptor) -> f64 {
        descriptor.evaluate(self.eigenvalues, self.sum, self.normal)
    }
}

fn calc_centroid(positions: &[Vector3<f64>]) -> Vector3<f64> {
    let sum: Vector3<f64> = positions.iter().sum();
    sum / (positions.len() as f64)
}

fn calc_covariance_matrix(centroid: &Vector3<f64>, positions: &[Vector3<f64>]) -> Matrix3<f64> {
    let unweighted: Matrix3<f64> = positions
        .iter()
        .map(|v| {
            let diff: Vector3<f64> = v - centroid;
            diff * diff.transpose()
        })
        .sum();
    unweighted / (positions.len() as f64)
}
