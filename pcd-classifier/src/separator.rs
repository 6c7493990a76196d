use std::num::NonZeroUsize;

use kiddo::{ImmutableKdTree, SquaredEuclidean};
use nalgebra::Vector3;
use rayon::iter::{IntoParallelRefIterator as _, ParallelIterator as _};

use pcd_core::pointcloud::{
    classification::{ClassificationResult, Label},
    feature::{FeatureIndexSet, FeatureMatrix},
    point::PointCloud,
};
use pcd_core::Result;
use pcd_features::provider::StructureTensor;

use crate::backend::Classifier;

pub const WOOD: Label = 1;
pub const LEAF: Label = 0;

const KMEANS_MAX_ITERATIONS: usize = 50;

#[derive(Debug, Clone, PartialEq)]
pub struct SeparatorParameters {
    /// Neighbourhood sizes; each one casts a wood/leaf vote per point.
    pub knn_list: Vec<usize>,
    pub n_classes: usize,
    /// Fraction of votes a point needs to be labelled wood.
    pub prob_threshold: f64,
}

impl Default for SeparatorParameters {
    fn default() -> Self {
        Self {
            knn_list: vec![40, 50, 80, 100, 120],
            n_classes: 4,
            prob_threshold: 0.95,
        }
    }
}

/// Geometric wood/leaf separation that needs no trained model and no feature
/// matrix.
///
/// For every neighbourhood size the normalised eigenvalues of each point's
/// k-nearest neighbourhood are clustered into `n_classes` groups; groups whose
/// centre is dominated by linearity count as wood. The vote fraction across
/// neighbourhood sizes is compared against `prob_threshold`.
///
/// x and y are shifted by their minimum before the computation, so large
/// projected coordinates do not cost precision. The input points are emitted
/// unchanged and every one of them receives a label.
#[derive(Debug, Clone, Default)]
pub struct RuleBasedSeparator {
    pub params: SeparatorParameters,
}

impl RuleBasedSeparator {
    pub fn new(params: SeparatorParameters) -> Self {
        Self { params }
    }

    pub fn separate(&self, cloud: &PointCloud) -> Vec<Label> {
        let positions = cloud.positions();
        let n = positions.len();
        let scales: Vec<usize> = self
            .params
            .knn_list
            .iter()
            .map(|k| (*k).min(n))
            .filter(|k| *k >= 3)
            .collect();
        if scales.is_empty() || self.params.n_classes == 0 {
            return vec![LEAF; n];
        }

        let tree: ImmutableKdTree<f64, 3> = ImmutableKdTree::new_from_slice(&positions);
        let mut votes = vec![0usize; n];

        for k in &scales {
            let eigenvalues = knn_eigenvalues(&tree, &positions, *k);
            let (centroids, assignments) = kmeans(&eigenvalues, self.params.n_classes);
            let wood_clusters: Vec<bool> = centroids.iter().map(is_linear).collect();
            for (vote, cluster) in votes.iter_mut().zip(&assignments) {
                if wood_clusters[*cluster] {
                    *vote += 1;
                }
            }
            log::debug!(
                "k={}: {} of {} clusters look like wood",
                k,
                wood_clusters.iter().filter(|w| **w).count(),
                centroids.len()
            );
        }

        votes
            .into_iter()
            .map(|vote| {
                let probability = vote as f64 / scales.len() as f64;
                if probability >= self.params.prob_threshold {
                    WOOD
                } else {
                    LEAF
                }
            })
            .collect()
    }
}

impl Classifier for RuleBasedSeparator {
    fn classify(
        &self,
        points: PointCloud,
        _features: FeatureMatrix,
        _selected: &FeatureIndexSet,
    ) -> Result<ClassificationResult> {
        if points.is_empty() {
            return ClassificationResult::new(points, None, Vec::new());
        }
        let min_x = points.metadata.bounding_volume.min[0];
        let min_y = points.metadata.bounding_volume.min[1];

        let normalized = points.translate_xy(-min_x, -min_y);
        let labels = self.separate(&normalized);

        // labels only; coordinates stay as read
        ClassificationResult::new(points, None, labels)
    }
}

fn knn_eigenvalues(
    tree: &ImmutableKdTree<f64, 3>,
    positions: &[[f64; 3]],
    k: usize,
) -> Vec<[f64; 3]> {
    let Some(k) = NonZeroUsize::new(k) else {
        return vec![ISOTROPIC; positions.len()];
    };
    positions
        .par_iter()
        .map(|query| {
            let neighbours: Vec<Vector3<f64>> = tree
                .nearest_n::<SquaredEuclidean>(query, k)
                .iter()
                .map(|nn| Vector3::from(positions[nn.item as usize]))
                .collect();
            StructureTensor::from_neighbourhood(&neighbours)
                .map(|tensor| tensor.eigenvalues)
                .unwrap_or(ISOTROPIC)
        })
        .collect()
}

// Coincident neighbourhoods carry no shape information.
const ISOTROPIC: [f64; 3] = [1.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0];

fn is_linear(centroid: &[f64; 3]) -> bool {
    let [l1, l2, l3] = *centroid;
    if l1 <= 0.0 {
        return false;
    }
    let linearity = (l1 - l2) / l1;
    let planarity = (l2 - l3) / l1;
    let sphericity = l3 / l1;
    linearity > planarity && linearity > sphericity
}

/// Lloyd's k-means with a deterministic start: initial centres are spread over
/// the data ordered by linearity. Returns the centres and each row's cluster.
fn kmeans(data: &[[f64; 3]], clusters: usize) -> (Vec<[f64; 3]>, Vec<usize>) {
    let n = data.len();
    let k = clusters.min(n);
    if k == 0 {
        return (Vec::new(), Vec::new());
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|a, b| linearity(&data[*a]).total_cmp(&linearity(&data[*b])));
    let mut centroids: Vec<[f64; 3]> = (0..k)
        .map(|i| data[order[((2 * i + 1) * n) / (2 * k)]])
        .collect();

    let mut assignments = vec![usize::MAX; n];
    for _ in 0..KMEANS_MAX_ITERATIONS {
        let next: Vec<usize> = data
            .par_iter()
            .map(|row| nearest_centroid(&centroids, row))
            .collect();
        if next == assignments {
            break;
        }
        assignments = next;

        let mut sums = vec![[0.0f64; 3]; k];
        let mut counts = vec![0usize; k];
        for (row, cluster) in data.iter().zip(&assignments) {
            for (sum, value) in sums[*cluster].iter_mut().zip(row) {
                *sum += value;
            }
            counts[*cluster] += 1;
        }
        for ((centroid, sum), count) in centroids.iter_mut().zip(&sums).zip(&counts) {
            // an empty cluster keeps its previous centre
            if *count > 0 {
                *centroid = sum.map(|s| s / *count as f64);
            }
        }
    }

    (centroids, assignments)
}

fn nearest_centroid(centroids: &[[f64; 3]], row: &[f64; 3]) -> usize {
    let mut best = 0;
    let mut best_distance = f64::INFINITY;
    for (index, centroid) in centroids.iter().enumerate() {
        let distance: f64 = centroid
            .iter()
            .zip(row)
            .map(|(c, v)| (c - v) * (c - v))
            .sum();
        if distance < best_distance {
            best = index;
            best_distance = distance;
        }
    }
    best
}

fn linearity(eigenvalues: &[f64; 3]) -> f64 {
    if eigenvalues[0] > 0.0 {
        (eigenvalues[0] - eigenvalues[1]) / eigenvalues[0]
    } else {
        0.0
    }
}
