#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn to_array(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }
}

impl From<[f64; 3]> for Point {
    fn from([x, y, z]: [f64; 3]) -> Self {
        Self { x, y, z }
    }
}

/// Ordered set of points. Row `i` here is row `i` of every feature matrix and
/// label vector derived from the cloud, so the order must never change.
#[derive(Debug, Clone, Default)]
pub struct PointCloud {
    pub points: Vec<Point>,
    pub metadata: Metadata,
}

impl PointCloud {
    pub fn new(points: Vec<Point>) -> Self {
        let mut bounding_volume = BoundingVolume {
            min: [f64::MAX, f64::MAX, f64::MAX],
            max: [f64::MIN, f64::MIN, f64::MIN],
        };

        for point in &points {
            bounding_volume.max[0] = bounding_volume.max[0].max(point.x);
            bounding_volume.max[1] = bounding_volume.max[1].max(point.y);
            bounding_volume.max[2] = bounding_volume.max[2].max(point.z);
            bounding_volume.min[0] = bounding_volume.min[0].min(point.x);
            bounding_volume.min[1] = bounding_volume.min[1].min(point.y);
            bounding_volume.min[2] = bounding_volume.min[2].min(point.z);
        }

        let metadata = Metadata {
            point_count: points.len(),
            bounding_volume,
        };

        PointCloud { points, metadata }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (f64, f64, f64, &Point)> {
        self.points
            .iter()
            .map(|point| (point.x, point.y, point.z, point))
    }

    pub fn positions(&self) -> Vec<[f64; 3]> {
        self.points.iter().map(Point::to_array).collect()
    }

    /// Keeps the points whose mask entry is `true`. The mask must have one
    /// entry per point.
    pub fn retain_mask(&self, mask: &[bool]) -> PointCloud {
        debug_assert_eq!(mask.len(), self.points.len());
        let points = self
            .points
            .iter()
            .zip(mask)
            .filter(|(_, keep)| **keep)
            .map(|(point, _)| *point)
            .collect();
        PointCloud::new(points)
    }

    /// Shifts every point by `(dx, dy, 0)`; `translate_xy(-dx, -dy)` undoes it.
    pub fn translate_xy(&self, dx: f64, dy: f64) -> PointCloud {
        let points = self
            .points
            .iter()
            .map(|p| Point::new(p.x + dx, p.y + dy, p.z))
            .collect();
        PointCloud::new(points)
    }
}

// Min/max of the coordinates; an empty cloud keeps the inverted sentinel bounds.
#[derive(Debug, Clone, Default)]
pub struct BoundingVolume {
    pub min: [f64; 3],
    pub max: [f64; 3],
}

#[derive(Debug, Clone, Default)]
pub struct Metadata {
    pub point_count: usize,
    pub bounding_volume: BoundingVolume,
}
