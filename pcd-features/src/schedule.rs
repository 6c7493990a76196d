use std::{collections::HashSet, fs, path::Path};

use serde::{Deserialize, Serialize};

use pcd_core::{PcdError, Result};

use crate::descriptor::Descriptor;

/// One provider call: the descriptors to compute at a given radius.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DescriptorSpec {
    pub radius: f64,
    pub descriptors: Vec<Descriptor>,
}

impl DescriptorSpec {
    pub fn new(radius: f64, descriptors: Vec<Descriptor>) -> Self {
        Self {
            radius,
            descriptors,
        }
    }
}

/// Ordered list of descriptor specs. The order fixes the column layout of the
/// assembled feature matrix, so a trained model is only valid for the
/// schedule its training data was generated with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DescriptorSchedule {
    specs: Vec<DescriptorSpec>,
}

impl DescriptorSchedule {
    pub fn new(specs: Vec<DescriptorSpec>) -> std::result::Result<Self, String> {
        let schedule = Self { specs };
        schedule.validate()?;
        Ok(schedule)
    }

    /// Seven specs at radii 0.1 to 0.6 yielding 14 columns.
    pub fn reference() -> Self {
        use Descriptor::*;

        Self {
            specs: vec![
                DescriptorSpec::new(0.1, vec![SurfaceVariation]),
                DescriptorSpec::new(0.1, vec![Pca2, SurfaceVariation, Verticality]),
                DescriptorSpec::new(0.2, vec![SurfaceVariation]),
                DescriptorSpec::new(0.2, vec![Anisotropy, SurfaceVariation, Sphericity]),
                DescriptorSpec::new(0.4, vec![SurfaceVariation]),
                DescriptorSpec::new(0.4, vec![Anisotropy, SurfaceVariation, Sphericity]),
                DescriptorSpec::new(0.6, vec![Anisotropy, Sphericity]),
            ],
        }
    }

    /// Reads a JSON array of `{"radius": .., "descriptors": [..]}` objects.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let schedule: DescriptorSchedule =
            serde_json::from_str(&text).map_err(|e| PcdError::config(path, e.to_string()))?;
        schedule
            .validate()
            .map_err(|message| PcdError::config(path, message))?;
        Ok(schedule)
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if self.specs.is_empty() {
            return Err("descriptor schedule is empty".to_string());
        }
        for (index, spec) in self.specs.iter().enumerate() {
            if !(spec.radius.is_finite() && spec.radius > 0.0) {
                return Err(format!("spec {} has non-positive radius {}", index, spec.radius));
            }
            if spec.descriptors.is_empty() {
                return Err(format!("spec {} requests no descriptors", index));
            }
            let mut seen = HashSet::new();
            if let Some(dup) = spec.descriptors.iter().find(|d| !seen.insert(**d)) {
                return Err(format!("spec {} requests {} twice", index, dup));
            }
        }
        Ok(())
    }

    pub fn specs(&self) -> &[DescriptorSpec] {
        &self.specs
    }

    /// Number of provider columns, relative height excluded.
    pub fn column_count(&self) -> usize {
        self.specs.iter().map(|spec| spec.descriptors.len()).sum()
    }

    /// `name@radius` for each provider column, in matrix order.
    pub fn column_names(&self) -> Vec<String> {
        self.specs
            .iter()
            .flat_map(|spec| {
                spec.descriptors
                    .iter()
                    .map(move |d| format!("{}@{}", d, spec.radius))
            })
            .collect()
    }
}

impl Default for DescriptorSchedule {
    fn default() -> Self {
        Self::reference()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn reference_schedule_shape() {
        let schedule = DescriptorSchedule::reference();
        let counts: Vec<usize> = schedule
            .specs()
            .iter()
            .map(|spec| spec.descriptors.len())
            .collect();
        assert_eq!(counts, vec![1, 3, 1, 3, 1, 3, 2]);
        let radii: Vec<f64> = schedule.specs().iter().map(|spec| spec.radius).collect();
        assert_eq!(radii, vec![0.1, 0.1, 0.2, 0.2, 0.4, 0.4, 0.6]);
        assert_eq!(schedule.column_count(), 14);
        assert_eq!(schedule.column_names()[1], "PCA2@0.1");
    }

    #[test]
    fn loads_json_schedule() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"radius": 0.3, "descriptors": ["linearity", "verticality"]}}]"#
        )
        .unwrap();
        let schedule = DescriptorSchedule::load(file.path()).unwrap();
        assert_eq!(schedule.column_count(), 2);
        assert_eq!(schedule.specs()[0].descriptors[1], Descriptor::Verticality);
    }

    #[test]
    fn rejects_unknown_descriptor_and_bad_radius() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"[{{"radius": 0.3, "descriptors": ["roundness"]}}]"#).unwrap();
        assert!(matches!(
            DescriptorSchedule::load(file.path()),
            Err(PcdError::Config { .. })
        ));

        let bad_radius = DescriptorSchedule::new(vec![DescriptorSpec::new(
            0.0,
            vec![Descriptor::Pca1],
        )]);
        assert!(bad_radius.is_err());
        assert!(DescriptorSchedule::new(Vec::new()).is_err());
        let duplicated = DescriptorSchedule::new(vec![DescriptorSpec::new(
            0.2,
            vec![Descriptor::Pca1, Descriptor::Pca1],
        )]);
        assert!(duplicated.is_err());
    }

    #[test]
    fn serializes_to_loadable_json() {
        let json = serde_json::to_string(&DescriptorSchedule::reference()).unwrap();
        let parsed: DescriptorSchedule = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, DescriptorSchedule::reference());
    }
}
