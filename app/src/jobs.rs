use std::{path::Path, time::Instant};

use pcd_classifier::Classifier;
use pcd_core::pointcloud::feature::{FeatureIndexSet, FeatureMatrix};
use pcd_features::{DescriptorProvider, FeatureAssembler};
use pcd_parser::parsers::Extension;
use pcd_parser::writer::write_classification;
use pcd_parser::{read_points_and_features, write_feature_points};

use crate::batch::{display_name, file_stem, BatchError, FileJob, FileReport, Step};

/// Lidar tiles in, `feature_<stem>.txt` out: `x y z` followed by the
/// assembled feature columns of every retained point.
pub struct FeatureJob<P> {
    assembler: FeatureAssembler<P>,
}

impl<P: DescriptorProvider> FeatureJob<P> {
    pub fn new(assembler: FeatureAssembler<P>) -> Self {
        Self { assembler }
    }
}

impl<P: DescriptorProvider> FileJob for FeatureJob<P> {
    fn accepts(&self, extension: Extension) -> bool {
        matches!(extension, Extension::Las | Extension::Laz)
    }

    fn output_name(&self, input: &Path) -> String {
        format!("feature_{}.txt", file_stem(input))
    }

    fn process(&self, input: &Path, output: &Path) -> Result<FileReport, BatchError> {
        let parsed = read_points_and_features(input).map_err(BatchError::file(input, Step::Read))?;
        let assembled = self
            .assembler
            .assemble(&parsed.cloud)
            .map_err(BatchError::file(input, Step::Assemble))?;
        if assembled.dropped > 0 {
            log::debug!(
                "{}: dropped {} points with invalid features",
                display_name(input),
                assembled.dropped
            );
        }

        write_feature_points(&assembled.cloud, &assembled.features, output)
            .map_err(BatchError::file(input, Step::Write))?;

        Ok(FileReport {
            input: input.to_path_buf(),
            output: output.to_path_buf(),
            points: assembled.cloud.len(),
            classify_elapsed: None,
        })
    }
}

/// Where a classification run gets its feature matrix from.
pub enum FeatureSource<P> {
    /// Columns after `x y z` in the input text file.
    FromInput,
    /// Assembled from the coordinates; any columns in the file are ignored.
    Assemble(FeatureAssembler<P>),
    /// The backend works on coordinates alone.
    None,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputNaming {
    /// `<prefix><input file name>`
    Prefix(String),
    /// `<input stem>.<extension>`
    ReplaceExtension(String),
}

impl OutputNaming {
    pub fn apply(&self, input: &Path) -> String {
        match self {
            OutputNaming::Prefix(prefix) => format!("{}{}", prefix, display_name(input)),
            OutputNaming::ReplaceExtension(extension) => {
                format!("{}.{}", file_stem(input), extension)
            }
        }
    }
}

/// Reads points, obtains features, runs the backend and writes one labelled
/// line per point. The backend, indices and optional assembler are shared by
/// every file of the run.
pub struct ClassifyJob<P> {
    classifier: Box<dyn Classifier>,
    indices: FeatureIndexSet,
    features: FeatureSource<P>,
    naming: OutputNaming,
    extensions: Vec<Extension>,
}

impl<P: DescriptorProvider> ClassifyJob<P> {
    pub fn new(
        classifier: Box<dyn Classifier>,
        indices: FeatureIndexSet,
        features: FeatureSource<P>,
        naming: OutputNaming,
        extensions: Vec<Extension>,
    ) -> Self {
        Self {
            classifier,
            indices,
            features,
            naming,
            extensions,
        }
    }
}

impl<P: DescriptorProvider> FileJob for ClassifyJob<P> {
    fn accepts(&self, extension: Extension) -> bool {
        self.extensions.contains(&extension)
    }

    fn output_name(&self, input: &Path) -> String {
        self.naming.apply(input)
    }

    fn process(&self, input: &Path, output: &Path) -> Result<FileReport, BatchError> {
        let name = display_name(input);
        let parsed = read_points_and_features(input).map_err(BatchError::file(input, Step::Read))?;

        let (cloud, features) = match &self.features {
            FeatureSource::FromInput => {
                let rows = parsed.cloud.len();
                let features = parsed
                    .features
                    .unwrap_or_else(|| FeatureMatrix::empty(rows));
                (parsed.cloud, features)
            }
            FeatureSource::Assemble(assembler) => {
                let assembled = assembler
                    .assemble(&parsed.cloud)
                    .map_err(BatchError::file(input, Step::Assemble))?;
                (assembled.cloud, assembled.features)
            }
            FeatureSource::None => {
                let rows = parsed.cloud.len();
                (parsed.cloud, FeatureMatrix::empty(rows))
            }
        };

        log::info!("Classifying {} ...", name);
        let start = Instant::now();
        let result = self
            .classifier
            .classify(cloud, features, &self.indices)
            .map_err(BatchError::file(input, Step::Classify))?;
        let elapsed = start.elapsed();
        log::info!(
            "Time taken for {}: {:.2} seconds",
            name,
            elapsed.as_secs_f64()
        );

        write_classification(&result, output).map_err(BatchError::file(input, Step::Write))?;

        Ok(FileReport {
            input: input.to_path_buf(),
            output: output.to_path_buf(),
            points: result.len(),
            classify_elapsed: Some(elapsed),
        })
    }
}
