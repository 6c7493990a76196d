mod batch;
mod jobs;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process;

use chrono::Local;
use clap::{Args, Parser, Subcommand};
use env_logger::Builder;
use log::LevelFilter;

use pcd_classifier::{
    load_feature_indices, RandomForest, RuleBasedSeparator, SeparatorParameters,
    TrainedModelClassifier,
};
use pcd_core::pointcloud::feature::FeatureIndexSet;
use pcd_features::{CovarianceDescriptorProvider, DescriptorSchedule, FeatureAssembler};
use pcd_parser::parsers::Extension;

use batch::{run_batch, BatchError, BatchReport};
use jobs::{ClassifyJob, FeatureJob, FeatureSource, OutputNaming};

#[derive(Parser, Debug)]
#[command(
    name = "Point Classifier",
    about = "Multi-scale geometric features and wood/leaf classification for lidar point clouds",
    author = "MIERUNE Inc.",
    version = "0.0.1"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct Dirs {
    #[arg(short, long, required = true, value_name = "DIR")]
    input: PathBuf,

    #[arg(short, long, required = true, value_name = "DIR")]
    output: PathBuf,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compute multi-scale features for every LAS/LAZ file
    Features {
        #[command(flatten)]
        dirs: Dirs,

        /// JSON descriptor schedule; the built-in 7-radius schedule if omitted
        #[arg(long, value_name = "FILE")]
        schedule: Option<PathBuf>,
    },

    /// Label feature text files with a trained forest
    Classify {
        #[command(flatten)]
        dirs: Dirs,

        #[arg(long, required = true, value_name = "FILE")]
        feature_indices: PathBuf,

        #[arg(long, required = true, value_name = "FILE")]
        model: PathBuf,

        /// Assemble features from the coordinates instead of reading them
        #[arg(long)]
        assemble: bool,

        #[arg(long, value_name = "FILE")]
        schedule: Option<PathBuf>,
    },

    /// Separate wood from leaf points without a trained model
    Separate {
        #[command(flatten)]
        dirs: Dirs,

        #[arg(long, value_delimiter = ',', default_values_t = [40, 50, 80, 100, 120])]
        knn: Vec<usize>,

        #[arg(long, default_value_t = 4)]
        classes: usize,

        #[arg(long, default_value_t = 0.95)]
        prob_threshold: f64,
    },
}

fn load_schedule(path: Option<&Path>) -> Result<DescriptorSchedule, BatchError> {
    let schedule = match path {
        Some(path) => DescriptorSchedule::load(path)?,
        None => DescriptorSchedule::reference(),
    };
    log::info!(
        "descriptor schedule: {} specs, {} feature columns",
        schedule.specs().len(),
        schedule.column_count() + 1
    );
    log::debug!("feature columns: {:?} + relative height", schedule.column_names());
    Ok(schedule)
}

fn log_report(report: &BatchReport) {
    for file in &report.files {
        match file.classify_elapsed {
            Some(elapsed) => log::debug!(
                "{:?} -> {:?}: {} points, classified in {:?}",
                file.input,
                file.output,
                file.points,
                elapsed
            ),
            None => log::debug!(
                "{:?} -> {:?}: {} points",
                file.input,
                file.output,
                file.points
            ),
        }
    }
    log::info!(
        "All files processed in {:?} ({} files written)",
        report.elapsed,
        report.files.len()
    );
}

fn run(command: Command) -> Result<BatchReport, BatchError> {
    match command {
        Command::Features { dirs, schedule } => {
            log::info!("input folder: {:?}", dirs.input);
            log::info!("output folder: {:?}", dirs.output);
            let schedule = load_schedule(schedule.as_deref())?;
            let job = FeatureJob::new(FeatureAssembler::new(
                CovarianceDescriptorProvider::default(),
                schedule,
            ));
            run_batch(&dirs.input, &dirs.output, &job)
        }
        Command::Classify {
            dirs,
            feature_indices,
            model,
            assemble,
            schedule,
        } => {
            log::info!("input folder: {:?}", dirs.input);
            log::info!("output folder: {:?}", dirs.output);
            let indices = load_feature_indices(&feature_indices)?;
            log::info!("feature indices: {:?}", indices.as_slice());
            let forest = RandomForest::load(&model)?;
            log::info!("model: {:?} ({} trees)", model, forest.trees.len());

            let features = if assemble {
                let schedule = load_schedule(schedule.as_deref())?;
                FeatureSource::Assemble(FeatureAssembler::new(
                    CovarianceDescriptorProvider::default(),
                    schedule,
                ))
            } else {
                FeatureSource::FromInput
            };
            let job = ClassifyJob::new(
                Box::new(TrainedModelClassifier::new(Box::new(forest))),
                indices,
                features,
                OutputNaming::Prefix("classified_".to_string()),
                vec![Extension::Txt],
            );
            run_batch(&dirs.input, &dirs.output, &job)
        }
        Command::Separate {
            dirs,
            knn,
            classes,
            prob_threshold,
        } => {
            log::info!("input folder: {:?}", dirs.input);
            log::info!("output folder: {:?}", dirs.output);
            let params = SeparatorParameters {
                knn_list: knn,
                n_classes: classes,
                prob_threshold,
            };
            log::info!("separator parameters: {:?}", params);

            let job: ClassifyJob<CovarianceDescriptorProvider> = ClassifyJob::new(
                Box::new(RuleBasedSeparator::new(params)),
                FeatureIndexSet::default(),
                FeatureSource::None,
                OutputNaming::ReplaceExtension("txt".to_string()),
                vec![Extension::Txt, Extension::Las, Extension::Laz],
            );
            run_batch(&dirs.input, &dirs.output, &job)
        }
    }
}

fn main() {
    Builder::new()
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] - {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .filter(None, LevelFilter::Info)
        .parse_default_env()
        .init();

    let args = Cli::parse();

    log::info!("start processing...");

    match run(args.command) {
        Ok(report) => log_report(&report),
        Err(err) => {
            log::error!("{}", err);
            process::exit(1);
        }
    }

    log::info!("Finish processing");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn separate_defaults() {
        let cli = Cli::try_parse_from(["pclass", "separate", "-i", "in", "-o", "out"]).unwrap();
        match cli.command {
            Command::Separate {
                knn,
                classes,
                prob_threshold,
                ..
            } => {
                assert_eq!(knn, vec![40, 50, 80, 100, 120]);
                assert_eq!(classes, 4);
                assert_eq!(prob_threshold, 0.95);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn classify_requires_model_and_indices() {
        assert!(Cli::try_parse_from(["pclass", "classify", "-i", "in", "-o", "out"]).is_err());
        let cli = Cli::try_parse_from([
            "pclass",
            "classify",
            "-i",
            "in",
            "-o",
            "out",
            "--feature-indices",
            "idx.txt",
            "--model",
            "forest.json",
            "--assemble",
        ])
        .unwrap();
        assert!(matches!(cli.command, Command::Classify { assemble: true, .. }));
    }

    #[test]
    fn knn_list_is_comma_separated() {
        let cli = Cli::try_parse_from([
            "pclass", "separate", "-i", "in", "-o", "out", "--knn", "10,20",
        ])
        .unwrap();
        assert!(matches!(cli.command, Command::Separate { knn, .. } if knn == vec![10, 20]));
    }

    #[test]
    fn missing_schedule_file_is_setup_error() {
        let err = load_schedule(Some(Path::new("/nonexistent/schedule.json"))).unwrap_err();
        assert!(matches!(err, BatchError::Setup(_)));
    }
}
