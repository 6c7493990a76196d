use std::{
    fmt, fs, io,
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

use glob::{glob, Pattern};

use pcd_core::PcdError;
use pcd_parser::parsers::{extension_of, Extension};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Read,
    Assemble,
    Classify,
    Write,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::Read => "read",
            Step::Assemble => "feature assembly",
            Step::Classify => "classification",
            Step::Write => "write",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    /// Schedule, index file or model could not be loaded before the run.
    #[error("cannot prepare run: {0}")]
    Setup(#[from] PcdError),

    #[error("input directory {} does not exist", .0.display())]
    InputDir(PathBuf),

    #[error("cannot create output directory {}: {source}", .path.display())]
    OutputDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid input pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("cannot list input files: {0}")]
    Glob(#[from] glob::GlobError),

    #[error("{step} failed for {}: {source}", .file.display())]
    File {
        file: PathBuf,
        step: Step,
        #[source]
        source: PcdError,
    },
}

impl BatchError {
    pub fn file(file: &Path, step: Step) -> impl FnOnce(PcdError) -> BatchError + '_ {
        move |source| BatchError::File {
            file: file.to_path_buf(),
            step,
            source,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FileReport {
    pub input: PathBuf,
    pub output: PathBuf,
    pub points: usize,
    pub classify_elapsed: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct BatchReport {
    pub files: Vec<FileReport>,
    pub elapsed: Duration,
}

/// One per-file pipeline driven by [`run_batch`].
pub trait FileJob {
    fn accepts(&self, extension: Extension) -> bool;

    /// Output file name derived from the input file name.
    fn output_name(&self, input: &Path) -> String;

    fn process(&self, input: &Path, output: &Path) -> Result<FileReport, BatchError>;
}

/// Regular files directly inside `input_dir` accepted by `job`, in name order.
pub fn list_input_files(input_dir: &Path, job: &dyn FileJob) -> Result<Vec<PathBuf>, BatchError> {
    if !input_dir.is_dir() {
        return Err(BatchError::InputDir(input_dir.to_path_buf()));
    }
    let pattern = format!(
        "{}/*",
        Pattern::escape(&input_dir.to_string_lossy()).trim_end_matches('/')
    );

    let mut files = Vec::new();
    for entry in glob(&pattern)? {
        let path = entry?;
        if !path.is_file() {
            continue;
        }
        if extension_of(&path).is_some_and(|ext| job.accepts(ext)) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Runs `job` over every eligible file of `input_dir`, writing into
/// `output_dir`. Stops at the first failing file; outputs already written stay
/// on disk.
pub fn run_batch(
    input_dir: &Path,
    output_dir: &Path,
    job: &dyn FileJob,
) -> Result<BatchReport, BatchError> {
    let start = Instant::now();

    fs::create_dir_all(output_dir).map_err(|source| BatchError::OutputDir {
        path: output_dir.to_path_buf(),
        source,
    })?;

    let files = list_input_files(input_dir, job)?;
    log::info!("found {} input files in {:?}", files.len(), input_dir);

    let total_files = files.len();
    let mut reports = Vec::with_capacity(total_files);
    for (idx, input) in files.iter().enumerate() {
        let output = output_dir.join(job.output_name(input));
        let report = job.process(input, &output)?;

        let progress_percentage = ((idx + 1) as f64 / total_files as f64) * 100.0;
        log::info!(
            "Processing {} | Progress: {:.2}%",
            display_name(input),
            progress_percentage
        );
        reports.push(report);
    }

    Ok(BatchReport {
        files: reports,
        elapsed: start.elapsed(),
    })
}

pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

pub fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}
