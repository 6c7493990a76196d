use std::path::PathBuf;

pub type Result<T, E = PcdError> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum PcdError {
    #[error("{}:{line}: {message}", .path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("invalid configuration {}: {message}", .path.display())]
    Config { path: PathBuf, message: String },

    #[error("row count mismatch: {0}")]
    Shape(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("classifier failure: {0}")]
    Classifier(String),
}

impl PcdError {
    pub fn parse(path: impl Into<PathBuf>, line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            line,
            message: message.into(),
        }
    }

    pub fn config(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Config {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn shape(message: impl Into<String>) -> Self {
        Self::Shape(message.into())
    }

    pub fn classifier(message: impl Into<String>) -> Self {
        Self::Classifier(message.into())
    }
}
