use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while converting ground-truth containers.
#[derive(Debug, Error)]
pub enum ConvertError {
    /// A directory or container that must exist is missing.
    #[error("not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The container could not be read or lacks the expected layout.
    #[error("malformed container {container}: {reason}")]
    MalformedContainer { container: String, reason: String },

    /// The parallel per-frame arrays disagree in length.
    #[error("inconsistent record {image_name}: {reason}")]
    InconsistentRecord { image_name: String, reason: String },

    /// A class code outside the dataset vocabulary.
    #[error("unknown class code {0}")]
    UnknownClassCode(i64),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}

impl ConvertError {
    pub(crate) fn malformed(container: impl Into<String>, reason: impl Into<String>) -> Self {
        ConvertError::MalformedContainer {
            container: container.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ConvertError>;
