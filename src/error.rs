use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("failed to load model from {path}: {message}")]
    ModelLoad { path: PathBuf, message: String },

    #[error("failed to read labels from {path}: {source}")]
    Labels {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid image: {0}")]
    Image(#[from] image::ImageError),

    #[error("model expects {expected}x{expected} input, got {actual}x{actual}")]
    InputSizeMismatch { expected: u32, actual: u32 },

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("model produced no scores")]
    EmptyOutput,

    /// Failure reported by a classifier implementation outside this crate.
    #[error("{0}")]
    Other(String),
}

/// Coarse classification of a [`ProcessingError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Io,
    Classifier,
    Input,
}

#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error("could not stage upload: {0}")]
    Stage(#[from] io::Error),

    #[error(transparent)]
    Classifier(#[from] ClassifierError),

    #[error("classifier returned class {0} which has no label")]
    UnknownClass(usize),

    #[error("classifier returned confidence {0} outside [0, 1]")]
    InvalidConfidence(f32),

    #[error("unsupported image extension {0:?}, expected jpg or png")]
    UnsupportedExtension(String),
}

impl ProcessingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProcessingError::Stage(_) => ErrorKind::Io,
            ProcessingError::Classifier(_)
            | ProcessingError::UnknownClass(_)
            | ProcessingError::InvalidConfidence(_) => ErrorKind::Classifier,
            ProcessingError::UnsupportedExtension(_) => ErrorKind::Input,
        }
    }

    /// Message shown to the user.
    pub fn user_message(&self) -> String {
        format!("An error occurred: {}", self)
    }
}
