use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by the annotation core.
///
/// None of these are fatal to the GUI: the session turns them into notices
/// and keeps its previous state.
#[derive(Debug, Error)]
pub enum AnnotatorError {
    #[error("cannot access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot decode image {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("no folder named '{folder}' found below {}", start.display())]
    ImageRootNotFound { folder: String, start: PathBuf },

    #[error("invalid search pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("cannot listen on {addr}: {message}")]
    Bind { addr: String, message: String },
}

impl AnnotatorError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AnnotatorError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, AnnotatorError>;
