use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to decode {}: {reason}", path.display())]
    Decode { path: PathBuf, reason: String },

    #[error("audio capture failed: {0}")]
    Capture(String),

    #[error("database error: {0}")]
    Index(#[from] rusqlite::Error),

    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Content hash already present in the index. Non-fatal during
    /// directory ingest; the recording is skipped.
    #[error("recording with content hash {0} is already indexed")]
    DuplicateContent(String),
}

impl Error {
    pub(crate) fn decode(path: &std::path::Path, reason: impl ToString) -> Self {
        Error::Decode {
            path: path.to_owned(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        Error::Io {
            path: path.to_owned(),
            source,
        }
    }
}
