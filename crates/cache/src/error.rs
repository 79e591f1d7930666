use restsum_protocol::ErrorKind;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CacheError>;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("IO error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Cache directory {} is locked by another run", .0.display())]
    Locked(PathBuf),

    #[error("Cache is disabled: {0}")]
    Disabled(String),
}

impl CacheError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Every cache failure degrades to a miss for the caller.
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::CacheUnavailable
    }
}
