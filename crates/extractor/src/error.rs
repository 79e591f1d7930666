use restsum_protocol::ErrorKind;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for reader and extractor operations
pub type Result<T> = std::result::Result<T, ExtractError>;

/// Errors raised while reading and extracting endpoints
#[derive(Error, Debug)]
pub enum ExtractError {
    /// The input root (or a file under it) could not be read
    #[error("IO error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// No reader exists for the declared input kind
    #[error("Unsupported input kind: {0}")]
    UnsupportedInputKind(String),

    /// A fragment could not be parsed at all
    #[error("Malformed input at {location}: {reason}")]
    MalformedInput { location: String, reason: String },

    /// An include/exclude pattern failed to compile
    #[error("Invalid glob pattern `{pattern}`: {reason}")]
    InvalidGlob { pattern: String, reason: String },
}

impl ExtractError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn malformed(location: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedInput {
            location: location.into(),
            reason: reason.into(),
        }
    }

    /// Taxonomy bucket reported to callers.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io { .. } => ErrorKind::Io,
            Self::UnsupportedInputKind(_) | Self::InvalidGlob { .. } => {
                ErrorKind::UnsupportedInputKind
            }
            Self::MalformedInput { .. } => ErrorKind::MalformedInput,
        }
    }
}
