use restsum_dispatch::BackendError;
use restsum_extractor::ExtractError;
use restsum_protocol::ErrorKind;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Failures that end a run before any endpoint work starts.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error("Backend unavailable: {0}")]
    Backend(#[from] BackendError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Extract(err) => err.kind(),
            Self::Backend(err) => err.kind(),
            Self::InvalidConfig(_) => ErrorKind::UnsupportedInputKind,
        }
    }
}
