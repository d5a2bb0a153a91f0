/// Errors surfaced by collections, stores, and transactions.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("index {index} out of range for collection of {count}")]
    OutOfRange { index: usize, count: usize },
    #[error("document not found: {path}")]
    NotFound { path: String },
    #[error("document at {path} is not a valid record")]
    DataIntegrity { path: String },
    #[error("transaction aborted after {attempts} conflicting attempts")]
    Aborted { attempts: u32 },
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
