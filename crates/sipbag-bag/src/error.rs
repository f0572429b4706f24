use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BagError {
    #[error("invalid payload path {0:?}")]
    InvalidPath(String),

    #[error("payload {0} written twice")]
    DuplicatePayload(String),

    #[error("a bag already exists at {0}")]
    AlreadyExists(PathBuf),

    #[error("not a bag: {0}")]
    NotABag(PathBuf),

    #[error("malformed {file} line {line}: {reason}")]
    Malformed {
        file: String,
        line: usize,
        reason: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type BagResult<T> = Result<T, BagError>;
