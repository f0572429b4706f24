use thiserror::Error;

use crate::entry::NodeKind;

/// Errors from building, parsing, or validating a manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("malformed manifest line {line}: {reason}")]
    Parse { line: usize, reason: String },

    #[error("node not found: {0}")]
    NodeNotFound(String),

    #[error("{id} is an {kind} and cannot scope a manifest")]
    NotAContainer { id: String, kind: NodeKind },

    #[error("identifier {0:?} is empty, a dot name, or contains whitespace or a backslash")]
    InvalidIdentifier(String),

    #[error("first entry must be at depth 0, found depth {depth}")]
    FirstEntryNotRoot { depth: u32 },

    #[error("depth jumps from {from} to {to} at entry {line}")]
    DepthJump { line: usize, from: u32, to: u32 },

    #[error("leaf {id} at entry {line} is followed by a child")]
    LeafWithChildren { line: usize, id: String },

    #[error("duplicate identifier {id} at entry {line}")]
    DuplicateIdentifier { line: usize, id: String },

    #[error("hierarchy source error: {0}")]
    Source(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ManifestResult<T> = Result<T, ManifestError>;
