use thiserror::Error;

#[derive(Debug, Error)]
pub enum MigrateError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("identifier {0:?} cannot name a package")]
    InvalidIdentifier(String),

    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("upload to {locator} failed after {attempts} attempt(s): {reason}")]
    Upload {
        locator: String,
        attempts: u32,
        reason: String,
    },

    #[error("manifest error: {0}")]
    Manifest(#[from] sipbag_manifest::ManifestError),

    #[error("bag error: {0}")]
    Bag(#[from] sipbag_bag::BagError),

    #[error("markup error: {0}")]
    Markup(#[from] sipbag_markup::MarkupError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type MigrateResult<T> = Result<T, MigrateError>;
