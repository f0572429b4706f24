use thiserror::Error;

/// Errors from reading or writing metadata markup.
///
/// Syntax problems and I/O failures are both surfaced to callers as a single
/// I/O-class failure; the reader never attempts partial recovery.
#[derive(Debug, Error)]
pub enum MarkupError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed markup: {0}")]
    Syntax(String),

    #[error("invalid UTF-8 in markup: {0}")]
    Encoding(String),
}

impl From<quick_xml::Error> for MarkupError {
    fn from(err: quick_xml::Error) -> Self {
        match err {
            quick_xml::Error::Io(io) => match std::sync::Arc::try_unwrap(io) {
                Ok(io) => Self::Io(io),
                Err(shared) => Self::Io(std::io::Error::new(shared.kind(), shared.to_string())),
            },
            other => Self::Syntax(other.to_string()),
        }
    }
}

impl From<quick_xml::events::attributes::AttrError> for MarkupError {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        Self::Syntax(err.to_string())
    }
}

impl From<std::str::Utf8Error> for MarkupError {
    fn from(err: std::str::Utf8Error) -> Self {
        Self::Encoding(err.to_string())
    }
}

pub type MarkupResult<T> = Result<T, MarkupError>;
