/// Errors from digest configuration.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum CryptoError {
    /// The configured digest algorithm is not supported. Fatal at startup.
    #[error("no such digest algorithm: {0}")]
    UnknownAlgorithm(String),
}

pub type CryptoResult<T> = Result<T, CryptoError>;
