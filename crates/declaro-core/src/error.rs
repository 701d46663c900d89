use thiserror::Error;

/// Core error type shared across declaro crates.
#[derive(Debug, Error)]
pub enum Error {
    /// Database error or introspection failure.
    #[error("database error: {0}")]
    Db(String),
    /// The schema violates internal invariants.
    #[error("invalid schema: {0}")]
    InvalidSchema(String),
    /// A configuration value could not be interpreted.
    #[error("invalid option {key}: {message}")]
    InvalidOption { key: String, message: String },
    /// A requested feature is not yet supported.
    #[error("unsupported: {0}")]
    Unsupported(String),
}

impl Error {
    pub(crate) fn option(key: &str, message: impl Into<String>) -> Self {
        Self::InvalidOption {
            key: key.to_string(),
            message: message.into(),
        }
    }
}

/// Convenience alias for results returned by declaro crates.
pub type Result<T> = std::result::Result<T, Error>;
