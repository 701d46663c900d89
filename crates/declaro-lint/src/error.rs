use thiserror::Error;

/// Failure inside a single rule. The engine turns it into an annotation and
/// keeps running the other rules.
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("{0}")]
    Internal(String),
    #[error("invalid setting {key}: {message}")]
    Setting { key: String, message: String },
}
