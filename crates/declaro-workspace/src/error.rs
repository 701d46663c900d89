use std::fmt;

use declaro_core::{ObjectKey, StatementRef};
use thiserror::Error;

/// Errors raised while creating, populating or tearing down a workspace.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    /// No instance could be reached or started.
    #[error("workspace provisioning failed: {0}")]
    Provisioning(String),
    /// A pooled backend is at its concurrency limit.
    #[error("container for {image} already hosts {limit} workspaces")]
    ResourceExhausted { image: String, limit: usize },
    /// The operation was canceled; teardown has already run.
    #[error("workspace operation canceled")]
    Cancelled,
    /// Connectivity loss or a failure outside any single statement.
    #[error("workspace database error: {0}")]
    Database(String),
    /// Reading the populated workspace back failed.
    #[error("workspace introspection failed: {0}")]
    Introspection(#[from] declaro_core::Error),
}

/// Convenience alias for workspace results.
pub type Result<T> = std::result::Result<T, WorkspaceError>;

/// Server error raised by one declarative statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementError {
    pub statement: StatementRef,
    pub object: Option<ObjectKey>,
    /// MySQL error number, when the server returned one.
    pub code: Option<u16>,
    pub message: String,
}

impl fmt::Display for StatementError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(object) = &self.object {
            write!(f, "{object}: ")?;
        }
        match self.code {
            Some(code) => write!(f, "Error {code}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for StatementError {}
