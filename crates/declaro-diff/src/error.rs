use declaro_workspace::{StatementError, WorkspaceError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DiffError {
    /// The desired side did not materialize cleanly, so no complete desired
    /// state exists to diff against.
    #[error("schema `{schema}` cannot be materialized: {}", list_failures(.failures))]
    Infeasible {
        schema: String,
        failures: Vec<StatementError>,
    },
    #[error(transparent)]
    Workspace(#[from] WorkspaceError),
}

pub type Result<T> = std::result::Result<T, DiffError>;

fn list_failures(failures: &[StatementError]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
