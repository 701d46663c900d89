use tokio_util::sync::CancellationToken;

use declaro_core::{LogicalSchema, Options, Schema};
use declaro_workspace::{
    exec_logical_schema, exec_with_workspace, Environment, Workspace, WorkspaceSchema,
};

use crate::compare::diff;
use crate::diff::Diff;
use crate::error::{DiffError, Result};

/// Materializes `logical` in a workspace and diffs the result against
/// `actual`. Any statement failure makes the diff infeasible.
pub async fn diff_logical_schema(
    logical: &LogicalSchema,
    actual: &Schema,
    options: &Options,
    env: &Environment,
    cancel: &CancellationToken,
) -> Result<Diff> {
    let materialized = exec_logical_schema(logical, options, env, cancel).await?;
    diff_materialized(materialized, actual, options)
}

/// Same as [`diff_logical_schema`], with an already created workspace.
pub async fn diff_with_workspace(
    workspace: Box<dyn Workspace>,
    logical: &LogicalSchema,
    actual: &Schema,
    options: &Options,
    cancel: &CancellationToken,
) -> Result<Diff> {
    let materialized = exec_with_workspace(workspace, logical, cancel).await?;
    diff_materialized(materialized, actual, options)
}

fn diff_materialized(materialized: WorkspaceSchema, actual: &Schema, options: &Options) -> Result<Diff> {
    if !materialized.is_clean() {
        tracing::warn!(
            event = "diff_infeasible",
            schema = %materialized.logical.name,
            failures = materialized.failures.len(),
            "desired schema has failing statements"
        );
        return Err(DiffError::Infeasible {
            schema: materialized.logical.name,
            failures: materialized.failures,
        });
    }
    Ok(diff(&materialized.schema, actual, options))
}
