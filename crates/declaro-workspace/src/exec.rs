use tokio_util::sync::CancellationToken;

use declaro_core::{LogicalSchema, Options, Schema, StatementKind, StatementRef};

use crate::error::{Result, StatementError, WorkspaceError};
use crate::guard::WorkspaceGuard;
use crate::workspace::{create, Environment, StatementOutcome, Workspace};

/// A logical schema materialized into a workspace and read back.
#[derive(Debug, Clone)]
pub struct WorkspaceSchema {
    /// Structure the server produced, with objects linked to the statements
    /// that declared them.
    pub schema: Schema,
    pub logical: LogicalSchema,
    /// Statements the server rejected, in declaration order.
    pub failures: Vec<StatementError>,
}

impl WorkspaceSchema {
    pub fn failure_for(&self, stmt: StatementRef) -> Option<&StatementError> {
        self.failures.iter().find(|failure| failure.statement == stmt)
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Materializes `logical` in a fresh workspace and introspects the result.
///
/// The workspace is torn down before this returns, whatever the outcome.
/// Teardown errors are logged and never replace the primary result.
pub async fn exec_logical_schema(
    logical: &LogicalSchema,
    options: &Options,
    env: &Environment,
    cancel: &CancellationToken,
) -> Result<WorkspaceSchema> {
    if cancel.is_cancelled() {
        return Err(WorkspaceError::Cancelled);
    }

    let mut options = options.clone();
    if logical.charset.is_some() {
        options.workspace.charset = logical.charset.clone();
    }
    if logical.collation.is_some() {
        options.workspace.collation = logical.collation.clone();
    }

    let workspace = create(&options, env, cancel).await?;
    exec_with_workspace(workspace, logical, cancel).await
}

/// Populates an already created workspace with `logical`, introspects it and
/// destroys it.
pub async fn exec_with_workspace(
    workspace: Box<dyn Workspace>,
    logical: &LogicalSchema,
    cancel: &CancellationToken,
) -> Result<WorkspaceSchema> {
    let guard = WorkspaceGuard::new(workspace);
    let result = populate(&*guard, logical, cancel).await;
    let schema_name = guard.schema_name().to_string();
    if let Err(err) = guard.destroy().await {
        tracing::warn!(
            event = "workspace_teardown_failed",
            schema = %schema_name,
            error = %err,
            "workspace teardown failed"
        );
    }
    result
}

async fn populate(
    workspace: &dyn Workspace,
    logical: &LogicalSchema,
    cancel: &CancellationToken,
) -> Result<WorkspaceSchema> {
    let runnable: Vec<(StatementRef, &str)> = logical
        .statements
        .iter()
        .enumerate()
        .filter(|(_, stmt)| stmt.kind != StatementKind::Other)
        .map(|(idx, stmt)| (StatementRef(idx), stmt.text.as_str()))
        .collect();
    let texts: Vec<&str> = runnable.iter().map(|(_, text)| *text).collect();

    tracing::debug!(
        event = "workspace_populate",
        schema = %logical.name,
        workspace = %workspace.schema_name(),
        statements = texts.len(),
        skipped_other = logical.statements.len() - texts.len(),
        "executing statements"
    );
    let batch = workspace.execute(&texts, cancel).await;
    if batch.cancelled {
        return Err(WorkspaceError::Cancelled);
    }
    if let Some(fatal) = &batch.fatal {
        return Err(WorkspaceError::Database(fatal.message.clone()));
    }

    let failures: Vec<StatementError> = runnable
        .iter()
        .zip(batch.outcomes.iter())
        .filter_map(|((stmt_ref, _), outcome)| match outcome {
            StatementOutcome::Failed(failure) => Some(StatementError {
                statement: *stmt_ref,
                object: logical
                    .statement(*stmt_ref)
                    .and_then(|stmt| stmt.object.clone()),
                code: failure.code,
                message: failure.message.clone(),
            }),
            _ => None,
        })
        .collect();
    for failure in &failures {
        tracing::debug!(event = "statement_failed", error = %failure);
    }

    let mut schema = tokio::select! {
        _ = cancel.cancelled() => return Err(WorkspaceError::Cancelled),
        schema = workspace.introspect() => schema?,
    };
    schema.name = logical.name.clone();
    schema.link_origins(&logical.origins());

    tracing::info!(
        event = "workspace_materialized",
        schema = %logical.name,
        objects = schema.object_count(),
        failures = failures.len(),
        "logical schema materialized"
    );

    Ok(WorkspaceSchema {
        schema,
        logical: logical.clone(),
        failures,
    })
}
