use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use declaro_core::{Options, Schema, WorkspaceBackend};

use crate::cloud::{CloudProvisioner, CloudWorkspace};
use crate::docker::DockerWorkspace;
use crate::error::{Result, WorkspaceError};
use crate::pool::ContainerPool;
use crate::provider::ConnectionProvider;
use crate::temp_schema::TempSchemaWorkspace;

/// Failure of a single statement inside a workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecFailure {
    pub code: Option<u16>,
    pub message: String,
    /// The workspace can no longer run statements (connection lost, schema
    /// gone, statement timed out).
    pub fatal: bool,
}

impl ExecFailure {
    pub fn new(code: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            fatal: false,
        }
    }

    pub fn fatal(code: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            fatal: true,
            ..Self::new(code, message)
        }
    }
}

/// Result of one statement in a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatementOutcome {
    Ok,
    Failed(ExecFailure),
    /// Not attempted because of an earlier fatal error or cancellation.
    Skipped,
}

/// Per-statement outcomes of [`Workspace::execute`], in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub outcomes: Vec<StatementOutcome>,
    /// The error that stopped the batch, if any.
    pub fatal: Option<ExecFailure>,
    pub cancelled: bool,
}

impl BatchOutcome {
    pub fn is_complete(&self) -> bool {
        self.fatal.is_none() && !self.cancelled
    }
}

/// Disposable, isolated place to run declarative statements and read back
/// the resulting structure.
#[async_trait]
pub trait Workspace: Send + Sync {
    /// Name of the schema holding the workspace's objects.
    fn schema_name(&self) -> &str;

    /// Limit applied to each statement run by [`Workspace::execute`].
    fn statement_timeout(&self) -> Option<Duration> {
        None
    }

    /// Runs one statement.
    async fn run(&self, sql: &str) -> std::result::Result<(), ExecFailure>;

    /// Runs statements in order, capturing each statement's error. A fatal
    /// error or cancellation marks every remaining statement skipped.
    async fn execute(&self, statements: &[&str], cancel: &CancellationToken) -> BatchOutcome {
        let mut batch = BatchOutcome::default();
        for sql in statements {
            if batch.fatal.is_some() || batch.cancelled {
                batch.outcomes.push(StatementOutcome::Skipped);
                continue;
            }

            let run = async {
                match self.statement_timeout() {
                    Some(limit) => match tokio::time::timeout(limit, self.run(sql)).await {
                        Ok(result) => result,
                        Err(_) => Err(ExecFailure::fatal(
                            None,
                            format!("statement timed out after {}ms", limit.as_millis()),
                        )),
                    },
                    None => self.run(sql).await,
                }
            };
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                result = run => Some(result),
            };

            match result {
                None => {
                    batch.cancelled = true;
                    batch.outcomes.push(StatementOutcome::Skipped);
                }
                Some(Ok(())) => batch.outcomes.push(StatementOutcome::Ok),
                Some(Err(failure)) => {
                    if failure.fatal {
                        batch.fatal = Some(failure.clone());
                    }
                    batch.outcomes.push(StatementOutcome::Failed(failure));
                }
            }
        }
        batch
    }

    /// Reads the workspace's current structure.
    async fn introspect(&self) -> Result<Schema>;

    /// Releases every resource held by the workspace. Safe to call more than
    /// once.
    async fn destroy(&self) -> Result<()>;
}

/// Shared collaborators that workspaces are created from.
#[derive(Clone, Default)]
pub struct Environment {
    pub provider: Option<Arc<dyn ConnectionProvider>>,
    pub containers: Option<Arc<ContainerPool>>,
    pub cloud: Option<Arc<dyn CloudProvisioner>>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_provider(mut self, provider: Arc<dyn ConnectionProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn with_containers(mut self, pool: Arc<ContainerPool>) -> Self {
        self.containers = Some(pool);
        self
    }

    pub fn with_cloud(mut self, provisioner: Arc<dyn CloudProvisioner>) -> Self {
        self.cloud = Some(provisioner);
        self
    }
}

/// Resolves `work` unless `cancel` fires first, in which case `work` is
/// dropped and [`WorkspaceError::Cancelled`] is returned.
pub(crate) async fn until_cancelled<T>(
    cancel: &CancellationToken,
    work: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(WorkspaceError::Cancelled),
        result = work => result,
    }
}

/// Creates a workspace for the configured backend.
///
/// Anything provisioned before `cancel` fires is released again before
/// [`WorkspaceError::Cancelled`] is returned.
pub async fn create(
    options: &Options,
    env: &Environment,
    cancel: &CancellationToken,
) -> Result<Box<dyn Workspace>> {
    if cancel.is_cancelled() {
        return Err(WorkspaceError::Cancelled);
    }
    let ws_opts = &options.workspace;
    tracing::debug!(
        event = "workspace_create",
        backend = %ws_opts.backend,
        flavor = %options.flavor,
        "creating workspace"
    );
    match ws_opts.backend {
        WorkspaceBackend::TempSchema => {
            let provider = env.provider.as_ref().ok_or_else(|| {
                WorkspaceError::Provisioning("no connection provider configured".to_string())
            })?;
            let ws = TempSchemaWorkspace::create(provider.endpoint(), ws_opts, cancel).await?;
            Ok(Box::new(ws))
        }
        WorkspaceBackend::Docker => {
            let pool = env.containers.as_ref().ok_or_else(|| {
                WorkspaceError::Provisioning("no container runtime configured".to_string())
            })?;
            let image = ws_opts.image_for(&options.flavor).ok_or_else(|| {
                WorkspaceError::Provisioning(
                    "docker workspace requires a known flavor or docker-image".to_string(),
                )
            })?;
            let ws = DockerWorkspace::create(Arc::clone(pool), &image, ws_opts, cancel).await?;
            Ok(Box::new(ws))
        }
        WorkspaceBackend::Cloud => {
            let provisioner = env.cloud.as_ref().ok_or_else(|| {
                WorkspaceError::Provisioning("no cloud provisioner configured".to_string())
            })?;
            let ws = CloudWorkspace::create(Arc::clone(provisioner), &options.flavor, ws_opts, cancel)
                .await?;
            Ok(Box::new(ws))
        }
    }
}
