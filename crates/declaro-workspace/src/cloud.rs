use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use declaro_core::{Endpoint, Flavor, Schema, WorkspaceOptions};

use crate::error::Result;
use crate::session::SchemaSession;
use crate::temp_schema::temp_schema_name;
use crate::workspace::{ExecFailure, Workspace};

/// A managed database instance provisioned for a single workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudInstance {
    pub id: String,
    pub endpoint: Endpoint,
}

/// Provisions and deprovisions managed instances.
///
/// `provision` returns only once the instance accepts connections. When
/// `cancel` fires first it releases whatever it started and returns
/// [`WorkspaceError::Cancelled`](crate::WorkspaceError::Cancelled).
#[async_trait]
pub trait CloudProvisioner: Send + Sync {
    async fn provision(&self, flavor: &Flavor, cancel: &CancellationToken) -> Result<CloudInstance>;

    async fn deprovision(&self, instance: &CloudInstance) -> Result<()>;
}

/// Workspace backed by an ephemeral managed instance.
pub struct CloudWorkspace {
    provisioner: Arc<dyn CloudProvisioner>,
    instance: Mutex<Option<CloudInstance>>,
    session: SchemaSession,
}

impl CloudWorkspace {
    pub async fn create(
        provisioner: Arc<dyn CloudProvisioner>,
        flavor: &Flavor,
        opts: &WorkspaceOptions,
        cancel: &CancellationToken,
    ) -> Result<Self> {
        let instance = provisioner.provision(flavor, cancel).await?;
        let name = temp_schema_name(&opts.schema_prefix);
        let session = match SchemaSession::open(&instance.endpoint, &name, opts, cancel).await {
            Ok(session) => session,
            Err(err) => {
                if let Err(deprovision_err) = provisioner.deprovision(&instance).await {
                    tracing::warn!(
                        event = "instance_deprovision_failed",
                        instance = %instance.id,
                        error = %deprovision_err
                    );
                }
                return Err(err);
            }
        };
        tracing::info!(
            event = "workspace_ready",
            backend = "cloud",
            instance = %instance.id,
            schema = %name,
            "cloud instance ready"
        );
        Ok(Self {
            provisioner,
            instance: Mutex::new(Some(instance)),
            session,
        })
    }
}

#[async_trait]
impl Workspace for CloudWorkspace {
    fn schema_name(&self) -> &str {
        self.session.schema()
    }

    fn statement_timeout(&self) -> Option<Duration> {
        self.session.statement_timeout()
    }

    async fn run(&self, sql: &str) -> std::result::Result<(), ExecFailure> {
        self.session.execute(sql).await
    }

    async fn introspect(&self) -> Result<Schema> {
        self.session.introspect().await
    }

    async fn destroy(&self) -> Result<()> {
        let dropped = self.session.drop_schema().await;
        let instance = self.instance.lock().await.take();
        if let Some(instance) = instance {
            self.provisioner.deprovision(&instance).await?;
            tracing::info!(event = "instance_deprovisioned", instance = %instance.id);
        }
        dropped
    }
}
