use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use declaro_core::{Endpoint, Schema, WorkspaceOptions};

use crate::error::Result;
use crate::session::SchemaSession;
use crate::workspace::{ExecFailure, Workspace};

/// Workspace backed by a temporary schema on an existing server.
///
/// The schema shares the server's global settings with everything else on
/// that instance; only the schema itself is private to the workspace.
#[derive(Debug)]
pub struct TempSchemaWorkspace {
    session: SchemaSession,
}

impl TempSchemaWorkspace {
    pub async fn create(
        endpoint: Endpoint,
        opts: &WorkspaceOptions,
        cancel: &CancellationToken,
    ) -> Result<Self> {
        let name = temp_schema_name(&opts.schema_prefix);
        let session = SchemaSession::open(&endpoint, &name, opts, cancel).await?;
        tracing::info!(
            event = "workspace_ready",
            backend = "temp-schema",
            schema = %name,
            server = %endpoint,
            "temporary schema ready"
        );
        Ok(Self { session })
    }
}

/// `<prefix>_<12 hex chars>`; short enough for MySQL's 64-character limit.
pub fn temp_schema_name(prefix: &str) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{prefix}_{}", &suffix[..12])
}

#[async_trait]
impl Workspace for TempSchemaWorkspace {
    fn schema_name(&self) -> &str {
        self.session.schema()
    }

    fn statement_timeout(&self) -> Option<std::time::Duration> {
        self.session.statement_timeout()
    }

    async fn run(&self, sql: &str) -> std::result::Result<(), ExecFailure> {
        self.session.execute(sql).await
    }

    async fn introspect(&self) -> Result<Schema> {
        self.session.introspect().await
    }

    async fn destroy(&self) -> Result<()> {
        self.session.drop_schema().await
    }
}
