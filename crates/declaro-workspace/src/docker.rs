use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::{Connection, MySqlConnection};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use declaro_core::{Endpoint, Schema, WorkspaceOptions};

use crate::error::{Result, WorkspaceError};
use crate::pool::{ContainerLease, ContainerPool, ContainerRuntime};
use crate::session::{connect_options, SchemaSession};
use crate::temp_schema::temp_schema_name;
use crate::workspace::{until_cancelled, ExecFailure, Workspace};

/// Container runtime driving the `docker` command-line client.
#[derive(Debug, Clone)]
pub struct DockerCli {
    binary: String,
    ready_attempts: u32,
    ready_interval: Duration,
}

impl Default for DockerCli {
    fn default() -> Self {
        Self {
            binary: "docker".to_string(),
            ready_attempts: 120,
            ready_interval: Duration::from_millis(500),
        }
    }
}

impl DockerCli {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    async fn docker(&self, args: &[&str]) -> Result<String> {
        let output = tokio::process::Command::new(&self.binary)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|err| {
                WorkspaceError::Provisioning(format!("running {} {}: {err}", self.binary, args.join(" ")))
            })?;
        if !output.status.success() {
            return Err(WorkspaceError::Provisioning(format!(
                "{} {} failed: {}",
                self.binary,
                args.first().copied().unwrap_or_default(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// `Some(running)` when the container exists.
    async fn state(&self, name: &str) -> Option<bool> {
        self.docker(&["inspect", "--format", "{{.State.Running}}", name])
            .await
            .ok()
            .map(|out| out == "true")
    }

    async fn wait_ready(&self, endpoint: &Endpoint) -> Result<()> {
        let opts = connect_options(endpoint);
        let mut last_error = String::new();
        for attempt in 1..=self.ready_attempts {
            match MySqlConnection::connect_with(&opts).await {
                Ok(mut conn) => {
                    let pinged = conn.ping().await;
                    let _ = conn.close().await;
                    match pinged {
                        Ok(()) => return Ok(()),
                        Err(err) => last_error = err.to_string(),
                    }
                }
                Err(err) => last_error = err.to_string(),
            }
            tracing::trace!(event = "container_wait", attempt, error = %last_error);
            tokio::time::sleep(self.ready_interval).await;
        }
        Err(WorkspaceError::Provisioning(format!(
            "server at {endpoint} not ready after {} attempts: {last_error}",
            self.ready_attempts
        )))
    }
}

#[async_trait]
impl ContainerRuntime for DockerCli {
    async fn start(&self, name: &str, image: &str) -> Result<Endpoint> {
        match self.state(name).await {
            Some(true) => {}
            Some(false) => {
                self.docker(&["start", name]).await?;
            }
            None => {
                self.docker(&[
                    "run",
                    "--detach",
                    "--name",
                    name,
                    "--env",
                    "MYSQL_ALLOW_EMPTY_PASSWORD=1",
                    "--env",
                    "MARIADB_ALLOW_EMPTY_ROOT_PASSWORD=1",
                    "--publish",
                    "127.0.0.1::3306",
                    image,
                ])
                .await?;
            }
        }

        let mapping = self.docker(&["port", name, "3306/tcp"]).await?;
        let port = parse_port_mapping(&mapping).ok_or_else(|| {
            WorkspaceError::Provisioning(format!("unexpected port mapping for {name}: {mapping}"))
        })?;
        let endpoint = Endpoint::new("127.0.0.1", port);

        if let Err(err) = self.wait_ready(&endpoint).await {
            if let Err(stop_err) = self.stop(name).await {
                tracing::warn!(event = "container_stop_failed", container = name, error = %stop_err);
            }
            return Err(err);
        }
        Ok(endpoint)
    }

    async fn stop(&self, name: &str) -> Result<()> {
        self.docker(&["rm", "--force", name]).await.map(|_| ())
    }
}

/// Parses `docker port` output such as `127.0.0.1:49153`.
pub fn parse_port_mapping(output: &str) -> Option<u16> {
    output
        .lines()
        .filter_map(|line| line.trim().rsplit_once(':'))
        .find_map(|(_, port)| port.parse().ok())
}

/// Workspace holding a schema inside a pooled container.
pub struct DockerWorkspace {
    pool: Arc<ContainerPool>,
    lease: Mutex<Option<ContainerLease>>,
    session: SchemaSession,
}

impl DockerWorkspace {
    /// Leases a container for `image` and opens a schema in it.
    ///
    /// When `cancel` fires during startup the pending acquire is dropped,
    /// which stops the readiness polling and gives the lease back.
    pub async fn create(
        pool: Arc<ContainerPool>,
        image: &str,
        opts: &WorkspaceOptions,
        cancel: &CancellationToken,
    ) -> Result<Self> {
        let lease = until_cancelled(cancel, pool.acquire(image)).await?;
        let name = temp_schema_name(&opts.schema_prefix);
        let session = match SchemaSession::open(lease.endpoint(), &name, opts, cancel).await {
            Ok(session) => session,
            Err(err) => {
                if let Err(release_err) = pool.release(lease).await {
                    tracing::warn!(event = "container_release_failed", error = %release_err);
                }
                return Err(err);
            }
        };
        tracing::info!(
            event = "workspace_ready",
            backend = "docker",
            image,
            container = %lease.container(),
            schema = %name,
            "container schema ready"
        );
        Ok(Self {
            pool,
            lease: Mutex::new(Some(lease)),
            session,
        })
    }
}

#[async_trait]
impl Workspace for DockerWorkspace {
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
        let lease = self.lease.lock().await.take();
        if let Some(lease) = lease {
            self.pool.release(lease).await?;
        }
        dropped
    }
}
