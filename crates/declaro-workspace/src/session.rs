use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use sqlx::Executor;
use sqlx::mysql::{MySqlConnectOptions, MySqlDatabaseError, MySqlPool, MySqlPoolOptions};
use tokio_util::sync::CancellationToken;

use declaro_core::{quote_identifier, quote_literal, Endpoint, Flavor, Schema, WorkspaceOptions};
use declaro_introspect::{detect_flavor, introspect_mysql_with_options, IntrospectOptions};

use crate::error::{Result, WorkspaceError};
use crate::workspace::{until_cancelled, ExecFailure};

/// Server error numbers after which a session cannot continue.
const ER_BAD_DB: u16 = 1049;
const CR_SERVER_GONE: u16 = 2006;
const CR_SERVER_LOST: u16 = 2013;

/// One temporary schema on a server, with the connections used to populate
/// and read it.
///
/// Every backend composes a session; only the way the server is obtained
/// differs between them.
#[derive(Debug)]
pub struct SchemaSession {
    /// Connection without a default database, for create and drop.
    admin: MySqlPool,
    /// Single connection bound to the schema, for statements and reads.
    pool: MySqlPool,
    schema: String,
    flavor: Flavor,
    statement_timeout: Option<Duration>,
    dropped: AtomicBool,
}

impl SchemaSession {
    /// Connects to `endpoint` and creates `schema` with the configured
    /// character set and collation.
    ///
    /// If `cancel` fires after the schema exists, the schema is dropped again
    /// before [`WorkspaceError::Cancelled`] is returned.
    pub async fn open(
        endpoint: &Endpoint,
        schema: &str,
        opts: &WorkspaceOptions,
        cancel: &CancellationToken,
    ) -> Result<Self> {
        let base = connect_options(endpoint);
        let admin = until_cancelled(cancel, async {
            MySqlPoolOptions::new()
                .max_connections(1)
                .acquire_timeout(Duration::from_secs(10))
                .connect_with(base.clone())
                .await
                .map_err(|err| WorkspaceError::Provisioning(format!("connecting to {endpoint}: {err}")))
        })
        .await?;

        let flavor = until_cancelled(cancel, async {
            detect_flavor(&admin)
                .await
                .map_err(|err| WorkspaceError::Provisioning(err.to_string()))
        })
        .await;
        let flavor = match flavor {
            Ok(flavor) => flavor,
            Err(err) => {
                admin.close().await;
                return Err(err);
            }
        };

        let mut create = format!("CREATE DATABASE {}", quote_identifier(schema));
        if let Some(charset) = &opts.charset {
            create.push_str(&format!(" CHARACTER SET {charset}"));
        }
        if let Some(collation) = &opts.collation {
            create.push_str(&format!(" COLLATE {collation}"));
        }
        // Not raced: once sent, the outcome decides whether a drop is owed.
        if let Err(err) = sqlx::raw_sql(&create).execute(&admin).await {
            admin.close().await;
            return Err(WorkspaceError::Database(format!("creating schema {schema}: {err}")));
        }

        let sql_mode = opts.sql_mode.clone();
        let pool = until_cancelled(cancel, async move {
            MySqlPoolOptions::new()
                .max_connections(1)
                .acquire_timeout(Duration::from_secs(10))
                .after_connect(move |conn, _meta| {
                    let sql_mode = sql_mode.clone();
                    Box::pin(async move {
                        conn.execute(sqlx::raw_sql("SET SESSION foreign_key_checks = 0"))
                            .await?;
                        if let Some(mode) = sql_mode {
                            let set = format!("SET SESSION sql_mode = {}", quote_literal(&mode));
                            conn.execute(sqlx::raw_sql(&set)).await?;
                        }
                        Ok(())
                    })
                })
                .connect_with(base.database(schema))
                .await
                .map_err(|err| WorkspaceError::Provisioning(format!("opening session on {schema}: {err}")))
        })
        .await;

        let pool = match pool {
            Ok(pool) => pool,
            Err(err) => {
                let drop = format!("DROP DATABASE IF EXISTS {}", quote_identifier(schema));
                if let Err(drop_err) = sqlx::raw_sql(&drop).execute(&admin).await {
                    tracing::warn!(event = "workspace_drop_failed", schema, error = %drop_err);
                }
                admin.close().await;
                return Err(err);
            }
        };

        tracing::debug!(event = "schema_created", schema, flavor = %flavor, "workspace schema created");
        Ok(Self {
            admin,
            pool,
            schema: schema.to_string(),
            flavor,
            statement_timeout: opts.statement_timeout,
            dropped: AtomicBool::new(false),
        })
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn flavor(&self) -> Flavor {
        self.flavor
    }

    pub fn statement_timeout(&self) -> Option<Duration> {
        self.statement_timeout
    }

    pub async fn execute(&self, sql: &str) -> std::result::Result<(), ExecFailure> {
        sqlx::raw_sql(sql)
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(|err| classify(&err))
    }

    pub async fn introspect(&self) -> Result<Schema> {
        let opts = IntrospectOptions {
            flavor: Some(self.flavor),
            ..IntrospectOptions::default()
        };
        let schema = introspect_mysql_with_options(&self.pool, &self.schema, opts).await?;
        Ok(schema)
    }

    /// Drops the schema and closes both pools. Later calls do nothing.
    pub async fn drop_schema(&self) -> Result<()> {
        if self.dropped.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.pool.close().await;
        let drop = format!("DROP DATABASE IF EXISTS {}", quote_identifier(&self.schema));
        let result = sqlx::raw_sql(&drop)
            .execute(&self.admin)
            .await
            .map(|_| ())
            .map_err(|err| WorkspaceError::Database(format!("dropping schema {}: {err}", self.schema)));
        self.admin.close().await;
        if result.is_ok() {
            tracing::debug!(event = "schema_dropped", schema = %self.schema, "workspace schema dropped");
        }
        result
    }
}

/// Builds connect options for `endpoint` without a default database.
pub fn connect_options(endpoint: &Endpoint) -> MySqlConnectOptions {
    let mut opts = MySqlConnectOptions::new()
        .host(&endpoint.host)
        .port(endpoint.port)
        .username(&endpoint.user)
        .charset("utf8mb4");
    if let Some(password) = &endpoint.password {
        opts = opts.password(password);
    }
    if let Some(socket) = &endpoint.socket {
        opts = opts.socket(socket);
    }
    opts
}

/// Maps a driver error to a statement failure, flagging errors after which
/// the session is unusable.
pub fn classify(err: &sqlx::Error) -> ExecFailure {
    match err {
        sqlx::Error::Database(db) => {
            let code = db
                .try_downcast_ref::<MySqlDatabaseError>()
                .map(|mysql| mysql.number());
            let message = db.message().to_string();
            if is_fatal_code(code) {
                ExecFailure::fatal(code, message)
            } else {
                ExecFailure::new(code, message)
            }
        }
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::Protocol(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => ExecFailure::fatal(None, err.to_string()),
        other => ExecFailure::new(None, other.to_string()),
    }
}

pub fn is_fatal_code(code: Option<u16>) -> bool {
    matches!(code, Some(ER_BAD_DB | CR_SERVER_GONE | CR_SERVER_LOST))
}
