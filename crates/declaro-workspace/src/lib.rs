//! Disposable workspaces for materializing declarative schemas.
//!
//! A workspace is an isolated schema on some MySQL-compatible server: a
//! temporary schema on an existing instance, a schema inside a pooled
//! container, or an ephemeral cloud instance. [`exec_logical_schema`] runs a
//! logical schema's statements in one and reads back the resulting structure.

pub mod cloud;
pub mod docker;
pub mod error;
pub mod exec;
pub mod guard;
pub mod pool;
pub mod provider;
pub mod session;
pub mod temp_schema;
pub mod workspace;

pub use cloud::{CloudInstance, CloudProvisioner, CloudWorkspace};
pub use docker::{DockerCli, DockerWorkspace};
pub use error::{Result, StatementError, WorkspaceError};
pub use exec::{exec_logical_schema, exec_with_workspace, WorkspaceSchema};
pub use guard::WorkspaceGuard;
pub use pool::{ContainerLease, ContainerPool, ContainerRuntime};
pub use provider::{ConnectionProvider, StaticProvider};
pub use session::SchemaSession;
pub use temp_schema::TempSchemaWorkspace;
pub use workspace::{create, BatchOutcome, Environment, ExecFailure, StatementOutcome, Workspace};
