use std::ops::Deref;

use crate::error::Result;
use crate::workspace::Workspace;

/// Owns a workspace and makes sure it is destroyed.
///
/// Call [`WorkspaceGuard::destroy`] on normal exit paths. If the guard is
/// dropped without that (early return, panic unwinding, a canceled task) the
/// teardown is spawned onto the current Tokio runtime.
pub struct WorkspaceGuard {
    inner: Option<Box<dyn Workspace>>,
}

impl WorkspaceGuard {
    pub fn new(workspace: Box<dyn Workspace>) -> Self {
        Self {
            inner: Some(workspace),
        }
    }

    /// Destroys the workspace and waits for teardown to finish.
    pub async fn destroy(mut self) -> Result<()> {
        match self.inner.take() {
            Some(workspace) => workspace.destroy().await,
            None => Ok(()),
        }
    }
}

impl Deref for WorkspaceGuard {
    type Target = dyn Workspace;

    fn deref(&self) -> &Self::Target {
        match &self.inner {
            Some(workspace) => workspace.as_ref(),
            None => unreachable!("workspace guard used after destroy"),
        }
    }
}

impl Drop for WorkspaceGuard {
    fn drop(&mut self) {
        let Some(workspace) = self.inner.take() else {
            return;
        };
        let schema = workspace.schema_name().to_string();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                tracing::debug!(event = "workspace_teardown_spawned", schema = %schema);
                handle.spawn(async move {
                    if let Err(err) = workspace.destroy().await {
                        tracing::warn!(event = "workspace_teardown_failed", schema = %schema, error = %err);
                    }
                });
            }
            Err(_) => {
                tracing::warn!(
                    event = "workspace_leaked",
                    schema = %schema,
                    "no async runtime available to tear down workspace"
                );
            }
        }
    }
}
