use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::flavor::{Flavor, Vendor};

/// Severity assigned to a lint rule.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Ignore,
    #[default]
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ignore => f.write_str("ignore"),
            Self::Warning => f.write_str("warning"),
            Self::Error => f.write_str("error"),
        }
    }
}

impl FromStr for Severity {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "ignore" | "none" | "off" => Ok(Self::Ignore),
            "warning" | "warn" => Ok(Self::Warning),
            "error" => Ok(Self::Error),
            other => Err(Error::option(
                "severity",
                format!("expected ignore, warning or error, got {other}"),
            )),
        }
    }
}

/// Policy flags governing which diff operations may be emitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffFlags {
    /// Emit operations that can discard data.
    pub allow_destructive: bool,
    /// Emit operations whose outcome cannot be proven safe.
    pub allow_unsafe: bool,
    /// `ALGORITHM=` clause appended to every `ALTER TABLE`.
    pub alter_algorithm: Option<String>,
    /// `LOCK=` clause appended to every `ALTER TABLE`.
    pub alter_lock: Option<String>,
}

impl Default for DiffFlags {
    fn default() -> Self {
        Self {
            allow_destructive: false,
            allow_unsafe: true,
            alter_algorithm: None,
            alter_lock: None,
        }
    }
}

/// Workspace backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WorkspaceBackend {
    /// Temporary schema on an existing instance.
    #[default]
    TempSchema,
    /// Schema inside a pooled, containerized instance.
    Docker,
    /// Ephemeral managed instance per workspace.
    Cloud,
}

impl FromStr for WorkspaceBackend {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "temp-schema" | "temp_schema" => Ok(Self::TempSchema),
            "docker" => Ok(Self::Docker),
            "cloud" => Ok(Self::Cloud),
            other => Err(Error::option(
                "workspace",
                format!("expected temp-schema, docker or cloud, got {other}"),
            )),
        }
    }
}

impl fmt::Display for WorkspaceBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TempSchema => f.write_str("temp-schema"),
            Self::Docker => f.write_str("docker"),
            Self::Cloud => f.write_str("cloud"),
        }
    }
}

/// What happens to a pooled container when its last workspace is released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContainerCleanup {
    /// Stop and remove the container.
    #[default]
    Stop,
    /// Leave the container running for later processes.
    None,
}

/// Settings for creating workspaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceOptions {
    pub backend: WorkspaceBackend,
    /// Container image; derived from the flavor when unset.
    pub docker_image: Option<String>,
    /// Prefix of temporary schema names.
    pub schema_prefix: String,
    pub charset: Option<String>,
    pub collation: Option<String>,
    /// Session `sql_mode` for containerized and cloud instances.
    pub sql_mode: Option<String>,
    /// Per-statement timeout while populating a workspace.
    pub statement_timeout: Option<Duration>,
    pub cleanup: ContainerCleanup,
    /// Maximum concurrent workspaces sharing one pooled container.
    pub max_per_container: usize,
}

impl Default for WorkspaceOptions {
    fn default() -> Self {
        Self {
            backend: WorkspaceBackend::TempSchema,
            docker_image: None,
            schema_prefix: "_declaro_tmp".to_string(),
            charset: None,
            collation: None,
            sql_mode: None,
            statement_timeout: None,
            cleanup: ContainerCleanup::Stop,
            max_per_container: 16,
        }
    }
}

impl WorkspaceOptions {
    /// Container image to use for `flavor`, honoring an explicit override.
    pub fn image_for(&self, flavor: &Flavor) -> Option<String> {
        if let Some(image) = &self.docker_image {
            return Some(image.clone());
        }
        let repo = match flavor.vendor {
            Vendor::Mysql => "mysql",
            Vendor::Percona => "percona/percona-server",
            Vendor::Mariadb => "mariadb",
            Vendor::Unknown => return None,
        };
        Some(format!("{repo}:{}.{}", flavor.major, flavor.minor))
    }
}

/// Settings consumed by individual lint rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LintSettings {
    /// Character sets accepted by the `charset` rule.
    pub allowed_charsets: Vec<String>,
    /// Storage engines accepted by the `engine` rule.
    pub allowed_engines: Vec<String>,
}

impl Default for LintSettings {
    fn default() -> Self {
        Self {
            allowed_charsets: vec!["utf8mb4".to_string()],
            allowed_engines: vec!["innodb".to_string()],
        }
    }
}

/// Recognized settings for workspace, diff and lint operations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Options {
    /// Per-rule severity overrides; rules not listed use their default.
    pub rule_severity: BTreeMap<String, Severity>,
    pub lint: LintSettings,
    pub diff: DiffFlags,
    pub workspace: WorkspaceOptions,
    /// Flavor of the server being linted or diffed against.
    pub flavor: Flavor,
}

impl Options {
    /// Severity configured for `rule`, or `default` when not overridden.
    pub fn severity_for(&self, rule: &str, default: Severity) -> Severity {
        self.rule_severity.get(rule).copied().unwrap_or(default)
    }

    /// Forces every listed rule to `severity`.
    pub fn force_severity(&mut self, rules: &[&str], severity: Severity) {
        for rule in rules {
            self.rule_severity.insert((*rule).to_string(), severity);
        }
    }
}
