use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::flavor::Flavor;
use crate::options::{ContainerCleanup, Options, Severity, WorkspaceBackend};

/// Prefix of keys that set a lint rule's severity, e.g. `lint-has-pk`.
pub const LINT_PREFIX: &str = "lint-";

/// Read-only key/value view of resolved configuration.
///
/// Implementations merge command-line flags, option files and defaults; the
/// core only reads from them.
pub trait ConfigSource {
    /// Resolved value for `key`, if any layer set it.
    fn get(&self, key: &str) -> Option<String>;

    /// True if `key` was given explicitly on the command line.
    fn on_cli(&self, key: &str) -> bool;

    /// All keys that have a value.
    fn keys(&self) -> Vec<String>;
}

/// In-memory configuration source.
#[derive(Debug, Clone, Default)]
pub struct MapConfig {
    values: BTreeMap<String, String>,
    cli: BTreeSet<String>,
}

impl MapConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a value coming from an option file or other non-CLI layer.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Sets a value given on the command line, overriding any file value.
    pub fn set_cli(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        let key = key.into();
        self.cli.insert(key.clone());
        self.values.insert(key, value.into());
        self
    }
}

impl ConfigSource for MapConfig {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn on_cli(&self, key: &str) -> bool {
        self.cli.contains(key)
    }

    fn keys(&self) -> Vec<String> {
        self.values.keys().cloned().collect()
    }
}

impl Options {
    /// Builds options from a configuration source.
    pub fn from_config(cfg: &dyn ConfigSource) -> Result<Self> {
        let mut opts = Options::default();

        if let Some(flavor) = non_empty(cfg, "flavor") {
            opts.flavor = flavor.parse::<Flavor>()?;
        }

        if let Some(backend) = non_empty(cfg, "workspace") {
            opts.workspace.backend = backend.parse::<WorkspaceBackend>()?;
        }
        opts.workspace.docker_image = non_empty(cfg, "docker-image");
        if let Some(prefix) = non_empty(cfg, "temp-schema") {
            if prefix.contains('`') || prefix.len() > 40 {
                return Err(Error::option("temp-schema", "must be a plain identifier of at most 40 characters"));
            }
            opts.workspace.schema_prefix = prefix;
        }
        opts.workspace.charset = non_empty(cfg, "default-character-set");
        opts.workspace.collation = non_empty(cfg, "default-collation");
        opts.workspace.sql_mode = cfg.get("workspace-sql-mode");
        if let Some(timeout) = non_empty(cfg, "statement-timeout") {
            opts.workspace.statement_timeout = Some(parse_duration("statement-timeout", &timeout)?);
        }
        if let Some(cleanup) = non_empty(cfg, "docker-cleanup") {
            opts.workspace.cleanup = match cleanup.to_ascii_lowercase().as_str() {
                "stop" | "destroy" => ContainerCleanup::Stop,
                "none" => ContainerCleanup::None,
                other => {
                    return Err(Error::option(
                        "docker-cleanup",
                        format!("expected stop or none, got {other}"),
                    ));
                }
            };
        }

        // Destructive changes must be requested explicitly for each run; an
        // option file cannot enable them.
        if let Some(value) = cfg.get("allow-destructive") {
            let requested = parse_bool("allow-destructive", &value)?;
            if requested && !cfg.on_cli("allow-destructive") {
                tracing::warn!(
                    event = "option_ignored",
                    key = "allow-destructive",
                    "allow-destructive is only honored on the command line"
                );
            }
            opts.diff.allow_destructive = requested && cfg.on_cli("allow-destructive");
        }
        if let Some(value) = cfg.get("allow-unsafe") {
            opts.diff.allow_unsafe = parse_bool("allow-unsafe", &value)?;
        }
        opts.diff.alter_algorithm = non_empty(cfg, "alter-algorithm").map(|v| v.to_ascii_uppercase());
        opts.diff.alter_lock = non_empty(cfg, "alter-lock").map(|v| v.to_ascii_uppercase());

        if let Some(list) = cfg.get("allow-charset") {
            opts.lint.allowed_charsets = split_list(&list);
        }
        if let Some(list) = cfg.get("allow-engine") {
            opts.lint.allowed_engines = split_list(&list);
        }

        for key in cfg.keys() {
            let Some(rule) = key.strip_prefix(LINT_PREFIX) else {
                continue;
            };
            if let Some(value) = cfg.get(&key) {
                let severity = value
                    .parse::<Severity>()
                    .map_err(|_| Error::option(&key, format!("invalid severity {value}")))?;
                opts.rule_severity.insert(rule.to_string(), severity);
            }
        }

        Ok(opts)
    }
}

fn non_empty(cfg: &dyn ConfigSource, key: &str) -> Option<String> {
    cfg.get(key)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "" | "1" | "true" | "on" | "yes" => Ok(true),
        "0" | "false" | "off" | "no" => Ok(false),
        other => Err(Error::option(key, format!("expected a boolean, got {other}"))),
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|item| item.trim().to_ascii_lowercase())
        .filter(|item| !item.is_empty())
        .collect()
}

/// Parses `30`, `30s`, `1500ms` or `2m`.
fn parse_duration(key: &str, value: &str) -> Result<Duration> {
    let value = value.trim().to_ascii_lowercase();
    let (digits, unit) = match value.find(|ch: char| !ch.is_ascii_digit()) {
        Some(idx) => value.split_at(idx),
        None => (value.as_str(), "s"),
    };
    let amount: u64 = digits
        .parse()
        .map_err(|_| Error::option(key, format!("invalid duration {value}")))?;
    match unit {
        "ms" => Ok(Duration::from_millis(amount)),
        "s" => Ok(Duration::from_secs(amount)),
        "m" => Ok(Duration::from_secs(amount * 60)),
        other => Err(Error::option(key, format!("unknown duration unit {other}"))),
    }
}
