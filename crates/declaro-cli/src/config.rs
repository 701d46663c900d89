//! Resolves settings for one schema directory.
//!
//! Values come from the directory's flat `declaro.toml`, overridden by
//! command-line flags. The option file is only ever read.

use std::collections::BTreeMap;
use std::path::Path;

use declaro_core::{ConfigSource, Endpoint, MapConfig};

use crate::CliError;

pub const OPTION_FILE: &str = "declaro.toml";

/// Reads `declaro.toml` from `dir`; a missing file yields no values.
pub fn read_option_file(dir: &Path) -> Result<BTreeMap<String, String>, CliError> {
    let path = dir.join(OPTION_FILE);
    if !path.is_file() {
        return Ok(BTreeMap::new());
    }
    let text = std::fs::read_to_string(&path).map_err(|err| CliError::Io(path.clone(), err))?;
    let raw: BTreeMap<String, toml::Value> =
        toml::from_str(&text).map_err(|err| CliError::OptionFile(path.clone(), err.to_string()))?;

    let mut values = BTreeMap::new();
    for (key, value) in raw {
        let value = match value {
            toml::Value::String(text) => text,
            toml::Value::Integer(number) => number.to_string(),
            toml::Value::Float(number) => number.to_string(),
            toml::Value::Boolean(flag) => flag.to_string(),
            toml::Value::Array(items) => items
                .iter()
                .map(|item| match item {
                    toml::Value::String(text) => text.clone(),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join(","),
            toml::Value::Datetime(_) | toml::Value::Table(_) => {
                return Err(CliError::OptionFile(
                    path.clone(),
                    format!("{key} must be a string, number, boolean or list"),
                ));
            }
        };
        values.insert(key, value);
    }
    Ok(values)
}

/// Option file values for `dir` with `cli` pairs layered on top.
pub fn resolve(dir: &Path, cli: &[(String, String)]) -> Result<MapConfig, CliError> {
    let mut config = MapConfig::new();
    for (key, value) in read_option_file(dir)? {
        config.set(key, value);
    }
    for (key, value) in cli {
        config.set_cli(key.clone(), value.clone());
    }
    Ok(config)
}

/// Parses a `key=value` command-line override.
pub fn parse_pair(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw.split_once('=').unwrap_or((raw, ""));
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("expected key=value, got {raw:?}"));
    }
    Ok((key.to_string(), value.trim().to_string()))
}

/// Endpoint of the server named by the `dsn` setting or `DECLARO_DSN`.
pub fn endpoint(config: &dyn ConfigSource) -> Result<Option<Endpoint>, CliError> {
    let dsn = config
        .get("dsn")
        .filter(|dsn| !dsn.trim().is_empty())
        .or_else(|| std::env::var("DECLARO_DSN").ok());
    dsn.map(|dsn| Endpoint::from_dsn(dsn.trim()).map_err(CliError::from))
        .transpose()
}

/// Name of the live schema a directory describes: the `schema` setting, the
/// DSN's database, or the directory name.
pub fn schema_name(dir: &Path, config: &dyn ConfigSource, endpoint: Option<&Endpoint>) -> String {
    config
        .get("schema")
        .filter(|name| !name.trim().is_empty())
        .or_else(|| endpoint.and_then(|endpoint| endpoint.database.clone()))
        .or_else(|| {
            dir.canonicalize()
                .ok()
                .and_then(|path| path.file_name().map(|name| name.to_string_lossy().into_owned()))
        })
        .unwrap_or_else(|| "declaro".to_string())
}
