use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Server vendor family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Vendor {
    Mysql,
    Percona,
    Mariadb,
    Unknown,
}

impl fmt::Display for Vendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Mysql => "mysql",
            Self::Percona => "percona",
            Self::Mariadb => "mariadb",
            Self::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Vendor and version of a MySQL-compatible server.
///
/// Normalization rules that vary by server (integer display widths, default
/// collations, how column defaults are reported) are expressed as predicates
/// on this type so callers never compare version numbers directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct Flavor {
    pub vendor: Vendor,
    pub major: u16,
    pub minor: u16,
    pub patch: u16,
}

impl Flavor {
    pub const UNKNOWN: Flavor = Flavor {
        vendor: Vendor::Unknown,
        major: 0,
        minor: 0,
        patch: 0,
    };

    pub fn new(vendor: Vendor, major: u16, minor: u16, patch: u16) -> Self {
        Self {
            vendor,
            major,
            minor,
            patch,
        }
    }

    /// Build a flavor from the values of `@@version` and `@@version_comment`.
    pub fn from_server_version(version: &str, comment: &str) -> Self {
        let lower_version = version.to_ascii_lowercase();
        let lower_comment = comment.to_ascii_lowercase();
        let vendor = if lower_version.contains("mariadb") || lower_comment.contains("mariadb") {
            Vendor::Mariadb
        } else if lower_comment.contains("percona") {
            Vendor::Percona
        } else if lower_comment.contains("mysql") || !lower_version.is_empty() {
            Vendor::Mysql
        } else {
            Vendor::Unknown
        };

        // MariaDB 10.x servers behind a replication-compatible prefix report
        // "5.5.5-10.x.y-MariaDB"; the real version follows the prefix.
        let numeric = lower_version
            .strip_prefix("5.5.5-")
            .unwrap_or(&lower_version);
        let (major, minor, patch) = parse_triplet(numeric);
        Self::new(vendor, major, minor, patch)
    }

    pub fn is_known(&self) -> bool {
        self.vendor != Vendor::Unknown
    }

    pub fn is_mariadb(&self) -> bool {
        self.vendor == Vendor::Mariadb
    }

    /// True for the MySQL family (including Percona Server).
    pub fn is_mysql(&self) -> bool {
        matches!(self.vendor, Vendor::Mysql | Vendor::Percona)
    }

    /// Returns true if this flavor's version is at least the supplied one.
    pub fn at_least(&self, major: u16, minor: u16, patch: u16) -> bool {
        (self.major, self.minor, self.patch) >= (major, minor, patch)
    }

    /// MySQL 8.0.19+ omits integer display widths from `SHOW CREATE TABLE` and
    /// `information_schema.columns.column_type`, except for `tinyint(1)`.
    pub fn omits_int_display_width(&self) -> bool {
        self.is_mysql() && self.at_least(8, 0, 19)
    }

    /// MariaDB 10.2.7+ reports literal column defaults quoted and expression
    /// defaults unquoted in `information_schema.columns.column_default`.
    pub fn quotes_column_defaults(&self) -> bool {
        self.is_mariadb() && self.at_least(10, 2, 7)
    }

    /// MySQL 8.0+ supports expression defaults and flags them with
    /// `DEFAULT_GENERATED` in `information_schema.columns.extra`.
    pub fn flags_default_expressions(&self) -> bool {
        self.is_mysql() && self.at_least(8, 0, 13)
    }

    /// MySQL 8.0 and MariaDB 10.8 support descending index parts.
    pub fn supports_descending_index(&self) -> bool {
        (self.is_mysql() && self.at_least(8, 0, 0)) || (self.is_mariadb() && self.at_least(10, 8, 0))
    }

    /// Default collation the server assigns to `utf8mb4` when none is given.
    pub fn default_utf8mb4_collation(&self) -> &'static str {
        if self.is_mysql() && self.at_least(8, 0, 0) {
            "utf8mb4_0900_ai_ci"
        } else {
            "utf8mb4_general_ci"
        }
    }
}

impl Default for Flavor {
    fn default() -> Self {
        Self::UNKNOWN
    }
}

impl fmt::Display for Flavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.is_known() {
            return f.write_str("unknown");
        }
        write!(f, "{}:{}.{}", self.vendor, self.major, self.minor)?;
        if self.patch > 0 {
            write!(f, ".{}", self.patch)?;
        }
        Ok(())
    }
}

/// Parses strings of the form `mysql:8.0`, `mariadb:10.11.6`, `percona:5.7`.
impl FromStr for Flavor {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        let trimmed = value.trim().to_ascii_lowercase();
        if trimmed.is_empty() || trimmed == "unknown" {
            return Ok(Self::UNKNOWN);
        }
        let (vendor, version) = trimmed
            .split_once(':')
            .ok_or_else(|| Error::option("flavor", format!("expected vendor:version, got {value}")))?;
        let vendor = match vendor {
            "mysql" => Vendor::Mysql,
            "percona" => Vendor::Percona,
            "mariadb" => Vendor::Mariadb,
            other => {
                return Err(Error::option(
                    "flavor",
                    format!("unknown vendor {other}"),
                ));
            }
        };
        if !version.starts_with(|ch: char| ch.is_ascii_digit()) {
            return Err(Error::option(
                "flavor",
                format!("version must be numeric, got {version}"),
            ));
        }
        let (major, minor, patch) = parse_triplet(version);
        Ok(Self::new(vendor, major, minor, patch))
    }
}

fn parse_triplet(text: &str) -> (u16, u16, u16) {
    let mut parts = text
        .split(|ch: char| !ch.is_ascii_digit())
        .take_while(|part| !part.is_empty())
        .map(|part| part.parse::<u16>().unwrap_or(0));
    let major = parts.next().unwrap_or(0);
    let minor = parts.next().unwrap_or(0);
    let patch = parts.next().unwrap_or(0);
    (major, minor, patch)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_vendor_from_server_variables() {
        let mysql = Flavor::from_server_version("8.0.32", "MySQL Community Server - GPL");
        assert_eq!(mysql, Flavor::new(Vendor::Mysql, 8, 0, 32));

        let percona = Flavor::from_server_version("5.7.44-48", "Percona Server (GPL)");
        assert_eq!(percona.vendor, Vendor::Percona);
        assert_eq!((percona.major, percona.minor, percona.patch), (5, 7, 44));

        let maria = Flavor::from_server_version("5.5.5-10.11.6-MariaDB-1:10.11.6", "mariadb.org");
        assert_eq!(maria, Flavor::new(Vendor::Mariadb, 10, 11, 6));
    }

    #[test]
    fn display_width_omission_is_mysql_8019_and_later() {
        assert!(!Flavor::new(Vendor::Mysql, 8, 0, 18).omits_int_display_width());
        assert!(Flavor::new(Vendor::Mysql, 8, 0, 19).omits_int_display_width());
        assert!(Flavor::new(Vendor::Percona, 8, 4, 0).omits_int_display_width());
        assert!(!Flavor::new(Vendor::Mariadb, 11, 4, 0).omits_int_display_width());
        assert!(!Flavor::UNKNOWN.omits_int_display_width());
    }

    #[test]
    fn parses_and_displays_flavor_strings() {
        let flavor: Flavor = "mariadb:10.6".parse().unwrap();
        assert_eq!(flavor, Flavor::new(Vendor::Mariadb, 10, 6, 0));
        assert_eq!(flavor.to_string(), "mariadb:10.6");
        assert_eq!("".parse::<Flavor>().unwrap(), Flavor::UNKNOWN);
        assert!("oracle:19".parse::<Flavor>().is_err());
        assert!("mysql".parse::<Flavor>().is_err());
    }
}
