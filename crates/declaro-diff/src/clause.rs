use std::fmt;

use serde::Serialize;

use declaro_core::{quote_identifier, quote_literal, Column, ForeignKey, Index, Routine};

use crate::render::{column_definition, foreign_key_definition, index_definition};
use crate::safety::{column_change, Safety};

/// Where a column lands in the table after an add or modify.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "place", content = "column", rename_all = "snake_case")]
pub enum ColumnPosition {
    First,
    After(String),
}

impl fmt::Display for ColumnPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::First => f.write_str("FIRST"),
            Self::After(column) => write!(f, "AFTER {}", quote_identifier(column)),
        }
    }
}

/// A single change inside an object diff.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum AlterClause {
    AddColumn {
        column: Column,
        /// `None` appends the column.
        position: Option<ColumnPosition>,
    },
    DropColumn {
        column: Column,
    },
    ModifyColumn {
        from: Column,
        to: Column,
        /// Set when the column moves.
        position: Option<ColumnPosition>,
    },
    AddIndex {
        index: Index,
    },
    DropIndex {
        index: Index,
    },
    AddForeignKey {
        foreign_key: ForeignKey,
    },
    DropForeignKey {
        foreign_key: ForeignKey,
    },
    ChangeEngine {
        from: String,
        to: String,
    },
    ChangeCharset {
        from_charset: String,
        from_collation: String,
        to_charset: String,
        to_collation: String,
    },
    ChangeRowFormat {
        from: Option<String>,
        to: Option<String>,
    },
    ChangeComment {
        from: Option<String>,
        to: Option<String>,
    },
    ChangeCreateOptions {
        from: Vec<String>,
        to: Vec<String>,
    },
    /// Routines cannot be altered in place; they are dropped and recreated.
    ReplaceRoutine {
        from: Box<Routine>,
        to: Box<Routine>,
    },
}

impl AlterClause {
    pub fn safety(&self) -> Safety {
        match self {
            Self::AddColumn { .. }
            | Self::AddIndex { .. }
            | Self::AddForeignKey { .. }
            | Self::DropForeignKey { .. }
            | Self::ChangeComment { .. }
            | Self::ChangeCreateOptions { .. }
            | Self::ReplaceRoutine { .. } => Safety::Safe,
            Self::DropColumn { .. } | Self::DropIndex { .. } => Safety::Destructive,
            Self::ModifyColumn { from, to, .. } => column_change(from, to),
            Self::ChangeEngine { .. } | Self::ChangeCharset { .. } | Self::ChangeRowFormat { .. } => {
                Safety::Unsafe
            }
        }
    }

    pub fn is_foreign_key_drop(&self) -> bool {
        matches!(self, Self::DropForeignKey { .. })
    }

    pub fn is_foreign_key_add(&self) -> bool {
        matches!(self, Self::AddForeignKey { .. })
    }

    /// The clause as it appears inside `ALTER TABLE`. Routine replacement has
    /// no table clause.
    pub fn to_sql(&self) -> Option<String> {
        let sql = match self {
            Self::AddColumn { column, position } => {
                with_position(format!("ADD COLUMN {}", column_definition(column)), position)
            }
            Self::DropColumn { column } => format!("DROP COLUMN {}", quote_identifier(&column.name)),
            Self::ModifyColumn { to, position, .. } => {
                with_position(format!("MODIFY COLUMN {}", column_definition(to)), position)
            }
            Self::AddIndex { index } => format!("ADD {}", index_definition(index)),
            Self::DropIndex { index } if index.primary => "DROP PRIMARY KEY".to_string(),
            Self::DropIndex { index } => format!("DROP KEY {}", quote_identifier(&index.name)),
            Self::AddForeignKey { foreign_key } => {
                format!("ADD {}", foreign_key_definition(foreign_key))
            }
            Self::DropForeignKey { foreign_key } => {
                format!("DROP FOREIGN KEY {}", quote_identifier(&foreign_key.name))
            }
            Self::ChangeEngine { to, .. } => format!("ENGINE={to}"),
            Self::ChangeCharset {
                to_charset,
                to_collation,
                ..
            } => format!("DEFAULT CHARSET={to_charset} COLLATE={to_collation}"),
            Self::ChangeRowFormat { to, .. } => {
                format!("ROW_FORMAT={}", to.as_deref().unwrap_or("DEFAULT").to_ascii_uppercase())
            }
            Self::ChangeComment { to, .. } => {
                format!("COMMENT={}", quote_literal(to.as_deref().unwrap_or("")))
            }
            Self::ChangeCreateOptions { from, to } => create_options_sql(from, to),
            Self::ReplaceRoutine { .. } => return None,
        };
        Some(sql)
    }
}

fn with_position(mut sql: String, position: &Option<ColumnPosition>) -> String {
    if let Some(position) = position {
        sql.push(' ');
        sql.push_str(&position.to_string());
    }
    sql
}

/// Renders `key=value` create options as table options; options that were
/// removed are reset.
fn create_options_sql(from: &[String], to: &[String]) -> String {
    let key_of = |option: &str| option.split('=').next().unwrap_or(option).trim().to_ascii_uppercase();
    let mut parts: Vec<String> = to
        .iter()
        .filter(|option| option.contains('='))
        .map(|option| {
            let (key, value) = option.split_once('=').unwrap_or((option.as_str(), ""));
            format!("{}={}", key.trim().to_ascii_uppercase(), value.trim())
        })
        .collect();
    for option in from.iter().filter(|option| option.contains('=')) {
        let key = key_of(option.as_str());
        if to.iter().any(|kept| key_of(kept.as_str()) == key) {
            continue;
        }
        let reset = if key.starts_with("STATS_") { "DEFAULT" } else { "0" };
        parts.push(format!("{key}={reset}"));
    }
    parts.join(" ")
}

impl fmt::Display for AlterClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AddColumn { column, .. } => write!(f, "+ column {}: {}", column.name, column.type_name),
            Self::DropColumn { column } => write!(f, "- column {}", column.name),
            Self::ModifyColumn { from, to, position } => {
                write!(f, "~ column {}", to.name)?;
                if from.type_name != to.type_name {
                    write!(f, ": {} -> {}", from.type_name, to.type_name)?;
                }
                if from.nullable != to.nullable {
                    let label = |nullable: bool| if nullable { "nullable" } else { "not null" };
                    write!(f, " ({} -> {})", label(from.nullable), label(to.nullable))?;
                }
                if let Some(position) = position {
                    write!(f, " [{position}]")?;
                }
                Ok(())
            }
            Self::AddIndex { index } => write!(f, "+ index {}", index.name),
            Self::DropIndex { index } => write!(f, "- index {}", index.name),
            Self::AddForeignKey { foreign_key } => write!(
                f,
                "+ foreign key {} -> {}",
                foreign_key.name, foreign_key.referenced_table
            ),
            Self::DropForeignKey { foreign_key } => write!(f, "- foreign key {}", foreign_key.name),
            Self::ChangeEngine { from, to } => write!(f, "~ engine: {from} -> {to}"),
            Self::ChangeCharset {
                from_collation,
                to_collation,
                ..
            } => write!(f, "~ collation: {from_collation} -> {to_collation}"),
            Self::ChangeRowFormat { from, to } => write!(
                f,
                "~ row_format: {} -> {}",
                from.as_deref().unwrap_or("default"),
                to.as_deref().unwrap_or("default")
            ),
            Self::ChangeComment { .. } => f.write_str("~ comment"),
            Self::ChangeCreateOptions { from, to } => {
                write!(f, "~ options: [{}] -> [{}]", from.join(" "), to.join(" "))
            }
            Self::ReplaceRoutine { to, .. } => write!(f, "~ body of {}", to.name),
        }
    }
}
