use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// One column (or column prefix) of an index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct IndexPart {
    /// Column name; `None` for functional index parts.
    pub column: Option<String>,
    /// Functional expression, when the part is not a plain column.
    pub expression: Option<String>,
    /// Prefix length for string columns, e.g. `name(10)`.
    pub sub_part: Option<u32>,
    pub descending: bool,
}

impl IndexPart {
    pub fn column(name: impl Into<String>) -> Self {
        Self {
            column: Some(name.into()),
            expression: None,
            sub_part: None,
            descending: false,
        }
    }
}

/// Index definition, including the primary key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Index {
    /// `PRIMARY` for the primary key.
    pub name: String,
    pub parts: Vec<IndexPart>,
    pub primary: bool,
    pub unique: bool,
    /// `BTREE`, `HASH`, `FULLTEXT` or `SPATIAL`.
    pub index_type: String,
    pub comment: Option<String>,
    pub invisible: bool,
}

impl Index {
    pub fn new(name: impl Into<String>, columns: &[&str]) -> Self {
        Self {
            name: name.into(),
            parts: columns.iter().map(|col| IndexPart::column(*col)).collect(),
            primary: false,
            unique: false,
            index_type: "BTREE".to_string(),
            comment: None,
            invisible: false,
        }
    }

    pub fn primary_key(columns: &[&str]) -> Self {
        Self {
            primary: true,
            unique: true,
            ..Self::new("PRIMARY", columns)
        }
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Column names covered by this index, skipping functional parts.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().filter_map(|part| part.column.as_deref())
    }

    /// True if every part of `self` is a leading prefix of `other`'s parts,
    /// making `self` redundant for lookups.
    pub fn is_prefix_of(&self, other: &Index) -> bool {
        if self.index_type != other.index_type || self.parts.len() > other.parts.len() {
            return false;
        }
        self.parts
            .iter()
            .zip(other.parts.iter())
            .all(|(mine, theirs)| {
                mine.column == theirs.column
                    && mine.expression == theirs.expression
                    && mine.descending == theirs.descending
                    && match (mine.sub_part, theirs.sub_part) {
                        (_, None) => true,
                        (Some(a), Some(b)) => a <= b,
                        (None, Some(_)) => false,
                    }
            })
    }
}

/// Referential action for `ON DELETE` / `ON UPDATE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FkAction {
    NoAction,
    Restrict,
    Cascade,
    SetNull,
    SetDefault,
}

impl FkAction {
    pub fn from_rule(rule: &str) -> Self {
        match rule.trim().to_ascii_uppercase().as_str() {
            "RESTRICT" => Self::Restrict,
            "CASCADE" => Self::Cascade,
            "SET NULL" => Self::SetNull,
            "SET DEFAULT" => Self::SetDefault,
            _ => Self::NoAction,
        }
    }
}

impl fmt::Display for FkAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sql = match self {
            Self::NoAction => "NO ACTION",
            Self::Restrict => "RESTRICT",
            Self::Cascade => "CASCADE",
            Self::SetNull => "SET NULL",
            Self::SetDefault => "SET DEFAULT",
        };
        f.write_str(sql)
    }
}

/// Foreign key definition preserving column ordering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ForeignKey {
    pub name: String,
    pub columns: Vec<String>,
    /// Set only when the referenced table lives in a different schema.
    pub referenced_schema: Option<String>,
    pub referenced_table: String,
    pub referenced_columns: Vec<String>,
    pub on_update: FkAction,
    pub on_delete: FkAction,
}

impl ForeignKey {
    pub fn new(
        name: impl Into<String>,
        columns: &[&str],
        referenced_table: impl Into<String>,
        referenced_columns: &[&str],
    ) -> Self {
        Self {
            name: name.into(),
            columns: columns.iter().map(|col| col.to_string()).collect(),
            referenced_schema: None,
            referenced_table: referenced_table.into(),
            referenced_columns: referenced_columns.iter().map(|col| col.to_string()).collect(),
            on_update: FkAction::Restrict,
            on_delete: FkAction::Restrict,
        }
    }

    /// True when the referenced table lives in the same schema as the
    /// referencing one.
    pub fn is_same_schema(&self) -> bool {
        self.referenced_schema.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_detection_respects_order_and_sub_parts() {
        let narrow = Index::new("idx_a", &["a"]);
        let wide = Index::new("idx_ab", &["a", "b"]);
        let reversed = Index::new("idx_ba", &["b", "a"]);
        assert!(narrow.is_prefix_of(&wide));
        assert!(!wide.is_prefix_of(&narrow));
        assert!(!narrow.is_prefix_of(&reversed));

        let mut prefixed = Index::new("idx_a10", &["a"]);
        prefixed.parts[0].sub_part = Some(10);
        assert!(prefixed.is_prefix_of(&wide));
        assert!(!narrow.is_prefix_of(&prefixed));
    }

    #[test]
    fn fk_actions_parse_information_schema_rules() {
        assert_eq!(FkAction::from_rule("SET NULL"), FkAction::SetNull);
        assert_eq!(FkAction::from_rule("cascade"), FkAction::Cascade);
        assert_eq!(FkAction::from_rule("NO ACTION"), FkAction::NoAction);
        assert_eq!(FkAction::Restrict.to_string(), "RESTRICT");
    }
}
