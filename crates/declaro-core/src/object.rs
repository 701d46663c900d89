use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Kind of schema object tracked by declaro.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    Table,
    Procedure,
    Function,
}

impl ObjectKind {
    /// SQL keyword used in `CREATE`/`DROP` statements for this kind.
    pub fn keyword(self) -> &'static str {
        match self {
            Self::Table => "TABLE",
            Self::Procedure => "PROCEDURE",
            Self::Function => "FUNCTION",
        }
    }

    pub fn is_routine(self) -> bool {
        matches!(self, Self::Procedure | Self::Function)
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Table => write!(f, "table"),
            Self::Procedure => write!(f, "procedure"),
            Self::Function => write!(f, "function"),
        }
    }
}

/// Identity of a schema object: `(kind, name)`.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
pub struct ObjectKey {
    pub kind: ObjectKind,
    pub name: String,
}

impl ObjectKey {
    pub fn new(kind: ObjectKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }

    pub fn table(name: impl Into<String>) -> Self {
        Self::new(ObjectKind::Table, name)
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, quote_identifier(&self.name))
    }
}

/// Quote an identifier with backticks, doubling any embedded backtick.
pub fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Quote a string literal for MySQL, escaping quotes and backslashes.
pub fn quote_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for ch in value.chars() {
        match ch {
            '\'' => out.push_str("''"),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\0' => out.push_str("\\0"),
            other => out.push(other),
        }
    }
    out.push('\'');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoting_escapes_special_characters() {
        assert_eq!(quote_identifier("weird`name"), "`weird``name`");
        assert_eq!(quote_literal("it's"), "'it''s'");
        assert_eq!(quote_literal(r"a\b"), r"'a\\b'");
    }

    #[test]
    fn keys_order_by_kind_then_name() {
        let mut keys = vec![
            ObjectKey::new(ObjectKind::Procedure, "a"),
            ObjectKey::table("b"),
            ObjectKey::table("a"),
        ];
        keys.sort();
        assert_eq!(keys[0], ObjectKey::table("a"));
        assert_eq!(keys[2].kind, ObjectKind::Procedure);
    }
}
