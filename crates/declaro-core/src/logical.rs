use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::object::{ObjectKey, ObjectKind};

/// Kind of a declarative statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementKind {
    CreateTable,
    CreateProcedure,
    CreateFunction,
    /// Anything else (comments-only chunks, `SET`, unsupported DDL).
    Other,
}

impl StatementKind {
    pub fn object_kind(self) -> Option<ObjectKind> {
        match self {
            Self::CreateTable => Some(ObjectKind::Table),
            Self::CreateProcedure => Some(ObjectKind::Procedure),
            Self::CreateFunction => Some(ObjectKind::Function),
            Self::Other => None,
        }
    }
}

/// Index of a statement inside its [`LogicalSchema`].
///
/// Structural objects keep one of these to point back at the statement that
/// declared them; it is a lookup key and carries no ownership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StatementRef(pub usize);

/// One declarative statement with its source position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statement {
    pub kind: StatementKind,
    /// Statement text without the trailing delimiter.
    pub text: String,
    pub file: PathBuf,
    /// 1-based line of the statement's first line in `file`.
    pub line: usize,
    /// Object declared by this statement.
    pub object: Option<ObjectKey>,
}

impl Statement {
    pub fn new(kind: StatementKind, text: impl Into<String>, file: impl Into<PathBuf>, line: usize) -> Self {
        Self {
            kind,
            text: text.into(),
            file: file.into(),
            line,
            object: None,
        }
    }

    pub fn with_object(mut self, name: impl Into<String>) -> Self {
        self.object = self
            .kind
            .object_kind()
            .map(|kind| ObjectKey::new(kind, name));
        self
    }

    /// `file:line` of the statement's first line.
    pub fn location(&self) -> String {
        self.location_at(0)
    }

    /// `file:line` of the line `offset` lines into the statement.
    pub fn location_at(&self, offset: usize) -> String {
        format!("{}:{}", self.file.display(), self.line + offset)
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.text.split('\n')
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.object {
            Some(key) => write!(f, "{} at {}", key, self.location()),
            None => write!(f, "statement at {}", self.location()),
        }
    }
}

/// Declared form of a schema: ordered statements from one directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogicalSchema {
    pub name: String,
    /// Default character set for the schema, if declared.
    pub charset: Option<String>,
    /// Default collation for the schema, if declared.
    pub collation: Option<String>,
    pub statements: Vec<Statement>,
}

impl LogicalSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn push(&mut self, statement: Statement) -> StatementRef {
        self.statements.push(statement);
        StatementRef(self.statements.len() - 1)
    }

    pub fn statement(&self, stmt: StatementRef) -> Option<&Statement> {
        self.statements.get(stmt.0)
    }

    /// Statements that declare an object, in declaration order.
    pub fn creates(&self) -> impl Iterator<Item = (StatementRef, &Statement)> {
        self.statements
            .iter()
            .enumerate()
            .filter(|(_, stmt)| stmt.object.is_some())
            .map(|(idx, stmt)| (StatementRef(idx), stmt))
    }

    /// Map from declared object to its statement. When an object is declared
    /// twice the first declaration wins.
    pub fn origins(&self) -> BTreeMap<ObjectKey, StatementRef> {
        let mut origins = BTreeMap::new();
        for (stmt_ref, stmt) in self.creates() {
            if let Some(key) = &stmt.object {
                origins.entry(key.clone()).or_insert(stmt_ref);
            }
        }
        origins
    }

    /// Statement declaring `key` according to `origins`. An exact name
    /// match wins; otherwise names are compared ignoring ASCII case, the way
    /// a server with `lower_case_table_names` set reports them.
    pub fn origin_in(
        origins: &BTreeMap<ObjectKey, StatementRef>,
        key: &ObjectKey,
    ) -> Option<StatementRef> {
        origins.get(key).copied().or_else(|| {
            origins
                .iter()
                .find(|(declared, _)| {
                    declared.kind == key.kind && declared.name.eq_ignore_ascii_case(&key.name)
                })
                .map(|(_, stmt)| *stmt)
        })
    }

    /// Files contributing statements, in first-seen order.
    pub fn files(&self) -> Vec<&Path> {
        let mut files: Vec<&Path> = Vec::new();
        for stmt in &self.statements {
            if !files.contains(&stmt.file.as_path()) {
                files.push(stmt.file.as_path());
            }
        }
        files
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locations_add_line_offsets() {
        let stmt = Statement::new(
            StatementKind::CreateTable,
            "CREATE TABLE t (\n  id int\n)",
            "schema/t.sql",
            4,
        )
        .with_object("t");
        assert_eq!(stmt.location(), "schema/t.sql:4");
        assert_eq!(stmt.location_at(1), "schema/t.sql:5");
        assert_eq!(stmt.object, Some(ObjectKey::table("t")));
        assert_eq!(stmt.lines().count(), 3);
    }

    #[test]
    fn first_declaration_wins_in_origins() {
        let mut logical = LogicalSchema::new("app");
        logical.push(Statement::new(StatementKind::Other, "SET foo = 1", "a.sql", 1));
        let first = logical.push(
            Statement::new(StatementKind::CreateTable, "CREATE TABLE t (id int)", "a.sql", 2)
                .with_object("t"),
        );
        logical.push(
            Statement::new(StatementKind::CreateTable, "CREATE TABLE t (id int)", "b.sql", 1)
                .with_object("t"),
        );
        let origins = logical.origins();
        assert_eq!(origins.get(&ObjectKey::table("t")), Some(&first));
        assert_eq!(logical.creates().count(), 2);
        assert_eq!(logical.files().len(), 2);
    }

    #[test]
    fn origins_match_folded_names() {
        let mut logical = LogicalSchema::new("app");
        let users = logical.push(
            Statement::new(StatementKind::CreateTable, "CREATE TABLE Users (id int)", "a.sql", 1)
                .with_object("Users"),
        );
        let origins = logical.origins();
        assert_eq!(LogicalSchema::origin_in(&origins, &ObjectKey::table("users")), Some(users));
        assert_eq!(LogicalSchema::origin_in(&origins, &ObjectKey::table("Users")), Some(users));
        assert_eq!(
            LogicalSchema::origin_in(&origins, &ObjectKey::new(ObjectKind::Procedure, "users")),
            None
        );
    }
}
