use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::constraints::{ForeignKey, Index};
use crate::flavor::Flavor;
use crate::logical::{LogicalSchema, StatementRef};
use crate::object::{ObjectKey, ObjectKind};
use crate::types::ColumnType;

/// Structural model of one database schema as introspected from a server.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Schema {
    pub name: String,
    /// Flavor of the server the schema was introspected from.
    pub flavor: Flavor,
    pub charset: String,
    pub collation: String,
    pub tables: Vec<Table>,
    pub routines: Vec<Routine>,
}

/// Borrowed view over either kind of schema object.
#[derive(Debug, Clone, Copy)]
pub enum ObjectRef<'a> {
    Table(&'a Table),
    Routine(&'a Routine),
}

impl<'a> ObjectRef<'a> {
    pub fn key(&self) -> ObjectKey {
        match self {
            Self::Table(table) => table.key(),
            Self::Routine(routine) => routine.key(),
        }
    }

    pub fn origin(&self) -> Option<StatementRef> {
        match self {
            Self::Table(table) => table.origin,
            Self::Routine(routine) => routine.origin,
        }
    }
}

impl Schema {
    pub fn new(name: impl Into<String>, flavor: Flavor) -> Self {
        Self {
            name: name.into(),
            flavor,
            charset: "utf8mb4".to_string(),
            collation: flavor.default_utf8mb4_collation().to_string(),
            tables: Vec::new(),
            routines: Vec::new(),
        }
    }

    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|table| table.name == name)
    }

    pub fn routine(&self, kind: ObjectKind, name: &str) -> Option<&Routine> {
        self.routines
            .iter()
            .find(|routine| routine.kind.object_kind() == kind && routine.name == name)
    }

    pub fn object(&self, key: &ObjectKey) -> Option<ObjectRef<'_>> {
        match key.kind {
            ObjectKind::Table => self.table(&key.name).map(ObjectRef::Table),
            kind => self.routine(kind, &key.name).map(ObjectRef::Routine),
        }
    }

    /// All objects keyed by `(kind, name)`.
    pub fn objects(&self) -> BTreeMap<ObjectKey, ObjectRef<'_>> {
        let tables = self
            .tables
            .iter()
            .map(|table| (table.key(), ObjectRef::Table(table)));
        let routines = self
            .routines
            .iter()
            .map(|routine| (routine.key(), ObjectRef::Routine(routine)));
        tables.chain(routines).collect()
    }

    pub fn object_count(&self) -> usize {
        self.tables.len() + self.routines.len()
    }

    /// Sets the originating statement of every object found in `origins`.
    pub fn link_origins(&mut self, origins: &BTreeMap<ObjectKey, StatementRef>) {
        for table in &mut self.tables {
            table.origin = LogicalSchema::origin_in(origins, &table.key());
        }
        for routine in &mut self.routines {
            routine.origin = LogicalSchema::origin_in(origins, &routine.key());
        }
    }
}

/// Table-level options reported by `information_schema.tables`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TableOptions {
    pub engine: String,
    pub charset: String,
    pub collation: String,
    pub row_format: Option<String>,
    pub comment: Option<String>,
    /// Remaining `CREATE_OPTIONS` such as `stats_persistent=1`, sorted.
    pub create_options: Vec<String>,
}

impl Default for TableOptions {
    fn default() -> Self {
        Self {
            engine: "InnoDB".to_string(),
            charset: "utf8mb4".to_string(),
            collation: "utf8mb4_general_ci".to_string(),
            row_format: None,
            comment: None,
            create_options: Vec::new(),
        }
    }
}

/// A table and its structure.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Table {
    pub name: String,
    pub columns: Vec<Column>,
    /// Primary key first, then secondary indexes in server order.
    pub indexes: Vec<Index>,
    pub foreign_keys: Vec<ForeignKey>,
    pub options: TableOptions,
    /// Next auto-increment value; server metadata, never diffed.
    pub auto_increment: Option<u64>,
    /// `SHOW CREATE TABLE` output with the auto-increment clause removed.
    pub create_statement: String,
    /// Statement of the logical schema that declared this table.
    #[serde(skip)]
    #[schemars(skip)]
    pub origin: Option<StatementRef>,
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            indexes: Vec::new(),
            foreign_keys: Vec::new(),
            options: TableOptions::default(),
            auto_increment: None,
            create_statement: String::new(),
            origin: None,
        }
    }

    pub fn key(&self) -> ObjectKey {
        ObjectKey::table(self.name.clone())
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|col| col.name == name)
    }

    pub fn index(&self, name: &str) -> Option<&Index> {
        self.indexes.iter().find(|idx| idx.name == name)
    }

    pub fn foreign_key(&self, name: &str) -> Option<&ForeignKey> {
        self.foreign_keys.iter().find(|fk| fk.name == name)
    }

    pub fn primary_key(&self) -> Option<&Index> {
        self.indexes.iter().find(|idx| idx.primary)
    }

    pub fn secondary_indexes(&self) -> impl Iterator<Item = &Index> {
        self.indexes.iter().filter(|idx| !idx.primary)
    }

    /// Names of same-schema tables this table references through foreign keys.
    pub fn referenced_tables(&self) -> impl Iterator<Item = &str> {
        self.foreign_keys
            .iter()
            .filter(|fk| fk.is_same_schema())
            .map(|fk| fk.referenced_table.as_str())
    }

    /// Structural equality, ignoring server metadata (auto-increment counter,
    /// create statement text, origin).
    pub fn same_structure(&self, other: &Table) -> bool {
        self.name == other.name
            && self.columns == other.columns
            && self.indexes == other.indexes
            && fk_sets_equal(&self.foreign_keys, &other.foreign_keys)
            && self.options == other.options
    }
}

fn fk_sets_equal(left: &[ForeignKey], right: &[ForeignKey]) -> bool {
    left.len() == right.len()
        && left
            .iter()
            .all(|fk| right.iter().any(|other| other == fk))
}

/// Column default as reported by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ColumnDefault {
    /// Explicit `DEFAULT NULL` (or implicit default of a nullable column).
    Null,
    /// Literal value, unquoted.
    Literal(String),
    /// Expression such as `CURRENT_TIMESTAMP` or `(uuid())`.
    Expression(String),
}

/// Generated column definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct GeneratedColumn {
    pub expression: String,
    pub stored: bool,
}

/// Column metadata for a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Column {
    pub name: String,
    /// Server-rendered type, e.g. `int unsigned` or `varchar(64)`.
    pub type_name: String,
    pub nullable: bool,
    pub default: Option<ColumnDefault>,
    pub auto_increment: bool,
    /// `ON UPDATE` expression, e.g. `CURRENT_TIMESTAMP`.
    pub on_update: Option<String>,
    pub charset: Option<String>,
    pub collation: Option<String>,
    pub comment: Option<String>,
    pub generated: Option<GeneratedColumn>,
    pub invisible: bool,
}

impl Column {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            nullable: true,
            default: None,
            auto_increment: false,
            on_update: None,
            charset: None,
            collation: None,
            comment: None,
            generated: None,
            invisible: false,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn parsed_type(&self) -> ColumnType {
        ColumnType::parse(&self.type_name)
    }
}

/// Kind of stored routine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RoutineKind {
    Procedure,
    Function,
}

impl RoutineKind {
    pub fn object_kind(self) -> ObjectKind {
        match self {
            Self::Procedure => ObjectKind::Procedure,
            Self::Function => ObjectKind::Function,
        }
    }
}

/// Stored procedure or function.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Routine {
    pub name: String,
    pub kind: RoutineKind,
    /// Parameter list text as reported by the server.
    pub params: String,
    /// Return type for functions.
    pub returns: Option<String>,
    pub body: String,
    pub deterministic: bool,
    /// `CONTAINS SQL`, `NO SQL`, `READS SQL DATA` or `MODIFIES SQL DATA`.
    pub data_access: String,
    /// `DEFINER` or `INVOKER`.
    pub security: String,
    pub comment: String,
    /// `sql_mode` in effect when the routine was created.
    pub sql_mode: String,
    pub create_statement: String,
    #[serde(skip)]
    #[schemars(skip)]
    pub origin: Option<StatementRef>,
}

impl Routine {
    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(self.kind.object_kind(), self.name.clone())
    }

    /// Structural equality, ignoring create statement text and origin.
    pub fn same_structure(&self, other: &Routine) -> bool {
        self.name == other.name
            && self.kind == other.kind
            && self.params == other.params
            && self.returns == other.returns
            && self.body == other.body
            && self.deterministic == other.deterministic
            && self.data_access == other.data_access
            && self.security == other.security
            && self.comment == other.comment
            && self.sql_mode == other.sql_mode
    }
}
