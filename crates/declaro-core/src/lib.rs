//! Core contracts and helpers for declaro.
//!
//! This crate defines the structural schema model, the logical (declared)
//! schema, server flavors, options shared by workspaces, diffs and lint rules,
//! and validation helpers used by the other crates.

pub mod config;
pub mod constraints;
pub mod endpoint;
pub mod error;
pub mod flavor;
pub mod graph;
pub mod logical;
pub mod object;
pub mod options;
pub mod schema;
pub mod types;
pub mod validation;

pub use config::{ConfigSource, MapConfig};
pub use constraints::{FkAction, ForeignKey, Index, IndexPart};
pub use endpoint::Endpoint;
pub use error::{Error, Result};
pub use flavor::{Flavor, Vendor};
pub use graph::{order_tables, FkGraphSummary, TableOrder};
pub use logical::{LogicalSchema, Statement, StatementKind, StatementRef};
pub use object::{quote_identifier, quote_literal, ObjectKey, ObjectKind};
pub use options::{
    ContainerCleanup, DiffFlags, LintSettings, Options, Severity, WorkspaceBackend,
    WorkspaceOptions,
};
pub use schema::{
    Column, ColumnDefault, GeneratedColumn, ObjectRef, Routine, RoutineKind, Schema, Table,
    TableOptions,
};
pub use types::{ColumnType, TypeFamily};
pub use validation::validate_schema;

/// Current version of the serialized schema model.
pub const MODEL_VERSION: &str = "0.1";
