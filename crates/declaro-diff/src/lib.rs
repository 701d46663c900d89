//! Structural diffs between two introspected schemas.
//!
//! [`diff`] matches objects by kind and name, computes per-object clauses,
//! classifies each change by how much data it can affect and orders the
//! result so that it can be applied statement by statement.
//!
//! ```text
//! - foreign key drops
//! - table drops            referencing tables first
//! - table creates          referenced tables first, cyclic keys deferred
//! - alters
//! - deferred foreign keys
//! - routines
//! ```

pub mod clause;
pub mod compare;
pub mod diff;
pub mod error;
pub mod materialize;
mod order;
pub mod render;
pub mod safety;

pub use clause::{AlterClause, ColumnPosition};
pub use compare::diff;
pub use diff::{Diff, DiffKind, DiffObject, ObjectDiff};
pub use error::{DiffError, Result};
pub use materialize::{diff_logical_schema, diff_with_workspace};
pub use safety::Safety;
