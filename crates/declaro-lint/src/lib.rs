//! Rule-based linting of declarative schemas.
//!
//! Rules ([`Checker`]) inspect the structure a workspace produced from the
//! declared statements. [`check_schema`] runs a [`RuleRegistry`] over a
//! [`WorkspaceSchema`](declaro_workspace::WorkspaceSchema) and maps each
//! finding back to the file and line that declared it.

pub mod annotation;
pub mod checker;
pub mod engine;
pub mod error;
pub mod location;
pub mod registry;
pub mod rules;

pub use annotation::{Annotation, LintResult, BROKEN_STATEMENT, RULE_INTERNAL_ERROR};
pub use checker::{CheckContext, Checker, Finding, TableOption, Target};
pub use engine::check_schema;
pub use error::RuleError;
pub use location::line_offset;
pub use registry::RuleRegistry;
