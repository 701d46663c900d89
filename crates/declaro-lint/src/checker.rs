use declaro_core::{LogicalSchema, ObjectKey, Options, Schema, Severity};

use crate::error::RuleError;

/// Everything a rule may inspect.
#[derive(Debug, Clone, Copy)]
pub struct CheckContext<'a> {
    pub schema: &'a Schema,
    pub logical: &'a LogicalSchema,
    pub options: &'a Options,
}

/// Table option a finding points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableOption {
    Engine,
    Charset,
}

/// Clause of a declaration that a finding points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// The statement as a whole.
    Statement,
    Column(String),
    Index(String),
    ForeignKey(String),
    Option(TableOption),
}

/// A condition a rule found to hold. Severity is assigned by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub object: ObjectKey,
    pub target: Target,
    pub message: String,
}

impl Finding {
    pub fn new(object: ObjectKey, message: impl Into<String>) -> Self {
        Self {
            object,
            target: Target::Statement,
            message: message.into(),
        }
    }

    pub fn at(mut self, target: Target) -> Self {
        self.target = target;
        self
    }
}

/// A lint rule. Rules are stateless and independent of each other.
pub trait Checker: Send + Sync {
    /// Rule name as used in configuration (`lint-<name>`).
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// Severity used when configuration does not set one.
    fn default_severity(&self) -> Severity;

    fn check(&self, ctx: &CheckContext<'_>) -> Result<Vec<Finding>, RuleError>;
}
