use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use declaro_core::{Severity, Statement, StatementRef};

/// Rule name reserved for statements the server rejected.
pub const BROKEN_STATEMENT: &str = "broken-statement";
/// Rule name reserved for rules that failed internally.
pub const RULE_INTERNAL_ERROR: &str = "rule-internal-error";

/// A located lint finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Annotation {
    pub rule: String,
    pub severity: Severity,
    pub message: String,
    pub statement: Option<StatementRef>,
    /// Lines into the statement where the finding applies.
    pub line_offset: usize,
    pub file: PathBuf,
    /// First line of the statement in `file`.
    pub line: usize,
}

impl Annotation {
    pub fn new(
        rule: impl Into<String>,
        severity: Severity,
        message: impl Into<String>,
        statement: Option<(StatementRef, &Statement)>,
        line_offset: usize,
    ) -> Self {
        let (stmt_ref, file, line) = match statement {
            Some((stmt_ref, stmt)) => (Some(stmt_ref), stmt.file.clone(), stmt.line),
            None => (None, PathBuf::new(), 0),
        };
        Self {
            rule: rule.into(),
            severity,
            message: message.into(),
            statement: stmt_ref,
            line_offset,
            file,
            line,
        }
    }

    /// Absolute line of the finding in its file.
    pub fn line_number(&self) -> usize {
        self.line + self.line_offset
    }

    /// `file:line` of the finding, or `<schema>` when it has no declaring
    /// statement.
    pub fn location(&self) -> String {
        if self.statement.is_none() {
            return "<schema>".to_string();
        }
        format!("{}:{}", self.file.display(), self.line_number())
    }
}

impl fmt::Display for Annotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: [{}] {}: {}",
            self.location(),
            self.severity.to_string().to_uppercase(),
            self.rule,
            self.message
        )
    }
}

/// Annotations from one lint run, sorted by location.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LintResult {
    pub annotations: Vec<Annotation>,
}

impl LintResult {
    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty()
    }

    /// Highest severity among the annotations; `Ignore` when there are none.
    pub fn exit_severity(&self) -> Severity {
        self.annotations
            .iter()
            .map(|annotation| annotation.severity)
            .max()
            .unwrap_or(Severity::Ignore)
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.annotations
            .iter()
            .filter(|annotation| annotation.severity == severity)
            .count()
    }

    pub fn merge(&mut self, other: LintResult) {
        self.annotations.extend(other.annotations);
    }
}
