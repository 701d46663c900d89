//! Runs a rule registry over a materialized schema.

use std::any::Any;
use std::collections::HashSet;
use std::panic::{catch_unwind, AssertUnwindSafe};

use declaro_core::{LogicalSchema, Options, Severity, StatementRef};
use declaro_workspace::WorkspaceSchema;

use crate::annotation::{Annotation, LintResult, BROKEN_STATEMENT, RULE_INTERNAL_ERROR};
use crate::checker::{CheckContext, Checker, Finding};
use crate::location::line_offset;
use crate::registry::RuleRegistry;

/// Lints `ws`, returning located annotations sorted by file and line.
///
/// Every statement the server rejected yields a `broken-statement` error.
/// Rules whose configured severity is `ignore` are not run at all. A rule
/// that errors or panics yields one `rule-internal-error` annotation and
/// never prevents the remaining rules from running.
pub fn check_schema(ws: &WorkspaceSchema, options: &Options, registry: &RuleRegistry) -> LintResult {
    let mut annotations = Vec::new();

    for failure in &ws.failures {
        let statement = ws
            .logical
            .statement(failure.statement)
            .map(|stmt| (failure.statement, stmt));
        annotations.push(Annotation::new(
            BROKEN_STATEMENT,
            Severity::Error,
            failure.to_string(),
            statement,
            0,
        ));
    }

    let ctx = CheckContext {
        schema: &ws.schema,
        logical: &ws.logical,
        options,
    };
    let declared = ws.logical.origins();

    for checker in registry.iter() {
        let severity = options.severity_for(checker.name(), checker.default_severity());
        if severity == Severity::Ignore {
            continue;
        }
        match run_checker(checker, &ctx) {
            Ok(findings) => {
                for finding in findings {
                    let origin = ws
                        .schema
                        .object(&finding.object)
                        .and_then(|object| object.origin())
                        .or_else(|| LogicalSchema::origin_in(&declared, &finding.object));
                    annotations.push(locate(ws, origin, checker.name(), severity, finding));
                }
            }
            Err(message) => {
                tracing::warn!(
                    event = "lint_rule_failed",
                    rule = checker.name(),
                    error = %message,
                    "lint rule failed"
                );
                annotations.push(Annotation::new(
                    RULE_INTERNAL_ERROR,
                    Severity::Error,
                    format!("rule {} failed: {message}", checker.name()),
                    None,
                    0,
                ));
            }
        }
    }

    annotations.sort_by(|a, b| (&a.file, a.line_number()).cmp(&(&b.file, b.line_number())));
    // Unlocated annotations name their rule in the message and are kept as-is.
    let mut seen = HashSet::new();
    annotations.retain(|annotation| {
        annotation.statement.is_none() || seen.insert((annotation.rule.clone(), annotation.location()))
    });

    let result = LintResult { annotations };
    tracing::info!(
        event = "lint_complete",
        schema = %ws.logical.name,
        errors = result.count(Severity::Error),
        warnings = result.count(Severity::Warning),
        "lint complete"
    );
    result
}

fn run_checker(checker: &dyn Checker, ctx: &CheckContext<'_>) -> Result<Vec<Finding>, String> {
    match catch_unwind(AssertUnwindSafe(|| checker.check(ctx))) {
        Ok(Ok(findings)) => Ok(findings),
        Ok(Err(err)) => Err(err.to_string()),
        Err(payload) => Err(format!("panicked: {}", panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

/// Places `finding` on its declaring statement. A finding whose object has
/// no known declaration is kept unlocated, naming the object instead.
fn locate(
    ws: &WorkspaceSchema,
    origin: Option<StatementRef>,
    rule: &str,
    severity: Severity,
    finding: Finding,
) -> Annotation {
    let Some(stmt) = origin.and_then(|origin| ws.logical.statement(origin).map(|stmt| (origin, stmt))) else {
        tracing::warn!(
            event = "lint_finding_unlocated",
            rule,
            object = %finding.object,
            "finding has no declaring statement"
        );
        let message = format!("{}: {}", finding.object, finding.message);
        return Annotation::new(rule, severity, message, None, 0);
    };
    let offset = line_offset(stmt.1, &finding.target);
    Annotation::new(rule, severity, finding.message, Some(stmt), offset)
}
