use declaro_core::{quote_identifier, Column, Severity, Table, TypeFamily};

use crate::checker::{CheckContext, Checker, Finding, Target};
use crate::error::RuleError;

fn column_findings(
    ctx: &CheckContext<'_>,
    mut message: impl FnMut(&Table, &Column) -> Option<String>,
) -> Vec<Finding> {
    let mut findings = Vec::new();
    for table in &ctx.schema.tables {
        for column in &table.columns {
            if let Some(text) = message(table, column) {
                findings.push(Finding::new(table.key(), text).at(Target::Column(column.name.clone())));
            }
        }
    }
    findings
}

/// Integer display widths other than the type's default.
///
/// `tinyint(1)` is the conventional boolean and is accepted. Servers that
/// omit display widths report none, so the rule has nothing to say there.
pub struct DisplayWidth;

impl Checker for DisplayWidth {
    fn name(&self) -> &'static str {
        "display-width"
    }

    fn description(&self) -> &'static str {
        "Flag integer display widths other than the default"
    }

    fn default_severity(&self) -> Severity {
        Severity::Warning
    }

    fn check(&self, ctx: &CheckContext<'_>) -> Result<Vec<Finding>, RuleError> {
        if ctx.options.flavor.omits_int_display_width() {
            return Ok(Vec::new());
        }
        Ok(column_findings(ctx, |table, column| {
            let ty = column.parsed_type();
            if !ty.is_integer() || ty.zerofill {
                return None;
            }
            let width = ty.display_width()?;
            if (ty.base == "tinyint" && width == 1) || Some(width) == ty.default_display_width() {
                return None;
            }
            Some(format!(
                "Column {} of table {} declares display width {}; it has no effect on stored values",
                quote_identifier(&column.name),
                quote_identifier(&table.name),
                column.type_name
            ))
        }))
    }
}

pub struct HasFloat;

impl Checker for HasFloat {
    fn name(&self) -> &'static str {
        "has-float"
    }

    fn description(&self) -> &'static str {
        "Flag columns using FLOAT or DOUBLE"
    }

    fn default_severity(&self) -> Severity {
        Severity::Ignore
    }

    fn check(&self, ctx: &CheckContext<'_>) -> Result<Vec<Finding>, RuleError> {
        Ok(column_findings(ctx, |table, column| {
            (column.parsed_type().family() == TypeFamily::Float).then(|| {
                format!(
                    "Column {} of table {} is {}; floating-point values are approximate",
                    quote_identifier(&column.name),
                    quote_identifier(&table.name),
                    column.type_name
                )
            })
        }))
    }
}

pub struct HasEnum;

impl Checker for HasEnum {
    fn name(&self) -> &'static str {
        "has-enum"
    }

    fn description(&self) -> &'static str {
        "Flag columns using ENUM or SET"
    }

    fn default_severity(&self) -> Severity {
        Severity::Ignore
    }

    fn check(&self, ctx: &CheckContext<'_>) -> Result<Vec<Finding>, RuleError> {
        Ok(column_findings(ctx, |table, column| {
            let ty = column.parsed_type();
            (ty.family() == TypeFamily::EnumSet).then(|| {
                format!(
                    "Column {} of table {} uses {}",
                    quote_identifier(&column.name),
                    quote_identifier(&table.name),
                    ty.base.to_uppercase()
                )
            })
        }))
    }
}
