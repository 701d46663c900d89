use declaro_core::{quote_identifier, Severity};

use crate::checker::{CheckContext, Checker, Finding, TableOption, Target};
use crate::error::RuleError;

/// Flags tables without a primary key.
pub struct HasPrimaryKey;

impl Checker for HasPrimaryKey {
    fn name(&self) -> &'static str {
        "has-pk"
    }

    fn description(&self) -> &'static str {
        "Flag tables that lack a primary key"
    }

    fn default_severity(&self) -> Severity {
        Severity::Warning
    }

    fn check(&self, ctx: &CheckContext<'_>) -> Result<Vec<Finding>, RuleError> {
        Ok(ctx
            .schema
            .tables
            .iter()
            .filter(|table| table.primary_key().is_none())
            .map(|table| {
                Finding::new(
                    table.key(),
                    format!("Table {} does not define a PRIMARY KEY", quote_identifier(&table.name)),
                )
            })
            .collect())
    }
}

/// Flags tables and columns using a character set outside the allowed list.
pub struct Charset;

impl Checker for Charset {
    fn name(&self) -> &'static str {
        "charset"
    }

    fn description(&self) -> &'static str {
        "Only allow character sets listed in allow-charset"
    }

    fn default_severity(&self) -> Severity {
        Severity::Warning
    }

    fn check(&self, ctx: &CheckContext<'_>) -> Result<Vec<Finding>, RuleError> {
        let allowed = &ctx.options.lint.allowed_charsets;
        if allowed.is_empty() {
            return Err(RuleError::Setting {
                key: "allow-charset".to_string(),
                message: "no character sets allowed".to_string(),
            });
        }
        let permitted = |charset: &str| allowed.iter().any(|name| name.eq_ignore_ascii_case(charset));

        let mut findings = Vec::new();
        for table in &ctx.schema.tables {
            let table_charset = &table.options.charset;
            if !permitted(table_charset.as_str()) {
                findings.push(
                    Finding::new(
                        table.key(),
                        format!(
                            "Table {} uses character set {table_charset}, allowed: {}",
                            quote_identifier(&table.name),
                            allowed.join(", ")
                        ),
                    )
                    .at(Target::Option(TableOption::Charset)),
                );
            }
            for column in &table.columns {
                let Some(charset) = &column.charset else {
                    continue;
                };
                if charset != table_charset && !permitted(charset.as_str()) {
                    findings.push(
                        Finding::new(
                            table.key(),
                            format!(
                                "Column {} of table {} uses character set {charset}",
                                quote_identifier(&column.name),
                                quote_identifier(&table.name)
                            ),
                        )
                        .at(Target::Column(column.name.clone())),
                    );
                }
            }
        }
        Ok(findings)
    }
}

/// Flags tables using a storage engine outside the allowed list.
pub struct Engine;

impl Checker for Engine {
    fn name(&self) -> &'static str {
        "engine"
    }

    fn description(&self) -> &'static str {
        "Only allow storage engines listed in allow-engine"
    }

    fn default_severity(&self) -> Severity {
        Severity::Warning
    }

    fn check(&self, ctx: &CheckContext<'_>) -> Result<Vec<Finding>, RuleError> {
        let allowed = &ctx.options.lint.allowed_engines;
        Ok(ctx
            .schema
            .tables
            .iter()
            .filter(|table| !allowed.iter().any(|engine| engine.eq_ignore_ascii_case(&table.options.engine)))
            .map(|table| {
                Finding::new(
                    table.key(),
                    format!(
                        "Table {} uses storage engine {}",
                        quote_identifier(&table.name),
                        table.options.engine
                    ),
                )
                .at(Target::Option(TableOption::Engine))
            })
            .collect())
    }
}

/// Auto-increment columns should be unsigned `int` or `bigint` so the
/// counter does not run out early.
pub struct AutoInc;

impl Checker for AutoInc {
    fn name(&self) -> &'static str {
        "auto-inc"
    }

    fn description(&self) -> &'static str {
        "Flag auto-increment columns that are not unsigned int or bigint"
    }

    fn default_severity(&self) -> Severity {
        Severity::Warning
    }

    fn check(&self, ctx: &CheckContext<'_>) -> Result<Vec<Finding>, RuleError> {
        let mut findings = Vec::new();
        for table in &ctx.schema.tables {
            for column in table.columns.iter().filter(|column| column.auto_increment) {
                let ty = column.parsed_type();
                let ok = ty.unsigned && matches!(ty.base.as_str(), "int" | "integer" | "bigint");
                if !ok {
                    findings.push(
                        Finding::new(
                            table.key(),
                            format!(
                                "Auto-increment column {} of table {} is {}; use int unsigned or bigint unsigned",
                                quote_identifier(&column.name),
                                quote_identifier(&table.name),
                                column.type_name
                            ),
                        )
                        .at(Target::Column(column.name.clone())),
                    );
                }
            }
        }
        Ok(findings)
    }
}
