use declaro_core::{quote_identifier, Severity};

use crate::checker::{CheckContext, Checker, Finding, Target};
use crate::error::RuleError;

pub struct HasForeignKey;

impl Checker for HasForeignKey {
    fn name(&self) -> &'static str {
        "has-fk"
    }

    fn description(&self) -> &'static str {
        "Flag foreign key constraints"
    }

    fn default_severity(&self) -> Severity {
        Severity::Ignore
    }

    fn check(&self, ctx: &CheckContext<'_>) -> Result<Vec<Finding>, RuleError> {
        let mut findings = Vec::new();
        for table in &ctx.schema.tables {
            for fk in &table.foreign_keys {
                findings.push(
                    Finding::new(
                        table.key(),
                        format!(
                            "Table {} has foreign key {} referencing {}",
                            quote_identifier(&table.name),
                            quote_identifier(&fk.name),
                            quote_identifier(&fk.referenced_table)
                        ),
                    )
                    .at(Target::ForeignKey(fk.name.clone())),
                );
            }
        }
        Ok(findings)
    }
}

pub struct HasRoutine;

impl Checker for HasRoutine {
    fn name(&self) -> &'static str {
        "has-routine"
    }

    fn description(&self) -> &'static str {
        "Flag stored procedures and functions"
    }

    fn default_severity(&self) -> Severity {
        Severity::Ignore
    }

    fn check(&self, ctx: &CheckContext<'_>) -> Result<Vec<Finding>, RuleError> {
        Ok(ctx
            .schema
            .routines
            .iter()
            .map(|routine| Finding::new(routine.key(), format!("{} is a stored routine", routine.key())))
            .collect())
    }
}
