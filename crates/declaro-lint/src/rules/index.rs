use declaro_core::{quote_identifier, Index, Severity};

use crate::checker::{CheckContext, Checker, Finding, Target};
use crate::error::RuleError;

/// Flags secondary indexes made redundant by another index of the same
/// table.
pub struct DupeIndex;

/// Index that makes `index` redundant, if any. Of two identical indexes the
/// later one is reported.
fn redundant_to<'a>(index: &Index, position: usize, indexes: &'a [Index]) -> Option<&'a Index> {
    indexes.iter().enumerate().find_map(|(other_pos, other)| {
        if other_pos == position || !index.is_prefix_of(other) {
            return None;
        }
        let identical = other.is_prefix_of(index);
        let covered = if identical {
            let at_least_as_strict = other.primary || other.unique || !index.unique;
            let reported_later =
                other.primary || other_pos < position || (other.unique && !index.unique);
            at_least_as_strict && reported_later
        } else {
            !index.unique
        };
        covered.then_some(other)
    })
}

impl Checker for DupeIndex {
    fn name(&self) -> &'static str {
        "dupe-index"
    }

    fn description(&self) -> &'static str {
        "Flag redundant secondary indexes"
    }

    fn default_severity(&self) -> Severity {
        Severity::Warning
    }

    fn check(&self, ctx: &CheckContext<'_>) -> Result<Vec<Finding>, RuleError> {
        let mut findings = Vec::new();
        for table in &ctx.schema.tables {
            for (position, index) in table.indexes.iter().enumerate() {
                if index.primary {
                    continue;
                }
                if let Some(other) = redundant_to(index, position, &table.indexes) {
                    findings.push(
                        Finding::new(
                            table.key(),
                            format!(
                                "Index {} of table {} is redundant to {}",
                                quote_identifier(&index.name),
                                quote_identifier(&table.name),
                                if other.primary {
                                    "the PRIMARY KEY".to_string()
                                } else {
                                    quote_identifier(&other.name)
                                }
                            ),
                        )
                        .at(Target::Index(index.name.clone())),
                    );
                }
            }
        }
        Ok(findings)
    }
}
