//! Formats a diff as a runnable SQL script.

use declaro_core::DiffFlags;
use declaro_diff::{Diff, ObjectDiff};

const ROUTINE_DELIMITER: &str = "//";

/// Permitted statements of `diff`, each terminated, with routine bodies
/// wrapped in a `DELIMITER` block so clients do not split them.
pub fn render_script(diff: &Diff, flags: &DiffFlags) -> String {
    let mut script = String::new();
    for object in diff.object_diffs.iter().filter(|object| object.is_permitted(flags)) {
        let statements = object.statements(flags);
        if statements.is_empty() {
            continue;
        }
        if object.key.kind.is_routine() {
            script.push_str(&format!("DELIMITER {ROUTINE_DELIMITER}\n"));
            for statement in &statements {
                script.push_str(&format!("{statement}{ROUTINE_DELIMITER}\n"));
            }
            script.push_str("DELIMITER ;\n");
        } else {
            for statement in &statements {
                script.push_str(&format!("{statement};\n"));
            }
        }
    }
    script
}

/// One SQL comment line per object diff withheld by `flags`.
pub fn render_blocked(blocked: &[&ObjectDiff]) -> String {
    blocked
        .iter()
        .map(|object| {
            format!(
                "-- skipped {object}: rerun with {}\n",
                if object.safety == declaro_diff::Safety::Destructive {
                    "--allow-destructive"
                } else {
                    "--set allow-unsafe=1"
                }
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use declaro_core::{Column, Flavor, Index, Options, Routine, RoutineKind, Schema, Table};

    fn table(name: &str) -> Table {
        let mut table = Table::new(name);
        table.columns.push(Column::new("id", "int").not_null());
        table.indexes.push(Index::primary_key(&["id"]));
        table
    }

    fn routine(body: &str) -> Routine {
        Routine {
            name: "touch".to_string(),
            kind: RoutineKind::Procedure,
            params: String::new(),
            returns: None,
            body: body.to_string(),
            deterministic: false,
            data_access: "CONTAINS SQL".to_string(),
            security: "DEFINER".to_string(),
            comment: String::new(),
            sql_mode: String::new(),
            create_statement: format!("CREATE PROCEDURE `touch`() {body}"),
            origin: None,
        }
    }

    #[test]
    fn routines_are_wrapped_in_a_delimiter_block() {
        let mut desired = Schema::new("app", Flavor::UNKNOWN);
        desired.tables.push(table("users"));
        desired.routines.push(routine("BEGIN SELECT 1; END"));
        let actual = Schema::new("app", Flavor::UNKNOWN);

        let options = Options::default();
        let diff = declaro_diff::diff(&desired, &actual, &options);
        let script = render_script(&diff, &options.diff);

        let lines: Vec<&str> = script.lines().collect();
        assert!(lines[0].starts_with("CREATE TABLE `users`"));
        assert!(script.contains("DELIMITER //\nCREATE PROCEDURE `touch`() BEGIN SELECT 1; END//\nDELIMITER ;\n"));
    }

    #[test]
    fn withheld_drops_are_listed_not_rendered() {
        let desired = Schema::new("app", Flavor::UNKNOWN);
        let mut actual = Schema::new("app", Flavor::UNKNOWN);
        actual.tables.push(table("legacy"));

        let options = Options::default();
        let diff = declaro_diff::diff(&desired, &actual, &options);
        assert_eq!(render_script(&diff, &options.diff), "");
        let blocked = diff.blocked(&options.diff);
        let comment = render_blocked(&blocked);
        assert!(comment.starts_with("-- skipped - table `legacy`"));
        assert!(comment.contains("--allow-destructive"));
    }
}
