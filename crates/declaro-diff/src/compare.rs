use declaro_core::{Column, Options, Schema, Table};

use crate::clause::{AlterClause, ColumnPosition};
use crate::diff::{Diff, ObjectDiff};
use crate::order::{order, Changes, TableAlter};
use crate::safety::types_equivalent;

/// Computes the ordered operations that turn `actual` into `desired`.
///
/// Objects are matched by kind and name; renames show up as a drop and an
/// add. Server metadata (auto-increment counters, create statement text,
/// statement origins) never produces a difference.
pub fn diff(desired: &Schema, actual: &Schema, options: &Options) -> Diff {
    let mut changes = Changes::default();

    for table in &desired.tables {
        match actual.table(&table.name) {
            None => changes.added_tables.push(table),
            Some(current) => {
                let clauses = compare_tables(table, current);
                if !clauses.is_empty() {
                    changes.altered_tables.push(TableAlter { table, clauses });
                }
            }
        }
    }
    changes.dropped_tables = actual
        .tables
        .iter()
        .filter(|table| desired.table(&table.name).is_none())
        .collect();

    for routine in &desired.routines {
        match actual.routine(routine.kind.object_kind(), &routine.name) {
            None => changes.routines.push(ObjectDiff::add_routine(routine)),
            Some(current) if !routine.same_structure(current) => {
                changes.routines.push(ObjectDiff::alter(
                    routine.key(),
                    vec![AlterClause::ReplaceRoutine {
                        from: Box::new(current.clone()),
                        to: Box::new(routine.clone()),
                    }],
                    routine.origin,
                ));
            }
            Some(_) => {}
        }
    }
    for routine in &actual.routines {
        if desired.routine(routine.kind.object_kind(), &routine.name).is_none() {
            changes.routines.push(ObjectDiff::drop_routine(routine));
        }
    }

    let object_diffs = order(changes);
    tracing::debug!(
        event = "diff_planned",
        desired = %desired.name,
        actual = %actual.name,
        flavor = %options.flavor,
        operations = object_diffs.len(),
        "diff planned"
    );
    Diff { object_diffs }
}

/// Clauses turning `actual` into `desired`, drops before adds.
pub(crate) fn compare_tables(desired: &Table, actual: &Table) -> Vec<AlterClause> {
    let mut clauses = Vec::new();

    for fk in &actual.foreign_keys {
        if desired.foreign_key(&fk.name) != Some(fk) {
            clauses.push(AlterClause::DropForeignKey {
                foreign_key: fk.clone(),
            });
        }
    }
    for index in &actual.indexes {
        if desired.index(&index.name) != Some(index) {
            clauses.push(AlterClause::DropIndex {
                index: index.clone(),
            });
        }
    }
    for column in &actual.columns {
        if desired.column(&column.name).is_none() {
            clauses.push(AlterClause::DropColumn {
                column: column.clone(),
            });
        }
    }

    column_clauses(desired, actual, &mut clauses);

    for index in &desired.indexes {
        if actual.index(&index.name) != Some(index) {
            clauses.push(AlterClause::AddIndex {
                index: index.clone(),
            });
        }
    }
    option_clauses(desired, actual, &mut clauses);
    for fk in &desired.foreign_keys {
        if actual.foreign_key(&fk.name) != Some(fk) {
            clauses.push(AlterClause::AddForeignKey {
                foreign_key: fk.clone(),
            });
        }
    }
    clauses
}

/// Adds and modifies columns in desired order, tracking where each column
/// currently sits so moves are emitted only when needed.
fn column_clauses(desired: &Table, actual: &Table, clauses: &mut Vec<AlterClause>) {
    let mut current: Vec<&str> = actual
        .columns
        .iter()
        .map(|column| column.name.as_str())
        .filter(|name| desired.column(name).is_some())
        .collect();

    for (idx, column) in desired.columns.iter().enumerate() {
        let position = match idx {
            0 => ColumnPosition::First,
            _ => ColumnPosition::After(desired.columns[idx - 1].name.clone()),
        };
        match actual.column(&column.name) {
            None => {
                let appended = idx >= current.len();
                current.insert(idx.min(current.len()), column.name.as_str());
                clauses.push(AlterClause::AddColumn {
                    column: column.clone(),
                    position: (!appended).then_some(position),
                });
            }
            Some(existing) => {
                let moved = current.get(idx) != Some(&column.name.as_str());
                if moved {
                    current.retain(|name| *name != column.name);
                    current.insert(idx.min(current.len()), column.name.as_str());
                }
                if moved || !columns_equivalent(existing, column) {
                    clauses.push(AlterClause::ModifyColumn {
                        from: existing.clone(),
                        to: column.clone(),
                        position: moved.then_some(position),
                    });
                }
            }
        }
    }
}

fn columns_equivalent(left: &Column, right: &Column) -> bool {
    if !types_equivalent(&left.parsed_type(), &right.parsed_type()) {
        return false;
    }
    let mut normalized = left.clone();
    normalized.type_name = right.type_name.clone();
    normalized == *right
}

fn option_clauses(desired: &Table, actual: &Table, clauses: &mut Vec<AlterClause>) {
    let (old, new) = (&actual.options, &desired.options);
    if !old.engine.eq_ignore_ascii_case(&new.engine) {
        clauses.push(AlterClause::ChangeEngine {
            from: old.engine.clone(),
            to: new.engine.clone(),
        });
    }
    if old.charset != new.charset || old.collation != new.collation {
        clauses.push(AlterClause::ChangeCharset {
            from_charset: old.charset.clone(),
            from_collation: old.collation.clone(),
            to_charset: new.charset.clone(),
            to_collation: new.collation.clone(),
        });
    }
    if old.row_format != new.row_format {
        clauses.push(AlterClause::ChangeRowFormat {
            from: old.row_format.clone(),
            to: new.row_format.clone(),
        });
    }
    if old.comment != new.comment {
        clauses.push(AlterClause::ChangeComment {
            from: old.comment.clone(),
            to: new.comment.clone(),
        });
    }
    if old.create_options != new.create_options {
        clauses.push(AlterClause::ChangeCreateOptions {
            from: old.create_options.clone(),
            to: new.create_options.clone(),
        });
    }
}
