//! Dependency-safe ordering of object diffs.
//!
//! Phases, in order: foreign key drops, table drops (referencing tables
//! first), table creates (referenced tables first), remaining alters,
//! foreign key additions that had to wait, routines. Within a phase, objects
//! follow declaration order and then name.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use declaro_core::{order_tables, StatementRef, Table};

use crate::clause::AlterClause;
use crate::diff::ObjectDiff;

pub(crate) struct TableAlter<'a> {
    pub table: &'a Table,
    pub clauses: Vec<AlterClause>,
}

/// Unordered changes found by comparison.
#[derive(Default)]
pub(crate) struct Changes<'a> {
    pub added_tables: Vec<&'a Table>,
    pub dropped_tables: Vec<&'a Table>,
    pub altered_tables: Vec<TableAlter<'a>>,
    pub routines: Vec<ObjectDiff>,
}

fn declaration_order(
    left: (Option<StatementRef>, &str),
    right: (Option<StatementRef>, &str),
) -> Ordering {
    let rank = |origin: Option<StatementRef>| origin.map_or(usize::MAX, |stmt| stmt.0);
    rank(left.0)
        .cmp(&rank(right.0))
        .then_with(|| left.1.cmp(right.1))
}

fn by_declaration(left: &ObjectDiff, right: &ObjectDiff) -> Ordering {
    declaration_order((left.origin, &left.key.name), (right.origin, &right.key.name))
}

pub(crate) fn order(mut changes: Changes<'_>) -> Vec<ObjectDiff> {
    changes
        .added_tables
        .sort_by(|a, b| declaration_order((a.origin, &a.name), (b.origin, &b.name)));
    // Reversed below, so independent drops come out in name order.
    changes.dropped_tables.sort_by(|a, b| b.name.cmp(&a.name));
    changes.altered_tables.sort_by(|a, b| {
        declaration_order((a.table.origin, &a.table.name), (b.table.origin, &b.table.name))
    });
    changes.routines.sort_by(by_declaration);

    let mut ordered = Vec::new();
    let mut alters = Vec::new();
    let mut late_foreign_keys = Vec::new();

    for TableAlter { table, clauses } in changes.altered_tables {
        let (fk_drops, rest): (Vec<_>, Vec<_>) =
            clauses.into_iter().partition(AlterClause::is_foreign_key_drop);
        let (fk_adds, rest): (Vec<_>, Vec<_>) =
            rest.into_iter().partition(AlterClause::is_foreign_key_add);
        if !fk_drops.is_empty() {
            ordered.push(ObjectDiff::alter(table.key(), fk_drops, table.origin));
        }
        if !rest.is_empty() {
            alters.push(ObjectDiff::alter(table.key(), rest, table.origin));
        }
        if !fk_adds.is_empty() {
            late_foreign_keys.push(ObjectDiff::alter(table.key(), fk_adds, table.origin));
        }
    }

    let drop_order = order_tables(&changes.dropped_tables);
    for table in &changes.dropped_tables {
        if !drop_order.deferred.contains(&table.name) {
            continue;
        }
        let clauses: Vec<AlterClause> = table
            .foreign_keys
            .iter()
            .filter(|fk| fk.is_same_schema())
            .map(|fk| AlterClause::DropForeignKey {
                foreign_key: fk.clone(),
            })
            .collect();
        if !clauses.is_empty() {
            ordered.push(ObjectDiff::alter(table.key(), clauses, None));
        }
    }
    for name in drop_order.order.iter().rev() {
        if let Some(table) = changes.dropped_tables.iter().find(|table| &table.name == name) {
            ordered.push(ObjectDiff::drop_table(table));
        }
    }

    let altered: BTreeSet<String> = alters.iter().map(|diff| diff.key.name.clone()).collect();
    let add_order = order_tables(&changes.added_tables);
    let positions: BTreeMap<&str, usize> = add_order
        .order
        .iter()
        .enumerate()
        .map(|(idx, name)| (name.as_str(), idx))
        .collect();
    for (own, name) in add_order.order.iter().enumerate() {
        let Some(table) = changes.added_tables.iter().find(|table| &table.name == name) else {
            continue;
        };
        let on_cycle = add_order.deferred.contains(&table.name);
        // Keys pointing at tables that do not exist yet, or at tables whose
        // columns are still being altered, are added after everything else.
        let omitted: BTreeSet<String> = table
            .foreign_keys
            .iter()
            .filter(|fk| fk.is_same_schema())
            .filter(|fk| {
                let created_later = positions
                    .get(fk.referenced_table.as_str())
                    .is_some_and(|pos| *pos > own);
                (on_cycle && created_later) || altered.contains(&fk.referenced_table)
            })
            .map(|fk| fk.name.clone())
            .collect();
        if !omitted.is_empty() {
            let clauses = table
                .foreign_keys
                .iter()
                .filter(|fk| omitted.contains(&fk.name))
                .map(|fk| AlterClause::AddForeignKey {
                    foreign_key: fk.clone(),
                })
                .collect();
            late_foreign_keys.push(ObjectDiff::alter(table.key(), clauses, table.origin));
        }
        ordered.push(ObjectDiff::add_table(table, omitted));
    }

    ordered.extend(alters);
    late_foreign_keys.sort_by(by_declaration);
    ordered.extend(late_foreign_keys);
    ordered.extend(changes.routines);
    ordered
}
