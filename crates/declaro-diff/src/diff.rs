use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

use declaro_core::{quote_identifier, DiffFlags, ObjectKey, Routine, StatementRef, Table};

use crate::clause::AlterClause;
use crate::render::{create_routine, create_table, drop_routine, drop_table};
use crate::safety::Safety;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffKind {
    Add,
    Drop,
    Alter,
}

/// The object an add or drop applies to.
#[derive(Debug, Clone)]
pub enum DiffObject {
    Table(Table),
    Routine(Routine),
}

/// One operation against one object.
#[derive(Debug, Clone, Serialize)]
pub struct ObjectDiff {
    pub kind: DiffKind,
    pub key: ObjectKey,
    pub clauses: Vec<AlterClause>,
    pub safety: Safety,
    /// Desired object for adds, dropped object for drops.
    #[serde(skip)]
    pub object: Option<DiffObject>,
    /// Foreign keys left out of an added table and created by a later diff.
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub omitted_foreign_keys: BTreeSet<String>,
    #[serde(skip)]
    pub origin: Option<StatementRef>,
}

impl ObjectDiff {
    pub fn add_table(table: &Table, omitted_foreign_keys: BTreeSet<String>) -> Self {
        Self {
            kind: DiffKind::Add,
            key: table.key(),
            clauses: Vec::new(),
            safety: Safety::Safe,
            object: Some(DiffObject::Table(table.clone())),
            omitted_foreign_keys,
            origin: table.origin,
        }
    }

    pub fn drop_table(table: &Table) -> Self {
        Self {
            kind: DiffKind::Drop,
            key: table.key(),
            clauses: Vec::new(),
            safety: Safety::Destructive,
            object: Some(DiffObject::Table(table.clone())),
            omitted_foreign_keys: BTreeSet::new(),
            origin: None,
        }
    }

    pub fn add_routine(routine: &Routine) -> Self {
        Self {
            kind: DiffKind::Add,
            key: routine.key(),
            clauses: Vec::new(),
            safety: Safety::Safe,
            object: Some(DiffObject::Routine(routine.clone())),
            omitted_foreign_keys: BTreeSet::new(),
            origin: routine.origin,
        }
    }

    pub fn drop_routine(routine: &Routine) -> Self {
        Self {
            kind: DiffKind::Drop,
            key: routine.key(),
            clauses: Vec::new(),
            safety: Safety::Unsafe,
            object: Some(DiffObject::Routine(routine.clone())),
            omitted_foreign_keys: BTreeSet::new(),
            origin: None,
        }
    }

    pub fn alter(key: ObjectKey, clauses: Vec<AlterClause>, origin: Option<StatementRef>) -> Self {
        let safety = clauses
            .iter()
            .map(AlterClause::safety)
            .max()
            .unwrap_or(Safety::Safe);
        Self {
            kind: DiffKind::Alter,
            key,
            clauses,
            safety,
            object: None,
            omitted_foreign_keys: BTreeSet::new(),
            origin,
        }
    }

    /// Whether `flags` allow this diff to be emitted.
    pub fn is_permitted(&self, flags: &DiffFlags) -> bool {
        match self.safety {
            Safety::Safe => true,
            Safety::Unsafe => flags.allow_unsafe || flags.allow_destructive,
            Safety::Destructive => flags.allow_destructive,
        }
    }

    /// DDL statements for this diff, without trailing delimiters.
    pub fn statements(&self, flags: &DiffFlags) -> Vec<String> {
        match (self.kind, &self.object) {
            (DiffKind::Add, Some(DiffObject::Table(table))) => {
                vec![create_table(table, &self.omitted_foreign_keys)]
            }
            (DiffKind::Add, Some(DiffObject::Routine(routine))) => vec![create_routine(routine)],
            (DiffKind::Drop, Some(DiffObject::Table(table))) => vec![drop_table(&table.name)],
            (DiffKind::Drop, Some(DiffObject::Routine(routine))) => vec![drop_routine(routine)],
            _ => self.alter_statements(flags),
        }
    }

    fn alter_statements(&self, flags: &DiffFlags) -> Vec<String> {
        let mut statements = Vec::new();
        let mut table_clauses = Vec::new();
        for clause in &self.clauses {
            match clause {
                AlterClause::ReplaceRoutine { from, to } => {
                    statements.push(drop_routine(from));
                    statements.push(create_routine(to));
                }
                other => table_clauses.extend(other.to_sql()),
            }
        }
        if !table_clauses.is_empty() {
            if let Some(algorithm) = &flags.alter_algorithm {
                table_clauses.push(format!("ALGORITHM={algorithm}"));
            }
            if let Some(lock) = &flags.alter_lock {
                table_clauses.push(format!("LOCK={lock}"));
            }
            statements.push(format!(
                "ALTER TABLE {} {}",
                quote_identifier(&self.key.name),
                table_clauses.join(", ")
            ));
        }
        statements
    }
}

impl fmt::Display for ObjectDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = match self.kind {
            DiffKind::Add => '+',
            DiffKind::Drop => '-',
            DiffKind::Alter => '~',
        };
        write!(f, "{sign} {}", self.key)?;
        if self.safety != Safety::Safe {
            write!(f, " ({})", self.safety)?;
        }
        Ok(())
    }
}

/// Ordered operations turning one schema into another.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Diff {
    pub object_diffs: Vec<ObjectDiff>,
}

impl Diff {
    pub fn is_empty(&self) -> bool {
        self.object_diffs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.object_diffs.len()
    }

    /// The most severe safety level in the diff.
    pub fn max_safety(&self) -> Option<Safety> {
        self.object_diffs.iter().map(|diff| diff.safety).max()
    }

    /// DDL for every permitted diff, in order.
    pub fn render(&self, flags: &DiffFlags) -> Vec<String> {
        self.object_diffs
            .iter()
            .filter(|diff| diff.is_permitted(flags))
            .flat_map(|diff| diff.statements(flags))
            .collect()
    }

    /// Diffs that `flags` keep out of [`Diff::render`].
    pub fn blocked(&self, flags: &DiffFlags) -> Vec<&ObjectDiff> {
        self.object_diffs
            .iter()
            .filter(|diff| !diff.is_permitted(flags))
            .collect()
    }
}

impl fmt::Display for Diff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return writeln!(f, "No changes detected.");
        }
        for diff in &self.object_diffs {
            writeln!(f, "{diff}")?;
            for clause in &diff.clauses {
                writeln!(f, "    {clause}")?;
            }
        }
        Ok(())
    }
}
